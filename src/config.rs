use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Category, Region, Resolution};
use crate::error::DatapipeError;
use crate::report::report_stem;

pub const DEFAULT_CONFIG_FILE: &str = "smard-dp.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    /// ISO date the download window starts at, e.g. "2000-01-01".
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub reports: Vec<ReportEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Shorthand(String),
    Detailed(ReportEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReportEntryObject {
    pub script: String,
    #[serde(default)]
    pub requires: Option<Vec<Category>>,
}

/// A declared report stage: the analysis script and the category outputs it
/// reads. A shorthand entry requires all four categories.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub script: Utf8PathBuf,
    pub requires: Vec<Category>,
}

impl ReportRequest {
    pub fn stem(&self) -> &str {
        report_stem(&self.script)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub region: Region,
    pub resolution: Resolution,
    pub start: DateTime<Utc>,
    pub reports: Vec<ReportRequest>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `smard-dp.json` (or an explicit path). A missing default file
    /// resolves to defaults with no declared reports; a missing explicit
    /// path is an error.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DatapipeError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(DatapipeError::ConfigRead(config_path));
            }
            debug!("no config file, using defaults");
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DatapipeError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DatapipeError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DatapipeError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let region = config.region.unwrap_or(Region::De);
        let resolution = config.resolution.unwrap_or(Resolution::QuarterHour);
        let start = parse_start(config.start.as_deref().unwrap_or("2000-01-01"))?;

        let reports = config
            .reports
            .into_iter()
            .map(|entry| match entry {
                ReportEntry::Shorthand(script) => ReportRequest {
                    script: Utf8PathBuf::from(script),
                    requires: Category::ALL.to_vec(),
                },
                ReportEntry::Detailed(obj) => ReportRequest {
                    script: Utf8PathBuf::from(obj.script),
                    requires: obj.requires.unwrap_or_else(|| Category::ALL.to_vec()),
                },
            })
            .collect();

        Ok(ResolvedConfig {
            schema_version,
            region,
            resolution,
            start,
            reports,
        })
    }
}

fn parse_start(value: &str) -> Result<DateTime<Utc>, DatapipeError> {
    let date = value
        .parse::<NaiveDate>()
        .map_err(|err| DatapipeError::ConfigParse(format!("invalid start date {value}: {err}")))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DatapipeError::ConfigParse(format!("invalid start date {value}")))?;
    Ok(midnight.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.region, Region::De);
        assert_eq!(resolved.resolution, Resolution::QuarterHour);
        assert_eq!(resolved.start.timestamp_millis(), 946_684_800_000);
        assert!(resolved.reports.is_empty());
    }

    #[test]
    fn shorthand_report_requires_all_categories() {
        let config = Config {
            reports: vec![ReportEntry::Shorthand("data_analysis.py".to_string())],
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.reports.len(), 1);
        assert_eq!(resolved.reports[0].stem(), "data_analysis");
        assert_eq!(resolved.reports[0].requires, Category::ALL.to_vec());
    }

    #[test]
    fn detailed_report_keeps_declared_requirements() {
        let json = r#"{
            "schema_version": 1,
            "region": "DE-LU",
            "resolution": "hour",
            "start": "2020-06-01",
            "reports": [
                { "script": "price_report.py", "requires": ["prices"] }
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.region, Region::DeLu);
        assert_eq!(resolved.resolution, Resolution::Hour);
        assert_eq!(resolved.reports[0].requires, vec![Category::Prices]);
    }
}
