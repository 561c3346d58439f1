use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DatapipeError;

/// One SMARD time series, identified by the numeric id the API uses in its
/// chart_data URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub id: u32,
    pub name: &'static str,
}

impl Variable {
    // Power generation
    pub const BROWN_COAL: Variable = Variable::new(1223, "BROWN_COAL");
    pub const NUCLEAR: Variable = Variable::new(1224, "NUCLEAR");
    pub const WIND_OFFSHORE: Variable = Variable::new(1225, "WIND_OFFSHORE");
    pub const HYDRO: Variable = Variable::new(1226, "HYDRO");
    pub const OTHER_CONVENTIONAL: Variable = Variable::new(1227, "OTHER_CONVENTIONAL");
    pub const OTHER_RENEWABLE: Variable = Variable::new(1228, "OTHER_RENEWABLE");
    pub const BIOMASS: Variable = Variable::new(4066, "BIOMASS");
    pub const WIND_ONSHORE: Variable = Variable::new(4067, "WIND_ONSHORE");
    pub const SOLAR: Variable = Variable::new(4068, "SOLAR");
    pub const HARD_COAL: Variable = Variable::new(4069, "HARD_COAL");
    pub const PUMPED_STORAGE: Variable = Variable::new(4070, "PUMPED_STORAGE");
    pub const NATURAL_GAS: Variable = Variable::new(4071, "NATURAL_GAS");

    // Power consumption
    pub const TOTAL_LOAD: Variable = Variable::new(410, "TOTAL_LOAD");
    pub const RESIDUAL_LOAD: Variable = Variable::new(4359, "RESIDUAL_LOAD");
    pub const PUMPED_STORAGE_LOAD: Variable = Variable::new(4387, "PUMPED_STORAGE_LOAD");

    // Market prices
    pub const PRICE_DE_LU: Variable = Variable::new(4169, "PRICE_DE_LU");
    pub const PRICE_DE_LU_NEIGHBORS: Variable = Variable::new(5078, "PRICE_DE_LU_NEIGHBORS");
    pub const PRICE_BE: Variable = Variable::new(4996, "PRICE_BE");
    pub const PRICE_NO2: Variable = Variable::new(4997, "PRICE_NO2");
    pub const PRICE_AT: Variable = Variable::new(4170, "PRICE_AT");
    pub const PRICE_DK1: Variable = Variable::new(252, "PRICE_DK1");
    pub const PRICE_DK2: Variable = Variable::new(253, "PRICE_DK2");
    pub const PRICE_FR: Variable = Variable::new(254, "PRICE_FR");
    pub const PRICE_IT_NORTH: Variable = Variable::new(255, "PRICE_IT_NORTH");
    pub const PRICE_NL: Variable = Variable::new(256, "PRICE_NL");
    pub const PRICE_PL: Variable = Variable::new(257, "PRICE_PL");
    pub const PRICE_PL2: Variable = Variable::new(258, "PRICE_PL2");
    pub const PRICE_CH: Variable = Variable::new(259, "PRICE_CH");
    pub const PRICE_SI: Variable = Variable::new(260, "PRICE_SI");
    pub const PRICE_CZ: Variable = Variable::new(261, "PRICE_CZ");
    pub const PRICE_HU: Variable = Variable::new(262, "PRICE_HU");

    // Forecasts
    pub const FORECAST_OFFSHORE: Variable = Variable::new(3791, "FORECAST_OFFSHORE");
    pub const FORECAST_ONSHORE: Variable = Variable::new(123, "FORECAST_ONSHORE");
    pub const FORECAST_SOLAR: Variable = Variable::new(125, "FORECAST_SOLAR");
    pub const FORECAST_OTHER: Variable = Variable::new(715, "FORECAST_OTHER");
    pub const FORECAST_WIND_SOLAR: Variable = Variable::new(5097, "FORECAST_WIND_SOLAR");
    pub const FORECAST_TOTAL: Variable = Variable::new(122, "FORECAST_TOTAL");

    const fn new(id: u32, name: &'static str) -> Self {
        Self { id, name }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

const GENERATION_VARIABLES: &[Variable] = &[
    Variable::BROWN_COAL,
    Variable::NUCLEAR,
    Variable::WIND_OFFSHORE,
    Variable::HYDRO,
    Variable::OTHER_CONVENTIONAL,
    Variable::OTHER_RENEWABLE,
    Variable::BIOMASS,
    Variable::WIND_ONSHORE,
    Variable::SOLAR,
    Variable::HARD_COAL,
    Variable::PUMPED_STORAGE,
    Variable::NATURAL_GAS,
];

const CONSUMPTION_VARIABLES: &[Variable] = &[
    Variable::TOTAL_LOAD,
    Variable::RESIDUAL_LOAD,
    Variable::PUMPED_STORAGE_LOAD,
];

const PRICE_VARIABLES: &[Variable] = &[
    Variable::PRICE_DE_LU,
    Variable::PRICE_DE_LU_NEIGHBORS,
    Variable::PRICE_BE,
    Variable::PRICE_NO2,
    Variable::PRICE_AT,
    Variable::PRICE_DK1,
    Variable::PRICE_DK2,
    Variable::PRICE_FR,
    Variable::PRICE_IT_NORTH,
    Variable::PRICE_NL,
    Variable::PRICE_PL,
    Variable::PRICE_PL2,
    Variable::PRICE_CH,
    Variable::PRICE_SI,
    Variable::PRICE_CZ,
    Variable::PRICE_HU,
];

const FORECAST_VARIABLES: &[Variable] = &[
    Variable::FORECAST_OFFSHORE,
    Variable::FORECAST_ONSHORE,
    Variable::FORECAST_SOLAR,
    Variable::FORECAST_OTHER,
    Variable::FORECAST_WIND_SOLAR,
    Variable::FORECAST_TOTAL,
];

/// The four dataset categories a DownloadJob can own. The CLI-level `all`
/// target fans out over these and is deliberately not a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Generation,
    Consumption,
    Prices,
    Forecasts,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Generation,
        Category::Consumption,
        Category::Prices,
        Category::Forecasts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Generation => "generation",
            Category::Consumption => "consumption",
            Category::Prices => "prices",
            Category::Forecasts => "forecasts",
        }
    }

    pub fn variables(self) -> &'static [Variable] {
        match self {
            Category::Generation => GENERATION_VARIABLES,
            Category::Consumption => CONSUMPTION_VARIABLES,
            Category::Prices => PRICE_VARIABLES,
            Category::Forecasts => FORECAST_VARIABLES,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = DatapipeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "generation" => Ok(Category::Generation),
            "consumption" => Ok(Category::Consumption),
            "prices" => Ok(Category::Prices),
            "forecasts" => Ok(Category::Forecasts),
            _ => Err(DatapipeError::InvalidCategory(value.to_string())),
        }
    }
}

/// What `smard-dp download` accepts: a single category or the `all` fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DownloadTarget {
    Generation,
    Consumption,
    Prices,
    Forecasts,
    All,
}

impl DownloadTarget {
    pub fn expand(self) -> Vec<Category> {
        match self {
            DownloadTarget::Generation => vec![Category::Generation],
            DownloadTarget::Consumption => vec![Category::Consumption],
            DownloadTarget::Prices => vec![Category::Prices],
            DownloadTarget::Forecasts => vec![Category::Forecasts],
            DownloadTarget::All => Category::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Hour,
    #[serde(rename = "quarterhour")]
    QuarterHour,
    Day,
    Week,
    Month,
    Year,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Hour => "hour",
            Resolution::QuarterHour => "quarterhour",
            Resolution::Day => "day",
            Resolution::Week => "week",
            Resolution::Month => "month",
            Resolution::Year => "year",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "DE")]
    De,
    #[serde(rename = "AT")]
    At,
    #[serde(rename = "LU")]
    Lu,
    #[serde(rename = "DE-LU")]
    DeLu,
    #[serde(rename = "DE-AT-LU")]
    DeAtLu,
    #[serde(rename = "50Hertz")]
    FiftyHertz,
    #[serde(rename = "Amprion")]
    Amprion,
    #[serde(rename = "TenneT")]
    Tennet,
    #[serde(rename = "TransnetBW")]
    TransnetBw,
    #[serde(rename = "APG")]
    Apg,
    #[serde(rename = "Creos")]
    Creos,
}

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Region::De => "DE",
            Region::At => "AT",
            Region::Lu => "LU",
            Region::DeLu => "DE-LU",
            Region::DeAtLu => "DE-AT-LU",
            Region::FiftyHertz => "50Hertz",
            Region::Amprion => "Amprion",
            Region::Tennet => "TenneT",
            Region::TransnetBw => "TransnetBW",
            Region::Apg => "APG",
            Region::Creos => "Creos",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_category_valid() {
        let category: Category = " Prices ".parse().unwrap();
        assert_eq!(category, Category::Prices);
    }

    #[test]
    fn parse_category_invalid() {
        let err = "all".parse::<Category>().unwrap_err();
        assert_matches!(err, DatapipeError::InvalidCategory(_));
    }

    #[test]
    fn category_variable_groups() {
        assert_eq!(Category::Generation.variables().len(), 12);
        assert_eq!(Category::Consumption.variables().len(), 3);
        assert_eq!(Category::Prices.variables().len(), 16);
        assert_eq!(Category::Forecasts.variables().len(), 6);
        assert!(
            Category::Generation
                .variables()
                .contains(&Variable::SOLAR)
        );
    }

    #[test]
    fn download_target_expansion() {
        assert_eq!(DownloadTarget::Prices.expand(), vec![Category::Prices]);
        assert_eq!(DownloadTarget::All.expand(), Category::ALL.to_vec());
    }
}
