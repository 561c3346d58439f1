use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Region, Resolution, Variable};
use crate::error::DatapipeError;

/// One downloaded time series: millisecond timestamps paired with values.
/// Gaps in the upstream data arrive as nulls and are kept as `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Series {
    pub points: Vec<(i64, Option<f64>)>,
}

impl Series {
    pub fn sort_and_dedup(&mut self) {
        self.points.sort_by_key(|(ts, _)| *ts);
        self.points.dedup_by_key(|(ts, _)| *ts);
    }
}

/// Transport seam for the SMARD open-data API. The pipeline only ever talks
/// to this trait, so tests swap in scripted implementations.
pub trait SmardClient: Send + Sync {
    fn fetch_series(
        &self,
        variable: Variable,
        region: Region,
        resolution: Resolution,
        start: DateTime<Utc>,
    ) -> Result<Series, DatapipeError>;
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    timestamps: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct ChunkResponse {
    series: Vec<(i64, Option<f64>)>,
}

#[derive(Clone)]
pub struct SmardHttpClient {
    client: Client,
    base_url: String,
}

impl SmardHttpClient {
    pub fn new() -> Result<Self, DatapipeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("smard-dp/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DatapipeError::SmardHttp(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| DatapipeError::SmardHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://www.smard.de/app".to_string(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DatapipeError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "SMARD request failed".to_string());
            return Err(DatapipeError::SmardStatus { status, message });
        }
        response
            .json::<T>()
            .map_err(|err| DatapipeError::SmardHttp(err.to_string()))
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, DatapipeError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(DatapipeError::SmardHttp(err.to_string()));
                }
            }
        }
    }
}

impl SmardClient for SmardHttpClient {
    fn fetch_series(
        &self,
        variable: Variable,
        region: Region,
        resolution: Resolution,
        start: DateTime<Utc>,
    ) -> Result<Series, DatapipeError> {
        let index_url = format!(
            "{}/chart_data/{}/{}/index_{}.json",
            self.base_url, variable.id, region, resolution
        );
        let index: IndexResponse = self.get_json(&index_url)?;

        let start_ms = start.timestamp_millis();
        let timestamps: Vec<i64> = index
            .timestamps
            .into_iter()
            .filter(|ts| *ts >= start_ms)
            .collect();
        if timestamps.is_empty() {
            return Err(DatapipeError::EmptyIndex(variable.name.to_string()));
        }

        let mut series = Series::default();
        for timestamp in timestamps {
            let chunk_url = format!(
                "{}/chart_data/{}/{}/{}_{}_{}_{}.json",
                self.base_url, variable.id, region, variable.id, region, resolution, timestamp
            );
            // A single missing chunk is not fatal for the series, matching
            // how the upstream API occasionally drops chart windows.
            match self.get_json::<ChunkResponse>(&chunk_url) {
                Ok(chunk) => series.points.extend(chunk.series),
                Err(err) => {
                    warn!(variable = variable.name, timestamp, %err, "skipping chunk");
                }
            }
        }

        series.sort_and_dedup();
        Ok(series)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn sort_and_dedup_points() {
        let mut series = Series {
            points: vec![(30, Some(3.0)), (10, Some(1.0)), (10, Some(1.5)), (20, None)],
        };
        series.sort_and_dedup();
        assert_eq!(
            series.points,
            vec![(10, Some(1.0)), (20, None), (30, Some(3.0))]
        );
    }
}
