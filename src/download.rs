use std::fs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{Category, Region, Resolution};
use crate::error::DatapipeError;
use crate::pipeline::{StageOutcome, StageResult};
use crate::smard::{Series, SmardClient};
use crate::store::{Store, atomic_rename_dir};

/// Per-variable file written under the category directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesFile {
    pub variable: String,
    pub id: u32,
    pub region: Region,
    pub resolution: Resolution,
    pub downloaded_at: String,
    pub series: Series,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchParams {
    pub region: Region,
    pub resolution: Resolution,
    pub start: DateTime<Utc>,
}

/// Fetches every variable of one category into a staged directory and
/// publishes it with a single rename. The category directory is only ever
/// absent, fully written, or whatever a previous successful run left there.
pub struct CategoryFetcher<C: SmardClient> {
    store: Store,
    client: C,
    params: FetchParams,
}

impl<C: SmardClient> CategoryFetcher<C> {
    pub fn new(store: Store, client: C, params: FetchParams) -> Self {
        Self {
            store,
            client,
            params,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn fetch(&self, category: Category) -> Result<(), DatapipeError> {
        self.fetch_inner(category)
            .map_err(|err| DatapipeError::Fetch {
                category,
                cause: err.to_string(),
            })
    }

    fn fetch_inner(&self, category: Category) -> Result<(), DatapipeError> {
        // Staged next to the final location; dropped on any error, so a
        // failed attempt cannot masquerade as a cached download.
        let stage = self.store.category_stage_dir()?;

        for variable in category.variables() {
            debug!(category = %category, variable = variable.name, "fetching series");
            let series = self.client.fetch_series(
                *variable,
                self.params.region,
                self.params.resolution,
                self.params.start,
            )?;

            let artifact = SeriesFile {
                variable: variable.name.to_string(),
                id: variable.id,
                region: self.params.region,
                resolution: self.params.resolution,
                downloaded_at: Utc::now().to_rfc3339(),
                series,
            };
            let content = serde_json::to_vec_pretty(&artifact)
                .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
            let file_name = Store::series_file_name(*variable, self.params.resolution);
            fs::write(stage.path().join(file_name), &content)
                .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
        }

        let dest = self.store.category_dir(category);
        atomic_rename_dir(stage.path(), dest.as_std_path())
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
        // The stage dir no longer exists after the rename; TempDir's drop
        // ignores the failed cleanup.
        Ok(())
    }
}

/// Idempotency wrapper around the fetcher: skip when output is already
/// present, isolate failures to the one category.
pub struct DownloadJob<'a, C: SmardClient> {
    fetcher: &'a CategoryFetcher<C>,
}

impl<'a, C: SmardClient> DownloadJob<'a, C> {
    pub fn new(fetcher: &'a CategoryFetcher<C>) -> Self {
        Self { fetcher }
    }

    pub fn run(&self, category: Category, force: bool) -> StageResult {
        let stage_id = format!("download:{category}");

        if !force && self.fetcher.store().category_present(category) {
            info!(category = %category, "output present, skipping download");
            return StageResult::new(stage_id, StageOutcome::Skipped);
        }

        info!(category = %category, force, "downloading category");
        match self.fetcher.fetch(category) {
            Ok(()) => StageResult::new(stage_id, StageOutcome::Succeeded),
            Err(err) => StageResult::failed(stage_id, err),
        }
    }
}
