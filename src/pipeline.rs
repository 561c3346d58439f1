use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ReportRequest;
use crate::domain::Category;
use crate::download::{CategoryFetcher, DownloadJob};
use crate::error::DatapipeError;
use crate::exec::CellExecutor;
use crate::report::ReportConverter;
use crate::smard::SmardClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    Skipped,
    Succeeded,
    Failed,
}

/// Produced by each stage, aggregated (never mutated) by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage_id: String,
    pub outcome: StageOutcome,
    pub error: Option<String>,
}

impl StageResult {
    pub fn new(stage_id: impl Into<String>, outcome: StageOutcome) -> Self {
        Self {
            stage_id: stage_id.into(),
            outcome,
            error: None,
        }
    }

    pub fn failed(stage_id: impl Into<String>, err: DatapipeError) -> Self {
        Self {
            stage_id: stage_id.into(),
            outcome: StageOutcome::Failed,
            error: Some(err.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == StageOutcome::Failed
    }
}

/// One orchestrated run: every stage result in invocation order plus the
/// global force flag. Lives only as long as the CLI needs to report it.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub forced: bool,
    pub stages: Vec<StageResult>,
}

impl PipelineRun {
    pub fn new(forced: bool) -> Self {
        Self {
            forced,
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, result: StageResult) {
        self.stages.push(result);
    }

    pub fn is_success(&self) -> bool {
        self.stages.iter().all(|stage| !stage.is_failed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageResult> {
        self.stages.iter().filter(|stage| stage.is_failed())
    }
}

/// Sequences downloads and report conversions in dependency order. Stage
/// failures never abort the run; they only withhold stages that declared the
/// failed output as an upstream requirement.
pub struct Pipeline<'a, C: SmardClient, E: CellExecutor> {
    fetcher: &'a CategoryFetcher<C>,
    converter: &'a ReportConverter<E>,
    reports: &'a [ReportRequest],
}

impl<'a, C: SmardClient, E: CellExecutor> Pipeline<'a, C, E> {
    pub fn new(
        fetcher: &'a CategoryFetcher<C>,
        converter: &'a ReportConverter<E>,
        reports: &'a [ReportRequest],
    ) -> Self {
        Self {
            fetcher,
            converter,
            reports,
        }
    }

    pub fn run(&self, force: bool) -> PipelineRun {
        let mut run = PipelineRun::new(force);
        let job = DownloadJob::new(self.fetcher);

        let mut available = HashMap::new();
        for category in Category::ALL {
            let result = job.run(category, force);
            // Skipped means the output already exists, so it still counts as
            // an available upstream.
            available.insert(category, !result.is_failed());
            run.push(result);
        }

        if self.reports.is_empty() {
            info!("no reports declared, pipeline is downloads only");
        }

        for report in self.reports {
            let stem = report.stem();
            let stage_id = format!("report:{stem}");
            let missing = report
                .requires
                .iter()
                .find(|category| !available.get(*category).copied().unwrap_or(false));

            if let Some(category) = missing {
                warn!(report = %stem, category = %category, "upstream missing, withholding report");
                run.push(StageResult::failed(
                    stage_id,
                    DatapipeError::UpstreamMissing {
                        report: stem.to_string(),
                        category: *category,
                    },
                ));
                continue;
            }

            run.push(self.converter.run(&report.script));
        }

        run
    }
}
