use std::fs;

use camino::Utf8Path;
use tracing::{info, warn};

use crate::error::DatapipeError;
use crate::exec::CellExecutor;
use crate::notebook::{Notebook, parse_script, render_html, render_markdown};
use crate::pipeline::{StageOutcome, StageResult};
use crate::store::Store;

/// Turns one analysis script into a rendered HTML report:
/// script -> notebook -> executed notebook -> HTML.
///
/// Unlike downloads there is no skip-on-cache here: every invocation
/// re-executes from scratch so the rendered report always reflects the data
/// on disk.
pub struct ReportConverter<E: CellExecutor> {
    store: Store,
    executor: E,
}

impl<E: CellExecutor> ReportConverter<E> {
    pub fn new(store: Store, executor: E) -> Self {
        Self { store, executor }
    }

    pub fn run(&self, script: &Utf8Path) -> StageResult {
        let stage_id = format!("report:{}", report_stem(script));
        match self.convert(script) {
            Ok(()) => StageResult::new(stage_id, StageOutcome::Succeeded),
            Err(err) => StageResult::failed(stage_id, err),
        }
    }

    pub fn convert(&self, script: &Utf8Path) -> Result<(), DatapipeError> {
        if !script.as_std_path().exists() {
            return Err(DatapipeError::ScriptNotFound(
                script.as_std_path().to_path_buf(),
            ));
        }
        let stem = report_stem(script);

        let sources = match self.build_sources(script) {
            Ok(sources) => sources,
            Err(err) => {
                self.remove_stale_renders(stem)?;
                return Err(err);
            }
        };

        self.store.ensure_report_dir(stem)?;
        let notebook_path = self.store.notebook_path(stem);

        let mut notebook = Notebook::from_sources(sources);
        Store::write_bytes_atomic(&notebook_path, &notebook.to_json()?)?;
        info!(report = stem, cells = notebook.cells.len(), "notebook built");

        let outputs = match self.executor.execute(&notebook.cell_sources()) {
            Ok(outputs) => outputs,
            Err(err) => {
                self.remove_stale_renders(stem)?;
                return Err(err);
            }
        };

        for (index, (cell, cell_outputs)) in
            notebook.cells.iter_mut().zip(outputs).enumerate()
        {
            cell.execution_count = Some(index as u32 + 1);
            cell.outputs = cell_outputs;
        }
        Store::write_bytes_atomic(&notebook_path, &notebook.to_json()?)?;
        info!(report = stem, "notebook executed");

        let html_path = self.store.html_path(stem);
        let html = render_html(&notebook, stem);
        Store::write_bytes_atomic(&html_path, html.as_bytes())
            .map_err(|err| DatapipeError::Render(err.to_string()))?;
        let markdown_path = self.store.markdown_path(stem);
        let markdown = render_markdown(&notebook, stem);
        Store::write_bytes_atomic(&markdown_path, markdown.as_bytes())
            .map_err(|err| DatapipeError::Render(err.to_string()))?;
        info!(report = stem, html = %html_path, markdown = %markdown_path, "report rendered");
        Ok(())
    }

    fn build_sources(&self, script: &Utf8Path) -> Result<Vec<String>, DatapipeError> {
        let content = fs::read_to_string(script.as_std_path())
            .map_err(|err| DatapipeError::Conversion(err.to_string()))?;
        parse_script(&content)
    }

    /// A report that failed to rebuild or re-execute must not keep presenting
    /// a previous run's renders as current.
    fn remove_stale_renders(&self, stem: &str) -> Result<(), DatapipeError> {
        for path in [self.store.html_path(stem), self.store.markdown_path(stem)] {
            if path.as_std_path().exists() {
                warn!(report = stem, path = %path, "removing stale render after failure");
                fs::remove_file(path.as_std_path())
                    .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
            }
        }
        Ok(())
    }
}

pub fn report_stem(script: &Utf8Path) -> &str {
    script.file_stem().unwrap_or("report")
}
