use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use smard_datapipe::error::DatapipeError;
use smard_datapipe::exec::CellExecutor;
use smard_datapipe::notebook::{CellOutput, Notebook};
use smard_datapipe::pipeline::StageOutcome;
use smard_datapipe::report::ReportConverter;
use smard_datapipe::store::Store;

struct MockExecutor {
    fail_at: Option<usize>,
    calls: Mutex<usize>,
}

impl MockExecutor {
    fn ok() -> Self {
        Self {
            fail_at: None,
            calls: Mutex::new(0),
        }
    }

    fn failing_at(cell_index: usize) -> Self {
        Self {
            fail_at: Some(cell_index),
            calls: Mutex::new(0),
        }
    }

    fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl CellExecutor for &MockExecutor {
    fn execute(&self, sources: &[String]) -> Result<Vec<Vec<CellOutput>>, DatapipeError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(cell_index) = self.fail_at {
            return Err(DatapipeError::Execution {
                cell_index,
                cause: "RuntimeError: boom".to_string(),
            });
        }
        Ok(sources
            .iter()
            .enumerate()
            .map(|(index, _)| {
                vec![CellOutput::Stream {
                    name: "stdout".to_string(),
                    text: vec![format!("cell {}\n", index + 1)],
                }]
            })
            .collect())
    }
}

fn test_store(temp: &tempfile::TempDir) -> Store {
    let raw = Utf8PathBuf::from_path_buf(temp.path().join("data").join("raw_data")).unwrap();
    let reports = Utf8PathBuf::from_path_buf(temp.path().join("reports")).unwrap();
    Store::new_with_paths(raw, reports)
}

fn write_script(temp: &tempfile::TempDir, name: &str, content: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(temp.path().join(name)).unwrap();
    fs::write(path.as_std_path(), content).unwrap();
    path
}

const FIVE_CELLS: &str = "# %%\na = 1\n# %%\nb = a + 1\n# %%\nprint(b)\n# %%\nc = b * 2\n# %%\nprint(c)\n";

#[test]
fn successful_conversion_writes_notebook_and_renders() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    let executor = MockExecutor::ok();
    let converter = ReportConverter::new(store.clone(), &executor);

    let script = write_script(&temp, "data_analysis.py", FIVE_CELLS);
    let result = converter.run(&script);
    assert_eq!(result.outcome, StageOutcome::Succeeded);
    assert_eq!(result.stage_id, "report:data_analysis");

    let notebook_path = store.notebook_path("data_analysis");
    let html_path = store.html_path("data_analysis");
    let markdown_path = store.markdown_path("data_analysis");
    assert!(notebook_path.as_std_path().exists());
    assert!(html_path.as_std_path().exists());
    assert!(markdown_path.as_std_path().exists());

    let notebook: Notebook =
        serde_json::from_slice(&fs::read(notebook_path.as_std_path()).unwrap()).unwrap();
    assert_eq!(notebook.cells.len(), 5);
    assert_eq!(notebook.cells[0].execution_count, Some(1));
    assert_eq!(notebook.cells[0].outputs.len(), 1);

    let html = fs::read_to_string(html_path.as_std_path()).unwrap();
    assert!(html.contains("cell 3"));
    let markdown = fs::read_to_string(markdown_path.as_std_path()).unwrap();
    assert!(markdown.contains("```python\nprint(b)\n```"));
    assert!(markdown.contains("cell 3"));
}

#[test]
fn execution_failure_writes_no_html() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    let executor = MockExecutor::failing_at(3);
    let converter = ReportConverter::new(store.clone(), &executor);

    let script = write_script(&temp, "data_analysis.py", FIVE_CELLS);
    let err = converter.convert(&script).unwrap_err();
    assert_matches!(err, DatapipeError::Execution { cell_index: 3, .. });
    assert!(!store.html_path("data_analysis").as_std_path().exists());
    assert!(!store.markdown_path("data_analysis").as_std_path().exists());
    // The unexecuted notebook is still on disk for debugging.
    assert!(store.notebook_path("data_analysis").as_std_path().exists());
}

#[test]
fn execution_failure_removes_stale_renders() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    let script = write_script(&temp, "data_analysis.py", FIVE_CELLS);

    let good = MockExecutor::ok();
    let converter = ReportConverter::new(store.clone(), &good);
    assert_eq!(converter.run(&script).outcome, StageOutcome::Succeeded);
    assert!(store.html_path("data_analysis").as_std_path().exists());

    let bad = MockExecutor::failing_at(1);
    let converter = ReportConverter::new(store.clone(), &bad);
    assert_eq!(converter.run(&script).outcome, StageOutcome::Failed);

    // The earlier renders must not keep looking like a current report.
    assert!(!store.html_path("data_analysis").as_std_path().exists());
    assert!(!store.markdown_path("data_analysis").as_std_path().exists());
}

#[test]
fn build_failure_removes_stale_renders() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    let executor = MockExecutor::ok();
    let converter = ReportConverter::new(store.clone(), &executor);

    let script = write_script(&temp, "data_analysis.py", FIVE_CELLS);
    assert_eq!(converter.run(&script).outcome, StageOutcome::Succeeded);
    assert!(store.html_path("data_analysis").as_std_path().exists());

    // The script degrades to one with no translatable content.
    fs::write(script.as_std_path(), "# %%\n\n# %%\n   \n").unwrap();
    let result = converter.run(&script);
    assert_eq!(result.outcome, StageOutcome::Failed);

    assert!(!store.html_path("data_analysis").as_std_path().exists());
    assert!(!store.markdown_path("data_analysis").as_std_path().exists());
}

#[test]
fn rerun_always_reexecutes() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    let executor = MockExecutor::ok();
    let converter = ReportConverter::new(store.clone(), &executor);

    let script = write_script(&temp, "data_analysis.py", FIVE_CELLS);
    assert_eq!(converter.run(&script).outcome, StageOutcome::Succeeded);
    assert_eq!(converter.run(&script).outcome, StageOutcome::Succeeded);
    assert_eq!(executor.call_count(), 2);
}

#[test]
fn missing_script_is_a_build_failure() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    let executor = MockExecutor::ok();
    let converter = ReportConverter::new(store, &executor);

    let missing = Utf8PathBuf::from_path_buf(temp.path().join("nope.py")).unwrap();
    let err = converter.convert(&missing).unwrap_err();
    assert_matches!(err, DatapipeError::ScriptNotFound(_));
    assert_eq!(executor.call_count(), 0);
}

#[test]
fn unparseable_script_is_a_build_failure() {
    let temp = tempfile::tempdir().unwrap();
    let store = test_store(&temp);
    let executor = MockExecutor::ok();
    let converter = ReportConverter::new(store, &executor);

    let script = write_script(&temp, "empty.py", "# %%\n\n# %%\n   \n");
    let err = converter.convert(&script).unwrap_err();
    assert_matches!(err, DatapipeError::Conversion(_));
    assert_eq!(executor.call_count(), 0);
}
