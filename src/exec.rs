use std::fs;
use std::process::Command;

use tracing::debug;

use crate::error::DatapipeError;
use crate::notebook::CellOutput;

/// Runs every cell of a notebook in one shared interpreter context and
/// captures per-cell output. Execution stops at the first raising cell;
/// `cell_index` in the resulting error is 1-based file order.
pub trait CellExecutor: Send + Sync {
    fn execute(&self, sources: &[String]) -> Result<Vec<Vec<CellOutput>>, DatapipeError>;
}

/// Driver fed to the Python interpreter. It execs each cell against shared
/// globals and frames every cell's stdout with sentinel lines the Rust side
/// parses back into per-cell outputs.
const DRIVER: &str = r#"import json, sys, traceback

def main():
    with open(sys.argv[1]) as fh:
        cells = json.load(fh)
    shared = {"__name__": "__main__"}
    for index, source in enumerate(cells, start=1):
        print("---CELL-%d-BEGIN---" % index, flush=True)
        try:
            exec(compile(source, "<cell %d>" % index, "exec"), shared)
        except SystemExit:
            raise
        except BaseException:
            sys.stdout.flush()
            print("---CELL-%d-ERROR---" % index, flush=True)
            traceback.print_exc(file=sys.stdout)
            sys.stdout.flush()
            sys.exit(1)
        sys.stdout.flush()
        print("---CELL-%d-END---" % index, flush=True)

main()
"#;

/// Real executor: one `python3` child per notebook run, so later cells see
/// the bindings of earlier ones. The child inherits the working directory,
/// so scripts resolve their data paths relative to the project root.
pub struct PythonKernel {
    interpreter: String,
}

impl PythonKernel {
    pub fn new() -> Self {
        let interpreter = std::env::var("SMARD_DP_PYTHON")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "python3".to_string());
        Self { interpreter }
    }
}

impl Default for PythonKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl CellExecutor for PythonKernel {
    fn execute(&self, sources: &[String]) -> Result<Vec<Vec<CellOutput>>, DatapipeError> {
        let scratch = tempfile::Builder::new()
            .prefix("smard-dp-kernel")
            .tempdir()
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
        let driver_path = scratch.path().join("driver.py");
        let cells_path = scratch.path().join("cells.json");
        fs::write(&driver_path, DRIVER)
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
        let cells_json = serde_json::to_vec(sources)
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
        fs::write(&cells_path, &cells_json)
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;

        let output = Command::new(&self.interpreter)
            .arg(&driver_path)
            .arg(&cells_path)
            .output()
            .map_err(|_| DatapipeError::MissingTool(self.interpreter.clone()))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(status = ?output.status, "kernel finished");

        parse_transcript(&stdout, &stderr, sources.len(), output.status.success())
    }
}

/// Splits the sentinel-framed transcript back into per-cell outputs.
///
/// The framing is in-band with the script's own stdout, so a cell is free to
/// print a sentinel-shaped line itself. A sentinel is therefore only honored
/// when its index matches the cell the driver is actually framing: BEGIN must
/// open the next cell in order, END and ERROR must close the currently open
/// one. Anything else is captured as ordinary output, and an error sentinel
/// is only final when the interpreter also exited non-zero. If the run failed
/// without an honored error sentinel (interpreter crash, import error in the
/// driver itself) the failure is pinned on the last begun cell.
fn parse_transcript(
    stdout: &str,
    stderr: &str,
    cell_count: usize,
    success: bool,
) -> Result<Vec<Vec<CellOutput>>, DatapipeError> {
    let mut outputs: Vec<Vec<CellOutput>> = vec![Vec::new(); cell_count];
    let mut current: Option<usize> = None;
    let mut next_expected = 1usize;
    let mut buffer = String::new();
    let mut failed: Option<usize> = None;
    let mut traceback = String::new();

    for line in stdout.lines() {
        if failed.is_some() {
            traceback.push_str(line);
            traceback.push('\n');
            continue;
        }
        if let Some(index) = sentinel(line, "BEGIN") {
            if current.is_none() && index == next_expected && index <= cell_count {
                current = Some(index);
                next_expected = index + 1;
                buffer.clear();
                continue;
            }
        } else if let Some(index) = sentinel(line, "END") {
            if current == Some(index) {
                if !buffer.is_empty() {
                    outputs[index - 1].push(CellOutput::Stream {
                        name: "stdout".to_string(),
                        text: vec![buffer.clone()],
                    });
                }
                current = None;
                buffer.clear();
                continue;
            }
        } else if let Some(index) = sentinel(line, "ERROR") {
            if current == Some(index) {
                failed = Some(index);
                current = None;
                continue;
            }
        }
        if current.is_some() {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }

    if !success {
        if let Some(cell_index) = failed {
            let cause = traceback
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("cell raised an exception")
                .trim()
                .to_string();
            debug!(cell_index, traceback = %traceback.trim_end(), "cell failed");
            return Err(DatapipeError::Execution { cell_index, cause });
        }
        let cell_index = current.unwrap_or(1);
        let cause = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("interpreter exited abnormally")
            .trim()
            .to_string();
        return Err(DatapipeError::Execution { cell_index, cause });
    }

    Ok(outputs)
}

fn sentinel(line: &str, kind: &str) -> Option<usize> {
    let rest = line.strip_prefix("---CELL-")?;
    let (index, tail) = rest.split_once('-')?;
    if tail != format!("{kind}---") {
        return None;
    }
    index.parse().ok()
}
