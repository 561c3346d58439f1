use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::Category;

#[derive(Debug, Error, Diagnostic)]
pub enum DatapipeError {
    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("SMARD request failed: {0}")]
    SmardHttp(String),

    #[error("SMARD returned status {status}: {message}")]
    SmardStatus { status: u16, message: String },

    #[error("no timestamps available for variable {0}")]
    EmptyIndex(String),

    #[error("fetch failed for category {category}: {cause}")]
    Fetch { category: Category, cause: String },

    #[error("analysis script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("failed to convert script to notebook: {0}")]
    Conversion(String),

    #[error("cell {cell_index} failed: {cause}")]
    Execution { cell_index: usize, cause: String },

    #[error("failed to render report: {0}")]
    Render(String),

    #[error("report {report} requires category {category} which is not available")]
    UpstreamMissing { report: String, category: Category },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
