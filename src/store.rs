use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{Category, Resolution, Variable};
use crate::error::DatapipeError;

/// On-disk layout shared by every stage: raw datasets under a category-keyed
/// tree, rendered reports under a report-keyed tree. Each stage is the sole
/// writer for its own directory.
#[derive(Debug, Clone)]
pub struct Store {
    raw_data_root: Utf8PathBuf,
    reports_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, DatapipeError> {
        let cwd =
            std::env::current_dir().map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
        let cwd = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| DatapipeError::Filesystem("non-utf8 working directory".to_string()))?;
        Ok(Self {
            raw_data_root: cwd.join("data").join("raw_data"),
            reports_root: cwd.join("reports"),
        })
    }

    pub fn new_with_paths(raw_data_root: Utf8PathBuf, reports_root: Utf8PathBuf) -> Self {
        Self {
            raw_data_root,
            reports_root,
        }
    }

    pub fn raw_data_root(&self) -> &Utf8Path {
        &self.raw_data_root
    }

    pub fn reports_root(&self) -> &Utf8Path {
        &self.reports_root
    }

    pub fn category_dir(&self, category: Category) -> Utf8PathBuf {
        self.raw_data_root.join(category.as_str())
    }

    pub fn series_file_name(variable: Variable, resolution: Resolution) -> String {
        format!("{}_{}.json", variable.name, resolution)
    }

    pub fn report_dir(&self, stem: &str) -> Utf8PathBuf {
        self.reports_root.join(stem)
    }

    pub fn notebook_path(&self, stem: &str) -> Utf8PathBuf {
        self.report_dir(stem).join(format!("{stem}.ipynb"))
    }

    pub fn html_path(&self, stem: &str) -> Utf8PathBuf {
        self.report_dir(stem).join(format!("{stem}.html"))
    }

    pub fn markdown_path(&self, stem: &str) -> Utf8PathBuf {
        self.report_dir(stem).join(format!("{stem}.md"))
    }

    pub fn ensure_raw_data_root(&self) -> Result<(), DatapipeError> {
        fs::create_dir_all(self.raw_data_root.as_std_path())
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))
    }

    pub fn ensure_report_dir(&self, stem: &str) -> Result<(), DatapipeError> {
        fs::create_dir_all(self.report_dir(stem).as_std_path())
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))
    }

    /// The idempotency signal: a category counts as downloaded when its
    /// directory exists and holds at least one entry. A directory left behind
    /// by a failed attempt must never satisfy this, which is why fetches
    /// stage into a tempdir and rename in one step.
    pub fn category_present(&self, category: Category) -> bool {
        let dir = self.category_dir(category);
        match fs::read_dir(dir.as_std_path()) {
            Ok(mut entries) => entries.next().is_some(),
            Err(_) => false,
        }
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), DatapipeError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// Stage directory for an in-flight category fetch, created next to the
    /// raw-data root so the final rename stays on one filesystem.
    pub fn category_stage_dir(&self) -> Result<tempfile::TempDir, DatapipeError> {
        self.ensure_raw_data_root()?;
        tempfile::Builder::new()
            .prefix("smard-dp-fetch")
            .tempdir_in(self.raw_data_root.as_std_path())
            .map_err(|err| DatapipeError::Filesystem(err.to_string()))
    }
}

pub fn atomic_rename_dir(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    fs::rename(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::new_with_paths(
            Utf8PathBuf::from("/tmp/proj/data/raw_data"),
            Utf8PathBuf::from("/tmp/proj/reports"),
        );

        assert!(store.raw_data_root().ends_with("data/raw_data"));
        assert!(store.reports_root().ends_with("reports"));

        let dir = store.category_dir(Category::Generation);
        assert!(dir.ends_with("raw_data/generation"));

        let name = Store::series_file_name(Variable::SOLAR, Resolution::QuarterHour);
        assert_eq!(name, "SOLAR_quarterhour.json");

        assert!(
            store
                .notebook_path("data_analysis")
                .ends_with("reports/data_analysis/data_analysis.ipynb")
        );
        assert!(
            store
                .html_path("data_analysis")
                .ends_with("reports/data_analysis/data_analysis.html")
        );
        assert!(
            store
                .markdown_path("data_analysis")
                .ends_with("reports/data_analysis/data_analysis.md")
        );
    }

    #[test]
    fn empty_dir_is_not_present() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("raw_data")).unwrap();
        let store = Store::new_with_paths(root.clone(), Utf8PathBuf::from("/tmp/none"));

        assert!(!store.category_present(Category::Prices));

        fs::create_dir_all(store.category_dir(Category::Prices).as_std_path()).unwrap();
        assert!(!store.category_present(Category::Prices));

        fs::write(
            store.category_dir(Category::Prices).join("x.json").as_std_path(),
            b"{}",
        )
        .unwrap();
        assert!(store.category_present(Category::Prices));
    }
}
