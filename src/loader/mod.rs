//! File batch loader
//!
//! Discovers documents under a directory and keeps, for each (project, job),
//! the highest version that parses. Files with names outside
//! the convention and files that fail to parse are logged and skipped; the
//! batch continues.

pub mod naming;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::import::parse_document;
use crate::models::{ParsedDocument, ParsedFile};

pub use naming::{FileIdentity, VersionOrdering, parse_file_name};

/// Errors raised by the loader
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Name does not follow `<project>.<job>_<version>.<ext>`
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// The source directory could not be read
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// The discovery pattern was rejected
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

impl LoaderError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            LoaderError::DirectoryNotFound(path) => format!(
                "Directory not found: {}\n\nHint: Check [paths] jobs_dir in the configuration.",
                path.display()
            ),
            LoaderError::InvalidFileName(name) => format!(
                "File name '{name}' does not follow <project>.<job>_<version>.<extension>"
            ),
            LoaderError::InvalidPattern(msg) => format!("Invalid file pattern: {msg}"),
        }
    }
}

/// Statistics from a loader run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderStats {
    /// Files matching the extension
    pub files_discovered: usize,
    /// Files parsed successfully
    pub files_parsed: usize,
    /// Files skipped for an invalid name
    pub files_skipped: usize,
    /// Files that failed to read or parse
    pub files_failed: usize,
    /// Older versions dropped in favour of a newer one
    pub files_superseded: usize,
    /// Failure descriptions (limited to first 100)
    pub errors: Vec<String>,
    #[serde(skip)]
    pub duration: Duration,
}

impl LoaderStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_error(&mut self, error: String) {
        if self.errors.len() < 100 {
            self.errors.push(error);
        }
    }

    /// Fold another run into this one
    pub fn merge(&mut self, other: LoaderStats) {
        self.files_discovered += other.files_discovered;
        self.files_parsed += other.files_parsed;
        self.files_skipped += other.files_skipped;
        self.files_failed += other.files_failed;
        self.files_superseded += other.files_superseded;
        self.duration += other.duration;
        for error in other.errors {
            self.add_error(error);
        }
    }
}

/// Parsed files of one directory, plus what happened to the rest
#[derive(Debug, Clone, Default)]
pub struct LoadedBatch {
    /// Sorted by (project, job)
    pub files: Vec<ParsedFile>,
    pub stats: LoaderStats,
}

/// Loads the latest version of every document under a directory
#[derive(Debug, Clone)]
pub struct FileBatchLoader {
    extension: String,
    ordering: VersionOrdering,
}

impl FileBatchLoader {
    /// Loader for files ending in `.<extension>`
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
            ordering: VersionOrdering::default(),
        }
    }

    pub fn with_ordering(mut self, ordering: VersionOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Discover, select and parse the documents under `dir`
    ///
    /// The newest version of each (project, job) that parses is kept; a
    /// version that cannot be read or parsed falls back to the next one.
    /// An empty directory yields an empty batch.
    pub fn load(&self, dir: &Path) -> Result<LoadedBatch, LoaderError> {
        let start = Instant::now();
        let mut stats = LoaderStats::new();

        let paths = self.discover(dir)?;
        stats.files_discovered = paths.len();

        let mut files = Vec::new();
        for candidates in self.group_versions(paths, &mut stats) {
            let mut remaining = candidates.len();
            for (identity, path) in candidates {
                remaining -= 1;
                let Some(document) = self.read_document(&path, &mut stats) else {
                    continue;
                };
                stats.files_parsed += 1;
                if remaining > 0 {
                    tracing::debug!(
                        path = %path.display(),
                        older = remaining,
                        "Older versions superseded"
                    );
                }
                stats.files_superseded += remaining;
                files.push(ParsedFile {
                    project_name: identity.project_name,
                    job_name: identity.job_name,
                    version: identity.version,
                    document,
                });
                break;
            }
        }

        files.sort_by(|a, b| a.key().cmp(&b.key()));
        stats.duration = start.elapsed();

        tracing::info!(
            dir = %dir.display(),
            extension = %self.extension,
            discovered = stats.files_discovered,
            parsed = stats.files_parsed,
            superseded = stats.files_superseded,
            failed = stats.files_failed,
            "Loaded documents"
        );

        Ok(LoadedBatch { files, stats })
    }

    fn read_document(&self, path: &Path, stats: &mut LoaderStats) -> Option<ParsedDocument> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read file");
                stats.files_failed += 1;
                stats.add_error(format!("{}: {}", path.display(), e));
                return None;
            }
        };

        match parse_document(&content) {
            Ok(document) => {
                tracing::debug!(
                    path = %path.display(),
                    kind = %document.kind,
                    nodes = document.nodes.len(),
                    "Parsed document"
                );
                Some(document)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unparseable file");
                stats.files_failed += 1;
                stats.add_error(format!("{}: {}", path.display(), e));
                None
            }
        }
    }

    fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
        if !dir.is_dir() {
            return Err(LoaderError::DirectoryNotFound(dir.to_path_buf()));
        }

        let pattern = format!("{}/**/*.{}", dir.display(), self.extension);
        let entries =
            glob::glob(&pattern).map_err(|e| LoaderError::InvalidPattern(format!("{}: {}", pattern, e)))?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("Error accessing path: {}", e),
            }
        }

        // Sort by path so ties resolve the same way on every platform
        paths.sort();
        Ok(paths)
    }

    /// Group paths by (project, job), newest version first
    fn group_versions(
        &self,
        paths: Vec<PathBuf>,
        stats: &mut LoaderStats,
    ) -> Vec<Vec<(FileIdentity, PathBuf)>> {
        let mut groups: HashMap<(String, String), Vec<(FileIdentity, PathBuf)>> = HashMap::new();

        for path in paths {
            match parse_file_name(&path) {
                Ok(identity) => {
                    let key = (identity.project_name.clone(), identity.job_name.clone());
                    groups.entry(key).or_default().push((identity, path));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping file");
                    stats.files_skipped += 1;
                    stats.add_error(e.to_string());
                }
            }
        }

        // Stable sort keeps path order between equal versions
        groups
            .into_values()
            .map(|mut group| {
                group.sort_by(|a, b| self.ordering.compare(&b.0.version, &a.0.version));
                group
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentKind;
    use tempfile::TempDir;

    const JOB: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<talendfile:ProcessType xmlns:talendfile="platform:/resource/org.talend.model/model/TalendFile.xsd">
  <node componentName="tRowGenerator" componentVersion="0.102" posX="64" posY="96">
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tRowGenerator_1"/>
  </node>
</talendfile:ProcessType>"#;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_latest_version_wins() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "P1.jobA_0.1.item", JOB);
        write(temp.path(), "P1.jobA_0.2.item", JOB);
        write(temp.path(), "P1.jobB_0.1.item", JOB);

        let batch = FileBatchLoader::new("item").load(temp.path()).unwrap();

        let versions: Vec<_> = batch
            .files
            .iter()
            .map(|f| (f.job_name.as_str(), f.version.as_str()))
            .collect();
        assert_eq!(versions, vec![("jobA", "0.2"), ("jobB", "0.1")]);
        assert_eq!(batch.stats.files_discovered, 3);
        assert_eq!(batch.stats.files_superseded, 1);
        assert_eq!(batch.stats.files_parsed, 2);
    }

    #[test]
    fn test_same_job_in_two_projects_is_kept_twice() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "P1.job_0.1.item", JOB);
        write(temp.path(), "P2.job_0.1.item", JOB);

        let batch = FileBatchLoader::new("item").load(temp.path()).unwrap();
        assert_eq!(batch.files.len(), 2);
        assert_eq!(batch.files[0].project_name, "P1");
        assert_eq!(batch.files[1].project_name, "P2");
    }

    #[test]
    fn test_numeric_ordering_variant() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "P1.job_9.item", JOB);
        write(temp.path(), "P1.job_10.item", JOB);

        let lexicographic = FileBatchLoader::new("item").load(temp.path()).unwrap();
        assert_eq!(lexicographic.files[0].version, "9");

        let numeric = FileBatchLoader::new("item")
            .with_ordering(VersionOrdering::Numeric)
            .load(temp.path())
            .unwrap();
        assert_eq!(numeric.files[0].version, "10");
    }

    #[test]
    fn test_bad_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "P1.good_0.1.item", JOB);
        write(temp.path(), "P1.broken_0.1.item", "<talendfile:ProcessType><node>");
        write(temp.path(), "no-convention.item", JOB);
        write(temp.path(), "P1.other_0.1.txt", JOB);

        let batch = FileBatchLoader::new("item").load(temp.path()).unwrap();
        assert_eq!(batch.files.len(), 1);
        assert_eq!(batch.files[0].job_name, "good");
        assert_eq!(batch.files[0].document.kind, DocumentKind::Job);
        assert_eq!(batch.stats.files_discovered, 3);
        assert_eq!(batch.stats.files_failed, 1);
        assert_eq!(batch.stats.files_skipped, 1);
    }

    #[test]
    fn test_corrupt_latest_falls_back_to_previous_version() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "P1.jobA_0.1.item", JOB);
        write(temp.path(), "P1.jobA_0.2.item", "<talendfile:ProcessType><node>");
        write(temp.path(), "P1.jobB_0.1.item", JOB);
        write(temp.path(), "P1.jobB_0.2.item", JOB);
        write(temp.path(), "P1.jobB_0.3.item", "<Workspace/>");

        let batch = FileBatchLoader::new("item").load(temp.path()).unwrap();

        let versions: Vec<_> = batch
            .files
            .iter()
            .map(|f| (f.job_name.as_str(), f.version.as_str()))
            .collect();
        assert_eq!(versions, vec![("jobA", "0.1"), ("jobB", "0.2")]);
        assert_eq!(batch.stats.files_failed, 2);
        assert_eq!(batch.stats.files_parsed, 2);
        assert_eq!(batch.stats.files_superseded, 1);
    }

    #[test]
    fn test_recursive_discovery() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("process").join("sub");
        fs::create_dir_all(&nested).unwrap();
        write(&nested, "P1.deep_0.1.item", JOB);

        let batch = FileBatchLoader::new(".item").load(temp.path()).unwrap();
        assert_eq!(batch.files.len(), 1);
    }

    #[test]
    fn test_empty_and_missing_directories() {
        let temp = TempDir::new().unwrap();
        let batch = FileBatchLoader::new("item").load(temp.path()).unwrap();
        assert!(batch.files.is_empty());

        let result = FileBatchLoader::new("item").load(&temp.path().join("missing"));
        assert!(matches!(result, Err(LoaderError::DirectoryNotFound(_))));
    }
}
