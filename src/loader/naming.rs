//! File naming convention and version ordering

use std::cmp::Ordering;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::LoaderError;

/// Identity encoded in a document file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub project_name: String,
    pub job_name: String,
    pub version: String,
}

/// Split `<project>.<job>_<version>.<ext>` into its parts
///
/// The final extension is dropped, the project is everything before the
/// first `.`, and the last `_` separates the job name from the version, so
/// `P1.my_job_0.1.item` gives `(P1, my_job, 0.1)`.
pub fn parse_file_name(path: &Path) -> Result<FileIdentity, LoaderError> {
    let invalid = || LoaderError::InvalidFileName(path.display().to_string());

    let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
    let stem = match file_name.rfind('.') {
        Some(pos) => &file_name[..pos],
        None => file_name,
    };

    let (project, rest) = stem.split_once('.').ok_or_else(invalid)?;
    let (job, version) = rest.rsplit_once('_').ok_or_else(invalid)?;

    if project.is_empty() || job.is_empty() || version.is_empty() {
        return Err(invalid());
    }

    Ok(FileIdentity {
        project_name: project.to_string(),
        job_name: job.to_string(),
        version: version.to_string(),
    })
}

/// How two version strings of the same job are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionOrdering {
    /// Raw string comparison (`"9" > "10"`)
    #[default]
    Lexicographic,
    /// Dot-separated numeric segments (`"10" > "9"`); falls back to string
    /// comparison when a segment is not a number
    Numeric,
}

impl VersionOrdering {
    /// Whether `candidate` supersedes `current`
    pub fn is_newer(&self, candidate: &str, current: &str) -> bool {
        self.compare(candidate, current) == Ordering::Greater
    }

    /// Order two versions of the same job
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            VersionOrdering::Lexicographic => a.cmp(b),
            VersionOrdering::Numeric => match (numeric_segments(a), numeric_segments(b)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => a.cmp(b),
            },
        }
    }
}

fn numeric_segments(version: &str) -> Option<Vec<u64>> {
    version.split('.').map(|s| s.parse().ok()).collect()
}

impl FromStr for VersionOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexicographic" | "string" => Ok(VersionOrdering::Lexicographic),
            "numeric" => Ok(VersionOrdering::Numeric),
            _ => Err(format!(
                "Unknown version ordering: {}. Valid values: lexicographic, numeric",
                s
            )),
        }
    }
}

impl std::fmt::Display for VersionOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionOrdering::Lexicographic => write!(f, "lexicographic"),
            VersionOrdering::Numeric => write!(f, "numeric"),
        }
    }
}
