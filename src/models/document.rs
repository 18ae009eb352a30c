//! Document-level records

use serde::{Deserialize, Serialize};

use super::component::{Component, Connection, Context, ElementParameter, RoutineRef, SubJob};

/// Which kind of document a file held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A job design (`ProcessType`)
    #[default]
    Job,
    /// Job properties (`XMI` / `Property`)
    Properties,
    /// A repository context group (`ContextType`)
    ContextItem,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Job => write!(f, "job"),
            DocumentKind::Properties => write!(f, "properties"),
            DocumentKind::ContextItem => write!(f, "context"),
        }
    }
}

/// Everything extracted from one document
///
/// Sequences are extracted independently; a document of one kind leaves the
/// other kind's fields empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    pub kind: DocumentKind,
    pub nodes: Vec<Component>,
    pub contexts: Vec<Context>,
    /// Job-level `<parameters>` element parameters
    pub parameters: Vec<ElementParameter>,
    pub routines: Vec<RoutineRef>,
    pub connections: Vec<Connection>,
    pub subjobs: Vec<SubJob>,
    pub properties: Option<JobProperties>,
    pub screenshots: Vec<Screenshot>,
}

/// Descriptive properties of a job (`TalendProperties:Property`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProperties {
    pub id: Option<String>,
    pub label: Option<String>,
    pub version: Option<String>,
    pub purpose: Option<String>,
    pub description: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub author: Option<String>,
    pub status_code: Option<String>,
    pub additional: Vec<(String, String)>,
}

/// A screenshot entry; only its key and encoded size are kept
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub key: Option<String>,
    pub encoded_len: usize,
}

/// The unit produced by the file batch loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFile {
    pub project_name: String,
    pub job_name: String,
    pub version: String,
    pub document: ParsedDocument,
}

impl ParsedFile {
    /// The (project, job) key used for delete-before-insert and lineage joins
    pub fn key(&self) -> (&str, &str) {
        (&self.project_name, &self.job_name)
    }
}
