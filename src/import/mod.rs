//! Document parsing
//!
//! Turns one document's text into a [`ParsedDocument`]:
//! - Job designs (`ProcessType`): nodes, contexts, job parameters,
//!   connections, subjobs and routine references
//! - Job properties (`XMI` / `Property`): descriptive attributes and
//!   screenshot entries
//! - Context items (`ContextType`): repository context groups
//!
//! Parsing is a pure projection of the element tree. Missing attributes
//! become `None` and never raise; only malformed XML or an unknown root
//! element is an error.

pub mod job;
pub mod properties;

use thiserror::Error;

use crate::models::ParsedDocument;
use crate::xml::{self, XmlError};

pub use job::JobDocumentParser;
pub use properties::{parse_context_item, parse_properties};

/// Error during document parsing
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Parse error: {0}")]
    ParseError(#[from] XmlError),
    #[error("Unsupported document root element '{0}'")]
    UnsupportedDocument(String),
}

/// Parse a document of any supported kind
pub fn parse_document(content: &str) -> Result<ParsedDocument, ImportError> {
    let root = xml::parse_document(content)?;

    match root.name.as_str() {
        "ProcessType" => Ok(JobDocumentParser::new().parse_root(&root)),
        "XMI" | "Property" => Ok(parse_properties(&root)),
        "ContextType" => Ok(parse_context_item(&root)),
        other => Err(ImportError::UnsupportedDocument(other.to_string())),
    }
}
