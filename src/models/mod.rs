//! In-memory records produced by the document parser
//!
//! Every record is a plain projection of one XML element kind. Attribute
//! values are kept as the literal strings found in the document; absent
//! attributes are `None`. Normalization (booleans to `0/1`, key columns)
//! happens only when rows are flattened for loading.

pub mod component;
pub mod document;
pub mod mapper;

pub use component::{
    Column, Component, Connection, Context, ContextParameter, ElementParameter, ElementValue,
    MetadataBlock, RoutineRef, SubJob,
};
pub use document::{DocumentKind, JobProperties, ParsedDocument, ParsedFile, Screenshot};
pub use mapper::{InputTable, MapperEntry, NodeData, OutputTable, TreeNode, VarTable};
