//! Flattened table definitions
//!
//! Column order here is the contract shared by the insert statements, the
//! CSV snapshots and the lineage stage's read-back.

use crate::database::{ColumnDef, Row};
use crate::models::{DocumentKind, ParsedFile};

use super::flatten;

/// Turns one parsed file into rows of a table
pub type Flattener = fn(&ParsedFile, &str) -> Vec<Row>;

/// A target table of the load stage
#[derive(Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    /// Document kinds whose (project, job) keys this table is replaced for
    pub sources: &'static [DocumentKind],
    pub flatten: Flattener,
}

impl TableSpec {
    /// Configuration key of the insert statement (`[queries]` section)
    pub fn insert_query_key(&self) -> String {
        insert_query_key(self.name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn accepts(&self, kind: DocumentKind) -> bool {
        self.sources.contains(&kind)
    }
}

impl std::fmt::Debug for TableSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSpec")
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .field("sources", &self.sources)
            .finish()
    }
}

pub fn insert_query_key(table: &str) -> String {
    format!("insert_{}", table)
}

/// `INSERT INTO "<table>" ("c1", ...) VALUES (?, ...)`
pub fn default_insert_sql(table: &str, columns: &[ColumnDef]) -> String {
    let names = columns
        .iter()
        .map(|c| crate::database::quote_ident(c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        crate::database::quote_ident(table),
        names,
        placeholders
    )
}

const JOB: &[DocumentKind] = &[DocumentKind::Job];

pub const NODE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentName"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("componentVersion"),
    ColumnDef::text("posX"),
    ColumnDef::text("posY"),
    ColumnDef::text("offsetLabelX"),
    ColumnDef::text("offsetLabelY"),
    ColumnDef::text("executionDate"),
];

pub const ELEMENTNODE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentName"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("field"),
    ColumnDef::text("name"),
    ColumnDef::integer("show"),
    ColumnDef::text("value"),
    ColumnDef::text("elementRef"),
    ColumnDef::text("elementValue"),
    ColumnDef::text("executionDate"),
];

pub const METADATA_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentName"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("connector"),
    ColumnDef::text("label"),
    ColumnDef::text("metadataName"),
    ColumnDef::text("comment"),
    ColumnDef::integer("key"),
    ColumnDef::text("length"),
    ColumnDef::text("columnName"),
    ColumnDef::integer("nullable"),
    ColumnDef::text("pattern"),
    ColumnDef::text("precision"),
    ColumnDef::text("sourceType"),
    ColumnDef::text("type"),
    ColumnDef::integer("usefulColumn"),
    ColumnDef::text("originalLength"),
    ColumnDef::text("defaultValue"),
    ColumnDef::text("executionDate"),
];

pub const INPUTTABLE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentName"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("rowName"),
    ColumnDef::text("lookupMode"),
    ColumnDef::text("matchingMode"),
    ColumnDef::text("sizeState"),
    ColumnDef::integer("activateExpressionFilter"),
    ColumnDef::text("expressionFilterInput"),
    ColumnDef::integer("innerJoin"),
    ColumnDef::integer("persistent"),
    ColumnDef::text("nameColumnInput"),
    ColumnDef::text("expressionJoin"),
    ColumnDef::text("type"),
    ColumnDef::integer("nullable"),
    ColumnDef::text("operator"),
    ColumnDef::text("executionDate"),
];

pub const OUTPUTTABLE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentName"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("outputName"),
    ColumnDef::text("sizeState"),
    ColumnDef::integer("activateCondensedTool"),
    ColumnDef::integer("reject"),
    ColumnDef::integer("rejectInnerJoin"),
    ColumnDef::integer("activateExpressionFilter"),
    ColumnDef::text("expressionFilterOutput"),
    ColumnDef::text("nameColumnOutput"),
    ColumnDef::text("expressionOutput"),
    ColumnDef::text("type"),
    ColumnDef::integer("nullable"),
    ColumnDef::text("executionDate"),
];

pub const VARTABLE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentName"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("varTableName"),
    ColumnDef::text("sizeState"),
    ColumnDef::text("nameVar"),
    ColumnDef::text("expressionVar"),
    ColumnDef::text("type"),
    ColumnDef::text("executionDate"),
];

pub const CONNECTION_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("connectorName"),
    ColumnDef::text("label"),
    ColumnDef::text("lineStyle"),
    ColumnDef::text("source"),
    ColumnDef::text("target"),
    ColumnDef::text("outputId"),
    ColumnDef::text("field"),
    ColumnDef::text("name"),
    ColumnDef::text("value"),
    ColumnDef::text("executionDate"),
];

pub const CONTEXTJOB_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("contextName"),
    ColumnDef::integer("confirmationNeeded"),
    ColumnDef::text("parameterName"),
    ColumnDef::text("prompt"),
    ColumnDef::integer("promptNeeded"),
    ColumnDef::text("type"),
    ColumnDef::text("value"),
    ColumnDef::text("comment"),
    ColumnDef::text("executionDate"),
];

pub const LIBRARY_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentName"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("libraryName"),
    ColumnDef::text("executionDate"),
];

pub const ROUTINES_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("routineId"),
    ColumnDef::text("routineName"),
    ColumnDef::text("executionDate"),
];

pub const JOBLETS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentName"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("processName"),
    ColumnDef::text("processVersion"),
    ColumnDef::text("processContext"),
    ColumnDef::text("executionDate"),
];

pub const SUBJOBS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("subjobName"),
    ColumnDef::text("field"),
    ColumnDef::text("name"),
    ColumnDef::text("value"),
    ColumnDef::text("executionDate"),
];

pub const DOCJOBS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("version"),
    ColumnDef::text("label"),
    ColumnDef::text("purpose"),
    ColumnDef::text("description"),
    ColumnDef::text("author"),
    ColumnDef::text("creationDate"),
    ColumnDef::text("modificationDate"),
    ColumnDef::text("statusCode"),
    ColumnDef::integer("screenshots"),
    ColumnDef::text("executionDate"),
];

pub const JOBSERVER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("field"),
    ColumnDef::text("name"),
    ColumnDef::text("value"),
    ColumnDef::text("executionDate"),
];

/// Every table written by the load stage, in load order
pub const FLATTENED_TABLES: &[TableSpec] = &[
    TableSpec {
        name: "elementnode",
        columns: ELEMENTNODE_COLUMNS,
        sources: JOB,
        flatten: flatten::element_parameters,
    },
    TableSpec {
        name: "node",
        columns: NODE_COLUMNS,
        sources: JOB,
        flatten: flatten::nodes,
    },
    TableSpec {
        name: "vartable",
        columns: VARTABLE_COLUMNS,
        sources: JOB,
        flatten: flatten::var_tables,
    },
    TableSpec {
        name: "inputtable",
        columns: INPUTTABLE_COLUMNS,
        sources: JOB,
        flatten: flatten::input_tables,
    },
    TableSpec {
        name: "outputtable",
        columns: OUTPUTTABLE_COLUMNS,
        sources: JOB,
        flatten: flatten::output_tables,
    },
    TableSpec {
        name: "connectioncomponent",
        columns: CONNECTION_COLUMNS,
        sources: JOB,
        flatten: flatten::connections,
    },
    TableSpec {
        name: "contextjob",
        columns: CONTEXTJOB_COLUMNS,
        sources: &[DocumentKind::Job, DocumentKind::ContextItem],
        flatten: flatten::contexts,
    },
    TableSpec {
        name: "metadata",
        columns: METADATA_COLUMNS,
        sources: JOB,
        flatten: flatten::metadata,
    },
    TableSpec {
        name: "library",
        columns: LIBRARY_COLUMNS,
        sources: JOB,
        flatten: flatten::libraries,
    },
    TableSpec {
        name: "routines",
        columns: ROUTINES_COLUMNS,
        sources: JOB,
        flatten: flatten::routines,
    },
    TableSpec {
        name: "joblets",
        columns: JOBLETS_COLUMNS,
        sources: JOB,
        flatten: flatten::joblets,
    },
    TableSpec {
        name: "subjobs",
        columns: SUBJOBS_COLUMNS,
        sources: JOB,
        flatten: flatten::subjobs,
    },
    TableSpec {
        name: "docjobs",
        columns: DOCJOBS_COLUMNS,
        sources: &[DocumentKind::Properties],
        flatten: flatten::doc_jobs,
    },
    TableSpec {
        name: "jobserverproperties",
        columns: JOBSERVER_COLUMNS,
        sources: JOB,
        flatten: flatten::job_server_properties,
    },
];

/// Look up a flattened table by name
pub fn table(name: &str) -> Option<&'static TableSpec> {
    FLATTENED_TABLES.iter().find(|t| t.name == name)
}
