//! Derived lineage table definitions

use crate::database::ColumnDef;
use crate::load::tables::insert_query_key;

/// A derived table; its physical name is `<lineage_prefix>_<name>`
#[derive(Debug, Clone, Copy)]
pub struct LineageSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl LineageSpec {
    pub fn insert_query_key(&self) -> String {
        insert_query_key(self.name)
    }
}

pub const INPUT_OUTPUT: &str = "tmapinputinoutput";
pub const INPUT_FILTER_OUTPUT: &str = "tmapinputinfilteroutput";
pub const INPUT_JOIN_INPUT: &str = "tmapinputinjoininput";
pub const INPUT_FILTER_INPUT: &str = "tmapinputinfilterinput";
pub const INPUT_VAR: &str = "tmapinputinvar";
pub const VAR_OUTPUT: &str = "tmapvarinoutput";
pub const VAR_FILTER: &str = "tmapvarinfilter";
pub const COLUMN_UNUSED: &str = "tmapcolumunused";

/// Select statements used when reading back from the store, and the
/// flattened table each one reads
pub const SELECT_QUERY_KEYS: &[(&str, &str)] = &[
    ("select_inputtable", "inputtable"),
    ("select_outputtable", "outputtable"),
    ("select_vartable", "vartable"),
];

pub const INPUT_OUTPUT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("rowName"),
    ColumnDef::text("nameColumnInput"),
    ColumnDef::text("composant"),
    ColumnDef::text("outputName"),
    ColumnDef::text("nameColumnOutput"),
    ColumnDef::text("expressionOutput"),
    ColumnDef::text("executionDate"),
];

pub const INPUT_FILTER_OUTPUT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("rowName"),
    ColumnDef::text("nameColumnInput"),
    ColumnDef::text("composant"),
    ColumnDef::text("outputName"),
    ColumnDef::text("expressionFilterOutput"),
    ColumnDef::text("executionDate"),
];

pub const INPUT_JOIN_INPUT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("rowName"),
    ColumnDef::text("nameColumnInput"),
    ColumnDef::text("composant"),
    ColumnDef::text("lookupRowName"),
    ColumnDef::text("lookupColumnName"),
    ColumnDef::text("expressionJoin"),
    ColumnDef::text("executionDate"),
];

pub const INPUT_FILTER_INPUT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("rowName"),
    ColumnDef::text("nameColumnInput"),
    ColumnDef::text("composant"),
    ColumnDef::text("filterRowName"),
    ColumnDef::text("expressionFilterInput"),
    ColumnDef::text("executionDate"),
];

pub const INPUT_VAR_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("rowName"),
    ColumnDef::text("nameColumnInput"),
    ColumnDef::text("composant"),
    ColumnDef::text("varTableName"),
    ColumnDef::text("nameVar"),
    ColumnDef::text("expressionVar"),
    ColumnDef::text("executionDate"),
];

pub const VAR_OUTPUT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("varTableName"),
    ColumnDef::text("nameVar"),
    ColumnDef::text("expressionVar"),
    ColumnDef::text("rowName"),
    ColumnDef::text("nameColumnInput"),
    ColumnDef::text("composant"),
    ColumnDef::text("outputName"),
    ColumnDef::text("nameColumnOutput"),
    ColumnDef::text("expressionOutput"),
    ColumnDef::text("executionDate"),
];

pub const VAR_FILTER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("varTableName"),
    ColumnDef::text("nameVar"),
    ColumnDef::text("expressionVar"),
    ColumnDef::text("outputName"),
    ColumnDef::text("expressionFilterOutput"),
    ColumnDef::text("executionDate"),
];

pub const COLUMN_UNUSED_COLUMNS: &[ColumnDef] = &[
    ColumnDef::text("NameProject"),
    ColumnDef::text("NameJob"),
    ColumnDef::text("componentValue"),
    ColumnDef::text("rowName"),
    ColumnDef::text("nameColumnInput"),
    ColumnDef::text("composant"),
    ColumnDef::text("type"),
    ColumnDef::text("executionDate"),
];

/// Every derived table, in write order
pub const LINEAGE_TABLES: &[LineageSpec] = &[
    LineageSpec {
        name: INPUT_OUTPUT,
        columns: INPUT_OUTPUT_COLUMNS,
    },
    LineageSpec {
        name: INPUT_FILTER_OUTPUT,
        columns: INPUT_FILTER_OUTPUT_COLUMNS,
    },
    LineageSpec {
        name: INPUT_JOIN_INPUT,
        columns: INPUT_JOIN_INPUT_COLUMNS,
    },
    LineageSpec {
        name: INPUT_FILTER_INPUT,
        columns: INPUT_FILTER_INPUT_COLUMNS,
    },
    LineageSpec {
        name: INPUT_VAR,
        columns: INPUT_VAR_COLUMNS,
    },
    LineageSpec {
        name: VAR_OUTPUT,
        columns: VAR_OUTPUT_COLUMNS,
    },
    LineageSpec {
        name: VAR_FILTER,
        columns: VAR_FILTER_COLUMNS,
    },
    LineageSpec {
        name: COLUMN_UNUSED,
        columns: COLUMN_UNUSED_COLUMNS,
    },
];

pub fn lineage_table(name: &str) -> Option<&'static LineageSpec> {
    LINEAGE_TABLES.iter().find(|t| t.name == name)
}
