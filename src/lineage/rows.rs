//! Typed rows read back from the flattened tables
//!
//! Result sets are mapped by column name here, once; the joins only see
//! named fields.

use std::path::PathBuf;

use crate::database::{DatabaseError, QueryResult, Value};

/// Where the aggregation stage reads the flattened tables from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RowSource {
    /// CSV snapshots written by the load stage; they hold only the rows of
    /// the last load, so this suits runs that cover every job
    Snapshots(PathBuf),
    /// The configured `select_*` statements, over every job in the store
    #[default]
    Database,
}

/// Equality key of every lineage join
pub type JoinKey = (String, String, String);

fn key_of(project: &Option<String>, job: &Option<String>, component: &Option<String>) -> Option<JoinKey> {
    Some((project.clone()?, job.clone()?, component.clone()?))
}

/// One row of `inputtable`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputRow {
    pub project: Option<String>,
    pub job: Option<String>,
    pub component_value: Option<String>,
    pub row_name: Option<String>,
    pub name_column_input: Option<String>,
    pub expression_join: Option<String>,
    pub expression_filter_input: Option<String>,
    pub column_type: Option<String>,
}

impl InputRow {
    /// `None` when any part of the key is unresolved
    pub fn key(&self) -> Option<JoinKey> {
        key_of(&self.project, &self.job, &self.component_value)
    }

    /// The search string `<rowName>.<nameColumnInput>`
    pub fn composant(&self) -> Option<String> {
        Some(format!(
            "{}.{}",
            self.row_name.as_deref()?,
            self.name_column_input.as_deref()?
        ))
    }
}

/// One row of `outputtable`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputRow {
    pub project: Option<String>,
    pub job: Option<String>,
    pub component_value: Option<String>,
    pub output_name: Option<String>,
    pub name_column_output: Option<String>,
    pub expression_output: Option<String>,
    pub expression_filter_output: Option<String>,
}

impl OutputRow {
    pub fn key(&self) -> Option<JoinKey> {
        key_of(&self.project, &self.job, &self.component_value)
    }
}

/// One row of `vartable`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarRow {
    pub project: Option<String>,
    pub job: Option<String>,
    pub component_value: Option<String>,
    pub var_table_name: Option<String>,
    pub name_var: Option<String>,
    pub expression_var: Option<String>,
}

impl VarRow {
    pub fn key(&self) -> Option<JoinKey> {
        key_of(&self.project, &self.job, &self.component_value)
    }

    /// How output expressions refer to the variable: `<varTableName>.<nameVar>`
    pub fn reference(&self) -> Option<String> {
        Some(format!(
            "{}.{}",
            self.var_table_name.as_deref()?,
            self.name_var.as_deref()?
        ))
    }
}

/// Column lookup over one result set
struct Columns<'a> {
    result: &'a QueryResult,
    table: &'a str,
}

impl<'a> Columns<'a> {
    fn index(&self, name: &str) -> Result<usize, DatabaseError> {
        self.result.column_index(name).ok_or_else(|| {
            DatabaseError::Query(format!("Result for {} has no column '{}'", self.table, name))
        })
    }
}

/// Text of a cell; NULL and empty strings are `None`
fn cell(row: &[Value], index: usize) -> Option<String> {
    row.get(index)
        .and_then(Value::as_text)
        .filter(|s| !s.is_empty())
}

pub fn input_rows(result: &QueryResult) -> Result<Vec<InputRow>, DatabaseError> {
    let c = Columns {
        result,
        table: "inputtable",
    };
    let idx = [
        c.index("NameProject")?,
        c.index("NameJob")?,
        c.index("componentValue")?,
        c.index("rowName")?,
        c.index("nameColumnInput")?,
        c.index("expressionJoin")?,
        c.index("expressionFilterInput")?,
        c.index("type")?,
    ];

    Ok(result
        .rows
        .iter()
        .map(|row| InputRow {
            project: cell(row, idx[0]),
            job: cell(row, idx[1]),
            component_value: cell(row, idx[2]),
            row_name: cell(row, idx[3]),
            name_column_input: cell(row, idx[4]),
            expression_join: cell(row, idx[5]),
            expression_filter_input: cell(row, idx[6]),
            column_type: cell(row, idx[7]),
        })
        .collect())
}

pub fn output_rows(result: &QueryResult) -> Result<Vec<OutputRow>, DatabaseError> {
    let c = Columns {
        result,
        table: "outputtable",
    };
    let idx = [
        c.index("NameProject")?,
        c.index("NameJob")?,
        c.index("componentValue")?,
        c.index("outputName")?,
        c.index("nameColumnOutput")?,
        c.index("expressionOutput")?,
        c.index("expressionFilterOutput")?,
    ];

    Ok(result
        .rows
        .iter()
        .map(|row| OutputRow {
            project: cell(row, idx[0]),
            job: cell(row, idx[1]),
            component_value: cell(row, idx[2]),
            output_name: cell(row, idx[3]),
            name_column_output: cell(row, idx[4]),
            expression_output: cell(row, idx[5]),
            expression_filter_output: cell(row, idx[6]),
        })
        .collect())
}

pub fn var_rows(result: &QueryResult) -> Result<Vec<VarRow>, DatabaseError> {
    let c = Columns {
        result,
        table: "vartable",
    };
    let idx = [
        c.index("NameProject")?,
        c.index("NameJob")?,
        c.index("componentValue")?,
        c.index("varTableName")?,
        c.index("nameVar")?,
        c.index("expressionVar")?,
    ];

    Ok(result
        .rows
        .iter()
        .map(|row| VarRow {
            project: cell(row, idx[0]),
            job: cell(row, idx[1]),
            component_value: cell(row, idx[2]),
            var_table_name: cell(row, idx[3]),
            name_var: cell(row, idx[4]),
            expression_var: cell(row, idx[5]),
        })
        .collect())
}
