//! Column lineage joins
//!
//! Every join pairs rows that share (NameProject, NameJob, componentValue)
//! and keeps the pair when a search string occurs verbatim in an expression
//! of the other side. The search string of an input column is its
//! `composant`, `<rowName>.<nameColumnInput>`; a variable is searched as
//! `<varTableName>.<nameVar>`. Rows with an unresolved key or search string
//! take part in no join.
//!
//! Output follows the nested loop order: driving rows in read order, then
//! candidates of the same key in read order.

use std::collections::{HashMap, HashSet};

use crate::database::{Row, Value};

use super::rows::{InputRow, JoinKey, OutputRow, VarRow};
use super::tables;

/// Replace line breaks with a single space; empty text is `None`
pub fn normalize_expression(expression: Option<&str>) -> Option<String> {
    let expression = expression.filter(|e| !e.is_empty())?;
    Some(expression.replace("\r\n", " ").replace(['\n', '\r'], " "))
}

/// Substring containment; `None` and empty expressions never match
pub fn matches(expression: Option<&str>, search: &str) -> bool {
    match expression {
        Some(e) if !e.is_empty() => e.contains(search),
        _ => false,
    }
}

/// (rowName, composant, project, job) of an input column that feeds something
type UsageKey = (String, String, String, String);

/// Rows of every derived table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineageTables {
    pub input_output: Vec<Row>,
    pub input_filter_output: Vec<Row>,
    pub input_join_input: Vec<Row>,
    pub input_filter_input: Vec<Row>,
    pub input_var: Vec<Row>,
    pub var_output: Vec<Row>,
    pub var_filter: Vec<Row>,
    pub column_unused: Vec<Row>,
}

impl LineageTables {
    /// Rows of a derived table by its unprefixed name
    pub fn rows(&self, name: &str) -> &[Row] {
        match name {
            tables::INPUT_OUTPUT => &self.input_output,
            tables::INPUT_FILTER_OUTPUT => &self.input_filter_output,
            tables::INPUT_JOIN_INPUT => &self.input_join_input,
            tables::INPUT_FILTER_INPUT => &self.input_filter_input,
            tables::INPUT_VAR => &self.input_var,
            tables::VAR_OUTPUT => &self.var_output,
            tables::VAR_FILTER => &self.var_filter,
            tables::COLUMN_UNUSED => &self.column_unused,
            _ => &[],
        }
    }
}

fn text(value: &Option<String>) -> Value {
    Value::text(value.as_deref())
}

fn group_by_key<'a, T>(rows: &'a [T], key: fn(&T) -> Option<JoinKey>) -> HashMap<JoinKey, Vec<&'a T>> {
    let mut groups: HashMap<JoinKey, Vec<&T>> = HashMap::new();
    for row in rows {
        if let Some(k) = key(row) {
            groups.entry(k).or_default().push(row);
        }
    }
    groups
}

/// An input column with its resolved key and search string
struct Source<'a> {
    row: &'a InputRow,
    key: JoinKey,
    composant: String,
}

impl Source<'_> {
    /// NameProject, NameJob, componentValue, rowName, nameColumnInput, composant
    fn cells(&self) -> Vec<Value> {
        vec![
            Value::from(self.key.0.as_str()),
            Value::from(self.key.1.as_str()),
            Value::from(self.key.2.as_str()),
            text(&self.row.row_name),
            text(&self.row.name_column_input),
            Value::from(self.composant.as_str()),
        ]
    }

    fn usage(&self) -> UsageKey {
        (
            self.row.row_name.clone().unwrap_or_default(),
            self.composant.clone(),
            self.key.0.clone(),
            self.key.1.clone(),
        )
    }
}

/// A variable with its resolved key and reference string
struct Variable<'a> {
    row: &'a VarRow,
    key: JoinKey,
    reference: String,
}

impl Variable<'_> {
    /// NameProject, NameJob, componentValue, varTableName, nameVar, expressionVar
    fn cells(&self) -> Vec<Value> {
        vec![
            Value::from(self.key.0.as_str()),
            Value::from(self.key.1.as_str()),
            Value::from(self.key.2.as_str()),
            text(&self.row.var_table_name),
            text(&self.row.name_var),
            Value::text(normalize_expression(self.row.expression_var.as_deref()).as_deref()),
        ]
    }
}

/// Joins flattened input, output and variable rows into the derived tables
pub struct LineageAggregator<'a> {
    inputs: &'a [InputRow],
    vars: &'a [VarRow],
    outputs_by_key: HashMap<JoinKey, Vec<&'a OutputRow>>,
    inputs_by_key: HashMap<JoinKey, Vec<&'a InputRow>>,
    vars_by_key: HashMap<JoinKey, Vec<&'a VarRow>>,
    execution_date: Value,
}

impl<'a> LineageAggregator<'a> {
    pub fn new(
        inputs: &'a [InputRow],
        outputs: &'a [OutputRow],
        vars: &'a [VarRow],
        execution_date: &str,
    ) -> Self {
        Self {
            inputs,
            vars,
            outputs_by_key: group_by_key(outputs, OutputRow::key),
            inputs_by_key: group_by_key(inputs, InputRow::key),
            vars_by_key: group_by_key(vars, VarRow::key),
            execution_date: Value::from(execution_date),
        }
    }

    /// Compute every derived table in one pass each
    pub fn aggregate(&self) -> LineageTables {
        let mut used: HashSet<UsageKey> = HashSet::new();

        let input_output = self.input_output(&mut used);
        let input_filter_output = self.input_filter_output(&mut used);
        let input_join_input = self.input_join_input(&mut used);
        let input_filter_input = self.input_filter_input();
        let (input_var, feeds) = self.input_var(&mut used);
        let var_output = self.var_output(&feeds);
        let var_filter = self.var_filter();
        let column_unused = self.column_unused(&used);

        LineageTables {
            input_output,
            input_filter_output,
            input_join_input,
            input_filter_input,
            input_var,
            var_output,
            var_filter,
            column_unused,
        }
    }

    fn sources(&self) -> impl Iterator<Item = Source<'a>> + '_ {
        self.inputs.iter().filter_map(|row| {
            Some(Source {
                row,
                key: row.key()?,
                composant: row.composant()?,
            })
        })
    }

    fn variables(&self) -> impl Iterator<Item = Variable<'a>> + '_ {
        self.vars.iter().filter_map(|row| {
            Some(Variable {
                row,
                key: row.key()?,
                reference: row.reference()?,
            })
        })
    }

    fn finish(&self, mut cells: Vec<Value>) -> Row {
        cells.push(self.execution_date.clone());
        cells
    }

    fn outputs(&self, key: &JoinKey) -> &[&'a OutputRow] {
        self.outputs_by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn input_output(&self, used: &mut HashSet<UsageKey>) -> Vec<Row> {
        let mut rows = Vec::new();
        for source in self.sources() {
            for output in self.outputs(&source.key) {
                if !matches(output.expression_output.as_deref(), &source.composant) {
                    continue;
                }
                let mut cells = source.cells();
                cells.extend([
                    text(&output.output_name),
                    text(&output.name_column_output),
                    Value::text(normalize_expression(output.expression_output.as_deref()).as_deref()),
                ]);
                rows.push(self.finish(cells));
                used.insert(source.usage());
            }
        }
        rows
    }

    /// First match per (job, project, composant, componentValue) wins
    fn input_filter_output(&self, used: &mut HashSet<UsageKey>) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut seen: HashSet<(String, String, String, String)> = HashSet::new();

        for source in self.sources() {
            for output in self.outputs(&source.key) {
                if !matches(output.expression_filter_output.as_deref(), &source.composant) {
                    continue;
                }
                let dedup = (
                    source.key.1.clone(),
                    source.key.0.clone(),
                    source.composant.clone(),
                    source.key.2.clone(),
                );
                if !seen.insert(dedup) {
                    continue;
                }
                let mut cells = source.cells();
                cells.extend([
                    text(&output.output_name),
                    Value::text(
                        normalize_expression(output.expression_filter_output.as_deref()).as_deref(),
                    ),
                ]);
                rows.push(self.finish(cells));
                used.insert(source.usage());
            }
        }
        rows
    }

    fn input_join_input(&self, used: &mut HashSet<UsageKey>) -> Vec<Row> {
        let mut rows = Vec::new();
        for source in self.sources() {
            let Some(candidates) = self.inputs_by_key.get(&source.key) else {
                continue;
            };
            for lookup in candidates {
                if !matches(lookup.expression_join.as_deref(), &source.composant) {
                    continue;
                }
                let mut cells = source.cells();
                cells.extend([
                    text(&lookup.row_name),
                    text(&lookup.name_column_input),
                    Value::text(normalize_expression(lookup.expression_join.as_deref()).as_deref()),
                ]);
                rows.push(self.finish(cells));
                used.insert(source.usage());
            }
        }
        rows
    }

    /// The filter expression repeats on every column of its input table, so
    /// one row is kept per (key, composant, filtering rowName)
    fn input_filter_input(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut seen: HashSet<(JoinKey, String, Option<String>)> = HashSet::new();

        for source in self.sources() {
            let Some(candidates) = self.inputs_by_key.get(&source.key) else {
                continue;
            };
            for filtering in candidates {
                if !matches(filtering.expression_filter_input.as_deref(), &source.composant) {
                    continue;
                }
                let dedup = (
                    source.key.clone(),
                    source.composant.clone(),
                    filtering.row_name.clone(),
                );
                if !seen.insert(dedup) {
                    continue;
                }
                let mut cells = source.cells();
                cells.extend([
                    text(&filtering.row_name),
                    Value::text(
                        normalize_expression(filtering.expression_filter_input.as_deref()).as_deref(),
                    ),
                ]);
                rows.push(self.finish(cells));
            }
        }
        rows
    }

    /// Also returns, per variable, the input columns feeding it
    fn input_var(
        &self,
        used: &mut HashSet<UsageKey>,
    ) -> (Vec<Row>, HashMap<(JoinKey, String), Vec<Source<'a>>>) {
        let mut rows = Vec::new();
        let mut feeds: HashMap<(JoinKey, String), Vec<Source<'a>>> = HashMap::new();

        for source in self.sources() {
            let Some(candidates) = self.vars_by_key.get(&source.key) else {
                continue;
            };
            for var in candidates {
                if !matches(var.expression_var.as_deref(), &source.composant) {
                    continue;
                }
                let mut cells = source.cells();
                cells.extend([
                    text(&var.var_table_name),
                    text(&var.name_var),
                    Value::text(normalize_expression(var.expression_var.as_deref()).as_deref()),
                ]);
                rows.push(self.finish(cells));
                used.insert(source.usage());

                if let Some(reference) = var.reference() {
                    feeds
                        .entry((source.key.clone(), reference))
                        .or_default()
                        .push(Source {
                            row: source.row,
                            key: source.key.clone(),
                            composant: source.composant.clone(),
                        });
                }
            }
        }
        (rows, feeds)
    }

    /// Variable used by an output expression, once per feeding input column
    /// or once with empty input columns when nothing feeds it
    fn var_output(&self, feeds: &HashMap<(JoinKey, String), Vec<Source<'a>>>) -> Vec<Row> {
        let mut rows = Vec::new();
        for variable in self.variables() {
            for output in self.outputs(&variable.key) {
                if !matches(output.expression_output.as_deref(), &variable.reference) {
                    continue;
                }
                let output_cells = [
                    text(&output.output_name),
                    text(&output.name_column_output),
                    Value::text(normalize_expression(output.expression_output.as_deref()).as_deref()),
                ];

                let inputs = feeds
                    .get(&(variable.key.clone(), variable.reference.clone()))
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);

                if inputs.is_empty() {
                    let mut cells = variable.cells();
                    cells.extend([Value::Null, Value::Null, Value::Null]);
                    cells.extend(output_cells);
                    rows.push(self.finish(cells));
                    continue;
                }
                for input in inputs {
                    let mut cells = variable.cells();
                    cells.extend([
                        text(&input.row.row_name),
                        text(&input.row.name_column_input),
                        Value::from(input.composant.as_str()),
                    ]);
                    cells.extend(output_cells.iter().cloned());
                    rows.push(self.finish(cells));
                }
            }
        }
        rows
    }

    /// One row per (key, variable, outputName)
    fn var_filter(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut seen: HashSet<(JoinKey, String, Option<String>)> = HashSet::new();

        for variable in self.variables() {
            for output in self.outputs(&variable.key) {
                if !matches(output.expression_filter_output.as_deref(), &variable.reference) {
                    continue;
                }
                let dedup = (
                    variable.key.clone(),
                    variable.reference.clone(),
                    output.output_name.clone(),
                );
                if !seen.insert(dedup) {
                    continue;
                }
                let mut cells = variable.cells();
                cells.extend([
                    text(&output.output_name),
                    Value::text(
                        normalize_expression(output.expression_filter_output.as_deref()).as_deref(),
                    ),
                ]);
                rows.push(self.finish(cells));
            }
        }
        rows
    }

    /// Input columns absent from every downstream usage set, once each
    fn column_unused(&self, used: &HashSet<UsageKey>) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut emitted: HashSet<UsageKey> = HashSet::new();

        for source in self.sources() {
            let usage = source.usage();
            if used.contains(&usage) || !emitted.insert(usage) {
                continue;
            }
            let mut cells = source.cells();
            cells.push(text(&source.row.column_type));
            rows.push(self.finish(cells));
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: &str = "2024-05-01";

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn input(row: &str, column: &str) -> InputRow {
        InputRow {
            project: s("P1"),
            job: s("J1"),
            component_value: s("tMap_1"),
            row_name: s(row),
            name_column_input: s(column),
            column_type: s("id_String"),
            ..Default::default()
        }
    }

    fn output(name: &str, column: &str, expression: Option<&str>, filter: Option<&str>) -> OutputRow {
        OutputRow {
            project: s("P1"),
            job: s("J1"),
            component_value: s("tMap_1"),
            output_name: s(name),
            name_column_output: s(column),
            expression_output: expression.map(str::to_string),
            expression_filter_output: filter.map(str::to_string),
        }
    }

    fn var(name: &str, expression: &str) -> VarRow {
        VarRow {
            project: s("P1"),
            job: s("J1"),
            component_value: s("tMap_1"),
            var_table_name: s("Var"),
            name_var: s(name),
            expression_var: s(expression),
        }
    }

    fn column<'a>(table: &str, row: &'a Row, name: &str) -> &'a Value {
        let spec = tables::lineage_table(table).unwrap();
        &row[spec.columns.iter().position(|c| c.name == name).unwrap()]
    }

    fn aggregate(inputs: &[InputRow], outputs: &[OutputRow], vars: &[VarRow]) -> LineageTables {
        LineageAggregator::new(inputs, outputs, vars, DATE).aggregate()
    }

    #[test]
    fn test_normalize_expression() {
        assert_eq!(
            normalize_expression(Some("a\r\nb\nc\rd")).as_deref(),
            Some("a b c d")
        );
        assert!(normalize_expression(Some("")).is_none());
        assert!(normalize_expression(None).is_none());
    }

    #[test]
    fn test_matches() {
        assert!(matches(Some("foo R.C bar"), "R.C"));
        assert!(!matches(Some("foo RC bar"), "R.C"));
        assert!(!matches(Some(""), "R.C"));
        assert!(!matches(None, "R.C"));
    }

    #[test]
    fn test_filter_output_substring() {
        let inputs = [input("R", "C")];
        let hit = aggregate(&inputs, &[output("out", "x", None, Some("foo R.C bar"))], &[]);
        assert_eq!(hit.input_filter_output.len(), 1);

        let miss = aggregate(&inputs, &[output("out", "x", None, Some("foo RC bar"))], &[]);
        assert!(miss.input_filter_output.is_empty());
    }

    #[test]
    fn test_filter_output_dedup() {
        let inputs = [input("R", "C")];
        let outputs = [
            output("out1", "x", None, Some("R.C > 0")),
            output("out2", "y", None, Some("R.C != null")),
        ];
        let tables = aggregate(&inputs, &outputs, &[]);
        assert_eq!(tables.input_filter_output.len(), 1);
        assert_eq!(
            column(tables::INPUT_FILTER_OUTPUT, &tables.input_filter_output[0], "outputName"),
            &Value::from("out1")
        );
    }

    #[test]
    fn test_input_output_and_normalization() {
        let inputs = [input("row1", "id")];
        let outputs = [output("out", "id_out", Some("row1.id\n+ 1"), None)];
        let tables = aggregate(&inputs, &outputs, &[]);

        assert_eq!(tables.input_output.len(), 1);
        let row = &tables.input_output[0];
        assert_eq!(column(tables::INPUT_OUTPUT, row, "composant"), &Value::from("row1.id"));
        assert_eq!(column(tables::INPUT_OUTPUT, row, "expressionOutput"), &Value::from("row1.id + 1"));
        assert_eq!(row.last(), Some(&Value::from(DATE)));
        assert!(tables.input_filter_output.is_empty());
        assert!(tables.column_unused.is_empty());
    }

    #[test]
    fn test_join_key_must_match() {
        let inputs = [input("row1", "id")];
        let mut other_job = output("out", "id_out", Some("row1.id"), None);
        other_job.job = s("J2");
        let mut other_component = output("out", "id_out", Some("row1.id"), None);
        other_component.component_value = s("tMap_2");

        let tables = aggregate(&inputs, &[other_job, other_component], &[]);
        assert!(tables.input_output.is_empty());
        assert_eq!(tables.column_unused.len(), 1);
    }

    #[test]
    fn test_unresolved_component_never_joins() {
        let mut unresolved = input("row1", "id");
        unresolved.component_value = None;
        let mut orphan_output = output("out", "id_out", Some("row1.id"), None);
        orphan_output.component_value = None;

        let tables = aggregate(&[unresolved], &[orphan_output], &[]);
        assert_eq!(tables, LineageTables::default());
    }

    #[test]
    fn test_join_and_filter_inputs() {
        let main = input("row1", "id");
        let mut lookup = input("row2", "customer_id");
        lookup.expression_join = s("row1.id");
        lookup.expression_filter_input = s("row1.id > 10");
        let mut lookup_name = input("row2", "name");
        lookup_name.expression_filter_input = s("row1.id > 10");

        let tables = aggregate(&[main, lookup, lookup_name], &[], &[]);

        assert_eq!(tables.input_join_input.len(), 1);
        let join = &tables.input_join_input[0];
        assert_eq!(column(tables::INPUT_JOIN_INPUT, join, "lookupRowName"), &Value::from("row2"));
        assert_eq!(
            column(tables::INPUT_JOIN_INPUT, join, "lookupColumnName"),
            &Value::from("customer_id")
        );

        // The repeated filter expression of row2 yields a single row
        assert_eq!(tables.input_filter_input.len(), 1);

        // Only row1.id is used downstream
        let unused: Vec<_> = tables
            .column_unused
            .iter()
            .map(|r| column(tables::COLUMN_UNUSED, r, "composant").clone())
            .collect();
        assert_eq!(unused, vec![Value::from("row2.customer_id"), Value::from("row2.name")]);
    }

    #[test]
    fn test_variables() {
        let inputs = [input("row1", "amount"), input("row1", "rate")];
        let vars = [var("total", "row1.amount * row1.rate"), var("constant", "42")];
        let outputs = [
            output("out", "total_out", Some("Var.total"), Some("Var.total > 0")),
            output("out", "fixed", Some("Var.constant"), None),
        ];
        let tables = aggregate(&inputs, &outputs, &vars);

        assert_eq!(tables.input_var.len(), 2);

        // Two feeding inputs for Var.total, one empty-input row for Var.constant
        assert_eq!(tables.var_output.len(), 3);
        let constant = &tables.var_output[2];
        assert_eq!(column(tables::VAR_OUTPUT, constant, "nameVar"), &Value::from("constant"));
        assert_eq!(column(tables::VAR_OUTPUT, constant, "rowName"), &Value::Null);
        assert_eq!(
            column(tables::VAR_OUTPUT, &tables.var_output[0], "composant"),
            &Value::from("row1.amount")
        );

        assert_eq!(tables.var_filter.len(), 1);
        assert!(tables.column_unused.is_empty());
    }

    #[test]
    fn test_unused_is_reported_once() {
        let inputs = [input("row1", "id"), input("row1", "id"), input("row1", "name")];
        let outputs = [output("out", "name", Some("row1.name"), None)];
        let tables = aggregate(&inputs, &outputs, &[]);

        assert_eq!(tables.column_unused.len(), 1);
        assert_eq!(
            column(tables::COLUMN_UNUSED, &tables.column_unused[0], "type"),
            &Value::from("id_String")
        );
    }

    #[test]
    fn test_rows_match_column_arity() {
        let main = input("row1", "id");
        let mut lookup = input("row2", "id");
        lookup.expression_join = s("row1.id");
        lookup.expression_filter_input = s("row1.id");
        let tables = aggregate(
            &[main, lookup],
            &[output("out", "a", Some("row1.id Var.v"), Some("row1.id Var.v"))],
            &[var("v", "row1.id")],
        );

        for spec in tables::LINEAGE_TABLES {
            let rows = tables.rows(spec.name);
            assert!(!rows.is_empty(), "{}", spec.name);
            for row in rows {
                assert_eq!(row.len(), spec.columns.len(), "{}", spec.name);
            }
        }
    }
}
