//! Nested records to flat rows
//!
//! Each function unrolls the nested loops of one table, emitting one row per
//! innermost record with every ancestor field repeated on it. Rows always
//! start with (NameProject, NameJob) and end with the execution date.

use crate::database::{Row, Value};
use crate::models::{Component, ElementParameter, ParsedFile};

const LIBRARY_PARAM: &str = "LIBRARY";
const JAR_NAME_REF: &str = "JAR_NAME";
const PROCESS_PARAM: &str = "PROCESS:PROCESS_TYPE_PROCESS";
const PROCESS_VERSION_PARAM: &str = "PROCESS:PROCESS_TYPE_VERSION";
const PROCESS_CONTEXT_PARAM: &str = "PROCESS:PROCESS_TYPE_CONTEXT";

/// Boolean attribute to 0/1: only the literal `"true"` is true
pub fn flag(value: Option<&str>) -> Value {
    Value::Integer(i64::from(value == Some("true")))
}

fn text(value: &Option<String>) -> Value {
    Value::text(value.as_deref())
}

fn keyed(file: &ParsedFile, mut cells: Vec<Value>, execution_date: &str) -> Row {
    let mut row = Vec::with_capacity(cells.len() + 3);
    row.push(Value::from(file.project_name.as_str()));
    row.push(Value::from(file.job_name.as_str()));
    row.append(&mut cells);
    row.push(Value::from(execution_date));
    row
}

fn component_cells(component: &Component) -> [Value; 2] {
    [
        text(&component.component_name),
        text(&component.component_value),
    ]
}

/// Strip surrounding double quotes from a designer string literal
fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"')
}

pub fn nodes(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    file.document
        .nodes
        .iter()
        .map(|c| {
            keyed(
                file,
                vec![
                    text(&c.component_name),
                    text(&c.component_value),
                    text(&c.component_version),
                    text(&c.pos_x),
                    text(&c.pos_y),
                    text(&c.offset_label_x),
                    text(&c.offset_label_y),
                ],
                execution_date,
            )
        })
        .collect()
}

pub fn element_parameters(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for component in &file.document.nodes {
        for param in &component.element_parameters {
            let head = [
                component_cells(component).to_vec(),
                vec![
                    text(&param.field),
                    text(&param.name),
                    flag(param.show.as_deref()),
                    text(&param.value),
                ],
            ]
            .concat();

            if param.element_values.is_empty() {
                let mut cells = head;
                cells.extend([Value::Null, Value::Null]);
                rows.push(keyed(file, cells, execution_date));
                continue;
            }
            for element_value in &param.element_values {
                let mut cells = head.clone();
                cells.push(text(&element_value.element_ref));
                cells.push(text(&element_value.value));
                rows.push(keyed(file, cells, execution_date));
            }
        }
    }
    rows
}

pub fn metadata(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for component in &file.document.nodes {
        for block in &component.metadata {
            for column in &block.columns {
                let mut cells = component_cells(component).to_vec();
                cells.extend([
                    text(&block.connector),
                    text(&block.label),
                    text(&block.name),
                    text(&column.comment),
                    flag(column.key.as_deref()),
                    text(&column.length),
                    text(&column.name),
                    flag(column.nullable.as_deref()),
                    text(&column.pattern),
                    text(&column.precision),
                    text(&column.source_type),
                    text(&column.column_type),
                    flag(column.useful_column.as_deref()),
                    text(&column.original_length),
                    text(&column.default_value),
                ]);
                rows.push(keyed(file, cells, execution_date));
            }
        }
    }
    rows
}

pub fn input_tables(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for component in &file.document.nodes {
        for data in &component.node_data {
            for input in &data.input_tables {
                for entry in input.all_entries() {
                    let mut cells = component_cells(component).to_vec();
                    cells.extend([
                        text(&input.name),
                        text(&input.lookup_mode),
                        text(&input.matching_mode),
                        text(&input.size_state),
                        flag(input.activate_expression_filter.as_deref()),
                        text(&input.expression_filter),
                        flag(input.inner_join.as_deref()),
                        flag(input.persistent.as_deref()),
                        text(&entry.name),
                        text(&entry.expression),
                        text(&entry.entry_type),
                        flag(entry.nullable.as_deref()),
                        text(&entry.operator),
                    ]);
                    rows.push(keyed(file, cells, execution_date));
                }
            }
        }
    }
    rows
}

pub fn output_tables(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for component in &file.document.nodes {
        for data in &component.node_data {
            for output in &data.output_tables {
                for entry in output.all_entries() {
                    let mut cells = component_cells(component).to_vec();
                    cells.extend([
                        text(&output.name),
                        text(&output.size_state),
                        flag(output.activate_condensed_tool.as_deref()),
                        flag(output.reject.as_deref()),
                        flag(output.reject_inner_join.as_deref()),
                        flag(output.activate_expression_filter.as_deref()),
                        text(&output.expression_filter),
                        text(&entry.name),
                        text(&entry.expression),
                        text(&entry.entry_type),
                        flag(entry.nullable.as_deref()),
                    ]);
                    rows.push(keyed(file, cells, execution_date));
                }
            }
        }
    }
    rows
}

pub fn var_tables(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for component in &file.document.nodes {
        for data in &component.node_data {
            let Some(vars) = &data.var_table else {
                continue;
            };
            for entry in &vars.entries {
                let mut cells = component_cells(component).to_vec();
                cells.extend([
                    text(&vars.name),
                    text(&vars.size_state),
                    text(&entry.name),
                    text(&entry.expression),
                    text(&entry.entry_type),
                ]);
                rows.push(keyed(file, cells, execution_date));
            }
        }
    }
    rows
}

pub fn connections(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for connection in &file.document.connections {
        let head = vec![
            text(&connection.connector_name),
            text(&connection.label),
            text(&connection.line_style),
            text(&connection.source),
            text(&connection.target),
            text(&connection.output_id),
        ];

        if connection.element_parameters.is_empty() {
            let mut cells = head;
            cells.extend([Value::Null, Value::Null, Value::Null]);
            rows.push(keyed(file, cells, execution_date));
            continue;
        }
        for param in &connection.element_parameters {
            let mut cells = head.clone();
            cells.extend(parameter_cells(param));
            rows.push(keyed(file, cells, execution_date));
        }
    }
    rows
}

fn parameter_cells(param: &ElementParameter) -> [Value; 3] {
    [text(&param.field), text(&param.name), text(&param.value)]
}

pub fn contexts(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for context in &file.document.contexts {
        for param in &context.parameters {
            rows.push(keyed(
                file,
                vec![
                    text(&context.name),
                    flag(context.confirmation_needed.as_deref()),
                    text(&param.name),
                    text(&param.prompt),
                    flag(param.prompt_needed.as_deref()),
                    text(&param.parameter_type),
                    text(&param.value),
                    text(&param.comment),
                ],
                execution_date,
            ));
        }
    }
    rows
}

/// Libraries loaded by components: `LIBRARY` parameters and `LIBRARY` /
/// `JAR_NAME` entries of table parameters
pub fn libraries(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for component in &file.document.nodes {
        let mut push = |name: &str| {
            let name = unquote(name);
            if name.is_empty() {
                return;
            }
            let mut cells = component_cells(component).to_vec();
            cells.push(Value::from(name));
            rows.push(keyed(file, cells, execution_date));
        };

        for param in &component.element_parameters {
            if param.name.as_deref() == Some(LIBRARY_PARAM) {
                if let Some(value) = param.value.as_deref() {
                    push(value);
                }
            }
            for element_value in &param.element_values {
                let is_library = matches!(
                    element_value.element_ref.as_deref(),
                    Some(LIBRARY_PARAM) | Some(JAR_NAME_REF)
                );
                if let (true, Some(value)) = (is_library, element_value.value.as_deref()) {
                    push(value);
                }
            }
        }
    }
    rows
}

pub fn routines(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    file.document
        .routines
        .iter()
        .map(|r| keyed(file, vec![text(&r.id), text(&r.name)], execution_date))
        .collect()
}

/// Child jobs started by a component (tRunJob and joblet references)
pub fn joblets(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for component in &file.document.nodes {
        let Some(process) = component.parameter(PROCESS_PARAM) else {
            continue;
        };
        let value_of = |name: &str| {
            component
                .parameter(name)
                .and_then(|p| p.value.as_deref())
                .map(unquote)
        };

        let mut cells = component_cells(component).to_vec();
        cells.extend([
            Value::text(process.value.as_deref().map(unquote)),
            Value::text(value_of(PROCESS_VERSION_PARAM)),
            Value::text(value_of(PROCESS_CONTEXT_PARAM)),
        ]);
        rows.push(keyed(file, cells, execution_date));
    }
    rows
}

pub fn subjobs(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    for subjob in &file.document.subjobs {
        let name = Value::text(subjob.unique_name());
        for param in &subjob.element_parameters {
            let mut cells = vec![name.clone()];
            cells.extend(parameter_cells(param));
            rows.push(keyed(file, cells, execution_date));
        }
    }
    rows
}

pub fn doc_jobs(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    let Some(props) = &file.document.properties else {
        return Vec::new();
    };
    vec![keyed(
        file,
        vec![
            Value::from(file.version.as_str()),
            text(&props.label),
            text(&props.purpose),
            text(&props.description),
            text(&props.author),
            text(&props.creation_date),
            text(&props.modification_date),
            text(&props.status_code),
            Value::Integer(file.document.screenshots.len() as i64),
        ],
        execution_date,
    )]
}

pub fn job_server_properties(file: &ParsedFile, execution_date: &str) -> Vec<Row> {
    file.document
        .parameters
        .iter()
        .map(|p| keyed(file, parameter_cells(p).to_vec(), execution_date))
        .collect()
}
