//! Job design parser
//!
//! Walks a `ProcessType` element tree into typed records. Inactive components
//! (`CHECK`/`ACTIVATE` = `false`) are dropped here so no later stage ever sees
//! them.

use crate::models::{
    Column, Component, Connection, Context, ContextParameter, DocumentKind, ElementParameter,
    ElementValue, InputTable, MapperEntry, MetadataBlock, NodeData, OutputTable, ParsedDocument,
    RoutineRef, SubJob, TreeNode, VarTable,
};
use crate::xml::{self, XmlElement};

use super::ImportError;

/// Parser for job design documents
#[derive(Debug, Default)]
pub struct JobDocumentParser;

impl JobDocumentParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse job design text
    pub fn parse(&self, content: &str) -> Result<ParsedDocument, ImportError> {
        let root = xml::parse_document(content)?;
        if root.name != "ProcessType" {
            return Err(ImportError::UnsupportedDocument(root.name));
        }
        Ok(self.parse_root(&root))
    }

    /// Extract every sequence from an already parsed `ProcessType` root
    pub fn parse_root(&self, root: &XmlElement) -> ParsedDocument {
        let mut doc = ParsedDocument {
            kind: DocumentKind::Job,
            ..Default::default()
        };

        for child in &root.children {
            match child.name.as_str() {
                "node" => {
                    let component = parse_component(child);
                    if component.is_deactivated() {
                        tracing::debug!(
                            component = component.component_value.as_deref().unwrap_or("?"),
                            "Skipping deactivated component"
                        );
                        continue;
                    }
                    if component.component_value.is_none() {
                        tracing::warn!(
                            component_name = component.component_name.as_deref().unwrap_or("?"),
                            "Component has no UNIQUE_NAME; its lineage cannot be resolved"
                        );
                    }
                    doc.nodes.push(component);
                }
                "context" => doc.contexts.push(parse_context(child)),
                "parameters" => {
                    for param in &child.children {
                        match param.name.as_str() {
                            "elementParameter" => {
                                doc.parameters.push(parse_element_parameter(param))
                            }
                            "routinesParameter" => doc.routines.push(RoutineRef {
                                id: param.attr_owned("id"),
                                name: param.attr_owned("name"),
                            }),
                            _ => {}
                        }
                    }
                }
                "connection" => doc.connections.push(parse_connection(child)),
                "subjob" => doc.subjobs.push(SubJob {
                    element_parameters: parse_element_parameters(child),
                }),
                _ => {}
            }
        }

        doc
    }
}

fn parse_component(node: &XmlElement) -> Component {
    let element_parameters = parse_element_parameters(node);

    // Resolved once per component; never carried over from a sibling
    let component_value = element_parameters
        .iter()
        .find(|p| p.is_unique_name())
        .and_then(|p| p.value.clone());

    Component {
        component_name: node.attr_owned("componentName"),
        component_version: node.attr_owned("componentVersion"),
        component_value,
        pos_x: node.attr_owned("posX"),
        pos_y: node.attr_owned("posY"),
        offset_label_x: node.attr_owned("offsetLabelX"),
        offset_label_y: node.attr_owned("offsetLabelY"),
        element_parameters,
        metadata: node.children_named("metadata").map(parse_metadata).collect(),
        node_data: node.children_named("nodeData").map(parse_node_data).collect(),
    }
}

fn parse_element_parameters(parent: &XmlElement) -> Vec<ElementParameter> {
    parent
        .children_named("elementParameter")
        .map(parse_element_parameter)
        .collect()
}

pub(crate) fn parse_element_parameter(element: &XmlElement) -> ElementParameter {
    ElementParameter {
        field: element.attr_owned("field"),
        name: element.attr_owned("name"),
        show: element.attr_owned("show"),
        value: element.attr_owned("value"),
        element_values: element
            .children_named("elementValue")
            .map(|v| ElementValue {
                element_ref: v.attr_owned("elementRef"),
                value: v.attr_owned("value"),
            })
            .collect(),
    }
}

fn parse_metadata(element: &XmlElement) -> MetadataBlock {
    MetadataBlock {
        connector: element.attr_owned("connector"),
        label: element.attr_owned("label"),
        name: element.attr_owned("name"),
        columns: element
            .children_named("column")
            .map(|c| Column {
                comment: c.attr_owned("comment"),
                key: c.attr_owned("key"),
                length: c.attr_owned("length"),
                name: c.attr_owned("name"),
                nullable: c.attr_owned("nullable"),
                pattern: c.attr_owned("pattern"),
                precision: c.attr_owned("precision"),
                source_type: c.attr_owned("sourceType"),
                column_type: c.attr_owned("type"),
                useful_column: c.attr_owned("usefulColumn"),
                original_length: c.attr_owned("originalLength"),
                default_value: c.attr_owned("defaultValue"),
            })
            .collect(),
    }
}

fn parse_node_data(element: &XmlElement) -> NodeData {
    let mut data = NodeData::default();

    for child in &element.children {
        match child.name.as_str() {
            "inputTables" => data.input_tables.push(InputTable {
                entries: parse_entries(child),
                ..parse_input_header(child)
            }),
            "inputTrees" => data.input_tables.push(InputTable {
                tree: parse_tree_nodes(child, "nodes"),
                ..parse_input_header(child)
            }),
            "outputTables" => data.output_tables.push(OutputTable {
                entries: parse_entries(child),
                ..parse_output_header(child)
            }),
            "outputTrees" => data.output_tables.push(OutputTable {
                tree: parse_tree_nodes(child, "nodes"),
                ..parse_output_header(child)
            }),
            "varTables" if data.var_table.is_none() => {
                data.var_table = Some(VarTable {
                    name: child.attr_owned("name"),
                    size_state: child.attr_owned("sizeState"),
                    entries: parse_entries(child),
                });
            }
            _ => {}
        }
    }

    data
}

fn parse_input_header(element: &XmlElement) -> InputTable {
    InputTable {
        name: element.attr_owned("name"),
        lookup_mode: element.attr_owned("lookupMode"),
        matching_mode: element.attr_owned("matchingMode"),
        size_state: element.attr_owned("sizeState"),
        activate_expression_filter: element.attr_owned("activateExpressionFilter"),
        expression_filter: element.attr_owned("expressionFilter"),
        inner_join: element.attr_owned("innerJoin"),
        persistent: element.attr_owned("persistent"),
        entries: Vec::new(),
        tree: Vec::new(),
    }
}

fn parse_output_header(element: &XmlElement) -> OutputTable {
    OutputTable {
        name: element.attr_owned("name"),
        size_state: element.attr_owned("sizeState"),
        activate_condensed_tool: element.attr_owned("activateCondensedTool"),
        reject: element.attr_owned("reject"),
        reject_inner_join: element.attr_owned("rejectInnerJoin"),
        activate_expression_filter: element.attr_owned("activateExpressionFilter"),
        expression_filter: element.attr_owned("expressionFilter"),
        entries: Vec::new(),
        tree: Vec::new(),
    }
}

fn parse_entries(element: &XmlElement) -> Vec<MapperEntry> {
    element
        .children_named("mapperTableEntries")
        .map(|e| MapperEntry {
            name: e.attr_owned("name"),
            expression: e.attr_owned("expression"),
            entry_type: e.attr_owned("type"),
            nullable: e.attr_owned("nullable"),
            operator: e.attr_owned("operator"),
        })
        .collect()
}

/// Parse `<nodes>` (top level) or `<children>` (nested) recursively
fn parse_tree_nodes(element: &XmlElement, tag: &str) -> Vec<TreeNode> {
    element
        .children_named(tag)
        .map(|n| TreeNode {
            name: n.attr_owned("name"),
            expression: n.attr_owned("expression"),
            node_type: n.attr_owned("type"),
            xpath: n.attr_owned("xpath"),
            nullable: n.attr_owned("nullable"),
            children: parse_tree_nodes(n, "children"),
        })
        .collect()
}

fn parse_connection(element: &XmlElement) -> Connection {
    Connection {
        connector_name: element.attr_owned("connectorName"),
        label: element.attr_owned("label"),
        line_style: element.attr_owned("lineStyle"),
        source: element.attr_owned("source"),
        target: element.attr_owned("target"),
        output_id: element.attr_owned("outputId"),
        element_parameters: parse_element_parameters(element),
    }
}

pub(crate) fn parse_context(element: &XmlElement) -> Context {
    Context {
        name: element.attr_owned("name"),
        confirmation_needed: element.attr_owned("confirmationNeeded"),
        parameters: element
            .children_named("contextParameter")
            .map(|p| ContextParameter {
                comment: p.attr_owned("comment"),
                name: p.attr_owned("name"),
                prompt: p.attr_owned("prompt"),
                prompt_needed: p.attr_owned("promptNeeded"),
                parameter_type: p.attr_owned("type"),
                value: p.attr_owned("value"),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<talendfile:ProcessType xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:talendfile="platform:/resource/org.talend.model/model/TalendFile.xsd" defaultContext="Default">
  <context confirmationNeeded="false" name="Default">
    <contextParameter comment="" name="db_host" prompt="db_host?" promptNeeded="false" type="id_String" value="localhost"/>
  </context>
  <parameters>
    <elementParameter field="TEXT" name="JOB_RUN_VM_ARGUMENTS" value=" -Xms256M"/>
    <routinesParameter id="_abc" name="DataOperation"/>
  </parameters>
  <node componentName="tFileInputDelimited" componentVersion="0.102" offsetLabelX="0" offsetLabelY="0" posX="96" posY="128">
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tFileInputDelimited_1"/>
    <elementParameter field="TABLE" name="TRIMSELECT" show="false">
      <elementValue elementRef="SCHEMA_COLUMN" value="id"/>
      <elementValue elementRef="TRIM" value="false"/>
    </elementParameter>
    <metadata connector="FLOW" label="tFileInputDelimited_1" name="tFileInputDelimited_1">
      <column comment="" key="true" length="10" name="id" nullable="false" pattern="" precision="0" sourceType="" type="id_Integer" usefulColumn="true"/>
    </metadata>
  </node>
  <node componentName="tMap" componentVersion="2.1" offsetLabelX="0" offsetLabelY="0" posX="320" posY="128">
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tMap_1"/>
    <nodeData xsi:type="MapperData">
      <varTables sizeState="INTERMEDIATE" name="Var">
        <mapperTableEntries name="double_id" expression="row1.id * 2" type="id_Integer"/>
      </varTables>
      <outputTables sizeState="INTERMEDIATE" name="out1" activateExpressionFilter="true" expressionFilter="row1.id &gt; 0" activateCondensedTool="true">
        <mapperTableEntries name="id_out" expression="row1.id" type="id_Integer" nullable="true"/>
      </outputTables>
      <inputTables sizeState="INTERMEDIATE" name="row1" matchingMode="UNIQUE_MATCH" lookupMode="LOAD_ONCE">
        <mapperTableEntries name="id" type="id_Integer" nullable="true"/>
      </inputTables>
    </nodeData>
  </node>
  <node componentName="tLogRow" componentVersion="0.101" posX="512" posY="128">
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tLogRow_1"/>
    <elementParameter field="CHECK" name="ACTIVATE" value="false"/>
  </node>
  <connection connectorName="FLOW" label="row1" lineStyle="0" metaname="tFileInputDelimited_1" offsetLabelX="0" offsetLabelY="0" source="tFileInputDelimited_1" target="tMap_1">
    <elementParameter field="CHECK" name="MONITOR_CONNECTION" value="false"/>
  </connection>
  <subjob>
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tFileInputDelimited_1"/>
    <elementParameter field="COLOR" name="SUBJOB_TITLE_COLOR" value="160;190;240"/>
  </subjob>
</talendfile:ProcessType>"#;

    #[test]
    fn test_parse_job_sequences() {
        let doc = JobDocumentParser::new().parse(JOB).unwrap();

        assert_eq!(doc.kind, DocumentKind::Job);
        assert_eq!(doc.contexts.len(), 1);
        assert_eq!(doc.contexts[0].parameters[0].value.as_deref(), Some("localhost"));
        assert_eq!(doc.parameters.len(), 1);
        assert_eq!(doc.routines[0].name.as_deref(), Some("DataOperation"));
        assert_eq!(doc.connections.len(), 1);
        assert_eq!(doc.connections[0].target.as_deref(), Some("tMap_1"));
        assert_eq!(doc.subjobs.len(), 1);
    }

    #[test]
    fn test_deactivated_component_is_skipped() {
        let doc = JobDocumentParser::new().parse(JOB).unwrap();

        let names: Vec<_> = doc
            .nodes
            .iter()
            .filter_map(|n| n.component_value.as_deref())
            .collect();
        assert_eq!(names, vec!["tFileInputDelimited_1", "tMap_1"]);
    }

    #[test]
    fn test_element_values_and_metadata() {
        let doc = JobDocumentParser::new().parse(JOB).unwrap();
        let input = &doc.nodes[0];

        let trim = input.parameter("TRIMSELECT").unwrap();
        assert_eq!(trim.show.as_deref(), Some("false"));
        assert_eq!(trim.element_values.len(), 2);

        let column = &input.metadata[0].columns[0];
        assert_eq!(column.name.as_deref(), Some("id"));
        // Flags stay literal strings at this stage
        assert_eq!(column.key.as_deref(), Some("true"));
        assert_eq!(column.nullable.as_deref(), Some("false"));
        assert_eq!(column.original_length, None);
    }

    #[test]
    fn test_mapper_tables() {
        let doc = JobDocumentParser::new().parse(JOB).unwrap();
        let data = &doc.nodes[1].node_data[0];

        assert_eq!(data.input_tables[0].name.as_deref(), Some("row1"));
        assert_eq!(data.input_tables[0].entries[0].expression, None);

        let out = &data.output_tables[0];
        assert_eq!(out.expression_filter.as_deref(), Some("row1.id > 0"));
        assert_eq!(out.entries[0].expression.as_deref(), Some("row1.id"));

        let vars = data.var_table.as_ref().unwrap();
        assert_eq!(vars.entries[0].name.as_deref(), Some("double_id"));
    }

    #[test]
    fn test_component_value_not_inherited() {
        let doc = JobDocumentParser::new()
            .parse(
                r#"<ProcessType>
  <node componentName="tMap"><elementParameter field="TEXT" name="UNIQUE_NAME" value="tMap_1"/></node>
  <node componentName="tJava"><elementParameter field="TEXT" name="LABEL" value="x"/></node>
</ProcessType>"#,
            )
            .unwrap();

        assert_eq!(doc.nodes[0].component_value.as_deref(), Some("tMap_1"));
        assert_eq!(doc.nodes[1].component_value, None);
    }

    #[test]
    fn test_tree_schemas_are_nested() {
        let doc = JobDocumentParser::new()
            .parse(
                r#"<ProcessType>
  <node componentName="tXMLMap">
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tXMLMap_1"/>
    <nodeData>
      <inputTrees name="row1" lookupMode="LOAD_ONCE">
        <nodes name="body" type="id_Document" xpath="row1/body">
          <children name="root" xpath="row1/body:/root">
            <children name="id" type="id_String" xpath="row1/body:/root/id"/>
          </children>
        </nodes>
      </inputTrees>
      <outputTrees name="out1">
        <nodes name="id" expression="[row1.body:/root/id]" type="id_String"/>
      </outputTrees>
    </nodeData>
  </node>
</ProcessType>"#,
            )
            .unwrap();

        let data = &doc.nodes[0].node_data[0];
        let tree = &data.input_tables[0].tree;
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children[0].children[0].name.as_deref(), Some("id"));
        assert_eq!(data.input_tables[0].lookup_mode.as_deref(), Some("LOAD_ONCE"));
        assert_eq!(data.output_tables[0].tree[0].expression.as_deref(), Some("[row1.body:/root/id]"));
    }

    #[test]
    fn test_missing_attributes_do_not_fail() {
        let doc = JobDocumentParser::new()
            .parse("<ProcessType><node><metadata><column/></metadata></node><connection/></ProcessType>")
            .unwrap();

        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].component_name, None);
        assert_eq!(doc.nodes[0].metadata[0].columns[0], Column::default());
        assert_eq!(doc.connections[0], Connection::default());
    }
}
