//! Document parsing tests

use job_audit::import::{ImportError, JobDocumentParser, parse_document};
use job_audit::models::DocumentKind;

const JOB: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<talendfile:ProcessType xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:talendfile="platform:/resource/org.talend.model/model/TalendFile.xsd" defaultContext="Default" jobType="Standard">
  <context confirmationNeeded="false" name="Default">
    <contextParameter comment="" name="input_dir" prompt="input_dir?" promptNeeded="false" type="id_Directory" value="/data/in"/>
    <contextParameter comment="" name="batch" prompt="batch?" promptNeeded="false" type="id_Integer" value="500"/>
  </context>
  <context confirmationNeeded="true" name="Prod">
    <contextParameter name="input_dir" type="id_Directory" value="/prod/in"/>
  </context>
  <parameters>
    <elementParameter field="TEXT" name="JOB_RUN_VM_ARGUMENTS" value=" -Xmx1024M"/>
    <elementParameter field="CHECK" name="MULTI_THREAD_EXECATION" value="false"/>
    <routinesParameter id="_r1" name="DataOperation"/>
    <routinesParameter id="_r2" name="StringHandling"/>
  </parameters>
  <node componentName="tFileInputDelimited" componentVersion="0.102" offsetLabelX="0" offsetLabelY="0" posX="96" posY="128">
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tFileInputDelimited_1"/>
    <elementParameter field="FILE" name="FILENAME" value="context.input_dir + &quot;/customers.csv&quot;"/>
    <metadata connector="FLOW" label="customers" name="tFileInputDelimited_1">
      <column key="true" length="10" name="id" nullable="false" type="id_Integer"/>
      <column key="false" length="64" name="name" nullable="true" type="id_String"/>
    </metadata>
  </node>
  <node componentName="tXMLMap" componentVersion="0.1" posX="320" posY="128">
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tXMLMap_1"/>
    <nodeData>
      <inputTrees name="row1" lookupMode="LOAD_ONCE" matchingMode="ALL_ROWS">
        <nodes name="doc" type="id_Document" xpath="row1/doc">
          <children name="customer" xpath="row1/doc:/customer">
            <children name="id" type="id_Integer" xpath="row1/doc:/customer/id"/>
            <children name="name" type="id_String" xpath="row1/doc:/customer/name"/>
          </children>
        </nodes>
      </inputTrees>
      <outputTrees name="out1" expressionFilter="[row1.doc:/customer/id] &gt; 0" activateExpressionFilter="true">
        <nodes name="customer_id" expression="[row1.doc:/customer/id]" type="id_Integer"/>
      </outputTrees>
    </nodeData>
  </node>
  <node componentName="tLogRow" componentVersion="0.101" posX="512" posY="128">
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tLogRow_1"/>
    <elementParameter field="CHECK" name="ACTIVATE" value="false"/>
  </node>
  <node componentName="tWarn" componentVersion="0.101" posX="512" posY="256">
    <elementParameter field="CHECK" name="ACTIVATE" value="true"/>
  </node>
  <connection connectorName="FLOW" label="row1" lineStyle="0" metaname="tFileInputDelimited_1" source="tFileInputDelimited_1" target="tXMLMap_1">
    <elementParameter field="CHECK" name="MONITOR_CONNECTION" value="false"/>
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="row1"/>
  </connection>
  <subjob>
    <elementParameter field="TEXT" name="UNIQUE_NAME" value="tFileInputDelimited_1"/>
    <elementParameter field="COLOR" name="SUBJOB_TITLE_COLOR" value="160;190;240"/>
  </subjob>
</talendfile:ProcessType>"#;

#[test]
fn test_job_document_sequences() {
    let doc = parse_document(JOB).unwrap();
    assert_eq!(doc.kind, DocumentKind::Job);

    assert_eq!(doc.contexts.len(), 2);
    assert_eq!(doc.contexts[0].parameters.len(), 2);
    assert_eq!(doc.contexts[1].confirmation_needed.as_deref(), Some("true"));

    assert_eq!(doc.parameters.len(), 2);
    assert_eq!(doc.routines.len(), 2);
    assert_eq!(doc.routines[1].name.as_deref(), Some("StringHandling"));

    assert_eq!(doc.connections.len(), 1);
    assert_eq!(doc.connections[0].element_parameters.len(), 2);
    assert_eq!(doc.connections[0].target.as_deref(), Some("tXMLMap_1"));

    assert_eq!(doc.subjobs.len(), 1);
    assert_eq!(doc.subjobs[0].element_parameters.len(), 2);
}

#[test]
fn test_deactivated_component_is_dropped() {
    let doc = JobDocumentParser::new().parse(JOB).unwrap();

    let names: Vec<_> = doc
        .nodes
        .iter()
        .map(|n| n.component_name.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(names, vec!["tFileInputDelimited", "tXMLMap", "tWarn"]);

    // Explicitly active and unnamed: kept, with no inherited name
    assert_eq!(doc.nodes[2].component_value, None);
}

#[test]
fn test_component_details() {
    let doc = parse_document(JOB).unwrap();
    let input = &doc.nodes[0];

    assert_eq!(input.component_value.as_deref(), Some("tFileInputDelimited_1"));
    assert_eq!(input.pos_x.as_deref(), Some("96"));
    assert_eq!(
        input.parameter("FILENAME").and_then(|p| p.value.as_deref()),
        Some("context.input_dir + \"/customers.csv\"")
    );

    let metadata = &input.metadata[0];
    assert_eq!(metadata.connector.as_deref(), Some("FLOW"));
    assert_eq!(metadata.columns.len(), 2);
    assert_eq!(metadata.columns[1].name.as_deref(), Some("name"));
    assert_eq!(metadata.columns[1].original_length, None);
}

#[test]
fn test_tree_children_flatten_to_leaves() {
    let doc = parse_document(JOB).unwrap();
    let data = &doc.nodes[1].node_data[0];

    let input = &data.input_tables[0];
    assert_eq!(input.name.as_deref(), Some("row1"));
    assert!(input.entries.is_empty());
    assert_eq!(input.tree[0].children[0].children.len(), 2);

    let leaves: Vec<_> = input
        .all_entries()
        .into_iter()
        .map(|e| e.name.unwrap_or_default())
        .collect();
    assert_eq!(leaves, vec!["id", "name"]);

    let output = &data.output_tables[0];
    assert_eq!(output.activate_expression_filter.as_deref(), Some("true"));
    assert_eq!(output.expression_filter.as_deref(), Some("[row1.doc:/customer/id] > 0"));
    assert_eq!(
        output.all_entries()[0].expression.as_deref(),
        Some("[row1.doc:/customer/id]")
    );
}

#[test]
fn test_unknown_root_is_rejected() {
    let result = parse_document("<Workspace><node/></Workspace>");
    assert!(matches!(result, Err(ImportError::UnsupportedDocument(ref root)) if root == "Workspace"));
}

#[test]
fn test_malformed_xml_is_an_error() {
    assert!(matches!(
        parse_document("<ProcessType><node></ProcessType>"),
        Err(ImportError::ParseError(_))
    ));
}
