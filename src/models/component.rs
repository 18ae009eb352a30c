//! Component, connection and context records

use serde::{Deserialize, Serialize};

use super::mapper::NodeData;

/// Parameter field/name pair that carries a component's logical identifier
pub const UNIQUE_NAME_FIELD: &str = "TEXT";
pub const UNIQUE_NAME_PARAM: &str = "UNIQUE_NAME";

/// One `<node>` of a job design
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub component_name: Option<String>,
    pub component_version: Option<String>,
    /// Logical identifier from the `UNIQUE_NAME` parameter, `None` when the
    /// component does not declare one
    pub component_value: Option<String>,
    pub pos_x: Option<String>,
    pub pos_y: Option<String>,
    pub offset_label_x: Option<String>,
    pub offset_label_y: Option<String>,
    pub element_parameters: Vec<ElementParameter>,
    pub metadata: Vec<MetadataBlock>,
    pub node_data: Vec<NodeData>,
}

impl Component {
    /// Find the first parameter with the given name
    pub fn parameter(&self, name: &str) -> Option<&ElementParameter> {
        self.element_parameters.iter().find(|p| p.name.as_deref() == Some(name))
    }

    /// Whether the component is switched off in the designer
    ///
    /// A component is inactive when it carries `CHECK`/`ACTIVATE` with the
    /// literal value `false`.
    pub fn is_deactivated(&self) -> bool {
        self.element_parameters.iter().any(|p| {
            p.field.as_deref() == Some("CHECK")
                && p.name.as_deref() == Some("ACTIVATE")
                && p.value.as_deref() == Some("false")
        })
    }
}

/// A named property of a component, connection, subjob or job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementParameter {
    pub field: Option<String>,
    pub name: Option<String>,
    pub show: Option<String>,
    pub value: Option<String>,
    pub element_values: Vec<ElementValue>,
}

impl ElementParameter {
    /// Whether this parameter supplies the owning component's identifier
    pub fn is_unique_name(&self) -> bool {
        self.field.as_deref() == Some(UNIQUE_NAME_FIELD)
            && self.name.as_deref() == Some(UNIQUE_NAME_PARAM)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementValue {
    pub element_ref: Option<String>,
    pub value: Option<String>,
}

/// A schema attached to a component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlock {
    pub connector: Option<String>,
    pub label: Option<String>,
    pub name: Option<String>,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub comment: Option<String>,
    pub key: Option<String>,
    pub length: Option<String>,
    pub name: Option<String>,
    pub nullable: Option<String>,
    pub pattern: Option<String>,
    pub precision: Option<String>,
    pub source_type: Option<String>,
    #[serde(rename = "type")]
    pub column_type: Option<String>,
    pub useful_column: Option<String>,
    pub original_length: Option<String>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub connector_name: Option<String>,
    pub label: Option<String>,
    pub line_style: Option<String>,
    pub source: Option<String>,
    pub target: Option<String>,
    pub output_id: Option<String>,
    pub element_parameters: Vec<ElementParameter>,
}

/// A named group of context variables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub name: Option<String>,
    pub confirmation_needed: Option<String>,
    pub parameters: Vec<ContextParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextParameter {
    pub comment: Option<String>,
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub prompt_needed: Option<String>,
    #[serde(rename = "type")]
    pub parameter_type: Option<String>,
    pub value: Option<String>,
}

/// A `<subjob>` block; its identity lives in its `UNIQUE_NAME` parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubJob {
    pub element_parameters: Vec<ElementParameter>,
}

impl SubJob {
    pub fn unique_name(&self) -> Option<&str> {
        self.element_parameters
            .iter()
            .find(|p| p.is_unique_name())
            .and_then(|p| p.value.as_deref())
    }
}

/// A routine referenced by the job (`<routinesParameter>`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineRef {
    pub id: Option<String>,
    pub name: Option<String>,
}
