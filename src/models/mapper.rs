//! Mapper configuration records (`<nodeData>`)

use serde::{Deserialize, Serialize};

/// Runtime configuration block of a component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub input_tables: Vec<InputTable>,
    pub output_tables: Vec<OutputTable>,
    pub var_table: Option<VarTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputTable {
    /// Row (flow) name the table reads from
    pub name: Option<String>,
    pub lookup_mode: Option<String>,
    pub matching_mode: Option<String>,
    pub size_state: Option<String>,
    pub activate_expression_filter: Option<String>,
    pub expression_filter: Option<String>,
    pub inner_join: Option<String>,
    pub persistent: Option<String>,
    pub entries: Vec<MapperEntry>,
    /// Hierarchical schema for tree-shaped inputs
    pub tree: Vec<TreeNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTable {
    pub name: Option<String>,
    pub size_state: Option<String>,
    pub activate_condensed_tool: Option<String>,
    pub reject: Option<String>,
    pub reject_inner_join: Option<String>,
    pub activate_expression_filter: Option<String>,
    pub expression_filter: Option<String>,
    pub entries: Vec<MapperEntry>,
    pub tree: Vec<TreeNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarTable {
    pub name: Option<String>,
    pub size_state: Option<String>,
    pub entries: Vec<MapperEntry>,
}

/// One column-level rule of an input, output or variable table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapperEntry {
    pub name: Option<String>,
    pub expression: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub nullable: Option<String>,
    pub operator: Option<String>,
}

/// A node of a tree-shaped schema (`<nodes>` / `<children>`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub name: Option<String>,
    pub expression: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub xpath: Option<String>,
    pub nullable: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Collect the leaves of this subtree, depth first
    pub fn leaves(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a TreeNode>) {
        if self.children.is_empty() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }

    /// View a leaf as a mapper entry so it flattens like a tabular column
    pub fn as_entry(&self) -> MapperEntry {
        MapperEntry {
            name: self.name.clone(),
            expression: self.expression.clone(),
            entry_type: self.node_type.clone(),
            nullable: self.nullable.clone(),
            operator: None,
        }
    }
}

impl InputTable {
    /// Tabular entries followed by tree leaves
    pub fn all_entries(&self) -> Vec<MapperEntry> {
        let mut entries = self.entries.clone();
        for node in &self.tree {
            entries.extend(node.leaves().into_iter().map(TreeNode::as_entry));
        }
        entries
    }
}

impl OutputTable {
    /// Tabular entries followed by tree leaves
    pub fn all_entries(&self) -> Vec<MapperEntry> {
        let mut entries = self.entries.clone();
        for node in &self.tree {
            entries.extend(node.leaves().into_iter().map(TreeNode::as_entry));
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            name: Some(name.to_string()),
            children,
            ..Default::default()
        }
    }

    #[test]
    fn test_tree_leaves_depth_first() {
        let root = node(
            "root",
            vec![
                node("a", vec![node("a1", vec![]), node("a2", vec![])]),
                node("b", vec![]),
            ],
        );

        let names: Vec<_> = root
            .leaves()
            .iter()
            .map(|n| n.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a1", "a2", "b"]);
    }

    #[test]
    fn test_input_all_entries_appends_tree_leaves() {
        let table = InputTable {
            entries: vec![MapperEntry {
                name: Some("id".to_string()),
                ..Default::default()
            }],
            tree: vec![node("doc", vec![node("title", vec![])])],
            ..Default::default()
        };

        let entries = table.all_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name.as_deref(), Some("title"));
    }
}
