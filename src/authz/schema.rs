//! Portable ReBAC schema, exactly as authored in a schema JSON file.
//!
//! Kind fields stay raw strings here; they are only interpreted by
//! [`crate::authz::codec::encode`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub namespaces: Vec<NamespaceModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceModel {
    pub name: String,
    #[serde(default)]
    pub relation_definitions: Vec<RelationDefinitionModel>,
}

/// A relation described either by its shortcut target-namespace list or by
/// an explicit expression tree. The tree wins when both are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDefinitionModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex_definition: Option<NodeModel>,
}

impl RelationDefinitionModel {
    /// Shortcut form: directly assignable from each listed namespace.
    pub fn shortcut(name: impl Into<String>, targets: &[&str]) -> Self {
        Self {
            name: name.into(),
            target_namespaces: targets.iter().map(|t| t.to_string()).collect(),
            complex_definition: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeModel {
    /// "child" | "union" | "intersect" | "sub"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeModel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<NodeExpressionModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExpressionModel {
    /// "self" | "targetSet" | "relationLeft" | "relationRight"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ne_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_definition_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_relation_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_relation_definition_namespace: Option<String>,
}
