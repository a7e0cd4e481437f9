//! Canonical ReBAC schema as the backend stores it.
//!
//! A relation is computed from an expression tree: composite nodes combine
//! their children, `Child` leaves wrap a single [`NodeExpression`].

use crate::authz::schema::{
    NamespaceModel, NodeExpressionModel, NodeModel, RelationDefinitionModel, SchemaModel,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub name: Option<String>,
    pub namespaces: Vec<Namespace>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub relation_definitions: Vec<RelationDefinition>,
}

/// `complex_definition == None` means no subject is directly assignable;
/// the relation is only usable inside another relation's expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDefinition {
    pub name: String,
    pub complex_definition: Option<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Child(NodeExpression),
    Union(Vec<Node>),
    Intersect(Vec<Node>),
    Sub(Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Child,
    Union,
    Intersect,
    Sub,
}

impl NodeKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            NodeKind::Child => "child",
            NodeKind::Union => "union",
            NodeKind::Intersect => "intersect",
            NodeKind::Sub => "sub",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    /// `self`: subjects directly assigned through this relation.
    Direct,
    TargetSet,
    RelationLeft,
    RelationRight,
}

impl ExpressionKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ExpressionKind::Direct => "self",
            ExpressionKind::TargetSet => "targetSet",
            ExpressionKind::RelationLeft => "relationLeft",
            ExpressionKind::RelationRight => "relationRight",
        }
    }
}

/// Leaf of the expression tree. How the four references are read depends
/// on `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeExpression {
    pub kind: ExpressionKind,
    pub relation_definition: Option<String>,
    pub relation_definition_namespace: Option<String>,
    pub target_relation_definition: Option<String>,
    pub target_relation_definition_namespace: Option<String>,
}

impl NodeExpression {
    /// Direct assignment of `relation` from subjects in `target_namespace`.
    pub fn direct(relation: &str, target_namespace: &str) -> Self {
        Self {
            kind: ExpressionKind::Direct,
            relation_definition: None,
            relation_definition_namespace: None,
            target_relation_definition: Some(relation.to_string()),
            target_relation_definition_namespace: Some(target_namespace.to_string()),
        }
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Child(_) => NodeKind::Child,
            Node::Union(_) => NodeKind::Union,
            Node::Intersect(_) => NodeKind::Intersect,
            Node::Sub(_) => NodeKind::Sub,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Child(_) => &[],
            Node::Union(c) | Node::Intersect(c) | Node::Sub(c) => c,
        }
    }

    pub fn expression(&self) -> Option<&NodeExpression> {
        match self {
            Node::Child(e) => Some(e),
            _ => None,
        }
    }
}

// ---------- wire form ----------
//
// The backend accepts the same JSON shape as the schema file, with
// canonical lowercase tags and no shortcut lists.

impl From<&NodeExpression> for NodeExpressionModel {
    fn from(e: &NodeExpression) -> Self {
        Self {
            ne_type: Some(e.kind.as_wire().to_string()),
            relation_definition: e.relation_definition.clone(),
            relation_definition_namespace: e.relation_definition_namespace.clone(),
            target_relation_definition: e.target_relation_definition.clone(),
            target_relation_definition_namespace: e.target_relation_definition_namespace.clone(),
        }
    }
}

impl From<&Node> for NodeModel {
    fn from(node: &Node) -> Self {
        match node {
            Node::Child(expr) => NodeModel {
                n_type: Some(NodeKind::Child.as_wire().to_string()),
                children: None,
                expression: Some(expr.into()),
            },
            composite => NodeModel {
                n_type: Some(composite.kind().as_wire().to_string()),
                children: Some(composite.children().iter().map(NodeModel::from).collect()),
                expression: None,
            },
        }
    }
}

impl From<&Schema> for SchemaModel {
    fn from(schema: &Schema) -> Self {
        SchemaModel {
            name: schema.name.clone(),
            namespaces: schema
                .namespaces
                .iter()
                .map(|ns| NamespaceModel {
                    name: ns.name.clone(),
                    relation_definitions: ns
                        .relation_definitions
                        .iter()
                        .map(|rd| RelationDefinitionModel {
                            name: rd.name.clone(),
                            target_namespaces: Vec::new(),
                            complex_definition: rd.complex_definition.as_ref().map(NodeModel::from),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
