//! Conversion between the portable schema file form and the canonical tree.
//!
//! Encoding expands the shortcut `targetNamespaces` syntax into `Child`/`self`
//! nodes. Decoding recovers that shortcut list again, which is only exact for
//! schemas that were written in shortcut form: `intersect`/`sub` nodes and
//! non-`self` expressions contribute nothing to the decoded list.
//!
//! Unrecognized kind strings do not fail the encode. Node kinds fall back to
//! `child` and expression kinds to `self`; every fallback is logged and
//! reported in [`Encoded::warnings`].
//!
//! Schemas read back from the backend go through [`read_stored`] instead,
//! which applies the same fallbacks quietly and drops `child` nodes that
//! carry no expression rather than failing the read.

use std::fmt;

use crate::authz::errors::AuthzError;
use crate::authz::schema::{
    NamespaceModel, NodeExpressionModel, NodeModel, RelationDefinitionModel, SchemaModel,
};
use crate::authz::tree::{
    ExpressionKind, Namespace, Node, NodeExpression, NodeKind, RelationDefinition, Schema,
};

/// Result of a lenient kind parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed<K> {
    Known(K),
    /// The input was missing or unrecognized; the fallback kind was used.
    Defaulted(K),
}

impl<K: Copy> Parsed<K> {
    pub fn kind(&self) -> K {
        match self {
            Parsed::Known(k) | Parsed::Defaulted(k) => *k,
        }
    }
}

pub fn parse_node_kind(raw: Option<&str>) -> Parsed<NodeKind> {
    let Some(raw) = raw else {
        return Parsed::Defaulted(NodeKind::Child);
    };
    match raw.to_ascii_lowercase().as_str() {
        "child" => Parsed::Known(NodeKind::Child),
        "union" => Parsed::Known(NodeKind::Union),
        "intersect" => Parsed::Known(NodeKind::Intersect),
        "sub" => Parsed::Known(NodeKind::Sub),
        _ => Parsed::Defaulted(NodeKind::Child),
    }
}

pub fn parse_expression_kind(raw: Option<&str>) -> Parsed<ExpressionKind> {
    let Some(raw) = raw else {
        return Parsed::Defaulted(ExpressionKind::Direct);
    };
    match raw.to_ascii_lowercase().as_str() {
        "self" => Parsed::Known(ExpressionKind::Direct),
        "targetset" | "target_set" => Parsed::Known(ExpressionKind::TargetSet),
        "relationleft" | "relation_left" => Parsed::Known(ExpressionKind::RelationLeft),
        "relationright" | "relation_right" => Parsed::Known(ExpressionKind::RelationRight),
        _ => Parsed::Defaulted(ExpressionKind::Direct),
    }
}

/// Something the encoder accepted but had to interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecWarning {
    DefaultedNodeKind { path: String, raw: Option<String> },
    DefaultedExpressionKind { path: String, raw: Option<String> },
    IgnoredChildren { path: String },
    IgnoredExpression { path: String },
    DroppedNode { path: String },
}

impl fmt::Display for CodecWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecWarning::DefaultedNodeKind { path, raw } => write!(
                f,
                "{path}: node kind {:?} not recognized, treated as child",
                raw.as_deref().unwrap_or("<missing>")
            ),
            CodecWarning::DefaultedExpressionKind { path, raw } => write!(
                f,
                "{path}: expression kind {:?} not recognized, treated as self",
                raw.as_deref().unwrap_or("<missing>")
            ),
            CodecWarning::IgnoredChildren { path } => {
                write!(f, "{path}: children of a child node were ignored")
            }
            CodecWarning::IgnoredExpression { path } => {
                write!(f, "{path}: expression of a composite node was ignored")
            }
            CodecWarning::DroppedNode { path } => {
                write!(f, "{path}: child node without expression was dropped")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub schema: Schema,
    pub warnings: Vec<CodecWarning>,
}

/// Where a schema model came from. Authored files are validated; stored
/// schemas are taken as the backend returns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Authored,
    Stored,
}

/// Portable → canonical.
pub fn encode(model: &SchemaModel) -> Result<Encoded, AuthzError> {
    let encoded = convert(model, Source::Authored)?;
    for w in &encoded.warnings {
        tracing::warn!(warning = %w, "Lenient schema interpretation");
    }
    Ok(encoded)
}

/// Canonical tree of a schema returned by the backend. Never rejects a
/// node; anything that had to be interpreted is logged at debug.
pub fn read_stored(model: &SchemaModel) -> Result<Schema, AuthzError> {
    let encoded = convert(model, Source::Stored)?;
    for w in &encoded.warnings {
        tracing::debug!(warning = %w, "Stored schema interpretation");
    }
    Ok(encoded.schema)
}

fn convert(model: &SchemaModel, source: Source) -> Result<Encoded, AuthzError> {
    let mut warnings = Vec::new();
    let mut namespaces = Vec::with_capacity(model.namespaces.len());

    for ns in &model.namespaces {
        let mut relation_definitions = Vec::with_capacity(ns.relation_definitions.len());
        for rel in &ns.relation_definitions {
            let path = format!("{}.{}", ns.name, rel.name);
            relation_definitions.push(RelationDefinition {
                name: rel.name.clone(),
                complex_definition: encode_relation(rel, &path, source, &mut warnings)?,
            });
        }
        namespaces.push(Namespace {
            name: ns.name.clone(),
            relation_definitions,
        });
    }

    Ok(Encoded {
        schema: Schema {
            name: model.name.clone(),
            namespaces,
        },
        warnings,
    })
}

fn encode_relation(
    rel: &RelationDefinitionModel,
    path: &str,
    source: Source,
    warnings: &mut Vec<CodecWarning>,
) -> Result<Option<Node>, AuthzError> {
    if let Some(node) = &rel.complex_definition {
        return encode_node(node, path, source, warnings);
    }

    let node = match rel.target_namespaces.as_slice() {
        [] => None,
        [single] => Some(Node::Child(NodeExpression::direct(&rel.name, single))),
        many => Some(Node::Union(
            many.iter()
                .map(|t| Node::Child(NodeExpression::direct(&rel.name, t)))
                .collect(),
        )),
    };
    Ok(node)
}

/// `Ok(None)` only for a stored `child` node without an expression.
fn encode_node(
    node: &NodeModel,
    path: &str,
    source: Source,
    warnings: &mut Vec<CodecWarning>,
) -> Result<Option<Node>, AuthzError> {
    let kind = match parse_node_kind(node.n_type.as_deref()) {
        Parsed::Known(k) => k,
        Parsed::Defaulted(k) => {
            warnings.push(CodecWarning::DefaultedNodeKind {
                path: path.to_string(),
                raw: node.n_type.clone(),
            });
            k
        }
    };

    let composite: fn(Vec<Node>) -> Node = match kind {
        NodeKind::Child => {
            if node.children.as_ref().is_some_and(|c| !c.is_empty()) {
                warnings.push(CodecWarning::IgnoredChildren {
                    path: path.to_string(),
                });
            }
            let Some(expr) = node.expression.as_ref() else {
                if source == Source::Stored {
                    warnings.push(CodecWarning::DroppedNode {
                        path: path.to_string(),
                    });
                    return Ok(None);
                }
                return Err(AuthzError::InvalidSchema(format!(
                    "{path}: child node requires an expression"
                )));
            };
            return Ok(Some(Node::Child(encode_expression(expr, path, warnings))));
        }
        NodeKind::Union => Node::Union,
        NodeKind::Intersect => Node::Intersect,
        NodeKind::Sub => Node::Sub,
    };

    if node.expression.is_some() {
        warnings.push(CodecWarning::IgnoredExpression {
            path: path.to_string(),
        });
    }

    let mut children = Vec::new();
    for (i, child) in node.children.iter().flatten().enumerate() {
        if let Some(child) = encode_node(child, &format!("{path}[{i}]"), source, warnings)? {
            children.push(child);
        }
    }
    Ok(Some(composite(children)))
}

fn encode_expression(
    expr: &NodeExpressionModel,
    path: &str,
    warnings: &mut Vec<CodecWarning>,
) -> NodeExpression {
    let kind = match parse_expression_kind(expr.ne_type.as_deref()) {
        Parsed::Known(k) => k,
        Parsed::Defaulted(k) => {
            warnings.push(CodecWarning::DefaultedExpressionKind {
                path: path.to_string(),
                raw: expr.ne_type.clone(),
            });
            k
        }
    };
    NodeExpression {
        kind,
        relation_definition: expr.relation_definition.clone(),
        relation_definition_namespace: expr.relation_definition_namespace.clone(),
        target_relation_definition: expr.target_relation_definition.clone(),
        target_relation_definition_namespace: expr.target_relation_definition_namespace.clone(),
    }
}

/// Canonical → portable, in shortcut form only.
pub fn decode(schema: &Schema) -> SchemaModel {
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
                        target_namespaces: extract_target_namespaces(rd.complex_definition.as_ref()),
                        complex_definition: None,
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Target namespaces reachable through `Child`/`self` leaves and `Union`
/// nodes, in tree order. Duplicates are kept.
pub fn extract_target_namespaces(node: Option<&Node>) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(node) = node {
        collect_targets(node, &mut out);
    }
    out
}

fn collect_targets(node: &Node, out: &mut Vec<String>) {
    match node {
        Node::Child(expr) if expr.kind == ExpressionKind::Direct => {
            if let Some(ns) = &expr.target_relation_definition_namespace {
                out.push(ns.clone());
            }
        }
        Node::Union(children) => {
            for child in children {
                collect_targets(child, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document_schema() -> SchemaModel {
        serde_json::from_value(json!({
            "namespaces": [{
                "name": "document",
                "relationDefinitions": [
                    {"name": "owner", "targetNamespaces": ["user"]},
                    {"name": "viewer", "targetNamespaces": ["user", "group"]}
                ]
            }]
        }))
        .unwrap()
    }

    fn relation<'a>(schema: &'a Schema, ns: &str, name: &str) -> &'a RelationDefinition {
        schema
            .namespaces
            .iter()
            .find(|n| n.name == ns)
            .and_then(|n| n.relation_definitions.iter().find(|r| r.name == name))
            .unwrap()
    }

    #[test]
    fn test_single_target_encodes_to_child_self() {
        let encoded = encode(&document_schema()).unwrap();
        assert!(encoded.warnings.is_empty());

        let owner = relation(&encoded.schema, "document", "owner");
        assert_eq!(
            owner.complex_definition,
            Some(Node::Child(NodeExpression::direct("owner", "user")))
        );
    }

    #[test]
    fn test_multiple_targets_encode_to_union_in_order() {
        let encoded = encode(&document_schema()).unwrap();
        let viewer = relation(&encoded.schema, "document", "viewer");
        assert_eq!(
            viewer.complex_definition,
            Some(Node::Union(vec![
                Node::Child(NodeExpression::direct("viewer", "user")),
                Node::Child(NodeExpression::direct("viewer", "group")),
            ]))
        );
    }

    #[test]
    fn test_no_targets_encodes_to_absent_definition() {
        let model = SchemaModel {
            name: None,
            namespaces: vec![NamespaceModel {
                name: "folder".into(),
                relation_definitions: vec![RelationDefinitionModel::shortcut("parent", &[])],
            }],
        };
        let encoded = encode(&model).unwrap();
        assert!(relation(&encoded.schema, "folder", "parent")
            .complex_definition
            .is_none());
    }

    #[test]
    fn test_decode_recovers_shortcut_lists() {
        let original = document_schema();
        let decoded = decode(&encode(&original).unwrap().schema);
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_complex_definition_wins_over_targets() {
        let model: SchemaModel = serde_json::from_value(json!({
            "namespaces": [{
                "name": "document",
                "relationDefinitions": [{
                    "name": "editor",
                    "targetNamespaces": ["user"],
                    "complexDefinition": {
                        "nType": "child",
                        "expression": {"neType": "targetSet", "targetRelationDefinition": "member", "targetRelationDefinitionNamespace": "group"}
                    }
                }]
            }]
        }))
        .unwrap();

        let encoded = encode(&model).unwrap();
        let editor = relation(&encoded.schema, "document", "editor");
        let expr = editor.complex_definition.as_ref().unwrap().expression().unwrap();
        assert_eq!(expr.kind, ExpressionKind::TargetSet);
    }

    #[test]
    fn test_kind_strings_are_case_insensitive() {
        assert_eq!(parse_node_kind(Some("UNION")), Parsed::Known(NodeKind::Union));
        assert_eq!(parse_node_kind(Some("Intersect")), Parsed::Known(NodeKind::Intersect));
        assert_eq!(
            parse_expression_kind(Some("TARGET_SET")),
            Parsed::Known(ExpressionKind::TargetSet)
        );
        assert_eq!(
            parse_expression_kind(Some("relationRight")),
            Parsed::Known(ExpressionKind::RelationRight)
        );
        assert_eq!(
            parse_expression_kind(Some("Relation_Left")),
            Parsed::Known(ExpressionKind::RelationLeft)
        );
    }

    #[test]
    fn test_unknown_kinds_default_and_are_reported() {
        let model: SchemaModel = serde_json::from_value(json!({
            "namespaces": [{
                "name": "document",
                "relationDefinitions": [{
                    "name": "reader",
                    "complexDefinition": {
                        "nType": "xor",
                        "expression": {"neType": "magic", "targetRelationDefinitionNamespace": "user"}
                    }
                }]
            }]
        }))
        .unwrap();

        let encoded = encode(&model).unwrap();
        let reader = relation(&encoded.schema, "document", "reader");
        let node = reader.complex_definition.as_ref().unwrap();
        assert_eq!(node.kind(), NodeKind::Child);
        assert_eq!(node.expression().unwrap().kind, ExpressionKind::Direct);

        assert_eq!(
            encoded.warnings,
            vec![
                CodecWarning::DefaultedNodeKind {
                    path: "document.reader".into(),
                    raw: Some("xor".into())
                },
                CodecWarning::DefaultedExpressionKind {
                    path: "document.reader".into(),
                    raw: Some("magic".into())
                },
            ]
        );
        assert!(encoded.warnings[0].to_string().contains("treated as child"));
    }

    #[test]
    fn test_child_without_expression_is_rejected() {
        let model: SchemaModel = serde_json::from_value(json!({
            "namespaces": [{
                "name": "document",
                "relationDefinitions": [{
                    "name": "broken",
                    "complexDefinition": {"nType": "union", "children": [{"nType": "child"}]}
                }]
            }]
        }))
        .unwrap();

        let err = encode(&model).unwrap_err();
        match err {
            AuthzError::InvalidSchema(msg) => assert!(msg.contains("document.broken[0]")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stored_schema_drops_child_without_expression() {
        let model: SchemaModel = serde_json::from_value(json!({
            "namespaces": [{
                "name": "document",
                "relationDefinitions": [
                    {
                        "name": "viewer",
                        "complexDefinition": {"nType": "union", "children": [
                            {"nType": "child"},
                            {"nType": "child", "expression": {"neType": "SELF", "targetRelationDefinition": "viewer", "targetRelationDefinitionNamespace": "user"}}
                        ]}
                    },
                    {"name": "broken", "complexDefinition": {"nType": "child"}}
                ]
            }]
        }))
        .unwrap();

        let schema = read_stored(&model).unwrap();

        assert_eq!(
            relation(&schema, "document", "viewer").complex_definition,
            Some(Node::Union(vec![Node::Child(NodeExpression::direct(
                "viewer", "user"
            ))]))
        );
        assert!(relation(&schema, "document", "broken")
            .complex_definition
            .is_none());
        assert_eq!(
            decode(&schema).namespaces[0].relation_definitions[0].target_namespaces,
            vec!["user"]
        );
    }

    #[test]
    fn test_composite_tree_is_kept_verbatim_but_decodes_lossily() {
        let model: SchemaModel = serde_json::from_value(json!({
            "namespaces": [{
                "name": "document",
                "relationDefinitions": [
                    {
                        "name": "can_share",
                        "complexDefinition": {
                            "nType": "intersect",
                            "children": [
                                {"nType": "child", "expression": {"neType": "self", "targetRelationDefinition": "can_share", "targetRelationDefinitionNamespace": "user"}},
                                {"nType": "child", "expression": {"neType": "self", "targetRelationDefinition": "can_share", "targetRelationDefinitionNamespace": "group"}}
                            ]
                        }
                    },
                    {
                        "name": "can_archive",
                        "complexDefinition": {
                            "nType": "sub",
                            "children": [
                                {"nType": "child", "expression": {"neType": "self", "targetRelationDefinitionNamespace": "user"}}
                            ]
                        }
                    }
                ]
            }]
        }))
        .unwrap();

        let encoded = encode(&model).unwrap();
        let share = relation(&encoded.schema, "document", "can_share");
        let tree = share.complex_definition.as_ref().unwrap();
        assert_eq!(tree.kind(), NodeKind::Intersect);
        assert_eq!(tree.children().len(), 2);

        let decoded = decode(&encoded.schema);
        for rel in &decoded.namespaces[0].relation_definitions {
            assert!(rel.target_namespaces.is_empty(), "{} should decode empty", rel.name);
            assert!(rel.complex_definition.is_none());
        }
    }

    #[test]
    fn test_union_with_mixed_leaves_decodes_partially() {
        let node = Node::Union(vec![
            Node::Child(NodeExpression::direct("viewer", "user")),
            Node::Child(NodeExpression {
                kind: ExpressionKind::RelationLeft,
                relation_definition: Some("parent".into()),
                relation_definition_namespace: Some("document".into()),
                target_relation_definition: Some("viewer".into()),
                target_relation_definition_namespace: Some("folder".into()),
            }),
            Node::Union(vec![
                Node::Child(NodeExpression::direct("viewer", "group")),
                Node::Child(NodeExpression::direct("viewer", "user")),
            ]),
        ]);
        assert_eq!(
            extract_target_namespaces(Some(&node)),
            vec!["user", "group", "user"]
        );
        assert!(extract_target_namespaces(None).is_empty());
    }

    #[test]
    fn test_schema_name_survives_round_trip() {
        let mut model = document_schema();
        model.name = Some("docs".into());
        let decoded = decode(&encode(&model).unwrap().schema);
        assert_eq!(decoded.name.as_deref(), Some("docs"));
    }
}
