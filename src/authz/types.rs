use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::authz::errors::AuthzError;

/// One edge of the authorization graph: `target` holds `relation` on
/// `resource` within `namespace`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationTuple {
    pub resource: String,
    #[serde(rename = "relationDefinition")]
    pub relation: String,
    pub namespace: String,
    pub target: String,
}

impl RelationTuple {
    pub fn new(
        resource: impl Into<String>,
        relation: impl Into<String>,
        namespace: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            relation: relation.into(),
            namespace: namespace.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#{}@{}",
            self.namespace, self.resource, self.relation, self.target
        )
    }
}

/// Partial-match filter over relation tuples. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(
        default,
        rename = "relationDefinition",
        skip_serializing_if = "Option::is_none"
    )]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl From<&RelationTuple> for RelationQuery {
    fn from(t: &RelationTuple) -> Self {
        Self {
            resource: Some(t.resource.clone()),
            relation: Some(t.relation.clone()),
            namespace: Some(t.namespace.clone()),
            target: Some(t.target.clone()),
        }
    }
}

/// Answer to one [`RelationQuery`] of a check call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationCheck {
    pub query: RelationQuery,
    pub has_relation: bool,
}

/// Ordered, non-empty list of relation tuples sent in one backend call.
///
/// Deserializes from the relation file shape `{ "relations": [...] }` and
/// refuses an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBatch")]
pub struct RelationBatch {
    relations: Vec<RelationTuple>,
}

#[derive(Deserialize)]
struct RawBatch {
    relations: Vec<RelationTuple>,
}

impl TryFrom<RawBatch> for RelationBatch {
    type Error = AuthzError;

    fn try_from(raw: RawBatch) -> Result<Self, Self::Error> {
        Self::new(raw.relations)
    }
}

impl RelationBatch {
    pub fn new(relations: Vec<RelationTuple>) -> Result<Self, AuthzError> {
        if relations.is_empty() {
            return Err(AuthzError::EmptyRelationBatch);
        }
        Ok(Self { relations })
    }

    pub fn single(tuple: RelationTuple) -> Self {
        Self {
            relations: vec![tuple],
        }
    }

    pub fn relations(&self) -> &[RelationTuple] {
        &self.relations
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn into_relations(self) -> Vec<RelationTuple> {
        self.relations
    }
}

/// The three read-only reachability queries the backend answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    WhoCanAccess,
    ResourceRelations,
    TargetAccess,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::WhoCanAccess => "who-can-access",
            QueryMode::ResourceRelations => "resource-relations",
            QueryMode::TargetAccess => "target-access",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "who-can-access" => Ok(QueryMode::WhoCanAccess),
            "resource-relations" => Ok(QueryMode::ResourceRelations),
            "target-access" => Ok(QueryMode::TargetAccess),
            other => Err(AuthzError::UnknownQueryMode(other.to_string())),
        }
    }
}

/// Unvalidated query request as it arrives from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationQueryRequest {
    pub mode: QueryMode,
    pub resource: Option<String>,
    pub relation: Option<String>,
    pub namespace: Option<String>,
    pub target: Option<String>,
}

/// A query whose mode-specific required fields are all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedQuery {
    WhoCanAccess {
        resource: String,
        relation: String,
        namespace: String,
    },
    ResourceRelations {
        resource: String,
    },
    TargetAccess {
        target: String,
    },
}

impl RelationQueryRequest {
    pub fn validate(self) -> Result<ValidatedQuery, AuthzError> {
        let mode = self.mode.as_str();
        match self.mode {
            QueryMode::WhoCanAccess => Ok(ValidatedQuery::WhoCanAccess {
                resource: required(self.resource, mode, "resource")?,
                relation: required(self.relation, mode, "relation")?,
                namespace: required(self.namespace, mode, "namespace")?,
            }),
            QueryMode::ResourceRelations => Ok(ValidatedQuery::ResourceRelations {
                resource: required(self.resource, mode, "resource")?,
            }),
            QueryMode::TargetAccess => Ok(ValidatedQuery::TargetAccess {
                target: required(self.target, mode, "target")?,
            }),
        }
    }
}

fn required(
    value: Option<String>,
    mode: &'static str,
    field: &'static str,
) -> Result<String, AuthzError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AuthzError::MissingQueryField { mode, field }),
    }
}
