use std::path::Path;

use serde::Deserialize;

use crate::authz::errors::AuthzError;
use crate::authz::schema::SchemaModel;
use crate::authz::types::{RelationBatch, RelationTuple};

/// Read and parse a portable schema file. Kind strings are not interpreted
/// here; see [`crate::authz::codec::encode`].
pub fn load_schema_file(path: &Path) -> Result<SchemaModel, AuthzError> {
    let contents = std::fs::read_to_string(path).map_err(|source| AuthzError::SchemaLoad {
        path: path.display().to_string(),
        source,
    })?;
    let schema: SchemaModel = serde_json::from_str(&contents)
        .map_err(|e| AuthzError::InvalidSchema(format!("{}: {e}", path.display())))?;

    tracing::debug!(
        path = %path.display(),
        namespaces = schema.namespaces.len(),
        "Loaded schema file"
    );
    Ok(schema)
}

#[derive(Deserialize)]
struct RelationFile {
    relations: Vec<RelationTuple>,
}

/// Read a `{ "relations": [...] }` file into a non-empty batch.
pub fn load_relation_file(path: &Path) -> Result<RelationBatch, AuthzError> {
    let contents =
        std::fs::read_to_string(path).map_err(|source| AuthzError::RelationFileLoad {
            path: path.display().to_string(),
            source,
        })?;
    let file: RelationFile = serde_json::from_str(&contents)
        .map_err(|e| AuthzError::InvalidRelationFile(format!("{}: {e}", path.display())))?;

    let batch = RelationBatch::new(file.relations)?;
    tracing::debug!(path = %path.display(), relations = batch.len(), "Loaded relation file");
    Ok(batch)
}

/// Resolve the relation input of a create/delete/check command: either a
/// relation file or all four individual fields, never both.
pub fn relation_input(
    file: Option<&Path>,
    resource: Option<String>,
    relation: Option<String>,
    namespace: Option<String>,
    target: Option<String>,
) -> Result<RelationBatch, AuthzError> {
    let fields = [resource, relation, namespace, target];
    let any_field = fields.iter().any(Option::is_some);

    match (file, fields) {
        (Some(_), _) if any_field => Err(AuthzError::ConflictingRelationInput),
        (Some(path), _) => load_relation_file(path),
        (None, [Some(resource), Some(relation), Some(namespace), Some(target)]) => Ok(
            RelationBatch::single(RelationTuple::new(resource, relation, namespace, target)),
        ),
        (None, _) => Err(AuthzError::IncompleteRelationInput),
    }
}
