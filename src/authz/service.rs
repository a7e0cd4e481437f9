//! ReBAC schema and relation-tuple operations against the identity backend.

use std::path::Path;

use serde::Serialize;

use crate::authz::codec::{decode, encode};
use crate::authz::loader::load_schema_file;
use crate::authz::schema::SchemaModel;
use crate::authz::types::{
    RelationBatch, RelationCheck, RelationQuery, RelationQueryRequest, RelationTuple,
    ValidatedQuery,
};
use crate::backend::{BackendError, IdentityBackend};
use crate::errors::KeywardError;
use crate::result::OperationResult;

/// Read, encode and upsert the schema file at `path`.
pub async fn create_schema(
    backend: &dyn IdentityBackend,
    path: &Path,
    upgrade: bool,
) -> Result<OperationResult<SchemaModel>, KeywardError> {
    tracing::info!(path = %path.display(), "Creating/updating ReBAC schema from file");
    let model = load_schema_file(path)?;
    create_schema_from_model(backend, model, upgrade).await
}

pub async fn create_schema_from_model(
    backend: &dyn IdentityBackend,
    model: SchemaModel,
    upgrade: bool,
) -> Result<OperationResult<SchemaModel>, KeywardError> {
    let encoded = encode(&model)?;

    // advisory only: the save below replaces whatever is there
    match backend.load_schema().await {
        Ok(Some(existing)) if !existing.namespaces.is_empty() => {
            tracing::info!(upgrade, "Schema already exists, updating");
        }
        Ok(_) => tracing::debug!("No existing schema found, creating"),
        Err(e) => tracing::debug!(error = %e, "Could not load existing schema"),
    }

    backend
        .save_schema(&encoded.schema, upgrade)
        .await
        .map_err(|e| KeywardError::operation("create/update ReBAC schema", e))?;

    tracing::info!(
        namespaces = model.namespaces.len(),
        warnings = encoded.warnings.len(),
        "Schema saved"
    );
    Ok(OperationResult::created(
        model,
        format!("Schema created/updated successfully with upgrade={upgrade}"),
    ))
}

pub async fn load_schema(
    backend: &dyn IdentityBackend,
) -> Result<OperationResult<SchemaModel>, KeywardError> {
    match backend.load_schema().await {
        Ok(Some(schema)) => {
            let model = decode(&schema);
            tracing::info!(namespaces = model.namespaces.len(), "Schema loaded");
            Ok(OperationResult::success(model, "Schema loaded successfully"))
        }
        Ok(None) | Err(BackendError::NotFound(_)) => {
            tracing::info!("No schema found");
            Ok(OperationResult::failure("No schema exists"))
        }
        Err(e) => Err(KeywardError::operation("load ReBAC schema", e)),
    }
}

pub async fn delete_schema(
    backend: &dyn IdentityBackend,
) -> Result<OperationResult<()>, KeywardError> {
    match backend.load_schema().await {
        Ok(Some(existing)) if !existing.namespaces.is_empty() => {}
        Ok(_) | Err(BackendError::NotFound(_)) => {
            tracing::info!("No schema found to delete");
            return Ok(OperationResult::failure("No schema exists to delete"));
        }
        Err(e) => return Err(KeywardError::operation("load ReBAC schema", e)),
    }

    backend
        .delete_schema()
        .await
        .map_err(|e| KeywardError::operation("delete ReBAC schema", e))?;
    tracing::info!("Schema deleted");
    Ok(OperationResult::success((), "Schema deleted successfully"))
}

pub async fn create_relations(
    backend: &dyn IdentityBackend,
    batch: RelationBatch,
) -> Result<OperationResult<Vec<RelationTuple>>, KeywardError> {
    tracing::info!(count = batch.len(), "Creating relation tuples");
    backend
        .create_relations(batch.relations())
        .await
        .map_err(|e| KeywardError::operation("create relations", e))?;

    let message = format!("Created {} relation tuple(s) successfully", batch.len());
    Ok(OperationResult::created(batch.into_relations(), message))
}

pub async fn delete_relations(
    backend: &dyn IdentityBackend,
    batch: RelationBatch,
) -> Result<OperationResult<()>, KeywardError> {
    tracing::info!(count = batch.len(), "Deleting relation tuples");
    backend
        .delete_relations(batch.relations())
        .await
        .map_err(|e| KeywardError::operation("delete relations", e))?;

    Ok(OperationResult::success(
        (),
        format!("Deleted {} relation tuple(s)", batch.len()),
    ))
}

pub async fn check_relations(
    backend: &dyn IdentityBackend,
    queries: &[RelationQuery],
) -> Result<OperationResult<Vec<RelationCheck>>, KeywardError> {
    tracing::info!(count = queries.len(), "Checking relations");
    let checks = backend
        .has_relations(queries)
        .await
        .map_err(|e| KeywardError::operation("check relations", e))?;

    Ok(OperationResult::success(
        checks,
        format!("Checked {} relation(s)", queries.len()),
    ))
}

/// Data returned by [`query_relations`], depending on the mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Targets(Vec<String>),
    Relations(Vec<RelationTuple>),
}

/// Validate `request` for its mode, then forward it. Nothing is sent when a
/// required field is missing.
pub async fn query_relations(
    backend: &dyn IdentityBackend,
    request: RelationQueryRequest,
) -> Result<OperationResult<QueryOutcome>, KeywardError> {
    let result = match request.validate()? {
        ValidatedQuery::WhoCanAccess {
            resource,
            relation,
            namespace,
        } => who_can_access(backend, &resource, &relation, &namespace)
            .await?
            .map(QueryOutcome::Targets),
        ValidatedQuery::ResourceRelations { resource } => resource_relations(backend, &resource)
            .await?
            .map(QueryOutcome::Relations),
        ValidatedQuery::TargetAccess { target } => target_access(backend, &target)
            .await?
            .map(QueryOutcome::Relations),
    };
    Ok(result)
}

pub async fn who_can_access(
    backend: &dyn IdentityBackend,
    resource: &str,
    relation: &str,
    namespace: &str,
) -> Result<OperationResult<Vec<String>>, KeywardError> {
    tracing::debug!(%resource, %relation, %namespace, "Querying who can access");
    let targets = backend
        .who_can_access(resource, relation, namespace)
        .await
        .map_err(|e| KeywardError::operation("query who can access", e))?;

    let message = format!("Found {} target(s) with access", targets.len());
    Ok(OperationResult::success(targets, message))
}

pub async fn resource_relations(
    backend: &dyn IdentityBackend,
    resource: &str,
) -> Result<OperationResult<Vec<RelationTuple>>, KeywardError> {
    tracing::debug!(%resource, "Querying resource relations");
    let tuples = backend
        .resource_relations(resource)
        .await
        .map_err(|e| KeywardError::operation("query resource relations", e))?;

    let message = format!("Found {} relation(s)", tuples.len());
    Ok(OperationResult::success(tuples, message))
}

pub async fn target_access(
    backend: &dyn IdentityBackend,
    target: &str,
) -> Result<OperationResult<Vec<RelationTuple>>, KeywardError> {
    tracing::debug!(%target, "Querying target access");
    let tuples = backend
        .what_can_target_access(target)
        .await
        .map_err(|e| KeywardError::operation("query target access", e))?;

    let message = format!("Found {} relation(s)", tuples.len());
    Ok(OperationResult::success(tuples, message))
}
