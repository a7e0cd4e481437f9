//! Idempotent create-if-absent.
//!
//! `reconcile` lists what exists, returns the match if there is one and
//! otherwise creates. The list and the create are two separate backend
//! calls with nothing held in between, so two concurrent callers can both
//! miss and both create. Uniqueness is the backend's to enforce.

use std::future::Future;

use crate::result::OperationResult;

/// A resource identified by a human-chosen name.
pub trait NamedResource {
    /// Label used in result messages, e.g. "Tenant".
    const KIND: &'static str;

    fn name(&self) -> &str;
}

/// Return `AlreadyExists` for the first listed resource whose name equals
/// `name` exactly, otherwise call `create` once and return `Created`.
pub async fn reconcile<R, E, L, LF, C, CF>(
    name: &str,
    list: L,
    create: C,
) -> Result<OperationResult<R>, E>
where
    R: NamedResource,
    L: FnOnce() -> LF,
    LF: Future<Output = Result<Vec<R>, E>>,
    C: FnOnce() -> CF,
    CF: Future<Output = Result<R, E>>,
{
    let existing = list().await?;
    if let Some(found) = existing.into_iter().find(|r| r.name() == name) {
        tracing::info!(kind = R::KIND, %name, "Resource already exists");
        return Ok(OperationResult::already_exists(
            found,
            format!("{} '{}' already exists", R::KIND, name),
        ));
    }

    let created = create().await?;
    tracing::info!(kind = R::KIND, %name, "Resource created");
    Ok(OperationResult::created(
        created,
        format!("{} '{}' created successfully", R::KIND, name),
    ))
}

/// Like [`reconcile`] for resources the backend can look up by key directly.
pub async fn reconcile_lookup<R, E, L, LF, C, CF>(
    key: &str,
    lookup: L,
    create: C,
) -> Result<OperationResult<R>, E>
where
    R: NamedResource,
    L: FnOnce() -> LF,
    LF: Future<Output = Result<Option<R>, E>>,
    C: FnOnce() -> CF,
    CF: Future<Output = Result<R, E>>,
{
    if let Some(found) = lookup().await? {
        tracing::info!(kind = R::KIND, %key, "Resource already exists");
        return Ok(OperationResult::already_exists(
            found,
            format!("{} '{}' already exists", R::KIND, key),
        ));
    }

    let created = create().await?;
    tracing::info!(kind = R::KIND, %key, "Resource created");
    Ok(OperationResult::created(
        created,
        format!("{} '{}' created successfully", R::KIND, key),
    ))
}
