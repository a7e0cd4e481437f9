//! Bulk import of users from a legacy store whose passwords are already
//! bcrypt-hashed. Hashes are forwarded as-is.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{BatchResponse, IdentityBackend};
use crate::errors::KeywardError;
use crate::result::{ItemFailure, OperationResult};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tenant_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub bcrypt_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUser {
    pub login_id: String,
    pub email: String,
    pub verified_email: bool,
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,
    pub user_tenants: Vec<UserTenant>,
    pub hashed_password: HashedPassword,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTenant {
    pub tenant_id: String,
    pub role_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashedPassword {
    pub bcrypt: BcryptHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BcryptHash {
    pub hash: String,
}

impl From<&LegacyUser> for BatchUser {
    fn from(u: &LegacyUser) -> Self {
        let display_name = [u.first_name.as_str(), u.last_name.as_str()]
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        BatchUser {
            login_id: u.email.clone(),
            email: u.email.clone(),
            verified_email: true,
            given_name: u.first_name.clone(),
            family_name: u.last_name.clone(),
            display_name,
            user_tenants: vec![UserTenant {
                tenant_id: u.tenant_id.clone(),
                role_names: u.roles.clone(),
            }],
            hashed_password: HashedPassword {
                bcrypt: BcryptHash {
                    hash: u.bcrypt_hash.clone(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratedUser {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
    pub migrated_at: DateTime<Utc>,
}

/// Identifier reported for a response entry that cannot be tied to a
/// submitted record.
pub const UNKNOWN_USER: &str = "<unknown>";

const NOTHING_CREATED: &str = "No user was created";

/// Read a JSON array of legacy users.
pub fn load_user_file(path: &Path) -> Result<Vec<LegacyUser>, KeywardError> {
    let contents = std::fs::read_to_string(path).map_err(|source| KeywardError::UserFileLoad {
        path: path.display().to_string(),
        source,
    })?;
    let users: Vec<LegacyUser> =
        serde_json::from_str(&contents).map_err(|source| KeywardError::InvalidUserFile {
            path: path.display().to_string(),
            source,
        })?;

    tracing::debug!(path = %path.display(), users = users.len(), "Loaded user file");
    Ok(users)
}

/// Submit every record in one batch call and partition the response.
///
/// Any failed record makes the whole result a `Failure`; all failures are
/// listed, the message carries the first one's reason, and users created in
/// the same batch are kept as the partial data.
pub async fn migrate_users(
    backend: &dyn IdentityBackend,
    users: &[LegacyUser],
) -> Result<OperationResult<Vec<MigratedUser>>, KeywardError> {
    if users.is_empty() {
        return Err(KeywardError::EmptyMigrationBatch);
    }

    tracing::info!(count = users.len(), "Migrating users");
    let batch: Vec<BatchUser> = users.iter().map(BatchUser::from).collect();
    let response = backend
        .create_users_batch(&batch)
        .await
        .map_err(|e| KeywardError::operation(format!("migrate {} user(s)", users.len()), e))?;

    let Partition { migrated, failures } = partition(users, &response);
    Ok(match failures.first() {
        Some(first) => {
            let message = format!("Failed to migrate users: {}", first.reason);
            if migrated.is_empty() {
                OperationResult::failure_with_items(message, failures)
            } else {
                OperationResult::partial_failure(message, failures, migrated)
            }
        }
        None if migrated.is_empty() => OperationResult::failure(NOTHING_CREATED),
        None => {
            let message = format!("Migrated {} user(s) successfully", migrated.len());
            OperationResult::created(migrated, message)
        }
    })
}

/// Single-record form of [`migrate_users`].
pub async fn migrate_legacy_user(
    backend: &dyn IdentityBackend,
    user: &LegacyUser,
) -> Result<OperationResult<MigratedUser>, KeywardError> {
    tracing::info!(email = %user.email, tenant = %user.tenant_id, "Migrating user");
    let batch = [BatchUser::from(user)];
    let response = backend
        .create_users_batch(&batch)
        .await
        .map_err(|e| KeywardError::operation(format!("migrate user '{}'", user.email), e))?;

    let Partition { migrated, failures } = partition(std::slice::from_ref(user), &response);
    Ok(if let Some(first) = failures.first() {
        let message = format!("Failed to migrate user: {}", first.reason);
        OperationResult::failure_with_items(message, failures)
    } else if let Some(migrated) = migrated.into_iter().next() {
        let message = format!(
            "User '{}' migrated successfully to tenant '{}'",
            migrated.email, migrated.tenant_id
        );
        OperationResult::created(migrated, message)
    } else {
        OperationResult::failure(NOTHING_CREATED)
    })
}

#[derive(Debug)]
struct Partition {
    migrated: Vec<MigratedUser>,
    failures: Vec<ItemFailure>,
}

fn partition(users: &[LegacyUser], response: &BatchResponse) -> Partition {
    let (created_fallback, failed_fallback) = unnamed_users(users, response);
    let mut created_fallback = created_fallback.into_iter();
    let mut failed_fallback = failed_fallback.into_iter();

    let failures: Vec<ItemFailure> = response
        .failed_users
        .iter()
        .map(|f| ItemFailure {
            identifier: match &f.login_id {
                Some(login) => login.clone(),
                None => failed_fallback
                    .next()
                    .map_or_else(|| UNKNOWN_USER.to_string(), |u| u.email.clone()),
            },
            reason: f.failure.clone().unwrap_or_else(|| "Unknown error".to_string()),
        })
        .collect();
    for f in &failures {
        tracing::warn!(user = %f.identifier, reason = %f.reason, "User migration failed");
    }

    let migrated_at = Utc::now();
    let migrated: Vec<MigratedUser> = response
        .created_users
        .iter()
        .map(|created| {
            let source = match &created.login_id {
                Some(login) => users.iter().find(|u| u.email == *login),
                None => created_fallback.next(),
            };
            match source {
                Some(u) => MigratedUser {
                    user_id: created.user_id.clone(),
                    email: u.email.clone(),
                    first_name: u.first_name.clone(),
                    last_name: u.last_name.clone(),
                    tenant_id: u.tenant_id.clone(),
                    roles: u.roles.clone(),
                    migrated_at,
                },
                None => {
                    tracing::warn!(
                        user_id = %created.user_id,
                        "Created user does not match any submitted record"
                    );
                    MigratedUser {
                        user_id: created.user_id.clone(),
                        email: created
                            .login_id
                            .clone()
                            .unwrap_or_else(|| UNKNOWN_USER.to_string()),
                        first_name: String::new(),
                        last_name: String::new(),
                        tenant_id: String::new(),
                        roles: Vec::new(),
                        migrated_at,
                    }
                }
            }
        })
        .collect();

    if migrated.is_empty() && failures.is_empty() {
        tracing::warn!("Batch create returned no created and no failed users");
    } else {
        tracing::info!(created = migrated.len(), failed = failures.len(), "Batch processed");
    }
    Partition { migrated, failures }
}

/// Submitted users to stand in for response entries without a login id,
/// as `(created, failed)`.
///
/// Position is only meaningful when the response accounts for every
/// submitted user and all unnamed entries sit on the same side; then they
/// map, in order, onto the users the response does not name. Otherwise
/// nothing is resolved.
fn unnamed_users<'a>(
    users: &'a [LegacyUser],
    response: &BatchResponse,
) -> (Vec<&'a LegacyUser>, Vec<&'a LegacyUser>) {
    let named = |email: &str| {
        response
            .created_users
            .iter()
            .any(|c| c.login_id.as_deref() == Some(email))
            || response
                .failed_users
                .iter()
                .any(|f| f.login_id.as_deref() == Some(email))
    };
    let unclaimed: Vec<&LegacyUser> = users.iter().filter(|u| !named(&u.email)).collect();

    let unnamed_created = response
        .created_users
        .iter()
        .filter(|c| c.login_id.is_none())
        .count();
    let unnamed_failed = response
        .failed_users
        .iter()
        .filter(|f| f.login_id.is_none())
        .count();
    let accounted = response.created_users.len() + response.failed_users.len() == users.len()
        && unclaimed.len() == unnamed_created + unnamed_failed;

    match (accounted, unnamed_created, unnamed_failed) {
        (true, _, 0) => (unclaimed, Vec::new()),
        (true, 0, _) => (Vec::new(), unclaimed),
        _ => (Vec::new(), Vec::new()),
    }
}
