//! Narrow interface to the identity backend (the system of record for
//! applications, tenants, users, the ReBAC schema and relation tuples).

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authz::tree::Schema;
use crate::authz::types::{RelationCheck, RelationQuery, RelationTuple};
use crate::migration::BatchUser;
use crate::resources::{Application, Tenant, User};

pub use http::HttpBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}{}", code_suffix(.code))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTenant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub login_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamlOptions {
    pub entity_id: String,
    pub acs_url: String,
    pub certificate: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederatedProtocol {
    Oidc,
    Saml(SamlOptions),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFederatedApp {
    pub name: String,
    pub description: String,
    pub login_page_url: String,
    pub protocol: FederatedProtocol,
}

/// A federated (SSO) application as the backend reports it. Which settings
/// block is populated depends on the protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoApp {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub app_type: Option<String>,
    #[serde(default)]
    pub oidc_settings: Option<LoginPageSettings>,
    #[serde(default)]
    pub saml_settings: Option<LoginPageSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPageSettings {
    #[serde(default)]
    pub login_page_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    #[serde(default)]
    pub created_users: Vec<CreatedUser>,
    #[serde(default)]
    pub failed_users: Vec<FailedUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub user_id: String,
    #[serde(default)]
    pub login_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUser {
    #[serde(default)]
    pub login_id: Option<String>,
    #[serde(default)]
    pub failure: Option<String>,
}

/// Every call is a single request/response. Implementations hold no state
/// that outlives a call apart from connection configuration.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn load_applications(&self) -> Result<Vec<Application>, BackendError>;
    async fn create_application(&self, app: &NewApplication) -> Result<Application, BackendError>;

    async fn load_tenants(&self) -> Result<Vec<Tenant>, BackendError>;
    async fn create_tenant(&self, tenant: &NewTenant) -> Result<Tenant, BackendError>;

    async fn load_federated_apps(&self) -> Result<Vec<SsoApp>, BackendError>;
    /// Returns the id assigned to the new application.
    async fn create_federated_app(&self, app: &NewFederatedApp) -> Result<String, BackendError>;
    async fn load_federated_app(&self, id: &str) -> Result<SsoApp, BackendError>;

    async fn load_user(&self, login_id: &str) -> Result<Option<User>, BackendError>;
    async fn create_user(&self, user: &NewUser) -> Result<User, BackendError>;
    async fn create_users_batch(&self, users: &[BatchUser]) -> Result<BatchResponse, BackendError>;

    async fn load_schema(&self) -> Result<Option<Schema>, BackendError>;
    async fn save_schema(&self, schema: &Schema, upgrade: bool) -> Result<(), BackendError>;
    async fn delete_schema(&self) -> Result<(), BackendError>;

    async fn create_relations(&self, relations: &[RelationTuple]) -> Result<(), BackendError>;
    async fn delete_relations(&self, relations: &[RelationTuple]) -> Result<(), BackendError>;
    async fn has_relations(
        &self,
        queries: &[RelationQuery],
    ) -> Result<Vec<RelationCheck>, BackendError>;
    async fn who_can_access(
        &self,
        resource: &str,
        relation: &str,
        namespace: &str,
    ) -> Result<Vec<String>, BackendError>;
    async fn resource_relations(&self, resource: &str) -> Result<Vec<RelationTuple>, BackendError>;
    async fn what_can_target_access(
        &self,
        target: &str,
    ) -> Result<Vec<RelationTuple>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_display_includes_code() {
        let err = BackendError::Api {
            status: 400,
            code: Some("E011002".into()),
            message: "Tenant name already in use".into(),
        };
        assert_eq!(err.to_string(), "Tenant name already in use (E011002)");

        let err = BackendError::Api {
            status: 500,
            code: None,
            message: "Internal".into(),
        };
        assert_eq!(err.to_string(), "Internal");
    }

    #[test]
    fn test_batch_response_tolerates_missing_lists() {
        let resp: BatchResponse = serde_json::from_value(json!({
            "failedUsers": [{"failure": "duplicate"}]
        }))
        .unwrap();
        assert!(resp.created_users.is_empty());
        assert_eq!(resp.failed_users[0].failure.as_deref(), Some("duplicate"));
        assert!(resp.failed_users[0].login_id.is_none());
    }

    #[test]
    fn test_sso_app_settings_are_optional() {
        let app: SsoApp = serde_json::from_value(json!({
            "id": "sso-1",
            "name": "Portal",
            "appType": "saml",
            "samlSettings": {"loginPageUrl": "https://idp.example.com/login"}
        }))
        .unwrap();
        assert!(app.oidc_settings.is_none());
        assert_eq!(
            app.saml_settings.unwrap().login_page_url.as_deref(),
            Some("https://idp.example.com/login")
        );
    }
}
