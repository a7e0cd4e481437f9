//! Named identity resources and their idempotent create operations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{
    BackendError, IdentityBackend, NewApplication, NewFederatedApp, NewTenant, NewUser, SsoApp,
};
use crate::errors::KeywardError;
use crate::reconcile::{reconcile, reconcile_lookup, NamedResource};
use crate::result::OperationResult;

pub use crate::backend::{FederatedProtocol, SamlOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FederatedAppType {
    Oidc,
    Saml,
}

impl FederatedAppType {
    /// Infer the protocol from the backend-reported app type. Anything but
    /// "saml" is treated as OIDC.
    pub fn infer(app_type: Option<&str>) -> Self {
        match app_type {
            Some(t) if t.eq_ignore_ascii_case("saml") => FederatedAppType::Saml,
            _ => FederatedAppType::Oidc,
        }
    }
}

impl fmt::Display for FederatedAppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FederatedAppType::Oidc => f.write_str("OIDC"),
            FederatedAppType::Saml => f.write_str("SAML"),
        }
    }
}

impl FromStr for FederatedAppType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("oidc") {
            Ok(FederatedAppType::Oidc)
        } else if s.eq_ignore_ascii_case("saml") {
            Ok(FederatedAppType::Saml)
        } else {
            Err(format!(
                "Invalid federated application type: {s}. Valid values: oidc, saml"
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedApplication {
    pub id: String,
    pub name: String,
    pub description: String,
    pub app_type: FederatedAppType,
    pub login_page_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<SsoApp> for FederatedApplication {
    fn from(app: SsoApp) -> Self {
        let app_type = FederatedAppType::infer(app.app_type.as_deref());
        let settings = match app_type {
            FederatedAppType::Oidc => app.oidc_settings,
            FederatedAppType::Saml => app.saml_settings,
        };
        FederatedApplication {
            id: app.id,
            name: app.name,
            description: app.description.unwrap_or_default(),
            app_type,
            login_page_url: settings.and_then(|s| s.login_page_url).unwrap_or_default(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub login_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NamedResource for Application {
    const KIND: &'static str = "Application";
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedResource for Tenant {
    const KIND: &'static str = "Tenant";
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedResource for FederatedApplication {
    const KIND: &'static str = "Federated application";
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedResource for User {
    const KIND: &'static str = "User";
    fn name(&self) -> &str {
        &self.login_id
    }
}

/// Deterministic tenant id: lowercase, each whitespace run becomes one `-`.
pub fn tenant_id_for(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

pub async fn create_application(
    backend: &dyn IdentityBackend,
    name: &str,
    description: &str,
) -> Result<OperationResult<Application>, KeywardError> {
    tracing::info!(%name, "Creating application");
    let request = NewApplication {
        name: name.to_string(),
        description: description.to_string(),
    };
    reconcile(
        name,
        || backend.load_applications(),
        || backend.create_application(&request),
    )
    .await
    .map_err(|e| KeywardError::operation(format!("create application '{name}'"), e))
}

pub async fn create_tenant(
    backend: &dyn IdentityBackend,
    name: &str,
) -> Result<OperationResult<Tenant>, KeywardError> {
    let request = NewTenant {
        id: tenant_id_for(name),
        name: name.to_string(),
    };
    tracing::info!(%name, id = %request.id, "Creating tenant");
    reconcile(
        name,
        || backend.load_tenants(),
        || backend.create_tenant(&request),
    )
    .await
    .map_err(|e| KeywardError::operation(format!("create tenant '{name}'"), e))
}

pub async fn create_federated_application(
    backend: &dyn IdentityBackend,
    request: &NewFederatedApp,
) -> Result<OperationResult<FederatedApplication>, KeywardError> {
    let name = request.name.as_str();
    let saml = matches!(request.protocol, FederatedProtocol::Saml(_));
    tracing::info!(%name, saml, "Creating federated application");
    reconcile(
        name,
        || async {
            let apps = backend.load_federated_apps().await?;
            Ok::<_, BackendError>(apps.into_iter().map(FederatedApplication::from).collect())
        },
        || async {
            let id = backend.create_federated_app(request).await?;
            let created = backend.load_federated_app(&id).await?;
            let mut app = FederatedApplication::from(created);
            // the backend may not echo the URL back
            if app.login_page_url.is_empty() {
                app.login_page_url = request.login_page_url.clone();
            }
            Ok::<_, BackendError>(app)
        },
    )
    .await
    .map_err(|e| KeywardError::operation(format!("create federated application '{name}'"), e))
}

pub async fn create_user(
    backend: &dyn IdentityBackend,
    login_id: &str,
    email: Option<&str>,
    tenant_id: Option<&str>,
) -> Result<OperationResult<User>, KeywardError> {
    tracing::info!(%login_id, tenant = ?tenant_id, "Creating user");
    let request = NewUser {
        login_id: login_id.to_string(),
        email: email.map(str::to_string),
        tenant_id: tenant_id.map(str::to_string),
    };
    reconcile_lookup(
        login_id,
        || backend.load_user(login_id),
        || backend.create_user(&request),
    )
    .await
    .map_err(|e| KeywardError::operation(format!("create user '{login_id}'"), e))
}
