//! [`IdentityBackend`] over the management REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::authz::codec::read_stored;
use crate::authz::schema::SchemaModel;
use crate::authz::tree::Schema;
use crate::authz::types::{RelationCheck, RelationQuery, RelationTuple};
use crate::backend::{
    BackendError, BatchResponse, FederatedProtocol, IdentityBackend, NewApplication,
    NewFederatedApp, NewTenant, NewUser, SsoApp,
};
use crate::migration::BatchUser;
use crate::resources::{Application, Tenant, User};
use crate::settings;

static CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct HttpBackend {
    base: String,
    token: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(
        config: &settings::Backend,
        project_id: &str,
        management_key: &str,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(CLIENT_USER_AGENT)
            .build()?;
        Ok(HttpBackend {
            base: config.base_url.trim_end_matches('/').to_string(),
            token: format!("{project_id}:{management_key}"),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        tracing::debug!(%path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        inspect(path, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        tracing::debug!(%path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        inspect(path, response).await
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_code: Option<String>,
    error_description: Option<String>,
    error_message: Option<String>,
}

/// Map non-2xx statuses to errors and decode the body. An empty body
/// decodes as JSON `null`.
async fn inspect<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let text = response.text().await?;

    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::NotFound(path.to_string()));
    }

    if status.is_client_error() || status.is_server_error() {
        let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
        let (code, message) = match body {
            Some(b) => {
                let message = b
                    .error_description
                    .into_iter()
                    .chain(b.error_message)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(": ");
                (b.error_code, message)
            }
            None => (None, String::new()),
        };
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            message
        };
        return Err(BackendError::Api {
            status: status.as_u16(),
            code,
            message,
        });
    }

    let text = if text.trim().is_empty() { "null" } else { &text };
    serde_json::from_str(text)
        .map_err(|e| BackendError::InvalidResponse(format!("{path}: {e}")))
}

// ---------- wire shapes ----------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireApp {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct AppsResponse {
    #[serde(default)]
    apps: Vec<WireApp>,
}

#[derive(Deserialize)]
struct SsoAppsResponse {
    #[serde(default)]
    apps: Vec<SsoApp>,
}

#[derive(Deserialize)]
struct WireTenant {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct TenantsResponse {
    #[serde(default)]
    tenants: Vec<WireTenant>,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUserTenant {
    tenant_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    user_id: String,
    #[serde(default)]
    login_ids: Vec<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_tenants: Vec<WireUserTenant>,
}

#[derive(Deserialize)]
struct UserResponse {
    user: WireUser,
}

impl WireUser {
    fn into_user(self, fallback_login_id: &str) -> User {
        User {
            id: self.user_id,
            login_id: self
                .login_ids
                .into_iter()
                .next()
                .unwrap_or_else(|| fallback_login_id.to_string()),
            email: self.email.filter(|e| !e.is_empty()),
            tenant_id: self.user_tenants.into_iter().next().map(|t| t.tenant_id),
            created_at: Utc::now(),
        }
    }
}

#[derive(Deserialize)]
struct SchemaResponse {
    schema: Option<SchemaModel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCheck {
    #[serde(flatten)]
    query: RelationQuery,
    #[serde(default)]
    has_relation: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChecksResponse {
    #[serde(default)]
    relation_queries: Vec<WireCheck>,
}

#[derive(Deserialize)]
struct TargetsResponse {
    #[serde(default)]
    targets: Vec<String>,
}

#[derive(Deserialize)]
struct RelationsResponse {
    #[serde(default)]
    relations: Vec<RelationTuple>,
}

#[async_trait]
impl IdentityBackend for HttpBackend {
    async fn load_applications(&self) -> Result<Vec<Application>, BackendError> {
        let resp: AppsResponse = self.get("/v1/mgmt/thirdparty/apps/load", &[]).await?;
        let now = Utc::now();
        Ok(resp
            .apps
            .into_iter()
            .map(|a| Application {
                id: a.id,
                name: a.name,
                description: a.description.unwrap_or_default(),
                created_at: now,
            })
            .collect())
    }

    async fn create_application(&self, app: &NewApplication) -> Result<Application, BackendError> {
        let resp: IdResponse = self.post("/v1/mgmt/thirdparty/app/create", app).await?;
        Ok(Application {
            id: resp.id,
            name: app.name.clone(),
            description: app.description.clone(),
            created_at: Utc::now(),
        })
    }

    async fn load_tenants(&self) -> Result<Vec<Tenant>, BackendError> {
        let resp: TenantsResponse = self.get("/v1/mgmt/tenant/all", &[]).await?;
        let now = Utc::now();
        Ok(resp
            .tenants
            .into_iter()
            .map(|t| Tenant {
                id: t.id,
                name: t.name,
                created_at: now,
            })
            .collect())
    }

    async fn create_tenant(&self, tenant: &NewTenant) -> Result<Tenant, BackendError> {
        let resp: Value = self.post("/v1/mgmt/tenant/create", tenant).await?;
        let id = resp
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(&tenant.id)
            .to_string();
        Ok(Tenant {
            id,
            name: tenant.name.clone(),
            created_at: Utc::now(),
        })
    }

    async fn load_federated_apps(&self) -> Result<Vec<SsoApp>, BackendError> {
        let resp: SsoAppsResponse = self.get("/v1/mgmt/sso/idp/apps/load", &[]).await?;
        Ok(resp.apps)
    }

    async fn create_federated_app(&self, app: &NewFederatedApp) -> Result<String, BackendError> {
        let resp: IdResponse = match &app.protocol {
            FederatedProtocol::Oidc => {
                let body = json!({
                    "name": app.name,
                    "description": app.description,
                    "loginPageUrl": app.login_page_url,
                    "enabled": true,
                });
                self.post("/v1/mgmt/sso/idp/app/oidc/create", &body).await?
            }
            FederatedProtocol::Saml(saml) => {
                let body = json!({
                    "name": app.name,
                    "description": app.description,
                    "loginPageUrl": app.login_page_url,
                    "enabled": true,
                    "entityId": saml.entity_id,
                    "acsUrl": saml.acs_url,
                    "certificate": saml.certificate,
                });
                self.post("/v1/mgmt/sso/idp/app/saml/create", &body).await?
            }
        };
        Ok(resp.id)
    }

    async fn load_federated_app(&self, id: &str) -> Result<SsoApp, BackendError> {
        self.get("/v1/mgmt/sso/idp/app/load", &[("id", id)]).await
    }

    async fn load_user(&self, login_id: &str) -> Result<Option<User>, BackendError> {
        match self
            .get::<UserResponse>("/v1/mgmt/user", &[("loginid", login_id)])
            .await
        {
            Ok(resp) => Ok(Some(resp.user.into_user(login_id))),
            Err(BackendError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, BackendError> {
        let tenants: Vec<Value> = user
            .tenant_id
            .iter()
            .map(|t| json!({ "tenantId": t }))
            .collect();
        let body = json!({
            "loginId": user.login_id,
            "email": user.email,
            "userTenants": tenants,
        });
        let resp: UserResponse = self.post("/v1/mgmt/user/create", &body).await?;
        Ok(resp.user.into_user(&user.login_id))
    }

    async fn create_users_batch(&self, users: &[BatchUser]) -> Result<BatchResponse, BackendError> {
        self.post("/v1/mgmt/user/create/batch", &json!({ "users": users }))
            .await
    }

    async fn load_schema(&self) -> Result<Option<Schema>, BackendError> {
        let resp: Option<SchemaResponse> =
            self.post("/v1/mgmt/authz/schema/load", &json!({})).await?;
        let Some(model) = resp.and_then(|r| r.schema) else {
            return Ok(None);
        };
        let schema =
            read_stored(&model).map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(Some(schema))
    }

    async fn save_schema(&self, schema: &Schema, upgrade: bool) -> Result<(), BackendError> {
        let body = json!({
            "schema": SchemaModel::from(schema),
            "upgrade": upgrade,
        });
        let _: Value = self.post("/v1/mgmt/authz/schema/save", &body).await?;
        Ok(())
    }

    async fn delete_schema(&self) -> Result<(), BackendError> {
        let _: Value = self.post("/v1/mgmt/authz/schema/delete", &json!({})).await?;
        Ok(())
    }

    async fn create_relations(&self, relations: &[RelationTuple]) -> Result<(), BackendError> {
        let _: Value = self
            .post("/v1/mgmt/authz/re/create", &json!({ "relations": relations }))
            .await?;
        Ok(())
    }

    async fn delete_relations(&self, relations: &[RelationTuple]) -> Result<(), BackendError> {
        let _: Value = self
            .post("/v1/mgmt/authz/re/delete", &json!({ "relations": relations }))
            .await?;
        Ok(())
    }

    async fn has_relations(
        &self,
        queries: &[RelationQuery],
    ) -> Result<Vec<RelationCheck>, BackendError> {
        let resp: ChecksResponse = self
            .post("/v1/mgmt/authz/re/has", &json!({ "relationQueries": queries }))
            .await?;
        Ok(resp
            .relation_queries
            .into_iter()
            .map(|c| RelationCheck {
                query: c.query,
                has_relation: c.has_relation,
            })
            .collect())
    }

    async fn who_can_access(
        &self,
        resource: &str,
        relation: &str,
        namespace: &str,
    ) -> Result<Vec<String>, BackendError> {
        let body = json!({
            "resource": resource,
            "relationDefinition": relation,
            "namespace": namespace,
        });
        let resp: TargetsResponse = self.post("/v1/mgmt/authz/re/who", &body).await?;
        Ok(resp.targets)
    }

    async fn resource_relations(&self, resource: &str) -> Result<Vec<RelationTuple>, BackendError> {
        let resp: RelationsResponse = self
            .post("/v1/mgmt/authz/re/resource", &json!({ "resource": resource }))
            .await?;
        Ok(resp.relations)
    }

    async fn what_can_target_access(
        &self,
        target: &str,
    ) -> Result<Vec<RelationTuple>, BackendError> {
        let resp: RelationsResponse = self
            .post("/v1/mgmt/authz/re/targets", &json!({ "targets": [target] }))
            .await?;
        Ok(resp.relations)
    }
}
