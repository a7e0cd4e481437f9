use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use keyward::authz::tree::Schema;
use keyward::authz::types::{RelationCheck, RelationQuery, RelationTuple};
use keyward::backend::{
    BackendError, BatchResponse, IdentityBackend, NewApplication, NewFederatedApp, NewTenant,
    NewUser, SsoApp,
};
use keyward::migration::BatchUser;
use keyward::resources::{Application, Tenant, User};

/// Everything the fake knows, plus what it was asked.
#[derive(Default)]
pub struct FakeState {
    pub applications: Vec<Application>,
    pub tenants: Vec<Tenant>,
    pub sso_apps: Vec<SsoApp>,
    pub users: Vec<User>,
    pub schema: Option<Schema>,
    /// `load_schema` answers with `NotFound` instead of `None`
    pub schema_not_found: bool,
    pub relations: Vec<RelationTuple>,
    pub batch_response: BatchResponse,
    /// Every call fails with this API error when set
    pub fail_with: Option<String>,

    pub calls: Vec<&'static str>,
    pub saved_schemas: Vec<(Schema, bool)>,
    pub created_tenants: Vec<NewTenant>,
    pub created_sso_apps: Vec<NewFederatedApp>,
    pub batches: Vec<Vec<BatchUser>>,
}

/// In-memory [`IdentityBackend`] that records every call.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == call).count()
    }

    fn enter(&self, call: &'static str) -> Result<std::sync::MutexGuard<'_, FakeState>, BackendError> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(message) = state.fail_with.clone() {
            return Err(BackendError::Api {
                status: 500,
                code: Some("E000000".into()),
                message,
            });
        }
        Ok(state)
    }
}

fn matches(query: &RelationQuery, tuple: &RelationTuple) -> bool {
    fn field(filter: &Option<String>, value: &str) -> bool {
        filter.as_deref().map_or(true, |f| f == value)
    }
    field(&query.resource, &tuple.resource)
        && field(&query.relation, &tuple.relation)
        && field(&query.namespace, &tuple.namespace)
        && field(&query.target, &tuple.target)
}

#[async_trait]
impl IdentityBackend for FakeBackend {
    async fn load_applications(&self) -> Result<Vec<Application>, BackendError> {
        Ok(self.enter("load_applications")?.applications.clone())
    }

    async fn create_application(&self, app: &NewApplication) -> Result<Application, BackendError> {
        let mut state = self.enter("create_application")?;
        let created = Application {
            id: format!("app-{}", state.applications.len() + 1),
            name: app.name.clone(),
            description: app.description.clone(),
            created_at: Utc::now(),
        };
        state.applications.push(created.clone());
        Ok(created)
    }

    async fn load_tenants(&self) -> Result<Vec<Tenant>, BackendError> {
        Ok(self.enter("load_tenants")?.tenants.clone())
    }

    async fn create_tenant(&self, tenant: &NewTenant) -> Result<Tenant, BackendError> {
        let mut state = self.enter("create_tenant")?;
        state.created_tenants.push(tenant.clone());
        let created = Tenant {
            id: tenant.id.clone(),
            name: tenant.name.clone(),
            created_at: Utc::now(),
        };
        state.tenants.push(created.clone());
        Ok(created)
    }

    async fn load_federated_apps(&self) -> Result<Vec<SsoApp>, BackendError> {
        Ok(self.enter("load_federated_apps")?.sso_apps.clone())
    }

    async fn create_federated_app(&self, app: &NewFederatedApp) -> Result<String, BackendError> {
        let mut state = self.enter("create_federated_app")?;
        state.created_sso_apps.push(app.clone());
        let id = format!("sso-{}", state.sso_apps.len() + 1);
        let app_type = match app.protocol {
            keyward::backend::FederatedProtocol::Oidc => "oidc",
            keyward::backend::FederatedProtocol::Saml(_) => "saml",
        };
        state.sso_apps.push(SsoApp {
            id: id.clone(),
            name: app.name.clone(),
            description: Some(app.description.clone()),
            app_type: Some(app_type.into()),
            ..Default::default()
        });
        Ok(id)
    }

    async fn load_federated_app(&self, id: &str) -> Result<SsoApp, BackendError> {
        self.enter("load_federated_app")?
            .sso_apps
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn load_user(&self, login_id: &str) -> Result<Option<User>, BackendError> {
        Ok(self
            .enter("load_user")?
            .users
            .iter()
            .find(|u| u.login_id == login_id)
            .cloned())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, BackendError> {
        let mut state = self.enter("create_user")?;
        let created = User {
            id: format!("U{}", state.users.len() + 1),
            login_id: user.login_id.clone(),
            email: user.email.clone(),
            tenant_id: user.tenant_id.clone(),
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn create_users_batch(&self, users: &[BatchUser]) -> Result<BatchResponse, BackendError> {
        let mut state = self.enter("create_users_batch")?;
        state.batches.push(users.to_vec());
        Ok(state.batch_response.clone())
    }

    async fn load_schema(&self) -> Result<Option<Schema>, BackendError> {
        let state = self.enter("load_schema")?;
        if state.schema_not_found {
            return Err(BackendError::NotFound("schema".into()));
        }
        Ok(state.schema.clone())
    }

    async fn save_schema(&self, schema: &Schema, upgrade: bool) -> Result<(), BackendError> {
        let mut state = self.enter("save_schema")?;
        state.saved_schemas.push((schema.clone(), upgrade));
        state.schema = Some(schema.clone());
        state.schema_not_found = false;
        Ok(())
    }

    async fn delete_schema(&self) -> Result<(), BackendError> {
        self.enter("delete_schema")?.schema = None;
        Ok(())
    }

    async fn create_relations(&self, relations: &[RelationTuple]) -> Result<(), BackendError> {
        self.enter("create_relations")?
            .relations
            .extend(relations.iter().cloned());
        Ok(())
    }

    async fn delete_relations(&self, relations: &[RelationTuple]) -> Result<(), BackendError> {
        self.enter("delete_relations")?
            .relations
            .retain(|r| !relations.contains(r));
        Ok(())
    }

    async fn has_relations(
        &self,
        queries: &[RelationQuery],
    ) -> Result<Vec<RelationCheck>, BackendError> {
        let state = self.enter("has_relations")?;
        Ok(queries
            .iter()
            .map(|q| RelationCheck {
                query: q.clone(),
                has_relation: state.relations.iter().any(|t| matches(q, t)),
            })
            .collect())
    }

    async fn who_can_access(
        &self,
        resource: &str,
        relation: &str,
        namespace: &str,
    ) -> Result<Vec<String>, BackendError> {
        let state = self.enter("who_can_access")?;
        Ok(state
            .relations
            .iter()
            .filter(|t| t.resource == resource && t.relation == relation && t.namespace == namespace)
            .map(|t| t.target.clone())
            .collect())
    }

    async fn resource_relations(&self, resource: &str) -> Result<Vec<RelationTuple>, BackendError> {
        let state = self.enter("resource_relations")?;
        Ok(state
            .relations
            .iter()
            .filter(|t| t.resource == resource)
            .cloned()
            .collect())
    }

    async fn what_can_target_access(
        &self,
        target: &str,
    ) -> Result<Vec<RelationTuple>, BackendError> {
        let state = self.enter("what_can_target_access")?;
        Ok(state
            .relations
            .iter()
            .filter(|t| t.target == target)
            .cloned()
            .collect())
    }
}
