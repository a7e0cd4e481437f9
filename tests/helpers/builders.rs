use chrono::Utc;

use keyward::authz::schema::{NamespaceModel, RelationDefinitionModel, SchemaModel};
use keyward::backend::{CreatedUser, FailedUser, SsoApp};
use keyward::migration::LegacyUser;
use keyward::resources::{Application, Tenant, User};

/// Builder for legacy user records
pub struct LegacyUserBuilder {
    user: LegacyUser,
}

impl LegacyUserBuilder {
    pub fn new(email: &str) -> Self {
        Self {
            user: LegacyUser {
                email: email.to_string(),
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                tenant_id: "acme".to_string(),
                roles: Vec::new(),
                bcrypt_hash: "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy"
                    .to_string(),
            },
        }
    }

    pub fn named(mut self, first: &str, last: &str) -> Self {
        self.user.first_name = first.to_string();
        self.user.last_name = last.to_string();
        self
    }

    pub fn in_tenant(mut self, tenant_id: &str) -> Self {
        self.user.tenant_id = tenant_id.to_string();
        self
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.user.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn build(self) -> LegacyUser {
        self.user
    }
}

/// Shortcut-form schema from `(namespace, [(relation, [targets])])` entries
pub fn shortcut_schema(namespaces: &[(&str, &[(&str, &[&str])])]) -> SchemaModel {
    SchemaModel {
        name: None,
        namespaces: namespaces
            .iter()
            .map(|(ns, rels)| NamespaceModel {
                name: ns.to_string(),
                relation_definitions: rels
                    .iter()
                    .map(|(name, targets)| RelationDefinitionModel::shortcut(*name, targets))
                    .collect(),
            })
            .collect(),
    }
}

pub fn application(id: &str, name: &str) -> Application {
    Application {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        created_at: Utc::now(),
    }
}

pub fn tenant(id: &str, name: &str) -> Tenant {
    Tenant {
        id: id.to_string(),
        name: name.to_string(),
        created_at: Utc::now(),
    }
}

pub fn user(id: &str, login_id: &str) -> User {
    User {
        id: id.to_string(),
        login_id: login_id.to_string(),
        email: Some(login_id.to_string()),
        tenant_id: None,
        created_at: Utc::now(),
    }
}

pub fn sso_app(id: &str, name: &str, app_type: Option<&str>) -> SsoApp {
    SsoApp {
        id: id.to_string(),
        name: name.to_string(),
        app_type: app_type.map(str::to_string),
        ..Default::default()
    }
}

pub fn created(user_id: &str, login_id: &str) -> CreatedUser {
    CreatedUser {
        user_id: user_id.to_string(),
        login_id: Some(login_id.to_string()),
    }
}

pub fn failed(login_id: Option<&str>, reason: Option<&str>) -> FailedUser {
    FailedUser {
        login_id: login_id.map(str::to_string),
        failure: reason.map(str::to_string),
    }
}
