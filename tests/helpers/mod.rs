#![allow(dead_code)]

pub mod backend;
pub mod builders;

pub use backend::{FakeBackend, FakeState};
pub use builders::{
    application, created, failed, shortcut_schema, sso_app, tenant, user, LegacyUserBuilder,
};
