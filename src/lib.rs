//! Keyward - idempotent identity resource and ReBAC schema management
//!
//! Creates applications, tenants, federated apps and users only when they
//! are missing, migrates pre-hashed users in bulk, and manages the ReBAC
//! schema and relation tuples of an identity backend.

pub mod authz;
pub mod backend;
pub mod errors;
pub mod migration;
pub mod reconcile;
pub mod resources;
pub mod result;
pub mod settings;

pub use backend::{BackendError, HttpBackend, IdentityBackend};
pub use errors::KeywardError;
pub use result::{ItemFailure, OperationResult, Status};
