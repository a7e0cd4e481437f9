use miette::Diagnostic;
use thiserror::Error;

use crate::authz::errors::AuthzError;
use crate::backend::BackendError;

#[derive(Debug, Error, Diagnostic)]
pub enum KeywardError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(keyward::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(keyward::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(keyward::serde))]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] AuthzError),

    /// A backend call could not be completed. Aborts the current operation.
    #[error("Failed to {operation}: {source}")]
    #[diagnostic(
        code(keyward::backend),
        help("Check the backend URL, project id and management key")
    )]
    Operation {
        operation: String,
        #[source]
        source: BackendError,
    },

    #[error("Failed to read user file `{path}`")]
    #[diagnostic(
        code(keyward::migration::user_file_load),
        help("Check that the file exists and is readable")
    )]
    UserFileLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid user file `{path}`: {source}")]
    #[diagnostic(
        code(keyward::migration::invalid_user_file),
        help("Expected a JSON array of {{ \"email\", \"firstName\", \"lastName\", \"tenantId\", \"roles\", \"bcryptHash\" }}")
    )]
    InvalidUserFile {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Migration batch must contain at least one user")]
    #[diagnostic(code(keyward::migration::empty_batch))]
    EmptyMigrationBatch,

    #[error("Bad request: {0}")]
    #[diagnostic(code(keyward::bad_request))]
    BadRequest(String),
}

impl KeywardError {
    /// Wrap a backend failure with the description of what was being attempted.
    pub fn operation(operation: impl Into<String>, source: BackendError) -> Self {
        let operation = operation.into();
        tracing::error!(%operation, error = %source, "Backend call failed");
        KeywardError::Operation { operation, source }
    }
}
