//! Uniform outcome envelope returned by every management operation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Success,
    Created,
    AlreadyExists,
    Failure,
}

/// One item of a batch that the backend refused, e.g. a migrated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub identifier: String,
    pub reason: String,
}

/// Outcome of an operation that reached a decision.
///
/// The three success variants always carry data and a message; `Failure`
/// carries an error message, any per-item failures and, for batches that
/// partly went through, the items that did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OperationResult<T> {
    Success {
        data: T,
        message: String,
    },
    Created {
        data: T,
        message: String,
    },
    AlreadyExists {
        data: T,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        error_message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        failures: Vec<ItemFailure>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial: Option<T>,
    },
}

impl<T> OperationResult<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self::Success {
            data,
            message: message.into(),
        }
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::Created {
            data,
            message: message.into(),
        }
    }

    pub fn already_exists(data: T, message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            data,
            message: message.into(),
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self::Failure {
            error_message: error_message.into(),
            failures: Vec::new(),
            partial: None,
        }
    }

    pub fn failure_with_items(error_message: impl Into<String>, failures: Vec<ItemFailure>) -> Self {
        Self::Failure {
            error_message: error_message.into(),
            failures,
            partial: None,
        }
    }

    /// Failure of a batch in which `succeeded` still went through.
    pub fn partial_failure(
        error_message: impl Into<String>,
        failures: Vec<ItemFailure>,
        succeeded: T,
    ) -> Self {
        Self::Failure {
            error_message: error_message.into(),
            failures,
            partial: Some(succeeded),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Success { .. } => Status::Success,
            Self::Created { .. } => Status::Created,
            Self::AlreadyExists { .. } => Status::AlreadyExists,
            Self::Failure { .. } => Status::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. }
            | Self::Created { data, .. }
            | Self::AlreadyExists { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success { data, .. }
            | Self::Created { data, .. }
            | Self::AlreadyExists { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { message, .. }
            | Self::Created { message, .. }
            | Self::AlreadyExists { message, .. } => Some(message),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failure { error_message, .. } => Some(error_message),
            _ => None,
        }
    }

    pub fn failures(&self) -> &[ItemFailure] {
        match self {
            Self::Failure { failures, .. } => failures,
            _ => &[],
        }
    }

    /// What a failed batch still completed.
    pub fn partial(&self) -> Option<&T> {
        match self {
            Self::Failure { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }

    /// Transform the carried data, keeping status and messages.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        match self {
            Self::Success { data, message } => OperationResult::Success {
                data: f(data),
                message,
            },
            Self::Created { data, message } => OperationResult::Created {
                data: f(data),
                message,
            },
            Self::AlreadyExists { data, message } => OperationResult::AlreadyExists {
                data: f(data),
                message,
            },
            Self::Failure {
                error_message,
                failures,
                partial,
            } => OperationResult::Failure {
                error_message,
                failures,
                partial: partial.map(f),
            },
        }
    }
}
