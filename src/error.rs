//! Error type shared by every dashboard component.

use thiserror::Error;

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

/// Errors raised by user actions.
///
/// None of these are fatal: the rendering surface reports them to the user and
/// keeps going.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("username '{0}' already exists")]
    DuplicateUsername(String),

    #[error("current password is incorrect")]
    WrongOldPassword,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    ValidationFailure(String),

    #[error("not permitted: {0}")]
    Forbidden(String),

    #[error("you cannot delete the account you are logged in as")]
    SelfDeletion,

    #[error("session rejected: {0}")]
    SessionInvalid(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DashboardError {
    pub fn project_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "project",
            id: id.to_string(),
        }
    }

    pub fn document_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "document",
            id: id.to_string(),
        }
    }

    pub fn user_not_found(username: &str) -> Self {
        Self::NotFound {
            kind: "user",
            id: username.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure(message.into())
    }
}
