//! Unified error taxonomy for the core (§7): every operation on a core
//! service returns one of these variants, translated from whichever
//! subsystem error (`DbError`, `CacheError`, `EncryptionError`, ...)
//! actually failed.

use thiserror::Error;

use crate::access::AccessLevel;
use crate::cache::CacheError;
use crate::db::DbError;
use crate::encryption::EncryptionError;

/// The error taxonomy every core operation returns (§7).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("forbidden: caller lacks {required} access")]
    Forbidden { required: AccessLevel },

    #[error("validation error on {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("conflict: {code}")]
    Conflict {
        code: &'static str,
        details: Option<String>,
    },

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn forbidden(required: AccessLevel) -> Self {
        CoreError::Forbidden { required }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, details: Option<String>) -> Self {
        CoreError::Conflict { code, details }
    }
}

/// Cache failures degrade to storage and never surface (§4.3, §7); this
/// conversion exists only for code paths that choose to bubble one up
/// explicitly (none in the engine, some in admin tooling).
impl From<CacheError> for CoreError {
    fn from(e: CacheError) -> Self {
        CoreError::Unavailable(e.to_string())
    }
}

impl From<EncryptionError> for CoreError {
    fn from(e: EncryptionError) -> Self {
        CoreError::Internal(e.to_string())
    }
}

impl From<DbError> for CoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound => CoreError::NotFound {
                resource: "resource",
                id: String::new(),
            },
            DbError::Conflict(details) => CoreError::Conflict {
                code: "CONFLICT",
                details: Some(details),
            },
            DbError::Validation(message) => CoreError::Validation {
                field: "unknown",
                message,
            },
            DbError::NotConfigured => {
                CoreError::Unavailable("database not configured".to_string())
            }
            other => CoreError::Internal(other.to_string()),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
