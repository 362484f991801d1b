use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Verb;

/// Every error a view can return.
///
/// Errors raised by a [`crate::ResourceAccessor`] travel through the
/// enforcer unchanged, so a storage failure is never reported as a claim
/// decision and a claim decision is never reported as a storage failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClaimError {
    #[error("{verb} of {resource} \"{name}\" is forbidden: {reason}")]
    Forbidden {
        verb: Verb,
        resource: String,
        name: String,
        reason: String,
    },

    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: String, name: String },

    #[error("{resource} \"{name}\" already exists")]
    AlreadyExists { resource: String, name: String },

    #[error("conflict on {resource} \"{name}\": {reason}")]
    Conflict {
        resource: String,
        name: String,
        reason: String,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("duplicate virtual workspace \"{0}\"")]
    DuplicateWorkspace(String),

    #[error("admission plugin {plugin} denied the request: {reason}")]
    Admission { plugin: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Poisoned lock error: {0}")]
    PoisonedLockError(String),
}

impl ClaimError {
    pub fn forbidden(
        verb: Verb,
        resource: impl ToString,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ClaimError::Forbidden {
            verb,
            resource: resource.to_string(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: impl ToString, name: impl Into<String>) -> Self {
        ClaimError::NotFound {
            resource: resource.to_string(),
            name: name.into(),
        }
    }

    pub fn already_exists(resource: impl ToString, name: impl Into<String>) -> Self {
        ClaimError::AlreadyExists {
            resource: resource.to_string(),
            name: name.into(),
        }
    }

    /// HTTP status a REST front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ClaimError::Forbidden { .. } | ClaimError::Admission { .. } => 403,
            ClaimError::NotFound { .. } => 404,
            ClaimError::AlreadyExists { .. } | ClaimError::Conflict { .. } => 409,
            ClaimError::InvalidFormat(_) => 400,
            ClaimError::Backend(_)
            | ClaimError::DuplicateWorkspace(_)
            | ClaimError::Config(_)
            | ClaimError::PoisonedLockError(_) => 500,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, ClaimError::Forbidden { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClaimError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClaimError::AlreadyExists { .. })
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClaimError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ClaimError::PoisonedLockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        forbidden = { ClaimError::forbidden(Verb::Create, "configmaps", "confmap1", "no claim"), 403 },
        not_found = { ClaimError::not_found("configmaps", "confmap1"), 404 },
        exists = { ClaimError::already_exists("configmaps", "confmap1"), 409 },
        backend = { ClaimError::Backend("etcd unavailable".into()), 500 },
        invalid = { ClaimError::InvalidFormat("bad".into()), 400 },
        admission = { ClaimError::Admission { plugin: "p".into(), reason: "r".into() }, 403 },
    )]
    fn test_status_codes(err: ClaimError, expected: u16) {
        assert_eq!(err.status_code(), expected);
    }

    #[test]
    fn test_forbidden_message() {
        let err = ClaimError::forbidden(
            Verb::Create,
            "configmaps",
            "confmap1",
            "not covered by an accepted permission claim",
        );
        assert_eq!(
            err.to_string(),
            "create of configmaps \"confmap1\" is forbidden: not covered by an accepted permission claim"
        );
        assert!(err.is_forbidden());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_serialization() {
        let err = ClaimError::not_found("configmaps", "unique");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["NotFound"]["name"], "unique");
    }
}
