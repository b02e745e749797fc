//! Mutation related error types

use super::remote::{ErrorKind, RemoteError};
use crate::mutation::MutationKind;
use thiserror::Error;

/// Terminal mutation failures surfaced to callers
///
/// Every variant is surfaced only after the cache has been rolled back to
/// its pre-mutation state.
#[derive(Error, Debug, Clone)]
pub enum MutationError {
    /// The remote call failed and no further attempt will be made
    #[error("{kind} failure after {attempts} attempt(s): {source}")]
    Rejected {
        kind: ErrorKind,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// A mutation that addresses an existing record was built without one
    #[error("{kind} mutation on '{resource_type}' requires a target id")]
    MissingTarget {
        kind: MutationKind,
        resource_type: String,
    },

    /// The descriptor names no resource type
    #[error("Mutation descriptor has an empty resource type")]
    EmptyResourceType,

    /// The caller dropped the mutation before it settled
    #[error("Mutation was cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl MutationError {
    /// Create a rejected error, classifying the remote failure
    pub fn rejected(attempts: u32, source: RemoteError) -> Self {
        Self::Rejected {
            kind: source.kind(),
            attempts,
            source,
        }
    }

    /// Create a missing target error
    pub fn missing_target(kind: MutationKind, resource_type: &str) -> Self {
        Self::MissingTarget {
            kind,
            resource_type: resource_type.to_string(),
        }
    }

    /// Taxonomy class of the remote failure, if this was one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Number of remote attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Rejected { attempts, .. } | Self::Cancelled { attempts } => *attempts,
            _ => 0,
        }
    }

    /// The final remote error, if any
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Rejected { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_classifies_source() {
        let error = MutationError::rejected(1, RemoteError::conflict("name taken"));
        assert_eq!(error.kind(), Some(ErrorKind::Conflict));
        assert_eq!(error.attempts(), 1);
        assert_eq!(error.remote().map(|e| e.code.as_str()), Some("conflict"));
    }

    #[test]
    fn test_missing_target() {
        let error = MutationError::missing_target(MutationKind::Update, "users");
        assert!(matches!(error, MutationError::MissingTarget { .. }));
        assert_eq!(error.attempts(), 0);
        assert!(error.remote().is_none());
        assert_eq!(
            error.to_string(),
            "update mutation on 'users' requires a target id"
        );
    }

    #[test]
    fn test_cancelled_keeps_attempts() {
        let error = MutationError::Cancelled { attempts: 2 };
        assert_eq!(error.attempts(), 2);
        assert!(error.kind().is_none());
        assert_eq!(error.to_string(), "Mutation was cancelled after 2 attempt(s)");
    }
}
