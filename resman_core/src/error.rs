//! Error types for the resman core library
//!
//! Errors are organized into categories:
//! - Remote errors: typed rejections produced by the remote transport
//! - Mutation errors: terminal failures surfaced by the mutation engine
//! - Config errors: invalid engine configuration

use thiserror::Error;

pub mod config;
pub mod mutation;
pub mod remote;

pub use self::config::ConfigError;
pub use self::mutation::MutationError;
pub use self::remote::{ErrorKind, FieldError, RemoteError};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the resman core library
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Remote transport rejections
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Terminal mutation failures
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// Engine configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Taxonomy class of the underlying remote failure, if any
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Remote(err) => Some(err.kind()),
            Self::Mutation(err) => err.kind(),
            Self::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::MutationKind;

    #[test]
    fn test_remote_error_conversion() {
        let error: Error = RemoteError::permission("forbidden").into();
        assert!(matches!(error, Error::Remote(_)));
        assert_eq!(error.kind(), Some(ErrorKind::Permission));
    }

    #[test]
    fn test_mutation_error_conversion() {
        let error: Error = MutationError::rejected(3, RemoteError::timeout("gateway timeout")).into();
        assert_eq!(error.kind(), Some(ErrorKind::Transient));
        assert!(error.to_string().contains("3 attempt"));
    }

    #[test]
    fn test_missing_target_has_no_kind() {
        let error: Error = MutationError::missing_target(MutationKind::Delete, "limits").into();
        assert_eq!(error.kind(), None);
        assert!(error.to_string().contains("limits"));
    }

    #[test]
    fn test_config_error_display() {
        let error: Error = ConfigError::invalid("max_attempts", "must be at least 1").into();
        assert!(error.kind().is_none());
        assert!(error.to_string().contains("max_attempts"));
    }
}
