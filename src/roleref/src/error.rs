//! Error types for role reference reconciliation

use thiserror::Error;

/// Persistence errors raised by repositories
///
/// Any of these is fatal to the reconciliation in flight.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness conflict (e.g. duplicate principal name)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Anything else the backend surfaces
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Result type for repository operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Role reference reconciliation errors
#[derive(Debug, Error)]
pub enum RoleRefError {
    /// Invalid input, surfaced to the caller verbatim
    #[error("{0}")]
    InvalidInput(String),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A commit-time association failed
    #[error("{0}")]
    DeferredFailure(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoleRefError {
    /// True for errors the REST layer reports as bad input
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, RoleRefError::InvalidInput(_))
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, RoleRefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_is_verbatim() {
        let err = RoleRefError::InvalidInput("user with name: bob does not exist ".to_string());
        assert_eq!(err.to_string(), "user with name: bob does not exist ");
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: RoleRefError = StoreError::Conflict("role r0".to_string()).into();
        assert!(matches!(err, RoleRefError::Store(StoreError::Conflict(_))));
        assert_eq!(err.to_string(), "Store error: conflict: role r0");
    }
}
