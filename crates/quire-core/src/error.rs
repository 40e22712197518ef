//! Errors returned by the Quire services
//!
//! Every service call returns `CoreResult`. [`CoreError::kind`] folds the
//! variants into the four categories callers map onto their own surface.

use thiserror::Error;

use crate::models::AccountId;
use crate::storage::StoreError;

/// Broad category of a [`CoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input, nothing was written
    Validation,
    /// Duplicate title or request, or the edge is in the wrong state
    Conflict,
    /// Referenced account, entity or edge does not exist
    NotFound,
    /// The store failed; earlier writes in the same call may persist
    StoreFault,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account not found: {0}")]
    IdentityNotFound(AccountId),

    #[error("An account cannot relate to itself")]
    SelfReference,

    #[error(transparent)]
    Store(StoreError),

    /// A multi-document sequence failed after `completed` writes committed
    #[error("Store failure after {completed} completed write(s): {source}")]
    PartialFailure {
        completed: usize,
        #[source]
        source: StoreError,
    },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) | CoreError::SelfReference => ErrorKind::Validation,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::NotFound(_) | CoreError::IdentityNotFound(_) => ErrorKind::NotFound,
            CoreError::Store(_) | CoreError::PartialFailure { .. } => ErrorKind::StoreFault,
        }
    }

    /// Record that `completed` writes had already committed when `self`
    /// occurred. Store faults become `PartialFailure`; other errors pass
    /// through untouched.
    pub fn after(self, completed: usize) -> Self {
        match self {
            CoreError::Store(source) if completed > 0 => {
                CoreError::PartialFailure { completed, source }
            }
            CoreError::PartialFailure {
                completed: inner,
                source,
            } => CoreError::PartialFailure {
                completed: completed + inner,
                source,
            },
            other => other,
        }
    }

    /// Number of writes that persisted before the failure
    pub fn completed_writes(&self) -> usize {
        match self {
            CoreError::PartialFailure { completed, .. } => *completed,
            _ => 0,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Duplicate { entity, key } => {
                CoreError::Conflict(format!("{entity} '{key}' already exists"))
            }
            other => CoreError::Store(other),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let err: CoreError = StoreError::Duplicate {
            entity: "note",
            key: "draft".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("draft"));
    }

    #[test]
    fn test_after_wraps_store_faults() {
        let err: CoreError = StoreError::Unavailable("down".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::StoreFault);

        let err = err.after(2);
        assert!(matches!(err, CoreError::PartialFailure { completed: 2, .. }));

        let err = err.after(1);
        assert_eq!(err.completed_writes(), 3);
        assert_eq!(err.kind(), ErrorKind::StoreFault);
    }

    #[test]
    fn test_after_zero_keeps_plain_store_error() {
        let err: CoreError = StoreError::Unavailable("down".to_string()).into();
        assert!(matches!(err.after(0), CoreError::Store(_)));
    }

    #[test]
    fn test_after_leaves_domain_errors() {
        let err = CoreError::NotFound("note".to_string()).after(4);
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
