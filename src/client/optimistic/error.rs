//! Mutation outcome errors

use thiserror::Error;

use crate::client::api::ApiError;
use crate::client::cache::CacheError;
use crate::shared::error::{ApiErrorBody, SharedError};

use super::ledger::MutationKind;

/// Why a mutation did not commit
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// The server could not be reached; the optimistic change was undone
    #[error("{kind} failed: {source}; local change rolled back")]
    RollbackApplied {
        kind: MutationKind,
        #[source]
        source: ApiError,
    },

    /// The server could not be reached, but a newer mutation owns the
    /// affected keys, so the cache was left as is
    #[error("{kind} failed: {source}; superseded by a newer change")]
    SupersededRollbackSkipped {
        kind: MutationKind,
        #[source]
        source: ApiError,
    },

    /// The server answered with a rejection (validation, authorization,
    /// not found, conflict)
    #[error("{kind} rejected: {}", .body.message)]
    ServerRejected {
        kind: MutationKind,
        status: u16,
        body: ApiErrorBody,
        /// Whether the optimistic change was undone
        rolled_back: bool,
    },

    /// Rejected locally before anything was snapshotted
    #[error(transparent)]
    Validation(#[from] SharedError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl MutationError {
    /// Whether the live cache was restored to its pre-mutation state
    pub fn rolled_back(&self) -> bool {
        match self {
            Self::RollbackApplied { .. } => true,
            Self::ServerRejected { rolled_back, .. } => *rolled_back,
            _ => false,
        }
    }

    /// Whether retrying the same mutation could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RollbackApplied { .. } | Self::SupersededRollbackSkipped { .. }
        )
    }

    /// Message suitable for a user-facing notification
    pub fn user_message(&self) -> String {
        match self {
            Self::ServerRejected { body, .. } => body.message.clone(),
            Self::RollbackApplied { kind, .. } | Self::SupersededRollbackSkipped { kind, .. } => {
                format!("Could not reach the server; {} was undone", kind)
            }
            Self::Validation(SharedError::ValidationError { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::ApiErrorKind;
    use std::time::Duration;

    #[test]
    fn test_retryable_only_for_transport_failures() {
        let timeout = MutationError::RollbackApplied {
            kind: MutationKind::ToggleLike,
            source: ApiError::Timeout(Duration::from_secs(10)),
        };
        assert!(timeout.is_retryable());
        assert!(timeout.rolled_back());

        let rejected = MutationError::ServerRejected {
            kind: MutationKind::DeletePost,
            status: 403,
            body: ApiErrorBody::new(ApiErrorKind::Authorization, "only the owner can delete"),
            rolled_back: true,
        };
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.user_message(), "only the owner can delete");
    }

    #[test]
    fn test_validation_message() {
        let error: MutationError = SharedError::validation("text", "comment cannot be empty").into();
        assert_eq!(error.user_message(), "comment cannot be empty");
        assert!(!error.rolled_back());
    }
}
