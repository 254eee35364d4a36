//! Error types for the scheduler module

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
///
/// Empty results are not errors: an exhausted scan window or a user without
/// slots comes back as `Ok(None)` / zero counts from the operations
/// themselves.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The targeted post does not exist or belongs to another user
    #[error("post {post_id} not found for user '{user_id}'")]
    PostNotFound { post_id: Uuid, user_id: String },

    /// A concurrent writer claimed the candidate slot between the occupancy
    /// check and the write
    #[error("slot at {scheduled_at} was claimed by a concurrent write")]
    SlotConflict { scheduled_at: DateTime<Utc> },

    /// Underlying store failure
    #[error("storage failure during '{operation}': {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl SchedulerError {
    /// Create a post-not-found error
    pub fn post_not_found(post_id: Uuid, user_id: impl Into<String>) -> Self {
        Self::PostNotFound {
            post_id,
            user_id: user_id.into(),
        }
    }

    /// Wrap a store failure with the operation that hit it
    pub fn storage(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Storage { operation, source }
    }

    /// Check if the error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SlotConflict { .. } | Self::Storage { .. })
    }
}
