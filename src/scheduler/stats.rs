//! Read-only queue reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{PostRepository, SharedPostRepository, SharedSlotRepository, SlotRepository};

use super::error::{SchedulerError, SchedulerResult};

/// Nominal horizon for the empty-slot capacity estimate, in days
const CAPACITY_HORIZON_DAYS: usize = 7;

/// Queue summary for a user's dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Number of posts currently in `scheduled` status
    pub total_scheduled: usize,

    /// Earliest upcoming publish time, if any
    pub next_post_date: Option<DateTime<Utc>>,

    /// Capacity shortfall estimate: each active slot counted once per day
    /// over a nominal 7-day horizon, minus the scheduled backlog. This is a
    /// dashboard estimate — it ignores platform mismatches and collisions,
    /// so it is not a free-slot enumeration.
    pub empty_slots: usize,
}

/// Computes queue statistics from the stores
#[derive(Clone)]
pub struct QueueReporter {
    slots: SharedSlotRepository,
    posts: SharedPostRepository,
}

impl QueueReporter {
    /// Create a new reporter
    pub fn new(slots: SharedSlotRepository, posts: SharedPostRepository) -> Self {
        Self { slots, posts }
    }

    /// Summarize the user's queue
    pub async fn queue_stats(&self, user_id: &str) -> SchedulerResult<QueueStats> {
        let total_scheduled = self
            .posts
            .count_scheduled(user_id)
            .await
            .map_err(|e| SchedulerError::storage("count_scheduled", e))?;

        let next_post_date = self
            .posts
            .next_scheduled_at(user_id)
            .await
            .map_err(|e| SchedulerError::storage("next_scheduled_at", e))?;

        let active_slots = self
            .slots
            .list_active_slots(user_id)
            .await
            .map_err(|e| SchedulerError::storage("list_active_slots", e))?
            .len();

        Ok(QueueStats {
            total_scheduled,
            next_post_date,
            empty_slots: (active_slots * CAPACITY_HORIZON_DAYS).saturating_sub(total_scheduled),
        })
    }
}
