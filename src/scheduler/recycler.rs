//! Evergreen recycling: refilling near-term slots from published templates
//!
//! Templates are consumed least-recently-recycled first so no single
//! evergreen post monopolizes the queue while others starve. Each template
//! is an independent unit of work: a template that cannot be placed this
//! run is skipped without touching it.

use chrono::{DateTime, Duration, Utc};

use crate::storage::{PostRepository, ScheduleConflict, SharedPostRepository};

use super::error::{SchedulerError, SchedulerResult};
use super::slot_finder::SlotFinder;

/// Clones published evergreen posts into empty upcoming slots
#[derive(Clone)]
pub struct EvergreenRecycler {
    finder: SlotFinder,
    posts: SharedPostRepository,
}

impl EvergreenRecycler {
    /// Create a new recycler
    pub fn new(finder: SlotFinder, posts: SharedPostRepository) -> Self {
        Self { finder, posts }
    }

    /// Fill empty slots within the horizon with evergreen clones
    ///
    /// Returns the number of clones created.
    pub async fn fill_queue_with_evergreen(
        &self,
        user_id: &str,
        days_ahead: u32,
    ) -> SchedulerResult<usize> {
        self.fill_queue_with_evergreen_at(user_id, days_ahead, Utc::now())
            .await
    }

    /// Fill relative to an explicit clock
    pub async fn fill_queue_with_evergreen_at(
        &self,
        user_id: &str,
        days_ahead: u32,
        now: DateTime<Utc>,
    ) -> SchedulerResult<usize> {
        let templates = self
            .posts
            .list_evergreen_templates(user_id)
            .await
            .map_err(|e| SchedulerError::storage("list_evergreen_templates", e))?;

        if templates.is_empty() {
            tracing::debug!(user_id = %user_id, "No evergreen templates to recycle");
            return Ok(0);
        }

        let horizon = now + Duration::days(i64::from(days_ahead));
        let mut created = 0;

        for template in templates {
            let found = self
                .finder
                .find_next_slot_at(user_id, &template.target_platforms, now)
                .await?;

            let Some(scheduled_at) = found else {
                tracing::trace!(template_id = %template.id, "No slot for template platforms");
                continue;
            };

            if scheduled_at > horizon {
                tracing::debug!(
                    template_id = %template.id,
                    scheduled_at = %scheduled_at,
                    horizon = %horizon,
                    "Next slot beyond fill horizon, skipping template"
                );
                continue;
            }

            let clone = template.clone_for_recycle(scheduled_at);
            match self.posts.insert_post(&clone).await {
                Ok(()) => {
                    tracing::info!(
                        user_id = %user_id,
                        template_id = %template.id,
                        clone_id = %clone.id,
                        scheduled_at = %scheduled_at,
                        "Recycled evergreen post"
                    );
                }
                Err(e) if e.downcast_ref::<ScheduleConflict>().is_some() => {
                    tracing::warn!(
                        template_id = %template.id,
                        scheduled_at = %scheduled_at,
                        "Lost slot race while recycling, skipping template"
                    );
                    continue;
                }
                Err(e) => {
                    // One template must not sink the whole run.
                    tracing::warn!(
                        template_id = %template.id,
                        error = %e,
                        "Failed to create recycled clone, skipping template"
                    );
                    continue;
                }
            }

            if let Err(e) = self.posts.mark_recycled(template.id, now).await {
                tracing::warn!(
                    template_id = %template.id,
                    error = %e,
                    "Clone created but recycle metadata update failed"
                );
            }

            created += 1;
        }

        tracing::info!(user_id = %user_id, created, "Evergreen fill complete");
        Ok(created)
    }
}
