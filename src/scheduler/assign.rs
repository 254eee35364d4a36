//! Queue assignment: promoting a draft into the scheduled queue
//!
//! The assigner is a thin orchestration over the slot finder: find a free
//! slot, then write the schedule and status in a single store update. The
//! occupancy read and the write are a deliberate sequence; the storage
//! layer's bucket uniqueness catches the race between them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{PlatformSet, PostStatus};
use crate::storage::{PostRepository, ScheduleConflict, SharedPostRepository};

use super::error::{SchedulerError, SchedulerResult};
use super::slot_finder::SlotFinder;

/// Adds single posts to the publish queue
#[derive(Clone)]
pub struct QueueAssigner {
    finder: SlotFinder,
    posts: SharedPostRepository,
}

impl QueueAssigner {
    /// Create a new queue assigner
    pub fn new(finder: SlotFinder, posts: SharedPostRepository) -> Self {
        Self { finder, posts }
    }

    /// Schedule the post into the next free slot for the platform set
    ///
    /// Returns the assigned time, or `None` when no slot was available — in
    /// which case the post is left exactly as it was.
    pub async fn add_to_queue(
        &self,
        user_id: &str,
        post_id: Uuid,
        platforms: &PlatformSet,
    ) -> SchedulerResult<Option<DateTime<Utc>>> {
        self.add_to_queue_at(user_id, post_id, platforms, Utc::now())
            .await
    }

    /// Schedule the post relative to an explicit clock
    pub async fn add_to_queue_at(
        &self,
        user_id: &str,
        post_id: Uuid,
        platforms: &PlatformSet,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Option<DateTime<Utc>>> {
        let Some(scheduled_at) = self
            .finder
            .find_next_slot_at(user_id, platforms, now)
            .await?
        else {
            tracing::info!(
                user_id = %user_id,
                post_id = %post_id,
                "No free slot in scan window; post left unscheduled"
            );
            return Ok(None);
        };

        match self
            .posts
            .update_post_schedule(post_id, user_id, scheduled_at, PostStatus::Scheduled)
            .await
        {
            Ok(true) => {
                tracing::info!(
                    user_id = %user_id,
                    post_id = %post_id,
                    scheduled_at = %scheduled_at,
                    "Post added to queue"
                );
                Ok(Some(scheduled_at))
            }
            Ok(false) => Err(SchedulerError::post_not_found(post_id, user_id)),
            Err(e) => match e.downcast_ref::<ScheduleConflict>() {
                Some(conflict) => {
                    tracing::warn!(
                        post_id = %post_id,
                        scheduled_at = %conflict.scheduled_at,
                        "Lost slot race to a concurrent write"
                    );
                    Err(SchedulerError::SlotConflict {
                        scheduled_at: conflict.scheduled_at,
                    })
                }
                None => Err(SchedulerError::storage("update_post_schedule", e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::models::{Platform, QueuedPost, Slot};
    use crate::storage::{create_mock_repositories, SharedSlotRepository, SlotRepository};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{Datelike, Days, Local, NaiveDate, NaiveTime, TimeZone, Weekday};

    fn platforms(ids: &[Platform]) -> PlatformSet {
        ids.iter().copied().collect()
    }

    fn anchor_date(target: Weekday) -> NaiveDate {
        let mut date = NaiveDate::from_ymd_opt(2030, 6, 2).unwrap();
        while date.weekday() != target {
            date = date.succ_opt().unwrap();
        }
        date
    }

    fn local_ts(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
        Local
            .from_local_datetime(&date.and_hms_opt(h, m, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn setup() -> (QueueAssigner, SharedSlotRepository, SharedPostRepository) {
        let config = SchedulerConfig::default();
        let (slots, posts) = create_mock_repositories(&config);
        let finder = SlotFinder::new(slots.clone(), posts.clone(), config);
        (QueueAssigner::new(finder, posts.clone()), slots, posts)
    }

    #[tokio::test]
    async fn test_draft_is_promoted_to_scheduled() {
        let (assigner, slots, posts) = setup();
        slots
            .insert_slot(&Slot::new(
                "u1",
                1,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                platforms(&[Platform::Twitter]),
            ))
            .await
            .unwrap();

        let draft = QueuedPost::new_draft("u1", "post", platforms(&[Platform::Twitter]));
        posts.insert_post(&draft).await.unwrap();

        let sunday = anchor_date(Weekday::Sun);
        let assigned = assigner
            .add_to_queue_at(
                "u1",
                draft.id,
                &platforms(&[Platform::Twitter]),
                local_ts(sunday, 8, 0),
            )
            .await
            .unwrap();

        let expected = local_ts(sunday + Days::new(1), 9, 0);
        assert_eq!(assigned, Some(expected));

        let loaded = posts.get_post(draft.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Scheduled);
        assert_eq!(loaded.scheduled_at, Some(expected));
    }

    #[tokio::test]
    async fn test_no_slot_leaves_post_untouched() {
        let (assigner, _, posts) = setup();

        let draft = QueuedPost::new_draft("u1", "post", platforms(&[Platform::Twitter]));
        posts.insert_post(&draft).await.unwrap();

        let assigned = assigner
            .add_to_queue_at(
                "u1",
                draft.id,
                &platforms(&[Platform::Twitter]),
                Utc::now(),
            )
            .await
            .unwrap();

        assert!(assigned.is_none());
        let loaded = posts.get_post(draft.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Draft);
        assert!(loaded.scheduled_at.is_none());
    }

    #[tokio::test]
    async fn test_unknown_post_is_an_error() {
        let (assigner, slots, _) = setup();
        slots
            .insert_slot(&Slot::new(
                "u1",
                1,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                platforms(&[Platform::Twitter]),
            ))
            .await
            .unwrap();

        let err = assigner
            .add_to_queue_at(
                "u1",
                Uuid::new_v4(),
                &platforms(&[Platform::Twitter]),
                local_ts(anchor_date(Weekday::Sun), 8, 0),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::PostNotFound { .. }));
    }

    /// Post store double whose schedule writes always lose the slot race
    struct RacingPosts {
        inner: SharedPostRepository,
    }

    #[async_trait]
    impl PostRepository for RacingPosts {
        async fn insert_post(&self, post: &QueuedPost) -> Result<()> {
            self.inner.insert_post(post).await
        }

        async fn get_post(&self, post_id: Uuid) -> Result<Option<QueuedPost>> {
            self.inner.get_post(post_id).await
        }

        async fn find_occupying_post(
            &self,
            window_start: DateTime<Utc>,
            window_end: DateTime<Utc>,
            user_scope: Option<&str>,
        ) -> Result<Option<QueuedPost>> {
            self.inner
                .find_occupying_post(window_start, window_end, user_scope)
                .await
        }

        async fn update_post_schedule(
            &self,
            _post_id: Uuid,
            _user_id: &str,
            scheduled_at: DateTime<Utc>,
            _status: PostStatus,
        ) -> Result<bool> {
            Err(anyhow::Error::new(ScheduleConflict { scheduled_at }))
        }

        async fn update_queue_position(
            &self,
            post_id: Uuid,
            user_id: &str,
            position: i64,
        ) -> Result<bool> {
            self.inner.update_queue_position(post_id, user_id, position).await
        }

        async fn apply_schedule_assignments(
            &self,
            user_id: &str,
            assignments: &[(Uuid, DateTime<Utc>)],
        ) -> Result<usize> {
            self.inner.apply_schedule_assignments(user_id, assignments).await
        }

        async fn list_scheduled_posts(
            &self,
            user_id: &str,
            order: crate::storage::ScheduledOrder,
        ) -> Result<Vec<QueuedPost>> {
            self.inner.list_scheduled_posts(user_id, order).await
        }

        async fn list_evergreen_templates(&self, user_id: &str) -> Result<Vec<QueuedPost>> {
            self.inner.list_evergreen_templates(user_id).await
        }

        async fn mark_recycled(&self, post_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
            self.inner.mark_recycled(post_id, at).await
        }

        async fn count_scheduled(&self, user_id: &str) -> Result<usize> {
            self.inner.count_scheduled(user_id).await
        }

        async fn next_scheduled_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
            self.inner.next_scheduled_at(user_id).await
        }
    }

    #[tokio::test]
    async fn test_lost_race_surfaces_as_slot_conflict() {
        let config = SchedulerConfig::default();
        let (slots, inner) = create_mock_repositories(&config);
        let racing: SharedPostRepository = std::sync::Arc::new(RacingPosts {
            inner: inner.clone(),
        });
        let finder = SlotFinder::new(slots.clone(), racing.clone(), config);
        let assigner = QueueAssigner::new(finder, racing);

        slots
            .insert_slot(&Slot::new(
                "u1",
                1,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                platforms(&[Platform::Twitter]),
            ))
            .await
            .unwrap();
        let draft = QueuedPost::new_draft("u1", "post", platforms(&[Platform::Twitter]));
        inner.insert_post(&draft).await.unwrap();

        let err = assigner
            .add_to_queue_at(
                "u1",
                draft.id,
                &platforms(&[Platform::Twitter]),
                local_ts(anchor_date(Weekday::Sun), 8, 0),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::SlotConflict { .. }));
        assert!(err.is_recoverable());
    }
}
