//! Next-slot search over a user's weekly availability grid
//!
//! The finder walks a bounded forward window day by day, evaluating the
//! user's active slots in stable (day, time) order, and returns the first
//! candidate that is strictly in the future, platform-compatible, and not
//! already occupied on the shared publishing calendar.

use chrono::{DateTime, Days, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::config::{CollisionScope, SchedulerConfig};
use crate::models::PlatformSet;
use crate::storage::{PostRepository, SharedPostRepository, SharedSlotRepository, SlotRepository};

use super::error::{SchedulerError, SchedulerResult};

/// Finds the next unoccupied calendar slot for a platform set
#[derive(Clone)]
pub struct SlotFinder {
    slots: SharedSlotRepository,
    posts: SharedPostRepository,
    config: SchedulerConfig,
}

impl SlotFinder {
    /// Create a new slot finder
    pub fn new(
        slots: SharedSlotRepository,
        posts: SharedPostRepository,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            slots,
            posts,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Find the next free slot for the user and platform set
    ///
    /// `Ok(None)` means the scan window was exhausted; callers treat that as
    /// "could not schedule now", not as a failure.
    pub async fn find_next_slot(
        &self,
        user_id: &str,
        platforms: &PlatformSet,
    ) -> SchedulerResult<Option<DateTime<Utc>>> {
        self.find_next_slot_at(user_id, platforms, Utc::now()).await
    }

    /// Find the next free slot relative to an explicit clock
    pub async fn find_next_slot_at(
        &self,
        user_id: &str,
        platforms: &PlatformSet,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Option<DateTime<Utc>>> {
        let slots = self
            .slots
            .list_active_slots(user_id)
            .await
            .map_err(|e| SchedulerError::storage("list_active_slots", e))?;

        if slots.is_empty() {
            tracing::debug!(user_id = %user_id, "No active slots; nothing to schedule against");
            return Ok(None);
        }

        let today = now.with_timezone(&Local).date_naive();
        let window = Duration::minutes(self.config.collision_window_mins);

        for day_offset in 0..self.config.slot_scan_days {
            let date = today + Days::new(u64::from(day_offset));

            for slot in slots.iter().filter(|s| s.matches_date(date)) {
                // Platform eligibility is per candidate, not a pre-filter:
                // a slot that misses this request can still serve the next.
                if !slot.platforms.intersects(platforms) {
                    continue;
                }

                let Some(candidate) = slot_candidate(date, slot.time_of_day) else {
                    // Local time skipped by a DST gap; unusable as a slot.
                    continue;
                };

                if candidate <= now {
                    continue;
                }

                let occupant = self
                    .posts
                    .find_occupying_post(
                        candidate - window,
                        candidate + window,
                        self.occupancy_scope(user_id),
                    )
                    .await
                    .map_err(|e| SchedulerError::storage("find_occupying_post", e))?;

                if let Some(existing) = occupant {
                    tracing::trace!(
                        candidate = %candidate,
                        occupied_by = %existing.id,
                        "Candidate slot occupied, scanning on"
                    );
                    continue;
                }

                tracing::debug!(
                    user_id = %user_id,
                    slot_id = %slot.id,
                    candidate = %candidate,
                    "Found free slot"
                );
                return Ok(Some(candidate));
            }
        }

        tracing::debug!(
            user_id = %user_id,
            scan_days = self.config.slot_scan_days,
            "Scan window exhausted without a free slot"
        );
        Ok(None)
    }

    fn occupancy_scope<'a>(&self, user_id: &'a str) -> Option<&'a str> {
        match self.config.collision_scope {
            CollisionScope::Global => None,
            CollisionScope::PerUser => Some(user_id),
        }
    }
}

/// Compute the UTC instant of a slot occurrence on a given local date
///
/// Seconds and subseconds are zeroed; the wall-clock time is interpreted in
/// the local zone per the slot contract.
pub(crate) fn slot_candidate(date: NaiveDate, time_of_day: NaiveTime) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(time_of_day.hour(), time_of_day.minute(), 0)?;
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, PostStatus, QueuedPost, Slot};
    use crate::storage::create_mock_repositories;
    use chrono::{Datelike, Weekday};

    fn platforms(ids: &[Platform]) -> PlatformSet {
        ids.iter().copied().collect()
    }

    /// First date with the wanted weekday on or after a fixed anchor
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

    fn finder_with(config: SchedulerConfig) -> (SlotFinder, SharedSlotRepository, SharedPostRepository) {
        let (slots, posts) = create_mock_repositories(&config);
        (
            SlotFinder::new(slots.clone(), posts.clone(), config),
            slots,
            posts,
        )
    }

    fn monday_nine_slot(user: &str) -> Slot {
        Slot::new(
            user,
            1,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            platforms(&[Platform::Twitter]),
        )
    }

    async fn occupy(posts: &SharedPostRepository, user: &str, at: DateTime<Utc>) {
        let mut post = QueuedPost::new_draft(user, "taken", platforms(&[Platform::Twitter]));
        post.status = PostStatus::Scheduled;
        post.scheduled_at = Some(at);
        posts.insert_post(&post).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_slots_means_none() {
        let (finder, _, _) = finder_with(SchedulerConfig::default());
        let found = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Twitter]), Utc::now())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_same_day_slot_already_past_rolls_a_week() {
        // Spec scenario: single Monday 09:00 slot, now is Monday 10:00
        let (finder, slots, _) = finder_with(SchedulerConfig::default());
        slots.insert_slot(&monday_nine_slot("u1")).await.unwrap();

        let monday = anchor_date(Weekday::Mon);
        let now = local_ts(monday, 10, 0);

        let found = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Twitter]), now)
            .await
            .unwrap();

        assert_eq!(found, Some(local_ts(monday + Days::new(7), 9, 0)));
    }

    #[tokio::test]
    async fn test_upcoming_slot_tomorrow() {
        // Spec scenario: Monday 09:00 slot, now is Sunday 08:00
        let (finder, slots, _) = finder_with(SchedulerConfig::default());
        slots.insert_slot(&monday_nine_slot("u1")).await.unwrap();

        let sunday = anchor_date(Weekday::Sun);
        let now = local_ts(sunday, 8, 0);

        let found = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Twitter]), now)
            .await
            .unwrap();

        assert_eq!(found, Some(local_ts(sunday + Days::new(1), 9, 0)));
    }

    #[tokio::test]
    async fn test_returned_slot_has_matching_weekday_and_platforms() {
        let (finder, slots, _) = finder_with(SchedulerConfig::default());
        slots
            .insert_slot(&Slot::new(
                "u1",
                3, // Wednesday
                NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
                platforms(&[Platform::Linkedin, Platform::Twitter]),
            ))
            .await
            .unwrap();

        let now = local_ts(anchor_date(Weekday::Sun), 12, 0);
        let found = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Linkedin]), now)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            found.with_timezone(&Local).weekday().num_days_from_sunday(),
            3
        );
    }

    #[tokio::test]
    async fn test_platform_mismatch_yields_none() {
        let (finder, slots, _) = finder_with(SchedulerConfig::default());
        slots.insert_slot(&monday_nine_slot("u1")).await.unwrap();

        let now = local_ts(anchor_date(Weekday::Sun), 8, 0);
        let found = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Instagram]), now)
            .await
            .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_inactive_slots_are_invisible() {
        let (finder, slots, _) = finder_with(SchedulerConfig::default());
        let mut slot = monday_nine_slot("u1");
        slot.is_active = false;
        slots.insert_slot(&slot).await.unwrap();

        let now = local_ts(anchor_date(Weekday::Sun), 8, 0);
        let found = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Twitter]), now)
            .await
            .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_occupied_slot_skips_to_next_occurrence() {
        let (finder, slots, posts) = finder_with(SchedulerConfig::default());
        slots.insert_slot(&monday_nine_slot("u1")).await.unwrap();

        let sunday = anchor_date(Weekday::Sun);
        let monday = sunday + Days::new(1);
        let now = local_ts(sunday, 8, 0);

        // Another user sits 3 minutes off the candidate; the global
        // occupancy check treats the slot as taken.
        occupy(&posts, "u2", local_ts(monday, 9, 3)).await;

        let found = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Twitter]), now)
            .await
            .unwrap();

        assert_eq!(found, Some(local_ts(monday + Days::new(7), 9, 0)));
    }

    #[tokio::test]
    async fn test_per_user_scope_ignores_other_users() {
        let config = SchedulerConfig {
            collision_scope: crate::config::CollisionScope::PerUser,
            ..SchedulerConfig::default()
        };
        let (finder, slots, posts) = finder_with(config);
        slots.insert_slot(&monday_nine_slot("u1")).await.unwrap();

        let sunday = anchor_date(Weekday::Sun);
        let monday = sunday + Days::new(1);
        occupy(&posts, "u2", local_ts(monday, 9, 0)).await;

        let found = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Twitter]), local_ts(sunday, 8, 0))
            .await
            .unwrap();

        // u2's post no longer blocks u1's calendar
        assert_eq!(found, Some(local_ts(monday, 9, 0)));
    }

    #[tokio::test]
    async fn test_slots_scanned_in_day_then_time_order() {
        let (finder, slots, _) = finder_with(SchedulerConfig::default());

        // Inserted out of order; the store returns them sorted
        slots
            .insert_slot(&Slot::new(
                "u1",
                1,
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                platforms(&[Platform::Twitter]),
            ))
            .await
            .unwrap();
        slots.insert_slot(&monday_nine_slot("u1")).await.unwrap();

        let sunday = anchor_date(Weekday::Sun);
        let found = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Twitter]), local_ts(sunday, 8, 0))
            .await
            .unwrap();

        assert_eq!(found, Some(local_ts(sunday + Days::new(1), 9, 0)));
    }

    #[tokio::test]
    async fn test_find_is_deterministic() {
        let (finder, slots, _) = finder_with(SchedulerConfig::default());
        slots.insert_slot(&monday_nine_slot("u1")).await.unwrap();

        let now = local_ts(anchor_date(Weekday::Sun), 8, 0);
        let first = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Twitter]), now)
            .await
            .unwrap();
        let second = finder
            .find_next_slot_at("u1", &platforms(&[Platform::Twitter]), now)
            .await
            .unwrap();

        assert_eq!(first, second);
    }
}
