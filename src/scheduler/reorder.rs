//! Queue reordering with a shared slot cursor
//!
//! Reordering re-sequences a user's queue and then re-plans every scheduled
//! post against the weekly grid. A single [`Cursor`] walks (slot, day)
//! combinations once, shared across all posts, so the planned times map the
//! queue order monotonically onto the calendar — an O(posts + days-scanned)
//! walk instead of one full slot-finder scan per post.

use chrono::{DateTime, Days, Local, Utc};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::models::{QueuedPost, Slot};
use crate::storage::{
    PostRepository, ScheduledOrder, SharedPostRepository, SharedSlotRepository, SlotRepository,
};

use super::error::{SchedulerError, SchedulerResult};
use super::slot_finder::slot_candidate;

// ============================================================================
// Cursor
// ============================================================================

/// Rolling pointer into (slot index, day offset) space
///
/// One advance step moves to the next slot on the same day, wrapping to the
/// first slot of the following day. Because the slot list is sorted day-
/// then-time, candidates produced by a forward-only cursor never move
/// backward in calendar time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub slot_index: usize,
    pub day_offset: u32,
}

impl Cursor {
    /// Advance one (slot, day) step
    pub fn advance(&mut self, slot_count: usize) {
        self.slot_index += 1;
        if self.slot_index >= slot_count {
            self.slot_index = 0;
            self.day_offset += 1;
        }
    }
}

// ============================================================================
// Planning
// ============================================================================

/// A planned reorder assignment for one post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSlot {
    pub post_id: Uuid,

    /// `None` when the scan bound was exhausted before a compatible slot
    /// turned up; the post keeps its previous time
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Plan new times for posts in queue order against the slot grid
///
/// Pure over its inputs: `posts` must already be in queue order, `slots` in
/// stable scan order. The cursor is threaded through every post and never
/// reset, which is what guarantees non-decreasing assignments.
pub fn plan_assignments(
    posts: &[QueuedPost],
    slots: &[Slot],
    now: DateTime<Utc>,
    max_days: u32,
) -> Vec<PlannedSlot> {
    if slots.is_empty() {
        return posts
            .iter()
            .map(|p| PlannedSlot {
                post_id: p.id,
                scheduled_at: None,
            })
            .collect();
    }

    let today = now.with_timezone(&Local).date_naive();
    let mut cursor = Cursor::default();
    let mut planned = Vec::with_capacity(posts.len());

    for post in posts {
        let mut assigned = None;

        while cursor.day_offset < max_days {
            let slot = &slots[cursor.slot_index];
            let date = today + Days::new(u64::from(cursor.day_offset));

            if slot.matches_date(date) && slot.platforms.intersects(&post.target_platforms) {
                if let Some(candidate) = slot_candidate(date, slot.time_of_day) {
                    if candidate > now {
                        assigned = Some(candidate);
                        cursor.advance(slots.len());
                        break;
                    }
                }
            }

            cursor.advance(slots.len());
        }

        planned.push(PlannedSlot {
            post_id: post.id,
            scheduled_at: assigned,
        });
    }

    planned
}

// ============================================================================
// Reorderer
// ============================================================================

/// Outcome summary of a reorder run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderOutcome {
    /// Queue positions written (one per requested id)
    pub positions_written: usize,

    /// Posts the planner found a new time for
    pub planned: usize,

    /// Posts actually rescheduled by the store
    pub rescheduled: usize,

    /// Posts left on their old time (bound exhausted or bucket held
    /// elsewhere)
    pub skipped: usize,
}

/// Re-sequences a user's queue and re-plans its calendar times
#[derive(Clone)]
pub struct QueueReorderer {
    slots: SharedSlotRepository,
    posts: SharedPostRepository,
    config: SchedulerConfig,
}

impl QueueReorderer {
    /// Create a new queue reorderer
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

    /// Apply the given queue order and reassign slot times
    pub async fn reorder_queue(
        &self,
        user_id: &str,
        post_ids: &[Uuid],
    ) -> SchedulerResult<ReorderOutcome> {
        self.reorder_queue_at(user_id, post_ids, Utc::now()).await
    }

    /// Reorder relative to an explicit clock
    pub async fn reorder_queue_at(
        &self,
        user_id: &str,
        post_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> SchedulerResult<ReorderOutcome> {
        // Step 1: persist the requested order. Ownership scoping lives in
        // the store's WHERE clause; a foreign id updates nothing.
        for (position, post_id) in post_ids.iter().enumerate() {
            let updated = self
                .posts
                .update_queue_position(*post_id, user_id, position as i64)
                .await
                .map_err(|e| SchedulerError::storage("update_queue_position", e))?;

            if !updated {
                tracing::trace!(
                    post_id = %post_id,
                    user_id = %user_id,
                    "Queue position skipped an id outside the user's posts"
                );
            }
        }

        // Step 2: re-plan every scheduled post in the new order.
        let slots = self
            .slots
            .list_active_slots(user_id)
            .await
            .map_err(|e| SchedulerError::storage("list_active_slots", e))?;

        let queue = self
            .posts
            .list_scheduled_posts(user_id, ScheduledOrder::QueuePosition)
            .await
            .map_err(|e| SchedulerError::storage("list_scheduled_posts", e))?;

        let plan = plan_assignments(&queue, &slots, now, self.config.reorder_scan_days);

        let assignments: Vec<(Uuid, DateTime<Utc>)> = plan
            .iter()
            .filter_map(|p| p.scheduled_at.map(|ts| (p.post_id, ts)))
            .collect();

        let rescheduled = self
            .posts
            .apply_schedule_assignments(user_id, &assignments)
            .await
            .map_err(|e| SchedulerError::storage("apply_schedule_assignments", e))?;

        let outcome = ReorderOutcome {
            positions_written: post_ids.len(),
            planned: assignments.len(),
            rescheduled,
            skipped: plan.len() - rescheduled,
        };

        tracing::info!(
            user_id = %user_id,
            positions = outcome.positions_written,
            rescheduled = outcome.rescheduled,
            skipped = outcome.skipped,
            "Queue reordered"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, PlatformSet, PostStatus};
    use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Weekday};

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

    fn slot(user: &str, dow: u8, hh: u32, platform: Platform) -> Slot {
        Slot::new(
            user,
            dow,
            NaiveTime::from_hms_opt(hh, 0, 0).unwrap(),
            platforms(&[platform]),
        )
    }

    fn scheduled_post(user: &str, content: &str, platform: Platform) -> QueuedPost {
        let mut post = QueuedPost::new_draft(user, content, platforms(&[platform]));
        post.status = PostStatus::Scheduled;
        post
    }

    #[test]
    fn test_cursor_advance_wraps_to_next_day() {
        let mut cursor = Cursor::default();
        cursor.advance(3);
        assert_eq!(cursor, Cursor { slot_index: 1, day_offset: 0 });
        cursor.advance(3);
        cursor.advance(3);
        assert_eq!(cursor, Cursor { slot_index: 0, day_offset: 1 });
    }

    #[test]
    fn test_plan_is_monotonic_in_queue_order() {
        let sunday = anchor_date(Weekday::Sun);
        let now = local_ts(sunday, 6, 0);

        let slots = vec![
            slot("u1", 1, 9, Platform::Twitter),
            slot("u1", 3, 14, Platform::Twitter),
        ];
        let posts: Vec<QueuedPost> = (0..5)
            .map(|i| scheduled_post("u1", &format!("p{i}"), Platform::Twitter))
            .collect();

        let plan = plan_assignments(&posts, &slots, now, 365);

        assert_eq!(plan.len(), 5);
        let times: Vec<DateTime<Utc>> = plan.iter().map(|p| p.scheduled_at.unwrap()).collect();
        for pair in times.windows(2) {
            assert!(pair[0] <= pair[1], "queue order must not move backward");
        }

        // First two land on this week's Monday and Wednesday
        assert_eq!(times[0], local_ts(sunday + Days::new(1), 9, 0));
        assert_eq!(times[1], local_ts(sunday + Days::new(3), 14, 0));
        // Third wraps to next week's Monday
        assert_eq!(times[2], local_ts(sunday + Days::new(8), 9, 0));
    }

    #[test]
    fn test_plan_skips_past_candidates() {
        let monday = anchor_date(Weekday::Mon);
        let now = local_ts(monday, 10, 0);

        let slots = vec![slot("u1", 1, 9, Platform::Twitter)];
        let posts = vec![scheduled_post("u1", "p", Platform::Twitter)];

        let plan = plan_assignments(&posts, &slots, now, 365);

        // Today's 09:00 already passed; next Monday it is
        assert_eq!(
            plan[0].scheduled_at,
            Some(local_ts(monday + Days::new(7), 9, 0))
        );
    }

    #[test]
    fn test_plan_respects_platform_mismatch() {
        let sunday = anchor_date(Weekday::Sun);
        let now = local_ts(sunday, 6, 0);

        let slots = vec![
            slot("u1", 1, 9, Platform::Twitter),
            slot("u1", 2, 9, Platform::Linkedin),
        ];
        let posts = vec![
            scheduled_post("u1", "a", Platform::Linkedin),
            scheduled_post("u1", "b", Platform::Twitter),
        ];

        let plan = plan_assignments(&posts, &slots, now, 365);

        // First post skips Monday's twitter slot and takes Tuesday
        assert_eq!(
            plan[0].scheduled_at,
            Some(local_ts(sunday + Days::new(2), 9, 0))
        );
        // The cursor has moved past Monday, so the twitter post wraps a week
        assert_eq!(
            plan[1].scheduled_at,
            Some(local_ts(sunday + Days::new(8), 9, 0))
        );
    }

    #[test]
    fn test_plan_exhaustion_leaves_post_unplanned() {
        let sunday = anchor_date(Weekday::Sun);
        let now = local_ts(sunday, 6, 0);

        let slots = vec![slot("u1", 1, 9, Platform::Twitter)];
        let posts = vec![
            scheduled_post("u1", "a", Platform::Twitter),
            scheduled_post("u1", "b", Platform::Instagram),
            scheduled_post("u1", "c", Platform::Twitter),
        ];

        let plan = plan_assignments(&posts, &slots, now, 30);

        assert!(plan[0].scheduled_at.is_some());
        // No instagram slot exists anywhere in the bound
        assert!(plan[1].scheduled_at.is_none());
        // The shared cursor is spent; later posts cannot be placed either
        assert!(plan[2].scheduled_at.is_none());
    }

    #[test]
    fn test_plan_without_slots() {
        let now = local_ts(anchor_date(Weekday::Sun), 6, 0);
        let posts = vec![scheduled_post("u1", "a", Platform::Twitter)];

        let plan = plan_assignments(&posts, &[], now, 365);
        assert_eq!(plan.len(), 1);
        assert!(plan[0].scheduled_at.is_none());
    }

    #[tokio::test]
    async fn test_reorder_swaps_calendar_times() {
        use crate::config::SchedulerConfig;
        use crate::storage::create_mock_repositories;

        let config = SchedulerConfig::default();
        let (slots, posts) = create_mock_repositories(&config);
        let reorderer = QueueReorderer::new(slots.clone(), posts.clone(), config);

        slots
            .insert_slot(&slot("u1", 1, 9, Platform::Twitter))
            .await
            .unwrap();
        slots
            .insert_slot(&slot("u1", 3, 14, Platform::Twitter))
            .await
            .unwrap();

        let sunday = anchor_date(Weekday::Sun);
        let now = local_ts(sunday, 6, 0);

        // A currently precedes B on the calendar
        let mut a = scheduled_post("u1", "a", Platform::Twitter);
        a.scheduled_at = Some(local_ts(sunday + Days::new(1), 9, 0));
        a.queue_position = 0;
        let mut b = scheduled_post("u1", "b", Platform::Twitter);
        b.scheduled_at = Some(local_ts(sunday + Days::new(3), 14, 0));
        b.queue_position = 1;
        posts.insert_post(&a).await.unwrap();
        posts.insert_post(&b).await.unwrap();

        let outcome = reorderer
            .reorder_queue_at("u1", &[b.id, a.id], now)
            .await
            .unwrap();

        assert_eq!(outcome.positions_written, 2);
        assert_eq!(outcome.rescheduled, 2);
        assert_eq!(outcome.skipped, 0);

        let a2 = posts.get_post(a.id).await.unwrap().unwrap();
        let b2 = posts.get_post(b.id).await.unwrap().unwrap();

        // B now owns the earlier slot
        assert_eq!(b2.scheduled_at, Some(local_ts(sunday + Days::new(1), 9, 0)));
        assert_eq!(a2.scheduled_at, Some(local_ts(sunday + Days::new(3), 14, 0)));
        assert!(b2.scheduled_at <= a2.scheduled_at);
        assert_eq!(b2.queue_position, 0);
        assert_eq!(a2.queue_position, 1);
    }

    #[tokio::test]
    async fn test_reorder_ignores_foreign_ids() {
        use crate::config::SchedulerConfig;
        use crate::storage::create_mock_repositories;

        let config = SchedulerConfig::default();
        let (slots, posts) = create_mock_repositories(&config);
        let reorderer = QueueReorderer::new(slots.clone(), posts.clone(), config);

        slots
            .insert_slot(&slot("u1", 1, 9, Platform::Twitter))
            .await
            .unwrap();

        let foreign = scheduled_post("u2", "other", Platform::Twitter);
        posts.insert_post(&foreign).await.unwrap();

        let mine = scheduled_post("u1", "mine", Platform::Twitter);
        posts.insert_post(&mine).await.unwrap();

        let now = local_ts(anchor_date(Weekday::Sun), 6, 0);
        let outcome = reorderer
            .reorder_queue_at("u1", &[foreign.id, mine.id], now)
            .await
            .unwrap();

        assert_eq!(outcome.rescheduled, 1);

        // The foreign post was not repositioned or rescheduled
        let untouched = posts.get_post(foreign.id).await.unwrap().unwrap();
        assert_eq!(untouched.queue_position, 0);
        assert!(untouched.scheduled_at.is_none());
    }
}
