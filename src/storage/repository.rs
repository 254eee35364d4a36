//! Repository Pattern for Slot and Post Store Abstraction
//!
//! This module provides trait-based repository abstractions to decouple the
//! scheduler from storage implementations, enabling:
//! - Easy testing with mock implementations
//! - Swappable storage backends
//! - Clear separation of concerns
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Scheduler Core                         │
//! │      (slot finder, assigner, reorderer, recycler)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Repository Traits                         │
//! │            SlotRepository, PostRepository                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    ┌─────────┴─────────┐
//!                    ▼                   ▼
//!           ┌─────────────────┐ ┌─────────────────┐
//!           │     SQLite      │ │      Mock       │
//!           │ Implementation  │ │ Implementation  │
//!           └─────────────────┘ └─────────────────┘
//! ```
//!
//! # Slot uniqueness
//!
//! The posts table carries a `scheduled_bucket` column holding the scheduled
//! time rounded down to the collision window. A UNIQUE index over the bucket
//! (global, or `(user_id, bucket)` under per-user scope) turns the
//! find-then-write race between two concurrent assignments into a
//! [`ScheduleConflict`] for the loser instead of a double booking.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::config::{CollisionScope, SchedulerConfig};
use crate::models::{PlatformSet, PostStatus, QueuedPost, Slot};

// ============================================================================
// Core Types
// ============================================================================

/// Ordering for scheduled-post listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledOrder {
    /// Queue position ascending, the order the reorderer walks
    QueuePosition,
    /// Scheduled time ascending
    ScheduledAt,
}

/// A write lost the race for a slot bucket that another post already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("slot bucket at {scheduled_at} is already taken")]
pub struct ScheduleConflict {
    pub scheduled_at: DateTime<Utc>,
}

fn bucket_of(ts: DateTime<Utc>, bucket_secs: i64) -> i64 {
    ts.timestamp().div_euclid(bucket_secs)
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// Repository Traits
// ============================================================================

/// Repository for the user's recurring availability slots
///
/// Administrative CRUD beyond seeding is owned elsewhere; the scheduler only
/// ever reads the active set.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Insert a slot definition
    async fn insert_slot(&self, slot: &Slot) -> Result<()>;

    /// List a user's active slots in stable (day, time, id) ascending order
    async fn list_active_slots(&self, user_id: &str) -> Result<Vec<Slot>>;
}

/// Repository for post records and their scheduling fields
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post row
    async fn insert_post(&self, post: &QueuedPost) -> Result<()>;

    /// Get post by ID
    async fn get_post(&self, post_id: Uuid) -> Result<Option<QueuedPost>>;

    /// Find any slot-occupying post whose scheduled time falls strictly
    /// inside the window; `user_scope` narrows the check to one user
    async fn find_occupying_post(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        user_scope: Option<&str>,
    ) -> Result<Option<QueuedPost>>;

    /// Set a post's scheduled time and status in one write, scoped to the
    /// owning user; returns false when no row matched
    async fn update_post_schedule(
        &self,
        post_id: Uuid,
        user_id: &str,
        scheduled_at: DateTime<Utc>,
        status: PostStatus,
    ) -> Result<bool>;

    /// Persist a queue position, scoped to the owning user; a foreign post
    /// updates zero rows and returns false
    async fn update_queue_position(&self, post_id: Uuid, user_id: &str, position: i64)
        -> Result<bool>;

    /// Apply a batch of reorder assignments transactionally
    ///
    /// The affected rows' buckets are released first so a permutation of a
    /// user's own queue cannot conflict with its own previous layout; a row
    /// that still conflicts is left on its old time. Returns the number of
    /// rows rescheduled.
    async fn apply_schedule_assignments(
        &self,
        user_id: &str,
        assignments: &[(Uuid, DateTime<Utc>)],
    ) -> Result<usize>;

    /// List a user's `scheduled`-status posts
    async fn list_scheduled_posts(
        &self,
        user_id: &str,
        order: ScheduledOrder,
    ) -> Result<Vec<QueuedPost>>;

    /// List a user's published evergreen templates, least recently recycled
    /// first (never recycled before everything else)
    async fn list_evergreen_templates(&self, user_id: &str) -> Result<Vec<QueuedPost>>;

    /// Bump a template's recycle counter and stamp `last_recycled_at`
    async fn mark_recycled(&self, post_id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// Count a user's `scheduled`-status posts
    async fn count_scheduled(&self, user_id: &str) -> Result<usize>;

    /// Earliest scheduled time among a user's `scheduled`-status posts
    async fn next_scheduled_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>>;
}

/// Thread-safe shared repository handles
pub type SharedSlotRepository = Arc<dyn SlotRepository>;
pub type SharedPostRepository = Arc<dyn PostRepository>;

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`SlotRepository`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteSlotRepository {
    conn: Mutex<Connection>,
}

impl SqliteSlotRepository {
    /// Create a new SQLite slot repository
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite slot repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS slots (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    day_of_week INTEGER NOT NULL,
                    time_of_day TEXT NOT NULL,
                    platforms TEXT NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1
                );

                CREATE INDEX IF NOT EXISTS idx_slots_user_active
                    ON slots(user_id, is_active);
                "#,
        )
        .context("Failed to create slots schema")?;

        Ok(())
    }
}

fn row_to_slot(row: &rusqlite::Row) -> rusqlite::Result<Slot> {
    let platforms: PlatformSet =
        serde_json::from_str(&row.get::<_, String>(4)?).unwrap_or_default();
    let time_raw: String = row.get(3)?;
    let time_of_day = NaiveTime::parse_from_str(&time_raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&time_raw, "%H:%M:%S"))
        .unwrap_or_default();

    Ok(Slot {
        id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_else(|_| Uuid::nil()),
        user_id: row.get(1)?,
        day_of_week: row.get::<_, i64>(2)? as u8,
        time_of_day,
        platforms,
        is_active: row.get::<_, i64>(5)? != 0,
    })
}

#[async_trait]
impl SlotRepository for SqliteSlotRepository {
    async fn insert_slot(&self, slot: &Slot) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
                INSERT INTO slots (id, user_id, day_of_week, time_of_day, platforms, is_active)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            params![
                slot.id.to_string(),
                slot.user_id,
                i64::from(slot.day_of_week),
                slot.time_of_day.format("%H:%M").to_string(),
                serde_json::to_string(&slot.platforms)?,
                slot.is_active as i64,
            ],
        )
        .context("Failed to insert slot")?;

        Ok(())
    }

    async fn list_active_slots(&self, user_id: &str) -> Result<Vec<Slot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, day_of_week, time_of_day, platforms, is_active
                 FROM slots
                 WHERE user_id = ?1 AND is_active = 1
                 ORDER BY day_of_week ASC, time_of_day ASC, id ASC",
            )
            .context("Failed to prepare slot query")?;

        let slots = stmt
            .query_map(params![user_id], row_to_slot)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list active slots")?;

        Ok(slots)
    }
}

/// SQLite implementation of [`PostRepository`]
pub struct SqlitePostRepository {
    conn: Mutex<Connection>,
    bucket_secs: i64,
    scope: CollisionScope,
}

impl SqlitePostRepository {
    /// Create a new SQLite post repository
    pub fn new(path: impl AsRef<Path>, config: &SchedulerConfig) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
            bucket_secs: config.bucket_secs(),
            scope: config.collision_scope,
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), scope = %repo.scope.as_str(), "SQLite post repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory(config: &SchedulerConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let repo = Self {
            conn: Mutex::new(conn),
            bucket_secs: config.bucket_secs(),
            scope: config.collision_scope,
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS posts (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'draft',
                    content TEXT NOT NULL DEFAULT '',
                    media TEXT NOT NULL DEFAULT '[]',
                    link TEXT,
                    scheduled_at TEXT,
                    scheduled_bucket INTEGER,
                    queue_position INTEGER NOT NULL DEFAULT 0,
                    target_platforms TEXT NOT NULL,
                    is_evergreen INTEGER NOT NULL DEFAULT 0,
                    recycle_count INTEGER NOT NULL DEFAULT 0,
                    last_recycled_at TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_posts_user_status
                    ON posts(user_id, status);

                CREATE INDEX IF NOT EXISTS idx_posts_scheduled_at
                    ON posts(scheduled_at);
                "#,
        )
        .context("Failed to create posts schema")?;

        // Bucket uniqueness backstops the find-then-write race; its shape
        // follows the collision scope.
        match self.scope {
            CollisionScope::Global => conn
                .execute_batch(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_posts_bucket_global
                         ON posts(scheduled_bucket);",
                )
                .context("Failed to create bucket index")?,
            CollisionScope::PerUser => conn
                .execute_batch(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_posts_bucket_user
                         ON posts(user_id, scheduled_bucket);",
                )
                .context("Failed to create bucket index")?,
        }

        Ok(())
    }
}

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<QueuedPost> {
    let media: Vec<String> = serde_json::from_str(&row.get::<_, String>(4)?).unwrap_or_default();
    let target_platforms: PlatformSet =
        serde_json::from_str(&row.get::<_, String>(9)?).unwrap_or_default();

    Ok(QueuedPost {
        id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_else(|_| Uuid::nil()),
        user_id: row.get(1)?,
        status: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(PostStatus::Draft),
        content: row.get(3)?,
        media,
        link: row.get(5)?,
        scheduled_at: row
            .get::<_, Option<String>>(6)?
            .as_deref()
            .and_then(parse_ts),
        queue_position: row.get(8)?,
        target_platforms,
        is_evergreen: row.get::<_, i64>(10)? != 0,
        recycle_count: row.get(11)?,
        last_recycled_at: row
            .get::<_, Option<String>>(12)?
            .as_deref()
            .and_then(parse_ts),
        created_at: row
            .get::<_, String>(13)?
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

const POST_COLUMNS: &str = "id, user_id, status, content, media, link, scheduled_at, \
     scheduled_bucket, queue_position, target_platforms, is_evergreen, recycle_count, \
     last_recycled_at, created_at";

fn map_constraint(err: rusqlite::Error, scheduled_at: DateTime<Utc>) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            return anyhow::Error::new(ScheduleConflict { scheduled_at });
        }
    }
    anyhow::Error::new(err).context("Failed to write post schedule")
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn insert_post(&self, post: &QueuedPost) -> Result<()> {
        let bucket = post
            .scheduled_at
            .filter(|_| post.status.occupies_slot())
            .map(|ts| bucket_of(ts, self.bucket_secs));

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
                INSERT INTO posts (id, user_id, status, content, media, link, scheduled_at,
                                   scheduled_bucket, queue_position, target_platforms,
                                   is_evergreen, recycle_count, last_recycled_at, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
            params![
                post.id.to_string(),
                post.user_id,
                post.status.as_str(),
                post.content,
                serde_json::to_string(&post.media)?,
                post.link,
                post.scheduled_at.map(format_ts),
                bucket,
                post.queue_position,
                serde_json::to_string(&post.target_platforms)?,
                post.is_evergreen as i64,
                post.recycle_count,
                post.last_recycled_at.map(format_ts),
                format_ts(post.created_at),
            ],
        )
        .map_err(|e| map_constraint(e, post.scheduled_at.unwrap_or(post.created_at)))?;

        Ok(())
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<QueuedPost>> {
        let conn = self.conn.lock().unwrap();
        let post = conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![post_id.to_string()],
                row_to_post,
            )
            .optional()
            .context("Failed to get post")?;

        Ok(post)
    }

    async fn find_occupying_post(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        user_scope: Option<&str>,
    ) -> Result<Option<QueuedPost>> {
        let conn = self.conn.lock().unwrap();

        let base = format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE scheduled_at IS NOT NULL
               AND scheduled_at > ?1 AND scheduled_at < ?2
               AND status IN ('scheduled', 'publishing', 'published')"
        );

        let post = match user_scope {
            Some(user_id) => conn
                .query_row(
                    &format!("{base} AND user_id = ?3 ORDER BY scheduled_at ASC LIMIT 1"),
                    params![format_ts(window_start), format_ts(window_end), user_id],
                    row_to_post,
                )
                .optional(),
            None => conn
                .query_row(
                    &format!("{base} ORDER BY scheduled_at ASC LIMIT 1"),
                    params![format_ts(window_start), format_ts(window_end)],
                    row_to_post,
                )
                .optional(),
        }
        .context("Failed to run occupancy check")?;

        Ok(post)
    }

    async fn update_post_schedule(
        &self,
        post_id: Uuid,
        user_id: &str,
        scheduled_at: DateTime<Utc>,
        status: PostStatus,
    ) -> Result<bool> {
        let bucket = bucket_of(scheduled_at, self.bucket_secs);
        let conn = self.conn.lock().unwrap();

        let changed = conn
            .execute(
                "UPDATE posts
                 SET scheduled_at = ?1, scheduled_bucket = ?2, status = ?3
                 WHERE id = ?4 AND user_id = ?5",
                params![
                    format_ts(scheduled_at),
                    bucket,
                    status.as_str(),
                    post_id.to_string(),
                    user_id,
                ],
            )
            .map_err(|e| map_constraint(e, scheduled_at))?;

        Ok(changed > 0)
    }

    async fn update_queue_position(
        &self,
        post_id: Uuid,
        user_id: &str,
        position: i64,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE posts SET queue_position = ?1 WHERE id = ?2 AND user_id = ?3",
                params![position, post_id.to_string(), user_id],
            )
            .context("Failed to update queue position")?;

        Ok(changed > 0)
    }

    async fn apply_schedule_assignments(
        &self,
        user_id: &str,
        assignments: &[(Uuid, DateTime<Utc>)],
    ) -> Result<usize> {
        if assignments.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .context("Failed to open reorder transaction")?;

        // Release the affected rows' buckets so the new layout cannot
        // collide with the layout it replaces.
        for (post_id, _) in assignments {
            tx.execute(
                "UPDATE posts SET scheduled_bucket = NULL WHERE id = ?1 AND user_id = ?2",
                params![post_id.to_string(), user_id],
            )
            .context("Failed to release slot bucket")?;
        }

        let mut updated = 0;
        for (post_id, scheduled_at) in assignments {
            // OR IGNORE keeps a post on its old time when its target bucket
            // is taken by a row outside this batch.
            updated += tx
                .execute(
                    "UPDATE OR IGNORE posts
                     SET scheduled_at = ?1, scheduled_bucket = ?2, status = 'scheduled'
                     WHERE id = ?3 AND user_id = ?4",
                    params![
                        format_ts(*scheduled_at),
                        bucket_of(*scheduled_at, self.bucket_secs),
                        post_id.to_string(),
                        user_id,
                    ],
                )
                .context("Failed to apply reorder assignment")?;
        }

        tx.commit().context("Failed to commit reorder transaction")?;
        Ok(updated)
    }

    async fn list_scheduled_posts(
        &self,
        user_id: &str,
        order: ScheduledOrder,
    ) -> Result<Vec<QueuedPost>> {
        let order_clause = match order {
            ScheduledOrder::QueuePosition => "queue_position ASC, created_at ASC, id ASC",
            ScheduledOrder::ScheduledAt => "scheduled_at ASC, id ASC",
        };

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE user_id = ?1 AND status = 'scheduled'
                 ORDER BY {order_clause}"
            ))
            .context("Failed to prepare scheduled-post query")?;

        let posts = stmt
            .query_map(params![user_id], row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list scheduled posts")?;

        Ok(posts)
    }

    async fn list_evergreen_templates(&self, user_id: &str) -> Result<Vec<QueuedPost>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE user_id = ?1 AND is_evergreen = 1 AND status = 'published'
                 ORDER BY (last_recycled_at IS NOT NULL), last_recycled_at ASC, created_at ASC"
            ))
            .context("Failed to prepare evergreen query")?;

        let posts = stmt
            .query_map(params![user_id], row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list evergreen templates")?;

        Ok(posts)
    }

    async fn mark_recycled(&self, post_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE posts
                 SET recycle_count = recycle_count + 1, last_recycled_at = ?1
                 WHERE id = ?2",
                params![format_ts(at), post_id.to_string()],
            )
            .context("Failed to mark template recycled")?;

        Ok(changed > 0)
    }

    async fn count_scheduled(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM posts WHERE user_id = ?1 AND status = 'scheduled'",
                params![user_id],
                |row| row.get(0),
            )
            .context("Failed to count scheduled posts")?;

        Ok(count as usize)
    }

    async fn next_scheduled_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let next: Option<String> = conn
            .query_row(
                "SELECT MIN(scheduled_at) FROM posts
                 WHERE user_id = ?1 AND status = 'scheduled' AND scheduled_at IS NOT NULL",
                params![user_id],
                |row| row.get(0),
            )
            .context("Failed to read next scheduled time")?;

        Ok(next.as_deref().and_then(parse_ts))
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

/// In-memory mock implementation of [`SlotRepository`]
pub struct MockSlotRepository {
    slots: RwLock<Vec<Slot>>,
}

impl MockSlotRepository {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MockSlotRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlotRepository for MockSlotRepository {
    async fn insert_slot(&self, slot: &Slot) -> Result<()> {
        self.slots.write().unwrap().push(slot.clone());
        Ok(())
    }

    async fn list_active_slots(&self, user_id: &str) -> Result<Vec<Slot>> {
        let mut slots: Vec<Slot> = self
            .slots
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active)
            .cloned()
            .collect();
        slots.sort_by_key(Slot::scan_key);
        Ok(slots)
    }
}

/// In-memory mock implementation of [`PostRepository`]
///
/// Mirrors the SQLite bucket-uniqueness semantics so scheduler tests exercise
/// the same conflict behavior without a database.
pub struct MockPostRepository {
    posts: RwLock<HashMap<Uuid, QueuedPost>>,
    buckets: RwLock<HashMap<Uuid, i64>>,
    bucket_secs: i64,
    scope: CollisionScope,
}

impl MockPostRepository {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            posts: RwLock::new(HashMap::new()),
            buckets: RwLock::new(HashMap::new()),
            bucket_secs: config.bucket_secs(),
            scope: config.collision_scope,
        }
    }

    pub fn len(&self) -> usize {
        self.posts.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.read().unwrap().is_empty()
    }

    fn bucket_taken(
        &self,
        posts: &HashMap<Uuid, QueuedPost>,
        buckets: &HashMap<Uuid, i64>,
        bucket: i64,
        user_id: &str,
        exclude: Uuid,
    ) -> bool {
        buckets.iter().any(|(id, b)| {
            *b == bucket
                && *id != exclude
                && match self.scope {
                    CollisionScope::Global => true,
                    CollisionScope::PerUser => posts
                        .get(id)
                        .map(|p| p.user_id == user_id)
                        .unwrap_or(false),
                }
        })
    }
}

#[async_trait]
impl PostRepository for MockPostRepository {
    async fn insert_post(&self, post: &QueuedPost) -> Result<()> {
        let mut posts = self.posts.write().unwrap();
        let mut buckets = self.buckets.write().unwrap();

        if let Some(ts) = post.scheduled_at.filter(|_| post.status.occupies_slot()) {
            let bucket = bucket_of(ts, self.bucket_secs);
            if self.bucket_taken(&posts, &buckets, bucket, &post.user_id, post.id) {
                return Err(anyhow::Error::new(ScheduleConflict { scheduled_at: ts }));
            }
            buckets.insert(post.id, bucket);
        }

        posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<QueuedPost>> {
        Ok(self.posts.read().unwrap().get(&post_id).cloned())
    }

    async fn find_occupying_post(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        user_scope: Option<&str>,
    ) -> Result<Option<QueuedPost>> {
        let posts = self.posts.read().unwrap();
        let hit = posts
            .values()
            .filter(|p| p.status.occupies_slot())
            .filter(|p| user_scope.map(|u| p.user_id == u).unwrap_or(true))
            .filter(|p| {
                p.scheduled_at
                    .map(|ts| ts > window_start && ts < window_end)
                    .unwrap_or(false)
            })
            .min_by_key(|p| p.scheduled_at)
            .cloned();

        Ok(hit)
    }

    async fn update_post_schedule(
        &self,
        post_id: Uuid,
        user_id: &str,
        scheduled_at: DateTime<Utc>,
        status: PostStatus,
    ) -> Result<bool> {
        let mut posts = self.posts.write().unwrap();
        let mut buckets = self.buckets.write().unwrap();

        if !posts
            .get(&post_id)
            .map(|p| p.user_id == user_id)
            .unwrap_or(false)
        {
            return Ok(false);
        }

        let bucket = bucket_of(scheduled_at, self.bucket_secs);
        if self.bucket_taken(&posts, &buckets, bucket, user_id, post_id) {
            return Err(anyhow::Error::new(ScheduleConflict { scheduled_at }));
        }

        let post = posts.get_mut(&post_id).unwrap();
        post.scheduled_at = Some(scheduled_at);
        post.status = status;
        buckets.insert(post_id, bucket);

        Ok(true)
    }

    async fn update_queue_position(
        &self,
        post_id: Uuid,
        user_id: &str,
        position: i64,
    ) -> Result<bool> {
        let mut posts = self.posts.write().unwrap();
        match posts.get_mut(&post_id) {
            Some(post) if post.user_id == user_id => {
                post.queue_position = position;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_schedule_assignments(
        &self,
        user_id: &str,
        assignments: &[(Uuid, DateTime<Utc>)],
    ) -> Result<usize> {
        let mut posts = self.posts.write().unwrap();
        let mut buckets = self.buckets.write().unwrap();

        for (post_id, _) in assignments {
            if posts
                .get(post_id)
                .map(|p| p.user_id == user_id)
                .unwrap_or(false)
            {
                buckets.remove(post_id);
            }
        }

        let mut updated = 0;
        for (post_id, scheduled_at) in assignments {
            let owned = posts
                .get(post_id)
                .map(|p| p.user_id == user_id)
                .unwrap_or(false);
            if !owned {
                continue;
            }

            let bucket = bucket_of(*scheduled_at, self.bucket_secs);
            if self.bucket_taken(&posts, &buckets, bucket, user_id, *post_id) {
                continue;
            }

            let post = posts.get_mut(post_id).unwrap();
            post.scheduled_at = Some(*scheduled_at);
            post.status = PostStatus::Scheduled;
            buckets.insert(*post_id, bucket);
            updated += 1;
        }

        Ok(updated)
    }

    async fn list_scheduled_posts(
        &self,
        user_id: &str,
        order: ScheduledOrder,
    ) -> Result<Vec<QueuedPost>> {
        let mut posts: Vec<QueuedPost> = self
            .posts
            .read()
            .unwrap()
            .values()
            .filter(|p| p.user_id == user_id && p.status == PostStatus::Scheduled)
            .cloned()
            .collect();

        match order {
            ScheduledOrder::QueuePosition => {
                posts.sort_by_key(|p| (p.queue_position, p.created_at, p.id));
            }
            ScheduledOrder::ScheduledAt => {
                posts.sort_by_key(|p| (p.scheduled_at, p.id));
            }
        }

        Ok(posts)
    }

    async fn list_evergreen_templates(&self, user_id: &str) -> Result<Vec<QueuedPost>> {
        let mut posts: Vec<QueuedPost> = self
            .posts
            .read()
            .unwrap()
            .values()
            .filter(|p| {
                p.user_id == user_id && p.is_evergreen && p.status == PostStatus::Published
            })
            .cloned()
            .collect();

        // Never-recycled templates sort ahead of everything else.
        posts.sort_by_key(|p| (p.last_recycled_at.is_some(), p.last_recycled_at, p.created_at));
        Ok(posts)
    }

    async fn mark_recycled(&self, post_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut posts = self.posts.write().unwrap();
        match posts.get_mut(&post_id) {
            Some(post) => {
                post.recycle_count += 1;
                post.last_recycled_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_scheduled(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .posts
            .read()
            .unwrap()
            .values()
            .filter(|p| p.user_id == user_id && p.status == PostStatus::Scheduled)
            .count())
    }

    async fn next_scheduled_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .posts
            .read()
            .unwrap()
            .values()
            .filter(|p| p.user_id == user_id && p.status == PostStatus::Scheduled)
            .filter_map(|p| p.scheduled_at)
            .min())
    }
}

// ============================================================================
// Shared constructors
// ============================================================================

/// Create shared SQLite repositories over one database file
pub fn create_sqlite_repositories(
    path: impl AsRef<Path>,
    config: &SchedulerConfig,
) -> Result<(SharedSlotRepository, SharedPostRepository)> {
    let slots = SqliteSlotRepository::new(path.as_ref())?;
    let posts = SqlitePostRepository::new(path.as_ref(), config)?;
    Ok((Arc::new(slots), Arc::new(posts)))
}

/// Create shared mock repositories
pub fn create_mock_repositories(
    config: &SchedulerConfig,
) -> (SharedSlotRepository, SharedPostRepository) {
    (
        Arc::new(MockSlotRepository::new()),
        Arc::new(MockPostRepository::new(config)),
    )
}

// ============================================================================
// Tests
// ============================================================================
