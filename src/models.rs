// Core data structures for the slotwise scheduler

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Platform
// ============================================================================

/// Social platforms a slot or post can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Facebook,
    Instagram,
    Linkedin,
    Tiktok,
    Youtube,
}

impl Platform {
    /// Get all platforms
    pub fn all() -> Vec<Self> {
        vec![
            Self::Twitter,
            Self::Facebook,
            Self::Instagram,
            Self::Linkedin,
            Self::Tiktok,
            Self::Youtube,
        ]
    }

    /// Get platform ID as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Linkedin => "linkedin",
            Self::Tiktok => "tiktok",
            Self::Youtube => "youtube",
        }
    }

    /// Parse from string ID
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "twitter" | "x" => Some(Self::Twitter),
            "facebook" => Some(Self::Facebook),
            "instagram" => Some(Self::Instagram),
            "linkedin" => Some(Self::Linkedin),
            "tiktok" => Some(Self::Tiktok),
            "youtube" => Some(Self::Youtube),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

// ============================================================================
// Platform Set
// ============================================================================

/// Set of target platforms with set-based intersection
///
/// Backed by a `BTreeSet` so iteration and serialization order are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformSet(BTreeSet<Platform>);

impl PlatformSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Add a platform to the set
    pub fn insert(&mut self, platform: Platform) {
        self.0.insert(platform);
    }

    /// Check membership
    pub fn contains(&self, platform: Platform) -> bool {
        self.0.contains(&platform)
    }

    /// Check whether the two sets share at least one platform
    pub fn intersects(&self, other: &PlatformSet) -> bool {
        self.0.iter().any(|p| other.0.contains(p))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate platforms in stable order
    pub fn iter(&self) -> impl Iterator<Item = Platform> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Platform> for PlatformSet {
    fn from_iter<I: IntoIterator<Item = Platform>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Platform>> for PlatformSet {
    fn from(platforms: Vec<Platform>) -> Self {
        platforms.into_iter().collect()
    }
}

impl FromStr for PlatformSet {
    type Err = String;

    /// Parse a comma-separated platform list, e.g. "twitter,linkedin"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = PlatformSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match Platform::from_id(part) {
                Some(p) => set.insert(p),
                None => return Err(format!("unknown platform '{part}'")),
            }
        }
        if set.is_empty() {
            return Err("platform list must not be empty".to_string());
        }
        Ok(set)
    }
}

impl fmt::Display for PlatformSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.0.iter().map(|p| p.id()).collect();
        write!(f, "{}", ids.join(","))
    }
}

// ============================================================================
// Post Status
// ============================================================================

/// Lifecycle status of a queued post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Publishing,
    Published,
}

impl PostStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Publishing => "publishing",
            Self::Published => "published",
        }
    }

    /// Whether a post in this status occupies its calendar slot
    ///
    /// Drafts have no claim on a slot; everything from `scheduled` onward
    /// blocks the slot for occupancy checks.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Publishing | Self::Published)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "publishing" => Ok(Self::Publishing),
            "published" => Ok(Self::Published),
            other => Err(format!("unknown post status '{other}'")),
        }
    }
}

// ============================================================================
// Slot
// ============================================================================

/// A recurring weekly availability window for autoposting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,

    /// Owning user
    pub user_id: String,

    /// Day of week, 0 = Sunday through 6 = Saturday
    pub day_of_week: u8,

    /// Wall-clock time of day, interpreted in the local time zone
    pub time_of_day: NaiveTime,

    /// Platforms this slot may be used for
    pub platforms: PlatformSet,

    /// Inactive slots are invisible to scheduling
    pub is_active: bool,
}

impl Slot {
    /// Create a new active slot
    pub fn new(
        user_id: impl Into<String>,
        day_of_week: u8,
        time_of_day: NaiveTime,
        platforms: PlatformSet,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            day_of_week,
            time_of_day,
            platforms,
            is_active: true,
        }
    }

    /// Check whether this slot recurs on the given calendar date
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        date.weekday().num_days_from_sunday() == u32::from(self.day_of_week)
    }

    /// Sort key producing the stable day-then-time scan order
    pub fn scan_key(&self) -> (u8, NaiveTime, Uuid) {
        (self.day_of_week, self.time_of_day, self.id)
    }
}

// ============================================================================
// Queued Post
// ============================================================================

/// A post record as seen by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedPost {
    pub id: Uuid,

    /// Owning user
    pub user_id: String,

    pub status: PostStatus,

    /// Post body
    pub content: String,

    /// Attached media references
    pub media: Vec<String>,

    /// Optional link metadata
    pub link: Option<String>,

    /// Publish time assigned by the scheduler
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Position in the user's queue, meaningful only for reordering
    pub queue_position: i64,

    /// Platforms the post is intended for
    pub target_platforms: PlatformSet,

    /// Evergreen posts serve as templates for recycling
    pub is_evergreen: bool,

    /// Number of clones spawned from this post
    pub recycle_count: i64,

    /// When the most recent clone was spawned
    pub last_recycled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl QueuedPost {
    /// Create a new draft post
    pub fn new_draft(
        user_id: impl Into<String>,
        content: impl Into<String>,
        target_platforms: PlatformSet,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            status: PostStatus::Draft,
            content: content.into(),
            media: Vec::new(),
            link: None,
            scheduled_at: None,
            queue_position: 0,
            target_platforms,
            is_evergreen: false,
            recycle_count: 0,
            last_recycled_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this post occupies its calendar slot
    pub fn occupies_slot(&self) -> bool {
        self.status.occupies_slot() && self.scheduled_at.is_some()
    }

    /// Clone this evergreen template into a fresh one-shot scheduled post
    ///
    /// Only content-bearing fields carry over; the clone gets a new id, is
    /// not itself evergreen, and records the template's lineage through
    /// `recycle_count`.
    pub fn clone_for_recycle(&self, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: self.user_id.clone(),
            status: PostStatus::Scheduled,
            content: self.content.clone(),
            media: self.media.clone(),
            link: self.link.clone(),
            scheduled_at: Some(scheduled_at),
            queue_position: 0,
            target_platforms: self.target_platforms.clone(),
            is_evergreen: false,
            recycle_count: self.recycle_count + 1,
            last_recycled_at: None,
            created_at: Utc::now(),
        }
    }
}
