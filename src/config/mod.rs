//! Configuration management for the slotwise scheduler
//!
//! This module handles loading and validating configuration from environment
//! variables. Scan bounds and the collision window are deliberate knobs, not
//! literals buried in the scheduler.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Scope of the slot occupancy check
///
/// The publishing calendar has historically been treated as a resource
/// shared across every user of the platform, so `Global` is the default.
/// `PerUser` confines collision checks and the uniqueness constraint to a
/// single user's posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionScope {
    Global,
    PerUser,
}

impl CollisionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::PerUser => "per-user",
        }
    }
}

impl FromStr for CollisionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "per-user" | "per_user" | "user" => Ok(Self::PerUser),
            other => Err(format!("unknown collision scope '{other}'")),
        }
    }
}

/// Scheduler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Forward window scanned by the slot finder, in days
    pub slot_scan_days: u32,

    /// Forward window scanned by the queue reorderer, in days
    pub reorder_scan_days: u32,

    /// Minutes on either side of a candidate inside which another post
    /// counts as occupying the slot
    pub collision_window_mins: i64,

    /// Whether occupancy is checked across all users or per user
    pub collision_scope: CollisionScope,
}

impl SchedulerConfig {
    /// Size of one uniqueness bucket in seconds
    ///
    /// Scheduled times rounded into the same bucket are rejected by the
    /// storage layer, closing the find-then-write race.
    pub fn bucket_secs(&self) -> i64 {
        self.collision_window_mins * 60
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slot_scan_days: 14,
            reorder_scan_days: 365,
            collision_window_mins: 5,
            collision_scope: CollisionScope::Global,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let sqlite_path = std::env::var("SLOTWISE_SQLITE_PATH")
            .unwrap_or_else(|_| String::from("data/slotwise.db"))
            .into();

        let defaults = SchedulerConfig::default();

        let slot_scan_days = std::env::var("SLOTWISE_SLOT_SCAN_DAYS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.slot_scan_days);

        let reorder_scan_days = std::env::var("SLOTWISE_REORDER_SCAN_DAYS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.reorder_scan_days);

        let collision_window_mins = std::env::var("SLOTWISE_COLLISION_WINDOW_MINS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(defaults.collision_window_mins);

        let collision_scope = std::env::var("SLOTWISE_COLLISION_SCOPE")
            .ok()
            .and_then(|v| v.parse::<CollisionScope>().ok())
            .unwrap_or(defaults.collision_scope);

        let level = std::env::var("SLOTWISE_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let format = std::env::var("SLOTWISE_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        let config = Self {
            database: DatabaseConfig { sqlite_path },
            scheduler: SchedulerConfig {
                slot_scan_days,
                reorder_scan_days,
                collision_window_mins,
                collision_scope,
            },
            logging: LoggingConfig { level, format },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.slot_scan_days == 0 {
            bail!("slot_scan_days must be at least 1");
        }
        if self.scheduler.reorder_scan_days == 0 {
            bail!("reorder_scan_days must be at least 1");
        }
        if self.scheduler.collision_window_mins <= 0 {
            bail!("collision_window_mins must be positive");
        }
        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            bail!("invalid log level '{}'", self.logging.level);
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            bail!("invalid log format '{}'", self.logging.format);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                sqlite_path: PathBuf::from("data/slotwise.db"),
            },
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
