//! slotwise - Social Post Queue & Slot Scheduler
//!
//! A scheduling backend that assigns publish times to queued social posts
//! against each user's recurring weekly availability grid, with queue
//! reordering and evergreen content recycling.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures and types
//! - [`scheduler`] - Slot finding, queue assignment, reordering, recycling
//! - [`storage`] - Slot and post store repositories (SQLite, in-memory)
//! - [`commands`] - Thin CLI callers over the scheduler core
//!
//! # Example
//!
//! ```no_run
//! use slotwise::config::Config;
//! use slotwise::scheduler::{QueueAssigner, SlotFinder};
//! use slotwise::storage::create_sqlite_repositories;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let (slots, posts) =
//!         create_sqlite_repositories(&config.database.sqlite_path, &config.scheduler)?;
//!     let finder = SlotFinder::new(slots, posts.clone(), config.scheduler);
//!     let _assigner = QueueAssigner::new(finder, posts);
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CollisionScope, Config, SchedulerConfig};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{Platform, PlatformSet, PostStatus, QueuedPost, Slot};
    pub use crate::scheduler::{
        EvergreenRecycler, QueueAssigner, QueueReorderer, QueueReporter, QueueStats, SlotFinder,
    };
    pub use crate::storage::{PostRepository, SlotRepository};
}

// Direct re-exports for convenience
pub use models::{Platform, PlatformSet, PostStatus, QueuedPost, Slot};
