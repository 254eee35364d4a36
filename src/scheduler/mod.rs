//! Post queue and slot scheduling
//!
//! This module assigns publish times to queued posts against each user's
//! recurring weekly availability grid, re-sequences queues, and recycles
//! evergreen content into empty slots.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Callers                               │
//! │        (API layer, cron-style jobs, CLI commands)             │
//! └───────────────────────────────────────────────────────────────┘
//!         │               │                │              │
//!         ▼               ▼                ▼              ▼
//!  ┌────────────┐  ┌─────────────┐  ┌────────────┐  ┌──────────┐
//!  │   Queue    │  │    Queue    │  │ Evergreen  │  │  Queue   │
//!  │  Assigner  │  │  Reorderer  │  │  Recycler  │  │ Reporter │
//!  └─────┬──────┘  └──────┬──────┘  └─────┬──────┘  └────┬─────┘
//!        │                │               │              │
//!        └──────────┬─────┘───────────────┘              │
//!                   ▼                                    │
//!            ┌────────────┐                              │
//!            │ SlotFinder │                              │
//!            └─────┬──────┘                              │
//!                  ▼                                     ▼
//!      ┌──────────────────────────────────────────────────────┐
//!      │           Slot Store  /  Post Store                  │
//!      └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Scheduling model
//!
//! Every operation is a synchronous request-scoped computation: sequential
//! reads, a decision, then writes, with no background workers. The
//! find-then-write pair is not atomic on its own; the storage layer's
//! bucket-uniqueness constraint backstops the race (see
//! [`crate::storage::repository`]).
//!
//! # Modules
//!
//! - [`slot_finder`] - next free slot search over the weekly grid
//! - [`assign`] - adding a single post to the queue
//! - [`reorder`] - queue re-sequencing with the shared slot cursor
//! - [`recycler`] - evergreen content recycling
//! - [`stats`] - read-only queue reporting
//!
//! # Quick Start
//!
//! ```ignore
//! use slotwise::config::SchedulerConfig;
//! use slotwise::scheduler::{QueueAssigner, SlotFinder};
//! use slotwise::storage::create_sqlite_repositories;
//!
//! let config = SchedulerConfig::default();
//! let (slots, posts) = create_sqlite_repositories("data/slotwise.db", &config)?;
//!
//! let finder = SlotFinder::new(slots.clone(), posts.clone(), config);
//! let assigner = QueueAssigner::new(finder, posts);
//!
//! if let Some(at) = assigner.add_to_queue("user-1", post_id, &platforms).await? {
//!     println!("scheduled for {at}");
//! }
//! ```

pub mod assign;
pub mod error;
pub mod recycler;
pub mod reorder;
pub mod slot_finder;
pub mod stats;

// Re-export main types
pub use assign::QueueAssigner;
pub use error::{SchedulerError, SchedulerResult};
pub use recycler::EvergreenRecycler;
pub use reorder::{plan_assignments, Cursor, PlannedSlot, QueueReorderer, ReorderOutcome};
pub use slot_finder::SlotFinder;
pub use stats::{QueueReporter, QueueStats};
