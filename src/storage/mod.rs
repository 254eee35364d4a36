//! Slot and post store implementations
//!
//! The scheduler consumes storage through the repository traits in
//! [`repository`]; SQLite backs production use and the in-memory mocks back
//! tests.

pub mod repository;

pub use repository::{
    create_mock_repositories, create_sqlite_repositories, MockPostRepository, MockSlotRepository,
    PostRepository, ScheduleConflict, ScheduledOrder, SharedPostRepository, SharedSlotRepository,
    SlotRepository, SqlitePostRepository, SqliteSlotRepository,
};
