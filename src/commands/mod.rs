//! CLI command functions
//!
//! Thin callers over the scheduler core, wired to the SQLite stores. The
//! scheduler itself has no CLI surface; these commands stand in for the API
//! layer and cron jobs that drive it in production.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{PlatformSet, QueuedPost, Slot};
use crate::scheduler::{
    EvergreenRecycler, QueueAssigner, QueueReorderer, QueueReporter, SlotFinder,
};
use crate::storage::{
    create_sqlite_repositories, PostRepository, SharedPostRepository, SharedSlotRepository,
    SlotRepository,
};

fn open_stores(config: &Config) -> Result<(SharedSlotRepository, SharedPostRepository)> {
    create_sqlite_repositories(&config.database.sqlite_path, &config.scheduler)
        .context("Failed to open scheduler stores")
}

/// Seed a recurring weekly slot for a user
pub async fn add_slot(
    config: Config,
    user: String,
    day_of_week: u8,
    time: String,
    platforms: PlatformSet,
) -> Result<()> {
    if day_of_week > 6 {
        anyhow::bail!("day-of-week must be 0 (Sunday) through 6 (Saturday)");
    }
    let time_of_day = NaiveTime::parse_from_str(&time, "%H:%M")
        .with_context(|| format!("invalid time '{time}', expected HH:MM"))?;

    let (slots, _) = open_stores(&config)?;
    let slot = Slot::new(user, day_of_week, time_of_day, platforms);
    slots.insert_slot(&slot).await?;

    println!("Added slot {} ({})", slot.id, slot.platforms);
    Ok(())
}

/// Create a draft post and schedule it into the next free slot
pub async fn enqueue(
    config: Config,
    user: String,
    content: String,
    platforms: PlatformSet,
) -> Result<()> {
    let (slots, posts) = open_stores(&config)?;
    let finder = SlotFinder::new(slots, posts.clone(), config.scheduler.clone());
    let assigner = QueueAssigner::new(finder, posts.clone());

    let draft = QueuedPost::new_draft(&user, content, platforms.clone());
    posts.insert_post(&draft).await?;

    match assigner.add_to_queue(&user, draft.id, &platforms).await? {
        Some(at) => println!("Post {} scheduled for {}", draft.id, at),
        None => println!(
            "Post {} created as draft; no free slot within {} days",
            draft.id, config.scheduler.slot_scan_days
        ),
    }

    Ok(())
}

/// Re-sequence a user's queue and reassign publish times
pub async fn reorder(config: Config, user: String, post_ids: Vec<Uuid>) -> Result<()> {
    let (slots, posts) = open_stores(&config)?;
    let reorderer = QueueReorderer::new(slots, posts, config.scheduler);

    let outcome = reorderer.reorder_queue(&user, &post_ids).await?;
    println!(
        "Reordered {} posts: {} rescheduled, {} left on their previous time",
        outcome.positions_written, outcome.rescheduled, outcome.skipped
    );

    Ok(())
}

/// Fill upcoming empty slots with evergreen clones
pub async fn fill_evergreen(config: Config, user: String, days_ahead: u32) -> Result<()> {
    let (slots, posts) = open_stores(&config)?;
    let finder = SlotFinder::new(slots, posts.clone(), config.scheduler);
    let recycler = EvergreenRecycler::new(finder, posts);

    let created = recycler.fill_queue_with_evergreen(&user, days_ahead).await?;
    println!("Created {created} recycled posts within {days_ahead} days");

    Ok(())
}

/// Print queue statistics as JSON
pub async fn stats(config: Config, user: String) -> Result<()> {
    let (slots, posts) = open_stores(&config)?;
    let reporter = QueueReporter::new(slots, posts);

    let stats = reporter.queue_stats(&user).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

/// List the user's scheduled queue in publish order
pub async fn list_queue(config: Config, user: String) -> Result<()> {
    let (_, posts) = open_stores(&config)?;

    let queue = posts
        .list_scheduled_posts(&user, crate::storage::ScheduledOrder::ScheduledAt)
        .await?;

    if queue.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }

    for post in queue {
        let when = post
            .scheduled_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| String::from("-"));
        println!(
            "{}  {}  [{}]  {}",
            post.id,
            when,
            post.target_platforms,
            truncate(&post.content, 48)
        );
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
