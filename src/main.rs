use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use slotwise::commands;
use slotwise::config::Config;
use slotwise::models::PlatformSet;

#[derive(Parser)]
#[command(
    name = "slotwise",
    version,
    about = "Social post queue and slot scheduler",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a recurring weekly availability slot
    AddSlot {
        /// User owning the slot
        #[arg(short, long)]
        user: String,

        /// Day of week, 0 = Sunday through 6 = Saturday
        #[arg(short, long)]
        day: u8,

        /// Time of day as HH:MM (local time)
        #[arg(short, long)]
        time: String,

        /// Comma-separated platform list, e.g. twitter,linkedin
        #[arg(short, long)]
        platforms: PlatformSet,
    },

    /// Create a post and schedule it into the next free slot
    Enqueue {
        /// Posting user
        #[arg(short, long)]
        user: String,

        /// Post body
        #[arg(short, long)]
        content: String,

        /// Comma-separated target platform list
        #[arg(short, long)]
        platforms: PlatformSet,
    },

    /// Re-sequence the queue and reassign publish times
    Reorder {
        /// Posting user
        #[arg(short, long)]
        user: String,

        /// Post ids in the desired queue order
        #[arg(required = true)]
        post_ids: Vec<Uuid>,
    },

    /// Fill upcoming empty slots with evergreen clones
    FillEvergreen {
        /// Posting user
        #[arg(short, long)]
        user: String,

        /// Horizon in days
        #[arg(short, long, default_value = "7")]
        days_ahead: u32,
    },

    /// Show queue statistics
    Stats {
        /// Posting user
        #[arg(short, long)]
        user: String,
    },

    /// List the scheduled queue in publish order
    ListQueue {
        /// Posting user
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = Config::from_env()?;

    match cli.command {
        Commands::AddSlot {
            user,
            day,
            time,
            platforms,
        } => {
            tracing::info!(user = %user, day = %day, time = %time, "Starting add-slot command");
            commands::add_slot(config, user, day, time, platforms).await?;
        }

        Commands::Enqueue {
            user,
            content,
            platforms,
        } => {
            tracing::info!(user = %user, platforms = %platforms, "Starting enqueue command");
            commands::enqueue(config, user, content, platforms).await?;
        }

        Commands::Reorder { user, post_ids } => {
            tracing::info!(user = %user, count = post_ids.len(), "Starting reorder command");
            commands::reorder(config, user, post_ids).await?;
        }

        Commands::FillEvergreen { user, days_ahead } => {
            tracing::info!(user = %user, days_ahead = %days_ahead, "Starting fill-evergreen command");
            commands::fill_evergreen(config, user, days_ahead).await?;
        }

        Commands::Stats { user } => {
            commands::stats(config, user).await?;
        }

        Commands::ListQueue { user } => {
            commands::list_queue(config, user).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("slotwise=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("slotwise=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
