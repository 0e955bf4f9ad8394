//! LiveLog CLI
//!
//! Demo and debugging tools for the LiveLog sync engine.
//!
//! # Commands
//!
//! - `tail` - Follow a synthetic update feed through a full sync engine
//! - `seq` - Publish a batch of updates and walk the diff pages
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// LiveLog command-line demo tools.
#[derive(Parser)]
#[command(name = "livelog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a synthetic update feed through a full sync engine
    Tail {
        /// Number of updates the feed publishes before stopping
        #[arg(short, long, default_value = "40")]
        count: u64,

        /// Milliseconds between published updates
        #[arg(short, long, default_value = "50")]
        interval_ms: u64,

        /// Resume from this sequence instead of 0
        #[arg(short, long, default_value = "0")]
        resume: u64,

        /// Diff page size of the in-process server
        #[arg(short, long, default_value = "10")]
        page_size: usize,

        /// Drop every Nth update from the push stream (recovered via
        /// catch-up)
        #[arg(long)]
        drop_every: Option<u64>,

        /// Kill the push connection after every Nth update
        #[arg(long)]
        disconnect_every: Option<u64>,

        /// Publish an unrecognizable payload every Nth update
        #[arg(long)]
        malformed_every: Option<u64>,
    },

    /// Publish a batch of updates and walk the diff pages
    Seq {
        /// Number of updates to publish
        #[arg(short, long, default_value = "10")]
        count: u64,

        /// Diff page size
        #[arg(short, long, default_value = "4")]
        page_size: usize,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Tail {
            count,
            interval_ms,
            resume,
            page_size,
            drop_every,
            disconnect_every,
            malformed_every,
        } => {
            commands::tail::run(commands::tail::TailOptions {
                count,
                interval: Duration::from_millis(interval_ms),
                resume,
                page_size,
                drop_every,
                disconnect_every,
                malformed_every,
            })
            .await?;
        }
        Commands::Seq { count, page_size } => {
            commands::seq::run(count, page_size)?;
        }
        Commands::Version => {
            println!("LiveLog CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
