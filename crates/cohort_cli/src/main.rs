//! Cohort CLI
//!
//! Command-line access to a segment store.
//!
//! # Commands
//!
//! - `create` / `delete` - Manage segments
//! - `patch` - Add and remove a user's segments in one transaction
//! - `segments` - Show a user's segments, rollouts included
//! - `members` - List users explicitly linked to a segment
//! - `history` - Export a user's monthly history report
//! - `sweep` - Remove expired links
//! - `inspect` - Display store statistics and journal records

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Cohort segment membership tools.
#[derive(Parser)]
#[command(name = "cohort")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Directory history reports are written to
    #[arg(global = true, long)]
    report_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for commands that print structured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable lines
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a segment
    Create {
        /// Segment slug
        slug: String,

        /// Rollout percentage (0-100)
        #[arg(short = 'r', long)]
        percentage: Option<i64>,
    },

    /// Delete a segment
    Delete {
        /// Segment slug
        slug: String,
    },

    /// Add and remove segments for a user
    Patch {
        /// User ID
        user_id: i64,

        /// Slugs to add (comma separated or repeated)
        #[arg(short, long, value_delimiter = ',')]
        add: Vec<String>,

        /// Slugs to remove (comma separated or repeated)
        #[arg(short, long, value_delimiter = ',')]
        delete: Vec<String>,

        /// Expiry for added links, `YYYY-MM-DD HH:MM:SS` UTC
        #[arg(short, long)]
        expires: Option<String>,
    },

    /// Show a user's segments
    Segments {
        /// User ID
        user_id: i64,

        /// Only explicit links, no rollouts
        #[arg(long)]
        explicit: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List users explicitly linked to a segment
    Members {
        /// Segment slug
        slug: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Export a user's history for one month
    History {
        /// User ID
        user_id: i64,

        /// Month as YYYY-MM
        year_month: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Remove links whose expiry has passed
    Sweep,

    /// Display store statistics
    Inspect {
        /// Also list segments
        #[arg(short, long)]
        segments: bool,

        /// Dump journal records, at most this many
        #[arg(short, long)]
        records: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("Cohort CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("Cohort Core v{}", cohort_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or(commands::CliError::MissingPath)?;
    let store = commands::StoreArgs {
        path,
        report_dir: cli.report_dir,
    };

    match cli.command {
        Commands::Create { slug, percentage } => {
            commands::segment::create(&store, &slug, percentage)?;
        }
        Commands::Delete { slug } => {
            commands::segment::delete(&store, &slug)?;
        }
        Commands::Patch {
            user_id,
            add,
            delete,
            expires,
        } => {
            commands::membership::patch(&store, user_id, add, delete, expires.as_deref())?;
        }
        Commands::Segments {
            user_id,
            explicit,
            format,
        } => {
            commands::membership::segments(&store, user_id, explicit, format)?;
        }
        Commands::Members { slug, format } => {
            commands::segment::members(&store, &slug, format)?;
        }
        Commands::History {
            user_id,
            year_month,
            format,
        } => {
            commands::membership::history(&store, user_id, &year_month, format)?;
        }
        Commands::Sweep => {
            commands::membership::sweep(&store)?;
        }
        Commands::Inspect {
            segments,
            records,
            format,
        } => {
            commands::inspect::run(&store, segments, records, format)?;
        }
        Commands::Version => {}
    }

    Ok(())
}
