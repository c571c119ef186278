mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "nous-srs-cli", about = "Spaced repetition study queue and review CLI", version)]
struct Cli {
    /// Learner ID (default: the one stored in the data directory)
    #[arg(long, global = true)]
    owner: Option<Uuid>,

    /// Data directory (default: platform data dir /nous-srs)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/study.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Build a study session (exam-aware unless scoped to a document)
    Learn {
        /// Restrict to one document
        #[arg(long)]
        document: Option<Uuid>,
        /// Maximum new cards
        #[arg(long)]
        new_limit: Option<usize>,
        /// Maximum due cards
        #[arg(long)]
        review_limit: Option<usize>,
        /// Maximum exam cards
        #[arg(long)]
        exam_limit: Option<usize>,
    },

    /// List cards due for review
    Due {
        #[arg(long)]
        document: Option<Uuid>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List new cards
    New {
        #[arg(long)]
        document: Option<Uuid>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Rate a card: 1 again, 2 hard, 3 good, 4 easy
    Review {
        card: Uuid,
        rating: u8,
    },

    /// Undo the latest review of a card
    Undo {
        card: Uuid,
        /// Log ID returned by the review
        log: Uuid,
        /// JSON file with the card snapshot from the review ("-" for stdin)
        #[arg(long)]
        snapshot: String,
    },

    /// Show the interval each rating would give
    Preview {
        card: Uuid,
    },

    /// Suspend a card, or reactivate it with --off
    Suspend {
        card: Uuid,
        #[arg(long)]
        off: bool,
    },

    /// List leech cards
    Leeches {
        /// Show counts only
        #[arg(long)]
        stats: bool,
    },

    /// Review statistics
    Stats,

    /// Create and remove cards to match a document's content units
    Sync {
        document: Uuid,
        /// JSON array of content units to store first ("-" for stdin)
        #[arg(long)]
        units: Option<String>,
    },

    /// Delete cards whose content is gone or disabled
    Cleanup,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let app = app::App::new(cli.data_dir.as_deref(), cli.config.as_deref(), cli.owner)?;

    match cli.command {
        Command::Learn {
            document,
            new_limit,
            review_limit,
            exam_limit,
        } => {
            let limits = app.session_limits(new_limit, review_limit, exam_limit);
            commands::learn::run_session(&app, document, &limits, &cli.format, use_color)?;
        }
        Command::Due { document, limit } => {
            commands::learn::run_due(&app, document, limit, &cli.format, use_color)?;
        }
        Command::New { document, limit } => {
            commands::learn::run_new(&app, document, limit, &cli.format, use_color)?;
        }
        Command::Review { card, rating } => {
            commands::review::run_review(&app, card, rating, &cli.format, use_color)?;
        }
        Command::Undo { card, log, snapshot } => {
            commands::review::run_undo(&app, card, log, &snapshot, &cli.format)?;
        }
        Command::Preview { card } => {
            commands::preview::run(&app, card, &cli.format, use_color)?;
        }
        Command::Suspend { card, off } => {
            commands::review::run_suspend(&app, card, !off, &cli.format)?;
        }
        Command::Leeches { stats } => {
            commands::leech::run(&app, stats, &cli.format, use_color)?;
        }
        Command::Stats => {
            commands::stats::run(&app, &cli.format, use_color)?;
        }
        Command::Sync { document, units } => {
            commands::maintenance::run_sync(&app, document, units.as_deref(), &cli.format)?;
        }
        Command::Cleanup => {
            commands::maintenance::run_cleanup(&app, &cli.format)?;
        }
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
