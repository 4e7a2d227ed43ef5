//! # gitbored CLI
//!
//! ## Usage
//!
//! ```bash
//! gitbored --config ./config/gitbored.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gitbored init` | Create the working directory, SQLite database and schema |
//! | `gitbored sync` | Run one polling cycle and print a summary |
//! | `gitbored daemon` | Poll on a fixed interval until Ctrl-C or SIGTERM |
//! | `gitbored stats` | Show repository and commit counts |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gitbored::{config, db, ingest, logging, migrate, scheduler, stats};

/// gitbored: keep a local SQLite history of a GitHub account's activity.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/gitbored.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "gitbored",
    about = "Poll a GitHub account's repositories and pushed commits into SQLite",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gitbored.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the working directory and database schema.
    ///
    /// Idempotent: running it again leaves existing data untouched.
    Init,

    /// Run exactly one polling cycle.
    ///
    /// Syncs repositories, then commits, and prints per-operation counts.
    /// Exits non-zero if either operation failed.
    Sync,

    /// Poll forever on `schedule.interval_secs`.
    ///
    /// Writes `<workdir>/pid` and refuses to start if another daemon holds it.
    Daemon,

    /// Show database statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let to_file = matches!(cli.command, Commands::Daemon);
    let _log_guard = logging::init_logging(&cfg.logging, &cfg.workdir, to_file)?;

    match cli.command {
        Commands::Init => {
            std::fs::create_dir_all(&cfg.workdir).with_context(|| {
                format!("Failed to create workdir: {}", cfg.workdir.display())
            })?;
            let pool = db::connect(&cfg.db_path()).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", cfg.db_path().display());
        }
        Commands::Sync => {
            ingest::run_sync(&cfg).await?;
        }
        Commands::Daemon => {
            scheduler::run_daemon(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
