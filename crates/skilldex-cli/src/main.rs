use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

#[derive(Parser)]
#[command(name = "skilldex")]
#[command(about = "Operator CLI for the skill indexer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a single crawl job and exit.
    ///
    /// For deployments where an external scheduler (systemd timer, k8s
    /// CronJob) drives the crawl cadence instead of `skilldex worker`'s
    /// in-process cron.
    Crawl {
        /// Run the narrow-window incremental strategy instead of a full crawl.
        #[arg(long)]
        incremental: bool,

        /// Recency window in days, only used with --incremental.
        #[arg(long, default_value_t = 1)]
        window_days: u32,
    },

    /// Run the long-lived worker pool plus the in-process cron scheduler.
    Worker {
        /// Number of concurrent workers.
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Maximum concurrent jobs per worker.
        #[arg(long, default_value_t = 2)]
        concurrency: usize,
    },

    /// Enqueue a deep-scan job for one explicitly-named repository.
    Scan {
        /// `owner/repo` slug to scan.
        repo: String,
    },

    /// Block a catalog record by id, so future index-skill upserts skip it.
    Block {
        /// Skill id to block.
        id: String,
    },

    /// Print job-queue and catalog stats.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let result = match cli.command {
        Commands::Crawl { incremental, window_days } => {
            commands::crawl::execute(incremental, window_days).await
        }
        Commands::Worker { workers, concurrency } => {
            commands::worker::execute(workers, concurrency).await
        }
        Commands::Scan { repo } => commands::scan::execute(&repo).await,
        Commands::Block { id } => commands::block::execute(&id).await,
        Commands::Stats => commands::stats::execute().await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "Caused by:".dimmed(), cause);
        }
        std::process::exit(1);
    }

    Ok(())
}
