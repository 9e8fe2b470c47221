mod browser;
mod config;
mod db;
mod driver;
mod error;
mod extractor;
#[cfg(test)]
mod fake;
mod logging;
mod models;
mod pagination;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use browser::ChromeSession;
use config::{Config, ScrapeArgs};
use db::{Database, RecordStore};
use session::SearchSession;

#[derive(Parser)]
#[command(name = "jobcrawl")]
#[command(about = "Job board crawler - collect new postings and employers into a local database")]
struct Cli {
    /// Path to the jobs database
    #[arg(long, global = true, env = "DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true, env = "LOGGING_PATH")]
    log_file: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Run a search and store every new posting
    Scrape(ScrapeArgs),

    /// Look up stored jobs by title, company, location or remote status
    Search {
        /// Text to look for
        term: String,

        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored employers
    Employers,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; flags and the real environment still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref(), cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let db_path = cli.database.unwrap_or_else(Database::default_path);
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Scrape(args) => {
            let config = Config::from_args(args)?;
            info!(database = %db.path().display(), "database ready");

            let browser = ChromeSession::connect(&config.browser, config.pacing).await?;
            let summary = SearchSession::new(&config, browser, &db)
                .run()
                .await
                .context("Scrape aborted")?;
            println!(
                "Added {} job(s) and {} employer(s) across {} page(s).",
                summary.jobs_added, summary.employers_added, summary.pages
            );
        }

        Commands::Search { term, json } => {
            let jobs = db.search_jobs(&term)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else if jobs.is_empty() {
                println!("No matching jobs found.");
            } else {
                println!("{:<12} {:<30} {:<20} {:<20} {:<10}", "ID", "TITLE", "COMPANY", "LOCATION", "REMOTE");
                println!("{}", "-".repeat(96));
                for job in jobs {
                    println!(
                        "{:<12} {:<30} {:<20} {:<20} {:<10}",
                        truncate(&job.external_id, 10),
                        truncate(&job.title, 28),
                        truncate(&job.company, 18),
                        truncate(&job.location, 18),
                        job.remote_status
                    );
                }
            }
        }

        Commands::Employers => {
            let employers = db.list_employers()?;
            if employers.is_empty() {
                println!("No employers found.");
            } else {
                println!("{:<40} {:<20}", "COMPANY", "REGION");
                println!("{}", "-".repeat(60));
                for emp in employers {
                    println!("{:<40} {:<20}", truncate(&emp.company, 38), emp.region);
                }
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
