//! userpipe - random user ETL

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use userpipe_common::logging::{init_logging, LogConfig, LogLevel};
use userpipe_ingest::config::PipelineConfig;
use userpipe_ingest::load::CREATE_TABLE_SQL;
use userpipe_ingest::pipeline::Pipeline;
use userpipe_ingest::scheduler::{Daily, Scheduler};

#[derive(Parser, Debug)]
#[command(name = "userpipe")]
#[command(author, version, about = "Fetch random users and append them to PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Execute one pipeline run now
    Run,

    /// Run every day at local midnight until interrupted
    Schedule {
        /// Also run once immediately on startup
        #[arg(long)]
        now: bool,
    },

    /// Print the destination table DDL
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Schema = cli.command {
        println!("{}", CREATE_TABLE_SQL.trim());
        return Ok(());
    }

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("userpipe")
        .filter_directives("sqlx=warn,hyper=info")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let config = PipelineConfig::load().context("Failed to load pipeline configuration")?;
    info!(source = %config.source.url, database = ?config.database, "Configuration loaded");

    let pipeline = Pipeline::new(&config)?;

    match cli.command {
        Command::Run => {
            let report = pipeline.run().await?;
            if !report.outcome.is_committed() {
                warn!(outcome = ?report.outcome, "Run finished without loading rows");
            }
        },
        Command::Schedule { now } => {
            let pipeline = &pipeline;
            let runs = Scheduler::new(Daily::default())
                .run_on_start(now)
                .run(
                    move || pipeline.run(),
                    async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            warn!(error = %e, "Failed to listen for Ctrl-C");
                            std::future::pending::<()>().await;
                        }
                    },
                )
                .await;
            info!(runs, "Scheduler exited");
        },
        // Printed above, before logging is initialised
        Command::Schema => {},
    }

    Ok(())
}
