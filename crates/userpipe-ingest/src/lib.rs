//! userpipe Ingest Library
//!
//! Batch ETL for synthetic user records: one page is fetched from the random
//! user API, flattened into a fixed 35-column row shape, and appended to a
//! PostgreSQL table.
//!
//! # Stages
//!
//! - **fetch**: [`fetch::UserFetcher`] performs one GET and returns the raw `results`
//! - **transform**: [`transform::transform_batch`] projects every raw record
//! - **load**: [`load::Loader`] creates the table if needed and inserts row by row
//!
//! [`pipeline::Pipeline`] composes the three; [`scheduler::Scheduler`] runs it daily.
//!
//! # Example
//!
//! ```no_run
//! use userpipe_ingest::{config::PipelineConfig, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::load()?;
//!     let report = Pipeline::new(&config)?.run().await?;
//!     println!("{} rows loaded", report.outcome.rows());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod fetch;
pub mod load;
pub mod pipeline;
pub mod scheduler;
pub mod transform;

pub use config::PipelineConfig;
pub use load::LoadOutcome;
pub use pipeline::{Pipeline, RunReport};
