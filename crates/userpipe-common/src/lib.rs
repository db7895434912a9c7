//! userpipe Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared record types, error handling and logging for the userpipe workspace.
//!
//! # Overview
//!
//! - **Records**: the raw upstream user object and its flat tabular projection
//! - **Error Handling**: [`PipelineError`] and the [`Result`] alias used by every stage
//! - **Logging**: `tracing` subscriber setup shared by binaries and tests
//!
//! # Example
//!
//! ```no_run
//! use userpipe_common::{FlatUserRecord, Result};
//!
//! fn count_rows(batch: &[FlatUserRecord]) -> Result<usize> {
//!     Ok(batch.len())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod records;

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use records::{FlatUserRecord, RawUserRecord};
