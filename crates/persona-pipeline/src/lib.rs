//! Persona Enrichment Pipeline Library
//!
//! A cancellable, rate-limited batch inference pipeline: takes a table of
//! social profile name/handle pairs, calls an AI provider once per row, and
//! merges the structured predictions back into the dataset.
//!
//! # Overview
//!
//! - **Row extraction**: column mapping (explicit or auto-detected) over a
//!   polars DataFrame, with null/blank normalization
//! - **Prompt building**: a fixed, versioned instruction template; pure and
//!   deterministic per row
//! - **Lenient reply parsing**: JSON or loose key/value replies decoded into
//!   five typed fields, confidence clamped to `[0.0, 1.0]`, malformed output
//!   degraded to a per-row error marker
//! - **Rate limiting**: fixed minimum spacing between provider calls,
//!   interruptible by cancellation
//! - **Batch running**: strictly ordered per-row loop; provider and parse
//!   failures absorbed per row, never aborting the batch
//! - **Progress reporting**: one event per row through a reporter trait,
//!   with closure- and channel-backed implementations
//! - **Cooperative cancellation**: a shared token polled at one safe point
//!   per row; partial results preserved
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use persona_pipeline::{
//!     BatchRunner, CancellationToken, ColumnMapping, PipelineConfig, extract_rows,
//! };
//! use persona_pipeline::ai::GeminiProvider;
//! use std::sync::Arc;
//!
//! // Extract rows from a loaded DataFrame
//! let mapping = ColumnMapping::detect(&df)
//!     .unwrap_or_else(|| ColumnMapping::new("Full Name", "Username"));
//! let rows = extract_rows(&df, &mapping)?;
//!
//! // Run the enrichment loop with progress and cancellation
//! let token = CancellationToken::new();
//! let provider = Arc::new(GeminiProvider::new(api_key)?);
//!
//! let result = BatchRunner::builder()
//!     .config(PipelineConfig::builder().requests_per_minute(20).build()?)
//!     .provider(provider)
//!     .cancellation_token(token.clone())
//!     .on_progress(|event| {
//!         println!("[{}/{}] {}", event.index + 1, event.total, event.summary);
//!     })
//!     .build()?
//!     .process(rows)?;
//!
//! println!(
//!     "{} rows processed, {} errors, stopped early: {}",
//!     result.len(),
//!     result.error_count(),
//!     result.stopped_early
//! );
//! ```
//!
//! # Cancellation
//!
//! Clone the [`CancellationToken`] before handing it to the builder and call
//! [`CancellationToken::cancel`] from any thread. The runner observes the
//! flag before starting each row (and inside rate-limiter waits) and returns
//! the partial [`ResultSet`] with `stopped_early == true`; every row recorded
//! up to that point is fully populated.
//!
//! # Providers
//!
//! The runner speaks to its backend through the [`ai::AIProvider`] trait.
//! The shipped implementation is [`ai::GeminiProvider`] (cargo feature `ai`,
//! on by default); the trait is always available for stubs and custom
//! backends.

pub mod ai;
pub mod config;
pub mod error;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod rows;
pub mod throttle;
pub mod types;

// Re-exports for convenient access
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use error::{EnrichmentError, Result, ResultExt};
pub use output::{PREDICTION_COLUMNS, output_path_for, write_enriched_csv};
pub use parser::parse_reply;
pub use pipeline::{
    BatchRunner, BatchRunnerBuilder, CancellationToken, ChannelProgressReporter,
    ClosureProgressReporter, ProgressEvent, ProgressReporter, RowStatus,
};
pub use prompt::{PROMPT_VERSION, build_prompt};
pub use rows::{ColumnMapping, extract_rows};
pub use throttle::RateLimiter;
pub use types::{InputRow, ParseFailure, Prediction, ResultRow, ResultSet, RowOutcome};
