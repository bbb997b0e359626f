//! The batch runner: the sequential per-row processing loop.
//!
//! One `process()` call is one run. The loop checks cancellation, waits out
//! the rate limiter, builds the prompt, calls the provider, parses the reply
//! and records the outcome, one row at a time in input order. Row-scoped
//! failures (provider or parse) become error markers; bad preconditions and
//! errors the provider surfaces outside the row scope fail the run itself.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::ai::AIProvider;
use crate::config::PipelineConfig;
use crate::error::{EnrichmentError, Result};
use crate::parser::parse_reply;
use crate::pipeline::builder::BatchRunnerBuilder;
use crate::pipeline::progress::{CancellationToken, ProgressEvent, ProgressReporter};
use crate::prompt::build_prompt;
use crate::throttle::RateLimiter;
use crate::types::{InputRow, ResultRow, ResultSet, RowOutcome};

/// The batch enrichment runner.
///
/// Use [`BatchRunner::builder()`] to construct one; call
/// [`process`](Self::process) per run. The runner itself is reusable: each
/// `process()` call builds fresh run state, and the same cancellation token
/// serves a new run after [`CancellationToken::reset`].
///
/// # Example
///
/// ```rust,ignore
/// use persona_pipeline::{BatchRunner, CancellationToken, PipelineConfig};
/// use persona_pipeline::ai::GeminiProvider;
/// use std::sync::Arc;
///
/// let token = CancellationToken::new();
/// let provider = Arc::new(GeminiProvider::new(api_key)?);
///
/// let result = BatchRunner::builder()
///     .config(PipelineConfig::default())
///     .provider(provider)
///     .cancellation_token(token.clone())
///     .on_progress(|event| {
///         println!("[{}/{}] {}", event.index + 1, event.total, event.summary);
///     })
///     .build()?
///     .process(rows)?;
///
/// println!("{} rows, {} errors", result.len(), result.error_count());
/// ```
pub struct BatchRunner {
    pub(super) config: PipelineConfig,
    pub(super) provider: Arc<dyn AIProvider>,
    pub(super) progress_reporter: Option<Arc<dyn ProgressReporter>>,
    pub(super) cancellation_token: CancellationToken,
}

// The runner moves to a worker thread while the driver keeps the token.
static_assertions::assert_impl_all!(BatchRunner: Send, Sync);

// Manual impl because the provider and reporter are trait objects.
impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("config", &self.config)
            .field("cancellation_token", &self.cancellation_token)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Create a new runner builder.
    pub fn builder() -> BatchRunnerBuilder {
        BatchRunnerBuilder::default()
    }

    /// The cancellation token this runner polls.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Run the enrichment loop over `rows`.
    ///
    /// Returns the full [`ResultSet`] on completion, or a partial one with
    /// `stopped_early == true` if cancellation was observed. Per-row provider
    /// and parse failures are absorbed into error-marker rows and never fail
    /// the run.
    ///
    /// # Errors
    ///
    /// `Validation` if `rows` is empty. Once the loop starts it only fails
    /// if the provider surfaces a non-row-scoped error; a surfaced
    /// cancellation stops the run with a partial set instead.
    pub fn process(&self, rows: Vec<InputRow>) -> Result<ResultSet> {
        if rows.is_empty() {
            return Err(EnrichmentError::Validation(
                "No rows to process".to_string(),
            ));
        }

        let total = rows.len();
        let started = Instant::now();
        info!(
            total,
            provider = self.provider.name(),
            model = %self.config.model_identifier,
            requests_per_minute = self.config.requests_per_minute,
            "Starting enrichment run"
        );

        let result = self.run_loop(rows);

        match &result {
            Ok(set) if set.stopped_early => {
                info!(
                    processed = set.len(),
                    total,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Run cancelled; partial results preserved"
                );
            }
            Ok(set) => {
                info!(
                    processed = set.len(),
                    errors = set.error_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Run complete"
                );
            }
            Err(e) => {
                error!("Run failed: {e}");
            }
        }

        result
    }

    fn run_loop(&self, rows: Vec<InputRow>) -> Result<ResultSet> {
        let total = rows.len();
        let mut limiter = RateLimiter::from_config(&self.config);
        let mut results: Vec<ResultRow> = Vec::with_capacity(total);

        for (index, row) in rows.into_iter().enumerate() {
            // The one safe point: an observed cancel means row `index` is
            // never started, and every earlier row is fully recorded.
            if self.cancellation_token.is_cancelled() {
                return Ok(ResultSet {
                    rows: results,
                    stopped_early: true,
                });
            }

            match limiter.await_turn(&self.cancellation_token) {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {
                    return Ok(ResultSet {
                        rows: results,
                        stopped_early: true,
                    });
                }
                Err(e) => return Err(e),
            }

            info!("Analyzing row {}/{}: {}", index + 1, total, row.label());

            let outcome = match self.process_row(&row) {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => {
                    return Ok(ResultSet {
                        rows: results,
                        stopped_early: true,
                    });
                }
                Err(e) => return Err(e),
            };
            results.push(ResultRow::new(row, outcome));

            // `results` is non-empty here; the row was just pushed.
            let event = ProgressEvent::for_row(index, total, &results[results.len() - 1]);
            self.report_progress(event);
        }

        Ok(ResultSet {
            rows: results,
            stopped_early: false,
        })
    }

    /// Process one row end to end. Row-scoped failures (provider call,
    /// unparseable reply) degrade to an error marker for this row alone;
    /// anything else the provider surfaces propagates to the loop.
    fn process_row(&self, row: &InputRow) -> Result<RowOutcome> {
        let prompt = build_prompt(row);
        debug!(chars = prompt.len(), "Built prompt");

        let reply = match self.provider.infer(&prompt) {
            Ok(reply) => reply,
            Err(e) if e.is_row_scoped() => {
                warn!(row = row.label(), "Provider call failed: {e}");
                return Ok(RowOutcome::Error {
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let outcome = match parse_reply(&reply) {
            Ok(prediction) => RowOutcome::Prediction(prediction),
            Err(failure) => {
                warn!(row = row.label(), "Unparseable reply: {failure}");
                RowOutcome::Error {
                    message: failure.to_string(),
                }
            }
        };
        Ok(outcome)
    }

    pub(super) fn report_progress(&self, event: ProgressEvent) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(event);
        }
    }
}
