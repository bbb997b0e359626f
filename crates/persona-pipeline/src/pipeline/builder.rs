//! Builder for the batch runner.

use std::sync::Arc;

use crate::ai::AIProvider;
use crate::config::PipelineConfig;
use crate::error::{EnrichmentError, Result};
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, ProgressEvent, ProgressReporter,
};
use crate::pipeline::runner::BatchRunner;

/// Builder for a [`BatchRunner`].
///
/// Use [`BatchRunner::builder()`] to get started. A provider is mandatory;
/// configuration, reporter and token have working defaults.
///
/// # Example
///
/// ```rust,ignore
/// use persona_pipeline::{BatchRunner, PipelineConfig, CancellationToken};
/// use std::sync::Arc;
///
/// let token = CancellationToken::new();
///
/// let runner = BatchRunner::builder()
///     .config(PipelineConfig::builder().requests_per_minute(30).build()?)
///     .provider(provider)
///     .cancellation_token(token)
///     .on_progress(|event| {
///         println!("[{}/{}] {}", event.index + 1, event.total, event.summary);
///     })
///     .build()?;
/// ```
#[derive(Default)]
pub struct BatchRunnerBuilder {
    config: Option<PipelineConfig>,
    provider: Option<Arc<dyn AIProvider>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

// The builder may be moved to a worker thread before build().
static_assertions::assert_impl_all!(BatchRunnerBuilder: Send);

impl BatchRunnerBuilder {
    /// Set the pipeline configuration. Defaults to [`PipelineConfig::default`].
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the inference provider. Required.
    ///
    /// `Arc` so the provider can be shared and reused across runners.
    pub fn provider(mut self, provider: Arc<dyn AIProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set a progress reporter for per-row events.
    ///
    /// Use this for a custom [`ProgressReporter`] implementation, such as a
    /// channel-backed reporter feeding a driver thread.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// Convenience wrapper over
    /// [`progress_reporter`](Self::progress_reporter) for simple consumers.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set the cancellation token the runner polls.
    ///
    /// Clone the token and call [`CancellationToken::cancel()`] from any
    /// thread to request a graceful stop. Defaults to a fresh token that
    /// nobody else holds, i.e. an uncancellable run.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the runner.
    ///
    /// # Errors
    ///
    /// `Validation` if no provider was supplied; `InvalidConfig` if the
    /// configuration fails validation.
    pub fn build(self) -> Result<BatchRunner> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| EnrichmentError::InvalidConfig(e.to_string()))?;

        let provider = self.provider.ok_or_else(|| {
            EnrichmentError::Validation("An inference provider is required".to_string())
        })?;

        Ok(BatchRunner {
            config,
            provider,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopProvider;

    impl AIProvider for NoopProvider {
        fn infer(&self, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }

        fn name(&self) -> &str {
            "Noop"
        }
    }

    #[test]
    fn test_build_without_provider_fails() {
        let err = BatchRunner::builder().build().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_build_with_defaults() {
        let runner = BatchRunner::builder()
            .provider(Arc::new(NoopProvider))
            .build()
            .unwrap();

        assert_eq!(runner.config.requests_per_minute, 20);
        assert!(runner.progress_reporter.is_none());
        assert!(!runner.cancellation_token.is_cancelled());
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        // The config builder already rejects rpm == 0, so smuggle one in
        // through deserialization the way an embedding caller could.
        let config: PipelineConfig =
            serde_json::from_str(r#"{"requests_per_minute": 0}"#).unwrap();

        let err = BatchRunner::builder()
            .config(config)
            .provider(Arc::new(NoopProvider))
            .build()
            .unwrap_err();

        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_builder_with_cancellation_token() {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let runner = BatchRunner::builder()
            .provider(Arc::new(NoopProvider))
            .cancellation_token(token)
            .build()
            .unwrap();

        assert!(!runner.cancellation_token().is_cancelled());

        token_clone.cancel();

        assert!(runner.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_builder_with_progress_callback() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let runner = BatchRunner::builder()
            .provider(Arc::new(NoopProvider))
            .on_progress(move |_event| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let row = crate::types::ResultRow::new(
            crate::types::InputRow::new("A", "a"),
            crate::types::RowOutcome::Error {
                message: "test".to_string(),
            },
        );
        runner.report_progress(ProgressEvent::for_row(0, 1, &row));

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
