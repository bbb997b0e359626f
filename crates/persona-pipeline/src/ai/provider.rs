//! AI provider trait for abstracting the inference call.
//!
//! The batch runner treats the provider as an opaque call: prompt string in,
//! reply string out. The trait exists as a seam, not a registry: tests
//! substitute stub providers to exercise the runner without a network, and
//! embedders can wrap another backend without touching the core loop.
//!
//! # Implementing a Provider
//!
//! ```rust,ignore
//! use persona_pipeline::ai::AIProvider;
//! use persona_pipeline::error::Result;
//!
//! struct EchoProvider;
//!
//! impl AIProvider for EchoProvider {
//!     fn infer(&self, prompt: &str) -> Result<String> {
//!         Ok(prompt.to_string())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Echo"
//!     }
//! }
//! ```

use crate::error::Result;

/// Trait for inference backends that enrich one row per call.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: the runner holds the provider
/// across the worker thread boundary.
///
/// # Error Handling
///
/// A failed call should return [`EnrichmentError::Provider`]
/// (or a variant convertible to it). The runner absorbs the failure into a
/// per-row error marker and continues with the next row; a provider error
/// never aborts the batch.
///
/// [`EnrichmentError::Provider`]: crate::error::EnrichmentError::Provider
pub trait AIProvider: Send + Sync {
    /// Send one prompt to the backend and return the raw reply text.
    ///
    /// The reply is handed to the lenient response parser as-is; the
    /// provider performs no format validation of its own.
    fn infer(&self, prompt: &str) -> Result<String>;

    /// Provider name for logging and debugging.
    fn name(&self) -> &str;

    /// The model identifier in use, if the provider exposes one.
    fn model(&self) -> Option<&str> {
        None
    }
}
