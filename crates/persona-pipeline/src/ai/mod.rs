//! AI module for the inference backend.
//!
//! The batch runner speaks to its backend through the [`AIProvider`] trait:
//! prompt in, raw reply out. One concrete implementation ships, the Gemini
//! provider; the trait exists so tests can substitute stubs and embedders
//! can bring their own backend.
//!
//! # Feature Flag
//!
//! The [`AIProvider`] trait is always available. The concrete
//! [`GeminiProvider`] requires the `ai` feature (enabled by default), which
//! pulls in the HTTP stack:
//!
//! ```toml
//! # Enable the Gemini provider (default)
//! persona-pipeline = { version = "0.1", features = ["ai"] }
//!
//! # Core only: runner, parser, limiter; no HTTP stack
//! persona-pipeline = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use persona_pipeline::ai::GeminiProvider;
//! use persona_pipeline::BatchRunner;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(GeminiProvider::new("your-api-key")?);
//!
//! let result = BatchRunner::builder()
//!     .provider(provider)
//!     .build()?
//!     .process(rows)?;
//! ```

// Provider trait is always available (for stubs and custom backends)
mod provider;
pub use provider::AIProvider;

// The concrete provider requires the "ai" feature
#[cfg(feature = "ai")]
mod gemini;

#[cfg(feature = "ai")]
pub use gemini::{GeminiConfig, GeminiConfigBuilder, GeminiProvider};
