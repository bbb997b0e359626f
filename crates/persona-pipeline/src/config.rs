//! Configuration types for the enrichment pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default outbound call budget: 20 requests per minute (one call every
/// three seconds), a safe floor for free-tier provider quotas.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 20;

/// Default model identifier passed through to the provider.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Configuration for the enrichment pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use persona_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .requests_per_minute(30)
///     .model_identifier("gemini-2.5-flash")
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum outbound provider calls per minute. The pipeline spaces
    /// consecutive calls at least `60 / requests_per_minute` seconds apart.
    /// Default: 20
    pub requests_per_minute: u32,

    /// Which provider model to call. Passed through verbatim; the pipeline
    /// core never validates or interprets it.
    /// Default: "gemini-2.5-pro"
    pub model_identifier: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            model_identifier: DEFAULT_MODEL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.requests_per_minute == 0 {
            return Err(ConfigValidationError::InvalidRequestsPerMinute(
                self.requests_per_minute,
            ));
        }

        Ok(())
    }

    /// Minimum spacing between consecutive outbound calls.
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.requests_per_minute.max(1)))
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid requests_per_minute: {0} (must be at least 1)")]
    InvalidRequestsPerMinute(u32),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    requests_per_minute: Option<u32>,
    model_identifier: Option<String>,
}

impl PipelineConfigBuilder {
    /// Set the outbound call budget in requests per minute.
    ///
    /// The rate limiter derives its minimum inter-call spacing from this
    /// value: `min_interval = 60 / requests_per_minute` seconds.
    pub fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = Some(rpm);
        self
    }

    /// Set the model identifier handed to the provider verbatim.
    pub fn model_identifier(mut self, model: impl Into<String>) -> Self {
        self.model_identifier = Some(model.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            requests_per_minute: self
                .requests_per_minute
                .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE),
            model_identifier: self
                .model_identifier
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.requests_per_minute, 20);
        assert_eq!(config.model_identifier, "gemini-2.5-pro");
    }

    #[test]
    fn test_builder_defaults() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.requests_per_minute, DEFAULT_REQUESTS_PER_MINUTE);
        assert_eq!(config.model_identifier, DEFAULT_MODEL);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .requests_per_minute(60)
            .model_identifier("gemini-2.5-flash")
            .build()
            .unwrap();

        assert_eq!(config.requests_per_minute, 60);
        assert_eq!(config.model_identifier, "gemini-2.5-flash");
    }

    #[test]
    fn test_validation_zero_rpm() {
        let result = PipelineConfig::builder().requests_per_minute(0).build();

        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidRequestsPerMinute(0)
        ));
    }

    #[test]
    fn test_min_interval_from_rpm() {
        let config = PipelineConfig::builder()
            .requests_per_minute(20)
            .build()
            .unwrap();
        assert_eq!(config.min_interval(), Duration::from_secs(3));

        let config = PipelineConfig::builder()
            .requests_per_minute(60)
            .build()
            .unwrap();
        assert_eq!(config.min_interval(), Duration::from_secs(1));

        let config = PipelineConfig::builder()
            .requests_per_minute(120)
            .build()
            .unwrap();
        assert_eq!(config.min_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PipelineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_pipeline_config_from_json() {
        // Simulate JSON that might come from an embedding application
        let json = r#"{
            "requests_per_minute": 45,
            "model_identifier": "gemini-2.5-flash"
        }"#;

        let config: PipelineConfig =
            serde_json::from_str(json).expect("Should deserialize from caller JSON");

        assert_eq!(config.requests_per_minute, 45);
        assert_eq!(config.model_identifier, "gemini-2.5-flash");
    }

    #[test]
    fn test_pipeline_config_from_partial_json() {
        // Missing fields fall back to defaults
        let config: PipelineConfig =
            serde_json::from_str("{}").expect("Should deserialize empty object");

        assert_eq!(config.requests_per_minute, DEFAULT_REQUESTS_PER_MINUTE);
        assert_eq!(config.model_identifier, DEFAULT_MODEL);
    }
}
