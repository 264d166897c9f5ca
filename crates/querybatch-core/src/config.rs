use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("batch config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("batch config invalid: {0}")]
    Invalid(String),
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Config, err.to_string())
    }
}

///
/// BatchConfig
///
/// Execution policy for one `QueryBatch`. Every field has a default so an
/// empty TOML document is a valid configuration.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Ask the session to flush the aggregated query spaces before execution.
    pub auto_flush: bool,

    /// Per-command timeout forwarded to the command provider.
    pub timeout_ms: Option<u64>,

    /// Reject any item whose non-empty caching information does not match its
    /// command count. When disabled, trailing commands without caching
    /// information are treated as always-miss.
    pub strict_caching_arity: bool,

    /// Skip cache writes when the key already holds an entry at least as fresh.
    pub minimal_puts: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            auto_flush: true,
            timeout_ms: None,
            strict_caching_arity: true,
            minimal_puts: false,
        }
    }
}

impl BatchConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "timeout_ms must be positive when set".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub const fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    #[must_use]
    pub const fn with_strict_caching_arity(mut self, strict: bool) -> Self {
        self.strict_caching_arity = strict;
        self
    }

    #[must_use]
    pub const fn with_minimal_puts(mut self, minimal_puts: bool) -> Self {
        self.minimal_puts = minimal_puts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = BatchConfig::from_toml_str("").expect("empty config should parse");

        assert_eq!(config, BatchConfig::default());
        assert!(config.auto_flush);
        assert!(config.strict_caching_arity);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn fields_override_defaults() {
        let config = BatchConfig::from_toml_str(
            r"
            auto_flush = false
            timeout_ms = 2500
            strict_caching_arity = false
            minimal_puts = true
            ",
        )
        .expect("config should parse");

        assert!(!config.auto_flush);
        assert_eq!(config.timeout(), Some(Duration::from_millis(2500)));
        assert!(!config.strict_caching_arity);
        assert!(config.minimal_puts);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = BatchConfig::from_toml_str("retries = 3").expect_err("unknown key");

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let err = BatchConfig::from_toml_str("timeout_ms = 0").expect_err("zero timeout");
        let internal = InternalError::from(err);

        assert_eq!(internal.origin, ErrorOrigin::Config);
    }
}
