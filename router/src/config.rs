use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Timeout cannot be 0: {0}")]
    ZeroTimeout(&'static str),
}

/// Per-attempt timeouts for the operations exposed by [`crate::client::Client`]
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Timeout for query operations, in milliseconds
    pub request_timeout_ms: u64,
    /// Timeout for uploads, in milliseconds
    pub upload_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            request_timeout_ms: 5_000,
            upload_timeout_ms: 30_000,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.request_timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout("request_timeout_ms"));
        }
        if self.upload_timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout("upload_timeout_ms"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.upload_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config: Config = serde_yaml::from_str("request_timeout_ms: 250").unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.upload_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config: Config = serde_yaml::from_str("upload_timeout_ms: 0").unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroTimeout("upload_timeout_ms"))
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_yaml::from_str::<Config>("request_timeout_ms: fast").is_err());
    }
}
