//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::LoggingConfig;
use crate::error::{BridgeError, Result};

/// Trait for input configuration types.
///
/// Implement this trait for your input's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use execd_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig};
///
/// #[derive(Debug, Default, Deserialize)]
/// pub struct MyInputConfig {
///     #[serde(default)]
///     pub logging: LoggingConfig,
///     pub device: DeviceConfig,
/// }
///
/// impl BridgeConfig for MyInputConfig {
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn validate(&self) -> Result<()> {
///         if self.device.measurement.is_empty() {
///             return Err(BridgeError::config_validation("measurement must not be empty"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file path, or use the defaults if the file
    /// does not exist.
    ///
    /// Inputs are often started by the collector with no arguments at all, so
    /// a missing default config file is not an error.
    fn load_or_default(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Default,
    {
        match Self::load(path.as_ref()) {
            Err(BridgeError::ConfigNotFound { path }) => {
                tracing::debug!(path = %path, "No configuration file, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default)]
        measurement: String,
    }

    impl BridgeConfig for TestConfig {
        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn validate(&self) -> Result<()> {
            if self.measurement.contains(' ') {
                return Err(BridgeError::config_validation("measurement must not contain spaces"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_missing_file_uses_default() {
        let config = TestConfig::load_or_default("/nonexistent/path.json5").unwrap();
        assert_eq!(config.logging.level, "warn");
        assert!(config.measurement.is_empty());
    }

    #[test]
    fn test_load_and_validate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ measurement: 'photovoltaic', logging: {{ level: 'debug' }} }}").unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.measurement, "photovoltaic");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ measurement: 'has space' }}").unwrap();

        let result = TestConfig::load_or_default(file.path());
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_parse_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ measurement: ").unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }
}
