//! Configuration for the HTTP JSON input.

use std::collections::BTreeMap;
use std::time::Duration;

use execd_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig};
use serde::{Deserialize, Serialize};

/// Complete input configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpInputConfig {
    /// HTTP polling settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// URLs fetched on every trigger. With more than one URL each must return
    /// a JSON object; the objects are merged, later URLs winning on
    /// duplicate keys.
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,

    /// Measurement name of the emitted point.
    #[serde(default = "default_measurement")]
    pub measurement: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Tags added to the point.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            measurement: default_measurement(),
            timeout_secs: default_timeout(),
            tags: BTreeMap::new(),
        }
    }
}

fn default_urls() -> Vec<String> {
    vec!["http://azrouter.local/api/v1/status".to_string()]
}

fn default_measurement() -> String {
    "azrouter".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BridgeConfig for HttpInputConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> execd_bridge_framework::Result<()> {
        if self.http.urls.is_empty() {
            return Err(BridgeError::config_validation("At least one URL is required"));
        }
        for url in &self.http.urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(BridgeError::config_validation(format!(
                    "URL '{}' must start with http:// or https://",
                    url
                )));
            }
        }
        if self.http.measurement.is_empty() {
            return Err(BridgeError::config_validation("measurement must not be empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(BridgeError::config_validation("timeout_secs must be positive"));
        }
        Ok(())
    }
}
