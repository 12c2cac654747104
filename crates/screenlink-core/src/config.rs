use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::{DEFAULT_PROVIDER_DPI, MAX_SCREEN_SIZE};

/// Capture service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upper bound for one provider `bind()` wait.
    #[serde(alias = "bindTimeoutMs")]
    pub bind_timeout_ms: u64,
    /// Consecutive bind timeouts tolerated before a provider-backed start fails.
    #[serde(alias = "bindAttempts")]
    pub bind_attempts: u32,
    #[serde(alias = "maxScreenSize")]
    pub max_screen_size: u32,
    /// Initial half-scale policy.
    #[serde(alias = "halfScale")]
    pub half_scale: bool,
    /// Keep the virtual display across restarts (detach instead of release).
    #[serde(alias = "reuseVirtualDisplay")]
    pub reuse_virtual_display: bool,
    #[serde(alias = "providerFallbackDpi")]
    pub provider_fallback_dpi: u32,
    #[serde(alias = "virtualDisplayName")]
    pub virtual_display_name: String,
    #[serde(alias = "statusIntervalMs")]
    pub status_interval_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_timeout_ms: 600,
            bind_attempts: 3,
            max_screen_size: MAX_SCREEN_SIZE,
            half_scale: false,
            reuse_virtual_display: true,
            provider_fallback_dpi: DEFAULT_PROVIDER_DPI,
            virtual_display_name: "ScreenLinkVD".to_owned(),
            status_interval_ms: 1000,
        }
    }
}

impl ServiceConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_timeout_ms == 0 {
            return Err(ConfigError::Invalid { reason: "bind_timeout_ms must be > 0".into() });
        }
        if self.bind_attempts == 0 {
            return Err(ConfigError::Invalid { reason: "bind_attempts must be > 0".into() });
        }
        if self.status_interval_ms == 0 {
            return Err(ConfigError::Invalid { reason: "status_interval_ms must be > 0".into() });
        }
        Ok(())
    }

    pub fn bind_timeout(&self) -> Duration {
        Duration::from_millis(self.bind_timeout_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}
