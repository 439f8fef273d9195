//! Gateway configuration (strict YAML).
//!
//! ```yaml
//! listen: "0.0.0.0:8080"
//! upstream: "127.0.0.1:5050"
//! ping_interval_ms: 15000
//! pong_timeout_ms: 30000
//! rate_window_ms: 5000
//! rate_max: 120
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::GatewayError;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "QUIZHUB_GATEWAY_CONFIG";

/// Config file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "gateway.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP address serving `/` (WebSocket) and `/health`.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// `host:port` of the quiz server's TCP listener.
    #[serde(default = "default_upstream")]
    pub upstream: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// A client silent this long after our last ping is dropped.
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,

    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,

    /// Messages allowed per window; one more closes the connection.
    #[serde(default = "default_rate_max")]
    pub rate_max: u32,
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_upstream() -> String {
    "127.0.0.1:5050".into()
}
fn default_ping_interval_ms() -> u64 {
    15_000
}
fn default_pong_timeout_ms() -> u64 {
    30_000
}
fn default_rate_window_ms() -> u64 {
    5_000
}
fn default_rate_max() -> u32 {
    120
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            upstream: default_upstream(),
            ping_interval_ms: default_ping_interval_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            rate_window_ms: default_rate_window_ms(),
            rate_max: default_rate_max(),
        }
    }
}

impl GatewayConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, GatewayError> {
        let cfg: GatewayConfig = if s.trim().is_empty() {
            GatewayConfig::default()
        } else {
            serde_yaml::from_str(s)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads `path`, falling back to defaults if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(s) => Self::from_yaml_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(GatewayError::ConfigRead {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Loads the file named by `QUIZHUB_GATEWAY_CONFIG`, or `gateway.yaml`.
    pub fn load_from_env() -> Result<Self, GatewayError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.upstream_parts().is_none() {
            return Err(GatewayError::InvalidConfig(
                "upstream must be host:port".into(),
            ));
        }
        if !(100..=120_000).contains(&self.ping_interval_ms) {
            return Err(GatewayError::InvalidConfig(
                "ping_interval_ms must be between 100 and 120000".into(),
            ));
        }
        if self.pong_timeout_ms <= self.ping_interval_ms {
            return Err(GatewayError::InvalidConfig(
                "pong_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if self.rate_window_ms == 0 || self.rate_max == 0 {
            return Err(GatewayError::InvalidConfig(
                "rate_window_ms and rate_max must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Splits `upstream` into host and port.
    pub fn upstream_parts(&self) -> Option<(&str, u16)> {
        let (host, port) = self.upstream.rsplit_once(':')?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return None;
        }
        Some((host, port.parse().ok()?))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }
}
