//! Server configuration (strict YAML).
//!
//! ```yaml
//! listen: "0.0.0.0:5050"
//! discovery_port: 5051
//! question_window_ms: 10000
//! report:
//!   base_url: "http://records:8000"
//!   report_key: "change-me"
//! ```
//!
//! Every field has a default, so an empty file is a valid config. Unknown
//! keys are rejected, so typos fail at startup instead of being ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use quizhub_report::ReportConfig;
use quizhub_room::RoomConfig;
use serde::Deserialize;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "QUIZHUB_CONFIG";

/// Config file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "quizhub.yaml";

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// TCP address the line protocol listens on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// UDP port for discovery. `null` disables the responder.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: Option<u16>,

    #[serde(default = "default_question_window_ms")]
    pub question_window_ms: u64,

    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,

    /// How long sessions get to finish after shutdown is signalled.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Where to send match reports. Absent means reports are dropped.
    #[serde(default)]
    pub report: Option<ReportSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportSection {
    pub base_url: String,
    pub report_key: String,

    #[serde(default = "default_report_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_report_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_report_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_listen() -> String {
    "0.0.0.0:5050".into()
}
fn default_discovery_port() -> Option<u16> {
    Some(5051)
}
fn default_question_window_ms() -> u64 {
    10_000
}
fn default_max_code_attempts() -> u32 {
    32
}
fn default_shutdown_grace_ms() -> u64 {
    5_000
}
fn default_report_attempts() -> u32 {
    3
}
fn default_report_base_delay_ms() -> u64 {
    2_000
}
fn default_report_timeout_ms() -> u64 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            discovery_port: default_discovery_port(),
            question_window_ms: default_question_window_ms(),
            max_code_attempts: default_max_code_attempts(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            report: None,
        }
    }
}

impl ServerConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as `null`, not as an empty map.
        let cfg: ServerConfig = if s.trim().is_empty() {
            ServerConfig::default()
        } else {
            serde_yaml::from_str(s)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads `path`, falling back to defaults if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(s) => Self::from_yaml_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Loads the file named by `QUIZHUB_CONFIG`, or `quizhub.yaml`.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(path)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Invalid("listen must not be empty".into()));
        }
        if !(100..=600_000).contains(&self.question_window_ms) {
            return Err(ConfigError::Invalid(
                "question_window_ms must be between 100 and 600000".into(),
            ));
        }
        if self.max_code_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_code_attempts must be at least 1".into(),
            ));
        }
        if let Some(report) = &self.report {
            if !report.base_url.starts_with("http://") && !report.base_url.starts_with("https://") {
                return Err(ConfigError::Invalid(
                    "report.base_url must be an http(s) URL".into(),
                ));
            }
            if report.max_attempts == 0 {
                return Err(ConfigError::Invalid(
                    "report.max_attempts must be at least 1".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            question_window: Duration::from_millis(self.question_window_ms),
            max_code_attempts: self.max_code_attempts,
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Reporter settings, if a report endpoint is configured.
    pub fn report_config(&self) -> Option<ReportConfig> {
        self.report.as_ref().map(|r| {
            let mut cfg = ReportConfig::new(&r.base_url, &r.report_key);
            cfg.max_attempts = r.max_attempts;
            cfg.base_delay = Duration::from_millis(r.base_delay_ms);
            cfg.request_timeout = Duration::from_millis(r.request_timeout_ms);
            cfg
        })
    }
}
