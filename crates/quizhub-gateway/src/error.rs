//! Gateway error type.

use std::path::PathBuf;

use quizhub_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("read config {path:?} failed: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The upstream quiz server could not be reached or failed mid-stream.
    #[error(transparent)]
    Upstream(#[from] TransportError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
