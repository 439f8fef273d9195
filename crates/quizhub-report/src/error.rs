//! Error types for match reporting.

/// Why a single report attempt failed.
///
/// These never escape [`MatchReporter::report`](crate::MatchReporter::report);
/// they are logged per attempt and the report is retried.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never got a response (connect, timeout, body).
    #[error("report request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("report endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}
