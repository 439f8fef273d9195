//! HTTP delivery of match reports with retry.

use std::time::Duration;

use async_trait::async_trait;

use crate::{MatchReport, MatchReporter, ReportError};

/// Path appended to the configured base URL.
pub const REPORT_PATH: &str = "/internal/matches/report";

/// Header carrying the shared secret.
pub const REPORT_KEY_HEADER: &str = "X-Internal-Key";

/// Settings for [`HttpMatchReporter`].
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Base URL of the record-keeping service, e.g. `http://api:8000`.
    pub base_url: String,
    /// Shared secret sent in [`REPORT_KEY_HEADER`].
    pub report_key: String,
    /// Attempts before the report is dropped. Default: 3.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each one. Default: 2 s.
    pub base_delay: Duration,
    /// Per-request timeout. Default: 10 s.
    pub request_timeout: Duration,
}

impl ReportConfig {
    /// Defaults for everything except where to send and the secret.
    pub fn new(base_url: impl Into<String>, report_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            report_key: report_key.into(),
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// The full report URL.
    pub fn endpoint(&self) -> String {
        format!("{}{REPORT_PATH}", self.base_url.trim_end_matches('/'))
    }
}

/// Sends reports as JSON over HTTP.
pub struct HttpMatchReporter {
    client: reqwest::Client,
    config: ReportConfig,
    endpoint: String,
}

impl HttpMatchReporter {
    pub fn new(config: ReportConfig) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ReportError::Client)?;
        let endpoint = config.endpoint();
        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// One POST. Anything but a 2xx response is an error.
    pub async fn send_once(&self, report: &MatchReport) -> Result<(), ReportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(REPORT_KEY_HEADER, &self.config.report_key)
            .json(report)
            .send()
            .await
            .map_err(ReportError::Transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ReportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MatchReporter for HttpMatchReporter {
    async fn report(&self, report: MatchReport) {
        let attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.base_delay;

        for attempt in 1..=attempts {
            match self.send_once(&report).await {
                Ok(()) => {
                    tracing::info!(room = %report.room_code, attempt, "match report delivered");
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        room = %report.room_code,
                        attempt,
                        error = %e,
                        "match report attempt failed"
                    );
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }

        tracing::error!(
            room = %report.room_code,
            attempts,
            "match report permanently failed, dropping"
        );
    }
}
