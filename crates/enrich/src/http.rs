//! HTTP-backed analyzer.
//!
//! Posts the OCR text to an analysis endpoint and maps the response onto the
//! workflow's failure taxonomy: 4xx means the input itself was rejected
//! (permanent), 5xx and transport errors are transient, and the configured
//! timeout bounds every call.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use mailroom_core::Enrichment;

use crate::analyzer::{AnalysisError, MailAnalyzer};

#[derive(Debug, Clone)]
pub struct HttpAnalyzerConfig {
    pub endpoint: String,
    /// Bounded per-call timeout; expiry is a transient failure.
    pub timeout: Duration,
}

impl Default for HttpAnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9090/analyze".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct HttpAnalyzer {
    client: reqwest::blocking::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

impl HttpAnalyzer {
    pub fn new(config: HttpAnalyzerConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint,
        })
    }
}

impl MailAnalyzer for HttpAnalyzer {
    fn analyze(&self, text: &str) -> Result<Enrichment, AnalysisError> {
        debug!(endpoint = %self.endpoint, chars = text.len(), "calling analysis service");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&AnalyzeRequest { text })
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout
                } else {
                    AnalysisError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().unwrap_or_default();
            return Err(AnalysisError::Rejected(format!("{status}: {body}")));
        }
        if !status.is_success() {
            return Err(AnalysisError::Transport(format!(
                "unexpected status {status}"
            )));
        }

        response
            .json::<Enrichment>()
            // A response we cannot parse will not get better on retry.
            .map_err(|e| AnalysisError::Rejected(format!("malformed analysis response: {e}")))
    }
}
