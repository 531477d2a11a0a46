//! Virus scan gate.
//!
//! The pipeline only knows the [`VirusScanner`] contract. Any `Err` from a
//! scanner aborts the whole batch.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Why a scan did not come back clean.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    /// The scanner reported the content as infected (or could not clear it).
    #[error("virus found in uploaded file '{filename}' (status {status})")]
    Infected { filename: String, status: String },

    /// The scanner could not be reached or answered with an HTTP error.
    #[error("virus scanner unavailable: {0}")]
    Unavailable(String),

    /// The scanner answered with something other than one result.
    #[error("unexpected virus scanner response: {0}")]
    UnexpectedResponse(String),
}

/// Scans one file. Implementations must be safe to call concurrently.
#[async_trait]
pub trait VirusScanner: Send + Sync {
    /// `Ok(())` only when the content is known to be clean.
    async fn scan(&self, filename: &str, size: u64, data: &[u8]) -> Result<(), ScanFailure>;
}

// ── Disabled scanning ─────────────────────────────────────────────────────────

/// Scanner for environments without a scan service. Lets everything through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScanner;

#[async_trait]
impl VirusScanner for NoopScanner {
    async fn scan(&self, _filename: &str, size: u64, _data: &[u8]) -> Result<(), ScanFailure> {
        tracing::warn!(size, "Virus scanning is not enabled");
        Ok(())
    }
}

// ── HTTP scan service ─────────────────────────────────────────────────────────

/// Settings for [`HttpVirusScanner`].
#[derive(Debug, Clone)]
pub struct HttpScannerConfig {
    /// Endpoint that accepts the raw bytes with `PUT`.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Extra attempts after a transport error or a 5xx answer.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each following one.
    pub retry_backoff: Duration,
    /// Non-production only: filenames starting with this prefix are reported
    /// as infected without calling the service.
    pub test_trigger_prefix: Option<String>,
}

impl HttpScannerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(200),
            test_trigger_prefix: None,
        }
    }

    /// Enable the `virustest` trigger used in test environments.
    pub fn with_test_trigger(mut self) -> Self {
        self.test_trigger_prefix = Some("virustest".to_string());
        self
    }
}

#[derive(Debug, Deserialize)]
struct ScanResult {
    #[serde(rename = "Filename", default)]
    filename: Option<String>,
    #[serde(rename = "Result")]
    result: ScanStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
enum ScanStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FOUND")]
    Found,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(other)]
    Other,
}

impl ScanStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Found => "FOUND",
            Self::Error => "ERROR",
            Self::Other => "UNKNOWN",
        }
    }
}

/// Client for a ClamAV-REST style service: `PUT` the bytes, receive
/// `[{"Filename": "...", "Result": "OK" | "FOUND" | "ERROR"}]`.
#[derive(Clone)]
pub struct HttpVirusScanner {
    client: reqwest::Client,
    config: HttpScannerConfig,
}

impl HttpVirusScanner {
    pub fn new(config: HttpScannerConfig) -> Result<Self, ScanFailure> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScanFailure::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn put_with_retry(&self, data: &[u8]) -> Result<Vec<ScanResult>, ScanFailure> {
        let mut attempt = 0;
        loop {
            match self.put_once(data).await {
                Ok(results) => return Ok(results),
                Err(Attempt::Retryable(reason)) if attempt < self.config.max_retries => {
                    let delay = self.config.retry_backoff * 2u32.saturating_pow(attempt);
                    tracing::debug!(attempt, ?delay, %reason, "Retrying virus scan");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Attempt::Retryable(reason)) => return Err(ScanFailure::Unavailable(reason)),
                Err(Attempt::Fatal(failure)) => return Err(failure),
            }
        }
    }

    async fn put_once(&self, data: &[u8]) -> Result<Vec<ScanResult>, Attempt> {
        let response = self
            .client
            .put(&self.config.url)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| Attempt::Retryable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Attempt::Retryable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(ScanFailure::Unavailable(format!("HTTP {status}"))));
        }

        response
            .json::<Vec<ScanResult>>()
            .await
            .map_err(|e| Attempt::Fatal(ScanFailure::UnexpectedResponse(e.to_string())))
    }
}

enum Attempt {
    Retryable(String),
    Fatal(ScanFailure),
}

#[async_trait]
impl VirusScanner for HttpVirusScanner {
    #[tracing::instrument(skip(self, data), fields(url = %self.config.url))]
    async fn scan(&self, filename: &str, size: u64, data: &[u8]) -> Result<(), ScanFailure> {
        if let Some(prefix) = &self.config.test_trigger_prefix {
            if filename.starts_with(prefix.as_str()) {
                tracing::warn!("Test trigger prefix matched, reporting file as infected");
                return Err(ScanFailure::Infected {
                    filename: filename.to_string(),
                    status: "TEST_TRIGGER".to_string(),
                });
            }
        }

        tracing::info!("Scanning {size} bytes for virus");
        let results = self.put_with_retry(data).await?;

        let [result] = results.as_slice() else {
            tracing::warn!(len = results.len(), "Virus scan returned unexpected number of results, expected 1");
            return Err(ScanFailure::UnexpectedResponse(format!(
                "expected 1 result, got {}",
                results.len()
            )));
        };

        tracing::debug!(scanned = ?result.filename, status = result.result.as_str(), "Got scan result");
        if result.result == ScanStatus::Ok {
            tracing::info!("No virus in file ({size} bytes)");
            return Ok(());
        }

        tracing::warn!(status = result.result.as_str(), "Virus found in uploaded file");
        Err(ScanFailure::Infected {
            filename: filename.to_string(),
            status: result.result.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `responses` in order, one per connection, and return the URL.
    async fn serve(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                let reply = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        format!("http://{addr}/scan")
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }

    fn scanner(url: String) -> HttpVirusScanner {
        let mut config = HttpScannerConfig::new(url);
        config.retry_backoff = Duration::from_millis(1);
        HttpVirusScanner::new(config).unwrap()
    }

    #[tokio::test]
    async fn clean_result_passes() {
        let url = serve(vec![(200, r#"[{"Filename":"a.pdf","Result":"OK"}]"#)]).await;
        assert_eq!(scanner(url).scan("a.pdf", 3, b"abc").await, Ok(()));
    }

    #[tokio::test]
    async fn found_result_is_infected() {
        let url = serve(vec![(200, r#"[{"Filename":"a.pdf","Result":"FOUND"}]"#)]).await;
        let err = scanner(url).scan("a.pdf", 3, b"abc").await.unwrap_err();
        assert_eq!(
            err,
            ScanFailure::Infected { filename: "a.pdf".into(), status: "FOUND".into() }
        );
    }

    #[tokio::test]
    async fn wrong_result_count_is_unexpected() {
        let url = serve(vec![(200, "[]")]).await;
        let err = scanner(url).scan("a.pdf", 3, b"abc").await.unwrap_err();
        assert!(matches!(err, ScanFailure::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let url = serve(vec![
            (503, "{}"),
            (200, r#"[{"Filename":"a.pdf","Result":"OK"}]"#),
        ])
        .await;
        assert_eq!(scanner(url).scan("a.pdf", 3, b"abc").await, Ok(()));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let url = serve(vec![(400, "{}")]).await;
        let err = scanner(url).scan("a.pdf", 3, b"abc").await.unwrap_err();
        assert!(matches!(err, ScanFailure::Unavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = HttpScannerConfig::new(format!("http://{addr}/scan"));
        config.max_retries = 1;
        config.retry_backoff = Duration::from_millis(1);
        let err = HttpVirusScanner::new(config)
            .unwrap()
            .scan("a.pdf", 3, b"abc")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanFailure::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_trigger_short_circuits() {
        let config = HttpScannerConfig::new("http://127.0.0.1:9/unused").with_test_trigger();
        let err = HttpVirusScanner::new(config)
            .unwrap()
            .scan("virustest.pdf", 3, b"abc")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanFailure::Infected { .. }));
    }

    #[tokio::test]
    async fn noop_scanner_lets_everything_through() {
        assert_eq!(NoopScanner.scan("virustest.pdf", 3, b"abc").await, Ok(()));
    }
}
