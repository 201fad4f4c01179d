use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::Stroke;

/// How the drain loop should treat a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Retrying the same batch can never succeed; discard it.
    Permanent,
    /// The server was unreachable or unhealthy; retry later.
    Transient,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Rejected by server: {0}")]
    Permanent(String),
    #[error("Temporary failure: {0}")]
    Transient(String),
}

impl SubmitError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SubmitError::Permanent(_) => FailureKind::Permanent,
            SubmitError::Transient(_) => FailureKind::Transient,
        }
    }
}

/// Remote append operation the drain loop submits batches through.
#[async_trait]
pub trait StrokeApi: Send + Sync {
    /// Append `strokes` to `page_id` and return the page's new stroke count.
    async fn append_strokes(&self, page_id: &str, strokes: &[Stroke]) -> Result<usize, SubmitError>;
}

#[derive(Serialize)]
struct AppendRequest<'a> {
    strokes: &'a [Stroke],
}

#[derive(Deserialize)]
struct AppendResponse {
    count: usize,
}

/// Map a response status onto the sync engine's failure taxonomy.
/// `None` means success.
pub fn classify_status(status: StatusCode) -> Option<FailureKind> {
    if status.is_success() {
        None
    } else if status.is_client_error() {
        Some(FailureKind::Permanent)
    } else {
        Some(FailureKind::Transient)
    }
}

/// HTTP client for the inksync server API
pub struct HttpStrokeClient {
    client: Client,
    base_url: String,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpStrokeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        // Normalize URL - ensure no trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::InvalidUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Reachability check. Any HTTP response counts as reachable; only a
    /// connection-level failure reports `false`.
    pub async fn ping(&self) -> bool {
        match self.client.get(self.url("api/health")).send().await {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Health probe to {} failed: {}", self.base_url, e);
                false
            }
        }
    }
}

#[async_trait]
impl StrokeApi for HttpStrokeClient {
    async fn append_strokes(&self, page_id: &str, strokes: &[Stroke]) -> Result<usize, SubmitError> {
        let url = self.url(&format!("api/pages/{}/strokes", page_id));

        let response = self
            .client
            .post(&url)
            .json(&AppendRequest { strokes })
            .send()
            .await
            .map_err(|e| SubmitError::Transient(e.to_string()))?;

        let status = response.status();
        match classify_status(status) {
            None => {}
            Some(kind) => {
                let body = response.text().await.unwrap_or_default();
                let message = format!("{} {}", status.as_u16(), body.trim());
                return Err(match kind {
                    FailureKind::Permanent => SubmitError::Permanent(message),
                    FailureKind::Transient => SubmitError::Transient(message),
                });
            }
        }

        // A 2xx whose body we cannot read leaves the outcome unknown; the
        // server dedupes by stroke id so retrying is safe.
        let body: AppendResponse = response
            .json()
            .await
            .map_err(|e| SubmitError::Transient(format!("unreadable response: {}", e)))?;
        Ok(body.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(classify_status(StatusCode::CREATED), None);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), Some(FailureKind::Permanent));
        assert_eq!(classify_status(StatusCode::NOT_FOUND), Some(FailureKind::Permanent));
        assert_eq!(classify_status(StatusCode::CONFLICT), Some(FailureKind::Permanent));
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(FailureKind::Transient)
        );
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Some(FailureKind::Transient)
        );
    }

    #[test]
    fn test_submit_error_kind() {
        assert_eq!(SubmitError::Permanent("x".into()).kind(), FailureKind::Permanent);
        assert_eq!(SubmitError::Transient("x".into()).kind(), FailureKind::Transient);
    }

    #[test]
    fn test_new_validates_url() {
        let timeout = Duration::from_secs(5);
        assert!(matches!(
            HttpStrokeClient::new("ftp://example.com", timeout),
            Err(ClientError::InvalidUrl(_))
        ));

        let client = HttpStrokeClient::new("http://127.0.0.1:7878/", timeout).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:7878");
        assert_eq!(
            client.url("/api/pages/pg_1/strokes"),
            "http://127.0.0.1:7878/api/pages/pg_1/strokes"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Grab a free port and release it so the connection is refused.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}", port);
        let client = HttpStrokeClient::new(&url, Duration::from_secs(2)).unwrap();
        let err = client.append_strokes("pg_1", &[]).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transient);
        assert!(!client.ping().await);
    }
}
