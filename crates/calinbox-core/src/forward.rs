//! Hand-off of normalized events to the task store.

use crate::error::Result;
use calinbox_ical::NormalizedEvent;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Path of the ingestion endpoint, relative to the task store base URL.
pub const INGEST_PATH: &str = "inbox/calendar";

/// Default bound on one forwarding call.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a forwarding call failed.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// No response within the configured timeout.
    #[error("Task store timed out")]
    Timeout,

    /// The task store could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The task store answered with a non-success status.
    #[error("Task store returned HTTP {0}")]
    Status(u16),

    /// The request could not be built or sent.
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for ForwardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Client(e.to_string())
        }
    }
}

/// Delivers one event to the task store.
///
/// A single attempt; the caller turns a failure into a temporary SMTP
/// rejection so the sending server retries.
pub trait Forward: Send + Sync + 'static {
    /// Forwards `event`.
    fn forward(
        &self,
        event: &NormalizedEvent,
    ) -> impl Future<Output = std::result::Result<(), ForwardError>> + Send;
}

/// Forwards events as JSON with `POST <base>/inbox/calendar`.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client,
    endpoint: Url,
}

impl HttpForwarder {
    /// Creates a forwarder for the task store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL or the HTTP client cannot be
    /// built.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("calinbox/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, endpoint })
    }

    /// Returns the ingestion endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Forward for HttpForwarder {
    async fn forward(&self, event: &NormalizedEvent) -> std::result::Result<(), ForwardError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status.as_u16()));
        }

        tracing::debug!(uid = %event.uid, status = status.as_u16(), "event forwarded");
        Ok(())
    }
}

/// Appends [`INGEST_PATH`] to the base URL, with or without a trailing slash.
fn endpoint(base_url: &Url) -> Result<Url> {
    let base = base_url.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/{INGEST_PATH}"))?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use calinbox_ical::DEFAULT_SUMMARY;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn event() -> NormalizedEvent {
        NormalizedEvent {
            uid: "u1".to_string(),
            summary: DEFAULT_SUMMARY.to_string(),
            description: None,
            start: None,
            end: None,
            attendees: Some("a@x.com, b@x.com".to_string()),
        }
    }

    #[test]
    fn test_endpoint_joins_path() {
        let with_slash = Url::parse("http://backend:5000/api/").unwrap();
        let without_slash = Url::parse("http://backend:5000/api").unwrap();
        assert_eq!(
            endpoint(&with_slash).unwrap().as_str(),
            "http://backend:5000/api/inbox/calendar"
        );
        assert_eq!(endpoint(&with_slash).unwrap(), endpoint(&without_slash).unwrap());
    }

    #[tokio::test]
    async fn test_forward_posts_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/inbox/calendar")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "uid": "u1",
                "summary": "Calendar event",
                "description": null,
                "start": null,
                "end": null,
                "attendees": "a@x.com, b@x.com",
            })))
            .with_status(201)
            .create_async()
            .await;

        let base = Url::parse(&format!("{}/api", server.url())).unwrap();
        let forwarder = HttpForwarder::new(&base, DEFAULT_FORWARD_TIMEOUT).unwrap();
        forwarder.forward(&event()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_non_success_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/inbox/calendar")
            .with_status(500)
            .create_async()
            .await;

        let base = Url::parse(&server.url()).unwrap();
        let forwarder = HttpForwarder::new(&base, DEFAULT_FORWARD_TIMEOUT).unwrap();
        let err = forwarder.forward(&event()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Status(500)));
    }

    #[tokio::test]
    async fn test_forward_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer.
        let silent = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let forwarder = HttpForwarder::new(&base, Duration::from_millis(200)).unwrap();
        let err = forwarder.forward(&event()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Timeout));

        silent.abort();
    }

    #[tokio::test]
    async fn test_forward_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let forwarder = HttpForwarder::new(&base, DEFAULT_FORWARD_TIMEOUT).unwrap();
        let err = forwarder.forward(&event()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Connection(_)));
    }
}
