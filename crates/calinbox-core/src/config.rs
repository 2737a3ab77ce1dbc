//! Process configuration.

use crate::error::{Error, Result};
use crate::filter::RecipientFilter;
use crate::forward::{DEFAULT_FORWARD_TIMEOUT, HttpForwarder};
use crate::ingest::Ingest;
use calinbox_smtp::ServerConfig;
use std::time::Duration;
use url::Url;

/// Task store base URL used when none is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://backend:5000/api";

/// Everything the service needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// SMTP listener settings.
    pub server: ServerConfig,
    /// Acceptance pattern for recipient addresses; `None` accepts all.
    pub recipient_pattern: Option<String>,
    /// Task store base URL.
    pub backend_url: Url,
    /// Bound on each forwarding call.
    pub forward_timeout: Duration,
}

impl Config {
    /// Creates a configuration accepting every recipient.
    #[must_use]
    pub const fn new(server: ServerConfig, backend_url: Url) -> Self {
        Self {
            server,
            recipient_pattern: None,
            backend_url,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
        }
    }

    /// Sets the recipient pattern. An empty pattern accepts all.
    #[must_use]
    pub fn with_recipient_pattern(mut self, pattern: Option<String>) -> Self {
        self.recipient_pattern = pattern.filter(|p| !p.trim().is_empty());
        self
    }

    /// Sets the forwarding timeout.
    #[must_use]
    pub const fn with_forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = timeout;
        self
    }

    /// Checks the settings that would otherwise only fail at first use.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid recipient pattern, a non-HTTP backend
    /// URL or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        RecipientFilter::new(self.recipient_pattern.as_deref())?;

        if !matches!(self.backend_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "backend URL must be http or https, got {}",
                self.backend_url
            )));
        }
        if self.forward_timeout.is_zero() {
            return Err(Error::Config("forward timeout must be positive".to_string()));
        }
        if self.server.max_message_size == 0 {
            return Err(Error::Config("max message size must be positive".to_string()));
        }

        Ok(())
    }

    /// Builds the ingestion pipeline forwarding over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn ingest(&self) -> Result<Ingest<HttpForwarder>> {
        self.validate()?;
        let filter = RecipientFilter::new(self.recipient_pattern.as_deref())?;
        let forwarder = HttpForwarder::new(&self.backend_url, self.forward_timeout)?;
        Ok(Ingest::new(filter, forwarder))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new(ServerConfig::default(), Url::parse(DEFAULT_BACKEND_URL).unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert!(config.recipient_pattern.is_none());
        assert_eq!(config.forward_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_pattern_accepts_all() {
        let config = config().with_recipient_pattern(Some("  ".to_string()));
        assert!(config.recipient_pattern.is_none());
    }

    #[test]
    fn test_invalid_pattern() {
        let config = config().with_recipient_pattern(Some("invites@(".to_string()));
        assert!(matches!(config.validate(), Err(Error::Pattern(_))));
    }

    #[test]
    fn test_invalid_backend_scheme() {
        let mut config = config();
        config.backend_url = Url::parse("ftp://backend/api").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_timeout() {
        let config = config().with_forward_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ingest_endpoint() {
        let ingest = config().ingest().unwrap();
        assert_eq!(
            ingest.forwarder().endpoint().as_str(),
            "http://backend:5000/api/inbox/calendar"
        );
    }
}
