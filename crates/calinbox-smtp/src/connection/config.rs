//! Server configuration types.

use std::time::Duration;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8025;

/// Default maximum message size (25 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 25 * 1024 * 1024;

/// SMTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind (IP or hostname).
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Name announced in the greeting and EHLO reply.
    pub hostname: String,
    /// Maximum accepted message size in bytes, advertised with SIZE.
    pub max_message_size: usize,
    /// Maximum command line length, excluding CRLF.
    pub max_line_length: usize,
    /// Maximum recipients per transaction.
    pub max_recipients: usize,
    /// Time to wait for the next command or data chunk.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            hostname: "localhost".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_line_length: 4096,
            max_recipients: 100,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration binding `host:port` with default limits.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

/// Builder for server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the bind port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the announced hostname.
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.hostname = hostname.into();
        self
    }

    /// Sets the maximum message size.
    #[must_use]
    pub const fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Sets the maximum command line length.
    #[must_use]
    pub const fn max_line_length(mut self, length: usize) -> Self {
        self.config.max_line_length = length;
        self
    }

    /// Sets the maximum recipients per transaction.
    #[must_use]
    pub const fn max_recipients(mut self, count: usize) -> Self {
        self.config.max_recipients = count;
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8025);
        assert_eq!(config.max_message_size, 26_214_400);
        assert_eq!(config.max_line_length, 4096);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_config_new() {
        let config = ServerConfig::new("127.0.0.1", 2525);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 2525);
        assert_eq!(config.max_recipients, 100);
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::builder()
            .host("::1")
            .port(0)
            .hostname("mx.tasks.example")
            .max_message_size(1024)
            .max_line_length(512)
            .max_recipients(5)
            .idle_timeout(Duration::from_secs(10))
            .build();

        assert_eq!(config.host, "::1");
        assert_eq!(config.port, 0);
        assert_eq!(config.hostname, "mx.tasks.example");
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.max_line_length, 512);
        assert_eq!(config.max_recipients, 5);
        assert_eq!(config.idle_timeout, Duration::from_secs(10));
    }
}
