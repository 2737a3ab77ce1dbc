//! Command line and environment settings.

use anyhow::Context;
use calinbox_core::{Config, DEFAULT_BACKEND_URL};
use calinbox_smtp::ServerConfig;
use calinbox_smtp::connection::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};
use clap::Parser;
use std::time::Duration;
use url::Url;

/// Receives calendar invitations over SMTP and forwards their first event
/// to the task store.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Address the SMTP listener binds to.
    #[arg(long, env = "SMTP_HOST", default_value = "0.0.0.0")]
    pub smtp_host: String,

    /// Port the SMTP listener binds to.
    #[arg(long, env = "SMTP_PORT", default_value_t = DEFAULT_PORT)]
    pub smtp_port: u16,

    /// Pattern a recipient must fully match, ignoring case. Unset accepts all.
    #[arg(long, env = "INGEST_RECIPIENT")]
    pub ingest_recipient: Option<String>,

    /// Task store base URL; events are posted to `<url>/inbox/calendar`.
    #[arg(long, env = "BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Seconds to wait for the task store.
    #[arg(long, default_value_t = 5)]
    pub forward_timeout_secs: u64,

    /// Name announced in the SMTP greeting.
    #[arg(long, value_name = "NAME")]
    pub hostname: Option<String>,

    /// Largest accepted message, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,
}

impl Args {
    /// Resolves the arguments into a validated [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL, the recipient pattern or a limit
    /// is invalid.
    pub fn into_config(self) -> anyhow::Result<Config> {
        let backend_url = Url::parse(&self.backend_url)
            .with_context(|| format!("invalid backend URL {:?}", self.backend_url))?;

        let mut server = ServerConfig::builder()
            .host(self.smtp_host)
            .port(self.smtp_port)
            .max_message_size(self.max_message_size);
        if let Some(hostname) = self.hostname {
            server = server.hostname(hostname);
        }
        let server = server.build();

        let config = Config::new(server, backend_url)
            .with_recipient_pattern(self.ingest_recipient)
            .with_forward_timeout(Duration::from_secs(self.forward_timeout_secs));
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_arguments() {
        let args = Args::try_parse_from([
            "calinbox",
            "--smtp-host",
            "127.0.0.1",
            "--smtp-port",
            "2525",
            "--ingest-recipient",
            "invites@.*",
            "--backend-url",
            "http://localhost:5000/api/",
            "--forward-timeout-secs",
            "2",
            "--hostname",
            "mx.tasks.example",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 2525);
        assert_eq!(config.server.hostname, "mx.tasks.example");
        assert_eq!(config.recipient_pattern.as_deref(), Some("invites@.*"));
        assert_eq!(config.backend_url.as_str(), "http://localhost:5000/api/");
        assert_eq!(config.forward_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let args = Args::try_parse_from(["calinbox", "--ingest-recipient", "invites@("]).unwrap();
        assert!(args.into_config().is_err());
    }

    #[test]
    fn test_invalid_backend_url_is_rejected() {
        let args = Args::try_parse_from(["calinbox", "--backend-url", "not a url"]).unwrap();
        assert!(args.into_config().is_err());
    }

    #[test]
    fn test_command_is_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
