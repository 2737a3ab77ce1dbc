//! # calinbox-core
//!
//! Calendar invite ingestion for the `calinbox` SMTP service.
//!
//! Each message accepted by the SMTP listener goes through four steps:
//! - **Recipient filter** - drop mail not addressed to the ingestion mailbox
//! - **Attachment lookup** - find the first `text/calendar` or `.ics` part
//! - **Calendar parsing** - normalize the first `VEVENT`
//! - **Forwarding** - `POST` the event to the task store
//!
//! The result of these steps is an [`Outcome`], which maps to the SMTP reply
//! returned at the end of `DATA`.
//!
//! ## Example
//!
//! ```no_run
//! use calinbox_core::Config;
//! use calinbox_smtp::{Server, ServerConfig};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new(ServerConfig::default(), Url::parse("http://backend:5000/api")?)
//!     .with_recipient_pattern(Some("invites@.*".to_string()));
//!
//! let server = Server::bind(config.server.clone(), config.ingest()?).await?;
//! let (_stop, shutdown) = tokio::sync::watch::channel(false);
//! server.run(shutdown).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod attachment;
pub mod config;
mod error;
pub mod filter;
pub mod forward;
pub mod ingest;

pub use attachment::find_calendar_part;
pub use config::{Config, DEFAULT_BACKEND_URL};
pub use error::{Error, Result};
pub use filter::RecipientFilter;
pub use forward::{DEFAULT_FORWARD_TIMEOUT, Forward, ForwardError, HttpForwarder};
pub use ingest::{Ingest, Outcome};
