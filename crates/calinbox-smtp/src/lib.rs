//! # calinbox-smtp
//!
//! Inbound SMTP server implementing the receiving side of RFC 5321.
//!
//! ## Features
//!
//! - **Session state machine**: HELO/EHLO, MAIL, RCPT, DATA, RSET, NOOP,
//!   VRFY, HELP and QUIT with bad-sequence detection
//! - **Extensions**: 8BITMIME, PIPELINING, SIZE, SMTPUTF8
//! - **Limits**: message size, command line length, recipients per message
//!   and idle timeout
//! - **Isolation**: each message is handled in its own task, so a failing
//!   handler affects only that message
//! - **Graceful shutdown**: stop accepting, close idle sessions, drain the rest
//!
//! ## Quick Start
//!
//! ```no_run
//! use calinbox_smtp::{Envelope, MessageHandler, Reply, Server, ServerConfig};
//! use tokio::sync::watch;
//!
//! struct Accept;
//!
//! impl MessageHandler for Accept {
//!     async fn handle(&self, envelope: Envelope) -> Reply {
//!         Reply::ok(format!("accepted {} bytes", envelope.data.len()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> calinbox_smtp::Result<()> {
//!     let config = ServerConfig::new("127.0.0.1", 2525);
//!     let server = Server::bind(config, Accept).await?;
//!
//!     let (_stop, shutdown) = watch::channel(false);
//!     server.run(shutdown).await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── EHLO ───→ Greeted ─── MAIL ───→ MailTransaction
//! └──────────────┘                  ↑                        │
//!                                   │                      RCPT
//!                                   │                        ↓
//!                                   └──── reply ──── Data ←── RecipientAdded
//! ```
//!
//! ## Modules
//!
//! - [`command`]: Command types
//! - [`connection`]: Configuration, stream and session
//! - [`parser`]: Command line parser
//! - [`types`]: Core SMTP types (addresses, envelope, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
mod handler;
pub mod parser;
mod server;
pub mod types;

pub use command::Command;
pub use connection::{ServerConfig, ServerConfigBuilder, Session};
pub use error::{Error, Result};
pub use handler::MessageHandler;
pub use server::Server;
pub use types::{Address, Envelope, Extension, Reply, ReplyCode};
