//! SMTP connection handling: configuration, stream and session state machine.

mod config;
mod session;
mod stream;

pub use config::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT, ServerConfig, ServerConfigBuilder};
pub use session::Session;
pub use stream::{Line, MessageData, SmtpStream};
