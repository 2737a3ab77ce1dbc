//! Per-connection SMTP state machine.

use super::config::ServerConfig;
use super::stream::{Line, MessageData, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::handler::MessageHandler;
use crate::types::{Address, Envelope, Extension, Reply, ReplyCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

/// Verbs that are recognized but deliberately not offered.
const NOT_IMPLEMENTED: &[&str] = &["STARTTLS", "AUTH", "BDAT", "ETRN", "EXPN", "TURN", "ATRN"];

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Greeting sent, waiting for HELO/EHLO.
    Connected,
    /// Client identified itself; no transaction open.
    Greeted,
    /// MAIL accepted.
    MailTransaction,
    /// At least one RCPT accepted.
    RecipientAdded,
    /// Receiving message content.
    Data,
}

/// Whether the connection stays open after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Server side of one SMTP connection.
pub struct Session<S, H> {
    stream: SmtpStream<S>,
    config: Arc<ServerConfig>,
    handler: Arc<H>,
    shutdown: Option<watch::Receiver<bool>>,
    peer: Option<SocketAddr>,
    state: State,
    sender: Option<Address>,
    recipients: Vec<Address>,
}

impl<S, H> std::fmt::Debug for Session<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("state", &self.state)
            .field("recipients", &self.recipients.len())
            .finish_non_exhaustive()
    }
}

impl<S, H> Session<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: MessageHandler,
{
    /// Creates a session over a connected stream.
    pub fn new(stream: S, config: Arc<ServerConfig>, handler: Arc<H>) -> Self {
        Self {
            stream: SmtpStream::new(stream),
            config,
            handler,
            shutdown: None,
            peer: None,
            state: State::Connected,
            sender: None,
            recipients: Vec::new(),
        }
    }

    /// Closes the session with `421` once the receiver reads `true` or its
    /// sender is dropped.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Records the remote address for logging.
    #[must_use]
    pub const fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Runs the session until the client quits, disconnects or times out.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if the client disconnects during
    /// `DATA`.
    pub async fn run(&mut self) -> Result<()> {
        let greeting = format!("{} ESMTP ready", self.config.hostname);
        self.reply(Reply::single(ReplyCode::SERVICE_READY, greeting))
            .await?;

        loop {
            let read = tokio::select! {
                read = tokio::time::timeout(
                    self.config.idle_timeout,
                    self.stream.read_line(self.config.max_line_length),
                ) => Some(read),
                () = shutdown_requested(self.shutdown.as_mut()) => None,
            };

            let Some(read) = read else {
                tracing::debug!(peer = ?self.peer, "closing session for shutdown");
                let text = format!("{} shutting down", self.config.hostname);
                self.reply(Reply::single(ReplyCode::SERVICE_UNAVAILABLE, text))
                    .await?;
                return Ok(());
            };

            let Ok(line) = read else {
                tracing::debug!(peer = ?self.peer, "idle timeout");
                let text = format!("{} timeout, closing connection", self.config.hostname);
                self.reply(Reply::single(ReplyCode::SERVICE_UNAVAILABLE, text))
                    .await?;
                return Ok(());
            };

            let line = match line? {
                Line::Complete(line) => line,
                Line::TooLong => {
                    self.reply(Reply::single(ReplyCode::SYNTAX_ERROR, "line too long"))
                        .await?;
                    continue;
                }
                Line::Eof => {
                    tracing::debug!(peer = ?self.peer, state = ?self.state, "client disconnected");
                    return Ok(());
                }
            };

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(Error::UnsupportedParameter(param)) => {
                    let text = format!("parameter not supported: {param}");
                    self.reply(Reply::single(ReplyCode::PARAMETERS_NOT_RECOGNIZED, text))
                        .await?;
                    continue;
                }
                Err(e) => {
                    self.reply(Reply::single(ReplyCode::PARAMETER_ERROR, e.to_string()))
                        .await?;
                    continue;
                }
            };

            tracing::trace!(peer = ?self.peer, verb = command.verb(), "command");
            if self.execute(command).await? == Flow::Close {
                return Ok(());
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<Flow> {
        let reply = match command {
            Command::Helo { hostname } => {
                self.reset_transaction();
                self.state = State::Greeted;
                tracing::debug!(peer = ?self.peer, client = %hostname, "HELO");
                Reply::ok(self.config.hostname.clone())
            }
            Command::Ehlo { hostname } => {
                self.reset_transaction();
                self.state = State::Greeted;
                tracing::debug!(peer = ?self.peer, client = %hostname, "EHLO");
                let mut lines = vec![format!("{} greets {hostname}", self.config.hostname)];
                lines.extend(
                    Extension::advertised(self.config.max_message_size)
                        .iter()
                        .map(ToString::to_string),
                );
                Reply::new(ReplyCode::OK, lines)
            }
            Command::MailFrom { from, size, .. } => self.mail(from, size),
            Command::RcptTo { to } => self.rcpt(to),
            Command::Data => match self.state {
                State::RecipientAdded => return self.data().await,
                State::MailTransaction => bad_sequence("need RCPT command"),
                _ => bad_sequence("need MAIL command"),
            },
            Command::Rset => {
                self.reset_transaction();
                if self.state != State::Connected {
                    self.state = State::Greeted;
                }
                Reply::ok("OK")
            }
            Command::Noop => Reply::ok("OK"),
            Command::Vrfy { .. } => Reply::single(
                ReplyCode::CANNOT_VERIFY,
                "cannot VRFY user, but will accept message and attempt delivery",
            ),
            Command::Help => Reply::single(
                ReplyCode::HELP,
                "supported commands: HELO EHLO MAIL RCPT DATA RSET NOOP VRFY HELP QUIT",
            ),
            Command::Quit => {
                let text = format!("{} closing connection", self.config.hostname);
                self.reply(Reply::single(ReplyCode::CLOSING, text)).await?;
                return Ok(Flow::Close);
            }
            Command::Unknown { verb } => {
                if NOT_IMPLEMENTED
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(&verb))
                {
                    Reply::single(ReplyCode::NOT_IMPLEMENTED, "command not implemented")
                } else {
                    Reply::single(ReplyCode::SYNTAX_ERROR, "command not recognized")
                }
            }
        };

        self.reply(reply).await?;
        Ok(Flow::Continue)
    }

    fn mail(&mut self, from: Option<Address>, size: Option<usize>) -> Reply {
        match self.state {
            State::Connected => bad_sequence("send HELO/EHLO first"),
            State::MailTransaction | State::RecipientAdded | State::Data => {
                bad_sequence("sender already specified")
            }
            State::Greeted => {
                if size.is_some_and(|size| size > self.config.max_message_size) {
                    return Reply::single(
                        ReplyCode::EXCEEDED_STORAGE,
                        "message size exceeds fixed maximum message size",
                    );
                }
                self.sender = from;
                self.state = State::MailTransaction;
                Reply::ok("OK")
            }
        }
    }

    fn rcpt(&mut self, to: Address) -> Reply {
        match self.state {
            State::MailTransaction | State::RecipientAdded => {
                if self.recipients.len() >= self.config.max_recipients {
                    return Reply::single(ReplyCode::INSUFFICIENT_STORAGE, "too many recipients");
                }
                self.recipients.push(to);
                self.state = State::RecipientAdded;
                Reply::ok("OK")
            }
            _ => bad_sequence("need MAIL command"),
        }
    }

    async fn data(&mut self) -> Result<Flow> {
        self.state = State::Data;
        self.reply(Reply::single(
            ReplyCode::START_DATA,
            "End data with <CR><LF>.<CR><LF>",
        ))
        .await?;

        let received = self
            .stream
            .read_data(self.config.max_message_size, self.config.idle_timeout)
            .await;

        let sender = self.sender.take();
        let recipients = std::mem::take(&mut self.recipients);
        self.state = State::Greeted;

        let reply = match received {
            Ok(MessageData::Complete(data)) => {
                let envelope = Envelope::new(sender, recipients, data);
                dispatch(Arc::clone(&self.handler), self.peer, envelope).await
            }
            Ok(MessageData::Oversized(size)) => {
                tracing::warn!(peer = ?self.peer, size, limit = self.config.max_message_size, "message too large");
                Reply::single(
                    ReplyCode::EXCEEDED_STORAGE,
                    "message exceeds fixed maximum message size",
                )
            }
            Err(Error::Timeout) => {
                tracing::debug!(peer = ?self.peer, "timeout during DATA");
                let text = format!("{} timeout, closing connection", self.config.hostname);
                self.reply(Reply::single(ReplyCode::SERVICE_UNAVAILABLE, text))
                    .await?;
                return Ok(Flow::Close);
            }
            Err(e) => return Err(e),
        };

        self.reply(reply).await?;
        Ok(Flow::Continue)
    }

    fn reset_transaction(&mut self) {
        self.sender = None;
        self.recipients.clear();
    }

    async fn reply(&mut self, reply: Reply) -> Result<()> {
        self.stream.write_reply(&reply).await
    }
}

/// Runs the handler in its own task so a panic fails only this message.
async fn dispatch<H: MessageHandler>(
    handler: Arc<H>,
    peer: Option<SocketAddr>,
    envelope: Envelope,
) -> Reply {
    let recipients = envelope.recipients.len();
    let size = envelope.data.len();

    let reply = match tokio::spawn(async move { handler.handle(envelope).await }).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(?peer, ?e, "message handler failed");
            Reply::single(ReplyCode::LOCAL_ERROR, "local error in processing")
        }
    };

    tracing::info!(?peer, recipients, size, code = %reply.code, "message handled");
    reply
}

fn bad_sequence(text: &str) -> Reply {
    Reply::single(ReplyCode::BAD_SEQUENCE, text)
}

/// Resolves once shutdown is requested; never without a receiver.
async fn shutdown_requested(shutdown: Option<&mut watch::Receiver<bool>>) {
    match shutdown {
        Some(rx) => {
            let _ = rx.wait_for(|stop| *stop).await;
        }
        None => std::future::pending().await,
    }
}
