//! Message handler interface.

use crate::types::{Envelope, Reply};
use std::future::Future;

/// Decides the reply to a completed message transaction.
///
/// Called once per message after the client finishes `DATA`. The returned
/// reply is sent to the client verbatim. Each call runs in its own task, so a
/// panicking handler fails only that message with `451`.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handles one message.
    fn handle(&self, envelope: Envelope) -> impl Future<Output = Reply> + Send;
}
