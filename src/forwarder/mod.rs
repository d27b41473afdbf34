//! Delivery boundary between the retrieval pipeline and chat sinks.

use std::future::Future;

use crate::config::ContactPoint;
use crate::error::ForwardError;
use crate::message::Message;

mod render;
mod telegram;

pub use telegram::TelegramForwarder;

/// Consumes rendered messages for one destination descriptor. The runner
/// never looks inside the descriptor; the implementation that matches its
/// tag does.
pub trait Forwarder {
    fn forward(
        &self,
        contact: &ContactPoint,
        messages: &[Message],
    ) -> impl Future<Output = Result<(), ForwardError>> + Send;
}
