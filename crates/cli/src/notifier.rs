//! Reminder delivery for the terminal.

use async_trait::async_trait;
use std::io::Write;
use thriftbot_core::error::ChannelError;
use thriftbot_core::notifier::Notifier;

/// Prints pushed messages to stdout, tagged with their chat id.
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "\n  [{chat_id}] {text}")
            .and_then(|_| out.flush())
            .map_err(|e| ChannelError::DeliveryFailed {
                chat_id: chat_id.to_string(),
                reason: e.to_string(),
            })
    }
}
