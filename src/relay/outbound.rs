//! Outbound queue and the loop that drains it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::RelayError;
use crate::relay::api::BotApi;
use crate::relay::codec;
use crate::relay::types::OutboundMessage;

/// Producer side of the outbound queue. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

/// Create an unbounded FIFO queue with a single consumer.
pub fn outbound_queue() -> (OutboundQueue, mpsc::UnboundedReceiver<OutboundMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundQueue { tx }, rx)
}

impl OutboundQueue {
    /// Append a message to the tail of the queue.
    pub fn enqueue(&self, message: OutboundMessage) {
        if let Err(mpsc::error::SendError(message)) = self.tx.send(message) {
            // Only happens once the send loop has stopped.
            warn!(
                chat_id = message.chat_id,
                "Outbound queue closed, dropping message '{}'", message.text
            );
        }
    }
}

/// Deliver queued messages one at a time until cancelled.
///
/// A failed delivery is logged and the message dropped; it never stops the
/// loop.
pub async fn send_loop(
    api: Arc<dyn BotApi>,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    cancel: CancellationToken,
) {
    info!("Outbound sender started");

    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };

        if let Err(e) = deliver(api.as_ref(), &message).await {
            error!(
                chat_id = message.chat_id,
                "Error while sending Telegram message '{}': {}", message.text, e
            );
        }
    }

    info!("Outbound sender stopped");
}

/// Encode and POST a single message.
///
/// A non-success status is logged here and counts as delivered; only
/// encoding and transport failures come back as errors.
async fn deliver(api: &dyn BotApi, message: &OutboundMessage) -> Result<(), RelayError> {
    let body = codec::encode_outbound(message)?;
    let response = api.send_message(body).await?;

    if !response.status.is_success() {
        warn!(
            chat_id = message.chat_id,
            status = %response.status,
            "Sending Telegram message failed (Message='{}')", message.text
        );
        debug!("sendMessage response: {}", response.body);
        return Ok(());
    }

    info!(
        "Sent Telegram message '{}' to chat {}.",
        message.text, message.chat_id
    );
    Ok(())
}
