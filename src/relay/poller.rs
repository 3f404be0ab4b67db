//! Long-polling loop for `getUpdates`.
//!
//! Each round asks for updates above the cursor, advances the cursor over
//! everything returned, and either hands admitted messages to the subscriber
//! or answers rejected chats and alerts the administrators.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::relay::api::BotApi;
use crate::relay::codec;
use crate::relay::types::{InboundMessage, MessageFormat};
use crate::relay::{MessageReceived, RelayHandle};

/// Reply sent to chats that are not allowed to use the relay.
pub const NOT_AUTHORIZED_REPLY: &str = "Not authorized!";

/// Timing of the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Long-poll ceiling passed to the platform
    pub timeout: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
        }
    }
}

/// Highest update id processed so far. Zero means none.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(i64);

impl Cursor {
    pub fn value(self) -> i64 {
        self.0
    }

    /// Offset for the next `getUpdates` request.
    pub fn next_offset(self) -> i64 {
        self.0 + 1
    }

    /// Move forward to `update_id`. Never moves backwards.
    pub fn advance(&mut self, update_id: i64) {
        self.0 = self.0.max(update_id);
    }
}

/// Exponential backoff between failed polls.
#[derive(Debug)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub struct Poller {
    api: Arc<dyn BotApi>,
    relay: RelayHandle,
    inbound_tx: mpsc::UnboundedSender<MessageReceived>,
    settings: PollSettings,
    cursor: Cursor,
}

impl Poller {
    pub fn new(
        api: Arc<dyn BotApi>,
        relay: RelayHandle,
        inbound_tx: mpsc::UnboundedSender<MessageReceived>,
        settings: PollSettings,
    ) -> Self {
        Self {
            api,
            relay,
            inbound_tx,
            settings,
            cursor: Cursor::default(),
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Poll until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut backoff = Backoff::new(self.settings.backoff_initial, self.settings.backoff_max);

        info!("Telegram poller started");

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.fetch() => result,
            };

            match result {
                Ok(body) => {
                    backoff.reset();
                    self.process_body(&body);
                }
                Err(e) if e.is_timeout() => {
                    debug!("getUpdates timed out, polling again");
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        backoff_ms = delay.as_millis() as u64,
                        "Error while waiting for next Telegram updates: {}", e
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(cursor = self.cursor.value(), "Telegram poller stopped");
    }

    async fn fetch(&self) -> Result<String, RelayError> {
        let response = self
            .api
            .get_updates(self.cursor.next_offset(), self.settings.timeout)
            .await?;

        if !response.status.is_success() {
            return Err(RelayError::Status {
                endpoint: "getUpdates",
                status: response.status,
            });
        }
        Ok(response.body)
    }

    /// Handle one `getUpdates` response body, in the order the updates were
    /// returned. Updates at or below the cursor are skipped, so each id is
    /// handled at most once. Returns how many messages reached the subscriber.
    pub fn process_body(&mut self, body: &str) -> usize {
        let batch = codec::decode_poll_response(body);
        if !batch.ok {
            debug!("getUpdates response not ok, ignoring");
            return 0;
        }

        let mut delivered = 0;
        for update in &batch.updates {
            if update.update_id <= self.cursor.value() {
                debug!(
                    update_id = update.update_id,
                    cursor = self.cursor.value(),
                    "Skipping already processed update"
                );
                continue;
            }
            self.cursor.advance(update.update_id);

            match codec::decode_update(update) {
                Ok((_, message)) => {
                    if self.dispatch(message) {
                        delivered += 1;
                    }
                }
                Err(e) => debug!("Skipping update: {}", e),
            }
        }
        delivered
    }

    fn dispatch(&self, message: InboundMessage) -> bool {
        let gate = self.relay.authorization();

        if !gate.is_admitted(message.chat_id) {
            warn!(
                chat_id = message.chat_id,
                "Rejected message from non-whitelisted chat"
            );

            self.relay.enqueue(message.create_response(NOT_AUTHORIZED_REPLY));
            self.relay.broadcast(
                &format!(
                    "\u{26a0}\u{fe0f} A non-whitelisted client ({}) has sent a message: '{}'",
                    message.chat_id,
                    codec::escape_html(&message.text)
                ),
                MessageFormat::Html,
            );
            return false;
        }

        debug!(chat_id = message.chat_id, "Received message: {}", message.text);

        let event = MessageReceived {
            relay: self.relay.clone(),
            message,
        };
        if self.inbound_tx.send(event).is_err() {
            debug!("No subscriber for inbound messages, dropping");
            return false;
        }
        true
    }
}
