//! Bidirectional relay between the application and the Telegram Bot API.
//!
//! Two background loops run once [`Relay::enable`] is called:
//!
//! - the **sender** drains the outbound queue, one `sendMessage` per message
//! - the **poller** long-polls `getUpdates`, filters chats through the
//!   [`AuthorizationGate`] and publishes admitted messages as
//!   [`MessageReceived`] events
//!
//! ```text
//!  caller ──enqueue──▶ OutboundQueue ──▶ send_loop ──▶ POST sendMessage
//!                           ▲
//!                           │ rejection reply / admin alert
//!  GET getUpdates ──▶ Poller ──admitted──▶ MessageReceived channel ──▶ caller
//! ```

pub mod api;
pub mod auth;
pub mod codec;
pub mod outbound;
pub mod poller;
#[cfg(test)]
mod testing;
pub mod types;

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::TelegramConfig;
use crate::error::RelayError;

use self::api::{BotApi, HttpBotApi};
use self::auth::AuthorizationGate;
use self::outbound::{outbound_queue, OutboundQueue};
use self::poller::{PollSettings, Poller};
use self::types::{InboundMessage, MessageFormat, OutboundMessage};

/// An admitted inbound message, together with a handle for answering it.
#[derive(Debug, Clone)]
pub struct MessageReceived {
    pub relay: RelayHandle,
    pub message: InboundMessage,
}

impl MessageReceived {
    /// Queue a plain-text reply to the chat the message came from.
    pub fn reply(&self, text: impl Into<String>) {
        self.relay.enqueue(self.message.create_response(text));
    }
}

/// Cloneable access to the outbound side of a relay.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    outbound: OutboundQueue,
    authorization: Arc<RwLock<Arc<AuthorizationGate>>>,
}

impl RelayHandle {
    fn new(outbound: OutboundQueue, gate: AuthorizationGate) -> Self {
        Self {
            outbound,
            authorization: Arc::new(RwLock::new(Arc::new(gate))),
        }
    }

    /// Queue a message for delivery. Never blocks.
    pub fn enqueue(&self, message: OutboundMessage) {
        self.outbound.enqueue(message);
    }

    /// Queue one copy of `text` for every administrator.
    ///
    /// A `&str` is never absent, so the argument check is on emptiness
    /// instead: `sendMessage` refuses empty text, and queueing it would only
    /// produce one failed request per administrator.
    pub fn enqueue_for_administrators(
        &self,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), RelayError> {
        if text.is_empty() {
            return Err(RelayError::InvalidArgument(
                "administrator message text is empty".to_string(),
            ));
        }
        self.broadcast(text, format);
        Ok(())
    }

    /// HTML broadcast to all administrators.
    pub fn notify_administrators(&self, text: &str) -> Result<(), RelayError> {
        self.enqueue_for_administrators(text, MessageFormat::Html)
    }

    /// Current authorization snapshot.
    pub fn authorization(&self) -> Arc<AuthorizationGate> {
        self.authorization
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new authorization snapshot. Updates already being
    /// dispatched finish against the old one.
    pub fn update_authorization(&self, gate: AuthorizationGate) {
        *self
            .authorization
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(gate);
    }

    fn broadcast(&self, text: &str, format: MessageFormat) {
        for &chat_id in &self.authorization().administrators {
            self.enqueue(OutboundMessage::new(chat_id, text, format));
        }
    }
}

/// The relay before it is started.
pub struct Relay {
    api: Arc<dyn BotApi>,
    handle: RelayHandle,
    outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    inbound_tx: mpsc::UnboundedSender<MessageReceived>,
    settings: PollSettings,
}

impl Relay {
    /// Build a relay on top of `api`. Admitted messages arrive on the
    /// returned receiver.
    pub fn new(
        api: Arc<dyn BotApi>,
        gate: AuthorizationGate,
        settings: PollSettings,
    ) -> (Self, mpsc::UnboundedReceiver<MessageReceived>) {
        let (queue, outbound_rx) = outbound_queue();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let relay = Self {
            api,
            handle: RelayHandle::new(queue, gate),
            outbound_rx,
            inbound_tx,
            settings,
        };
        (relay, inbound_rx)
    }

    /// Build a relay talking HTTPS to the configured Bot API endpoint.
    pub fn from_config(
        config: &TelegramConfig,
        settings: PollSettings,
    ) -> (Self, mpsc::UnboundedReceiver<MessageReceived>) {
        let api = HttpBotApi::new(&config.bot_token, &config.api_base_url);
        Self::new(Arc::new(api), config.authorization(), settings)
    }

    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    pub fn enqueue(&self, message: OutboundMessage) {
        self.handle.enqueue(message);
    }

    pub fn enqueue_for_administrators(
        &self,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), RelayError> {
        self.handle.enqueue_for_administrators(text, format)
    }

    pub fn update_authorization(&self, gate: AuthorizationGate) {
        self.handle.update_authorization(gate);
    }

    /// Start the sender and the poller. Both run until `cancel` fires.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enable(self, cancel: CancellationToken) -> RelayTasks {
        let sender = tokio::spawn(outbound::send_loop(
            self.api.clone(),
            self.outbound_rx,
            cancel.clone(),
        ));

        let poller = Poller::new(self.api, self.handle, self.inbound_tx, self.settings);
        let poller = tokio::spawn(poller.run(cancel));

        info!("Telegram relay enabled");
        RelayTasks { sender, poller }
    }
}

/// Join handles of the two relay loops.
pub struct RelayTasks {
    sender: JoinHandle<()>,
    poller: JoinHandle<()>,
}

impl RelayTasks {
    /// Wait for both loops to stop.
    pub async fn join(self) {
        let (sender, poller) = tokio::join!(self.sender, self.poller);
        if let Err(e) = sender {
            error!("Outbound sender task failed: {}", e);
        }
        if let Err(e) = poller {
            error!("Telegram poller task failed: {}", e);
        }
    }
}
