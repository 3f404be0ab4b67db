use chrono::{DateTime, Local};

/// How the platform should render an outbound message's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    #[default]
    PlainText,
    Html,
}

/// A message waiting to be delivered to one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    pub format: MessageFormat,
}

impl OutboundMessage {
    pub fn new(chat_id: i64, text: impl Into<String>, format: MessageFormat) -> Self {
        Self {
            chat_id,
            text: text.into(),
            format,
        }
    }

    pub fn plain(chat_id: i64, text: impl Into<String>) -> Self {
        Self::new(chat_id, text, MessageFormat::PlainText)
    }

    pub fn html(chat_id: i64, text: impl Into<String>) -> Self {
        Self::new(chat_id, text, MessageFormat::Html)
    }
}

/// A text message received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// When the platform received the message, in local time
    pub timestamp: DateTime<Local>,
    pub chat_id: i64,
    pub text: String,
}

impl InboundMessage {
    /// Build a plain-text reply addressed to the chat this message came from.
    pub fn create_response(&self, text: impl Into<String>) -> OutboundMessage {
        OutboundMessage::plain(self.chat_id, text)
    }
}
