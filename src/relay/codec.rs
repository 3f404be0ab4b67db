//! JSON wire format of the Bot API `sendMessage` and `getUpdates` calls.
//!
//! Everything here is pure: no I/O, no logging, no shared state.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::relay::types::{InboundMessage, MessageFormat, OutboundMessage};

/// Maximum length of a message text, counted in UTF-16 code units as the
/// platform does.
pub const MAX_TEXT_LENGTH: usize = 4096;

const HTML_PARSE_MODE: &str = "HTML";

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

/// One entry of a `getUpdates` result, before its message is decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

/// A decoded `getUpdates` response.
#[derive(Debug, Default)]
pub struct PollBatch {
    pub ok: bool,
    pub updates: Vec<RawUpdate>,
}

#[derive(Debug, Deserialize)]
struct PollEnvelope {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Vec<RawUpdate>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    date: f64,
    chat: RawChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

/// Serialize an outbound message into a `sendMessage` request body.
///
/// The length limit is enforced before anything is serialized.
pub fn encode_outbound(message: &OutboundMessage) -> Result<String, RelayError> {
    let length = message.text.encode_utf16().count();
    if length > MAX_TEXT_LENGTH {
        return Err(RelayError::Encoding {
            length,
            limit: MAX_TEXT_LENGTH,
        });
    }

    let body = SendMessageBody {
        chat_id: message.chat_id,
        text: &message.text,
        parse_mode: match message.format {
            MessageFormat::Html => Some(HTML_PARSE_MODE),
            MessageFormat::PlainText => None,
        },
    };

    serde_json::to_string(&body).map_err(|e| RelayError::Protocol(e.to_string()))
}

/// Decode a `getUpdates` response body.
///
/// A body that is not JSON, or whose `ok` field is missing or false, yields
/// `ok = false` and no updates. Callers treat that as "nothing new".
pub fn decode_poll_response(body: &str) -> PollBatch {
    match serde_json::from_str::<PollEnvelope>(body) {
        Ok(envelope) if envelope.ok => PollBatch {
            ok: true,
            updates: envelope.result,
        },
        _ => PollBatch::default(),
    }
}

/// Decode one update into its id and the text message it carries.
pub fn decode_update(update: &RawUpdate) -> Result<(i64, InboundMessage), RelayError> {
    let message = update.message.as_ref().ok_or_else(|| {
        RelayError::Protocol(format!("update {} carries no message", update.update_id))
    })?;

    let raw = RawMessage::deserialize(message)
        .map_err(|e| RelayError::Protocol(format!("update {}: {}", update.update_id, e)))?;

    let text = raw.text.ok_or_else(|| {
        RelayError::Protocol(format!("update {} has no text", update.update_id))
    })?;

    let timestamp = unix_to_local(raw.date).ok_or_else(|| {
        RelayError::Protocol(format!(
            "update {} has an out-of-range date {}",
            update.update_id, raw.date
        ))
    })?;

    Ok((
        update.update_id,
        InboundMessage {
            timestamp,
            chat_id: raw.chat.id,
            text,
        },
    ))
}

/// Escape text for inclusion in an HTML-formatted message.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn unix_to_local(seconds: f64) -> Option<DateTime<Local>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        .map(|utc| utc.with_timezone(&Local))
}
