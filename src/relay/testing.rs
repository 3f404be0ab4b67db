//! Scripted [`BotApi`] fake shared by the relay tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::RelayError;
use crate::relay::api::{ApiResponse, BotApi};
use crate::relay::types::{MessageFormat, OutboundMessage};

pub enum SendOutcome {
    Status(StatusCode),
    Fail(RelayError),
}

pub enum PollOutcome {
    Respond(StatusCode, String),
    Fail(RelayError),
}

/// A genuine `reqwest` error that never touches the network.
pub fn transport_error() -> RelayError {
    match reqwest::Client::new().get("not a url").build() {
        Err(e) => RelayError::Transport(e),
        Ok(_) => unreachable!("relative URLs do not build"),
    }
}

/// Records every `sendMessage` attempt and replays scripted outcomes.
///
/// Sends succeed once the script runs out. Polls hang once the script runs
/// out, like a long poll with nothing to report.
#[derive(Default)]
pub struct FakeApi {
    attempts: Mutex<Vec<OutboundMessage>>,
    send_script: Mutex<VecDeque<SendOutcome>>,
    poll_script: Mutex<VecDeque<PollOutcome>>,
    offsets: Mutex<Vec<i64>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_send(&self, outcome: SendOutcome) {
        self.send_script.lock().unwrap().push_back(outcome);
    }

    pub fn script_poll(&self, outcome: PollOutcome) {
        self.poll_script.lock().unwrap().push_back(outcome);
    }

    pub fn attempts(&self) -> Vec<OutboundMessage> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }

    /// Wait until at least `count` sends were attempted.
    pub async fn wait_for_attempts(&self, count: usize) -> Vec<OutboundMessage> {
        wait_until(|| self.attempts.lock().unwrap().len() >= count).await;
        self.attempts()
    }

    /// Wait until at least `count` polls were issued.
    pub async fn wait_for_polls(&self, count: usize) -> Vec<i64> {
        wait_until(|| self.offsets.lock().unwrap().len() >= count).await;
        self.offsets()
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for the relay");
}

fn decode_body(body: &str) -> OutboundMessage {
    let json: Value = serde_json::from_str(body).expect("sendMessage body is JSON");
    let format = match json.get("parse_mode").and_then(Value::as_str) {
        Some("HTML") => MessageFormat::Html,
        _ => MessageFormat::PlainText,
    };
    OutboundMessage {
        chat_id: json["chat_id"].as_i64().expect("chat_id"),
        text: json["text"].as_str().expect("text").to_string(),
        format,
    }
}

#[async_trait]
impl BotApi for FakeApi {
    async fn send_message(&self, body: String) -> Result<ApiResponse, RelayError> {
        self.attempts.lock().unwrap().push(decode_body(&body));
        let outcome = self.send_script.lock().unwrap().pop_front();
        match outcome {
            Some(SendOutcome::Status(status)) => Ok(ApiResponse::new(status, "{}")),
            Some(SendOutcome::Fail(e)) => Err(e),
            None => Ok(ApiResponse::new(StatusCode::OK, r#"{"ok":true}"#)),
        }
    }

    async fn get_updates(
        &self,
        offset: i64,
        _timeout: Duration,
    ) -> Result<ApiResponse, RelayError> {
        self.offsets.lock().unwrap().push(offset);
        let outcome = self.poll_script.lock().unwrap().pop_front();
        match outcome {
            Some(PollOutcome::Respond(status, body)) => Ok(ApiResponse::new(status, body)),
            Some(PollOutcome::Fail(e)) => Err(e),
            None => std::future::pending().await,
        }
    }
}
