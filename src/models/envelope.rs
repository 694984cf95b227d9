//! Queue delivery envelope.
//!
//! A received message is handed out as a [`QueueEnvelope`]: the decoded
//! payload plus the [`AckToken`] needed to delete that specific delivery.
//! Transport bookkeeping never leaks into the payload itself.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies one delivery of one message. Serialized as an opaque string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AckToken {
    pub message_id: String,
    pub pop_receipt: String,
}

#[derive(Debug, Error)]
#[error("malformed acknowledgement token")]
pub struct InvalidAckToken;

impl AckToken {
    pub fn new(message_id: impl Into<String>, pop_receipt: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            pop_receipt: pop_receipt.into(),
        }
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}\n{}", self.message_id, self.pop_receipt))
    }

    pub fn decode(token: &str) -> Result<Self, InvalidAckToken> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| InvalidAckToken)?;
        let raw = String::from_utf8(raw).map_err(|_| InvalidAckToken)?;
        match raw.split_once('\n') {
            Some((id, receipt)) if !id.is_empty() && !receipt.is_empty() => {
                Ok(Self::new(id, receipt))
            }
            _ => Err(InvalidAckToken),
        }
    }
}

impl From<AckToken> for String {
    fn from(token: AckToken) -> Self {
        token.encode()
    }
}

impl TryFrom<String> for AckToken {
    type Error = InvalidAckToken;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEnvelope<T> {
    pub payload: T,
    pub ack_token: AckToken,
    /// How many times this message has been received, this time included.
    pub dequeue_count: i64,
    pub inserted_on: DateTime<Utc>,
    /// When the message reappears unless acknowledged first.
    pub next_visible_on: DateTime<Utc>,
}
