//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Server message answering request `id`.
    #[must_use]
    pub fn reply(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Error answering request `id`.
    #[must_use]
    pub fn error(id: String, code: u16, message: impl Into<String>) -> Self {
        Self::reply(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message.into() }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket, carried in the
/// envelope's `payload`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to events of specific users.
    Subscribe {
        /// User IDs to subscribe to. Use `["*"]` for all users.
        user_ids: Vec<String>,
    },
    /// Unsubscribe from events of specific users.
    Unsubscribe {
        /// User IDs to unsubscribe from.
        user_ids: Vec<String>,
    },
    /// Read a user's current holding.
    GetHolding {
        /// Holding owner.
        user_id: String,
    },
}
