//! WebSocket message types: envelope and commands.

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
    /// Server-originated message with the current timestamp.
    #[must_use]
    pub fn new(id: impl Into<String>, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Error reply carrying a numeric code.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u32, message: &str) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
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
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Follow events for specific instances. Use `["*"]` for all.
    Subscribe {
        /// Instance IDs or `"*"`.
        instance_ids: Vec<String>,
    },
    /// Stop following instances.
    Unsubscribe {
        /// Instance IDs or `"*"`.
        instance_ids: Vec<String>,
    },
    /// Request an immediate refresh.
    Refresh {
        /// Target instance.
        instance_id: String,
    },
    /// Fetch an instance's status.
    GetStatus {
        /// Target instance.
        instance_id: String,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_command() {
        let raw = r#"{"command":"subscribe","instance_ids":["*"]}"#;
        let Ok(cmd) = serde_json::from_str::<WsCommand>(raw) else {
            panic!("command should parse");
        };
        assert_eq!(
            cmd,
            WsCommand::Subscribe {
                instance_ids: vec!["*".to_string()]
            }
        );
    }

    #[test]
    fn error_envelope_shape() {
        let Ok(value) = serde_json::to_value(WsMessage::error("r1", 404, "unknown command")) else {
            panic!("serializable");
        };
        assert_eq!(value.get("type"), Some(&serde_json::json!("error")));
        assert_eq!(
            value.pointer("/payload/code"),
            Some(&serde_json::json!(404))
        );
    }
}
