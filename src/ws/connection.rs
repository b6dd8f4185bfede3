//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::{SubscriptionManager, parse_targets};
use crate::domain::{InstanceId, RelayEvent};
use crate::error::RelayError;
use crate::service::RelayService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<RelayEvent>,
    relay_service: Arc<RelayService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, &relay_service).await;
                        if let Some(json) = encode(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(relay_event) => {
                        if !subs.matches(relay_event.instance_id()) {
                            continue;
                        }
                        if let Some(json) = encode(&event_message(&relay_event))
                            && ws_tx.send(Message::text(json)).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn encode(msg: &WsMessage) -> Option<String> {
    serde_json::to_string(msg)
        .inspect_err(|e| tracing::warn!(error = %e, "failed to encode ws message"))
        .ok()
}

/// Wraps a bus event in the envelope sent to clients.
pub fn event_message(event: &RelayEvent) -> WsMessage {
    WsMessage::new(
        uuid::Uuid::new_v4().to_string(),
        WsMessageType::Event,
        serde_json::to_value(event).unwrap_or_default(),
    )
}

/// Handles a text frame from the client and builds the reply.
pub async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    relay_service: &RelayService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error("", 400, "malformed JSON");
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe { instance_ids } => {
            let (ids, wildcard, rejected) = parse_targets(&instance_ids);
            subs.subscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "rejected": rejected,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { instance_ids } => {
            let (ids, wildcard, rejected) = parse_targets(&instance_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "rejected": rejected,
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Refresh { instance_id } => {
            let result = match instance_id.parse::<InstanceId>() {
                Ok(id) => relay_service
                    .trigger_refresh(id)
                    .await
                    .map(|accepted| serde_json::json!({ "accepted": accepted })),
                Err(_) => Err(invalid_id(&instance_id)),
            };
            reply(msg.id, result)
        }
        WsCommand::GetStatus { instance_id } => {
            let result = match instance_id.parse::<InstanceId>() {
                Ok(id) => relay_service
                    .instance_status(id)
                    .await
                    .map(|status| serde_json::to_value(status).unwrap_or_default()),
                Err(_) => Err(invalid_id(&instance_id)),
            };
            reply(msg.id, result)
        }
    }
}

fn invalid_id(raw: &str) -> RelayError {
    RelayError::InvalidRequest(format!("invalid instance id '{raw}'"))
}

fn reply(id: String, result: Result<serde_json::Value, RelayError>) -> WsMessage {
    match result {
        Ok(payload) => WsMessage::new(id, WsMessageType::Response, payload),
        Err(e) => WsMessage::error(id, e.error_code(), &e.to_string()),
    }
}
