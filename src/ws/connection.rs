//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered ledger events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::api::dto::HoldingDto;
use crate::domain::{LedgerEvent, UserId};
use crate::service::TradeService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<LedgerEvent>,
    trade: Arc<TradeService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &trade).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(ledger_event) => {
                        if !subs.matches(&ledger_event) {
                            continue;
                        }
                        let msg = WsMessage {
                            id: uuid::Uuid::new_v4().to_string(),
                            msg_type: WsMessageType::Event,
                            timestamp: chrono::Utc::now(),
                            payload: serde_json::to_value(&ledger_event).unwrap_or_default(),
                        };
                        let json = serde_json::to_string(&msg).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
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

/// Splits raw ids into parsed users and the `"*"` wildcard, ignoring
/// anything unparsable.
fn parse_user_ids(raw: &[String]) -> (Vec<UserId>, bool) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    for s in raw {
        if s == "*" {
            wildcard = true;
        } else if let Ok(uuid) = s.parse::<uuid::Uuid>() {
            ids.push(UserId::from_uuid(uuid));
        }
    }
    (ids, wildcard)
}

/// Handles a text message from the client, returning an optional JSON response.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    trade: &TradeService,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error(String::new(), 400, "malformed JSON")).ok();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let response = match command {
        WsCommand::Subscribe { user_ids } => {
            let (ids, wildcard) = parse_user_ids(&user_ids);
            subs.subscribe(&ids, wildcard);
            WsMessage::reply(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { user_ids } => {
            let (ids, wildcard) = parse_user_ids(&user_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::reply(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::GetHolding { user_id } => {
            let Ok(uuid) = user_id.parse::<uuid::Uuid>() else {
                return serde_json::to_string(&WsMessage::error(msg.id, 400, "invalid user_id"))
                    .ok();
            };
            match trade.holding(UserId::from_uuid(uuid)).await {
                Ok(holding) => WsMessage::reply(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::to_value(HoldingDto::from(&holding)).unwrap_or_default(),
                ),
                Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), e.to_string()),
            }
        }
    };
    serde_json::to_string(&response).ok()
}
