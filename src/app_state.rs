//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::{GiftService, TradeService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Quotes, trades, holdings and history.
    pub trade: Arc<TradeService>,
    /// Gift sending and claiming.
    pub gifts: Arc<GiftService>,
    /// Event bus for WebSocket subscriptions.
    pub events: EventBus,
}
