//! REST endpoint handlers organized by resource.

pub mod gift;
pub mod holding;
pub mod quote;
pub mod system;
pub mod trade;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(quote::routes())
        .merge(trade::routes())
        .merge(holding::routes())
        .merge(gift::routes())
}
