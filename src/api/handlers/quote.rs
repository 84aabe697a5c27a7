//! Quote endpoint handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{QuoteRequest, QuoteResponse};
use crate::app_state::AppState;
use crate::domain::QuoteMode;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /quotes` — Quote a buy or sell.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid amounts, out-of-range slippage, or
/// when no price source can answer.
#[utoipa::path(
    post,
    path = "/api/v1/quotes",
    tag = "Quotes",
    summary = "Quote a gold trade",
    description = "Prices `amount_in` of the input asset against the venue. Estimate-mode quotes fall back to the spot reference when the venue is down; such quotes are flagged `fallback` and cannot be executed. The returned `quote_id` may be used once for a buy or sell before `valid_until`.",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Quote issued", body = QuoteResponse),
        (status = 400, description = "Invalid amount or slippage", body = ErrorResponse),
        (status = 502, description = "No price source available", body = ErrorResponse),
    )
)]
pub async fn create_quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let quote = state
        .trade
        .quote(
            req.asset_in,
            req.amount_in,
            req.slippage_bps,
            req.mode.unwrap_or(QuoteMode::Estimate),
        )
        .await?;
    Ok(Json(QuoteResponse::from(&quote)))
}

/// Quote routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/quotes", post(create_quote))
}
