//! Buy and sell handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{TradeRequestDto, TradeResponse};
use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /users/{user_id}/buy` — Buy gold with stablecoin.
///
/// # Errors
///
/// Returns [`GatewayError`] when quoting, execution or reconciliation fails.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/buy",
    tag = "Trades",
    summary = "Buy gold",
    description = "Executes a stablecoin to gold swap from the user's custodial wallet and credits the holding at the received quantity.",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User UUID"),
    ),
    request_body = TradeRequestDto,
    responses(
        (status = 200, description = "Swap settled and reconciled", body = TradeResponse),
        (status = 400, description = "Invalid, expired or fallback quote", body = ErrorResponse),
        (status = 422, description = "Swap reverted or approval failed", body = ErrorResponse),
        (status = 502, description = "Venue unavailable or output unverified", body = ErrorResponse),
        (status = 504, description = "Confirmation timed out; outcome unknown", body = ErrorResponse),
    )
)]
pub async fn buy(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
    Json(req): Json<TradeRequestDto>,
) -> Result<impl IntoResponse, GatewayError> {
    let outcome = state
        .trade
        .buy(UserId::from_uuid(user_id), req.into())
        .await?;
    Ok(Json(TradeResponse::from(&outcome)))
}

/// `POST /users/{user_id}/sell` — Sell gold for stablecoin.
///
/// # Errors
///
/// Returns [`GatewayError::InsufficientBalance`] when the holding is
/// smaller than the amount, otherwise as for [`buy`].
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/sell",
    tag = "Trades",
    summary = "Sell gold",
    description = "Executes a gold to stablecoin swap and debits the holding at its average cost, realizing profit or loss.",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User UUID"),
    ),
    request_body = TradeRequestDto,
    responses(
        (status = 200, description = "Swap settled and reconciled", body = TradeResponse),
        (status = 400, description = "Invalid, expired or fallback quote", body = ErrorResponse),
        (status = 422, description = "Insufficient holding or swap reverted", body = ErrorResponse),
        (status = 502, description = "Venue unavailable or output unverified", body = ErrorResponse),
        (status = 504, description = "Confirmation timed out; outcome unknown", body = ErrorResponse),
    )
)]
pub async fn sell(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
    Json(req): Json<TradeRequestDto>,
) -> Result<impl IntoResponse, GatewayError> {
    let outcome = state
        .trade
        .sell(UserId::from_uuid(user_id), req.into())
        .await?;
    Ok(Json(TradeResponse::from(&outcome)))
}

/// Trade routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}/buy", post(buy))
        .route("/users/{user_id}/sell", post(sell))
}
