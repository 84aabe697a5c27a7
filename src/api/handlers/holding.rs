//! Holding, position and transaction history handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    HoldingDto, PaginationParams, PositionDto, TransactionDto, TransactionListResponse,
};
use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /users/{user_id}/holding` — Current holding.
///
/// # Errors
///
/// Returns [`GatewayError::PersistenceError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/holding",
    tag = "Holdings",
    summary = "Get holding",
    description = "Returns the user's gold quantity, cost basis and realized P&L. A user that never traded has an empty holding.",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "Holding", body = HoldingDto),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn get_holding(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let holding = state.trade.holding(UserId::from_uuid(user_id)).await?;
    Ok(Json(HoldingDto::from(&holding)))
}

/// `GET /users/{user_id}/position` — Holding valued at spot.
///
/// # Errors
///
/// Returns [`GatewayError::PersistenceError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/position",
    tag = "Holdings",
    summary = "Get position",
    description = "Returns the holding with market value and unrealized P&L at the current spot price. Market fields are omitted when no price is available.",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "Position", body = PositionDto),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn get_position(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let position = state.trade.position(UserId::from_uuid(user_id)).await?;
    Ok(Json(PositionDto::from(&position)))
}

/// `GET /users/{user_id}/transactions` — Paginated ledger history.
///
/// # Errors
///
/// Returns [`GatewayError::PersistenceError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/transactions",
    tag = "Holdings",
    summary = "List transactions",
    description = "Returns the user's completed and failed ledger records, newest first.",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User UUID"),
        PaginationParams,
    ),
    responses(
        (status = 200, description = "Paginated records", body = TransactionListResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let params = params.clamped();
    let (records, total) = state
        .trade
        .transactions(UserId::from_uuid(user_id), params.offset(), params.limit())
        .await?;
    Ok(Json(TransactionListResponse {
        data: records.iter().map(TransactionDto::from).collect(),
        pagination: params.meta(total),
    }))
}

/// Holding routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}/holding", get(get_holding))
        .route("/users/{user_id}/position", get(get_position))
        .route("/users/{user_id}/transactions", get(list_transactions))
}
