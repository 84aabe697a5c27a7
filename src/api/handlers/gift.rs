//! Gift handlers: send, list, claim.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{
    ClaimGiftRequest, ClaimGiftResponse, GiftDto, GiftListResponse, SendGiftRequest,
    SendGiftResponse,
};
use crate::app_state::AppState;
use crate::domain::{ClaimToken, UserId};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /users/{user_id}/gifts` — Send gold to an email address.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid input or insufficient holding.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/gifts",
    tag = "Gifts",
    summary = "Send a gift",
    description = "Debits the sender and either credits a registered recipient immediately or parks the gold in escrow behind a claim token. The gift's fiat value is frozen at the current spot price.",
    params(
        ("user_id" = uuid::Uuid, Path, description = "Sender UUID"),
    ),
    request_body = SendGiftRequest,
    responses(
        (status = 201, description = "Gift sent", body = SendGiftResponse),
        (status = 400, description = "Invalid amount or recipient", body = ErrorResponse),
        (status = 422, description = "Insufficient holding", body = ErrorResponse),
    )
)]
pub async fn send_gift(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
    Json(req): Json<SendGiftRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let sent = state
        .gifts
        .send_gift(
            UserId::from_uuid(user_id),
            req.amount_token,
            &req.recipient_email,
            req.message,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(SendGiftResponse::from(&sent))))
}

/// `GET /users/{user_id}/gifts` — Gifts sent by a user.
///
/// # Errors
///
/// Returns [`GatewayError::PersistenceError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/gifts",
    tag = "Gifts",
    summary = "List sent gifts",
    description = "Returns every gift the user sent, newest first. Escrows past their claim window are reported as expired.",
    params(
        ("user_id" = uuid::Uuid, Path, description = "Sender UUID"),
    ),
    responses(
        (status = 200, description = "Sent gifts", body = GiftListResponse),
    )
)]
pub async fn list_gifts(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let gifts = state.gifts.gifts_sent(UserId::from_uuid(user_id)).await?;
    Ok(Json(GiftListResponse {
        data: gifts.iter().map(GiftDto::from).collect(),
    }))
}

/// `POST /gifts/claim` — Claim an escrowed gift.
///
/// # Errors
///
/// Returns [`GatewayError::GiftNotFound`], [`GatewayError::AlreadyClaimed`]
/// or [`GatewayError::GiftExpired`].
#[utoipa::path(
    post,
    path = "/api/v1/gifts/claim",
    tag = "Gifts",
    summary = "Claim a gift",
    description = "Credits the escrowed gold to the claiming user at the gift's frozen value. Each token can be claimed once.",
    request_body = ClaimGiftRequest,
    responses(
        (status = 200, description = "Gift claimed", body = ClaimGiftResponse),
        (status = 404, description = "Unknown claim token", body = ErrorResponse),
        (status = 409, description = "Already claimed", body = ErrorResponse),
        (status = 410, description = "Claim window closed", body = ErrorResponse),
    )
)]
pub async fn claim_gift(
    State(state): State<AppState>,
    Json(req): Json<ClaimGiftRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let claimed = state
        .gifts
        .claim_gift(&ClaimToken::new(req.claim_token), req.user_id)
        .await?;
    Ok(Json(ClaimGiftResponse::from(&claimed)))
}

/// Gift routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}/gifts", post(send_gift).get(list_gifts))
        .route("/gifts/claim", post(claim_gift))
}
