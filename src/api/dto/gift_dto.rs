//! Gift DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::HoldingDto;
use crate::domain::{GiftEscrow, GiftStatus, UserId};
use crate::service::{ClaimedGift, GiftDelivery, SentGift};

/// Request body for `POST /users/{user_id}/gifts`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendGiftRequest {
    /// Gold-token quantity to send (decimal string).
    #[schema(value_type = String, example = "0.5")]
    pub amount_token: Decimal,
    /// Recipient email address.
    pub recipient_email: String,
    /// Optional note.
    #[serde(default)]
    pub message: Option<String>,
}

/// Response body for a sent gift.
#[derive(Debug, Serialize, ToSchema)]
pub struct SendGiftResponse {
    /// Gift identifier.
    pub gift_id: String,
    /// Quantity sent.
    #[schema(value_type = String)]
    pub amount_token: Decimal,
    /// Fiat value frozen at send time.
    #[schema(value_type = String)]
    pub amount_fiat: Decimal,
    /// `"direct"` for a known recipient, `"escrowed"` otherwise.
    pub delivery: String,
    /// Credited user, for direct gifts.
    #[schema(value_type = Option<String>, format = Uuid)]
    pub recipient_id: Option<UserId>,
    /// Claim token to hand to the recipient, for escrowed gifts.
    pub claim_token: Option<String>,
    /// End of the claim window, for escrowed gifts.
    pub expires_at: Option<DateTime<Utc>>,
    /// Sender's holding after the debit.
    pub sender_holding: HoldingDto,
}

impl From<&SentGift> for SendGiftResponse {
    fn from(sent: &SentGift) -> Self {
        let (delivery, recipient_id, claim_token, expires_at) = match &sent.delivery {
            GiftDelivery::Direct { recipient_id } => ("direct", Some(*recipient_id), None, None),
            GiftDelivery::Escrowed {
                claim_token,
                expires_at,
            } => (
                "escrowed",
                None,
                Some(claim_token.as_str().to_string()),
                Some(*expires_at),
            ),
        };
        Self {
            gift_id: sent.gift_id.to_string(),
            amount_token: sent.amount_token,
            amount_fiat: sent.amount_fiat,
            delivery: delivery.to_string(),
            recipient_id,
            claim_token,
            expires_at,
            sender_holding: HoldingDto::from(&sent.sender_holding),
        }
    }
}

/// Request body for `POST /gifts/claim`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ClaimGiftRequest {
    /// Claim token from the gift notification.
    pub claim_token: String,
    /// User claiming the gift.
    #[schema(value_type = String, format = Uuid)]
    pub user_id: UserId,
}

/// A gift as seen by its sender or claimer. The claim token is never
/// listed.
#[derive(Debug, Serialize, ToSchema)]
pub struct GiftDto {
    /// Gift identifier.
    pub gift_id: String,
    /// Sender.
    #[schema(value_type = String, format = Uuid)]
    pub sender_id: UserId,
    /// Recipient email.
    pub recipient_email: String,
    /// Quantity.
    #[schema(value_type = String)]
    pub amount_token: Decimal,
    /// Frozen fiat value.
    #[schema(value_type = String)]
    pub amount_fiat: Decimal,
    /// Sender note.
    pub message: Option<String>,
    /// `delivered`, `claimed` or `expired`.
    #[schema(value_type = String)]
    pub status: GiftStatus,
    /// Claimer.
    #[schema(value_type = Option<String>, format = Uuid)]
    pub claimed_by: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Claim window end.
    pub expires_at: DateTime<Utc>,
    /// Claim or expiry time.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<&GiftEscrow> for GiftDto {
    fn from(gift: &GiftEscrow) -> Self {
        Self {
            gift_id: gift.id.to_string(),
            sender_id: gift.sender_id,
            recipient_email: gift.recipient_email.clone(),
            amount_token: gift.amount_token,
            amount_fiat: gift.amount_fiat,
            message: gift.message.clone(),
            status: gift.status,
            claimed_by: gift.claimed_by,
            created_at: gift.created_at,
            expires_at: gift.expires_at,
            resolved_at: gift.resolved_at,
        }
    }
}

/// Response body for a claimed gift.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClaimGiftResponse {
    /// The claimed gift.
    pub gift: GiftDto,
    /// Claimer's holding after the credit.
    pub holding: HoldingDto,
}

impl From<&ClaimedGift> for ClaimGiftResponse {
    fn from(claimed: &ClaimedGift) -> Self {
        Self {
            gift: GiftDto::from(&claimed.gift),
            holding: HoldingDto::from(&claimed.holding),
        }
    }
}

/// Response body for `GET /users/{user_id}/gifts`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GiftListResponse {
    /// Gifts sent by the user, newest first.
    pub data: Vec<GiftDto>,
}
