//! Custodial gift escrow.
//!
//! A gift to an email with no known ledger user is debited from the sender
//! and parked in a [`GiftEscrow`] until someone presents its claim token.
//! Expiry is evaluated lazily when the escrow is observed.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ClaimToken, GiftId, UserId};

/// Escrow lifecycle: `Delivered → Claimed` or `Delivered → Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiftStatus {
    /// Funded and waiting for a claim.
    Delivered,
    /// Credited to a claimer.
    Claimed,
    /// Observed after `expires_at` without a claim.
    Expired,
}

impl GiftStatus {
    /// Snake-case name, as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Claimed => "claimed",
            Self::Expired => "expired",
        }
    }

    /// Parses the stored name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "delivered" => Some(Self::Delivered),
            "claimed" => Some(Self::Claimed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Gold held in custody pending a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftEscrow {
    /// Escrow identifier.
    pub id: GiftId,
    /// Single-use claim token handed to the recipient.
    pub claim_token: ClaimToken,
    /// Sender whose holding funded the escrow.
    pub sender_id: UserId,
    /// Address the claim link was sent to.
    pub recipient_email: String,
    /// Gold-token quantity held.
    pub amount_token: Decimal,
    /// Fiat value frozen at creation; becomes the claimer's cost basis.
    pub amount_fiat: Decimal,
    /// Optional note from the sender.
    pub message: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Claims after this instant are rejected.
    pub expires_at: DateTime<Utc>,
    /// Current status.
    pub status: GiftStatus,
    /// Claimer, once claimed.
    pub claimed_by: Option<UserId>,
    /// Time of the claim or expiry transition.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl GiftEscrow {
    /// Opens a funded escrow with a fresh claim token.
    #[must_use]
    pub fn new(
        id: GiftId,
        sender_id: UserId,
        recipient_email: String,
        amounts: (Decimal, Decimal),
        message: Option<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        let (amount_token, amount_fiat) = amounts;
        Self {
            id,
            claim_token: ClaimToken::generate(),
            sender_id,
            recipient_email,
            amount_token,
            amount_fiat,
            message,
            created_at: now,
            expires_at: now + ttl,
            status: GiftStatus::Delivered,
            claimed_by: None,
            resolved_at: None,
        }
    }

    /// `true` once `now` is past `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_escrow_is_delivered_with_token() {
        let escrow = GiftEscrow::new(
            GiftId::new(),
            UserId::new(),
            "friend@example.com".to_string(),
            (dec!(0.1), dec!(700)),
            None,
            Duration::days(7),
        );
        assert_eq!(escrow.status, GiftStatus::Delivered);
        assert_eq!(escrow.claim_token.as_str().len(), 64);
        assert!(!escrow.is_expired_at(Utc::now()));
        assert!(escrow.is_expired_at(escrow.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn status_names_round_trip() {
        for status in [GiftStatus::Delivered, GiftStatus::Claimed, GiftStatus::Expired] {
            assert_eq!(GiftStatus::parse(status.as_str()), Some(status));
        }
    }
}
