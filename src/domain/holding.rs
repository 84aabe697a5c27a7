//! Per-user gold holding and the arithmetic of ledger movements.
//!
//! Cost basis follows the weighted-average method: buys add their fiat cost,
//! sells remove cost in proportion to the quantity sold so the average price
//! of what remains is unchanged.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::decimal::{self, Asset};
use crate::error::GatewayError;

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Stablecoin swapped into gold.
    Buy,
    /// Gold swapped back into stablecoin.
    Sell,
    /// Gold leaving the user as a gift.
    GiftOut,
    /// Gold arriving as a gift (or a gift refund).
    GiftIn,
}

impl LedgerKind {
    /// `true` for movements that add quantity.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(self, Self::Buy | Self::GiftIn)
    }

    /// Snake-case name, as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::GiftOut => "gift_out",
            Self::GiftIn => "gift_in",
        }
    }

    /// Parses the stored name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            "gift_out" => Some(Self::GiftOut),
            "gift_in" => Some(Self::GiftIn),
            _ => None,
        }
    }
}

/// Aggregate gold position of one user.
///
/// `quantity` and `total_invested` are never negative. `version` is the
/// optimistic-concurrency stamp; 0 means the holding has never been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    /// Owner.
    pub user_id: UserId,
    /// Gold-token units held.
    pub quantity: Decimal,
    /// Fiat cost basis of `quantity`.
    pub total_invested: Decimal,
    /// Cumulative realized profit or loss from sells.
    pub realized_pnl: Decimal,
    /// Optimistic-concurrency version.
    pub version: u64,
    /// Time of the last reconciliation.
    pub updated_at: DateTime<Utc>,
}

/// Result of applying one movement to a holding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Holding after the movement, with `version` bumped.
    pub holding: Holding,
    /// Change in cost basis (positive for credits, negative for debits).
    pub cost_basis_delta: Decimal,
    /// Realized profit or loss, for sells only.
    pub realized_pnl: Option<Decimal>,
}

impl Holding {
    /// Zero holding for a user that has never traded.
    #[must_use]
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            quantity: Decimal::ZERO,
            total_invested: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Weighted average fiat price per unit; `None` when nothing is held.
    #[must_use]
    pub fn avg_price(&self) -> Option<Decimal> {
        if self.quantity.is_zero() {
            return None;
        }
        Some(decimal::round_fiat(self.total_invested / self.quantity))
    }

    /// Computes the holding after a movement without mutating `self`.
    ///
    /// `amount_fiat` is the fiat paid (Buy), received (Sell) or the value
    /// frozen at gift creation (GiftOut/GiftIn).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidAmount`] for a token amount that is
    /// not positive after rounding or a negative fiat amount, and
    /// [`GatewayError::InsufficientBalance`] when a debit exceeds `quantity`.
    pub fn apply(
        &self,
        kind: LedgerKind,
        amount_token: Decimal,
        amount_fiat: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Applied, GatewayError> {
        if amount_token <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount(format!(
                "token amount must be positive, got {amount_token}"
            )));
        }
        if amount_fiat < Decimal::ZERO {
            return Err(GatewayError::InvalidAmount(format!(
                "fiat amount must not be negative, got {amount_fiat}"
            )));
        }
        let amount_token = decimal::round_to(Asset::Gold, amount_token);
        let amount_fiat = decimal::round_fiat(amount_fiat);
        if amount_token.is_zero() {
            return Err(GatewayError::InvalidAmount(format!(
                "token amount rounds to zero at {} decimals",
                Asset::Gold.scale()
            )));
        }

        let mut next = self.clone();
        next.version = self.version.saturating_add(1);
        next.updated_at = at;

        if kind.is_credit() {
            next.quantity = self.quantity + amount_token;
            next.total_invested = self.total_invested + amount_fiat;
            return Ok(Applied {
                holding: next,
                cost_basis_delta: amount_fiat,
                realized_pnl: None,
            });
        }

        if amount_token > self.quantity {
            return Err(GatewayError::InsufficientBalance {
                requested: amount_token,
                available: self.quantity,
            });
        }

        // Cost leaves in proportion to quantity, computed before the
        // quantity shrinks.
        let cost_removed = if amount_token == self.quantity {
            self.total_invested
        } else {
            decimal::round_fiat(self.total_invested * amount_token / self.quantity)
        };
        next.quantity = self.quantity - amount_token;
        next.total_invested = (self.total_invested - cost_removed).max(Decimal::ZERO);
        if next.quantity.is_zero() {
            next.total_invested = Decimal::ZERO;
        }

        let realized_pnl = match kind {
            LedgerKind::Sell => {
                let pnl = amount_fiat - cost_removed;
                next.realized_pnl = self.realized_pnl + pnl;
                Some(pnl)
            }
            _ => None,
        };

        Ok(Applied {
            holding: next,
            cost_basis_delta: -cost_removed,
            realized_pnl,
        })
    }
}
