//! Append-only ledger transaction records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::holding::{Applied, LedgerKind};
use super::{RecordId, TxId, TxRef, UserId};
use crate::decimal;

/// Final status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Movement applied to the holding.
    Completed,
    /// Movement attempted and abandoned; the holding was not touched.
    Failed,
}

impl TxStatus {
    /// Snake-case name, as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses the stored name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Immutable record of one buy, sell or gift movement, keyed by `tx_ref`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Row identifier.
    pub id: RecordId,
    /// Idempotency key.
    pub tx_ref: TxRef,
    /// Owner.
    pub user_id: UserId,
    /// Movement direction.
    pub kind: LedgerKind,
    /// Completed or failed.
    pub status: TxStatus,
    /// Gold-token quantity moved.
    pub amount_token: Decimal,
    /// Fiat paid, received, or frozen gift value.
    pub amount_fiat: Decimal,
    /// Fiat per token unit implied by the amounts.
    pub price_used: Option<Decimal>,
    /// Change in the holding's cost basis.
    pub cost_basis_delta: Decimal,
    /// Realized profit or loss (sells only).
    pub realized_pnl: Option<Decimal>,
    /// On-chain transaction hash, for swaps.
    pub chain_tx_hash: Option<TxId>,
    /// Failure reason, for failed records.
    pub error: Option<String>,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Time the movement completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// Record of a movement that was applied to the holding.
    #[must_use]
    pub fn completed(
        tx_ref: TxRef,
        kind: LedgerKind,
        amount_token: Decimal,
        amount_fiat: Decimal,
        applied: &Applied,
    ) -> Self {
        let now = applied.holding.updated_at;
        Self {
            id: RecordId::new(),
            tx_ref,
            user_id: applied.holding.user_id,
            kind,
            status: TxStatus::Completed,
            amount_token,
            amount_fiat,
            price_used: unit_price(amount_token, amount_fiat),
            cost_basis_delta: applied.cost_basis_delta,
            realized_pnl: applied.realized_pnl,
            chain_tx_hash: None,
            error: None,
            created_at: now,
            completed_at: Some(now),
        }
    }

    /// Record of a movement that never reached the holding.
    #[must_use]
    pub fn failed(
        user_id: UserId,
        tx_ref: TxRef,
        kind: LedgerKind,
        amount_token: Decimal,
        amount_fiat: Decimal,
        error: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            tx_ref,
            user_id,
            kind,
            status: TxStatus::Failed,
            amount_token,
            amount_fiat,
            price_used: unit_price(amount_token, amount_fiat),
            cost_basis_delta: Decimal::ZERO,
            realized_pnl: None,
            chain_tx_hash: None,
            error: Some(error.into()),
            created_at: now,
            completed_at: None,
        }
    }

    /// Attaches the on-chain transaction hash.
    #[must_use]
    pub fn with_chain_tx(mut self, tx_id: Option<TxId>) -> Self {
        self.chain_tx_hash = tx_id;
        self
    }
}

fn unit_price(amount_token: Decimal, amount_fiat: Decimal) -> Option<Decimal> {
    if amount_token.is_zero() {
        return None;
    }
    Some(decimal::round_fiat(amount_fiat / amount_token))
}
