//! Database rows for holdings, transaction records and gift escrows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    ClaimToken, GiftEscrow, GiftId, GiftStatus, Holding, LedgerKind, RecordId, TransactionRecord,
    TxId, TxRef, TxStatus, UserId,
};
use crate::ports::StoreError;

/// A row from the `holdings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HoldingRow {
    /// Owner.
    pub user_id: Uuid,
    /// Gold-token units.
    pub quantity: Decimal,
    /// Cost basis.
    pub total_invested: Decimal,
    /// Cumulative realized P&L.
    pub realized_pnl: Decimal,
    /// Optimistic-concurrency version.
    pub version: i64,
    /// Last reconciliation.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<HoldingRow> for Holding {
    type Error = StoreError;

    fn try_from(row: HoldingRow) -> Result<Self, Self::Error> {
        let version = u64::try_from(row.version)
            .map_err(|_| StoreError::Backend(format!("negative holding version {}", row.version)))?;
        Ok(Self {
            user_id: UserId::from_uuid(row.user_id),
            quantity: row.quantity,
            total_invested: row.total_invested,
            realized_pnl: row.realized_pnl,
            version,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `transactions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    /// Row identifier.
    pub id: Uuid,
    /// Idempotency key.
    pub tx_ref: String,
    /// Owner.
    pub user_id: Uuid,
    /// `buy`, `sell`, `gift_out` or `gift_in`.
    pub kind: String,
    /// `completed` or `failed`.
    pub status: String,
    /// Gold-token quantity.
    pub amount_token: Decimal,
    /// Fiat amount.
    pub amount_fiat: Decimal,
    /// Implied price.
    pub price_used: Option<Decimal>,
    /// Cost-basis change.
    pub cost_basis_delta: Decimal,
    /// Realized P&L, sells only.
    pub realized_pnl: Option<Decimal>,
    /// Chain transaction hash.
    pub chain_tx_hash: Option<String>,
    /// Failure reason.
    pub error: Option<String>,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let kind = LedgerKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Backend(format!("unknown ledger kind '{}'", row.kind)))?;
        let status = TxStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown record status '{}'", row.status)))?;
        Ok(Self {
            id: RecordId::from_uuid(row.id),
            tx_ref: TxRef::new(row.tx_ref),
            user_id: UserId::from_uuid(row.user_id),
            kind,
            status,
            amount_token: row.amount_token,
            amount_fiat: row.amount_fiat,
            price_used: row.price_used,
            cost_basis_delta: row.cost_basis_delta,
            realized_pnl: row.realized_pnl,
            chain_tx_hash: row.chain_tx_hash.map(TxId::new),
            error: row.error,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// A row from the `gift_escrows` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GiftEscrowRow {
    /// Escrow identifier.
    pub id: Uuid,
    /// Claim token.
    pub claim_token: String,
    /// Sender.
    pub sender_id: Uuid,
    /// Recipient email.
    pub recipient_email: String,
    /// Gold-token quantity.
    pub amount_token: Decimal,
    /// Frozen fiat value.
    pub amount_fiat: Decimal,
    /// Sender note.
    pub message: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
    /// `delivered`, `claimed` or `expired`.
    pub status: String,
    /// Claimer.
    pub claimed_by: Option<Uuid>,
    /// Claim or expiry time.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<GiftEscrowRow> for GiftEscrow {
    type Error = StoreError;

    fn try_from(row: GiftEscrowRow) -> Result<Self, Self::Error> {
        let status = GiftStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown gift status '{}'", row.status)))?;
        Ok(Self {
            id: GiftId::from_uuid(row.id),
            claim_token: ClaimToken::new(row.claim_token),
            sender_id: UserId::from_uuid(row.sender_id),
            recipient_email: row.recipient_email,
            amount_token: row.amount_token,
            amount_fiat: row.amount_fiat,
            message: row.message,
            created_at: row.created_at,
            expires_at: row.expires_at,
            status,
            claimed_by: row.claimed_by.map(UserId::from_uuid),
            resolved_at: row.resolved_at,
        })
    }
}
