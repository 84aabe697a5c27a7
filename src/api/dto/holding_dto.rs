//! Holding, position and transaction history DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::PaginationMeta;
use crate::domain::{Holding, LedgerKind, TransactionRecord, TxStatus, UserId};
use crate::service::Position;

/// A user's gold holding.
#[derive(Debug, Serialize, ToSchema)]
pub struct HoldingDto {
    /// Owner.
    #[schema(value_type = String, format = Uuid)]
    pub user_id: UserId,
    /// Gold-token units held.
    #[schema(value_type = String, example = "1.428571")]
    pub quantity: Decimal,
    /// Fiat cost basis.
    #[schema(value_type = String, example = "10000.00")]
    pub total_invested: Decimal,
    /// `total_invested / quantity`; absent for an empty holding.
    #[schema(value_type = Option<String>)]
    pub avg_price: Option<Decimal>,
    /// Cumulative realized profit or loss.
    #[schema(value_type = String)]
    pub realized_pnl: Decimal,
    /// Optimistic-concurrency version.
    pub version: u64,
    /// Last reconciliation.
    pub updated_at: DateTime<Utc>,
}

impl From<&Holding> for HoldingDto {
    fn from(holding: &Holding) -> Self {
        Self {
            user_id: holding.user_id,
            quantity: holding.quantity,
            total_invested: holding.total_invested,
            avg_price: holding.avg_price(),
            realized_pnl: holding.realized_pnl,
            version: holding.version,
            updated_at: holding.updated_at,
        }
    }
}

/// Holding valued at the current spot price.
#[derive(Debug, Serialize, ToSchema)]
pub struct PositionDto {
    /// Holding.
    pub holding: HoldingDto,
    /// Gold spot price; absent when no price source answered.
    #[schema(value_type = Option<String>)]
    pub spot_price: Option<Decimal>,
    /// `quantity * spot_price`.
    #[schema(value_type = Option<String>)]
    pub market_value: Option<Decimal>,
    /// `market_value - total_invested`.
    #[schema(value_type = Option<String>)]
    pub unrealized_pnl: Option<Decimal>,
}

impl From<&Position> for PositionDto {
    fn from(position: &Position) -> Self {
        Self {
            holding: HoldingDto::from(&position.holding),
            spot_price: position.spot_price,
            market_value: position.market_value,
            unrealized_pnl: position.unrealized_pnl,
        }
    }
}

/// One ledger transaction record.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionDto {
    /// Record identifier.
    pub id: String,
    /// Idempotency key.
    pub tx_ref: String,
    /// `buy`, `sell`, `gift_out` or `gift_in`.
    #[schema(value_type = String)]
    pub kind: LedgerKind,
    /// `completed` or `failed`.
    #[schema(value_type = String)]
    pub status: TxStatus,
    /// Gold-token quantity.
    #[schema(value_type = String)]
    pub amount_token: Decimal,
    /// Fiat amount.
    #[schema(value_type = String)]
    pub amount_fiat: Decimal,
    /// Implied price.
    #[schema(value_type = Option<String>)]
    pub price_used: Option<Decimal>,
    /// Change in cost basis.
    #[schema(value_type = String)]
    pub cost_basis_delta: Decimal,
    /// Realized P&L of a sell.
    #[schema(value_type = Option<String>)]
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

impl From<&TransactionRecord> for TransactionDto {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            id: record.id.to_string(),
            tx_ref: record.tx_ref.to_string(),
            kind: record.kind,
            status: record.status,
            amount_token: record.amount_token,
            amount_fiat: record.amount_fiat,
            price_used: record.price_used,
            cost_basis_delta: record.cost_basis_delta,
            realized_pnl: record.realized_pnl,
            chain_tx_hash: record.chain_tx_hash.as_ref().map(ToString::to_string),
            error: record.error.clone(),
            created_at: record.created_at,
            completed_at: record.completed_at,
        }
    }
}

/// Response body for `GET /users/{user_id}/transactions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    /// Records on this page, newest first.
    pub data: Vec<TransactionDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
