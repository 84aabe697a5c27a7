//! Buy and sell DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{HoldingDto, QuoteResponse, TransactionDto};
use crate::domain::{QuoteId, SwapState};
use crate::service::{TradeOutcome, TradeRequest};

/// Request body for `POST /users/{user_id}/buy` and `/sell`.
///
/// Send either `quote_id` from `POST /quotes`, or `amount` to quote and
/// execute in one call.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TradeRequestDto {
    /// Previously issued quote.
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub quote_id: Option<QuoteId>,
    /// Input amount: stablecoin for a buy, gold for a sell (decimal string).
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "10000")]
    pub amount: Option<Decimal>,
    /// Slippage tolerance in basis points when quoting inline.
    #[serde(default)]
    pub slippage_bps: Option<u16>,
}

impl From<TradeRequestDto> for TradeRequest {
    fn from(dto: TradeRequestDto) -> Self {
        Self {
            quote_id: dto.quote_id,
            amount_in: dto.amount,
            slippage_bps: dto.slippage_bps,
        }
    }
}

/// Response body for a settled buy or sell.
#[derive(Debug, Serialize, ToSchema)]
pub struct TradeResponse {
    /// Execution identifier.
    pub execution_id: String,
    /// Terminal execution state.
    #[schema(value_type = String)]
    pub state: SwapState,
    /// `true` when the existing allowance covered the swap.
    pub approval_skipped: bool,
    /// Approval transaction, when one was sent.
    pub approval_tx_id: Option<String>,
    /// Swap transaction.
    pub swap_tx_id: Option<String>,
    /// Output read from the chain receipt.
    #[schema(value_type = Option<String>)]
    pub amount_out: Option<Decimal>,
    /// Quote that was executed.
    pub quote: QuoteResponse,
    /// Holding after reconciliation.
    pub holding: HoldingDto,
    /// Ledger record of the trade.
    pub transaction: TransactionDto,
    /// `true` when this swap had already been reconciled.
    pub already_processed: bool,
}

impl From<&TradeOutcome> for TradeResponse {
    fn from(outcome: &TradeOutcome) -> Self {
        let execution = &outcome.execution;
        Self {
            execution_id: execution.id.to_string(),
            state: execution.state,
            approval_skipped: execution.approval_skipped,
            approval_tx_id: execution.approval_tx_id.as_ref().map(ToString::to_string),
            swap_tx_id: execution.swap_tx_id.as_ref().map(ToString::to_string),
            amount_out: execution.amount_out_actual,
            quote: QuoteResponse::from(&outcome.quote),
            holding: HoldingDto::from(&outcome.holding),
            transaction: TransactionDto::from(&outcome.record),
            already_processed: outcome.already_processed,
        }
    }
}
