//! Quote DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::decimal::Asset;
use crate::domain::{Quote, QuoteId, QuoteMode};

/// Request body for `POST /quotes`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteRequest {
    /// Asset paid in: `"stable"` to buy gold, `"gold"` to sell it.
    #[schema(value_type = String, example = "stable")]
    pub asset_in: Asset,
    /// Exact input amount (decimal string).
    #[schema(value_type = String, example = "10000")]
    pub amount_in: Decimal,
    /// Slippage tolerance in basis points. Defaults to the server setting.
    #[serde(default)]
    pub slippage_bps: Option<u16>,
    /// `"estimate"` (default) may fall back to spot prices;
    /// `"execution"` fails when the venue cannot quote.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "estimate")]
    pub mode: Option<QuoteMode>,
}

/// A quote as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    /// Quote identifier, usable once for a buy or sell.
    #[schema(value_type = String, format = Uuid)]
    pub quote_id: QuoteId,
    /// Asset paid in.
    #[schema(value_type = String)]
    pub asset_in: Asset,
    /// Asset received.
    #[schema(value_type = String)]
    pub asset_out: Asset,
    /// Exact input.
    #[schema(value_type = String)]
    pub amount_in: Decimal,
    /// Expected output.
    #[schema(value_type = String)]
    pub amount_out_expected: Decimal,
    /// Minimum output after slippage.
    #[schema(value_type = String)]
    pub min_amount_out: Decimal,
    /// Slippage tolerance applied.
    pub slippage_bps: u16,
    /// Venue fee estimate in the input asset.
    #[schema(value_type = String)]
    pub fee_estimate: Decimal,
    /// Fiat per gold unit implied by the quote.
    #[schema(value_type = Option<String>)]
    pub gold_price: Option<Decimal>,
    /// `true` when priced from the spot reference instead of the venue.
    /// Fallback quotes cannot be executed.
    pub fallback: bool,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// Expiry.
    pub valid_until: DateTime<Utc>,
}

impl From<&Quote> for QuoteResponse {
    fn from(quote: &Quote) -> Self {
        Self {
            quote_id: quote.id(),
            asset_in: quote.asset_in(),
            asset_out: quote.asset_out(),
            amount_in: quote.amount_in(),
            amount_out_expected: quote.amount_out_expected(),
            min_amount_out: quote.min_amount_out(),
            slippage_bps: quote.slippage_bps(),
            fee_estimate: quote.fee_estimate(),
            gold_price: quote.implied_gold_price(),
            fallback: quote.is_fallback(),
            created_at: quote.created_at(),
            valid_until: quote.valid_until(),
        }
    }
}
