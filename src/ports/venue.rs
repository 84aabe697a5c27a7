//! Liquidity venue and spot price reference.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Asset;
use crate::domain::WalletAddress;
use crate::error::GatewayError;

/// Venue answer to a quote request, before slippage is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueQuote {
    /// Output the venue expects to deliver for the requested input.
    pub amount_out: Decimal,
}

/// Unsigned call ready to hand to a [`crate::ports::WalletSigner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCall {
    /// Contract the call targets.
    pub target: WalletAddress,
    /// Hex-encoded calldata.
    pub calldata: String,
    /// Short label used in logs.
    pub description: String,
}

/// Parameters of an exact-input swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapCallRequest {
    /// Asset paid in.
    pub asset_in: Asset,
    /// Asset received.
    pub asset_out: Asset,
    /// Wallet that receives the output.
    pub recipient: WalletAddress,
    /// Exact input.
    pub amount_in: Decimal,
    /// Minimum output; the venue reverts below it.
    pub min_amount_out: Decimal,
    /// Venue-enforced deadline.
    pub deadline: DateTime<Utc>,
}

/// External liquidity venue.
#[async_trait]
pub trait LiquidityVenue: Send + Sync + fmt::Debug {
    /// Address that must be approved to pull the input token.
    fn spender(&self) -> WalletAddress;

    /// Expected output for `amount_in` of `asset_in`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::VenueUnavailable`] when the venue cannot
    /// answer.
    async fn quote(
        &self,
        asset_in: Asset,
        asset_out: Asset,
        amount_in: Decimal,
    ) -> Result<VenueQuote, GatewayError>;

    /// Builds an ERC-20 style approval of `amount` for `spender`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::VenueUnavailable`] when the call cannot be
    /// built.
    async fn build_approve_call(
        &self,
        token: Asset,
        spender: &WalletAddress,
        amount: Decimal,
    ) -> Result<ChainCall, GatewayError>;

    /// Builds the swap call.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::VenueUnavailable`] when the call cannot be
    /// built.
    async fn build_swap_call(&self, request: &SwapCallRequest) -> Result<ChainCall, GatewayError>;
}

/// Spot price source used for display, fallback estimates and gift
/// valuation. Never used to size an executable trade.
#[async_trait]
pub trait PriceReference: Send + Sync + fmt::Debug {
    /// Fiat price of one unit of `asset`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PriceUnavailable`] when no price is known.
    async fn spot_price(&self, asset: Asset) -> Result<Decimal, GatewayError>;
}
