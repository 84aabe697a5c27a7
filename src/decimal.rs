//! Exact decimal arithmetic for fiat amounts and gold-token quantities.
//!
//! Every amount in the ledger is a [`rust_decimal::Decimal`]. Each [`Asset`]
//! carries a fixed scale (6 places for the gold token, 2 for fiat-equivalent
//! stablecoin amounts) and every product or quotient is rounded back to that
//! scale before it is stored or compared. Binary floats never touch money.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Decimal places kept for gold-token quantities.
pub const TOKEN_SCALE: u32 = 6;

/// Decimal places kept for fiat-equivalent amounts.
pub const FIAT_SCALE: u32 = 2;

/// Basis-point denominator (100% = 10 000 bps).
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Upper bound accepted for any single user-supplied amount.
const MAX_AMOUNT: Decimal = dec!(1000000000000);

/// The two assets the exchange moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    /// Gold-backed token (6 decimals on chain).
    Gold,
    /// Fiat-equivalent stablecoin, accounted at 2 decimals.
    Stable,
}

impl Asset {
    /// Decimal places used when rounding amounts of this asset.
    #[must_use]
    pub const fn scale(self) -> u32 {
        match self {
            Self::Gold => TOKEN_SCALE,
            Self::Stable => FIAT_SCALE,
        }
    }

    /// Ticker symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Gold => "XAUT",
            Self::Stable => "USDT",
        }
    }

    /// The asset on the other side of a swap.
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Gold => Self::Stable,
            Self::Stable => Self::Gold,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Asset {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gold" | "xaut" => Ok(Self::Gold),
            "stable" | "usdt" => Ok(Self::Stable),
            other => Err(GatewayError::InvalidRequest(format!("unknown asset: {other}"))),
        }
    }
}

/// Rounds `value` to the asset's scale, midpoint to even.
#[must_use]
pub fn round_to(asset: Asset, value: Decimal) -> Decimal {
    value.round_dp_with_strategy(asset.scale(), RoundingStrategy::MidpointNearestEven)
}

/// Truncates `value` toward zero at the asset's scale.
///
/// Used for minimum-output bounds, which must never be rounded up.
#[must_use]
pub fn truncate_to(asset: Asset, value: Decimal) -> Decimal {
    value.round_dp_with_strategy(asset.scale(), RoundingStrategy::ToZero)
}

/// Rounds a fiat-equivalent amount to [`FIAT_SCALE`].
#[must_use]
pub fn round_fiat(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FIAT_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Rounds a gold-token quantity to [`TOKEN_SCALE`].
#[must_use]
pub fn round_token(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(TOKEN_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// `amount * (1 - bps / 10000)`, truncated at the asset's scale.
#[must_use]
pub fn less_bps(asset: Asset, amount: Decimal, bps: u16) -> Decimal {
    let keep = Decimal::from(BPS_DENOMINATOR.saturating_sub(bps));
    truncate_to(asset, amount * keep / Decimal::from(BPS_DENOMINATOR))
}

/// `amount * bps / 10000`, rounded at the asset's scale.
#[must_use]
pub fn bps_of(asset: Asset, amount: Decimal, bps: u16) -> Decimal {
    round_to(asset, amount * Decimal::from(bps) / Decimal::from(BPS_DENOMINATOR))
}

/// Checks that `value` is a strictly positive amount representable at the
/// asset's scale.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidAmount`] if the value is zero, negative,
/// above the accepted maximum, or carries more decimals than the asset allows.
pub fn validate_amount(asset: Asset, value: Decimal) -> Result<Decimal, GatewayError> {
    if value <= Decimal::ZERO {
        return Err(GatewayError::InvalidAmount(format!(
            "{asset} amount must be positive, got {value}"
        )));
    }
    if value > MAX_AMOUNT {
        return Err(GatewayError::InvalidAmount(format!(
            "{asset} amount {value} exceeds maximum {MAX_AMOUNT}"
        )));
    }
    if value.normalize().scale() > asset.scale() {
        return Err(GatewayError::InvalidAmount(format!(
            "{asset} amount {value} has more than {} decimal places",
            asset.scale()
        )));
    }
    Ok(value)
}

/// Parses a string-encoded amount and validates it for `asset`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidAmount`] if the string is not a decimal
/// number or fails [`validate_amount`].
pub fn parse_amount(asset: Asset, raw: &str) -> Result<Decimal, GatewayError> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|_| GatewayError::InvalidAmount(format!("not a decimal amount: {raw}")))?;
    validate_amount(asset, value)
}
