//! Time-boxed, immutable swap quotes.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::QuoteId;
use crate::decimal::{self, Asset};

/// Whether the caller intends to execute the quote or only display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteMode {
    /// Quote will be handed to the executor; venue failures are errors.
    Execution,
    /// Display-only; a spot-price fallback is acceptable.
    Estimate,
}

/// A time-boxed estimate of how much `asset_out` a given `amount_in` yields.
///
/// `min_amount_out` is fixed at construction as
/// `amount_out_expected * (1 - slippage_bps / 10000)`, truncated at the output
/// asset's scale. Fields are private so a quote cannot be altered after
/// issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    id: QuoteId,
    asset_in: Asset,
    asset_out: Asset,
    amount_in: Decimal,
    amount_out_expected: Decimal,
    min_amount_out: Decimal,
    slippage_bps: u16,
    fee_estimate: Decimal,
    created_at: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    is_fallback: bool,
}

impl Quote {
    /// Builds a venue-backed quote issued at `issued_at`, valid for `ttl`.
    #[must_use]
    pub fn new(
        pair: (Asset, Asset),
        amount_in: Decimal,
        amount_out_expected: Decimal,
        slippage_bps: u16,
        fee_estimate: Decimal,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let (asset_in, asset_out) = pair;
        let amount_out_expected = decimal::round_to(asset_out, amount_out_expected);
        Self {
            id: QuoteId::new(),
            asset_in,
            asset_out,
            amount_in,
            amount_out_expected,
            min_amount_out: decimal::less_bps(asset_out, amount_out_expected, slippage_bps),
            slippage_bps,
            fee_estimate,
            created_at: issued_at,
            valid_until: issued_at + ttl,
            is_fallback: false,
        }
    }

    /// Marks the quote as a spot-price fallback. Fallback quotes are never
    /// executable.
    #[must_use]
    pub fn into_fallback(mut self) -> Self {
        self.is_fallback = true;
        self
    }

    /// Quote identifier.
    #[must_use]
    pub const fn id(&self) -> QuoteId {
        self.id
    }

    /// Asset paid in.
    #[must_use]
    pub const fn asset_in(&self) -> Asset {
        self.asset_in
    }

    /// Asset received.
    #[must_use]
    pub const fn asset_out(&self) -> Asset {
        self.asset_out
    }

    /// Input amount.
    #[must_use]
    pub const fn amount_in(&self) -> Decimal {
        self.amount_in
    }

    /// Output the venue expects to deliver.
    #[must_use]
    pub const fn amount_out_expected(&self) -> Decimal {
        self.amount_out_expected
    }

    /// Slippage-adjusted minimum sent on-chain.
    #[must_use]
    pub const fn min_amount_out(&self) -> Decimal {
        self.min_amount_out
    }

    /// Slippage tolerance in basis points.
    #[must_use]
    pub const fn slippage_bps(&self) -> u16 {
        self.slippage_bps
    }

    /// Estimated venue fee, denominated in the input asset.
    #[must_use]
    pub const fn fee_estimate(&self) -> Decimal {
        self.fee_estimate
    }

    /// Issuance time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last instant at which the quote may be consumed.
    #[must_use]
    pub const fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    /// `true` for spot-price fallback estimates.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    /// `true` once `now` is past `valid_until`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }

    /// Gold price in fiat implied by the expected output, if computable.
    #[must_use]
    pub fn implied_gold_price(&self) -> Option<Decimal> {
        let (fiat, gold) = match self.asset_in {
            Asset::Stable => (self.amount_in, self.amount_out_expected),
            Asset::Gold => (self.amount_out_expected, self.amount_in),
        };
        if gold.is_zero() {
            return None;
        }
        Some(decimal::round_fiat(fiat / gold))
    }
}
