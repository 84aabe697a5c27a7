//! Quote engine: venue pricing with slippage and a spot-price fallback.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::config::QuoteConfig;
use crate::decimal::{self, Asset};
use crate::domain::{Quote, QuoteMode};
use crate::error::GatewayError;
use crate::ports::{LiquidityVenue, PriceReference};

/// Produces immutable, time-boxed [`Quote`]s.
///
/// Holds no state between calls. Execution quotes come only from the
/// venue; estimate quotes fall back to the spot price reference and are
/// flagged so the executor refuses them.
#[derive(Debug, Clone)]
pub struct QuoteEngine {
    venue: Arc<dyn LiquidityVenue>,
    prices: Arc<dyn PriceReference>,
    config: QuoteConfig,
}

impl QuoteEngine {
    /// Creates a new `QuoteEngine`.
    #[must_use]
    pub fn new(
        venue: Arc<dyn LiquidityVenue>,
        prices: Arc<dyn PriceReference>,
        config: QuoteConfig,
    ) -> Self {
        Self {
            venue,
            prices,
            config,
        }
    }

    /// Engine settings.
    #[must_use]
    pub const fn config(&self) -> &QuoteConfig {
        &self.config
    }

    /// Quotes `amount_in` of `asset_in` into `asset_out`.
    ///
    /// `slippage_bps` defaults to the configured value when `None`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidAmount`] for a non-positive or over-precise
    ///   amount.
    /// - [`GatewayError::InvalidRequest`] for identical assets or a slippage
    ///   above the configured maximum.
    /// - [`GatewayError::VenueUnavailable`] when the venue fails in
    ///   [`QuoteMode::Execution`].
    /// - [`GatewayError::PriceUnavailable`] when neither the venue nor the
    ///   price reference can answer in [`QuoteMode::Estimate`].
    pub async fn get_quote(
        &self,
        asset_in: Asset,
        asset_out: Asset,
        amount_in: Decimal,
        slippage_bps: Option<u16>,
        mode: QuoteMode,
    ) -> Result<Quote, GatewayError> {
        let amount_in = decimal::validate_amount(asset_in, amount_in)?;
        if asset_in == asset_out {
            return Err(GatewayError::InvalidRequest(format!(
                "cannot swap {asset_in} into itself"
            )));
        }
        let slippage_bps = slippage_bps.unwrap_or(self.config.default_slippage_bps);
        if slippage_bps > self.config.max_slippage_bps {
            return Err(GatewayError::InvalidRequest(format!(
                "slippage {slippage_bps} bps exceeds maximum {} bps",
                self.config.max_slippage_bps
            )));
        }

        let ttl = chrono::Duration::from_std(self.config.ttl)
            .map_err(|e| GatewayError::Internal(format!("quote ttl out of range: {e}")))?;
        let fee_estimate = decimal::bps_of(asset_in, amount_in, self.config.venue_fee_bps);
        let issued_at = Utc::now();
        let pair = (asset_in, asset_out);

        let timeout = self.config.venue_timeout.min(self.config.ttl);
        let venue_answer =
            tokio::time::timeout(timeout, self.venue.quote(asset_in, asset_out, amount_in)).await;
        let failure = match venue_answer {
            Ok(Ok(answer)) if answer.amount_out > Decimal::ZERO => {
                let quote = Quote::new(
                    pair,
                    amount_in,
                    answer.amount_out,
                    slippage_bps,
                    fee_estimate,
                    issued_at,
                    ttl,
                );
                tracing::debug!(
                    quote_id = %quote.id(),
                    %asset_in,
                    %asset_out,
                    %amount_in,
                    amount_out = %quote.amount_out_expected(),
                    "venue quote issued"
                );
                return Ok(quote);
            }
            Ok(Ok(answer)) => format!("venue quoted non-positive output {}", answer.amount_out),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("venue did not answer within {timeout:?}"),
        };

        if mode == QuoteMode::Execution {
            tracing::warn!(%asset_in, %asset_out, %amount_in, reason = %failure, "venue quote failed");
            return Err(GatewayError::VenueUnavailable(failure));
        }

        let spot_in = self.prices.spot_price(asset_in).await?;
        let spot_out = self.prices.spot_price(asset_out).await?;
        if spot_out <= Decimal::ZERO {
            return Err(GatewayError::PriceUnavailable(format!(
                "non-positive spot price for {asset_out}"
            )));
        }
        let amount_out = amount_in * spot_in / spot_out;
        let quote = Quote::new(
            pair,
            amount_in,
            amount_out,
            slippage_bps,
            fee_estimate,
            issued_at,
            ttl,
        )
        .into_fallback();
        tracing::info!(
            quote_id = %quote.id(),
            %asset_in,
            %asset_out,
            reason = %failure,
            "issued spot-price fallback estimate"
        );
        Ok(quote)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{FixedPrices, ScriptedVenue};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn engine(venue: ScriptedVenue) -> QuoteEngine {
        QuoteEngine::new(
            Arc::new(venue),
            Arc::new(FixedPrices::new(dec!(7000))),
            QuoteConfig::default(),
        )
    }

    #[tokio::test]
    async fn venue_quote_applies_slippage_and_fee() {
        let engine = engine(ScriptedVenue::new(dec!(7000)));
        let Ok(quote) = engine
            .get_quote(Asset::Stable, Asset::Gold, dec!(10000), Some(50), QuoteMode::Execution)
            .await
        else {
            panic!("quote failed");
        };
        assert_eq!(quote.amount_out_expected(), dec!(1.428571));
        assert_eq!(quote.min_amount_out(), dec!(1.421428));
        assert_eq!(quote.fee_estimate(), dec!(30.00));
        assert!(!quote.is_fallback());
        assert_eq!(
            quote.valid_until() - quote.created_at(),
            chrono::Duration::seconds(60)
        );
    }

    #[tokio::test]
    async fn default_slippage_is_used_when_absent() {
        let engine = engine(ScriptedVenue::new(dec!(7000)));
        let Ok(quote) = engine
            .get_quote(Asset::Gold, Asset::Stable, dec!(1), None, QuoteMode::Execution)
            .await
        else {
            panic!("quote failed");
        };
        assert_eq!(quote.slippage_bps(), 50);
        assert_eq!(quote.min_amount_out(), dec!(6965.00));
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let engine = engine(ScriptedVenue::new(dec!(7000)));
        let zero = engine
            .get_quote(Asset::Stable, Asset::Gold, dec!(0), None, QuoteMode::Execution)
            .await;
        assert!(matches!(zero, Err(GatewayError::InvalidAmount(_))));

        let same = engine
            .get_quote(Asset::Gold, Asset::Gold, dec!(1), None, QuoteMode::Execution)
            .await;
        assert!(matches!(same, Err(GatewayError::InvalidRequest(_))));

        let greedy = engine
            .get_quote(Asset::Stable, Asset::Gold, dec!(100), Some(501), QuoteMode::Execution)
            .await;
        assert!(matches!(greedy, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn execution_mode_surfaces_venue_failure() {
        let engine = engine(ScriptedVenue::unavailable());
        let result = engine
            .get_quote(Asset::Stable, Asset::Gold, dec!(100), None, QuoteMode::Execution)
            .await;
        assert!(matches!(result, Err(GatewayError::VenueUnavailable(_))));
    }

    #[tokio::test]
    async fn estimate_mode_falls_back_to_spot() {
        let engine = engine(ScriptedVenue::unavailable());
        let Ok(quote) = engine
            .get_quote(Asset::Stable, Asset::Gold, dec!(7000), Some(0), QuoteMode::Estimate)
            .await
        else {
            panic!("estimate failed");
        };
        assert!(quote.is_fallback());
        assert_eq!(quote.amount_out_expected(), dec!(1));
    }

    #[tokio::test]
    async fn estimate_without_any_price_fails() {
        let engine = QuoteEngine::new(
            Arc::new(ScriptedVenue::unavailable()),
            Arc::new(FixedPrices::unavailable()),
            QuoteConfig::default(),
        );
        let result = engine
            .get_quote(Asset::Stable, Asset::Gold, dec!(7000), None, QuoteMode::Estimate)
            .await;
        assert!(matches!(result, Err(GatewayError::PriceUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_venue_times_out() {
        let config = QuoteConfig {
            venue_timeout: Duration::from_millis(50),
            ..QuoteConfig::default()
        };
        let engine = QuoteEngine::new(
            Arc::new(ScriptedVenue::slow(dec!(7000), Duration::from_secs(10))),
            Arc::new(FixedPrices::new(dec!(7000))),
            config,
        );
        let result = engine
            .get_quote(Asset::Stable, Asset::Gold, dec!(100), None, QuoteMode::Execution)
            .await;
        assert!(matches!(result, Err(GatewayError::VenueUnavailable(_))));
    }
}
