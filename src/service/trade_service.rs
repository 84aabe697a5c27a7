//! Trade service: quote, execute and reconcile buys and sells.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use super::executor::TransactionExecutor;
use super::quote_book::QuoteBook;
use super::quote_engine::QuoteEngine;
use super::reconciler::{LedgerReconciler, Movement};
use crate::decimal::{self, Asset};
use crate::domain::{
    Holding, LedgerKind, Quote, QuoteId, QuoteMode, SwapExecution, SwapIntent, SwapState,
    TransactionRecord, TxRef, UserId,
};
use crate::error::GatewayError;
use crate::ports::{PriceReference, SignerProvider};

/// Which way a trade goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    /// Stablecoin in, gold out.
    Buy,
    /// Gold in, stablecoin out.
    Sell,
}

impl TradeSide {
    /// Asset paid in.
    #[must_use]
    pub const fn asset_in(self) -> Asset {
        match self {
            Self::Buy => Asset::Stable,
            Self::Sell => Asset::Gold,
        }
    }

    const fn ledger_kind(self) -> LedgerKind {
        match self {
            Self::Buy => LedgerKind::Buy,
            Self::Sell => LedgerKind::Sell,
        }
    }
}

/// A buy or sell request.
///
/// Either `quote_id` names a quote previously issued by
/// [`TradeService::quote`], or `amount_in` asks for a fresh execution quote.
#[derive(Debug, Clone, Default)]
pub struct TradeRequest {
    /// Previously issued quote.
    pub quote_id: Option<QuoteId>,
    /// Input amount: stablecoin for a buy, gold for a sell.
    pub amount_in: Option<Decimal>,
    /// Slippage for a fresh quote.
    pub slippage_bps: Option<u16>,
}

/// Settled trade.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    /// Quote that was executed.
    pub quote: Quote,
    /// Terminal execution.
    pub execution: SwapExecution,
    /// Holding after reconciliation.
    pub holding: Holding,
    /// Ledger record.
    pub record: TransactionRecord,
    /// `true` when the swap had already been reconciled.
    pub already_processed: bool,
}

/// Holding valued at the current spot price.
#[derive(Debug, Clone)]
pub struct Position {
    /// Holding.
    pub holding: Holding,
    /// Gold spot price, when available.
    pub spot_price: Option<Decimal>,
    /// `quantity * spot_price`.
    pub market_value: Option<Decimal>,
    /// `market_value - total_invested`.
    pub unrealized_pnl: Option<Decimal>,
}

/// Orchestrates the exchange pipeline per request.
#[derive(Debug, Clone)]
pub struct TradeService {
    engine: Arc<QuoteEngine>,
    book: Arc<QuoteBook>,
    executor: Arc<TransactionExecutor>,
    ledger: Arc<LedgerReconciler>,
    signers: Arc<dyn SignerProvider>,
    prices: Arc<dyn PriceReference>,
}

impl TradeService {
    /// Creates a new `TradeService`.
    #[must_use]
    pub fn new(
        engine: Arc<QuoteEngine>,
        book: Arc<QuoteBook>,
        executor: Arc<TransactionExecutor>,
        ledger: Arc<LedgerReconciler>,
        signers: Arc<dyn SignerProvider>,
        prices: Arc<dyn PriceReference>,
    ) -> Self {
        Self {
            engine,
            book,
            executor,
            ledger,
            signers,
            prices,
        }
    }

    /// Issues a quote and keeps it for a later [`buy`](Self::buy) or
    /// [`sell`](Self::sell).
    ///
    /// # Errors
    ///
    /// See [`QuoteEngine::get_quote`].
    pub async fn quote(
        &self,
        asset_in: Asset,
        amount_in: Decimal,
        slippage_bps: Option<u16>,
        mode: QuoteMode,
    ) -> Result<Quote, GatewayError> {
        let quote = self
            .engine
            .get_quote(asset_in, asset_in.counterpart(), amount_in, slippage_bps, mode)
            .await?;
        self.book.insert(quote.clone()).await;
        Ok(quote)
    }

    /// Swaps stablecoin for gold and credits the holding.
    ///
    /// # Errors
    ///
    /// Quote errors, [`GatewayError::Execution`] for a failed swap, and
    /// [`GatewayError::Unreconciled`] when the swap settled but the holding
    /// could not be updated.
    pub async fn buy(&self, user_id: UserId, request: TradeRequest) -> Result<TradeOutcome, GatewayError> {
        self.trade(user_id, TradeSide::Buy, request).await
    }

    /// Swaps gold for stablecoin and debits the holding.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InsufficientBalance`] before anything is sent when
    /// the holding is too small; otherwise as [`buy`](Self::buy).
    pub async fn sell(&self, user_id: UserId, request: TradeRequest) -> Result<TradeOutcome, GatewayError> {
        self.trade(user_id, TradeSide::Sell, request).await
    }

    async fn trade(
        &self,
        user_id: UserId,
        side: TradeSide,
        request: TradeRequest,
    ) -> Result<TradeOutcome, GatewayError> {
        let quote = self.resolve_quote(side, &request).await?;

        if side == TradeSide::Sell {
            let holding = self.ledger.holding(user_id).await?;
            if quote.amount_in() > holding.quantity {
                return Err(GatewayError::InsufficientBalance {
                    requested: quote.amount_in(),
                    available: holding.quantity,
                });
            }
        }

        let signer = self.signers.signer_for(user_id).await?;
        let deadline = chrono::Duration::from_std(self.executor.config().intent_deadline)
            .map_err(|e| GatewayError::Internal(format!("intent deadline out of range: {e}")))?;
        let intent = SwapIntent::from_quote(user_id, signer.address(), &quote, Utc::now(), deadline);
        let execution = self.executor.execute(signer.as_ref(), &intent, &quote).await;

        let kind = side.ledger_kind();
        let (amount_token, amount_fiat) = match side {
            TradeSide::Buy => (execution.amount_out_actual, Some(quote.amount_in())),
            TradeSide::Sell => (Some(quote.amount_in()), execution.amount_out_actual),
        };

        let (SwapState::Success, Some(amount_token), Some(amount_fiat), Some(tx_id)) = (
            execution.state,
            amount_token,
            amount_fiat,
            execution.swap_tx_id.clone(),
        ) else {
            return Err(self.failed(&execution, kind, &quote).await);
        };

        let movement = Movement {
            user_id,
            kind,
            amount_token,
            amount_fiat: decimal::round_fiat(amount_fiat),
            tx_ref: TxRef::chain(&tx_id),
            chain_tx: Some(tx_id.clone()),
        };
        let reconciled = match self.ledger.reconcile(movement).await {
            Ok(reconciled) => reconciled,
            Err(e) => {
                tracing::error!(
                    %user_id,
                    %tx_id,
                    execution_id = %execution.id,
                    error = %e,
                    "swap settled on-chain but ledger update failed"
                );
                if let Err(record_err) = self
                    .ledger
                    .record_unreconciled(&execution, kind, amount_token, amount_fiat, &e)
                    .await
                {
                    tracing::error!(
                        execution_id = %execution.id,
                        %tx_id,
                        error = %record_err,
                        "unreconciled swap not recorded"
                    );
                }
                return Err(GatewayError::Unreconciled {
                    execution_id: execution.id,
                    swap_tx_id: tx_id,
                    reason: e.to_string(),
                });
            }
        };

        Ok(TradeOutcome {
            quote,
            execution,
            holding: reconciled.holding,
            record: reconciled.record,
            already_processed: reconciled.already_processed,
        })
    }

    async fn resolve_quote(&self, side: TradeSide, request: &TradeRequest) -> Result<Quote, GatewayError> {
        let asset_in = side.asset_in();
        let Some(quote_id) = request.quote_id else {
            let Some(amount_in) = request.amount_in else {
                return Err(GatewayError::InvalidRequest(
                    "either quote_id or amount is required".to_string(),
                ));
            };
            return self
                .engine
                .get_quote(
                    asset_in,
                    asset_in.counterpart(),
                    amount_in,
                    request.slippage_bps,
                    QuoteMode::Execution,
                )
                .await;
        };

        let Some(quote) = self.book.take(quote_id).await else {
            return Err(GatewayError::InvalidRequest(format!(
                "unknown or already used quote {quote_id}"
            )));
        };
        if quote.asset_in() != asset_in {
            return Err(GatewayError::InvalidRequest(format!(
                "quote {quote_id} pays in {}, expected {asset_in}",
                quote.asset_in()
            )));
        }
        if let Some(amount_in) = request.amount_in
            && amount_in != quote.amount_in()
        {
            return Err(GatewayError::InvalidRequest(format!(
                "amount {amount_in} differs from quoted {}",
                quote.amount_in()
            )));
        }
        Ok(quote)
    }

    async fn failed(&self, execution: &SwapExecution, kind: LedgerKind, quote: &Quote) -> GatewayError {
        let precondition = execution
            .error
            .as_ref()
            .is_some_and(|f| f.kind.is_precondition());
        if !precondition {
            let (amount_token, amount_fiat) = match kind {
                LedgerKind::Sell => (quote.amount_in(), quote.amount_out_expected()),
                _ => (quote.amount_out_expected(), quote.amount_in()),
            };
            if let Err(e) = self
                .ledger
                .record_failure(execution, kind, amount_token, amount_fiat)
                .await
            {
                tracing::error!(execution_id = %execution.id, error = %e, "failed execution not recorded");
            }
        }
        execution.to_error().unwrap_or_else(|| {
            GatewayError::Internal(format!(
                "execution {} ended in {:?} without output",
                execution.id, execution.state
            ))
        })
    }

    /// Current holding.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on store failure.
    pub async fn holding(&self, user_id: UserId) -> Result<Holding, GatewayError> {
        self.ledger.holding(user_id).await
    }

    /// Holding valued at spot. Market fields are `None` when no price is
    /// available.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on store failure.
    pub async fn position(&self, user_id: UserId) -> Result<Position, GatewayError> {
        let holding = self.ledger.holding(user_id).await?;
        let spot_price = match self.prices.spot_price(Asset::Gold).await {
            Ok(price) => Some(price),
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "position without market valuation");
                None
            }
        };
        let market_value = spot_price.map(|p| decimal::round_fiat(holding.quantity * p));
        let unrealized_pnl = market_value.map(|v| v - holding.total_invested);
        Ok(Position {
            holding,
            spot_price,
            market_value,
            unrealized_pnl,
        })
    }

    /// Page of transaction records, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on store failure.
    pub async fn transactions(
        &self,
        user_id: UserId,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<TransactionRecord>, usize), GatewayError> {
        self.ledger.transactions(user_id, offset, limit).await
    }
}
