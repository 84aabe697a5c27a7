//! Scripted collaborators for unit tests.
//!
//! The venue prices gold at a fixed rate and encodes its calls as JSON so
//! the signer can decode what it is asked to send. The signer plays back a
//! [`SwapOutcome`] instead of talking to a chain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::app_state::AppState;
use crate::config::{ExecutorConfig, GiftConfig, LedgerConfig, QuoteConfig};
use crate::decimal::{self, Asset};
use crate::domain::{EventBus, TxId, UserId, WalletAddress};
use crate::error::GatewayError;
use crate::persistence::memory::{MemoryDirectory, MemoryEscrowStore, MemoryLedgerStore};
use crate::ports::{
    ChainCall, ChainError, LiquidityVenue, PriceReference, Receipt, ReceiptStatus,
    SignerProvider, SwapCallRequest, TransferLog, VenueQuote, WalletSigner,
};
use crate::service::{
    GiftService, LedgerReconciler, QuoteBook, QuoteEngine, TradeService, TransactionExecutor,
};

pub(crate) const SPENDER: &str = "0xvenue";

/// Venue quoting gold at a fixed fiat price.
#[derive(Debug)]
pub(crate) struct ScriptedVenue {
    gold_price: Mutex<Option<Decimal>>,
    delay: Option<Duration>,
}

impl ScriptedVenue {
    pub(crate) fn new(gold_price: Decimal) -> Self {
        Self {
            gold_price: Mutex::new(Some(gold_price)),
            delay: None,
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            gold_price: Mutex::new(None),
            delay: None,
        }
    }

    pub(crate) fn slow(gold_price: Decimal, delay: Duration) -> Self {
        Self {
            gold_price: Mutex::new(Some(gold_price)),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl LiquidityVenue for ScriptedVenue {
    fn spender(&self) -> WalletAddress {
        WalletAddress::from(SPENDER)
    }

    async fn quote(
        &self,
        asset_in: Asset,
        asset_out: Asset,
        amount_in: Decimal,
    ) -> Result<VenueQuote, GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let Some(price) = *self.gold_price.lock().await else {
            return Err(GatewayError::VenueUnavailable("venue offline".to_string()));
        };
        let amount_out = match (asset_in, asset_out) {
            (Asset::Stable, Asset::Gold) => amount_in / price,
            _ => amount_in * price,
        };
        Ok(VenueQuote { amount_out })
    }

    async fn build_approve_call(
        &self,
        token: Asset,
        spender: &WalletAddress,
        amount: Decimal,
    ) -> Result<ChainCall, GatewayError> {
        let calldata = serde_json::json!({ "amount": amount.to_string() }).to_string();
        Ok(ChainCall {
            target: WalletAddress::from(token.symbol()),
            calldata,
            description: format!("approve {spender}"),
        })
    }

    async fn build_swap_call(&self, request: &SwapCallRequest) -> Result<ChainCall, GatewayError> {
        let calldata = serde_json::to_string(request)
            .map_err(|e| GatewayError::VenueUnavailable(e.to_string()))?;
        Ok(ChainCall {
            target: WalletAddress::from(SPENDER),
            calldata,
            description: "swap".to_string(),
        })
    }
}

/// Spot prices: gold at a fixed fiat price, the stablecoin at 1.
#[derive(Debug)]
pub(crate) struct FixedPrices {
    gold: Option<Decimal>,
}

impl FixedPrices {
    pub(crate) fn new(gold: Decimal) -> Self {
        Self { gold: Some(gold) }
    }

    pub(crate) fn unavailable() -> Self {
        Self { gold: None }
    }
}

#[async_trait]
impl PriceReference for FixedPrices {
    async fn spot_price(&self, asset: Asset) -> Result<Decimal, GatewayError> {
        match asset {
            Asset::Stable => Ok(Decimal::ONE),
            Asset::Gold => self
                .gold
                .ok_or_else(|| GatewayError::PriceUnavailable("no gold price".to_string())),
        }
    }
}

/// What the scripted signer does with a swap call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwapOutcome {
    /// Mined; delivers the given amount, or `min_amount_out` when `None`.
    Deliver(Option<Decimal>),
    /// Mined successfully but no transfer to the owner is logged.
    NoTransfer,
    /// Mined and reverted.
    Reverted,
    /// Never mined.
    Pending,
    /// Refused before broadcast.
    SendRejected,
    /// Broadcast outcome unknown.
    SendTimeout,
}

#[derive(Debug, Deserialize)]
struct ApproveCalldata {
    amount: Decimal,
}

#[derive(Debug, Default)]
struct SignerState {
    allowance: Decimal,
    sent: Vec<ChainCall>,
    receipts: HashMap<TxId, Option<Receipt>>,
}

/// Signer that plays back scripted outcomes.
#[derive(Debug)]
pub(crate) struct ScriptedSigner {
    address: WalletAddress,
    swap: SwapOutcome,
    approve_reverts: bool,
    state: Mutex<SignerState>,
}

impl ScriptedSigner {
    pub(crate) fn new(address: &str, swap: SwapOutcome) -> Self {
        Self {
            address: WalletAddress::from(address),
            swap,
            approve_reverts: false,
            state: Mutex::new(SignerState::default()),
        }
    }

    pub(crate) fn with_allowance(self, allowance: Decimal) -> Self {
        if let Ok(mut state) = self.state.try_lock() {
            state.allowance = allowance;
        }
        self
    }

    pub(crate) fn with_reverting_approval(mut self) -> Self {
        self.approve_reverts = true;
        self
    }

    pub(crate) async fn sent(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .sent
            .iter()
            .map(|c| c.description.clone())
            .collect()
    }

    fn receipt(&self, tx_id: &TxId, status: ReceiptStatus, transfers: Vec<TransferLog>) -> Receipt {
        Receipt {
            tx_id: tx_id.clone(),
            status,
            block_number: 1,
            transfers,
        }
    }
}

#[async_trait]
impl WalletSigner for ScriptedSigner {
    fn address(&self) -> WalletAddress {
        self.address.clone()
    }

    async fn get_allowance(
        &self,
        _owner: &WalletAddress,
        _spender: &WalletAddress,
        _token: Asset,
    ) -> Result<Decimal, ChainError> {
        Ok(self.state.lock().await.allowance)
    }

    async fn send(&self, call: &ChainCall) -> Result<TxId, ChainError> {
        let mut state = self.state.lock().await;
        let tx_id = TxId::new(format!("0x{:04x}", state.sent.len()));
        state.sent.push(call.clone());

        if call.description.starts_with("approve") {
            let receipt = if self.approve_reverts {
                self.receipt(&tx_id, ReceiptStatus::Reverted, Vec::new())
            } else {
                let approved: ApproveCalldata = serde_json::from_str(&call.calldata)
                    .map_err(|e| ChainError::Rejected(e.to_string()))?;
                state.allowance = approved.amount;
                self.receipt(&tx_id, ReceiptStatus::Success, Vec::new())
            };
            state.receipts.insert(tx_id.clone(), Some(receipt));
            return Ok(tx_id);
        }

        let request: SwapCallRequest = serde_json::from_str(&call.calldata)
            .map_err(|e| ChainError::Rejected(e.to_string()))?;
        let receipt = match self.swap {
            SwapOutcome::SendRejected => {
                return Err(ChainError::Rejected("insufficient funds for gas".to_string()));
            }
            SwapOutcome::SendTimeout => {
                return Err(ChainError::Timeout("relay did not answer".to_string()));
            }
            SwapOutcome::Pending => None,
            SwapOutcome::Reverted => Some(self.receipt(&tx_id, ReceiptStatus::Reverted, Vec::new())),
            SwapOutcome::NoTransfer => Some(self.receipt(&tx_id, ReceiptStatus::Success, Vec::new())),
            SwapOutcome::Deliver(amount) => {
                let amount = amount.unwrap_or(request.min_amount_out);
                let transfer = TransferLog {
                    token: request.asset_out,
                    from: WalletAddress::from(SPENDER),
                    to: request.recipient.clone(),
                    amount: decimal::round_to(request.asset_out, amount),
                };
                Some(self.receipt(&tx_id, ReceiptStatus::Success, vec![transfer]))
            }
        };
        state.receipts.insert(tx_id.clone(), receipt);
        Ok(tx_id)
    }

    async fn wait_for_receipt(&self, tx_id: &TxId) -> Result<Option<Receipt>, ChainError> {
        Ok(self
            .state
            .lock()
            .await
            .receipts
            .get(tx_id)
            .cloned()
            .flatten())
    }
}

/// Hands every user the same signer.
#[derive(Debug)]
pub(crate) struct SharedSigner(pub(crate) Arc<ScriptedSigner>);

#[async_trait]
impl SignerProvider for SharedSigner {
    async fn signer_for(&self, _user_id: UserId) -> Result<Arc<dyn WalletSigner>, GatewayError> {
        let signer: Arc<dyn WalletSigner> = Arc::clone(&self.0) as Arc<dyn WalletSigner>;
        Ok(signer)
    }
}

/// Executor settings that poll quickly.
pub(crate) fn fast_executor() -> ExecutorConfig {
    ExecutorConfig {
        receipt_poll_interval: Duration::from_millis(1),
        receipt_max_attempts: 3,
        send_timeout: Duration::from_millis(200),
        ..ExecutorConfig::default()
    }
}

/// Fully wired services over in-memory stores.
#[derive(Debug)]
pub(crate) struct Harness {
    pub(crate) ledger: Arc<MemoryLedgerStore>,
    pub(crate) escrows: Arc<MemoryEscrowStore>,
    pub(crate) directory: Arc<MemoryDirectory>,
    pub(crate) signer: Arc<ScriptedSigner>,
    pub(crate) events: EventBus,
    pub(crate) reconciler: Arc<LedgerReconciler>,
    pub(crate) trade: TradeService,
    pub(crate) gifts: GiftService,
}

impl Harness {
    pub(crate) fn new(gold_price: Decimal, swap: SwapOutcome) -> Self {
        Self::with_signer(gold_price, ScriptedSigner::new("0xuser", swap))
    }

    pub(crate) fn with_signer(gold_price: Decimal, signer: ScriptedSigner) -> Self {
        let ledger = Arc::new(MemoryLedgerStore::new());
        let escrows = Arc::new(MemoryEscrowStore::new());
        let directory = Arc::new(MemoryDirectory::new());
        let signer = Arc::new(signer);
        let events = EventBus::new(256);
        let prices: Arc<dyn PriceReference> = Arc::new(FixedPrices::new(gold_price));

        let reconciler = Arc::new(LedgerReconciler::new(
            Arc::clone(&ledger) as Arc<dyn crate::ports::LedgerStore>,
            events.clone(),
            LedgerConfig::default(),
        ));
        let engine = Arc::new(QuoteEngine::new(
            Arc::new(ScriptedVenue::new(gold_price)),
            Arc::clone(&prices),
            QuoteConfig::default(),
        ));
        let executor = Arc::new(TransactionExecutor::new(
            Arc::new(ScriptedVenue::new(gold_price)),
            events.clone(),
            fast_executor(),
        ));
        let trade = TradeService::new(
            engine,
            Arc::new(QuoteBook::new()),
            executor,
            Arc::clone(&reconciler),
            Arc::new(SharedSigner(Arc::clone(&signer))),
            Arc::clone(&prices),
        );
        let gifts = GiftService::new(
            Arc::clone(&reconciler),
            Arc::clone(&escrows) as Arc<dyn crate::ports::EscrowStore>,
            Arc::clone(&directory) as Arc<dyn crate::ports::RecipientDirectory>,
            prices,
            events.clone(),
            GiftConfig::default(),
        );

        Self {
            ledger,
            escrows,
            directory,
            signer,
            events,
            reconciler,
            trade,
            gifts,
        }
    }

    /// Router state over these services.
    pub(crate) fn app_state(&self) -> AppState {
        AppState {
            trade: Arc::new(self.trade.clone()),
            gifts: Arc::new(self.gifts.clone()),
            events: self.events.clone(),
        }
    }
}
