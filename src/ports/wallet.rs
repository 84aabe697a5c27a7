//! Wallet signer interface and chain receipts.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ChainCall;
use crate::decimal::Asset;
use crate::domain::{TxId, UserId, WalletAddress};
use crate::error::GatewayError;

/// Failure reported by a signer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The node or signer refused the transaction; nothing was broadcast.
    #[error("rejected: {0}")]
    Rejected(String),

    /// No answer within the allotted time; the transaction may be in flight.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Connection-level failure; outcome unknown.
    #[error("transport: {0}")]
    Transport(String),
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Executed.
    Success,
    /// Reverted; no state change.
    Reverted,
}

/// Token transfer decoded from receipt logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLog {
    /// Token moved.
    pub token: Asset,
    /// Sender.
    pub from: WalletAddress,
    /// Recipient.
    pub to: WalletAddress,
    /// Amount in token units.
    pub amount: Decimal,
}

/// Mined transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash.
    pub tx_id: TxId,
    /// Success or revert.
    pub status: ReceiptStatus,
    /// Block the transaction was mined in.
    pub block_number: u64,
    /// Decoded transfers.
    #[serde(default)]
    pub transfers: Vec<TransferLog>,
}

impl Receipt {
    /// Total of `token` transferred to `recipient`, or `None` when no such
    /// transfer is logged.
    #[must_use]
    pub fn received(&self, token: Asset, recipient: &WalletAddress) -> Option<Decimal> {
        self.transfers
            .iter()
            .filter(|t| t.token == token && &t.to == recipient)
            .map(|t| t.amount)
            .reduce(|a, b| a + b)
    }
}

/// Signs and broadcasts on behalf of one wallet.
#[async_trait]
pub trait WalletSigner: Send + Sync + fmt::Debug {
    /// Wallet address.
    fn address(&self) -> WalletAddress;

    /// Allowance `owner` granted `spender` over `token`.
    ///
    /// # Errors
    ///
    /// Returns a [`ChainError`] when the chain cannot be read.
    async fn get_allowance(
        &self,
        owner: &WalletAddress,
        spender: &WalletAddress,
        token: Asset,
    ) -> Result<Decimal, ChainError>;

    /// Signs and broadcasts `call`.
    ///
    /// # Errors
    ///
    /// [`ChainError::Rejected`] if nothing was broadcast; `Timeout` or
    /// `Transport` if the outcome is unknown.
    async fn send(&self, call: &ChainCall) -> Result<TxId, ChainError>;

    /// One bounded wait for the receipt; `Ok(None)` while still pending.
    ///
    /// # Errors
    ///
    /// Returns a [`ChainError`] when the node cannot be queried.
    async fn wait_for_receipt(&self, tx_id: &TxId) -> Result<Option<Receipt>, ChainError>;
}

/// Resolves the signer for a ledger user.
#[async_trait]
pub trait SignerProvider: Send + Sync + fmt::Debug {
    /// Signer bound to `user_id`'s wallet.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] when the user has no wallet.
    async fn signer_for(&self, user_id: UserId) -> Result<Arc<dyn WalletSigner>, GatewayError>;
}
