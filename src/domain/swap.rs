//! Swap intents and the execution state machine.
//!
//! ```text
//! Input → Approving → Submitted → Confirming → Success
//!   │         │           │            │
//!   └─────────┴───────────┴────────────┴──→ Failed
//! ```
//!
//! [`SwapExecution`] is the only mutable record; it refuses to leave a
//! terminal state. Retrying always means a new [`SwapIntent`] with a fresh
//! quote.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ExecutionId, IntentId, Quote, QuoteId, TxId, UserId, WalletAddress};
use crate::decimal::Asset;
use crate::error::GatewayError;

/// Lifecycle state of a [`SwapExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapState {
    /// Intent accepted, nothing sent.
    Input,
    /// Allowance being checked or approval being mined.
    Approving,
    /// Swap transaction broadcast.
    Submitted,
    /// Waiting for the swap receipt.
    Confirming,
    /// Receipt confirmed with the actual output read from logs.
    Success,
    /// Terminal failure; see [`SwapExecution::error`].
    Failed,
}

impl SwapState {
    /// `true` for `Success` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Whether `self → next` is an edge of the state machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Input, Self::Approving)
            | (Self::Approving, Self::Submitted)
            | (Self::Submitted, Self::Confirming)
            | (Self::Confirming, Self::Success) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Classification of an execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The quote passed `valid_until` before execution began.
    QuoteExpired,
    /// The quote was a display-only fallback.
    QuoteIsFallback,
    /// Intent and quote (or signer) disagree.
    IntentMismatch,
    /// Approval could not be built, sent or mined.
    ApprovalFailed,
    /// The swap was rejected or reverted on-chain.
    SwapReverted,
    /// No receipt within the polling budget; chain state is unknown.
    ConfirmationTimeout,
    /// Receipt succeeded but the delivered output could not be verified.
    OutputUnverified,
    /// The executor broke its own state machine.
    Internal,
}

impl ErrorKind {
    /// `true` when the chain outcome is unknown and must be checked
    /// out-of-band before any retry.
    #[must_use]
    pub const fn is_indeterminate(self) -> bool {
        matches!(self, Self::ConfirmationTimeout | Self::OutputUnverified)
    }

    /// `true` when the execution was refused before anything was sent.
    #[must_use]
    pub const fn is_precondition(self) -> bool {
        matches!(
            self,
            Self::QuoteExpired | Self::QuoteIsFallback | Self::IntentMismatch
        )
    }

    /// Snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuoteExpired => "quote_expired",
            Self::QuoteIsFallback => "quote_is_fallback",
            Self::IntentMismatch => "intent_mismatch",
            Self::ApprovalFailed => "approval_failed",
            Self::SwapReverted => "swap_reverted",
            Self::ConfirmationTimeout => "confirmation_timeout",
            Self::OutputUnverified => "output_unverified",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure attached to a `Failed` execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// Classification.
    pub kind: ErrorKind,
    /// Human-readable cause.
    pub message: String,
}

impl ExecutionFailure {
    /// Creates a failure of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One recorded edge of the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// State left.
    pub from: SwapState,
    /// State entered.
    pub to: SwapState,
    /// When the transition happened.
    pub at: DateTime<Utc>,
}

/// Request to exchange `amount_in` of one asset for at least
/// `min_amount_out` of the other. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapIntent {
    /// Intent identifier.
    pub id: IntentId,
    /// Ledger owner.
    pub user_id: UserId,
    /// Wallet that signs and receives.
    pub owner: WalletAddress,
    /// Asset paid in.
    pub asset_in: Asset,
    /// Asset received.
    pub asset_out: Asset,
    /// Exact input amount.
    pub amount_in: Decimal,
    /// Minimum acceptable output, copied from the quote.
    pub min_amount_out: Decimal,
    /// Wall-clock deadline enforced by the venue contract.
    pub deadline: DateTime<Utc>,
    /// Quote the intent was derived from.
    pub quote_id: QuoteId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl SwapIntent {
    /// Derives an intent from a quote, with a deadline `deadline_after` from
    /// `now`.
    #[must_use]
    pub fn from_quote(
        user_id: UserId,
        owner: WalletAddress,
        quote: &Quote,
        now: DateTime<Utc>,
        deadline_after: Duration,
    ) -> Self {
        Self {
            id: IntentId::new(),
            user_id,
            owner,
            asset_in: quote.asset_in(),
            asset_out: quote.asset_out(),
            amount_in: quote.amount_in(),
            min_amount_out: quote.min_amount_out(),
            deadline: now + deadline_after,
            quote_id: quote.id(),
            created_at: now,
        }
    }

    /// Explains why this intent cannot be executed with `quote`, if it can't.
    #[must_use]
    pub fn mismatch_with(&self, quote: &Quote) -> Option<String> {
        if self.quote_id != quote.id() {
            return Some(format!(
                "intent {} was built from quote {}, not {}",
                self.id,
                self.quote_id,
                quote.id()
            ));
        }
        if self.asset_in != quote.asset_in() || self.asset_out != quote.asset_out() {
            return Some("intent and quote trade different assets".to_string());
        }
        if self.amount_in != quote.amount_in() {
            return Some(format!(
                "intent amount {} differs from quoted {}",
                self.amount_in,
                quote.amount_in()
            ));
        }
        if self.min_amount_out != quote.min_amount_out() {
            return Some(format!(
                "intent minimum {} differs from quoted {}",
                self.min_amount_out,
                quote.min_amount_out()
            ));
        }
        None
    }
}

/// Mutable lifecycle record of one [`SwapIntent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapExecution {
    /// Execution identifier.
    pub id: ExecutionId,
    /// Intent being executed.
    pub intent_id: IntentId,
    /// Quote consumed by the intent.
    pub quote_id: QuoteId,
    /// Ledger owner.
    pub user_id: UserId,
    /// Current state.
    pub state: SwapState,
    /// `true` when the existing allowance covered the swap and no approval
    /// transaction was emitted.
    pub approval_skipped: bool,
    /// Approval transaction, when one was sent.
    pub approval_tx_id: Option<TxId>,
    /// Swap transaction, once sent.
    pub swap_tx_id: Option<TxId>,
    /// Output read from the receipt logs on success.
    pub amount_out_actual: Option<Decimal>,
    /// Failure details when `state == Failed`.
    pub error: Option<ExecutionFailure>,
    /// Ordered transition history.
    pub history: Vec<StateTransition>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last transition.
    pub updated_at: DateTime<Utc>,
}

impl SwapExecution {
    /// Opens an execution in [`SwapState::Input`] for `intent`.
    #[must_use]
    pub fn new(intent: &SwapIntent) -> Self {
        let now = Utc::now();
        Self {
            id: ExecutionId::new(),
            intent_id: intent.id,
            quote_id: intent.quote_id,
            user_id: intent.user_id,
            state: SwapState::Input,
            approval_skipped: false,
            approval_tx_id: None,
            swap_tx_id: None,
            amount_out_actual: None,
            error: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::IllegalTransition`] if `next` is not reachable
    /// from the current state (in particular, from any terminal state).
    pub fn advance(&mut self, next: SwapState, at: DateTime<Utc>) -> Result<(), GatewayError> {
        if !self.state.can_transition_to(next) {
            return Err(GatewayError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.history.push(StateTransition {
            from: self.state,
            to: next,
            at,
        });
        self.state = next;
        self.updated_at = at;
        Ok(())
    }

    /// Moves to [`SwapState::Failed`] and records `failure`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::IllegalTransition`] if the execution is
    /// already terminal.
    pub fn fail(&mut self, failure: ExecutionFailure, at: DateTime<Utc>) -> Result<(), GatewayError> {
        self.advance(SwapState::Failed, at)?;
        self.error = Some(failure);
        Ok(())
    }

    /// `true` once `Success` or `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `true` if at least one transaction was broadcast.
    #[must_use]
    pub const fn touched_chain(&self) -> bool {
        self.approval_tx_id.is_some() || self.swap_tx_id.is_some()
    }

    /// The caller-facing error for a failed execution; `None` otherwise.
    #[must_use]
    pub fn to_error(&self) -> Option<GatewayError> {
        let failure = self.error.as_ref()?;
        Some(match failure.kind {
            ErrorKind::QuoteExpired => GatewayError::QuoteExpired(self.quote_id),
            ErrorKind::QuoteIsFallback => GatewayError::QuoteIsFallback(self.quote_id),
            ErrorKind::Internal => GatewayError::Internal(failure.message.clone()),
            kind => GatewayError::Execution {
                kind,
                message: failure.message.clone(),
                approval_tx_id: self.approval_tx_id.clone(),
                swap_tx_id: self.swap_tx_id.clone(),
            },
        })
    }
}
