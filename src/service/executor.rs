//! Transaction executor: drives a wallet through allowance, approval, swap
//! and confirmation.
//!
//! Nothing on-chain is retried here. Whatever happens, [`execute`] returns
//! a terminal [`SwapExecution`]; when the chain outcome is unknown the
//! failure kind says so ([`ErrorKind::is_indeterminate`]) and the caller
//! must reconcile out-of-band before trying again.
//!
//! [`execute`]: TransactionExecutor::execute

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::ExecutorConfig;
use crate::domain::{
    ErrorKind, EventBus, ExecutionFailure, LedgerEvent, Quote, SwapExecution, SwapIntent,
    SwapState, TxId,
};
use crate::ports::{
    ChainCall, ChainError, LiquidityVenue, Receipt, ReceiptStatus, SwapCallRequest, WalletSigner,
};

/// Stateless driver of the swap state machine.
#[derive(Debug, Clone)]
pub struct TransactionExecutor {
    venue: Arc<dyn LiquidityVenue>,
    events: EventBus,
    config: ExecutorConfig,
}

impl TransactionExecutor {
    /// Creates a new `TransactionExecutor`.
    #[must_use]
    pub fn new(venue: Arc<dyn LiquidityVenue>, events: EventBus, config: ExecutorConfig) -> Self {
        Self {
            venue,
            events,
            config,
        }
    }

    /// Executor settings.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs `intent` against `quote` with `signer` until a terminal state.
    pub async fn execute(
        &self,
        signer: &dyn WalletSigner,
        intent: &SwapIntent,
        quote: &Quote,
    ) -> SwapExecution {
        let mut execution = SwapExecution::new(intent);
        tracing::info!(
            execution_id = %execution.id,
            intent_id = %intent.id,
            user_id = %intent.user_id,
            asset_in = %intent.asset_in,
            amount_in = %intent.amount_in,
            min_amount_out = %intent.min_amount_out,
            "swap execution started"
        );

        if let Err(failure) = self.run(signer, intent, quote, &mut execution).await {
            self.fail(&mut execution, failure);
        }
        execution
    }

    async fn run(
        &self,
        signer: &dyn WalletSigner,
        intent: &SwapIntent,
        quote: &Quote,
        execution: &mut SwapExecution,
    ) -> Result<(), ExecutionFailure> {
        check_preconditions(signer, intent, quote, Utc::now())?;
        self.transition(execution, SwapState::Approving)?;
        self.ensure_allowance(signer, intent, execution).await?;

        let request = SwapCallRequest {
            asset_in: intent.asset_in,
            asset_out: intent.asset_out,
            recipient: intent.owner.clone(),
            amount_in: intent.amount_in,
            min_amount_out: intent.min_amount_out,
            deadline: intent.deadline,
        };
        let call = self.venue.build_swap_call(&request).await.map_err(|e| {
            ExecutionFailure::new(ErrorKind::SwapReverted, format!("swap call not built: {e}"))
        })?;

        let tx_id = self.send(signer, &call).await.map_err(|e| match e {
            ChainError::Rejected(reason) => ExecutionFailure::new(
                ErrorKind::SwapReverted,
                format!("swap rejected before broadcast: {reason}"),
            ),
            other => ExecutionFailure::new(
                ErrorKind::ConfirmationTimeout,
                format!("swap broadcast outcome unknown: {other}"),
            ),
        })?;
        execution.swap_tx_id = Some(tx_id.clone());
        self.transition(execution, SwapState::Submitted)?;
        self.transition(execution, SwapState::Confirming)?;

        let receipt = match self.await_receipt(signer, &tx_id, intent.deadline).await {
            Some(receipt) => receipt,
            None => {
                return Err(ExecutionFailure::new(
                    ErrorKind::ConfirmationTimeout,
                    format!("no receipt for {tx_id} within the polling budget"),
                ));
            }
        };
        if receipt.status == ReceiptStatus::Reverted {
            return Err(ExecutionFailure::new(
                ErrorKind::SwapReverted,
                format!("swap {tx_id} reverted in block {}", receipt.block_number),
            ));
        }

        let actual = verified_output(&receipt, intent)?;
        execution.amount_out_actual = Some(actual);
        self.transition(execution, SwapState::Success)?;
        tracing::info!(
            execution_id = %execution.id,
            %tx_id,
            amount_out = %actual,
            "swap confirmed"
        );
        Ok(())
    }

    async fn ensure_allowance(
        &self,
        signer: &dyn WalletSigner,
        intent: &SwapIntent,
        execution: &mut SwapExecution,
    ) -> Result<(), ExecutionFailure> {
        let spender = self.venue.spender();
        let allowance = signer
            .get_allowance(&intent.owner, &spender, intent.asset_in)
            .await
            .map_err(|e| {
                ExecutionFailure::new(ErrorKind::ApprovalFailed, format!("allowance unreadable: {e}"))
            })?;

        if allowance >= intent.amount_in {
            execution.approval_skipped = true;
            tracing::info!(
                execution_id = %execution.id,
                %allowance,
                "existing allowance covers swap, approval skipped"
            );
            let _ = self.events.publish(LedgerEvent::ApprovalSkipped {
                user_id: execution.user_id,
                execution_id: execution.id,
                allowance: allowance.to_string(),
                timestamp: Utc::now(),
            });
            return Ok(());
        }

        let amount = intent.amount_in * Decimal::TWO;
        let call = self
            .venue
            .build_approve_call(intent.asset_in, &spender, amount)
            .await
            .map_err(|e| {
                ExecutionFailure::new(ErrorKind::ApprovalFailed, format!("approval not built: {e}"))
            })?;
        let tx_id = self.send(signer, &call).await.map_err(|e| {
            ExecutionFailure::new(ErrorKind::ApprovalFailed, format!("approval not sent: {e}"))
        })?;
        execution.approval_tx_id = Some(tx_id.clone());
        tracing::info!(execution_id = %execution.id, %tx_id, %amount, "approval sent");

        match self.await_receipt(signer, &tx_id, intent.deadline).await {
            Some(receipt) if receipt.status == ReceiptStatus::Success => Ok(()),
            Some(_) => Err(ExecutionFailure::new(
                ErrorKind::ApprovalFailed,
                format!("approval {tx_id} reverted"),
            )),
            None => Err(ExecutionFailure::new(
                ErrorKind::ApprovalFailed,
                format!("approval {tx_id} not confirmed within the polling budget"),
            )),
        }
    }

    async fn send(&self, signer: &dyn WalletSigner, call: &ChainCall) -> Result<TxId, ChainError> {
        match tokio::time::timeout(self.config.send_timeout, signer.send(call)).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Timeout(format!(
                "{} not acknowledged within {:?}",
                call.description, self.config.send_timeout
            ))),
        }
    }

    /// Polls for a receipt until one arrives, attempts run out, or the
    /// deadline plus grace passes. Read errors count as a pending poll.
    async fn await_receipt(
        &self,
        signer: &dyn WalletSigner,
        tx_id: &TxId,
        deadline: DateTime<Utc>,
    ) -> Option<Receipt> {
        let grace = chrono::Duration::from_std(self.config.deadline_grace).unwrap_or_default();
        let limit = deadline + grace;

        for attempt in 1..=self.config.receipt_max_attempts {
            if Utc::now() > limit {
                tracing::warn!(%tx_id, attempt, "intent deadline passed while polling");
                break;
            }
            let poll =
                tokio::time::timeout(self.config.send_timeout, signer.wait_for_receipt(tx_id)).await;
            match poll {
                Ok(Ok(Some(receipt))) => return Some(receipt),
                Ok(Ok(None)) => tracing::debug!(%tx_id, attempt, "receipt pending"),
                Ok(Err(e)) => tracing::warn!(%tx_id, attempt, error = %e, "receipt poll failed"),
                Err(_) => tracing::warn!(%tx_id, attempt, "receipt poll timed out"),
            }
            if attempt < self.config.receipt_max_attempts {
                tokio::time::sleep(self.config.receipt_poll_interval).await;
            }
        }
        None
    }

    fn transition(
        &self,
        execution: &mut SwapExecution,
        next: SwapState,
    ) -> Result<(), ExecutionFailure> {
        let from = execution.state;
        if let Err(e) = execution.advance(next, Utc::now()) {
            tracing::error!(
                execution_id = %execution.id,
                error = %e,
                "executor state machine violated"
            );
            return Err(ExecutionFailure::new(ErrorKind::Internal, e.to_string()));
        }
        tracing::info!(execution_id = %execution.id, from = ?from, to = ?next, "swap state changed");
        self.publish_state(execution);
        Ok(())
    }

    fn fail(&self, execution: &mut SwapExecution, failure: ExecutionFailure) {
        let kind = failure.kind;
        let message = failure.message.clone();
        if let Err(e) = execution.fail(failure, Utc::now()) {
            tracing::error!(execution_id = %execution.id, error = %e, "failure on terminal execution");
            return;
        }
        tracing::warn!(
            execution_id = %execution.id,
            kind = %kind,
            indeterminate = kind.is_indeterminate(),
            approval_tx_id = ?execution.approval_tx_id,
            swap_tx_id = ?execution.swap_tx_id,
            %message,
            "swap execution failed"
        );
        self.publish_state(execution);
    }

    fn publish_state(&self, execution: &SwapExecution) {
        let _ = self.events.publish(LedgerEvent::SwapStateChanged {
            user_id: execution.user_id,
            execution_id: execution.id,
            state: execution.state,
            tx_id: execution
                .swap_tx_id
                .clone()
                .or_else(|| execution.approval_tx_id.clone()),
            error: execution.error.as_ref().map(|f| f.kind),
            timestamp: execution.updated_at,
        });
    }
}

fn check_preconditions(
    signer: &dyn WalletSigner,
    intent: &SwapIntent,
    quote: &Quote,
    now: DateTime<Utc>,
) -> Result<(), ExecutionFailure> {
    if quote.is_fallback() {
        return Err(ExecutionFailure::new(
            ErrorKind::QuoteIsFallback,
            format!("quote {} is a display-only estimate", quote.id()),
        ));
    }
    if quote.is_expired_at(now) {
        return Err(ExecutionFailure::new(
            ErrorKind::QuoteExpired,
            format!("quote {} expired at {}", quote.id(), quote.valid_until()),
        ));
    }
    if let Some(reason) = intent.mismatch_with(quote) {
        return Err(ExecutionFailure::new(ErrorKind::IntentMismatch, reason));
    }
    if now > intent.deadline {
        return Err(ExecutionFailure::new(
            ErrorKind::IntentMismatch,
            format!("intent deadline {} already passed", intent.deadline),
        ));
    }
    let signer_address = signer.address();
    if signer_address != intent.owner {
        return Err(ExecutionFailure::new(
            ErrorKind::IntentMismatch,
            format!("signer {signer_address} does not own intent wallet {}", intent.owner),
        ));
    }
    Ok(())
}

fn verified_output(receipt: &Receipt, intent: &SwapIntent) -> Result<Decimal, ExecutionFailure> {
    let Some(actual) = receipt.received(intent.asset_out, &intent.owner) else {
        return Err(ExecutionFailure::new(
            ErrorKind::OutputUnverified,
            format!(
                "receipt {} logs no {} transfer to {}",
                receipt.tx_id, intent.asset_out, intent.owner
            ),
        ));
    };
    if actual < intent.min_amount_out {
        return Err(ExecutionFailure::new(
            ErrorKind::OutputUnverified,
            format!(
                "delivered {actual} below minimum {} in {}",
                intent.min_amount_out, receipt.tx_id
            ),
        ));
    }
    Ok(actual)
}
