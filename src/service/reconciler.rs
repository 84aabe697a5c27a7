//! Ledger reconciler: the only writer of holdings.
//!
//! Every movement is applied with optimistic concurrency. The holding is
//! read with its version, the new holding and its record are computed in
//! memory, and both are committed in one [`LedgerStore::commit`] that fails
//! if another writer got there first. Losers re-read and retry.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::config::LedgerConfig;
use crate::decimal;
use crate::domain::{
    EventBus, Holding, LedgerEvent, LedgerKind, SwapExecution, TransactionRecord, TxId, TxRef,
    TxStatus, UserId,
};
use crate::error::GatewayError;
use crate::ports::{LedgerCommit, LedgerStore, StoreError};

/// One movement to apply.
#[derive(Debug, Clone)]
pub struct Movement {
    /// Holding owner.
    pub user_id: UserId,
    /// Direction.
    pub kind: LedgerKind,
    /// Gold-token quantity.
    pub amount_token: Decimal,
    /// Fiat paid, received, or frozen gift value.
    pub amount_fiat: Decimal,
    /// Idempotency key.
    pub tx_ref: TxRef,
    /// Chain transaction, for swaps.
    pub chain_tx: Option<TxId>,
}

/// Outcome of [`LedgerReconciler::reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Holding after the movement (or as stored, when already processed).
    pub holding: Holding,
    /// The record for `tx_ref`.
    pub record: TransactionRecord,
    /// `true` when `tx_ref` had already been applied and nothing changed.
    pub already_processed: bool,
}

/// Applies movements to holdings, once per `tx_ref`.
#[derive(Debug, Clone)]
pub struct LedgerReconciler {
    store: Arc<dyn LedgerStore>,
    events: EventBus,
    config: LedgerConfig,
}

impl LedgerReconciler {
    /// Creates a new `LedgerReconciler`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, events: EventBus, config: LedgerConfig) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    /// Applies `movement` unless its `tx_ref` was applied before.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InsufficientBalance`] when a debit exceeds the
    ///   holding; nothing is written.
    /// - [`GatewayError::InvalidAmount`] for non-positive amounts.
    /// - [`GatewayError::InvalidRequest`] when `tx_ref` already belongs to
    ///   another user or to a failed record.
    /// - [`GatewayError::VersionConflict`] when concurrent writers won every
    ///   attempt.
    /// - [`GatewayError::PersistenceError`] on store failure.
    pub async fn reconcile(&self, movement: Movement) -> Result<Reconciled, GatewayError> {
        let attempts = self.config.max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            if let Some(existing) = self.store.get_record(&movement.tx_ref).await? {
                return self.already_processed(&movement, existing).await;
            }

            let current = self
                .store
                .get_holding(movement.user_id)
                .await?
                .unwrap_or_else(|| Holding::empty(movement.user_id));
            let applied = current.apply(
                movement.kind,
                movement.amount_token,
                movement.amount_fiat,
                Utc::now(),
            )?;
            let record = TransactionRecord::completed(
                movement.tx_ref.clone(),
                movement.kind,
                decimal::round_token(movement.amount_token),
                decimal::round_fiat(movement.amount_fiat),
                &applied,
            )
            .with_chain_tx(movement.chain_tx.clone());

            let commit = LedgerCommit {
                expected_version: current.version,
                holding: applied.holding.clone(),
                record: record.clone(),
            };
            match self.store.commit(commit).await {
                Ok(()) => {
                    tracing::info!(
                        user_id = %movement.user_id,
                        tx_ref = %movement.tx_ref,
                        kind = movement.kind.as_str(),
                        quantity = %applied.holding.quantity,
                        total_invested = %applied.holding.total_invested,
                        version = applied.holding.version,
                        "holding reconciled"
                    );
                    let _ = self.events.publish(LedgerEvent::HoldingReconciled {
                        user_id: movement.user_id,
                        tx_ref: movement.tx_ref.clone(),
                        kind: movement.kind,
                        quantity: applied.holding.quantity.to_string(),
                        total_invested: applied.holding.total_invested.to_string(),
                        timestamp: applied.holding.updated_at,
                    });
                    return Ok(Reconciled {
                        holding: applied.holding,
                        record,
                        already_processed: false,
                    });
                }
                Err(StoreError::VersionConflict(_)) => {
                    tracing::debug!(
                        user_id = %movement.user_id,
                        tx_ref = %movement.tx_ref,
                        attempt,
                        "holding version conflict, retrying"
                    );
                    tokio::task::yield_now().await;
                }
                // A concurrent writer committed the same tx_ref; the next
                // pass returns it as already processed.
                Err(StoreError::AlreadyExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            user_id = %movement.user_id,
            tx_ref = %movement.tx_ref,
            attempts,
            "holding update abandoned after repeated conflicts"
        );
        Err(GatewayError::VersionConflict(movement.user_id))
    }

    async fn already_processed(
        &self,
        movement: &Movement,
        existing: TransactionRecord,
    ) -> Result<Reconciled, GatewayError> {
        if existing.user_id != movement.user_id {
            return Err(GatewayError::InvalidRequest(format!(
                "transaction {} belongs to another user",
                movement.tx_ref
            )));
        }
        if existing.status == TxStatus::Failed {
            return Err(GatewayError::InvalidRequest(format!(
                "transaction {} was recorded as failed",
                movement.tx_ref
            )));
        }
        tracing::info!(
            user_id = %movement.user_id,
            tx_ref = %movement.tx_ref,
            "movement already reconciled"
        );
        Ok(Reconciled {
            holding: self.holding(movement.user_id).await?,
            record: existing,
            already_processed: true,
        })
    }

    /// Persists a failed record for `execution` without touching the
    /// holding. Keyed by execution id so the chain hash stays free for a
    /// later out-of-band reconciliation.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on store failure.
    pub async fn record_failure(
        &self,
        execution: &SwapExecution,
        kind: LedgerKind,
        amount_token: Decimal,
        amount_fiat: Decimal,
    ) -> Result<TransactionRecord, GatewayError> {
        let message = execution
            .error
            .as_ref()
            .map_or_else(|| "execution failed".to_string(), |f| format!("{}: {}", f.kind, f.message));
        self.record_abandoned(execution, kind, amount_token, amount_fiat, message)
            .await
    }

    /// Persists a failed record for a swap that settled on-chain but could
    /// not be applied to the holding, so it shows up in the user's history
    /// with its chain hash.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on store failure.
    pub async fn record_unreconciled(
        &self,
        execution: &SwapExecution,
        kind: LedgerKind,
        amount_token: Decimal,
        amount_fiat: Decimal,
        reason: &GatewayError,
    ) -> Result<TransactionRecord, GatewayError> {
        self.record_abandoned(
            execution,
            kind,
            amount_token,
            amount_fiat,
            format!("settled on-chain, ledger not updated: {reason}"),
        )
        .await
    }

    async fn record_abandoned(
        &self,
        execution: &SwapExecution,
        kind: LedgerKind,
        amount_token: Decimal,
        amount_fiat: Decimal,
        message: String,
    ) -> Result<TransactionRecord, GatewayError> {
        let tx_ref = TxRef::execution(execution.id);
        let record = TransactionRecord::failed(
            execution.user_id,
            tx_ref.clone(),
            kind,
            decimal::round_token(amount_token),
            decimal::round_fiat(amount_fiat),
            message,
        )
        .with_chain_tx(execution.swap_tx_id.clone());

        if self.store.insert_record_if_absent(record.clone()).await? {
            tracing::info!(user_id = %execution.user_id, %tx_ref, "failed execution recorded");
            return Ok(record);
        }
        Ok(self.store.get_record(&tx_ref).await?.unwrap_or(record))
    }

    /// Current holding of `user_id`; an empty one if none is stored.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on store failure.
    pub async fn holding(&self, user_id: UserId) -> Result<Holding, GatewayError> {
        Ok(self
            .store
            .get_holding(user_id)
            .await?
            .unwrap_or_else(|| Holding::empty(user_id)))
    }

    /// Page of `user_id`'s records, newest first, with the total count.
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
        Ok(self.store.list_records(user_id, offset, limit).await?)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::memory::MemoryLedgerStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn reconciler(store: Arc<dyn LedgerStore>) -> LedgerReconciler {
        LedgerReconciler::new(store, EventBus::new(64), LedgerConfig::default())
    }

    fn movement(user_id: UserId, kind: LedgerKind, token: Decimal, fiat: Decimal, tx: &str) -> Movement {
        Movement {
            user_id,
            kind,
            amount_token: token,
            amount_fiat: fiat,
            tx_ref: TxRef::from(tx),
            chain_tx: None,
        }
    }

    #[tokio::test]
    async fn reconcile_is_idempotent_on_tx_ref() {
        let store = Arc::new(MemoryLedgerStore::new());
        let ledger = reconciler(Arc::clone(&store) as Arc<dyn LedgerStore>);
        let user = UserId::new();

        let Ok(first) = ledger
            .reconcile(movement(user, LedgerKind::Buy, dec!(1.428571), dec!(10000), "0xa"))
            .await
        else {
            panic!("first reconcile failed");
        };
        let Ok(second) = ledger
            .reconcile(movement(user, LedgerKind::Buy, dec!(1.428571), dec!(10000), "0xa"))
            .await
        else {
            panic!("second reconcile failed");
        };

        assert!(!first.already_processed);
        assert!(second.already_processed);
        assert_eq!(first.holding, second.holding);
        let Ok((records, total)) = ledger.transactions(user, 0, 10).await else {
            panic!("list failed");
        };
        assert_eq!(total, 1);
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn oversell_leaves_holding_unchanged() {
        let store = Arc::new(MemoryLedgerStore::new());
        let ledger = reconciler(Arc::clone(&store) as Arc<dyn LedgerStore>);
        let user = UserId::new();
        let Ok(bought) = ledger
            .reconcile(movement(user, LedgerKind::Buy, dec!(1), dec!(7000), "0xa"))
            .await
        else {
            panic!("buy failed");
        };

        let result = ledger
            .reconcile(movement(user, LedgerKind::Sell, dec!(2), dec!(14000), "0xb"))
            .await;
        assert!(matches!(result, Err(GatewayError::InsufficientBalance { .. })));

        let Ok(after) = ledger.holding(user).await else {
            panic!("holding read failed");
        };
        assert_eq!(after, bought.holding);
        assert!(matches!(store.get_record(&TxRef::from("0xb")).await, Ok(None)));
    }

    #[tokio::test]
    async fn amounts_below_token_scale_are_not_booked() {
        let store = Arc::new(MemoryLedgerStore::new());
        let ledger = reconciler(Arc::clone(&store) as Arc<dyn LedgerStore>);
        let user = UserId::new();

        let buy = ledger
            .reconcile(movement(user, LedgerKind::Buy, dec!(0.0000001), dec!(100), "0xa"))
            .await;
        assert!(matches!(buy, Err(GatewayError::InvalidAmount(_))));
        let sell = ledger
            .reconcile(movement(user, LedgerKind::Sell, dec!(0.0000004), dec!(50), "0xb"))
            .await;
        assert!(matches!(sell, Err(GatewayError::InvalidAmount(_))));

        let Ok(holding) = ledger.holding(user).await else {
            panic!("holding read failed");
        };
        assert!(holding.quantity.is_zero());
        assert!(holding.total_invested.is_zero());
        assert!(holding.realized_pnl.is_zero());
        let Ok((_, total)) = ledger.transactions(user, 0, 10).await else {
            panic!("list failed");
        };
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn sell_record_carries_realized_pnl() {
        let store = Arc::new(MemoryLedgerStore::new());
        let ledger = reconciler(Arc::clone(&store) as Arc<dyn LedgerStore>);
        let user = UserId::new();
        let _ = ledger
            .reconcile(movement(user, LedgerKind::Buy, dec!(1), dec!(7000), "0xa"))
            .await;
        let Ok(sold) = ledger
            .reconcile(movement(user, LedgerKind::Sell, dec!(0.5), dec!(3600), "0xb"))
            .await
        else {
            panic!("sell failed");
        };
        assert_eq!(sold.record.amount_token, dec!(0.5));
        assert_eq!(sold.record.cost_basis_delta, dec!(-3500));
        assert_eq!(sold.record.realized_pnl, Some(dec!(100)));
        assert_eq!(sold.holding.realized_pnl, dec!(100));
    }

    #[tokio::test]
    async fn concurrent_oversubscribed_sells_admit_one() {
        let store = Arc::new(MemoryLedgerStore::new());
        let ledger = Arc::new(reconciler(Arc::clone(&store) as Arc<dyn LedgerStore>));
        let user = UserId::new();
        let _ = ledger
            .reconcile(movement(user, LedgerKind::Buy, dec!(1), dec!(7000), "0xa"))
            .await;

        let l1 = Arc::clone(&ledger);
        let l2 = Arc::clone(&ledger);
        let first = tokio::spawn(async move {
            l1.reconcile(movement(user, LedgerKind::Sell, dec!(0.6), dec!(4200), "0xs1"))
                .await
        });
        let second = tokio::spawn(async move {
            l2.reconcile(movement(user, LedgerKind::Sell, dec!(0.6), dec!(4200), "0xs2"))
                .await
        });
        let (Ok(r1), Ok(r2)) = (first.await, second.await) else {
            panic!("task panicked");
        };

        let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
        let insufficient = [&r1, &r2]
            .iter()
            .filter(|r| matches!(r, Err(GatewayError::InsufficientBalance { .. })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(insufficient, 1);

        let Ok(after) = ledger.holding(user).await else {
            panic!("holding read failed");
        };
        assert_eq!(after.quantity, dec!(0.4));
    }

    /// Store that reports a version conflict on every commit.
    #[derive(Debug, Default)]
    struct ContendedStore {
        inner: MemoryLedgerStore,
        commits: AtomicU32,
    }

    #[async_trait]
    impl LedgerStore for ContendedStore {
        async fn get_holding(&self, user_id: UserId) -> Result<Option<Holding>, StoreError> {
            self.inner.get_holding(user_id).await
        }
        async fn get_record(&self, tx_ref: &TxRef) -> Result<Option<TransactionRecord>, StoreError> {
            self.inner.get_record(tx_ref).await
        }
        async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::VersionConflict(commit.holding.user_id))
        }
        async fn insert_record_if_absent(
            &self,
            record: TransactionRecord,
        ) -> Result<bool, StoreError> {
            self.inner.insert_record_if_absent(record).await
        }
        async fn list_records(
            &self,
            user_id: UserId,
            offset: usize,
            limit: usize,
        ) -> Result<(Vec<TransactionRecord>, usize), StoreError> {
            self.inner.list_records(user_id, offset, limit).await
        }
    }

    #[tokio::test]
    async fn persistent_conflict_is_surfaced_after_retries() {
        let store = Arc::new(ContendedStore::default());
        let ledger = reconciler(Arc::clone(&store) as Arc<dyn LedgerStore>);
        let user = UserId::new();

        let result = ledger
            .reconcile(movement(user, LedgerKind::Buy, dec!(1), dec!(7000), "0xa"))
            .await;
        assert!(matches!(result, Err(GatewayError::VersionConflict(u)) if u == user));
        assert_eq!(store.commits.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn failed_execution_record_leaves_holding_alone() {
        use crate::decimal::Asset;
        use crate::domain::{ErrorKind, ExecutionFailure, Quote, SwapIntent, WalletAddress};

        let store = Arc::new(MemoryLedgerStore::new());
        let ledger = reconciler(Arc::clone(&store) as Arc<dyn LedgerStore>);
        let user = UserId::new();
        let quote = Quote::new(
            (Asset::Stable, Asset::Gold),
            dec!(7000),
            dec!(1),
            50,
            dec!(21),
            Utc::now(),
            chrono::Duration::seconds(60),
        );
        let intent = SwapIntent::from_quote(
            user,
            WalletAddress::from("0xuser"),
            &quote,
            Utc::now(),
            chrono::Duration::minutes(5),
        );
        let mut execution = SwapExecution::new(&intent);
        let _ = execution.fail(
            ExecutionFailure::new(ErrorKind::SwapReverted, "reverted"),
            Utc::now(),
        );

        let Ok(record) = ledger
            .record_failure(&execution, LedgerKind::Buy, dec!(1), dec!(7000))
            .await
        else {
            panic!("record failed");
        };
        assert_eq!(record.status, TxStatus::Failed);
        assert_eq!(record.tx_ref, TxRef::execution(execution.id));
        assert!(matches!(store.get_holding(user).await, Ok(None)));

        let again = ledger
            .reconcile(Movement {
                tx_ref: TxRef::execution(execution.id),
                ..movement(user, LedgerKind::Buy, dec!(1), dec!(7000), "unused")
            })
            .await;
        assert!(matches!(again, Err(GatewayError::InvalidRequest(_))));
    }
}
