//! In-process stores used when persistence is disabled and in tests.
//!
//! Each store keeps its whole state behind one [`tokio::sync::RwLock`], so
//! a ledger commit checks the holding version and the record key under the
//! same write guard.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{
    ClaimToken, GiftEscrow, GiftId, GiftStatus, Holding, TransactionRecord, TxRef, UserId,
};
use crate::ports::{EscrowStore, LedgerCommit, LedgerStore, RecipientDirectory, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    holdings: HashMap<UserId, Holding>,
    records: Vec<TransactionRecord>,
    by_ref: HashMap<TxRef, usize>,
}

impl LedgerState {
    fn push_record(&mut self, record: TransactionRecord) {
        self.by_ref.insert(record.tx_ref.clone(), self.records.len());
        self.records.push(record);
    }
}

/// In-memory [`LedgerStore`].
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_holding(&self, user_id: UserId) -> Result<Option<Holding>, StoreError> {
        Ok(self.state.read().await.holdings.get(&user_id).cloned())
    }

    async fn get_record(&self, tx_ref: &TxRef) -> Result<Option<TransactionRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .by_ref
            .get(tx_ref)
            .and_then(|&i| state.records.get(i))
            .cloned())
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let user_id = commit.holding.user_id;
        let stored_version = state.holdings.get(&user_id).map_or(0, |h| h.version);
        if stored_version != commit.expected_version {
            return Err(StoreError::VersionConflict(user_id));
        }
        if state.by_ref.contains_key(&commit.record.tx_ref) {
            return Err(StoreError::AlreadyExists(commit.record.tx_ref));
        }
        state.holdings.insert(user_id, commit.holding);
        state.push_record(commit.record);
        Ok(())
    }

    async fn insert_record_if_absent(&self, record: TransactionRecord) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.by_ref.contains_key(&record.tx_ref) {
            return Ok(false);
        }
        state.push_record(record);
        Ok(true)
    }

    async fn list_records(
        &self,
        user_id: UserId,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<TransactionRecord>, usize), StoreError> {
        let state = self.state.read().await;
        let mine: Vec<&TransactionRecord> = state
            .records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .collect();
        let total = mine.len();
        let page = mine.into_iter().skip(offset).take(limit).cloned().collect();
        Ok((page, total))
    }
}

/// In-memory [`EscrowStore`].
#[derive(Debug, Default)]
pub struct MemoryEscrowStore {
    escrows: RwLock<HashMap<GiftId, GiftEscrow>>,
}

impl MemoryEscrowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EscrowStore for MemoryEscrowStore {
    async fn insert(&self, escrow: GiftEscrow) -> Result<(), StoreError> {
        self.escrows.write().await.insert(escrow.id, escrow);
        Ok(())
    }

    async fn find_by_token(&self, token: &ClaimToken) -> Result<Option<GiftEscrow>, StoreError> {
        Ok(self
            .escrows
            .read()
            .await
            .values()
            .find(|e| &e.claim_token == token)
            .cloned())
    }

    async fn get(&self, id: GiftId) -> Result<Option<GiftEscrow>, StoreError> {
        Ok(self.escrows.read().await.get(&id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: GiftId,
        expected: GiftStatus,
        next: GiftStatus,
        claimed_by: Option<UserId>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut escrows = self.escrows.write().await;
        let Some(escrow) = escrows.get_mut(&id) else {
            return Ok(false);
        };
        if escrow.status != expected {
            return Ok(false);
        }
        escrow.status = next;
        escrow.claimed_by = claimed_by;
        escrow.resolved_at = Some(at);
        Ok(true)
    }

    async fn list_by_sender(&self, sender_id: UserId) -> Result<Vec<GiftEscrow>, StoreError> {
        let mut sent: Vec<GiftEscrow> = self
            .escrows
            .read()
            .await
            .values()
            .filter(|e| e.sender_id == sender_id)
            .cloned()
            .collect();
        sent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sent)
    }
}

/// In-memory [`RecipientDirectory`].
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<String, UserId>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipientDirectory for MemoryDirectory {
    async fn lookup_email(&self, email: &str) -> Result<Option<UserId>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .get(&email.trim().to_ascii_lowercase())
            .copied())
    }

    async fn register(&self, email: &str, user_id: UserId) -> Result<(), StoreError> {
        self.users
            .write()
            .await
            .insert(email.trim().to_ascii_lowercase(), user_id);
        Ok(())
    }
}
