//! Ledger, escrow and recipient storage.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ClaimToken, GiftEscrow, GiftId, GiftStatus, Holding, TransactionRecord, TxRef, UserId,
};

/// Failure reported by a store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The holding's stored version differs from the expected one.
    #[error("version conflict on holding of {0}")]
    VersionConflict(UserId),

    /// A record with this `tx_ref` already exists.
    #[error("record {0} already exists")]
    AlreadyExists(TxRef),

    /// Backend failure.
    #[error("store backend: {0}")]
    Backend(String),
}

/// One atomic ledger write: replace the holding if its stored version is
/// still `expected_version`, and insert `record` if its `tx_ref` is new.
/// Either both happen or neither does.
#[derive(Debug, Clone)]
pub struct LedgerCommit {
    /// Version read before computing `holding`; 0 when none was stored.
    pub expected_version: u64,
    /// New holding; its `version` is `expected_version + 1`.
    pub holding: Holding,
    /// Record of the movement.
    pub record: TransactionRecord,
}

/// Holdings and transaction history.
#[async_trait]
pub trait LedgerStore: Send + Sync + fmt::Debug {
    /// Stored holding of `user_id`, if any.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn get_holding(&self, user_id: UserId) -> Result<Option<Holding>, StoreError>;

    /// Record with the given idempotency key, if any.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn get_record(&self, tx_ref: &TxRef) -> Result<Option<TransactionRecord>, StoreError>;

    /// Applies `commit` atomically.
    ///
    /// # Errors
    ///
    /// [`StoreError::VersionConflict`] when the holding moved on,
    /// [`StoreError::AlreadyExists`] when the record's `tx_ref` is taken,
    /// [`StoreError::Backend`] on storage failure. Nothing is written in any
    /// error case.
    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError>;

    /// Inserts a record that does not touch the holding. Returns `false`
    /// when the `tx_ref` was already taken.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn insert_record_if_absent(&self, record: TransactionRecord) -> Result<bool, StoreError>;

    /// Page of `user_id`'s records, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn list_records(
        &self,
        user_id: UserId,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<TransactionRecord>, usize), StoreError>;
}

/// Gift escrow storage.
#[async_trait]
pub trait EscrowStore: Send + Sync + fmt::Debug {
    /// Persists a new escrow.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn insert(&self, escrow: GiftEscrow) -> Result<(), StoreError>;

    /// Escrow holding `token`, if any.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn find_by_token(&self, token: &ClaimToken) -> Result<Option<GiftEscrow>, StoreError>;

    /// Escrow by id, if any.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn get(&self, id: GiftId) -> Result<Option<GiftEscrow>, StoreError>;

    /// Moves the escrow from `expected` to `next` only if it is still in
    /// `expected`, recording `claimed_by` and the transition time. Returns
    /// whether the transition happened.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn compare_and_set_status(
        &self,
        id: GiftId,
        expected: GiftStatus,
        next: GiftStatus,
        claimed_by: Option<UserId>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Escrows funded by `sender_id`, newest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn list_by_sender(&self, sender_id: UserId) -> Result<Vec<GiftEscrow>, StoreError>;
}

/// Maps recipient emails to known ledger users.
#[async_trait]
pub trait RecipientDirectory: Send + Sync + fmt::Debug {
    /// Ledger user registered under `email`, if any.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn lookup_email(&self, email: &str) -> Result<Option<UserId>, StoreError>;

    /// Registers `email` for `user_id`, replacing any previous owner.
    /// Emails are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on storage failure.
    async fn register(&self, email: &str, user_id: UserId) -> Result<(), StoreError>;
}
