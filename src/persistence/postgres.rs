//! PostgreSQL implementation of the ledger, escrow and recipient stores.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{GiftEscrowRow, HoldingRow, TransactionRow};
use crate::domain::{
    ClaimToken, GiftEscrow, GiftId, GiftStatus, Holding, TransactionRecord, TxRef, UserId,
};
use crate::ports::{EscrowStore, LedgerCommit, LedgerStore, RecipientDirectory, StoreError};

const HOLDING_COLUMNS: &str =
    "user_id, quantity, total_invested, realized_pnl, version, updated_at";

const TRANSACTION_COLUMNS: &str = "id, tx_ref, user_id, kind, status, amount_token, amount_fiat, \
     price_used, cost_basis_delta, realized_pnl, chain_tx_hash, error, created_at, completed_at";

const ESCROW_COLUMNS: &str = "id, claim_token, sender_id, recipient_email, amount_token, \
     amount_fiat, message, created_at, expires_at, status, claimed_by, resolved_at";

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// PostgreSQL-backed stores sharing one `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and applies the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the database is unreachable or a
    /// migration fails.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await
            .map_err(backend)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

async fn insert_record<'e, E>(executor: E, record: &TransactionRecord) -> Result<u64, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT INTO transactions (id, tx_ref, user_id, kind, status, amount_token, amount_fiat, \
         price_used, cost_basis_delta, realized_pnl, chain_tx_hash, error, created_at, completed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (tx_ref) DO NOTHING",
    )
    .bind(record.id.as_uuid())
    .bind(record.tx_ref.as_str())
    .bind(record.user_id.as_uuid())
    .bind(record.kind.as_str())
    .bind(record.status.as_str())
    .bind(record.amount_token)
    .bind(record.amount_fiat)
    .bind(record.price_used)
    .bind(record.cost_basis_delta)
    .bind(record.realized_pnl)
    .bind(record.chain_tx_hash.as_ref().map(|t| t.as_str().to_string()))
    .bind(record.error.as_deref())
    .bind(record.created_at)
    .bind(record.completed_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn get_holding(&self, user_id: UserId) -> Result<Option<Holding>, StoreError> {
        let row = sqlx::query_as::<_, HoldingRow>(&format!(
            "SELECT {HOLDING_COLUMNS} FROM holdings WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(Holding::try_from).transpose()
    }

    async fn get_record(&self, tx_ref: &TxRef) -> Result<Option<TransactionRecord>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE tx_ref = $1"
        ))
        .bind(tx_ref.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(TransactionRecord::try_from).transpose()
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError> {
        let holding = &commit.holding;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let written = if commit.expected_version == 0 {
            sqlx::query(
                "INSERT INTO holdings (user_id, quantity, total_invested, realized_pnl, version, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (user_id) DO NOTHING",
            )
            .bind(holding.user_id.as_uuid())
            .bind(holding.quantity)
            .bind(holding.total_invested)
            .bind(holding.realized_pnl)
            .bind(to_i64(holding.version))
            .bind(holding.updated_at)
            .execute(&mut *tx)
            .await
        } else {
            sqlx::query(
                "UPDATE holdings SET quantity = $2, total_invested = $3, realized_pnl = $4, \
                 version = $5, updated_at = $6 WHERE user_id = $1 AND version = $7",
            )
            .bind(holding.user_id.as_uuid())
            .bind(holding.quantity)
            .bind(holding.total_invested)
            .bind(holding.realized_pnl)
            .bind(to_i64(holding.version))
            .bind(holding.updated_at)
            .bind(to_i64(commit.expected_version))
            .execute(&mut *tx)
            .await
        }
        .map_err(backend)?
        .rows_affected();

        if written == 0 {
            tx.rollback().await.map_err(backend)?;
            return Err(StoreError::VersionConflict(holding.user_id));
        }

        if insert_record(&mut *tx, &commit.record).await.map_err(backend)? == 0 {
            tx.rollback().await.map_err(backend)?;
            return Err(StoreError::AlreadyExists(commit.record.tx_ref));
        }

        tx.commit().await.map_err(backend)
    }

    async fn insert_record_if_absent(&self, record: TransactionRecord) -> Result<bool, StoreError> {
        let inserted = insert_record(&self.pool, &record).await.map_err(backend)?;
        Ok(inserted > 0)
    }

    async fn list_records(
        &self,
        user_id: UserId,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<TransactionRecord>, usize), StoreError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let records = rows
            .into_iter()
            .map(TransactionRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, usize::try_from(total).unwrap_or(0)))
    }
}

#[async_trait]
impl EscrowStore for PostgresStore {
    async fn insert(&self, escrow: GiftEscrow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO gift_escrows (id, claim_token, sender_id, recipient_email, amount_token, \
             amount_fiat, message, created_at, expires_at, status, claimed_by, resolved_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(escrow.id.as_uuid())
        .bind(escrow.claim_token.as_str())
        .bind(escrow.sender_id.as_uuid())
        .bind(&escrow.recipient_email)
        .bind(escrow.amount_token)
        .bind(escrow.amount_fiat)
        .bind(escrow.message.as_deref())
        .bind(escrow.created_at)
        .bind(escrow.expires_at)
        .bind(escrow.status.as_str())
        .bind(escrow.claimed_by.map(|u| *u.as_uuid()))
        .bind(escrow.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn find_by_token(&self, token: &ClaimToken) -> Result<Option<GiftEscrow>, StoreError> {
        let row = sqlx::query_as::<_, GiftEscrowRow>(&format!(
            "SELECT {ESCROW_COLUMNS} FROM gift_escrows WHERE claim_token = $1"
        ))
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(GiftEscrow::try_from).transpose()
    }

    async fn get(&self, id: GiftId) -> Result<Option<GiftEscrow>, StoreError> {
        let row = sqlx::query_as::<_, GiftEscrowRow>(&format!(
            "SELECT {ESCROW_COLUMNS} FROM gift_escrows WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(GiftEscrow::try_from).transpose()
    }

    async fn compare_and_set_status(
        &self,
        id: GiftId,
        expected: GiftStatus,
        next: GiftStatus,
        claimed_by: Option<UserId>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE gift_escrows SET status = $3, claimed_by = COALESCE($4, claimed_by), \
             resolved_at = $5 WHERE id = $1 AND status = $2",
        )
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(claimed_by.map(|u| *u.as_uuid()))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_by_sender(&self, sender_id: UserId) -> Result<Vec<GiftEscrow>, StoreError> {
        let rows = sqlx::query_as::<_, GiftEscrowRow>(&format!(
            "SELECT {ESCROW_COLUMNS} FROM gift_escrows WHERE sender_id = $1 ORDER BY created_at DESC"
        ))
        .bind(sender_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(GiftEscrow::try_from).collect()
    }
}

#[async_trait]
impl RecipientDirectory for PostgresStore {
    async fn lookup_email(&self, email: &str) -> Result<Option<UserId>, StoreError> {
        let id = sqlx::query_scalar::<_, uuid::Uuid>(
            "SELECT id FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(id.map(UserId::from_uuid))
    }

    async fn register(&self, email: &str, user_id: UserId) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email) VALUES ($1, $2) \
             ON CONFLICT ((lower(email))) DO UPDATE SET id = EXCLUDED.id",
        )
        .bind(user_id.as_uuid())
        .bind(email.trim())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}
