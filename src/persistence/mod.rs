//! Persistence layer: holdings, transaction records and gift escrows.
//!
//! [`memory`] keeps everything in process and backs tests and runs with
//! persistence disabled. [`postgres`] implements the same store ports over
//! `sqlx::PgPool`, committing each holding update together with its record
//! in one database transaction.

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::{MemoryDirectory, MemoryEscrowStore, MemoryLedgerStore};
pub use postgres::PostgresStore;
