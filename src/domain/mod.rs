//! Domain layer: identifiers, quotes, swap lifecycle, holdings, gifts,
//! and the event system.
//!
//! Nothing in here performs I/O. Services in [`crate::service`] combine
//! these types with the ports in [`crate::ports`].

pub mod event_bus;
pub mod gift;
pub mod holding;
pub mod ids;
pub mod ledger_event;
pub mod quote;
pub mod swap;
pub mod transaction;

pub use event_bus::EventBus;
pub use gift::{GiftEscrow, GiftStatus};
pub use holding::{Applied, Holding, LedgerKind};
pub use ids::{
    ClaimToken, ExecutionId, GiftId, IntentId, QuoteId, RecordId, TxId, TxRef, UserId,
    WalletAddress,
};
pub use ledger_event::LedgerEvent;
pub use quote::{Quote, QuoteMode};
pub use swap::{ErrorKind, ExecutionFailure, StateTransition, SwapExecution, SwapIntent, SwapState};
pub use transaction::{TransactionRecord, TxStatus};
