//! Interfaces to the collaborators the ledger depends on.
//!
//! Everything behind these traits is external: the liquidity venue that
//! prices and builds swaps, the wallet that signs and broadcasts, the spot
//! price reference, and the stores. Services hold them as `Arc<dyn _>`.

pub mod store;
pub mod venue;
pub mod wallet;

pub use store::{EscrowStore, LedgerCommit, LedgerStore, RecipientDirectory, StoreError};
pub use venue::{ChainCall, LiquidityVenue, PriceReference, SwapCallRequest, VenueQuote};
pub use wallet::{ChainError, Receipt, ReceiptStatus, SignerProvider, TransferLog, WalletSigner};
