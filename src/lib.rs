//! # aurum-gateway
//!
//! Gold-token exchange and holdings ledger.
//!
//! Users buy and sell a gold-backed token against a stablecoin through an
//! external liquidity venue. Every swap is quoted, executed from the user's
//! custodial wallet through an approve/swap state machine, verified against
//! its chain receipt, and then reconciled into a per-user holding with
//! average-cost accounting. Gold can also be gifted by email, either
//! directly to a registered user or through a claimable escrow.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── TradeService, GiftService (service/)
//!     │     ├── QuoteEngine + QuoteBook
//!     │     ├── TransactionExecutor
//!     │     └── LedgerReconciler
//!     ├── EventBus (domain/)
//!     │
//!     ├── Ports (ports/): venue, prices, signers, stores
//!     ├── Relay adapter (adapters/)
//!     └── Stores (persistence/): in-memory or PostgreSQL
//! ```

pub mod adapters;
pub mod api;
pub mod app_state;
pub mod config;
pub mod decimal;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod ports;
pub mod service;
pub mod ws;

#[cfg(test)]
mod testing;
