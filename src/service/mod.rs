//! Service layer: quoting, swap execution, ledger reconciliation and gifts.
//!
//! [`TradeService`] and [`GiftService`] are the entry points used by the
//! HTTP handlers. Both settle holdings through the [`LedgerReconciler`],
//! which applies each movement exactly once per transaction reference and
//! emits events through the [`super::domain::EventBus`].

pub mod executor;
pub mod gift_service;
pub mod quote_book;
pub mod quote_engine;
pub mod reconciler;
pub mod trade_service;

pub use executor::TransactionExecutor;
pub use gift_service::{ClaimedGift, GiftDelivery, GiftService, SentGift};
pub use quote_book::QuoteBook;
pub use quote_engine::QuoteEngine;
pub use reconciler::{LedgerReconciler, Movement, Reconciled};
pub use trade_service::{Position, TradeOutcome, TradeRequest, TradeService, TradeSide};
