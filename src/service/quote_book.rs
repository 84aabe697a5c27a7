//! Issued execution quotes awaiting a buy or sell.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::domain::{Quote, QuoteId};

/// Minutes past `valid_until` a quote is kept so a late caller still gets
/// `QuoteExpired` instead of "unknown quote".
const RETENTION_MINUTES: i64 = 10;

/// Single-use registry of quotes handed to callers.
///
/// A quote is removed when taken, so each one backs at most one execution.
#[derive(Debug, Default)]
pub struct QuoteBook {
    quotes: RwLock<HashMap<QuoteId, Quote>>,
}

impl QuoteBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `quote` and drops entries long past their validity.
    pub async fn insert(&self, quote: Quote) {
        let mut quotes = self.quotes.write().await;
        purge(&mut quotes, Utc::now());
        quotes.insert(quote.id(), quote);
    }

    /// Removes and returns the quote, if it is known.
    pub async fn take(&self, id: QuoteId) -> Option<Quote> {
        self.quotes.write().await.remove(&id)
    }

    /// Number of stored quotes.
    pub async fn len(&self) -> usize {
        self.quotes.read().await.len()
    }

    /// `true` when no quotes are stored.
    pub async fn is_empty(&self) -> bool {
        self.quotes.read().await.is_empty()
    }
}

fn purge(quotes: &mut HashMap<QuoteId, Quote>, now: DateTime<Utc>) {
    let retention = Duration::minutes(RETENTION_MINUTES);
    quotes.retain(|_, q| q.valid_until() + retention >= now);
}
