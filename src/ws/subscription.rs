//! Per-connection subscription manager.
//!
//! Tracks which users a WebSocket client follows and filters ledger events
//! server-side.

use std::collections::HashSet;

use crate::domain::{LedgerEvent, UserId};

/// Manages the set of user subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed users. Ignored while `subscribe_all` is set.
    user_ids: HashSet<UserId>,
    /// Whether the client follows every user (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds users to the subscription set. `wildcard` enables `"*"`.
    pub fn subscribe(&mut self, ids: &[UserId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.user_ids.extend(ids.iter().copied());
    }

    /// Removes users from the subscription set. `wildcard` clears `"*"`.
    pub fn unsubscribe(&mut self, ids: &[UserId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.user_ids.remove(id);
        }
    }

    /// Returns `true` if `event` concerns a followed user. A claimed gift
    /// also concerns its sender.
    #[must_use]
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        if self.subscribe_all || self.user_ids.contains(&event.user_id()) {
            return true;
        }
        match event {
            LedgerEvent::GiftClaimed { sender_id, .. } => self.user_ids.contains(sender_id),
            _ => false,
        }
    }

    /// Returns the number of explicitly subscribed users.
    #[must_use]
    pub fn count(&self) -> usize {
        self.user_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::GiftId;
    use chrono::Utc;

    fn expired(user_id: UserId) -> LedgerEvent {
        LedgerEvent::GiftExpired {
            user_id,
            gift_id: GiftId::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(&expired(UserId::new())));
    }

    #[test]
    fn subscribe_specific_user() {
        let mut mgr = SubscriptionManager::new();
        let id = UserId::new();
        mgr.subscribe(&[id], false);
        assert!(mgr.matches(&expired(id)));
        assert!(!mgr.matches(&expired(UserId::new())));
    }

    #[test]
    fn wildcard_matches_everything_until_removed() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true);
        assert!(mgr.matches(&expired(UserId::new())));
        mgr.unsubscribe(&[], true);
        assert!(!mgr.matches(&expired(UserId::new())));
    }

    #[test]
    fn sender_sees_claim_of_their_gift() {
        let mut mgr = SubscriptionManager::new();
        let sender = UserId::new();
        mgr.subscribe(&[sender], false);
        let claimed = LedgerEvent::GiftClaimed {
            user_id: UserId::new(),
            sender_id: sender,
            gift_id: GiftId::new(),
            timestamp: Utc::now(),
        };
        assert!(mgr.matches(&claimed));
    }

    #[test]
    fn unsubscribe_removes_user() {
        let mut mgr = SubscriptionManager::new();
        let id = UserId::new();
        mgr.subscribe(&[id, UserId::new()], false);
        assert_eq!(mgr.count(), 2);
        mgr.unsubscribe(&[id], false);
        assert!(!mgr.matches(&expired(id)));
        assert_eq!(mgr.count(), 1);
    }
}
