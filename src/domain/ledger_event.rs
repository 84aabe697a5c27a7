//! Domain events reflecting execution and ledger state changes.
//!
//! Every state change emits a [`LedgerEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers
//! filtered by user.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ErrorKind, ExecutionId, GiftId, LedgerKind, SwapState, TxId, TxRef, UserId};

/// Domain event emitted after every state mutation.
///
/// Decimal amounts are serialized as strings.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A swap execution moved to a new state.
    SwapStateChanged {
        /// Owner of the execution.
        user_id: UserId,
        /// Execution identifier.
        execution_id: ExecutionId,
        /// State entered.
        state: SwapState,
        /// Most recent transaction id, if any.
        tx_id: Option<TxId>,
        /// Failure kind when `state` is `failed`.
        error: Option<ErrorKind>,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The existing allowance covered the swap; no approval was sent.
    ApprovalSkipped {
        /// Owner of the execution.
        user_id: UserId,
        /// Execution identifier.
        execution_id: ExecutionId,
        /// Allowance observed on-chain.
        allowance: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A movement was applied to a holding.
    HoldingReconciled {
        /// Holding owner.
        user_id: UserId,
        /// Idempotency key of the movement.
        tx_ref: TxRef,
        /// Movement kind.
        kind: LedgerKind,
        /// Quantity after the movement.
        quantity: String,
        /// Cost basis after the movement.
        total_invested: String,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A gift escrow was funded.
    GiftCreated {
        /// Sender.
        user_id: UserId,
        /// Escrow identifier.
        gift_id: GiftId,
        /// Quantity held in escrow.
        amount_token: String,
        /// Expiry of the claim window.
        expires_at: DateTime<Utc>,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A gift escrow was claimed.
    GiftClaimed {
        /// Claimer.
        user_id: UserId,
        /// Sender of the gift.
        sender_id: UserId,
        /// Escrow identifier.
        gift_id: GiftId,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A gift escrow was observed past its expiry and returned to the sender.
    GiftExpired {
        /// Sender, who receives the refund.
        user_id: UserId,
        /// Escrow identifier.
        gift_id: GiftId,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Returns the user this event concerns.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        match self {
            Self::SwapStateChanged { user_id, .. }
            | Self::ApprovalSkipped { user_id, .. }
            | Self::HoldingReconciled { user_id, .. }
            | Self::GiftCreated { user_id, .. }
            | Self::GiftClaimed { user_id, .. }
            | Self::GiftExpired { user_id, .. } => *user_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SwapStateChanged { .. } => "swap_state_changed",
            Self::ApprovalSkipped { .. } => "approval_skipped",
            Self::HoldingReconciled { .. } => "holding_reconciled",
            Self::GiftCreated { .. } => "gift_created",
            Self::GiftClaimed { .. } => "gift_claimed",
            Self::GiftExpired { .. } => "gift_expired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_state_event_serializes() {
        let event = LedgerEvent::SwapStateChanged {
            user_id: UserId::new(),
            execution_id: ExecutionId::new(),
            state: SwapState::Confirming,
            tx_id: Some(TxId::from("0xabc")),
            error: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("swap_state_changed"));
        assert!(json.contains("confirming"));
        assert!(json.contains("0xabc"));
    }

    #[test]
    fn user_id_accessor() {
        let user = UserId::new();
        let event = LedgerEvent::GiftExpired {
            user_id: user,
            gift_id: GiftId::new(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.user_id(), user);
        assert_eq!(event.event_type_str(), "gift_expired");
    }
}
