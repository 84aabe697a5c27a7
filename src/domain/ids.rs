//! Type-safe identifiers.
//!
//! UUID-backed ids are generated server-side; string-backed ids
//! ([`TxId`], [`TxRef`], [`WalletAddress`], [`ClaimToken`]) wrap values that
//! come from the chain or are handed to users.

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the raw string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id! {
    /// Ledger user. Issued by the (external) identity layer.
    UserId
}

uuid_id! {
    /// Identifier of an issued [`super::Quote`].
    QuoteId
}

uuid_id! {
    /// Identifier of a [`super::SwapIntent`].
    IntentId
}

uuid_id! {
    /// Identifier of a [`super::SwapExecution`].
    ExecutionId
}

uuid_id! {
    /// Identifier of a [`super::GiftEscrow`].
    GiftId
}

uuid_id! {
    /// Row identifier of a [`super::TransactionRecord`].
    RecordId
}

string_id! {
    /// On-chain transaction hash returned by the wallet signer.
    TxId
}

string_id! {
    /// On-chain wallet address.
    WalletAddress
}

string_id! {
    /// Idempotency key of a ledger movement: the chain transaction hash for
    /// swaps, or an internal key for gift legs and failed executions.
    TxRef
}

impl TxRef {
    /// Reference for a confirmed on-chain swap.
    #[must_use]
    pub fn chain(tx_id: &TxId) -> Self {
        Self(tx_id.as_str().to_string())
    }

    /// Reference for one leg of a gift (`out`, `in`, `claim`, `refund`).
    #[must_use]
    pub fn gift(gift_id: GiftId, leg: &str) -> Self {
        Self(format!("gift:{gift_id}:{leg}"))
    }

    /// Reference for an execution that never reached the ledger.
    #[must_use]
    pub fn execution(execution_id: ExecutionId) -> Self {
        Self(format!("exec:{execution_id}"))
    }
}

/// Opaque single-use gift claim token (256 bits of OS randomness, hex).
///
/// `Debug` is redacted so the token never ends up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimToken(String);

impl ClaimToken {
    /// Generates a fresh unguessable token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wraps a token presented by a claimer.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClaimToken(<redacted>)")
    }
}

impl fmt::Display for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
