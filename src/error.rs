//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the crate. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Collaborator-level failures ([`crate::ports::ChainError`],
//! [`crate::ports::StoreError`]) are converted into it at the service
//! boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ErrorKind, ExecutionId, QuoteId, SwapState, TxId, UserId};
use crate::ports::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "insufficient balance: requested 2.0, available 1.0",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details (e.g. transaction ids of a failed swap).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Crate-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status                     |
/// |-----------|---------------------|---------------------------------|
/// | 1000–1999 | Validation          | 400 Bad Request                 |
/// | 2000–2999 | State/Not Found     | 404 / 409 / 410                 |
/// | 3000–3999 | Server / upstream   | 500 / 502 / 504                 |
/// | 4000–4999 | Ledger / execution  | 422 Unprocessable Entity        |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Amount is zero, negative, too large or too precise.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The quote's validity window has passed.
    #[error("quote {0} has expired")]
    QuoteExpired(QuoteId),

    /// A fallback (display-only) quote was presented for execution.
    #[error("quote {0} is a fallback estimate and cannot be executed")]
    QuoteIsFallback(QuoteId),

    /// The on-chain pipeline failed. Carries whatever transaction ids were
    /// emitted so the caller can reconcile out-of-band.
    #[error("swap execution failed ({kind}): {message}")]
    Execution {
        /// Failure classification.
        kind: ErrorKind,
        /// Human-readable cause.
        message: String,
        /// Approval transaction, if one was sent.
        approval_tx_id: Option<TxId>,
        /// Swap transaction, if one was sent.
        swap_tx_id: Option<TxId>,
    },

    /// The swap settled on-chain but the holding could not be updated.
    /// Needs manual reconciliation against `swap_tx_id`.
    #[error("swap {swap_tx_id} settled but was not reconciled: {reason}")]
    Unreconciled {
        /// Execution that settled.
        execution_id: ExecutionId,
        /// Settled swap transaction.
        swap_tx_id: TxId,
        /// Why the ledger update failed.
        reason: String,
    },

    /// Sell or gift exceeds the holding quantity.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Token quantity requested.
        requested: Decimal,
        /// Token quantity held.
        available: Decimal,
    },

    /// Optimistic ledger update kept losing races.
    #[error("ledger update for user {0} conflicted too many times")]
    VersionConflict(UserId),

    /// No gift escrow matches the claim token.
    #[error("gift not found")]
    GiftNotFound,

    /// The gift escrow was already claimed.
    #[error("gift already claimed")]
    AlreadyClaimed,

    /// The gift escrow passed its expiry before being claimed.
    #[error("gift expired")]
    GiftExpired,

    /// The liquidity venue could not produce a quote.
    #[error("liquidity venue unavailable: {0}")]
    VenueUnavailable(String),

    /// The spot price reference could not be read.
    #[error("price reference unavailable: {0}")]
    PriceUnavailable(String),

    /// A swap execution attempted to leave a state it may not leave.
    #[error("illegal swap state transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state.
        from: SwapState,
        /// Requested state.
        to: SwapState,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidAmount(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::QuoteExpired(_) => 1003,
            Self::QuoteIsFallback(_) => 1004,
            Self::GiftNotFound => 2001,
            Self::AlreadyClaimed => 2002,
            Self::GiftExpired => 2003,
            Self::VersionConflict(_) => 2004,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::IllegalTransition { .. } => 3002,
            Self::VenueUnavailable(_) => 3003,
            Self::PriceUnavailable(_) => 3004,
            Self::Unreconciled { .. } => 3005,
            Self::InsufficientBalance { .. } => 4001,
            Self::Execution { .. } => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidAmount(_)
            | Self::InvalidRequest(_)
            | Self::QuoteExpired(_)
            | Self::QuoteIsFallback(_) => StatusCode::BAD_REQUEST,
            Self::GiftNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyClaimed | Self::VersionConflict(_) => StatusCode::CONFLICT,
            Self::GiftExpired => StatusCode::GONE,
            Self::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Execution { kind, .. } => match kind {
                ErrorKind::ConfirmationTimeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::OutputUnverified => StatusCode::BAD_GATEWAY,
                ErrorKind::IntentMismatch
                | ErrorKind::QuoteExpired
                | ErrorKind::QuoteIsFallback => StatusCode::BAD_REQUEST,
                ErrorKind::ApprovalFailed | ErrorKind::SwapReverted => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::VenueUnavailable(_) | Self::PriceUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceError(_)
            | Self::IllegalTransition { .. }
            | Self::Unreconciled { .. }
            | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Structured details attached to the response body, if any.
    #[must_use]
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Execution {
                kind,
                approval_tx_id,
                swap_tx_id,
                ..
            } => Some(serde_json::json!({
                "kind": kind,
                "approval_tx_id": approval_tx_id,
                "swap_tx_id": swap_tx_id,
            })),
            Self::Unreconciled {
                execution_id,
                swap_tx_id,
                ..
            } => Some(serde_json::json!({
                "execution_id": execution_id,
                "swap_tx_id": swap_tx_id,
            })),
            Self::InsufficientBalance {
                requested,
                available,
            } => Some(serde_json::json!({
                "requested": requested.to_string(),
                "available": available.to_string(),
            })),
            _ => None,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict(user_id) => Self::VersionConflict(user_id),
            StoreError::AlreadyExists(key) => {
                Self::Internal(format!("duplicate ledger key {key}"))
            }
            StoreError::Backend(msg) => Self::PersistenceError(msg),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn execution_timeout_maps_to_gateway_timeout() {
        let err = GatewayError::Execution {
            kind: ErrorKind::ConfirmationTimeout,
            message: "receipt not found".to_string(),
            approval_tx_id: None,
            swap_tx_id: Some(TxId::from("0xabc")),
        };
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        let details = err.details().unwrap_or_default();
        assert_eq!(
            details.get("swap_tx_id").and_then(|v| v.as_str()),
            Some("0xabc")
        );
    }

    #[test]
    fn unreconciled_swap_carries_its_ids() {
        let execution_id = ExecutionId::new();
        let err = GatewayError::Unreconciled {
            execution_id,
            swap_tx_id: TxId::from("0xsettled"),
            reason: "db down".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), 3005);
        let details = err.details().unwrap_or_default();
        assert_eq!(
            details.get("swap_tx_id").and_then(|v| v.as_str()),
            Some("0xsettled")
        );
        assert_eq!(
            details.get("execution_id").and_then(|v| v.as_str()),
            Some(execution_id.to_string().as_str())
        );
    }

    #[test]
    fn insufficient_balance_is_unprocessable() {
        let err = GatewayError::InsufficientBalance {
            requested: dec!(2),
            available: dec!(1),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), 4001);
    }

    #[test]
    fn store_conflict_converts() {
        let user = UserId::new();
        let err: GatewayError = StoreError::VersionConflict(user).into();
        assert!(matches!(err, GatewayError::VersionConflict(u) if u == user));
    }
}
