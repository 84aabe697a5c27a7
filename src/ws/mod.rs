//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams ledger events. Clients subscribe
//! by user id, or with `"*"` for every user, and may read a holding over
//! the same socket.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
