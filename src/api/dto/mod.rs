//! Data Transfer Objects for REST request/response serialization.
//!
//! All amounts are serialized as JSON decimal strings so no precision is
//! lost to binary floats on either side.

pub mod common_dto;
pub mod gift_dto;
pub mod holding_dto;
pub mod quote_dto;
pub mod trade_dto;

pub use common_dto::*;
pub use gift_dto::*;
pub use holding_dto::*;
pub use quote_dto::*;
pub use trade_dto::*;
