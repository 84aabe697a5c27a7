//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    ClaimGiftRequest, ClaimGiftResponse, GiftDto, GiftListResponse, HoldingDto, PaginationMeta,
    PositionDto, QuoteRequest, QuoteResponse, SendGiftRequest, SendGiftResponse, TradeRequestDto,
    TradeResponse, TransactionDto, TransactionListResponse,
};
use super::handlers::{gift, holding, quote, system, trade};
use crate::error::{ErrorBody, ErrorResponse};

/// Aggregated OpenAPI specification served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "aurum-gateway",
        description = "Gold-token exchange and holdings ledger. Amounts are decimal strings."
    ),
    paths(
        system::health_handler,
        quote::create_quote,
        trade::buy,
        trade::sell,
        holding::get_holding,
        holding::get_position,
        holding::list_transactions,
        gift::send_gift,
        gift::list_gifts,
        gift::claim_gift,
    ),
    components(schemas(
        system::HealthResponse,
        QuoteRequest,
        QuoteResponse,
        TradeRequestDto,
        TradeResponse,
        HoldingDto,
        PositionDto,
        TransactionDto,
        TransactionListResponse,
        PaginationMeta,
        SendGiftRequest,
        SendGiftResponse,
        ClaimGiftRequest,
        ClaimGiftResponse,
        GiftDto,
        GiftListResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Quotes", description = "Venue quotes"),
        (name = "Trades", description = "Buy and sell gold"),
        (name = "Holdings", description = "Holdings, positions and history"),
        (name = "Gifts", description = "Gold gifts and escrow claims"),
    )
)]
pub struct ApiDoc;
