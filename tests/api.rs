//! End-to-end tests: the full router on an ephemeral port, driven over
//! HTTP with `reqwest` and observed over WebSocket with `tokio-tungstenite`.

#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use aurum_gateway::api;
use aurum_gateway::app_state::AppState;
use aurum_gateway::config::{ExecutorConfig, GiftConfig, LedgerConfig, QuoteConfig};
use aurum_gateway::decimal::Asset;
use aurum_gateway::domain::{EventBus, TxId, UserId, WalletAddress};
use aurum_gateway::error::GatewayError;
use aurum_gateway::persistence::{MemoryDirectory, MemoryEscrowStore, MemoryLedgerStore};
use aurum_gateway::ports::{
    ChainCall, ChainError, LiquidityVenue, PriceReference, Receipt, ReceiptStatus,
    RecipientDirectory, SignerProvider, SwapCallRequest, TransferLog, VenueQuote, WalletSigner,
};
use aurum_gateway::service::{
    GiftService, LedgerReconciler, QuoteBook, QuoteEngine, TradeService, TransactionExecutor,
};

const ROUTER: &str = "0xrouter";
const GOLD_PRICE: Decimal = dec!(7000);

/// Venue, price source and custodial wallet in one: every swap is mined
/// and delivers exactly its minimum output.
#[derive(Debug, Default)]
struct FakeChain {
    receipts: Mutex<HashMap<TxId, Receipt>>,
}

#[async_trait]
impl LiquidityVenue for FakeChain {
    fn spender(&self) -> WalletAddress {
        WalletAddress::from(ROUTER)
    }

    async fn quote(
        &self,
        asset_in: Asset,
        _asset_out: Asset,
        amount_in: Decimal,
    ) -> Result<VenueQuote, GatewayError> {
        let amount_out = match asset_in {
            Asset::Stable => amount_in / GOLD_PRICE,
            Asset::Gold => amount_in * GOLD_PRICE,
        };
        Ok(VenueQuote { amount_out })
    }

    async fn build_approve_call(
        &self,
        token: Asset,
        spender: &WalletAddress,
        _amount: Decimal,
    ) -> Result<ChainCall, GatewayError> {
        Ok(ChainCall {
            target: WalletAddress::from(token.symbol()),
            calldata: "0x".to_string(),
            description: format!("approve {spender}"),
        })
    }

    async fn build_swap_call(&self, request: &SwapCallRequest) -> Result<ChainCall, GatewayError> {
        let calldata =
            serde_json::to_string(request).map_err(|e| GatewayError::Internal(e.to_string()))?;
        Ok(ChainCall {
            target: WalletAddress::from(ROUTER),
            calldata,
            description: "swap".to_string(),
        })
    }
}

#[async_trait]
impl PriceReference for FakeChain {
    async fn spot_price(&self, asset: Asset) -> Result<Decimal, GatewayError> {
        Ok(match asset {
            Asset::Gold => GOLD_PRICE,
            Asset::Stable => Decimal::ONE,
        })
    }
}

#[async_trait]
impl WalletSigner for FakeChain {
    fn address(&self) -> WalletAddress {
        WalletAddress::from("0xcustody")
    }

    async fn get_allowance(
        &self,
        _owner: &WalletAddress,
        _spender: &WalletAddress,
        _token: Asset,
    ) -> Result<Decimal, ChainError> {
        Ok(Decimal::MAX)
    }

    async fn send(&self, call: &ChainCall) -> Result<TxId, ChainError> {
        let request: SwapCallRequest = serde_json::from_str(&call.calldata)
            .map_err(|e| ChainError::Rejected(e.to_string()))?;
        let mut receipts = self.receipts.lock().await;
        let tx_id = TxId::new(format!("0x{:064x}", receipts.len()));
        receipts.insert(
            tx_id.clone(),
            Receipt {
                tx_id: tx_id.clone(),
                status: ReceiptStatus::Success,
                block_number: 1,
                transfers: vec![TransferLog {
                    token: request.asset_out,
                    from: WalletAddress::from(ROUTER),
                    to: request.recipient,
                    amount: request.min_amount_out,
                }],
            },
        );
        Ok(tx_id)
    }

    async fn wait_for_receipt(&self, tx_id: &TxId) -> Result<Option<Receipt>, ChainError> {
        Ok(self.receipts.lock().await.get(tx_id).cloned())
    }
}

#[derive(Debug)]
struct Custody(Arc<FakeChain>);

#[async_trait]
impl SignerProvider for Custody {
    async fn signer_for(&self, _user_id: UserId) -> Result<Arc<dyn WalletSigner>, GatewayError> {
        Ok(Arc::clone(&self.0) as Arc<dyn WalletSigner>)
    }
}

struct TestServer {
    base: String,
    ws_url: String,
    http: reqwest::Client,
    directory: Arc<MemoryDirectory>,
}

async fn spawn_server() -> TestServer {
    let chain = Arc::new(FakeChain::default());
    let events = EventBus::new(256);
    let directory = Arc::new(MemoryDirectory::new());

    let executor_config = ExecutorConfig {
        receipt_poll_interval: Duration::from_millis(5),
        ..ExecutorConfig::default()
    };
    let engine = Arc::new(QuoteEngine::new(
        Arc::clone(&chain) as Arc<dyn LiquidityVenue>,
        Arc::clone(&chain) as Arc<dyn PriceReference>,
        QuoteConfig::default(),
    ));
    let executor = Arc::new(TransactionExecutor::new(
        Arc::clone(&chain) as Arc<dyn LiquidityVenue>,
        events.clone(),
        executor_config,
    ));
    let reconciler = Arc::new(LedgerReconciler::new(
        Arc::new(MemoryLedgerStore::new()),
        events.clone(),
        LedgerConfig::default(),
    ));
    let trade = Arc::new(TradeService::new(
        engine,
        Arc::new(QuoteBook::new()),
        executor,
        Arc::clone(&reconciler),
        Arc::new(Custody(Arc::clone(&chain))),
        Arc::clone(&chain) as Arc<dyn PriceReference>,
    ));
    let gifts = Arc::new(GiftService::new(
        reconciler,
        Arc::new(MemoryEscrowStore::new()),
        Arc::clone(&directory) as Arc<dyn RecipientDirectory>,
        chain,
        events.clone(),
        GiftConfig::default(),
    ));

    let app = api::app(AppState {
        trade,
        gifts,
        events,
    });
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        base: format!("http://{addr}"),
        ws_url: format!("ws://{addr}/ws"),
        http: reqwest::Client::new(),
        directory,
    }
}

impl TestServer {
    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let Ok(response) = self
            .http
            .post(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .await
        else {
            panic!("POST {path} failed");
        };
        let status = response.status().as_u16();
        let Ok(json) = response.json::<Value>().await else {
            panic!("POST {path} returned non-JSON");
        };
        (status, json)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let Ok(response) = self.http.get(format!("{}{path}", self.base)).send().await else {
            panic!("GET {path} failed");
        };
        let status = response.status().as_u16();
        let Ok(json) = response.json::<Value>().await else {
            panic!("GET {path} returned non-JSON");
        };
        (status, json)
    }
}

fn decimal_field(value: &Value, pointer: &str) -> Decimal {
    let Some(raw) = value.pointer(pointer).and_then(Value::as_str) else {
        panic!("missing {pointer} in {value}");
    };
    let Ok(parsed) = raw.parse::<Decimal>() else {
        panic!("{pointer} is not a decimal: {raw}");
    };
    parsed
}

#[tokio::test]
async fn health_reports_version() {
    let server = spawn_server().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn buy_then_oversell() {
    let server = spawn_server().await;
    let user = UserId::new();

    let (status, bought) = server
        .post(
            &format!("/api/v1/users/{user}/buy"),
            json!({ "amount": "10000", "slippage_bps": 0 }),
        )
        .await;
    assert_eq!(status, 200, "{bought}");
    assert_eq!(bought["state"], "success");
    assert_eq!(decimal_field(&bought, "/holding/quantity"), dec!(1.428571));
    assert_eq!(decimal_field(&bought, "/holding/total_invested"), dec!(10000));

    let (status, refused) = server
        .post(
            &format!("/api/v1/users/{user}/sell"),
            json!({ "amount": "2", "slippage_bps": 0 }),
        )
        .await;
    assert_eq!(status, 422);
    assert_eq!(refused["error"]["code"], 4001);

    let (status, holding) = server.get(&format!("/api/v1/users/{user}/holding")).await;
    assert_eq!(status, 200);
    assert_eq!(decimal_field(&holding, "/quantity"), dec!(1.428571));

    let (status, history) = server
        .get(&format!("/api/v1/users/{user}/transactions?page=1&per_page=10"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(history["pagination"]["total"], 1);
    assert_eq!(history["data"][0]["kind"], "buy");
}

#[tokio::test]
async fn quote_id_executes_once() {
    let server = spawn_server().await;
    let user = UserId::new();

    let (status, quote) = server
        .post(
            "/api/v1/quotes",
            json!({ "asset_in": "stable", "amount_in": "7000", "slippage_bps": 0, "mode": "execution" }),
        )
        .await;
    assert_eq!(status, 200, "{quote}");
    assert_eq!(quote["fallback"], false);
    assert_eq!(decimal_field(&quote, "/min_amount_out"), dec!(1));

    let body = json!({ "quote_id": quote["quote_id"] });
    let (status, _) = server
        .post(&format!("/api/v1/users/{user}/buy"), body.clone())
        .await;
    assert_eq!(status, 200);

    let (status, reused) = server
        .post(&format!("/api/v1/users/{user}/buy"), body)
        .await;
    assert_eq!(status, 400);
    assert_eq!(reused["error"]["code"], 1002);
}

#[tokio::test]
async fn escrowed_gift_is_claimed_once() {
    let server = spawn_server().await;
    let sender = UserId::new();
    let friend = UserId::new();

    let (status, _) = server
        .post(
            &format!("/api/v1/users/{sender}/buy"),
            json!({ "amount": "7000", "slippage_bps": 0 }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, sent) = server
        .post(
            &format!("/api/v1/users/{sender}/gifts"),
            json!({ "amount_token": "0.25", "recipient_email": "friend@example.com" }),
        )
        .await;
    assert_eq!(status, 201, "{sent}");
    assert_eq!(sent["delivery"], "escrowed");
    assert_eq!(decimal_field(&sent, "/sender_holding/quantity"), dec!(0.75));
    let claim_token = sent["claim_token"].clone();

    let claim = json!({ "claim_token": claim_token, "user_id": friend.to_string() });
    let (status, claimed) = server.post("/api/v1/gifts/claim", claim.clone()).await;
    assert_eq!(status, 200, "{claimed}");
    assert_eq!(decimal_field(&claimed, "/holding/quantity"), dec!(0.25));
    assert_eq!(decimal_field(&claimed, "/holding/total_invested"), dec!(1750));

    let (status, again) = server.post("/api/v1/gifts/claim", claim).await;
    assert_eq!(status, 409);
    assert_eq!(again["error"]["code"], 2002);

    let (status, gifts) = server.get(&format!("/api/v1/users/{sender}/gifts")).await;
    assert_eq!(status, 200);
    assert_eq!(gifts["data"][0]["status"], "claimed");
    assert!(gifts["data"][0].get("claim_token").is_none());
}

#[tokio::test]
async fn gift_to_registered_user_is_direct() {
    let server = spawn_server().await;
    let sender = UserId::new();
    let friend = UserId::new();
    assert_eq!(server.directory.register("friend@example.com", friend).await, Ok(()));

    let (status, _) = server
        .post(
            &format!("/api/v1/users/{sender}/buy"),
            json!({ "amount": "7000", "slippage_bps": 0 }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, sent) = server
        .post(
            &format!("/api/v1/users/{sender}/gifts"),
            json!({ "amount_token": "0.5", "recipient_email": "Friend@Example.com" }),
        )
        .await;
    assert_eq!(status, 201, "{sent}");
    assert_eq!(sent["delivery"], "direct");
    assert_eq!(sent["recipient_id"], friend.to_string());

    let (_, holding) = server.get(&format!("/api/v1/users/{friend}/holding")).await;
    assert_eq!(decimal_field(&holding, "/quantity"), dec!(0.5));
}

#[tokio::test]
async fn websocket_streams_subscribed_user_events() {
    let server = spawn_server().await;
    let user = UserId::new();

    let Ok((mut socket, _)) = tokio_tungstenite::connect_async(server.ws_url.as_str()).await else {
        panic!("ws connect failed");
    };
    let subscribe = json!({
        "id": "sub-1",
        "type": "command",
        "timestamp": chrono::Utc::now(),
        "payload": { "command": "subscribe", "user_ids": [user.to_string()] }
    });
    let Ok(()) = socket.send(Message::text(subscribe.to_string())).await else {
        panic!("ws send failed");
    };
    let Ok(Some(Ok(ack))) = tokio::time::timeout(Duration::from_secs(5), socket.next()).await else {
        panic!("no subscribe ack");
    };
    let Ok(ack_text) = ack.into_text() else {
        panic!("ack is not text");
    };
    let Ok(ack) = serde_json::from_str::<Value>(&ack_text) else {
        panic!("ack is not JSON");
    };
    assert_eq!(ack["id"], "sub-1");
    assert_eq!(ack["type"], "response");

    let (status, _) = server
        .post(
            &format!("/api/v1/users/{user}/buy"),
            json!({ "amount": "700", "slippage_bps": 0 }),
        )
        .await;
    assert_eq!(status, 200);

    let mut seen = Vec::new();
    while !seen.iter().any(|t: &String| t == "holding_reconciled") {
        let Ok(Some(Ok(frame))) = tokio::time::timeout(Duration::from_secs(5), socket.next()).await
        else {
            panic!("event stream ended after {seen:?}");
        };
        let Ok(text) = frame.into_text() else {
            continue;
        };
        let Ok(event) = serde_json::from_str::<Value>(&text) else {
            panic!("event is not JSON");
        };
        assert_eq!(event["type"], "event");
        assert_eq!(event["payload"]["user_id"], user.to_string());
        if let Some(kind) = event["payload"]["event_type"].as_str() {
            seen.push(kind.to_string());
        }
    }
    assert!(seen.iter().any(|t| t == "swap_state_changed"));
}
