//! HTTP client for the signing and quoting relay.
//!
//! The relay owns key custody and chain access. The gateway asks it for
//! venue quotes, spot prices and encoded calls, and hands it calls to sign
//! and broadcast from a user's custodial wallet.
//!
//! | Method | Path | Use |
//! |--------|------|-----|
//! | POST | `/quote` | venue quote |
//! | POST | `/calls/approve` | encode an approval |
//! | POST | `/calls/swap` | encode an exact-input swap |
//! | GET | `/allowance` | read an allowance |
//! | GET | `/wallets/{user}` | wallet address of a user |
//! | POST | `/wallets/{user}/send` | sign and broadcast |
//! | GET | `/receipts/{tx}` | receipt, 404 while pending |
//! | GET | `/prices/{asset}` | spot price |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::decimal::Asset;
use crate::domain::{TxId, UserId, WalletAddress};
use crate::error::GatewayError;
use crate::ports::{
    ChainCall, ChainError, LiquidityVenue, PriceReference, Receipt, SignerProvider,
    SwapCallRequest, VenueQuote, WalletSigner,
};

#[derive(Debug, Serialize)]
struct QuoteRequest {
    asset_in: Asset,
    asset_out: Asset,
    amount_in: Decimal,
}

#[derive(Debug, Serialize)]
struct ApproveRequest<'a> {
    token: Asset,
    spender: &'a WalletAddress,
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct AmountResponse {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct WalletResponse {
    address: WalletAddress,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    tx_id: TxId,
}

fn asset_param(asset: Asset) -> &'static str {
    match asset {
        Asset::Gold => "gold",
        Asset::Stable => "stable",
    }
}

fn venue_error(e: &reqwest::Error) -> GatewayError {
    GatewayError::VenueUnavailable(format!("relay: {e}"))
}

fn chain_error(e: &reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Timeout(e.to_string())
    } else if e.status().is_some_and(|s| s.is_client_error()) {
        ChainError::Rejected(e.to_string())
    } else {
        ChainError::Transport(e.to_string())
    }
}

/// Relay-backed [`LiquidityVenue`], [`PriceReference`] and
/// [`SignerProvider`].
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: String,
    spender: WalletAddress,
}

impl RelayClient {
    /// Creates a client for the relay at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        spender: WalletAddress,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("aurum-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Internal(format!("relay client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            spender,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, reqwest::Error> {
        self.http
            .get(self.url(path))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, reqwest::Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.http
            .post(self.url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl LiquidityVenue for RelayClient {
    fn spender(&self) -> WalletAddress {
        self.spender.clone()
    }

    async fn quote(
        &self,
        asset_in: Asset,
        asset_out: Asset,
        amount_in: Decimal,
    ) -> Result<VenueQuote, GatewayError> {
        let request = QuoteRequest {
            asset_in,
            asset_out,
            amount_in,
        };
        self.post_json("/quote", &request)
            .await
            .map_err(|e| venue_error(&e))
    }

    async fn build_approve_call(
        &self,
        token: Asset,
        spender: &WalletAddress,
        amount: Decimal,
    ) -> Result<ChainCall, GatewayError> {
        let request = ApproveRequest {
            token,
            spender,
            amount,
        };
        self.post_json("/calls/approve", &request)
            .await
            .map_err(|e| venue_error(&e))
    }

    async fn build_swap_call(&self, request: &SwapCallRequest) -> Result<ChainCall, GatewayError> {
        self.post_json("/calls/swap", request)
            .await
            .map_err(|e| venue_error(&e))
    }
}

#[async_trait]
impl PriceReference for RelayClient {
    async fn spot_price(&self, asset: Asset) -> Result<Decimal, GatewayError> {
        let response: PriceResponse = self
            .get_json(&format!("/prices/{}", asset_param(asset)))
            .await
            .map_err(|e| GatewayError::PriceUnavailable(format!("relay: {e}")))?;
        if response.price <= Decimal::ZERO {
            return Err(GatewayError::PriceUnavailable(format!(
                "relay returned non-positive {asset} price"
            )));
        }
        Ok(response.price)
    }
}

#[async_trait]
impl SignerProvider for RelayClient {
    async fn signer_for(&self, user_id: UserId) -> Result<Arc<dyn WalletSigner>, GatewayError> {
        let response = self
            .http
            .get(self.url(&format!("/wallets/{user_id}")))
            .send()
            .await
            .map_err(|e| GatewayError::VenueUnavailable(format!("relay: {e}")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::InvalidRequest(format!(
                "user {user_id} has no custodial wallet"
            )));
        }
        let wallet: WalletResponse = response
            .error_for_status()
            .map_err(|e| venue_error(&e))?
            .json()
            .await
            .map_err(|e| venue_error(&e))?;
        Ok(Arc::new(RelaySigner {
            client: self.clone(),
            user_id,
            address: wallet.address,
        }))
    }
}

/// Signer for one custodial wallet held by the relay.
#[derive(Debug, Clone)]
pub struct RelaySigner {
    client: RelayClient,
    user_id: UserId,
    address: WalletAddress,
}

#[async_trait]
impl WalletSigner for RelaySigner {
    fn address(&self) -> WalletAddress {
        self.address.clone()
    }

    async fn get_allowance(
        &self,
        owner: &WalletAddress,
        spender: &WalletAddress,
        token: Asset,
    ) -> Result<Decimal, ChainError> {
        let path = format!(
            "/allowance?owner={owner}&spender={spender}&token={}",
            asset_param(token)
        );
        let response: AmountResponse = self
            .client
            .get_json(&path)
            .await
            .map_err(|e| chain_error(&e))?;
        Ok(response.amount)
    }

    async fn send(&self, call: &ChainCall) -> Result<TxId, ChainError> {
        tracing::debug!(user_id = %self.user_id, target = %call.target, call = %call.description, "relay send");
        let response: SendResponse = self
            .client
            .post_json(&format!("/wallets/{}/send", self.user_id), call)
            .await
            .map_err(|e| chain_error(&e))?;
        Ok(response.tx_id)
    }

    async fn wait_for_receipt(&self, tx_id: &TxId) -> Result<Option<Receipt>, ChainError> {
        let response = self
            .client
            .http
            .get(self.client.url(&format!("/receipts/{tx_id}")))
            .send()
            .await
            .map_err(|e| chain_error(&e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let receipt = response
            .error_for_status()
            .map_err(|e| chain_error(&e))?
            .json()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Some(receipt))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::ports::ReceiptStatus;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};

    async fn serve(router: Router) -> String {
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn relay() -> Router {
        Router::new()
            .route(
                "/quote",
                post(|Json(body): Json<Value>| async move {
                    let amount_in = body["amount_in"].as_str().unwrap_or("0").to_string();
                    Json(json!({ "amount_out": amount_in }))
                }),
            )
            .route("/prices/{asset}", get(|| async { Json(json!({ "price": "7000" })) }))
            .route(
                "/wallets/{user}",
                get(|| async { Json(json!({ "address": "0xwallet" })) }),
            )
            .route(
                "/wallets/{user}/send",
                post(|| async { (AxumStatus::BAD_REQUEST, "nonce too low") }),
            )
            .route(
                "/receipts/{tx}",
                get(|Path(tx): Path<String>| async move {
                    if tx == "0xpending" {
                        return Err(AxumStatus::NOT_FOUND);
                    }
                    Ok(Json(json!({
                        "tx_id": tx,
                        "status": "success",
                        "block_number": 7,
                        "transfers": []
                    })))
                }),
            )
    }

    async fn client() -> RelayClient {
        let base = serve(relay()).await;
        let Ok(client) = RelayClient::new(&base, WalletAddress::from("0xrouter"), Duration::from_secs(2))
        else {
            panic!("client build failed");
        };
        client
    }

    #[tokio::test]
    async fn quote_and_price_decode() {
        let client = client().await;
        let Ok(quote) = client.quote(Asset::Stable, Asset::Gold, dec!(12.5)).await else {
            panic!("quote failed");
        };
        assert_eq!(quote.amount_out, dec!(12.5));
        let Ok(price) = client.spot_price(Asset::Gold).await else {
            panic!("price failed");
        };
        assert_eq!(price, dec!(7000));
    }

    #[tokio::test]
    async fn client_error_on_send_is_a_rejection() {
        let client = client().await;
        let Ok(signer) = client.signer_for(UserId::new()).await else {
            panic!("signer lookup failed");
        };
        assert_eq!(signer.address(), WalletAddress::from("0xwallet"));
        let call = ChainCall {
            target: WalletAddress::from("0xrouter"),
            calldata: "0x".to_string(),
            description: "swap".to_string(),
        };
        assert!(matches!(signer.send(&call).await, Err(ChainError::Rejected(_))));
    }

    #[tokio::test]
    async fn missing_receipt_is_pending() {
        let client = client().await;
        let Ok(signer) = client.signer_for(UserId::new()).await else {
            panic!("signer lookup failed");
        };
        let Ok(pending) = signer.wait_for_receipt(&TxId::from("0xpending")).await else {
            panic!("receipt read failed");
        };
        assert!(pending.is_none());

        let Ok(Some(mined)) = signer.wait_for_receipt(&TxId::from("0xmined")).await else {
            panic!("expected a receipt");
        };
        assert_eq!(mined.status, ReceiptStatus::Success);
        assert_eq!(mined.block_number, 7);
    }

    #[tokio::test]
    async fn unreachable_relay_is_venue_unavailable() {
        let Ok(client) = RelayClient::new(
            "http://127.0.0.1:1",
            WalletAddress::from("0xrouter"),
            Duration::from_millis(200),
        ) else {
            panic!("client build failed");
        };
        let result = client.quote(Asset::Gold, Asset::Stable, dec!(1)).await;
        assert!(matches!(result, Err(GatewayError::VenueUnavailable(_))));
    }
}
