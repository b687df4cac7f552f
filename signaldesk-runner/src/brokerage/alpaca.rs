//! Alpaca trading API adapter (REST v2).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use signaldesk_core::domain::TradeSide;

use super::{
    Account, Brokerage, BrokerageError, BrokerageMode, Order, OrderRequest, OrderType, Position,
    TimeInForce,
};

pub const PAPER_BASE_URL: &str = "https://paper-api.alpaca.markets";
pub const LIVE_BASE_URL: &str = "https://api.alpaca.markets";

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

#[derive(Serialize)]
struct OrderBody<'a> {
    symbol: &'a str,
    qty: String,
    side: &'static str,
    #[serde(rename = "type")]
    order_type: OrderType,
    time_in_force: TimeInForce,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<String>,
}

impl<'a> OrderBody<'a> {
    fn from_request(order: &'a OrderRequest) -> Self {
        Self {
            symbol: &order.symbol,
            qty: order.qty.to_string(),
            side: match order.side {
                TradeSide::Buy => "buy",
                TradeSide::Sell => "sell",
            },
            order_type: order.order_type,
            time_in_force: order.time_in_force,
            limit_price: match order.order_type {
                OrderType::Limit => order.limit_price.map(|p| p.to_string()),
                OrderType::Market => None,
            },
        }
    }
}

pub struct AlpacaBrokerage {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    secret_key: String,
}

impl AlpacaBrokerage {
    pub fn new(
        key_id: impl Into<String>,
        secret_key: impl Into<String>,
        mode: BrokerageMode,
    ) -> Result<Self, BrokerageError> {
        let base = match mode {
            BrokerageMode::Paper => PAPER_BASE_URL,
            BrokerageMode::Live => LIVE_BASE_URL,
        };
        Self::with_base_url(key_id, secret_key, base)
    }

    pub fn with_base_url(
        key_id: impl Into<String>,
        secret_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, BrokerageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BrokerageError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            secret_key: secret_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/v2{}", self.base_url, path))
            .header(KEY_HEADER, &self.key_id)
            .header(SECRET_HEADER, &self.secret_key)
    }

    async fn send_raw(&self, req: RequestBuilder) -> Result<reqwest::Response, BrokerageError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(BrokerageError::Http {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, BrokerageError> {
        let resp = self.send_raw(req).await?;
        Ok(resp.json::<T>().await?)
    }
}

/// Broker error bodies look like `{"code": ..., "message": "..."}`.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        })
}

#[async_trait]
impl Brokerage for AlpacaBrokerage {
    fn name(&self) -> &str {
        "alpaca"
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<Order, BrokerageError> {
        order.validate()?;
        let body = OrderBody::from_request(order);
        let placed: Order = self
            .send(self.request(Method::POST, "/orders").json(&body))
            .await?;
        tracing::info!(
            symbol = %placed.symbol,
            order_id = %placed.id,
            status = %placed.status,
            "order placed"
        );
        Ok(placed)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerageError> {
        self.send_raw(self.request(Method::DELETE, &format!("/orders/{order_id}")))
            .await?;
        Ok(())
    }

    async fn account(&self) -> Result<Account, BrokerageError> {
        self.send(self.request(Method::GET, "/account")).await
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerageError> {
        self.send(self.request(Method::GET, "/positions")).await
    }

    async fn open_orders(&self, limit: u32) -> Result<Vec<Order>, BrokerageError> {
        let req = self
            .request(Method::GET, "/orders")
            .query(&[("status", "open".to_string()), ("limit", limit.to_string())]);
        self.send(req).await
    }

    async fn close_position(&self, symbol: &str) -> Result<Order, BrokerageError> {
        self.send(self.request(Method::DELETE, &position_path(symbol)))
            .await
    }
}

/// Positions are keyed by the pair without its slash (`BTC/USD` is
/// `BTCUSD`). Anything else outside the unreserved set is percent-encoded.
fn position_path(symbol: &str) -> String {
    let mut path = String::from("/positions/");
    for byte in symbol.bytes().filter(|&b| b != b'/') {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            path.push(char::from(byte));
        } else {
            path.push_str(&format!("%{byte:02X}"));
        }
    }
    path
}
