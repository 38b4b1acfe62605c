//! Signed REST client for the venue's trading API (§4.3, §6).
//!
//! Every request is signed fresh per attempt, passes through the
//! [`RateLimiter`](crate::rate_limiter::RateLimiter), and is retried up to
//! three times on rate-limit or transport errors. Authentication and order
//! errors never retry.

use crate::auth::KalshiAuth;
use crate::error::{KalshiError, Result};
use crate::rate_limiter::{BucketKind, RateLimiter};
use crate::types::{
    Action, Balance, Fill, Market, MarketStatus, Order, OrderRequest, OrderStatus, OrderType,
    Orderbook, PriceLevel, Side,
};
use algo_trade_core::{EngineConfig, Environment};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const MAX_BACKOFF_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct KalshiClientConfig {
    pub base_url: String,
    pub websocket_url: String,
    pub api_key_id: String,
    pub private_key_path: String,
    pub read_rate_limit: f64,
    pub write_rate_limit: f64,
    pub timeout_secs: u64,
}

impl KalshiClientConfig {
    #[must_use]
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self {
            base_url: config.environment.base_url().to_string(),
            websocket_url: config.environment.websocket_url().to_string(),
            api_key_id: config.api_key_id.clone(),
            private_key_path: config.private_key_path.clone(),
            read_rate_limit: config.read_rate_limit,
            write_rate_limit: config.write_rate_limit,
            timeout_secs: 30,
        }
    }
}

pub struct KalshiClient {
    base_url: String,
    http: Client,
    auth: KalshiAuth,
    limiter: RateLimiter,
}

impl std::fmt::Debug for KalshiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KalshiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl KalshiClient {
    /// # Errors
    /// Returns an error if the private key can't be read/parsed or the HTTP
    /// client can't be built.
    pub fn new(config: KalshiClientConfig) -> Result<Self> {
        let auth = KalshiAuth::from_key_file(config.api_key_id.clone(), &config.private_key_path)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KalshiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url,
            http,
            auth,
            limiter: RateLimiter::new(config.read_rate_limit, config.write_rate_limit),
        })
    }

    /// # Errors
    /// Returns an error if the private key can't be read/parsed or the HTTP
    /// client can't be built.
    pub fn from_engine_config(config: &EngineConfig) -> Result<Self> {
        Self::new(KalshiClientConfig::from_engine_config(config))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Signs a request outside the REST surface proper — used for the
    /// streaming upgrade handshake, which shares the same header scheme.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn sign(&self, method: &str, path: &str) -> Result<crate::auth::SignedHeaders> {
        self.auth.sign_request(method, path)
    }

    fn validate_path_segment(kind: &str, value: &str) -> Result<()> {
        let ok = !value.is_empty()
            && value.len() <= 128
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if ok {
            Ok(())
        } else {
            Err(KalshiError::InvalidOrder(format!("invalid {kind}: {value}")))
        }
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T> {
        let bytes = self.request_raw(method, path, body).await?;
        if bytes.is_empty() {
            // Callers of empty-body endpoints (DELETE) use `request_unit`.
            return Err(KalshiError::Serialization("empty response body".into()));
        }
        serde_json::from_slice(&bytes).map_err(KalshiError::from)
    }

    async fn request_unit(&self, method: &str, path: &str) -> Result<()> {
        self.request_raw::<()>(method, path, None).await?;
        Ok(())
    }

    /// Issues one logical request, retrying per §4.3/§7: up to
    /// [`MAX_ATTEMPTS`] on rate-limit or transport errors, never on
    /// authentication/order/not-found errors.
    async fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<Vec<u8>> {
        let kind = BucketKind::for_method(method);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.limiter.acquire(kind, 1).await;

            match self.attempt_once(method, path, body).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if attempt >= MAX_ATTEMPTS || !err.is_retryable() => return Err(err),
                Err(KalshiError::RateLimit { retry_after_secs }) => {
                    tracing::warn!(attempt, retry_after_secs, path, "rate limited, retrying");
                    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                }
                Err(err) => {
                    let backoff = Duration::from_secs(2u64.pow(attempt).min(MAX_BACKOFF_SECS));
                    tracing::warn!(attempt, %err, path, ?backoff, "transport error, retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        method: &str,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let headers = self.auth.sign_request(method, path)?;

        let mut builder = match method {
            "GET" => self.http.get(&url),
            "POST" => self.http.post(&url),
            "DELETE" => self.http.delete(&url),
            other => return Err(KalshiError::Network(format!("unsupported method {other}"))),
        };
        builder = builder.header("Accept", "application/json");
        for (name, value) in headers.as_tuples() {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.header("Content-Type", "application/json").json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await?.to_vec());
        }

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status, retry_after, &text))
    }

    // ===== Markets =====

    /// # Errors
    /// Returns an error if the request fails.
    pub async fn get_markets(
        &self,
        event_ticker: Option<&str>,
        status: Option<&str>,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<(Vec<Market>, Option<String>)> {
        let mut query = Vec::new();
        if let Some(v) = event_ticker {
            query.push(format!("event_ticker={v}"));
        }
        if let Some(v) = status {
            query.push(format!("status={v}"));
        }
        if let Some(v) = limit {
            query.push(format!("limit={v}"));
        }
        if let Some(v) = cursor {
            query.push(format!("cursor={v}"));
        }
        let path = if query.is_empty() {
            "/markets".to_string()
        } else {
            format!("/markets?{}", query.join("&"))
        };

        let resp: RawMarketsResponse = self.request("GET", &path, NO_BODY).await?;
        let markets = resp.markets.into_iter().map(Market::from).collect();
        Ok((markets, resp.cursor))
    }

    /// # Errors
    /// Returns an error if the market doesn't exist or the request fails.
    pub async fn get_market(&self, ticker: &str) -> Result<Market> {
        Self::validate_path_segment("ticker", ticker)?;
        let path = format!("/markets/{ticker}");
        let resp: RawMarketResponse = self.request("GET", &path, NO_BODY).await?;
        Ok(Market::from(resp.market))
    }

    /// # Errors
    /// Returns an error if the request fails.
    pub async fn get_orderbook(&self, ticker: &str, depth: u32) -> Result<Orderbook> {
        Self::validate_path_segment("ticker", ticker)?;
        let path = format!("/markets/{ticker}/orderbook?depth={}", depth.min(100));
        let resp: RawOrderbookResponse = self.request("GET", &path, NO_BODY).await?;
        Ok(raw_to_orderbook(ticker, resp.orderbook))
    }

    /// # Errors
    /// Returns an error if the event doesn't exist or the request fails.
    pub async fn get_event(&self, event_ticker: &str) -> Result<Vec<String>> {
        Self::validate_path_segment("event_ticker", event_ticker)?;
        let path = format!("/events/{event_ticker}");
        let resp: RawEventResponse = self.request("GET", &path, NO_BODY).await?;
        Ok(resp
            .event
            .markets
            .into_iter()
            .map(|m| m.ticker)
            .collect())
    }

    // ===== Portfolio =====

    /// # Errors
    /// Returns an error if the request fails.
    pub async fn get_balance(&self) -> Result<Balance> {
        let resp: RawBalanceResponse = self.request("GET", "/portfolio/balance", NO_BODY).await?;
        Ok(Balance {
            balance_cents: resp.balance,
            available_balance_cents: resp.balance,
        })
    }

    /// # Errors
    /// Returns an error if the request fails.
    pub async fn get_positions(&self) -> Result<Vec<crate::types::Position>> {
        let resp: RawPositionsResponse =
            self.request("GET", "/portfolio/positions", NO_BODY).await?;
        Ok(resp
            .market_positions
            .into_iter()
            .map(|p| crate::types::Position {
                ticker: p.ticker,
                net_contracts: p.position,
                market_exposure_cents: p.market_exposure,
                resting_orders_count: p.resting_orders_count.unwrap_or(0),
            })
            .collect())
    }

    /// # Errors
    /// Returns an error if the request fails.
    pub async fn get_fills(&self, ticker: Option<&str>) -> Result<Vec<Fill>> {
        let path = match ticker {
            Some(t) => format!("/portfolio/fills?ticker={t}"),
            None => "/portfolio/fills".to_string(),
        };
        let resp: RawFillsResponse = self.request("GET", &path, NO_BODY).await?;
        Ok(resp.fills.into_iter().map(Fill::from).collect())
    }

    // ===== Orders =====

    /// # Errors
    /// Returns an error if the order is rejected or the request fails.
    pub async fn submit_order(&self, order: &OrderRequest) -> Result<Order> {
        let resp: RawOrderResponse = self
            .request("POST", "/portfolio/orders", Some(order))
            .await?;
        Ok(Order::from(resp.order))
    }

    /// # Errors
    /// Returns an error if the order can't be canceled.
    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        Self::validate_path_segment("order_id", order_id)?;
        self.request_unit("DELETE", &format!("/portfolio/orders/{order_id}"))
            .await
    }

    /// # Errors
    /// Returns an error if the order doesn't exist or the request fails.
    pub async fn get_order(&self, order_id: &str) -> Result<Order> {
        Self::validate_path_segment("order_id", order_id)?;
        let resp: RawOrderResponse = self
            .request("GET", &format!("/portfolio/orders/{order_id}"), NO_BODY)
            .await?;
        Ok(Order::from(resp.order))
    }
}

const NO_BODY: Option<&()> = None;

fn classify_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> KalshiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            KalshiError::Authentication(body.to_string())
        }
        StatusCode::TOO_MANY_REQUESTS => KalshiError::RateLimit {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        StatusCode::BAD_REQUEST => {
            if body.to_ascii_lowercase().contains("insufficient") {
                KalshiError::InsufficientFunds(body.to_string())
            } else {
                KalshiError::OrderRejected(body.to_string())
            }
        }
        StatusCode::NOT_FOUND => KalshiError::NotFound(body.to_string()),
        other => KalshiError::api(other.as_u16(), body),
    }
}

// =============================================================================
// Wire shapes
// =============================================================================

#[derive(Deserialize)]
struct RawMarketsResponse {
    #[serde(default)]
    markets: Vec<RawMarket>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct RawMarketResponse {
    market: RawMarket,
}

#[derive(Deserialize)]
struct RawMarket {
    ticker: String,
    event_ticker: String,
    title: String,
    status: String,
    #[serde(default)]
    expiration_time: Option<DateTime<Utc>>,
    #[serde(default)]
    yes_bid: Option<u32>,
    #[serde(default)]
    yes_ask: Option<u32>,
    #[serde(default)]
    no_bid: Option<u32>,
    #[serde(default)]
    no_ask: Option<u32>,
}

impl From<RawMarket> for Market {
    fn from(raw: RawMarket) -> Self {
        let status = match raw.status.as_str() {
            "active" | "open" => MarketStatus::Open,
            "settled" | "finalized" => MarketStatus::Settled,
            "paused" => MarketStatus::Paused,
            _ => MarketStatus::Closed,
        };
        Self {
            ticker: raw.ticker,
            event_ticker: raw.event_ticker,
            title: raw.title,
            status,
            expiration_time: raw.expiration_time,
            yes_bid: raw.yes_bid,
            yes_ask: raw.yes_ask,
            no_bid: raw.no_bid,
            no_ask: raw.no_ask,
        }
    }
}

#[derive(Deserialize)]
struct RawEventResponse {
    event: RawEvent,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    markets: Vec<RawEventMarket>,
}

#[derive(Deserialize)]
struct RawEventMarket {
    ticker: String,
}

#[derive(Deserialize)]
struct RawOrderbookResponse {
    orderbook: RawOrderbook,
}

#[derive(Deserialize, Default)]
struct RawOrderbook {
    #[serde(default)]
    yes: Vec<[u64; 2]>,
    #[serde(default)]
    no: Vec<[u64; 2]>,
}

fn raw_to_orderbook(ticker: &str, raw: RawOrderbook) -> Orderbook {
    let mut book = Orderbook::empty(ticker);
    for [price, qty] in raw.yes {
        book.apply_delta(Side::Yes, price as u32, qty);
    }
    for [price, qty] in raw.no {
        book.apply_delta(Side::No, price as u32, qty);
    }
    book
}

#[derive(Deserialize)]
struct RawBalanceResponse {
    balance: i64,
}

#[derive(Deserialize)]
struct RawPositionsResponse {
    #[serde(default)]
    market_positions: Vec<RawPosition>,
}

#[derive(Deserialize)]
struct RawPosition {
    ticker: String,
    position: i64,
    market_exposure: i64,
    #[serde(default)]
    resting_orders_count: Option<u32>,
}

#[derive(Deserialize)]
struct RawFillsResponse {
    #[serde(default)]
    fills: Vec<RawFill>,
}

#[derive(Deserialize)]
struct RawFill {
    fill_id: String,
    order_id: String,
    ticker: String,
    side: String,
    action: String,
    yes_price: Option<u32>,
    no_price: Option<u32>,
    count: u32,
    created_time: DateTime<Utc>,
    #[serde(default)]
    is_taker: bool,
}

impl From<RawFill> for Fill {
    fn from(raw: RawFill) -> Self {
        let side = if raw.side == "yes" { Side::Yes } else { Side::No };
        let price = match side {
            Side::Yes => raw.yes_price,
            Side::No => raw.no_price,
        }
        .unwrap_or(0);
        Self {
            id: raw.fill_id,
            order_id: raw.order_id,
            ticker: raw.ticker,
            side,
            action: if raw.action == "buy" { Action::Buy } else { Action::Sell },
            price,
            count: raw.count,
            created_time: raw.created_time,
            is_taker: raw.is_taker,
        }
    }
}

#[derive(Deserialize)]
struct RawOrderResponse {
    order: RawOrder,
}

#[derive(Deserialize)]
struct RawOrder {
    order_id: String,
    #[serde(default)]
    client_order_id: Option<String>,
    ticker: String,
    side: String,
    action: String,
    #[serde(rename = "type", default)]
    order_type: Option<String>,
    status: String,
    #[serde(default)]
    yes_price: Option<u32>,
    #[serde(default)]
    no_price: Option<u32>,
    #[serde(rename = "initial_count", alias = "count")]
    count: u32,
    #[serde(default)]
    remaining_count: u32,
    #[serde(default)]
    created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_time: Option<DateTime<Utc>>,
}

impl From<RawOrder> for Order {
    fn from(raw: RawOrder) -> Self {
        let side = if raw.side == "yes" { Side::Yes } else { Side::No };
        let status = match raw.status.as_str() {
            "resting" => OrderStatus::Resting,
            "executed" | "filled" => OrderStatus::Executed,
            "partially_filled" | "partial" => OrderStatus::Partial,
            "canceled" | "cancelled" => OrderStatus::Canceled,
            _ => OrderStatus::Pending,
        };
        Self {
            order_id: raw.order_id,
            client_order_id: raw.client_order_id,
            ticker: raw.ticker,
            side,
            action: if raw.action == "buy" { Action::Buy } else { Action::Sell },
            order_type: match raw.order_type.as_deref() {
                Some("market") => OrderType::Market,
                _ => OrderType::Limit,
            },
            status,
            price: match side {
                Side::Yes => raw.yes_price,
                Side::No => raw.no_price,
            },
            count: raw.count,
            remaining_count: raw.remaining_count,
            created_time: raw.created_time,
            updated_time: raw.updated_time,
        }
    }
}
