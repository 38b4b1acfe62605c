//! Authenticated WebSocket streaming client (§4.5).
//!
//! Subscribes to `orderbook_delta` for a fixed set of tickers and emits
//! [`StreamMessage`] values over an mpsc channel. Reconnects with capped
//! exponential backoff and resubscribes to the full ticker set on every
//! reconnect — the caller is expected to reinstall a fresh snapshot via
//! [`StreamMessage::Snapshot`] whenever that happens.

use crate::error::{KalshiError, Result};
use crate::types::{PriceLevel, Side};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const MAX_BACKOFF_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub enum StreamMessage {
    Snapshot {
        ticker: String,
        yes: Vec<PriceLevel>,
        no: Vec<PriceLevel>,
    },
    Delta {
        ticker: String,
        side: Side,
        price: u32,
        count: u64,
    },
    Trade {
        ticker: String,
        side: Side,
        price: u32,
        count: u64,
    },
    /// The connection dropped and is being reestablished; the caller should
    /// treat all books as stale until the next `Snapshot`.
    Reconnecting,
}

pub struct StreamingClient {
    url: String,
    api_key_id: String,
    tickers: Vec<String>,
}

impl StreamingClient {
    #[must_use]
    pub fn new(url: impl Into<String>, api_key_id: impl Into<String>, tickers: Vec<String>) -> Self {
        Self {
            url: url.into(),
            api_key_id: api_key_id.into(),
            tickers,
        }
    }

    /// Runs the reconnect loop forever, sending decoded messages to `tx`.
    /// Returns only if `tx` is dropped (i.e. the receiver side shut down).
    pub async fn run(&self, sign: impl Fn(&str, &str) -> Result<crate::auth::SignedHeaders>, tx: mpsc::Sender<StreamMessage>) {
        let mut attempt = 0u32;
        loop {
            match self.connect_and_stream(&sign, &tx).await {
                Ok(()) => return, // tx closed, shut down quietly
                Err(err) => {
                    attempt += 1;
                    let backoff = Duration::from_secs(2u64.pow(attempt.min(6)).min(MAX_BACKOFF_SECS));
                    tracing::warn!(%err, attempt, ?backoff, "streaming connection lost, reconnecting");
                    if tx.send(StreamMessage::Reconnecting).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn connect_and_stream(
        &self,
        sign: &impl Fn(&str, &str) -> Result<crate::auth::SignedHeaders>,
        tx: &mpsc::Sender<StreamMessage>,
    ) -> Result<()> {
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;

        let headers = sign("GET", "/trade-api/ws/v2")?;
        let mut request = self
            .url
            .clone()
            .into_client_request()
            .map_err(|e| KalshiError::WebSocket(format!("invalid websocket url: {e}")))?;
        for (name, value) in headers.as_tuples() {
            request.headers_mut().insert(
                name,
                value
                    .parse()
                    .map_err(|e| KalshiError::WebSocket(format!("invalid header: {e}")))?,
            );
        }

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| KalshiError::WebSocket(format!("connect failed: {e}")))?;
        let (mut write, mut read) = ws.split();

        let subscribe = serde_json::json!({
            "id": 1,
            "cmd": "subscribe",
            "params": { "channels": ["orderbook_delta"], "market_tickers": self.tickers },
        });
        write
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(|e| KalshiError::WebSocket(format!("subscribe failed: {e}")))?;

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| KalshiError::WebSocket(format!("read failed: {e}")))?;
            let Message::Text(text) = msg else { continue };
            match serde_json::from_str::<WireMessage>(&text) {
                Ok(wire) => {
                    for decoded in wire.into_stream_messages() {
                        if tx.send(decoded).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, raw = %text, "unrecognized streaming message");
                }
            }
        }

        Err(KalshiError::WebSocket("connection closed by venue".into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireMessage {
    #[serde(rename = "orderbook_snapshot")]
    Snapshot { msg: WireSnapshot },
    #[serde(rename = "orderbook_delta")]
    Delta { msg: WireDelta },
    #[serde(rename = "trade")]
    Trade { msg: WireTrade },
    #[serde(rename = "subscribed")]
    Subscribed,
    #[serde(rename = "unsubscribed")]
    Unsubscribed,
    #[serde(rename = "error")]
    Error { msg: WireError },
}

#[derive(Debug, Deserialize)]
struct WireSnapshot {
    market_ticker: String,
    #[serde(default)]
    yes: Vec<[u64; 2]>,
    #[serde(default)]
    no: Vec<[u64; 2]>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    market_ticker: String,
    side: String,
    price: u32,
    delta: i64,
    #[serde(default)]
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireTrade {
    market_ticker: String,
    taker_side: String,
    yes_price: u32,
    count: u64,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

impl WireMessage {
    fn into_stream_messages(self) -> Vec<StreamMessage> {
        match self {
            Self::Snapshot { msg } => vec![StreamMessage::Snapshot {
                ticker: msg.market_ticker,
                yes: levels(msg.yes),
                no: levels(msg.no),
            }],
            Self::Delta { msg } => {
                let side = if msg.side == "yes" { Side::Yes } else { Side::No };
                // The wire carries either an absolute `count` or a signed
                // `delta`; absolute count is authoritative when present.
                let count = msg.count.unwrap_or_else(|| msg.delta.max(0) as u64);
                vec![StreamMessage::Delta {
                    ticker: msg.market_ticker,
                    side,
                    price: msg.price,
                    count,
                }]
            }
            Self::Trade { msg } => {
                let side = if msg.taker_side == "yes" { Side::Yes } else { Side::No };
                vec![StreamMessage::Trade {
                    ticker: msg.market_ticker,
                    side,
                    price: msg.yes_price,
                    count: msg.count,
                }]
            }
            Self::Error { msg } => {
                tracing::warn!(message = %msg.message, "venue reported a streaming error");
                vec![]
            }
            Self::Subscribed | Self::Unsubscribed => vec![],
        }
    }
}

fn levels(raw: Vec<[u64; 2]>) -> Vec<PriceLevel> {
    raw.into_iter()
        .map(|[price, count]| PriceLevel {
            price: price as u32,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_message_decodes() {
        let raw = serde_json::json!({
            "type": "orderbook_snapshot",
            "msg": { "market_ticker": "KXTEST-A", "yes": [[45, 100]], "no": [[53, 150]] }
        });
        let wire: WireMessage = serde_json::from_value(raw).unwrap();
        let decoded = wire.into_stream_messages();
        assert_eq!(decoded.len(), 1);
        assert!(matches!(decoded[0], StreamMessage::Snapshot { .. }));
    }

    #[test]
    fn delta_message_decodes_with_absolute_count() {
        let raw = serde_json::json!({
            "type": "orderbook_delta",
            "msg": { "market_ticker": "KXTEST-A", "side": "yes", "price": 45, "delta": 10, "count": 90 }
        });
        let wire: WireMessage = serde_json::from_value(raw).unwrap();
        let decoded = wire.into_stream_messages();
        match &decoded[0] {
            StreamMessage::Delta { count, .. } => assert_eq!(*count, 90),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn error_message_produces_no_stream_messages() {
        let raw = serde_json::json!({ "type": "error", "msg": { "message": "bad subscription" } });
        let wire: WireMessage = serde_json::from_value(raw).unwrap();
        assert!(wire.into_stream_messages().is_empty());
    }

    #[test]
    fn subscribed_message_produces_no_stream_messages() {
        let raw = serde_json::json!({ "type": "subscribed" });
        let wire: WireMessage = serde_json::from_value(raw).unwrap();
        assert!(wire.into_stream_messages().is_empty());
    }
}
