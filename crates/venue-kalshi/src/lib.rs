//! Venue integration for an automated prediction-market arbitrage engine.
//!
//! This crate provides:
//! - RSA-PSS request signing ([`auth`])
//! - A rate-limited, retrying REST client ([`client`])
//! - Data models for markets, orders, positions, and the implied-ask
//!   order book ([`types`])
//! - An authenticated WebSocket streaming client ([`streaming`])
//!
//! # Implied pricing
//!
//! The venue publishes only bid ladders on both sides of a binary market.
//! There is no separate ask ladder on the wire — an ask is always implied
//! as `100 - best_opposite_bid`. See [`types::Orderbook`].
//!
//! # Authentication
//!
//! Requests are signed with RSA-PSS (SHA-256). The signed payload is
//! `timestamp_ms || METHOD || path` (query string excluded). See [`auth`].

pub mod auth;
pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod streaming;
pub mod types;

pub use auth::{KalshiAuth, SignedHeaders};
pub use client::{KalshiClient, KalshiClientConfig};
pub use error::{KalshiError, Result};
pub use rate_limiter::{BucketKind, RateLimiter};
pub use streaming::{StreamMessage, StreamingClient};
pub use types::{
    Action, Balance, Fill, Market, MarketStatus, Order, OrderRequest, OrderStatus, OrderType,
    Orderbook, Position, PriceLevel, Side,
};
