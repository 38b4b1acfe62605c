//! Top-level orchestration (§4.13): wires the streaming client, book store,
//! detector, executor, circuit breaker, exposure gate, and ledger into three
//! concurrent tasks and runs them until shutdown.
//!
//! - stream loop: consumes the venue's WebSocket feed forever, reinstalling a
//!   fresh REST snapshot into the [`BookStore`] on every reconnect
//! - scan loop: every `scan_interval_secs`, runs the detector over the
//!   watched events' cached markets and books, and executes the best
//!   candidate per event
//! - sync loop: every `sync_interval_secs`, refreshes the ledger from the
//!   venue and feeds the circuit breaker's exposure gate
//!
//! All three run under one `tokio::sync::watch` shutdown signal (§5, §9),
//! mirroring the teacher's actor-style components that each take a
//! `watch::Receiver<bool>` or stop flag and check it on every loop iteration.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, RwLock};
use tracing::{error, info, warn};

use algo_trade_core::{Alerter, EngineConfig, EngineEvent, EventBus};
use venue_kalshi::types::{Orderbook, Side};
use venue_kalshi::{KalshiClient, StreamMessage, StreamingClient};

use crate::book_store::BookStore;
use crate::catalog::MarketCatalog;
use crate::circuit_breaker::{BreakerConfig, CircuitBreaker};
use crate::detector::{Detector, DetectorConfig};
use crate::executor::{Executor, ExecutorConfig};
use crate::exposure_gate::{ExposureGate, ExposureLimits, ExposureSnapshot, GateDecision};
use crate::fees::FeeCalculator;
use crate::ledger::Ledger;
use crate::types::Opportunity;

/// Every component the engine owns, assembled once at startup from an
/// [`EngineConfig`] and shared across the three tasks via `Arc`.
pub struct Engine {
    client: Arc<KalshiClient>,
    config: EngineConfig,
    book_store: Arc<BookStore>,
    catalog: Arc<MarketCatalog>,
    detector: Arc<Detector>,
    executor: Arc<Executor>,
    breaker: Arc<CircuitBreaker>,
    gate: Arc<ExposureGate>,
    ledger: Arc<Ledger>,
    fee_calc: FeeCalculator,
    events: EventBus,
    alerter: Arc<Alerter>,
    metrics: Arc<algo_trade_core::EngineMetrics>,
    watched: Arc<RwLock<Vec<String>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Engine {
    /// Builds every component from `config`. Does not touch the network.
    ///
    /// # Errors
    /// Returns an error if the venue client cannot be constructed (e.g. the
    /// private key file is missing or malformed).
    pub fn new(config: EngineConfig) -> venue_kalshi::Result<Self> {
        let client = Arc::new(KalshiClient::from_engine_config(&config)?);
        let fee_calc = config
            .fee_rate
            .map_or_else(FeeCalculator::default, FeeCalculator::new);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            client: Arc::clone(&client),
            book_store: Arc::new(BookStore::new()),
            catalog: Arc::new(MarketCatalog::new(Arc::clone(&client))),
            detector: Arc::new(Detector::new(
                DetectorConfig {
                    min_profit_cents: i64::from(config.min_profit_cents),
                    ..DetectorConfig::default()
                },
                fee_calc,
            )),
            executor: Arc::new(Executor::new(
                Arc::clone(&client),
                ExecutorConfig { max_concurrent: config.max_concurrent_executions },
            )),
            breaker: Arc::new(CircuitBreaker::new(BreakerConfig {
                max_daily_loss_cents: i64::try_from(config.max_daily_loss_cents).unwrap_or(i64::MAX),
                max_consecutive_losses: config.max_consecutive_losses,
                max_exposure_cents: i64::try_from(config.max_exposure_cents).unwrap_or(i64::MAX),
                cooldown_seconds: config.cooldown_seconds,
                half_open_test_limit: config.half_open_test_limit,
            })),
            gate: Arc::new(ExposureGate::new(ExposureLimits {
                max_total_exposure_cents: i64::try_from(config.max_exposure_cents).unwrap_or(i64::MAX),
                max_position_per_market: i64::from(config.max_position_per_market),
                max_exposure_per_market_cents: i64::try_from(config.max_exposure_cents).unwrap_or(i64::MAX),
            })),
            ledger: Arc::new(Ledger::new()),
            fee_calc,
            events: EventBus::default(),
            alerter: Arc::new(Alerter::new(config.slack_webhook_url.clone(), config.discord_webhook_url.clone())),
            metrics: algo_trade_core::EngineMetrics::new(),
            watched: Arc::new(RwLock::new(Vec::new())),
            shutdown_tx,
            shutdown_rx,
            config,
        })
    }

    #[must_use]
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<algo_trade_core::EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Starts watching `event_ticker`: fetches its markets, installs a REST
    /// orderbook snapshot for each into the book store, and adds it to the
    /// scan loop's watch list. Streaming subscription picks up new tickers
    /// only on the next reconnect, matching `StreamingClient`'s fixed
    /// ticker set per connection (§4.5, §9).
    ///
    /// # Errors
    /// Returns an error if the venue request for markets or an orderbook
    /// fails.
    pub async fn watch_event(&self, event_ticker: &str) -> venue_kalshi::Result<()> {
        let markets = self.catalog.refresh(event_ticker).await?;
        for market in &markets {
            let book = self.client.get_orderbook(&market.ticker, 50).await?;
            self.book_store.install_snapshot(book);
        }
        self.watched.write().await.push(event_ticker.to_string());
        info!(event_ticker, markets = markets.len(), "watching event");
        Ok(())
    }

    /// Runs the stream, scan, and sync loops concurrently until `shutdown`
    /// is called or one of them exits with an error. Mirrors the teacher's
    /// multi-task actors, each holding its own clone of the shared state and
    /// checking a `watch::Receiver` for a stop signal every iteration.
    pub async fn run(&self) {
        let stream = self.run_stream_loop();
        let scan = self.run_scan_loop();
        let sync = self.run_sync_loop();

        tokio::join!(stream, scan, sync);
    }

    /// Signals every task to stop at the next loop iteration.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn is_shutting_down(rx: &watch::Receiver<bool>) -> bool {
        *rx.borrow()
    }

    async fn run_stream_loop(&self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            if Self::is_shutting_down(&shutdown_rx) {
                return;
            }

            let tickers = self.book_store.tracked_tickers();
            if tickers.is_empty() {
                if wait_or_shutdown(&mut shutdown_rx, std::time::Duration::from_secs(1)).await {
                    return;
                }
                continue;
            }

            let (tx, mut rx) = mpsc::channel(1024);
            let streaming = StreamingClient::new(self.config.environment.websocket_url(), self.config.api_key_id.clone(), tickers);
            let client = Arc::clone(&self.client);
            let run_handle = tokio::spawn(async move {
                streaming.run(move |method, path| client.sign(method, path), tx).await;
            });

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        drop(rx);
                        run_handle.abort();
                        return;
                    }
                    message = rx.recv() => {
                        match message {
                            Some(msg) => self.handle_stream_message(msg).await,
                            None => break,
                        }
                    }
                }
            }
        }
    }

    async fn handle_stream_message(&self, message: StreamMessage) {
        match message {
            StreamMessage::Snapshot { ticker, yes, no } => {
                let mut book = Orderbook::empty(&ticker);
                for level in yes {
                    book.apply_delta(Side::Yes, level.price, level.count);
                }
                for level in no {
                    book.apply_delta(Side::No, level.price, level.count);
                }
                self.book_store.install_snapshot(book);
            }
            StreamMessage::Delta { ticker, side, price, count } => {
                self.book_store.apply_delta(&ticker, side, price, count);
            }
            StreamMessage::Trade { .. } => {}
            StreamMessage::Reconnecting => {
                self.events.publish(EngineEvent::ConnectionStateChanged { connected: false, timestamp: chrono::Utc::now() });
                self.metrics.connected.store(0, std::sync::atomic::Ordering::Relaxed);
                for ticker in self.book_store.tracked_tickers() {
                    if let Ok(book) = self.client.get_orderbook(&ticker, 50).await {
                        self.book_store.install_snapshot(book);
                    }
                }
                self.events.publish(EngineEvent::ConnectionStateChanged { connected: true, timestamp: chrono::Utc::now() });
                self.metrics.connected.store(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }

    async fn run_scan_loop(&self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let interval = std::time::Duration::from_secs(self.config.scan_interval_secs);
        loop {
            if wait_or_shutdown(&mut shutdown_rx, interval).await {
                return;
            }
            if let Err(err) = self.scan_once().await {
                warn!(%err, "scan tick failed");
            }
        }
    }

    async fn scan_once(&self) -> venue_kalshi::Result<()> {
        let watched = self.watched.read().await.clone();
        for event_ticker in watched {
            let markets = self.catalog.cached(&event_ticker);
            if markets.is_empty() {
                continue;
            }
            let tickers: Vec<String> = markets.iter().map(|m| m.ticker.clone()).collect();
            let books = self.book_store.get_many(&tickers);

            let candidates = self.detector.detect_all(&markets, &books);
            self.metrics.opportunities_detected.fetch_add(candidates.len() as u64, std::sync::atomic::Ordering::Relaxed);
            let Some(best) = Detector::best_of(&candidates) else {
                continue;
            };
            for candidate in &candidates {
                self.events.publish(EngineEvent::OpportunityDetected {
                    opportunity_type: candidate.opportunity_type.to_string(),
                    event_ticker: candidate.event_ticker.clone(),
                    net_profit_cents: candidate.net_profit_cents,
                    confidence: candidate.confidence,
                    timestamp: candidate.detected_at,
                });
            }

            if !self.detector.validate(best, &books) {
                continue;
            }
            self.handle_opportunity(best, &books).await;
        }
        Ok(())
    }

    /// Checks the circuit breaker, checks the exposure gate, clamps the
    /// quantity to whichever is more restrictive, submits the order group,
    /// and feeds the outcome back into the breaker (§4.13).
    async fn handle_opportunity(&self, opportunity: &Opportunity, _books: &HashMap<String, Orderbook>) {
        if let Err(err) = self.breaker.check_and_allow() {
            warn!(cooldown_remaining_secs = err.cooldown_remaining_secs, "circuit breaker open, skipping opportunity");
            return;
        }

        let positions = self.ledger.positions();
        let position_lookup = |ticker: &str| {
            positions
                .iter()
                .find(|p| p.ticker == ticker)
                .cloned()
                .unwrap_or_else(|| venue_kalshi::types::Position::flat(ticker))
        };
        let snapshot = ExposureSnapshot {
            total_exposure_cents: self.ledger.total_exposure_cents(),
            positions: &position_lookup,
        };

        let quantity = match self.gate.check(opportunity, opportunity.max_quantity, &snapshot) {
            GateDecision::Approved => opportunity.max_quantity,
            GateDecision::Denied { max_allowed_quantity: 0 } => {
                info!(event_ticker = %opportunity.event_ticker, "opportunity denied by exposure gate, zero allowed");
                return;
            }
            GateDecision::Denied { max_allowed_quantity } => max_allowed_quantity,
        };

        let result = self.executor.execute(opportunity, quantity).await;
        self.breaker.record_trade(result.profit_cents, |reason| {
            self.metrics.circuit_breaker_trips.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.events.publish(EngineEvent::CircuitBreakerTripped {
                reason: reason.to_string(),
                daily_loss_cents: self.breaker.metrics().daily_loss_cents,
                exposure_cents: self.breaker.metrics().total_exposure_cents,
                timestamp: chrono::Utc::now(),
            });
        });

        if result.success {
            self.metrics.trades_executed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.metrics.realized_profit_cents.fetch_add(result.profit_cents, std::sync::atomic::Ordering::Relaxed);
            self.events.publish(EngineEvent::TradeExecuted {
                event_ticker: opportunity.event_ticker.clone(),
                realized_profit_cents: result.profit_cents,
                legs: result.group.legs.len() as u32,
                timestamp: chrono::Utc::now(),
            });
        } else {
            self.metrics.trades_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let event = EngineEvent::TradeFailed {
                event_ticker: opportunity.event_ticker.clone(),
                error: result.group.error.clone().unwrap_or_else(|| "leg risk realized".to_string()),
                timestamp: chrono::Utc::now(),
            };
            self.alerter.notify(&event).await;
            self.events.publish(event);
        }
    }

    async fn run_sync_loop(&self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let interval = std::time::Duration::from_secs(self.config.sync_interval_secs);
        loop {
            if wait_or_shutdown(&mut shutdown_rx, interval).await {
                return;
            }
            self.sync_once().await;
        }
    }

    async fn sync_once(&self) {
        let balance = match self.client.get_balance().await {
            Ok(b) => b,
            Err(err) => {
                warn!(%err, "sync: balance refresh failed");
                return;
            }
        };
        let positions = match self.client.get_positions().await {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, "sync: positions refresh failed");
                return;
            }
        };
        let fills = self.client.get_fills(None).await.unwrap_or_default();

        self.ledger.refresh(balance, positions, fills);
        let exposure = self.ledger.total_exposure_cents();
        self.breaker.update_exposure(exposure, |reason| {
            self.metrics.circuit_breaker_trips.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.events.publish(EngineEvent::CircuitBreakerTripped {
                reason: reason.to_string(),
                daily_loss_cents: self.breaker.metrics().daily_loss_cents,
                exposure_cents: exposure,
                timestamp: chrono::Utc::now(),
            });
        });
    }
}

/// Sleeps for `duration` unless `shutdown_rx` flips to `true` first; returns
/// `true` if shutdown was signaled.
async fn wait_or_shutdown(shutdown_rx: &mut watch::Receiver<bool>, duration: std::time::Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        result = shutdown_rx.changed() => result.is_err() || *shutdown_rx.borrow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algo_trade_core::Environment;

    fn config() -> EngineConfig {
        EngineConfig {
            api_key_id: "test-key".into(),
            private_key_path: "../venue-kalshi/tests/fixtures/test_private_key.pem".into(),
            environment: Environment::Development,
            min_profit_cents: 2,
            max_position_per_market: 100,
            max_exposure_cents: 50_000,
            max_daily_loss_cents: 10_000,
            max_consecutive_losses: 5,
            cooldown_seconds: 300,
            half_open_test_limit: 1,
            read_rate_limit: 20.0,
            write_rate_limit: 10.0,
            scan_interval_secs: 1,
            sync_interval_secs: 30,
            max_concurrent_executions: 3,
            fee_rate: None,
            slack_webhook_url: None,
            discord_webhook_url: None,
            metrics_port: 8000,
        }
    }

    #[test]
    fn new_builds_every_component_without_touching_network() {
        let engine = Engine::new(config()).unwrap();
        assert_eq!(engine.breaker.state(), crate::circuit_breaker::BreakerState::Closed);
    }

    #[tokio::test]
    async fn shutdown_stops_scan_loop_promptly() {
        let engine = Engine::new(config()).unwrap();
        let mut rx = engine.shutdown_rx.clone();
        engine.shutdown();
        assert!(wait_or_shutdown(&mut rx, std::time::Duration::from_secs(5)).await);
    }
}
