//! Single-venue arbitrage engine for a binary-options prediction market.
//!
//! Watches a set of events, reconciles REST snapshots and streaming deltas
//! into a consistent order-book view, runs three pure detection strategies
//! over it every scan tick, and executes the best risk-free candidate as an
//! all-or-nothing group of immediate-or-cancel orders — subject to a
//! pre-trade exposure gate and a loss-triggered circuit breaker.
//!
//! # Modules
//!
//! - [`types`]: shared value types — [`types::Opportunity`], [`types::Leg`],
//!   [`types::OrderGroup`]
//! - [`fees`]: conservative fee estimation for a candidate's buy legs
//! - [`book_store`]: the reconciled per-market order-book cache
//! - [`catalog`]: cached market metadata per event
//! - [`strategies`]: the three pure detection strategies
//! - [`detector`]: orchestrates the strategies and ranks their output
//! - [`exposure_gate`]: pre-trade notional and position-size check
//! - [`ledger`]: cached balance, positions, and FIFO realized P&L
//! - [`circuit_breaker`]: the loss/exposure-triggered trading halt
//! - [`executor`]: submits and classifies one opportunity's order group
//! - [`engine`]: wires everything above into the stream/scan/sync loops

pub mod book_store;
pub mod catalog;
pub mod circuit_breaker;
pub mod detector;
pub mod engine;
pub mod executor;
pub mod exposure_gate;
pub mod fees;
pub mod ledger;
pub mod strategies;
pub mod types;

pub use book_store::BookStore;
pub use catalog::MarketCatalog;
pub use circuit_breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use detector::{Detector, DetectorConfig};
pub use engine::Engine;
pub use executor::{Executor, ExecutorConfig};
pub use exposure_gate::{ExposureGate, ExposureLimits, GateDecision};
pub use fees::FeeCalculator;
pub use ledger::Ledger;
pub use types::{Leg, Opportunity, OpportunityType, OrderGroup, OrderGroupStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use algo_trade_core::{Environment, EngineConfig};

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
    fn public_api_builds_an_engine() {
        let engine = Engine::new(config()).unwrap();
        assert_eq!(engine.metrics().opportunities_detected.load(std::sync::atomic::Ordering::Relaxed), 0);
    }

    #[test]
    fn fee_calculator_default_matches_venue_rate() {
        let calc = FeeCalculator::default();
        assert!(calc.fee_rate > 0.0);
    }

    #[test]
    fn detector_config_default_enables_all_strategies() {
        let config = DetectorConfig::default();
        assert!(config.enabled.multi_outcome);
        assert!(config.enabled.temporal);
        assert!(config.enabled.correlated);
    }
}
