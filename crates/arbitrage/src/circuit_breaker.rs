//! Trading circuit breaker: a finite-state guard that halts execution once
//! loss or exposure thresholds are crossed (§4.11).
//!
//! States: `CLOSED` (trading allowed) → `OPEN` (trading blocked) →
//! `HALF_OPEN` (a bounded number of test trades allowed) → back to `CLOSED`
//! on the first win, or straight back to `OPEN` on any loss.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Configuration thresholds, sourced from [`crate`]'s engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub max_daily_loss_cents: i64,
    pub max_consecutive_losses: u32,
    pub max_exposure_cents: i64,
    pub cooldown_seconds: u64,
    pub half_open_test_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Observability counters, reset on trip (via `trip_count`, which persists)
/// or explicitly via [`CircuitBreaker::reset_daily_metrics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakerMetrics {
    pub daily_loss_cents: i64,
    pub consecutive_losses: u32,
    pub total_exposure_cents: i64,
    pub trip_count: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("circuit breaker open, {cooldown_remaining_secs}s remaining in cooldown")]
pub struct CircuitBreakerOpenError {
    pub cooldown_remaining_secs: u64,
}

struct Inner {
    state: BreakerState,
    metrics: BreakerMetrics,
    trip_time: Option<Instant>,
    half_open_allowances: u32,
}

/// Thread-safe breaker: every transition happens under one mutex so a trip
/// decision and the state change it causes are atomic (§5).
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                metrics: BreakerMetrics::default(),
                trip_time: None,
                half_open_allowances: 0,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn metrics(&self) -> BreakerMetrics {
        self.inner.lock().metrics
    }

    /// Checks whether a trade is currently allowed, transitioning
    /// `OPEN -> HALF_OPEN` if the cooldown has elapsed. Returns an error
    /// carrying the remaining cooldown when trading is blocked.
    ///
    /// # Errors
    /// Returns [`CircuitBreakerOpenError`] while `OPEN`, or once the
    /// `HALF_OPEN` test allowance for this cooldown window is exhausted.
    pub fn check_and_allow(&self) -> Result<(), CircuitBreakerOpenError> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let trip_time = inner.trip_time.expect("OPEN state always has a trip_time");
                let elapsed = trip_time.elapsed();
                let cooldown = Duration::from_secs(self.config.cooldown_seconds);
                if elapsed >= cooldown {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_allowances = 1;
                    Ok(())
                } else {
                    Err(CircuitBreakerOpenError {
                        cooldown_remaining_secs: (cooldown - elapsed).as_secs(),
                    })
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_allowances < self.config.half_open_test_limit {
                    inner.half_open_allowances += 1;
                    Ok(())
                } else {
                    Err(CircuitBreakerOpenError {
                        cooldown_remaining_secs: 0,
                    })
                }
            }
        }
    }

    /// Records the outcome of a trade: `profit_cents > 0` is a win,
    /// `profit_cents <= 0` is a loss of `|profit_cents|`.
    pub fn record_trade(&self, profit_cents: i64, callback: impl FnOnce(&str)) {
        let mut inner = self.inner.lock();
        if profit_cents > 0 {
            inner.metrics.consecutive_losses = 0;
            if inner.state == BreakerState::HalfOpen {
                inner.state = BreakerState::Closed;
                inner.metrics.daily_loss_cents = 0;
                inner.metrics.consecutive_losses = 0;
                inner.trip_time = None;
                drop(inner);
                callback("half_open_recovered");
            }
            return;
        }

        inner.metrics.daily_loss_cents += profit_cents.abs();
        inner.metrics.consecutive_losses += 1;

        if inner.state == BreakerState::HalfOpen {
            Self::trip(&mut inner, "loss recorded while half-open", &self.config);
            let reason = "loss recorded while half-open".to_string();
            drop(inner);
            callback(&reason);
            return;
        }

        if let Some(reason) = Self::trip_reason(&inner.metrics, &self.config) {
            Self::trip(&mut inner, &reason, &self.config);
            drop(inner);
            callback(&reason);
        }
    }

    /// Feeds the latest total exposure snapshot into the breaker (called by
    /// the engine's sync loop) and trips if the exposure threshold is met.
    pub fn update_exposure(&self, total_exposure_cents: i64, callback: impl FnOnce(&str)) {
        let mut inner = self.inner.lock();
        inner.metrics.total_exposure_cents = total_exposure_cents;
        if inner.state == BreakerState::Open {
            return;
        }
        if let Some(reason) = Self::trip_reason(&inner.metrics, &self.config) {
            Self::trip(&mut inner, &reason, &self.config);
            drop(inner);
            callback(&reason);
        }
    }

    fn trip_reason(metrics: &BreakerMetrics, config: &BreakerConfig) -> Option<String> {
        if metrics.daily_loss_cents >= config.max_daily_loss_cents {
            Some(format!(
                "Daily loss {} >= limit {}",
                metrics.daily_loss_cents, config.max_daily_loss_cents
            ))
        } else if metrics.consecutive_losses >= config.max_consecutive_losses {
            Some(format!(
                "Consecutive losses {} >= limit {}",
                metrics.consecutive_losses, config.max_consecutive_losses
            ))
        } else if metrics.total_exposure_cents >= config.max_exposure_cents {
            Some(format!(
                "Total exposure {} >= limit {}",
                metrics.total_exposure_cents, config.max_exposure_cents
            ))
        } else {
            None
        }
    }

    fn trip(inner: &mut Inner, _reason: &str, _config: &BreakerConfig) {
        inner.state = BreakerState::Open;
        inner.trip_time = Some(Instant::now());
        inner.metrics.trip_count += 1;
        inner.half_open_allowances = 0;
    }

    /// Zeros the daily loss counter without otherwise changing state —
    /// called once per trading day by the engine.
    pub fn reset_daily_metrics(&self) {
        self.inner.lock().metrics.daily_loss_cents = 0;
    }

    /// Operator override: forces `CLOSED` regardless of metrics.
    pub fn force_close(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.metrics.consecutive_losses = 0;
        inner.trip_time = None;
        inner.half_open_allowances = 0;
    }

    /// Operator override: forces `OPEN`, starting a fresh cooldown.
    pub fn force_open(&self, reason: &str, callback: impl FnOnce(&str)) {
        let mut inner = self.inner.lock();
        Self::trip(&mut inner, reason, &self.config);
        drop(inner);
        callback(reason);
    }
}
