use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Everything the engine reports to observers: alerting, metrics, and logs all
/// subscribe to the same channel instead of being wired into call sites directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EngineEvent {
    OpportunityDetected {
        opportunity_type: String,
        event_ticker: String,
        net_profit_cents: i64,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },
    TradeExecuted {
        event_ticker: String,
        realized_profit_cents: i64,
        legs: u32,
        timestamp: DateTime<Utc>,
    },
    TradeFailed {
        event_ticker: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    CircuitBreakerTripped {
        reason: String,
        daily_loss_cents: i64,
        exposure_cents: i64,
        timestamp: DateTime<Utc>,
    },
    ConnectionStateChanged {
        connected: bool,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::OpportunityDetected { timestamp, .. }
            | Self::TradeExecuted { timestamp, .. }
            | Self::TradeFailed { timestamp, .. }
            | Self::CircuitBreakerTripped { timestamp, .. }
            | Self::ConnectionStateChanged { timestamp, .. } => *timestamp,
        }
    }

    /// A short, stable title used by alert dedup and log lines. Does not include
    /// variable fields so repeated events of the same kind dedup together.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::OpportunityDetected { .. } => "opportunity_detected",
            Self::TradeExecuted { .. } => "trade_executed",
            Self::TradeFailed { .. } => "trade_failed",
            Self::CircuitBreakerTripped { .. } => "circuit_breaker_tripped",
            Self::ConnectionStateChanged { .. } => "connection_state_changed",
        }
    }
}

/// Shared fan-out point for engine events. Cloning is cheap; every subscriber
/// gets its own lagged-aware receiver.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Returns the number of active receivers, or 0 if
    /// nobody is currently listening — never an error, since a quiet engine
    /// with no subscribers is a valid state.
    pub fn publish(&self, event: EngineEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> EngineEvent {
        EngineEvent::ConnectionStateChanged {
            connected: true,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(event());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.title(), "connection_state_changed");
    }

    #[test]
    fn publish_with_no_subscribers_returns_zero() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(event()), 0);
    }

    #[test]
    fn title_is_stable_across_variable_fields() {
        let a = EngineEvent::TradeFailed {
            event_ticker: "A".into(),
            error: "timeout".into(),
            timestamp: Utc::now(),
        };
        let b = EngineEvent::TradeFailed {
            event_ticker: "B".into(),
            error: "rejected".into(),
            timestamp: Utc::now(),
        };
        assert_eq!(a.title(), b.title());
    }
}
