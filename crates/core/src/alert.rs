use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;

use crate::events::EngineEvent;

const DEDUP_WINDOW: Duration = Duration::from_secs(60);

/// Delivers engine events to Slack/Discord webhooks, collapsing repeats of the
/// same event title within a one-minute window so a degraded connection
/// doesn't spam the channel once per reconnect attempt.
pub struct Alerter {
    client: reqwest::Client,
    slack_webhook_url: Option<String>,
    discord_webhook_url: Option<String>,
    last_sent: Mutex<HashMap<&'static str, Instant>>,
}

impl Alerter {
    #[must_use]
    pub fn new(slack_webhook_url: Option<String>, discord_webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            slack_webhook_url,
            discord_webhook_url,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    fn should_send(&self, title: &'static str) -> bool {
        let mut last_sent = self.last_sent.lock();
        let now = Instant::now();
        match last_sent.get(title) {
            Some(prev) if now.duration_since(*prev) < DEDUP_WINDOW => false,
            _ => {
                last_sent.insert(title, now);
                true
            }
        }
    }

    /// Delivers `event` to every configured webhook, subject to per-title
    /// rate limiting. Delivery failures are logged and swallowed: alerting
    /// is best-effort and must never block the caller.
    pub async fn notify(&self, event: &EngineEvent) {
        if !self.should_send(event.title()) {
            return;
        }

        let text = format_event(event);

        if let Some(url) = &self.slack_webhook_url {
            self.post(url, json!({ "text": text })).await;
        }
        if let Some(url) = &self.discord_webhook_url {
            self.post(url, json!({ "content": text })).await;
        }
    }

    async fn post(&self, url: &str, body: serde_json::Value) {
        if let Err(err) = self.client.post(url).json(&body).send().await {
            tracing::warn!(error = %err, "alert delivery failed");
        }
    }
}

fn format_event(event: &EngineEvent) -> String {
    match event {
        EngineEvent::OpportunityDetected {
            opportunity_type,
            event_ticker,
            net_profit_cents,
            confidence,
            ..
        } => format!(
            "opportunity ({opportunity_type}) on {event_ticker}: {net_profit_cents}c net, confidence {confidence:.2}"
        ),
        EngineEvent::TradeExecuted {
            event_ticker,
            realized_profit_cents,
            legs,
            ..
        } => format!(
            "trade executed on {event_ticker}: {realized_profit_cents}c across {legs} legs"
        ),
        EngineEvent::TradeFailed {
            event_ticker, error, ..
        } => format!("trade failed on {event_ticker}: {error}"),
        EngineEvent::CircuitBreakerTripped {
            reason,
            daily_loss_cents,
            exposure_cents,
            ..
        } => format!(
            "CRITICAL: circuit breaker tripped ({reason}), daily loss {daily_loss_cents}c, exposure {exposure_cents}c"
        ),
        EngineEvent::ConnectionStateChanged { connected, .. } => {
            if *connected {
                "connection restored".to_string()
            } else {
                "connection lost".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn connection_event(connected: bool) -> EngineEvent {
        EngineEvent::ConnectionStateChanged {
            connected,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn first_send_of_a_title_is_allowed() {
        let alerter = Alerter::new(None, None);
        assert!(alerter.should_send("connection_state_changed"));
    }

    #[test]
    fn repeat_within_window_is_suppressed() {
        let alerter = Alerter::new(None, None);
        assert!(alerter.should_send("connection_state_changed"));
        assert!(!alerter.should_send("connection_state_changed"));
    }

    #[test]
    fn distinct_titles_do_not_suppress_each_other() {
        let alerter = Alerter::new(None, None);
        assert!(alerter.should_send("connection_state_changed"));
        assert!(alerter.should_send("trade_failed"));
    }

    #[tokio::test]
    async fn notify_without_webhooks_configured_is_a_noop() {
        let alerter = Alerter::new(None, None);
        alerter.notify(&connection_event(true)).await;
    }
}
