//! Order group executor (§4.9).
//!
//! Takes a validated opportunity and a quantity, submits every leg as an
//! immediate-or-cancel limit order, and classifies the group by how many
//! legs executed. Legs are submitted concurrently — the venue here is
//! single, so nothing stops true fan-out across N legs the way
//! `arbitrage-cross::executor::CrossExchangeExecutor::execute` joins its two.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use venue_kalshi::types::OrderRequest;
use venue_kalshi::KalshiClient;

use crate::types::{Opportunity, OrderGroup, OrderGroupStatus};

/// Bounds how many order groups this executor runs at once (§4.9).
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub max_concurrent: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_concurrent: 3 }
    }
}

/// Outcome of one `execute` call, in the shape the engine feeds to the
/// circuit breaker (§4.13, §7): `profit_cents` is the realized profit on
/// success, or the worst-case charge the engine should record on failure.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub group: OrderGroup,
    pub success: bool,
    pub profit_cents: i64,
}

/// Submits and classifies order groups against a single venue client.
/// Holds no opportunity state — each `execute` call is independent.
pub struct Executor {
    client: Arc<KalshiClient>,
    semaphore: Arc<Semaphore>,
}

impl Executor {
    #[must_use]
    pub fn new(client: Arc<KalshiClient>, config: ExecutorConfig) -> Self {
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        }
    }

    /// Submits `opportunity` at `quantity`, already clamped by the caller to
    /// `opportunity.max_quantity` and any exposure-gate limit.
    pub async fn execute(&self, opportunity: &Opportunity, quantity: u64) -> ExecutionResult {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("executor semaphore is never closed");

        let mut group = OrderGroup::pending(opportunity, quantity);
        group.status = OrderGroupStatus::Submitting;
        let count = u32::try_from(quantity).unwrap_or(u32::MAX);

        let submissions = opportunity.legs.iter().map(|leg| {
            let client = Arc::clone(&self.client);
            let client_order_id = group.client_order_id(&leg.ticker);
            let request =
                OrderRequest::ioc_limit(leg.ticker.clone(), leg.side, leg.action, leg.price, count, client_order_id);
            async move { client.submit_order(&request).await }
        });

        let mut first_error = None;
        for result in join_all(submissions).await {
            match result {
                Ok(order) => group.orders.push(order),
                Err(err) if first_error.is_none() => first_error = Some(err.to_string()),
                Err(_) => {}
            }
        }

        self.classify(group, opportunity, quantity, first_error).await
    }

    async fn classify(
        &self,
        mut group: OrderGroup,
        opportunity: &Opportunity,
        quantity: u64,
        first_error: Option<String>,
    ) -> ExecutionResult {
        let filled = group.filled_legs();
        let total_legs = group.legs.len();
        let quantity = quantity as i64;

        if filled == total_legs && filled > 0 {
            group.status = OrderGroupStatus::Complete;
            let profit_cents = opportunity.net_profit_cents * quantity;
            info!(group_id = %group.id, profit_cents, "order group complete");
            return ExecutionResult { group, success: true, profit_cents };
        }

        if filled > 0 {
            warn!(group_id = %group.id, filled, total_legs, "order group partially filled, leg risk realized");
            self.cancel_resting(&group).await;
            group.status = OrderGroupStatus::Partial;
            let profit_cents = -opportunity.total_cost_cents * quantity;
            return ExecutionResult { group, success: false, profit_cents };
        }

        group.status = OrderGroupStatus::Failed;
        group.error = Some(first_error.unwrap_or_else(|| "no leg executed".to_string()));
        warn!(group_id = %group.id, error = ?group.error, "order group failed, no leg executed");
        ExecutionResult { group, success: false, profit_cents: 0 }
    }

    /// Best-effort cancel of any leg still resting after a partial fill.
    /// Failures here are logged, not propagated — the group is already
    /// classified PARTIAL regardless.
    async fn cancel_resting(&self, group: &OrderGroup) {
        for order in &group.orders {
            if order.is_executed() {
                continue;
            }
            if let Err(err) = self.client.cancel_order(&order.order_id).await {
                warn!(order_id = %order.order_id, error = %err, "failed to cancel resting leg");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use venue_kalshi::types::Side;
    use venue_kalshi::KalshiClientConfig;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> Arc<KalshiClient> {
        Arc::new(
            KalshiClient::new(KalshiClientConfig {
                base_url,
                websocket_url: "wss://example.invalid/ws".into(),
                api_key_id: "test-key".into(),
                private_key_path: "../venue-kalshi/tests/fixtures/test_private_key.pem".into(),
                read_rate_limit: 100.0,
                write_rate_limit: 100.0,
                timeout_secs: 5,
            })
            .unwrap(),
        )
    }

    fn opportunity(legs: Vec<crate::types::Leg>) -> Opportunity {
        Opportunity {
            id: Uuid::new_v4(),
            opportunity_type: crate::types::OpportunityType::MultiOutcome,
            event_ticker: "KXEVT".into(),
            legs,
            total_cost_cents: 90,
            guaranteed_return_cents: 100,
            gross_profit_cents: 10,
            est_fees_cents: 1,
            net_profit_cents: 9,
            max_quantity: 20,
            detected_at: Utc::now(),
            confidence: 0.8,
        }
    }

    fn order_body(status: &str, ticker: &str, remaining: u32) -> serde_json::Value {
        serde_json::json!({
            "order": {
                "order_id": format!("ord-{ticker}"),
                "client_order_id": null,
                "ticker": ticker,
                "side": "yes",
                "action": "buy",
                "type": "limit",
                "status": status,
                "yes_price": 40,
                "initial_count": 5,
                "remaining_count": remaining,
            }
        })
    }

    #[tokio::test]
    async fn all_legs_executed_yields_complete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/portfolio/orders$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(order_body("executed", "KXEVT-A", 0)))
            .mount(&server)
            .await;

        let executor = Executor::new(client(server.uri()), ExecutorConfig::default());
        let opp = opportunity(vec![crate::types::Leg::buy("KXEVT-A", Side::Yes, 40)]);
        let result = executor.execute(&opp, 5).await;

        assert!(result.success);
        assert_eq!(result.group.status, OrderGroupStatus::Complete);
        assert_eq!(result.profit_cents, opp.net_profit_cents * 5);
    }

    #[tokio::test]
    async fn no_leg_executed_yields_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/portfolio/orders$"))
            .respond_with(ResponseTemplate::new(400).set_body_string("order rejected: price moved"))
            .mount(&server)
            .await;

        let executor = Executor::new(client(server.uri()), ExecutorConfig::default());
        let opp = opportunity(vec![crate::types::Leg::buy("KXEVT-A", Side::Yes, 40)]);
        let result = executor.execute(&opp, 5).await;

        assert!(!result.success);
        assert_eq!(result.group.status, OrderGroupStatus::Failed);
        assert!(result.group.error.is_some());
        assert_eq!(result.profit_cents, 0);
    }

    #[tokio::test]
    async fn partial_fill_cancels_resting_leg_and_charges_total_cost() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/portfolio/orders$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(order_body("resting", "KXEVT-B", 5)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/portfolio/orders$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(order_body("executed", "KXEVT-A", 0)))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"^/portfolio/orders/.+$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let executor = Executor::new(client(server.uri()), ExecutorConfig::default());
        let opp = opportunity(vec![
            crate::types::Leg::buy("KXEVT-A", Side::Yes, 40),
            crate::types::Leg::buy("KXEVT-B", Side::Yes, 50),
        ]);
        let result = executor.execute(&opp, 5).await;

        assert_eq!(result.group.status, OrderGroupStatus::Partial);
        assert!(!result.success);
        assert_eq!(result.profit_cents, -opp.total_cost_cents * 5);
    }

    #[test]
    fn default_max_concurrent_matches_spec() {
        assert_eq!(ExecutorConfig::default().max_concurrent, 3);
    }
}
