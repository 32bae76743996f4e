//! tfte-sim: load simulator for a 15-service e-commerce topology.
//!
//! Four concurrent traffic loops (browsing, search, checkout, analytics)
//! post singleton event batches to the ingest endpoint. Two failure
//! scenarios repeat on a 120 s cycle: a redis-cache latency spike in
//! [30, 50) and a payment-gateway outage in [60, 90) that cascades RPC
//! errors back up the call chain.

use std::time::Duration;

use clap::Parser;
use rand::Rng;
use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tfte-sim", about = "Telemetry load simulator", version)]
struct Args {
    /// Ingest endpoint of a running tfte-core.
    #[arg(long, default_value = "http://localhost:8081/api/events")]
    api: String,
}

#[derive(Clone)]
struct Sender {
    client: reqwest::Client,
    api: String,
}

impl Sender {
    fn new(api: String) -> Self {
        Sender {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .expect("http client"),
            api,
        }
    }

    async fn rpc_call(
        &self,
        src: &str,
        dst: &str,
        method: &str,
        status: i32,
        latency_ms: i64,
        trace_id: &str,
        ts: i64,
    ) {
        let event = json!({
            "id": Uuid::new_v4().to_string(),
            "type": "RPC_CALL",
            "service": src,
            "ts": ts,
            "trace_ids": [trace_id],
            "payload": {
                "source_service": src,
                "dest_service": dst,
                "method": method,
                "status_code": status,
                "latency_ms": latency_ms,
            }
        });
        self.send(event).await;
    }

    async fn rpc_error(
        &self,
        src: &str,
        dst: &str,
        method: &str,
        code: &str,
        message: &str,
        trace_id: &str,
        ts: i64,
    ) {
        let event = json!({
            "id": Uuid::new_v4().to_string(),
            "type": "RPC_ERROR",
            "service": src,
            "ts": ts,
            "trace_ids": [trace_id],
            "payload": {
                "source_service": src,
                "dest_service": dst,
                "method": method,
                "error_code": code,
                "error_message": message,
            }
        });
        self.send(event).await;
    }

    async fn send(&self, event: serde_json::Value) {
        // Singleton batch; send failures are dropped, it's a simulator.
        let _ = self.client.post(&self.api).json(&json!([event])).send().await;
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Position inside the repeating 120 s failure cycle.
fn in_cycle_window(start_sec: i64, end_sec: i64) -> bool {
    let t = chrono::Utc::now().timestamp() % 120;
    t >= start_sec && t < end_sec
}

/// Browsing: read path with a cache in front of the database.
async fn simulate_browsing(sender: &Sender) {
    let trace_id = Uuid::new_v4().to_string();
    let redis_slow = in_cycle_window(30, 50);
    let mut ts = now_ms();

    sender
        .rpc_call("user", "web-frontend", "GET /products/123", 200, 15, &trace_id, ts)
        .await;
    ts += 15;
    sender
        .rpc_call("web-frontend", "api-gateway", "GET /api/v1/products/123", 200, 10, &trace_id, ts)
        .await;
    ts += 10;
    sender
        .rpc_call("api-gateway", "product-service", "GET /products/123", 200, 8, &trace_id, ts)
        .await;
    ts += 8;

    let cache_hit = rand::thread_rng().gen::<f64>() < 0.8;
    if cache_hit {
        let latency = if redis_slow { 500 } else { 2 };
        sender
            .rpc_call("product-service", "redis-cache", "GET product:123", 200, latency, &trace_id, ts)
            .await;
    } else {
        sender
            .rpc_call("product-service", "redis-cache", "GET product:123", 200, 2, &trace_id, ts)
            .await;
        ts += 2;
        sender
            .rpc_call(
                "product-service",
                "postgres-primary",
                "SELECT * FROM products WHERE id=123",
                200,
                25,
                &trace_id,
                ts,
            )
            .await;
    }
}

/// Search: mobile path into the search cluster.
async fn simulate_search(sender: &Sender) {
    let trace_id = Uuid::new_v4().to_string();
    let mut ts = now_ms();

    sender
        .rpc_call("mobile-app", "mobile-api", "GET /search?q=shoes", 200, 40, &trace_id, ts)
        .await;
    ts += 40;
    sender
        .rpc_call("mobile-api", "product-search-service", "GET /search", 200, 15, &trace_id, ts)
        .await;
    ts += 15;
    sender
        .rpc_call("product-search-service", "elasticsearch-cluster", "POST /_search", 200, 150, &trace_id, ts)
        .await;
}

/// Checkout: the critical chain with an external payment dependency.
async fn simulate_checkout(sender: &Sender) {
    let trace_id = Uuid::new_v4().to_string();
    let payment_down = in_cycle_window(60, 90);
    let mut ts = now_ms();

    sender
        .rpc_call("web-frontend", "api-gateway", "POST /checkout", 200, 20, &trace_id, ts)
        .await;
    ts += 20;
    sender
        .rpc_call("api-gateway", "order-service", "POST /orders", 200, 15, &trace_id, ts)
        .await;
    ts += 15;
    sender
        .rpc_call("order-service", "user-service", "GET /users/456", 200, 10, &trace_id, ts)
        .await;
    ts += 10;
    sender
        .rpc_call("user-service", "auth-service", "POST /verify", 200, 5, &trace_id, ts)
        .await;
    ts += 5;
    sender
        .rpc_call("order-service", "inventory-service", "POST /reserve", 200, 30, &trace_id, ts)
        .await;
    ts += 30;
    sender
        .rpc_call(
            "inventory-service",
            "postgres-inventory",
            "UPDATE items SET stock=stock-1",
            200,
            15,
            &trace_id,
            ts,
        )
        .await;
    ts += 15;

    if payment_down && rand::thread_rng().gen::<f64>() < 0.9 {
        sender
            .rpc_error(
                "order-service",
                "payment-gateway",
                "POST /charge",
                "503",
                "Service Unavailable",
                &trace_id,
                ts,
            )
            .await;
        sender
            .rpc_error(
                "api-gateway",
                "order-service",
                "POST /orders",
                "500",
                "Payment Failed",
                &trace_id,
                ts + 10,
            )
            .await;
        return;
    }

    sender
        .rpc_call("order-service", "payment-gateway", "POST /charge", 200, 450, &trace_id, ts)
        .await;
    ts += 450;
    sender
        .rpc_call("order-service", "notification-service", "POST /email", 202, 10, &trace_id, ts)
        .await;
}

/// Background jobs: scheduled analytics load.
async fn simulate_analytics(sender: &Sender) {
    let trace_id = Uuid::new_v4().to_string();
    let mut ts = now_ms();

    sender
        .rpc_call("cron-scheduler", "analytics-aggregator", "POST /run-job", 200, 5, &trace_id, ts)
        .await;
    ts += 5;
    sender
        .rpc_call("analytics-aggregator", "bigquery-loader", "POST /load", 200, 2000, &trace_id, ts)
        .await;
}

async fn run_loop<F, Fut>(sender: Sender, period: Duration, scenario: F)
where
    F: Fn(Sender) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        scenario(sender.clone()).await;
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let sender = Sender::new(args.api);

    tracing::info!("starting traffic loops over 15-service topology");

    let browsing = tokio::spawn(run_loop(
        sender.clone(),
        Duration::from_millis(100),
        |s| async move { simulate_browsing(&s).await },
    ));
    let search = tokio::spawn(run_loop(
        sender.clone(),
        Duration::from_millis(300),
        |s| async move { simulate_search(&s).await },
    ));
    let checkout = tokio::spawn(run_loop(
        sender.clone(),
        Duration::from_millis(800),
        |s| async move { simulate_checkout(&s).await },
    ));
    let analytics = tokio::spawn(run_loop(
        sender,
        Duration::from_millis(2000),
        |s| async move { simulate_analytics(&s).await },
    ));

    let _ = tokio::try_join!(browsing, search, checkout, analytics);
}
