//! Demo search service to replay traces against
//!
//! Answers `/select`, `/search` and `/suggest` after an artificial latency.
//! Every `SLOW_EVERY`-th request is slowed down well past the default call
//! time cutoff, so a replay with a tight `--calltime` trips the breaker.
//!
//! ## Usage
//!
//! ```bash
//! # Start the target (base latency 20ms, every 5th request takes 6s)
//! cargo run --release --example demo-target -- 20 5
//!
//! # In another terminal: generate a trace and replay it
//! cargo run -p xtask -- gen-trace --count 200 --interval 50 --output demo.trace
//! ./target/release/perfreplay replay -s http://localhost:3000/select -i demo.trace -o report.json
//!
//! # Trip the breaker: more than 2 of the last 10 calls slower than 1s
//! ./target/release/perfreplay replay -s http://localhost:3000/select -i demo.trace -c 1s/2/10
//! echo $?   # 51 = CALLTIME_EXCEEDED
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::{routing::get, Router};

struct Target {
    latency: Duration,
    slow_every: u64,
    requests: AtomicU64,
}

async fn answer(State(target): State<Arc<Target>>, RawQuery(query): RawQuery) -> String {
    let n = target.requests.fetch_add(1, Ordering::Relaxed) + 1;
    let latency = if target.slow_every > 0 && n % target.slow_every == 0 {
        Duration::from_secs(6)
    } else {
        target.latency
    };
    tokio::time::sleep(latency).await;
    format!("{{\"request\":{n},\"query\":{:?}}}", query.unwrap_or_default())
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let latency_ms: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(20);
    let slow_every: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(0);

    let target = Arc::new(Target {
        latency: Duration::from_millis(latency_ms),
        slow_every,
        requests: AtomicU64::new(0),
    });
    let app = Router::new()
        .route("/select", get(answer))
        .route("/search", get(answer))
        .route("/suggest", get(answer))
        .with_state(target);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    println!("Demo target listening on http://localhost:3000 (/select, /search, /suggest)");
    println!("Base latency {latency_ms}ms, every {slow_every}th request slow (0 = never)");
    axum::serve(listener, app).await.unwrap();
}
