//! Mock backend for local testing.
//!
//! Answers every path with the port it listens on after ~20ms of simulated
//! latency and a little CPU work. Port comes from `SERVER_PORT` (default 8080).

use axum::{body::Bytes, Router};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backend_mock=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let app = Router::new().fallback(move |_body: Bytes| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut hasher = DefaultHasher::new();
        for i in 0..1000 {
            i.to_string().hash(&mut hasher);
        }
        let _ = hasher.finish();

        format!("Request from service on port {}\n", port)
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(address = %addr, "Starting mock backend");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
