//! Worker - serves grayscale and inverted variants of each quadrant.
//!
//! This example demonstrates:
//! - Combining transforms into one multi-variant worker
//! - Binding with the builder and a JSON configuration
//! - Shutting down on Ctrl-C
//!
//! # Running
//!
//! ```text
//! RUST_LOG=debug cargo run --example worker
//! ```
//!
//! The worker listens on `127.0.0.1:7000`; set `QUADWIRE_WORKER_ADDR` to
//! change it.

use std::sync::Arc;

use quadwire::{GrayscaleTransform, InvertTransform, MultiTransform, Transform, WorkerBuilder, WorkerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::var("QUADWIRE_WORKER_ADDR").unwrap_or_else(|_| "127.0.0.1:7000".into());
    let config = WorkerConfig::from_json_str(r#"{ "max_connections": 16, "read_timeout_ms": 10000 }"#)?;

    let parts: Vec<Arc<dyn Transform>> = vec![
        Arc::new(GrayscaleTransform::new()),
        Arc::new(InvertTransform::new()),
    ];
    let transform = MultiTransform::new(parts)?;
    tracing::info!("serving variants {:?}", transform.schema().names());

    let worker = WorkerBuilder::new(transform)
        .config(config)
        .bind(addr.as_str())
        .await?;

    worker
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
