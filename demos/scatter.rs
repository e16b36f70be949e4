//! Scatter - splits a synthetic image across four local workers.
//!
//! This example demonstrates:
//! - Spawning workers in-process
//! - Dispatching quadrants and joining all four results
//! - Assembling every returned variant and reporting timings
//!
//! # Running
//!
//! ```text
//! cargo run --example scatter
//! ```

use std::sync::Arc;
use std::time::Duration;

use quadwire::{
    Dispatcher, GrayscaleTransform, Image, InvertTransform, MultiTransform, Transform,
    WorkerBuilder,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut workers = Vec::new();
    for _ in 0..4 {
        let parts: Vec<Arc<dyn Transform>> = vec![
            Arc::new(GrayscaleTransform::new()),
            Arc::new(InvertTransform::new()),
        ];
        let worker = WorkerBuilder::new(MultiTransform::new(parts)?)
            .bind("127.0.0.1:0")
            .await?;
        workers.push(worker.spawn());
    }
    let endpoints = [
        workers[0].endpoint(),
        workers[1].endpoint(),
        workers[2].endpoint(),
        workers[3].endpoint(),
    ];

    // Diagonal gradient, odd-sized so the bottom-right quadrant is larger.
    let image = Image::from_fn(1025, 767, 3, |x, y, c| match c {
        0 => (x * 255 / 1024) as u8,
        1 => (y * 255 / 766) as u8,
        _ => ((x + y) % 256) as u8,
    });

    let gathered = Dispatcher::new()
        .connect_timeout(Duration::from_secs(2))
        .scatter_gather(&image, &endpoints)
        .await?;

    for result in gathered.results() {
        match result.output() {
            Some(output) => tracing::info!(
                "partition {} via {}: {:?} total, {:?} in transform",
                result.index,
                result.endpoint,
                result.elapsed,
                output.transform_time
            ),
            None => tracing::warn!(
                "partition {} via {} failed: {:?}",
                result.index,
                result.endpoint,
                result.error()
            ),
        }
    }

    for (variant, assembled) in gathered.assemble_all() {
        match assembled {
            Ok(image) => tracing::info!(
                "variant '{}': {}x{}x{}",
                variant,
                image.width(),
                image.height(),
                image.channels()
            ),
            Err(e) => tracing::warn!("variant '{}': {}", variant, e),
        }
    }
    tracing::info!("total {:?}", gathered.elapsed());

    for worker in workers {
        worker.shutdown().await?;
    }
    Ok(())
}
