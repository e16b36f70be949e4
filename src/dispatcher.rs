//! Scatter-gather client.
//!
//! [`Dispatcher::dispatch`] sends each of the four partitions to its own
//! endpoint on its own task and waits for all four. One endpoint failing
//! never cancels the others; every outcome is recorded at its partition
//! index.
//!
//! Per partition:
//! 1. Connect (bounded by `connect_timeout`)
//! 2. Write one request frame, then shut down the write half
//! 3. Read one response frame (bounded by `io_timeout`)
//! 4. Decode into variants and transform time, or the failure cause

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use crate::assemble::assemble;
use crate::codec::{PartitionRequest, WorkerResponse};
use crate::config::DispatchConfig;
use crate::error::{AssemblyError, QuadwireError, Result};
use crate::image::Image;
use crate::partition::{partition, Partition, PARTITION_COUNT};
use crate::protocol::{read_frame, write_frame};
use crate::transform::VariantSet;
use crate::transport::{connect, Endpoint};

/// Successful output of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOutput {
    /// Variants returned by the worker.
    pub variants: VariantSet,
    /// Time the worker reported spending in its transform.
    pub transform_time: Duration,
}

/// Outcome of sending one partition to one endpoint.
#[derive(Debug)]
pub struct DispatchResult {
    /// Partition index (0..=3).
    pub index: usize,
    /// Endpoint the partition was sent to.
    pub endpoint: Endpoint,
    /// Output, or the reason there is none.
    pub outcome: Result<PartitionOutput>,
    /// Wall-clock time from connect to decoded response.
    pub elapsed: Duration,
}

impl DispatchResult {
    /// True if the worker returned variants.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Output on success.
    pub fn output(&self) -> Option<&PartitionOutput> {
        self.outcome.as_ref().ok()
    }

    /// Failure cause.
    pub fn error(&self) -> Option<&QuadwireError> {
        self.outcome.as_ref().err()
    }
}

/// Sends partitions to workers.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher from a configuration.
    pub fn with_config(config: DispatchConfig) -> Self {
        Self { config }
    }

    /// Set the connect deadline.
    ///
    /// Default: 5 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-frame write and read deadline.
    ///
    /// Default: 30 seconds
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Set the largest response payload accepted.
    ///
    /// Default: 1 GiB
    pub fn max_frame_size(mut self, max: u64) -> Self {
        self.config.max_frame_size = max;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Send `partitions[i]` to `endpoints[i]` for every index at once and
    /// wait for all four.
    ///
    /// Results are in partition index order regardless of completion order.
    pub async fn dispatch(
        &self,
        partitions: [Partition; PARTITION_COUNT],
        endpoints: &[Endpoint; PARTITION_COUNT],
    ) -> [DispatchResult; PARTITION_COUNT] {
        let [p0, p1, p2, p3] = partitions;
        let [e0, e1, e2, e3] = endpoints.clone();

        let (r0, r1, r2, r3) = tokio::join!(
            self.spawn_unit(p0, e0),
            self.spawn_unit(p1, e1),
            self.spawn_unit(p2, e2),
            self.spawn_unit(p3, e3),
        );
        [r0, r1, r2, r3]
    }

    /// Run one partition on its own task so a panic stays at its index.
    async fn spawn_unit(&self, partition: Partition, endpoint: Endpoint) -> DispatchResult {
        let index = partition.index();
        let config = self.config.clone();
        let span = tracing::info_span!("dispatch", index, endpoint = %endpoint);
        let task_endpoint = endpoint.clone();

        let started = Instant::now();
        let joined = tokio::spawn(
            async move { send_partition(partition, &task_endpoint, &config).await }
                .instrument(span.clone()),
        )
        .await;
        let elapsed = started.elapsed();

        let outcome = joined.unwrap_or_else(|e| {
            Err(QuadwireError::Protocol(format!("dispatch task failed: {}", e)))
        });

        span.in_scope(|| match &outcome {
            Ok(output) => tracing::info!(
                "partition {} done in {:?} (transform {:?})",
                index,
                elapsed,
                output.transform_time
            ),
            Err(e) => tracing::warn!("partition {} failed after {:?}: {}", index, elapsed, e),
        });

        DispatchResult {
            index,
            endpoint,
            outcome,
            elapsed,
        }
    }

    /// Partition `image`, dispatch the quadrants and collect the results.
    pub async fn scatter_gather(
        &self,
        image: &Image,
        endpoints: &[Endpoint; PARTITION_COUNT],
    ) -> Result<Gathered> {
        let started = Instant::now();
        let partitions = partition(image)?;
        let results = self.dispatch(partitions, endpoints).await;
        let elapsed = started.elapsed();

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            "scatter-gather of {}x{} finished in {:?}: {}/{} partitions succeeded",
            image.width(),
            image.height(),
            elapsed,
            succeeded,
            PARTITION_COUNT
        );

        Ok(Gathered { results, elapsed })
    }
}

/// Connect, send one partition, read one response.
async fn send_partition(
    partition: Partition,
    endpoint: &Endpoint,
    config: &DispatchConfig,
) -> Result<PartitionOutput> {
    let payload = PartitionRequest::new(partition).encode()?;

    let mut stream = connect(endpoint, config.connect_timeout).await?;
    tracing::debug!("connected, sending {} bytes", payload.len());

    write_frame(&mut stream, &payload, config.io_timeout).await?;
    // End of input: exactly one request per connection.
    stream.shutdown().await?;

    let frame = read_frame(&mut stream, config.max_frame_size, config.io_timeout).await?;
    tracing::debug!("received response frame ({} bytes)", frame.len());

    let (variants, transform_time) = WorkerResponse::decode(&frame)?.into_result()?;
    Ok(PartitionOutput {
        variants,
        transform_time,
    })
}

/// Results of one scatter-gather call.
#[derive(Debug)]
pub struct Gathered {
    results: [DispatchResult; PARTITION_COUNT],
    elapsed: Duration,
}

impl Gathered {
    /// Per-partition results in index order.
    pub fn results(&self) -> &[DispatchResult; PARTITION_COUNT] {
        &self.results
    }

    /// Consume into per-partition results.
    pub fn into_results(self) -> [DispatchResult; PARTITION_COUNT] {
        self.results
    }

    /// Total wall-clock time including partitioning.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// True if every partition succeeded.
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(DispatchResult::is_success)
    }

    /// Failed partitions.
    pub fn failures(&self) -> impl Iterator<Item = &DispatchResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Every variant name seen in any successful partition, sorted.
    pub fn variant_names(&self) -> BTreeSet<&str> {
        self.results
            .iter()
            .filter_map(DispatchResult::output)
            .flat_map(|out| out.variants.names())
            .collect()
    }

    /// Rebuild one variant.
    pub fn assemble(&self, variant: &str) -> std::result::Result<Image, AssemblyError> {
        assemble(&self.results, variant)
    }

    /// Attempt every variant in [`variant_names`](Self::variant_names).
    ///
    /// Each variant succeeds or fails on its own.
    pub fn assemble_all(&self) -> Vec<(String, std::result::Result<Image, AssemblyError>)> {
        self.variant_names()
            .into_iter()
            .map(|name| (name.to_string(), self.assemble(name)))
            .collect()
    }
}
