//! Worker builder and accept loop.
//!
//! The [`WorkerBuilder`] configures a transform and limits. The [`Worker`]
//! manages the lifecycle:
//! 1. Bind a TCP listener
//! 2. Accept connections, bounded by `max_connections`
//! 3. Per connection: read one request frame, run the transform, write one
//!    response frame, close
//!
//! # Example
//!
//! ```ignore
//! use quadwire::{GrayscaleTransform, WorkerBuilder};
//!
//! #[tokio::main]
//! async fn main() -> quadwire::Result<()> {
//!     let worker = WorkerBuilder::new(GrayscaleTransform::new())
//!         .max_connections(16)
//!         .bind("0.0.0.0:7000")
//!         .await?;
//!     worker.run().await
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::codec::{FailureKind, PartitionRequest, WorkerResponse};
use crate::config::{OverloadPolicy, WorkerConfig};
use crate::error::{QuadwireError, Result};
use crate::protocol::{read_frame, write_frame};
use crate::transform::Transform;
use crate::transport::{self, Endpoint};

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Upper bound on draining unread input before close.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Write and drain bound for rejected connections, which never had their
/// input read.
const REJECT_IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Rejections answered concurrently; connections past this are dropped
/// without a response.
pub(crate) const MAX_PENDING_REJECTS: usize = 16;

/// Lifecycle of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, nothing read yet.
    Connected,
    /// A complete request frame has been read.
    FrameReceived,
    /// The transform is running.
    Processing,
    /// A success response has been written.
    ResponseSent,
    /// Something went wrong; a failure response is sent if the stream allows.
    Failed,
    /// Connection closed.
    Closed,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connected, FrameReceived)
                | (FrameReceived, Processing)
                | (Processing, ResponseSent)
                | (ResponseSent, Closed)
                | (Failed, Closed)
        ) || (next == Failed && !matches!(self, Failed | Closed))
    }

    /// True once no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}

/// Tracks and traces the state of one connection.
struct Tracker {
    state: ConnectionState,
}

impl Tracker {
    fn new() -> Self {
        tracing::debug!("connection state: {:?}", ConnectionState::Connected);
        Self {
            state: ConnectionState::Connected,
        }
    }

    fn advance(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!("connection state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Builder for configuring and binding a [`Worker`].
pub struct WorkerBuilder {
    transform: Arc<dyn Transform>,
    config: WorkerConfig,
}

impl WorkerBuilder {
    /// Create a builder serving `transform` with default configuration.
    pub fn new<T: Transform>(transform: T) -> Self {
        Self {
            transform: Arc::new(transform),
            config: WorkerConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of connections served at once.
    ///
    /// Default: 64
    pub fn max_connections(mut self, limit: usize) -> Self {
        self.config.max_connections = limit;
        self
    }

    /// Set what happens to connections beyond the limit.
    ///
    /// Default: [`OverloadPolicy::Wait`]
    pub fn overload_policy(mut self, policy: OverloadPolicy) -> Self {
        self.config.overload_policy = policy;
        self
    }

    /// Set the deadline for reading a request frame.
    ///
    /// Default: 30 seconds
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the deadline for writing a response frame.
    ///
    /// Default: 30 seconds
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the largest request payload accepted.
    ///
    /// Default: 1 GiB
    pub fn max_frame_size(mut self, max: u64) -> Self {
        self.config.max_frame_size = max;
        self
    }

    /// Validate the configuration and bind the listener.
    pub async fn bind<A: ToSocketAddrs>(self, addr: A) -> Result<Worker> {
        self.config.validate()?;
        let listener = transport::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(
            "worker listening on {} (max_connections={}, policy={:?})",
            local_addr,
            self.config.max_connections,
            self.config.overload_policy
        );

        Ok(Worker {
            listener,
            local_addr,
            semaphore: Arc::new(Semaphore::new(self.config.max_connections)),
            reject_slots: Arc::new(Semaphore::new(MAX_PENDING_REJECTS)),
            shared: Arc::new(Shared {
                transform: self.transform,
                config: self.config,
            }),
        })
    }
}

/// State shared by every connection task.
struct Shared {
    transform: Arc<dyn Transform>,
    config: WorkerConfig,
}

/// A bound worker, ready to accept connections.
pub struct Worker {
    listener: TcpListener,
    local_addr: SocketAddr,
    semaphore: Arc<Semaphore>,
    reject_slots: Arc<Semaphore>,
    shared: Arc<Shared>,
}

impl Worker {
    /// Create a worker builder.
    pub fn builder<T: Transform>(transform: T) -> WorkerBuilder {
        WorkerBuilder::new(transform)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Endpoint a dispatcher can use to reach this worker.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::from(self.local_addr)
    }

    /// Active configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.shared.config
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already accepted finish on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let policy = self.shared.config.overload_policy;

        loop {
            // Wait: hold off accepting until a slot is free.
            let reserved = match policy {
                OverloadPolicy::Wait => tokio::select! {
                    _ = &mut shutdown => break,
                    permit = self.semaphore.clone().acquire_owned() => Some(permit.map_err(|_| {
                        QuadwireError::Protocol("connection limiter closed".into())
                    })?),
                },
                OverloadPolicy::Reject => None,
            };

            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::error!("accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            let permit = match reserved {
                Some(permit) => permit,
                None => match self.semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        match self.reject_slots.clone().try_acquire_owned() {
                            Ok(slot) => {
                                tracing::warn!(
                                    "rejecting {}: {} connections already active",
                                    peer,
                                    self.shared.config.max_connections
                                );
                                let shared = self.shared.clone();
                                tokio::spawn(
                                    reject_connection(stream, shared, slot)
                                        .instrument(tracing::info_span!("connection", %peer)),
                                );
                            }
                            Err(_) => {
                                tracing::warn!("dropping {}: reject backlog full", peer);
                                drop(stream);
                            }
                        }
                        continue;
                    }
                },
            };

            let shared = self.shared.clone();
            tokio::spawn(
                serve_connection(stream, shared, permit)
                    .instrument(tracing::info_span!("connection", %peer)),
            );
        }

        tracing::info!("worker on {} stopped accepting", self.local_addr);
        Ok(())
    }

    /// Run the accept loop on a background task.
    ///
    /// Dropping the returned handle also stops the loop.
    pub fn spawn(self) -> WorkerHandle {
        let local_addr = self.local_addr;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(self.run_until(async move {
            let _ = shutdown_rx.await;
        }));
        WorkerHandle {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a worker running on a background task.
pub struct WorkerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    /// Address the worker is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Endpoint a dispatcher can use to reach this worker.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::from(self.local_addr)
    }

    /// Stop accepting and wait for the accept loop to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match (&mut self.task).await {
            Ok(result) => result,
            Err(e) => Err(QuadwireError::Protocol(format!("worker task failed: {}", e))),
        }
    }
}

/// Serve one request on an accepted connection.
async fn serve_connection(mut stream: TcpStream, shared: Arc<Shared>, _permit: OwnedSemaphorePermit) {
    let config = &shared.config;
    let mut tracker = Tracker::new();

    let response = match read_frame(&mut stream, config.max_frame_size, config.read_timeout).await {
        Ok(payload) => {
            tracker.advance(ConnectionState::FrameReceived);
            tracing::debug!("received request frame ({} bytes)", payload.len());
            match PartitionRequest::decode(&payload) {
                Ok(request) => {
                    tracker.advance(ConnectionState::Processing);
                    run_transform(request, &shared.transform).await
                }
                Err(e) => {
                    tracing::warn!("malformed request: {}", e);
                    WorkerResponse::failure(FailureKind::BadRequest, e.to_string())
                }
            }
        }
        Err(e) => {
            tracing::warn!("failed to read request: {}", e);
            WorkerResponse::failure(FailureKind::BadRequest, e.to_string())
        }
    };

    if response.is_failure() {
        tracker.advance(ConnectionState::Failed);
    }

    match send_response(&mut stream, &response, config.write_timeout).await {
        Ok(len) => {
            tracing::debug!("sent response frame ({} bytes)", len);
            if !response.is_failure() {
                tracker.advance(ConnectionState::ResponseSent);
            }
        }
        Err(e) => {
            tracing::warn!("failed to send response: {}", e);
            if !response.is_failure() {
                tracker.advance(ConnectionState::Failed);
            }
        }
    }

    close(stream, DRAIN_TIMEOUT).await;
    tracker.advance(ConnectionState::Closed);
}

/// Answer a connection beyond the limit with an `Overloaded` failure.
///
/// `_slot` is held until the socket is closed.
async fn reject_connection(
    mut stream: TcpStream,
    shared: Arc<Shared>,
    _slot: OwnedSemaphorePermit,
) {
    let response = WorkerResponse::failure(
        FailureKind::Overloaded,
        format!(
            "worker at capacity ({} connections)",
            shared.config.max_connections
        ),
    );
    let deadline = shared.config.write_timeout.min(REJECT_IO_TIMEOUT);
    if let Err(e) = send_response(&mut stream, &response, deadline).await {
        tracing::debug!("failed to send overload response: {}", e);
    }
    close(stream, REJECT_IO_TIMEOUT).await;
}

/// Run the transform off the async threads and check its output.
async fn run_transform(request: PartitionRequest, transform: &Arc<dyn Transform>) -> WorkerResponse {
    let index = request.index;
    let image = request.image;
    tracing::debug!(
        "partition {}: {}x{}x{} at ({}, {})",
        index,
        image.width(),
        image.height(),
        image.channels(),
        request.origin.x,
        request.origin.y
    );

    let transform = transform.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let output = transform.apply(image);
        let checked = output.and_then(|variants| {
            transform.schema().check(&variants)?;
            Ok(variants)
        });
        (checked, started.elapsed())
    })
    .await;

    match joined {
        Ok((Ok(variants), elapsed)) => {
            tracing::debug!(
                "partition {}: transform produced {} variant(s) in {:?}",
                index,
                variants.len(),
                elapsed
            );
            WorkerResponse::success(variants, elapsed)
        }
        Ok((Err(e), _)) => {
            tracing::warn!("partition {}: transform failed: {}", index, e);
            WorkerResponse::failure(FailureKind::Transform, e.message())
        }
        Err(e) => {
            tracing::warn!("partition {}: transform task failed: {}", index, e);
            WorkerResponse::failure(FailureKind::Transform, format!("transform panicked: {}", e))
        }
    }
}

async fn send_response(
    stream: &mut TcpStream,
    response: &WorkerResponse,
    deadline: Duration,
) -> Result<usize> {
    let payload = response.encode()?;
    write_frame(stream, &payload, deadline).await?;
    Ok(payload.len())
}

/// Shut down the write half, then drain unread input so the peer sees a
/// clean close instead of a reset that could discard the response.
async fn close(mut stream: TcpStream, drain_timeout: Duration) {
    if let Err(e) = stream.shutdown().await {
        tracing::debug!("shutdown failed: {}", e);
        return;
    }
    let drained =
        tokio::time::timeout(drain_timeout, tokio::io::copy(&mut stream, &mut tokio::io::sink()))
            .await;
    match drained {
        Ok(Ok(0)) | Err(_) => {}
        Ok(Ok(n)) => tracing::debug!("discarded {} trailing bytes", n),
        Ok(Err(e)) => tracing::debug!("drain failed: {}", e),
    }
}
