//! # quadwire
//!
//! Scatter-gather transport for distributing image quadrants to remote
//! workers and reassembling their output.
//!
//! ## Architecture
//!
//! - **Framing**: `[u64 big-endian length][payload]`, one request frame and
//!   one response frame per TCP connection
//! - **Partitioner**: fixed 2x2 split; odd rows and columns go bottom/right
//! - **Worker**: accept loop running a [`Transform`] on each quadrant
//! - **Dispatcher**: four concurrent connections joined with a full barrier
//! - **Assembler**: all-or-nothing recomposition per output variant
//!
//! ## Example
//!
//! ```ignore
//! use quadwire::{Dispatcher, Endpoint, Image};
//!
//! #[tokio::main]
//! async fn main() -> quadwire::Result<()> {
//!     let endpoints = [
//!         Endpoint::new("10.0.0.1", 7000),
//!         Endpoint::new("10.0.0.2", 7000),
//!         Endpoint::new("10.0.0.3", 7000),
//!         Endpoint::new("10.0.0.4", 7000),
//!     ];
//!     let image = Image::from_fn(512, 512, 3, |x, y, c| (x ^ y ^ c) as u8);
//!
//!     let gathered = Dispatcher::new().scatter_gather(&image, &endpoints).await?;
//!     for (variant, result) in gathered.assemble_all() {
//!         println!("{}: {:?}", variant, result.map(|img| img.width()));
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

mod assemble;
mod dispatcher;
mod image;
mod partition;
mod transform;
mod worker;

pub use assemble::{assemble, assemble_quadrants};
pub use config::{DispatchConfig, EndpointSet, OverloadPolicy, WorkerConfig};
pub use dispatcher::{DispatchResult, Dispatcher, Gathered, PartitionOutput};
pub use error::{AssemblyError, FrameError, QuadwireError, Result};
pub use image::{Image, ShapeError};
pub use partition::{partition, Origin, Partition, Quadrant, PARTITION_COUNT};
pub use transform::{
    FnTransform, GrayscaleTransform, IdentityTransform, InvertTransform, MultiTransform,
    Transform, TransformError, VariantSchema, VariantSet,
};
pub use transport::Endpoint;
pub use worker::{ConnectionState, Worker, WorkerBuilder, WorkerHandle};
