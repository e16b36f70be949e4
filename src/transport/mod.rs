//! Transport module - TCP connections between dispatcher and workers.
//!
//! Provides:
//! - [`Endpoint`] addresses with string and map forms
//! - deadline-bounded [`connect`]

mod endpoint;
mod tcp;

pub use endpoint::Endpoint;
pub use tcp::{bind, connect};
