//! TCP connection helpers.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use quadwire::transport::{connect, Endpoint};
//!
//! let stream = connect(&Endpoint::new("127.0.0.1", 7000), Duration::from_secs(5)).await?;
//! ```

use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use super::Endpoint;
use crate::error::{QuadwireError, Result};

/// Connect to `endpoint`, giving up after `timeout`.
///
/// Refusal and resolution failures map to [`QuadwireError::Connection`];
/// an expired deadline maps to [`QuadwireError::ConnectTimeout`].
pub async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream> {
    let address = endpoint.address();
    let stream = match tokio::time::timeout(timeout, TcpStream::connect(address.as_str())).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(QuadwireError::Connection {
                endpoint: address,
                source,
            })
        }
        Err(_) => {
            return Err(QuadwireError::ConnectTimeout {
                endpoint: address,
                timeout,
            })
        }
    };

    // Frames are written as prefix + payload; do not let Nagle hold the prefix.
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("set_nodelay failed for {}: {}", endpoint, e);
    }
    Ok(stream)
}

/// Bind a listener, mapping failures to [`QuadwireError::Io`].
pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<TcpListener> {
    Ok(TcpListener::bind(addr).await?)
}
