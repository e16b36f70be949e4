//! Worker endpoint addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::QuadwireError;

/// A worker address as `host` + `port`.
///
/// Parses from `"host:port"` (`"[::1]:7000"` for IPv6 literals) and
/// deserializes from either that string or a `{ "host", "port" }` map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    /// Host name or IP literal, without brackets.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address string suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        self.to_string()
    }
}

impl From<std::net::SocketAddr> for Endpoint {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = QuadwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || QuadwireError::Config(format!("invalid endpoint '{}', expected host:port", s));

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = match host.strip_prefix('[') {
            Some(inner) => inner.strip_suffix(']').ok_or_else(invalid)?,
            None if host.contains(':') => return Err(invalid()),
            None => host,
        };
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EndpointRepr {
    Text(String),
    Parts { host: String, port: u16 },
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match EndpointRepr::deserialize(deserializer)? {
            EndpointRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            EndpointRepr::Parts { host, port } => Ok(Endpoint::new(host, port)),
        }
    }
}
