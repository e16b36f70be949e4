//! Worker and dispatcher configuration.
//!
//! Both configs load from JSON. Missing fields take their defaults and
//! durations are written as integer milliseconds:
//!
//! ```json
//! { "max_connections": 16, "overload_policy": "reject", "read_timeout_ms": 10000 }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuadwireError, Result};
use crate::partition::PARTITION_COUNT;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::transport::Endpoint;

/// Default concurrent connections per worker.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Default per-frame read and write deadline.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect deadline.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Durations as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// What a worker does with a connection that arrives at capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverloadPolicy {
    /// Stop accepting until a slot frees up; the kernel backlog holds
    /// pending connections.
    #[default]
    Wait,
    /// Accept, answer with an `Overloaded` failure frame and close.
    Reject,
}

/// Configuration for a [`Worker`](crate::Worker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum connections served at once.
    pub max_connections: usize,
    /// Behaviour once `max_connections` is reached.
    pub overload_policy: OverloadPolicy,
    /// Deadline for reading the request frame.
    #[serde(rename = "read_timeout_ms", with = "duration_ms")]
    pub read_timeout: Duration,
    /// Deadline for writing the response frame.
    #[serde(rename = "write_timeout_ms", with = "duration_ms")]
    pub write_timeout: Duration,
    /// Largest request payload accepted.
    pub max_frame_size: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            overload_policy: OverloadPolicy::Wait,
            read_timeout: DEFAULT_IO_TIMEOUT,
            write_timeout: DEFAULT_IO_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl WorkerConfig {
    /// Parse from a JSON document and validate.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file and validate.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Reject values the worker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(QuadwireError::Config(
                "max_connections must be at least 1".into(),
            ));
        }
        check_timeout("read_timeout_ms", self.read_timeout)?;
        check_timeout("write_timeout_ms", self.write_timeout)?;
        check_frame_size(self.max_frame_size)
    }
}

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Deadline for establishing each connection.
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Deadline for each frame write and each frame read.
    #[serde(rename = "io_timeout_ms", with = "duration_ms")]
    pub io_timeout: Duration,
    /// Largest response payload accepted.
    pub max_frame_size: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl DispatchConfig {
    /// Parse from a JSON document and validate.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file and validate.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Reject values the dispatcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_timeout("connect_timeout_ms", self.connect_timeout)?;
        check_timeout("io_timeout_ms", self.io_timeout)?;
        check_frame_size(self.max_frame_size)
    }
}

fn check_timeout(name: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(QuadwireError::Config(format!("{} must be non-zero", name)));
    }
    Ok(())
}

fn check_frame_size(value: u64) -> Result<()> {
    if value == 0 {
        return Err(QuadwireError::Config(
            "max_frame_size must be non-zero".into(),
        ));
    }
    Ok(())
}

/// Exactly one endpoint per partition, in index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Endpoint>", into = "Vec<Endpoint>")]
pub struct EndpointSet([Endpoint; PARTITION_COUNT]);

impl EndpointSet {
    /// Wrap four endpoints.
    pub fn new(endpoints: [Endpoint; PARTITION_COUNT]) -> Self {
        Self(endpoints)
    }

    /// Endpoints in partition index order.
    pub fn endpoints(&self) -> &[Endpoint; PARTITION_COUNT] {
        &self.0
    }

    /// Parse a JSON array of four endpoints.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON array of four endpoints from a file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

impl TryFrom<Vec<Endpoint>> for EndpointSet {
    type Error = QuadwireError;

    fn try_from(endpoints: Vec<Endpoint>) -> Result<Self> {
        let count = endpoints.len();
        let array: [Endpoint; PARTITION_COUNT] = endpoints.try_into().map_err(|_| {
            QuadwireError::Config(format!(
                "expected exactly {} endpoints, got {}",
                PARTITION_COUNT, count
            ))
        })?;
        Ok(Self(array))
    }
}

impl From<EndpointSet> for Vec<Endpoint> {
    fn from(set: EndpointSet) -> Self {
        set.0.into()
    }
}

impl std::str::FromStr for EndpointSet {
    type Err = QuadwireError;

    /// Comma-separated `host:port` list.
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(|part| part.parse::<Endpoint>())
            .collect::<Result<Vec<_>>>()?
            .try_into()
    }
}
