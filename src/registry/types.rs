//! Registry snapshot types and error definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// Service labels. Ordered so rendering and logging are deterministic.
pub type Labels = BTreeMap<String, String>;

/// Transport protocol of a service port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Sctp => write!(f, "SCTP"),
        }
    }
}

/// One element of a registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawService {
    /// Unique service name.
    pub name: String,

    #[serde(default)]
    pub labels: Labels,

    /// Target network address the proxy forwards to.
    pub address: String,

    /// Target port.
    pub port: u16,

    #[serde(default)]
    pub protocol: Protocol,
}

impl RawService {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            address: address.into(),
            port,
            protocol: Protocol::Tcp,
        }
    }

    /// Builder-style label insertion.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A registered, selected service as last configured.
///
/// Built from a `RawService` each time the service is written; the labels
/// are a copy taken at that moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub labels: Labels,
    pub endpoint_address: String,
    pub endpoint_port: u16,
    pub protocol: Protocol,
    pub active: bool,
}

impl ServiceRecord {
    pub fn from_raw(raw: &RawService) -> Self {
        Self {
            name: raw.name.clone(),
            labels: raw.labels.clone(),
            endpoint_address: raw.address.clone(),
            endpoint_port: raw.port,
            protocol: raw.protocol,
            active: true,
        }
    }

    /// True when `raw` points somewhere else than this record.
    ///
    /// IP addresses compare by value, so `::1` equals `0:0:0:0:0:0:0:1`.
    pub fn endpoint_differs(&self, raw: &RawService) -> bool {
        if self.endpoint_port != raw.port {
            return true;
        }
        match (
            self.endpoint_address.parse::<IpAddr>(),
            raw.address.parse::<IpAddr>(),
        ) {
            (Ok(a), Ok(b)) => a != b,
            _ => self.endpoint_address != raw.address,
        }
    }
}

/// Errors that can occur while talking to the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry client could not be constructed. Fatal at startup.
    #[error("registry client init failed: {0}")]
    ClientInit(String),

    /// Snapshot request failed.
    #[error("registry fetch failed: {0}")]
    Fetch(String),

    /// Snapshot payload could not be decoded.
    #[error("registry decode failed: {0}")]
    Decode(String),

    /// Snapshot file could not be read.
    #[error("snapshot file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
