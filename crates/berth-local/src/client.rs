//! Seam to the namespace client of a running instance.
//!
//! The concrete client library is an external collaborator; the lifecycle
//! controller and the seeder only depend on these traits. Production code
//! supplies an implementation backed by the real client, tests supply
//! recording fakes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Attribute and payload value model shared with the structured codec.
pub type AttrValue = serde_yaml::Value;

/// Opaque error reported by the external client library.
#[derive(Debug, Error)]
#[error("cluster client error: {message}")]
pub struct ClientError {
    message: String,
}

impl ClientError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Namespace operations the lifecycle core issues against a live instance.
pub trait ClusterClient {
    /// Creates a container node, tolerating an existing node at `path`.
    fn create_container(
        &mut self,
        path: &str,
        attributes: &BTreeMap<String, AttrValue>,
    ) -> Result<(), ClientError>;

    /// Creates a data-replication cell with the given attributes.
    fn create_tablet_cell(
        &mut self,
        attributes: &BTreeMap<String, AttrValue>,
    ) -> Result<(), ClientError>;

    /// Writes `content` as a table payload at `path` using `format`.
    fn write_table(&mut self, path: &str, content: &[u8], format: &str) -> Result<(), ClientError>;

    /// Sets a single attribute on the node at `path`.
    fn set_attribute(&mut self, path: &str, key: &str, value: &AttrValue)
    -> Result<(), ClientError>;

    /// Sets the value of the node at `path`.
    fn set(&mut self, path: &str, value: &AttrValue) -> Result<(), ClientError>;
}

/// Where a fresh connection should be pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Connect through the started gateway proxy.
    Gateway { address: String },
    /// Connect directly via a driver against the instance sandbox.
    Driver { sandbox: PathBuf },
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gateway { address } => write!(formatter, "gateway {address}"),
            Self::Driver { sandbox } => write!(formatter, "driver {}", sandbox.display()),
        }
    }
}

/// Produces namespace clients for freshly started instances.
pub trait Connect {
    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn ClusterClient>, ClientError>;
}

/// Baseline namespace bootstrap delegated to an external initializer.
pub trait WorldBootstrap {
    fn bootstrap(&self, client: &mut dyn ClusterClient) -> Result<(), ClientError>;
}
