//! Server role model and base configuration documents.
//!
//! Each spawned process belongs to one [`RoleKind`]. The base configuration
//! for a role is built here as a plain document value so the overlay codec
//! can deep-merge user overrides on top without caring about the concrete
//! fields a given server version understands.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Server roles making up a local cluster instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    Master,
    Scheduler,
    Node,
    Proxy,
}

impl RoleKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Scheduler => "scheduler",
            Self::Node => "node",
            Self::Proxy => "proxy",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Requested process counts per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCounts {
    pub masters: u32,
    pub schedulers: u32,
    pub nodes: u32,
    pub proxy: bool,
}

impl Default for RoleCounts {
    fn default() -> Self {
        Self {
            masters: 1,
            schedulers: 1,
            nodes: 1,
            proxy: true,
        }
    }
}

impl RoleCounts {
    /// Total number of processes `start` will spawn for these counts.
    #[must_use]
    pub fn total_processes(&self) -> u32 {
        self.masters + self.schedulers + self.nodes + u32::from(self.proxy)
    }
}

/// Ports assigned to one server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePorts {
    pub rpc: u16,
    pub monitoring: u16,
}

#[derive(Debug, Serialize)]
struct ServerConfigSeed<'a> {
    address: &'a str,
    rpc_port: u16,
    monitoring_port: u16,
    working_dir: &'a Path,
    master_addresses: &'a [String],
    logging: LoggingSeed<'a>,
}

#[derive(Debug, Serialize)]
struct LoggingSeed<'a> {
    directory: &'a Path,
    level: &'a str,
}

/// Base configuration document for a master or scheduler process.
///
/// The returned value is the merge target for user overrides; serialization
/// to the on-disk config file happens after the overlay step.
#[must_use]
pub fn server_base_config(
    host: &str,
    ports: RolePorts,
    working_dir: &Path,
    master_addresses: &[String],
) -> serde_yaml::Value {
    let seed = ServerConfigSeed {
        address: host,
        rpc_port: ports.rpc,
        monitoring_port: ports.monitoring,
        working_dir,
        master_addresses,
        logging: LoggingSeed {
            directory: working_dir,
            level: "info",
        },
    };
    serde_yaml::to_value(&seed).unwrap_or(serde_yaml::Value::Null)
}

/// Base configuration document for a node process.
///
/// Identical to the server seed plus the optional tmpfs storage location.
#[must_use]
pub fn node_base_config(
    host: &str,
    ports: RolePorts,
    working_dir: &Path,
    master_addresses: &[String],
    tmpfs_dir: Option<&Path>,
) -> serde_yaml::Value {
    let mut value = server_base_config(host, ports, working_dir, master_addresses);
    if let (Some(tmpfs), serde_yaml::Value::Mapping(mapping)) = (tmpfs_dir, &mut value) {
        mapping.insert(
            serde_yaml::Value::from("tmpfs_dir"),
            serde_yaml::Value::from(tmpfs.to_string_lossy().into_owned()),
        );
    }
    value
}

/// Base configuration for the gateway proxy.
///
/// The proxy consumes the flat JSON format rather than the structured
/// server document, so its seed is built as a JSON value.
#[must_use]
pub fn proxy_base_config(host: &str, port: u16, master_addresses: &[String]) -> serde_json::Value {
    let masters: Vec<&str> = master_addresses.iter().map(String::as_str).collect();
    let document: BTreeMap<&str, serde_json::Value> = BTreeMap::from([
        ("address", serde_json::Value::from(host)),
        ("port", serde_json::Value::from(port)),
        ("masters", serde_json::Value::from(masters)),
    ]);
    serde_json::to_value(document).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn server_base_config_exposes_assigned_ports() {
        let working_dir = PathBuf::from("/tmp/sandbox/master-0");
        let masters = vec!["localhost:20100".to_owned()];
        let value = server_base_config(
            "localhost",
            RolePorts {
                rpc: 20100,
                monitoring: 20101,
            },
            &working_dir,
            &masters,
        );
        assert_eq!(value["rpc_port"], serde_yaml::Value::from(20100));
        assert_eq!(value["monitoring_port"], serde_yaml::Value::from(20101));
        assert_eq!(value["master_addresses"][0], serde_yaml::Value::from("localhost:20100"));
    }

    #[test]
    fn node_base_config_includes_tmpfs_when_configured() {
        let working_dir = PathBuf::from("/tmp/sandbox/node-0");
        let tmpfs = PathBuf::from("/dev/shm/instance");
        let value = node_base_config(
            "localhost",
            RolePorts {
                rpc: 20200,
                monitoring: 20201,
            },
            &working_dir,
            &[],
            Some(&tmpfs),
        );
        assert_eq!(value["tmpfs_dir"], serde_yaml::Value::from("/dev/shm/instance"));
    }

    #[test]
    fn proxy_base_config_is_flat_json() {
        let value = proxy_base_config("localhost", 8080, &["localhost:20100".to_owned()]);
        assert_eq!(value["port"], serde_json::Value::from(8080));
        assert_eq!(value["masters"][0], serde_json::Value::from("localhost:20100"));
    }

    #[test]
    fn total_processes_counts_the_proxy_flag() {
        let counts = RoleCounts {
            masters: 1,
            schedulers: 2,
            nodes: 3,
            proxy: true,
        };
        assert_eq!(counts.total_processes(), 7);
        let without_proxy = RoleCounts {
            proxy: false,
            ..counts
        };
        assert_eq!(without_proxy.total_processes(), 6);
    }
}
