//! Request and result types of the lifecycle controller.

use std::fmt;
use std::path::PathBuf;

use berth_config::RoleCounts;

/// Explicit binary locations overriding environment and packaged defaults.
#[derive(Debug, Clone, Default)]
pub struct RoleBinaries {
    pub master: Option<PathBuf>,
    pub scheduler: Option<PathBuf>,
    pub node: Option<PathBuf>,
    pub proxy: Option<PathBuf>,
}

impl RoleBinaries {
    /// Uses one binary for every role; convenient for stub processes in
    /// tests.
    #[must_use]
    pub fn uniform(binary: PathBuf) -> Self {
        Self {
            master: Some(binary.clone()),
            scheduler: Some(binary.clone()),
            node: Some(binary.clone()),
            proxy: Some(binary),
        }
    }
}

/// Parameters of one `start` invocation.
///
/// Environment toggles surface here as explicit fields; nothing deeper
/// in the lifecycle consults the environment.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Instance id; generated when absent.
    pub id: Option<String>,
    /// Instances root; defaults from the controller's environment defaults.
    pub root_path: Option<PathBuf>,
    pub counts: RoleCounts,
    /// Structured config override for masters.
    pub master_config: Option<PathBuf>,
    /// Structured config override for schedulers.
    pub scheduler_config: Option<PathBuf>,
    /// Structured config override for nodes.
    pub node_config: Option<PathBuf>,
    /// Flat config override for the gateway proxy.
    pub proxy_config: Option<PathBuf>,
    /// Fixed proxy serving port.
    pub proxy_port: Option<u16>,
    /// Local content tree seeded into the namespace after startup.
    pub local_content_dir: Option<PathBuf>,
    /// Source the proxy binary from a development build.
    pub proxy_from_source: Option<bool>,
    /// tmpfs root; the instance gets a `<tmpfs>/<id>` sub-directory.
    pub tmpfs_path: Option<PathBuf>,
    /// First port of a fixed allocation range.
    pub port_range_start: Option<u16>,
    /// Port-lock directory coordinating parallel test runs.
    pub port_locks_path: Option<PathBuf>,
    /// Fully-qualified name override for the local host.
    pub fqdn: Option<String>,
    /// Prepare configs and processes without connecting or seeding.
    pub prepare_only: bool,
    /// Redirect role stderr into per-role files instead of inheriting.
    pub capture_stderr: bool,
    /// Explicit role binary overrides.
    pub binaries: RoleBinaries,
}

impl StartOptions {
    #[must_use]
    pub fn new(counts: RoleCounts) -> Self {
        Self {
            counts,
            capture_stderr: true,
            ..Self::default()
        }
    }
}

/// Observed state of an instance sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    Stopped,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => formatter.write_str("running"),
            Self::Stopped => formatter.write_str("stopped"),
        }
    }
}

/// One entry of a `list` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSummary {
    pub id: String,
    pub status: InstanceStatus,
    /// Gateway endpoint of a running instance, when resolvable.
    pub endpoint: Option<String>,
}

/// Handle to an instance returned by a successful `start`.
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    pub id: String,
    pub sandbox: PathBuf,
    pub pids: Vec<u32>,
    /// Gateway endpoint when a proxy role was started.
    pub endpoint: Option<String>,
    /// True when the instance was prepared without world initialization.
    pub prepare_only: bool,
}
