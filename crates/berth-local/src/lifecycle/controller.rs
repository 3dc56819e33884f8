//! High-level orchestration of the instance lifecycle.
//!
//! Every operation re-derives instance state from the sandbox on disk; the
//! controller holds no long-lived handles to running instances. States per
//! id: absent, starting, running (ledger present with a live pid), stopped
//! (ledger absent or every listed pid dead), absent again after delete.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use berth_config::{
    InstancePaths, LocalDefaults, Manifest, OverlayFormat, ProxyInfo, RoleCounts, RoleKind,
    RolePorts, merge_from_file, node_base_config, proxy_base_config, server_base_config,
};

use crate::client::{Connect, ConnectTarget, WorldBootstrap};
use crate::seeder::seed_namespace;
use crate::world::{initialize_world, local_fqdn};

use super::error::LifecycleError;
use super::lock::SandboxLock;
use super::ports::PortAllocator;
use super::probe;
use super::registry::{read_ledger, remove_ledger, write_ledger};
use super::spawning::{resolve_binary, rollback_spawned, spawn_role};
use super::types::{InstanceHandle, InstanceStatus, InstanceSummary, StartOptions};

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Lifecycle controller for local cluster instances.
pub struct LocalCluster {
    defaults: LocalDefaults,
    connector: Box<dyn Connect>,
    bootstrap: Box<dyn WorldBootstrap>,
}

impl LocalCluster {
    #[must_use]
    pub fn new(
        defaults: LocalDefaults,
        connector: Box<dyn Connect>,
        bootstrap: Box<dyn WorldBootstrap>,
    ) -> Self {
        Self {
            defaults,
            connector,
            bootstrap,
        }
    }

    /// Starts an instance: validates the request, reclaims a crashed prior
    /// run for the same id, spawns every requested role process, records
    /// manifest and pid ledger, and unless `prepare_only` initializes the
    /// namespace and seeds the local content tree.
    pub fn start(&self, options: StartOptions) -> Result<InstanceHandle, LifecycleError> {
        if options.counts.masters == 0 {
            return Err(LifecycleError::NoMasters);
        }
        let mut options = options;
        if options.proxy_from_source.is_none() {
            options.proxy_from_source = Some(self.defaults.proxy_from_source);
        }
        let root = self.defaults.resolve_root(options.root_path.as_deref());
        let id = options.id.clone().unwrap_or_else(generate_instance_id);
        let paths = InstancePaths::new(&root, &id)?;

        fs::create_dir_all(paths.sandbox()).map_err(|source| LifecycleError::Sandbox {
            path: paths.sandbox().to_path_buf(),
            source,
        })?;

        // Held through the ledger write so concurrent starts for the same
        // id serialise on the existence check.
        let _lock = SandboxLock::acquire(&paths.lock_path())?;
        self.reclaim_previous_run(&paths)?;

        let fqdn = options
            .fqdn
            .clone()
            .unwrap_or_else(local_fqdn);
        let plan = plan_instance(&options, &paths, &fqdn, self.port_locks_path(&options))?;

        let pids = spawn_plan(&plan, &options)?;

        let mut manifest = Manifest::new(&id);
        if let Some(address) = &plan.proxy_address {
            manifest.proxy = Some(ProxyInfo {
                address: address.clone(),
            });
        }
        // A ledger that never lands must not leave live role processes
        // behind: nothing would list them, so neither stop nor the
        // reclaim on the next start could reach them.
        let persisted = manifest
            .store(&paths.manifest_path())
            .map_err(LifecycleError::from)
            .and_then(|()| write_ledger(&paths.ledger_path(), &pids));
        if let Err(error) = persisted {
            rollback_spawned(&pids);
            return Err(error);
        }

        let handle = InstanceHandle {
            id: id.clone(),
            sandbox: paths.sandbox().to_path_buf(),
            pids,
            endpoint: plan.proxy_address.clone(),
            prepare_only: options.prepare_only,
        };

        // From here the instance is running; failures surface to the caller
        // without rolling the started processes back.
        if !options.prepare_only {
            let target = match &plan.proxy_address {
                Some(address) => ConnectTarget::Gateway {
                    address: address.clone(),
                },
                None => ConnectTarget::Driver {
                    sandbox: paths.sandbox().to_path_buf(),
                },
            };
            let mut client = self.connector.connect(&target)?;
            initialize_world(client.as_mut(), self.bootstrap.as_ref(), &fqdn)?;
            if let Some(content_dir) = &options.local_content_dir {
                seed_namespace(client.as_mut(), content_dir)?;
            }
        }

        info!(
            target: LIFECYCLE_TARGET,
            id = %handle.id,
            prepared = options.prepare_only,
            "local instance {}",
            if options.prepare_only { "prepared" } else { "started" }
        );
        if let Some(endpoint) = &handle.endpoint {
            info!(target: LIFECYCLE_TARGET, id = %handle.id, %endpoint, "proxy address assigned");
        }
        Ok(handle)
    }

    /// Stops a running instance: kills every ledger pid, removes the ledger,
    /// and optionally deletes the working directory.
    pub fn stop(
        &self,
        id: &str,
        remove_working_dir: bool,
        root: Option<&Path>,
    ) -> Result<(), LifecycleError> {
        let paths = self.instance_paths(id, root)?;
        if !paths.sandbox().is_dir() {
            return Err(LifecycleError::NotFound { id: id.to_owned() });
        }
        if check_stopped(&paths)? {
            return Err(LifecycleError::AlreadyStopped { id: id.to_owned() });
        }
        let ledger_path = paths.ledger_path();
        let pids = read_ledger(&ledger_path)?;
        probe::terminate_all(&pids)?;
        remove_ledger(&ledger_path)?;
        info!(target: LIFECYCLE_TARGET, id, "local instance stopped");
        if remove_working_dir {
            self.delete(id, true, root)?;
        }
        Ok(())
    }

    /// Deletes a stopped instance's sandbox; with `force`, a missing
    /// sandbox is a no-op.
    pub fn delete(&self, id: &str, force: bool, root: Option<&Path>) -> Result<(), LifecycleError> {
        let paths = self.instance_paths(id, root)?;
        if !paths.sandbox().is_dir() {
            if force {
                return Ok(());
            }
            return Err(LifecycleError::NotFound { id: id.to_owned() });
        }
        if !check_stopped(&paths)? {
            return Err(LifecycleError::NotStopped { id: id.to_owned() });
        }
        remove_tree_best_effort(paths.sandbox());
        info!(target: LIFECYCLE_TARGET, id, "local instance deleted");
        Ok(())
    }

    /// Returns the recorded gateway endpoint of an instance; a pure
    /// metadata read against the manifest.
    pub fn endpoint(&self, id: &str, root: Option<&Path>) -> Result<String, LifecycleError> {
        let paths = self.instance_paths(id, root)?;
        if !paths.sandbox().is_dir() {
            return Err(LifecycleError::NotFound { id: id.to_owned() });
        }
        let manifest_path = paths.manifest_path();
        if !manifest_path.is_file() {
            return Err(LifecycleError::ManifestMissing {
                id: id.to_owned(),
                path: manifest_path,
            });
        }
        let manifest = Manifest::load(&manifest_path)?;
        manifest
            .proxy
            .map(|proxy| proxy.address)
            .ok_or(LifecycleError::NoGateway { id: id.to_owned() })
    }

    /// Enumerates instances under the root in filesystem order, reporting
    /// each one's status and, when running, its gateway endpoint.
    pub fn list(&self, root: Option<&Path>) -> Result<Vec<InstanceSummary>, LifecycleError> {
        let root = self.defaults.resolve_root(root);
        let entries = fs::read_dir(&root).map_err(|source| LifecycleError::ListRoot {
            path: root.clone(),
            source,
        })?;
        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LifecycleError::ListRoot {
                path: root.clone(),
                source,
            })?;
            let full_path = entry.path();
            if !full_path.is_dir() {
                info!(
                    target: LIFECYCLE_TARGET,
                    path = %full_path.display(),
                    "found unknown object in instances root"
                );
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Ok(paths) = InstancePaths::new(&root, &id) else {
                continue;
            };
            if !paths.manifest_path().is_file() {
                info!(
                    target: LIFECYCLE_TARGET,
                    path = %full_path.display(),
                    "path does not contain a valid local instance"
                );
                continue;
            }
            if check_stopped(&paths)? {
                result.push(InstanceSummary {
                    id,
                    status: InstanceStatus::Stopped,
                    endpoint: None,
                });
            } else {
                let endpoint = match self.endpoint(&id, Some(&root)) {
                    Ok(address) => Some(address),
                    Err(error) => {
                        debug!(
                            target: LIFECYCLE_TARGET,
                            id, error = %error,
                            "running instance without resolvable endpoint"
                        );
                        None
                    }
                };
                result.push(InstanceSummary {
                    id,
                    status: InstanceStatus::Running,
                    endpoint,
                });
            }
        }
        Ok(result)
    }

    fn instance_paths(
        &self,
        id: &str,
        root: Option<&Path>,
    ) -> Result<InstancePaths, LifecycleError> {
        let root = self.defaults.resolve_root(root);
        Ok(InstancePaths::new(&root, id)?)
    }

    fn port_locks_path(&self, options: &StartOptions) -> Option<PathBuf> {
        options
            .port_locks_path
            .clone()
            .or_else(|| self.defaults.port_locks_path.clone())
    }

    /// Self-healing recovery: an empty ledger or a partially dead pid set
    /// marks a crashed prior run, whose survivors are killed and whose
    /// stale ledger is removed. A fully alive pid set refuses the start.
    fn reclaim_previous_run(&self, paths: &InstancePaths) -> Result<(), LifecycleError> {
        let ledger_path = paths.ledger_path();
        if !ledger_path.is_file() {
            return Ok(());
        }
        let pids = read_ledger(&ledger_path)?;
        let mut alive = Vec::new();
        for pid in &pids {
            if probe::is_alive(*pid)? {
                alive.push(*pid);
            }
        }
        if !pids.is_empty() && alive.len() == pids.len() {
            return Err(LifecycleError::AlreadyRunning {
                id: paths.id().to_owned(),
            });
        }
        for pid in &alive {
            warn!(
                target: LIFECYCLE_TARGET,
                id = paths.id(),
                pid,
                "killing surviving process of a previously run instance"
            );
            probe::terminate(*pid)?;
        }
        remove_ledger(&ledger_path)
    }
}

/// One planned role process: working dir, config document, resolved ports.
#[derive(Debug)]
struct ProcessPlan {
    kind: RoleKind,
    index: u32,
    working_dir: PathBuf,
    config_path: PathBuf,
    config: serde_yaml::Value,
}

#[derive(Debug)]
struct InstancePlan {
    processes: Vec<ProcessPlan>,
    proxy_address: Option<String>,
}

/// Allocates ports, merges per-role configs, and lays out working
/// directories for every requested process. Masters are planned first so
/// their addresses can be embedded in every other config.
fn plan_instance(
    options: &StartOptions,
    paths: &InstancePaths,
    host: &str,
    port_locks: Option<PathBuf>,
) -> Result<InstancePlan, LifecycleError> {
    let counts: RoleCounts = options.counts;
    let mut allocator = PortAllocator::new(options.port_range_start, port_locks);
    let mut processes = Vec::new();

    let mut master_addresses = Vec::new();
    let mut master_ports = Vec::new();
    for _ in 0..counts.masters {
        let ports = RolePorts {
            rpc: allocator.allocate(RoleKind::Master)?,
            monitoring: allocator.allocate(RoleKind::Master)?,
        };
        master_addresses.push(format!("{host}:{}", ports.rpc));
        master_ports.push(ports);
    }

    let tmpfs_dir = match &options.tmpfs_path {
        Some(tmpfs_root) => {
            let dir = tmpfs_root.join(paths.id());
            fs::create_dir_all(&dir).map_err(|source| LifecycleError::Sandbox {
                path: dir.clone(),
                source,
            })?;
            Some(dir)
        }
        None => None,
    };

    for (index, ports) in master_ports.into_iter().enumerate() {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        let working_dir = paths.role_dir(RoleKind::Master, index);
        let mut config = server_base_config(host, ports, &working_dir, &master_addresses);
        merge_from_file(
            &mut config,
            options.master_config.as_deref(),
            OverlayFormat::Structured,
        )?;
        processes.push(ProcessPlan {
            kind: RoleKind::Master,
            index,
            config_path: paths.role_config_path(RoleKind::Master, index),
            working_dir,
            config,
        });
    }

    for index in 0..counts.schedulers {
        let ports = RolePorts {
            rpc: allocator.allocate(RoleKind::Scheduler)?,
            monitoring: allocator.allocate(RoleKind::Scheduler)?,
        };
        let working_dir = paths.role_dir(RoleKind::Scheduler, index);
        let mut config = server_base_config(host, ports, &working_dir, &master_addresses);
        merge_from_file(
            &mut config,
            options.scheduler_config.as_deref(),
            OverlayFormat::Structured,
        )?;
        processes.push(ProcessPlan {
            kind: RoleKind::Scheduler,
            index,
            config_path: paths.role_config_path(RoleKind::Scheduler, index),
            working_dir,
            config,
        });
    }

    for index in 0..counts.nodes {
        let ports = RolePorts {
            rpc: allocator.allocate(RoleKind::Node)?,
            monitoring: allocator.allocate(RoleKind::Node)?,
        };
        let working_dir = paths.role_dir(RoleKind::Node, index);
        let mut config = node_base_config(
            host,
            ports,
            &working_dir,
            &master_addresses,
            tmpfs_dir.as_deref(),
        );
        merge_from_file(
            &mut config,
            options.node_config.as_deref(),
            OverlayFormat::Structured,
        )?;
        processes.push(ProcessPlan {
            kind: RoleKind::Node,
            index,
            config_path: paths.role_config_path(RoleKind::Node, index),
            working_dir,
            config,
        });
    }

    let mut proxy_address = None;
    if counts.proxy {
        let port = match options.proxy_port {
            Some(port) => port,
            None => allocator.allocate(RoleKind::Proxy)?,
        };
        let working_dir = paths.role_dir(RoleKind::Proxy, 0);
        let base = proxy_base_config(host, port, &master_addresses);
        let mut config =
            serde_yaml::to_value(base).map_err(|source| LifecycleError::ConfigEncode {
                path: paths.role_config_path(RoleKind::Proxy, 0),
                message: source.to_string(),
            })?;
        merge_from_file(
            &mut config,
            options.proxy_config.as_deref(),
            OverlayFormat::Flat,
        )?;
        proxy_address = Some(format!("{host}:{port}"));
        processes.push(ProcessPlan {
            kind: RoleKind::Proxy,
            index: 0,
            config_path: paths.role_config_path(RoleKind::Proxy, 0),
            working_dir,
            config,
        });
    }

    Ok(InstancePlan {
        processes,
        proxy_address,
    })
}

/// Spawns every planned process; on failure the already-spawned peers of
/// this attempt are rolled back before the error propagates.
fn spawn_plan(plan: &InstancePlan, options: &StartOptions) -> Result<Vec<u32>, LifecycleError> {
    let proxy_from_source = options.proxy_from_source.unwrap_or(false);
    let mut spawned = Vec::with_capacity(plan.processes.len());
    for process in &plan.processes {
        if let Err(error) = materialize_and_spawn(process, options, proxy_from_source)
            .map(|pid| spawned.push(pid))
        {
            rollback_spawned(&spawned);
            return Err(error);
        }
    }
    Ok(spawned)
}

fn materialize_and_spawn(
    process: &ProcessPlan,
    options: &StartOptions,
    proxy_from_source: bool,
) -> Result<u32, LifecycleError> {
    fs::create_dir_all(&process.working_dir).map_err(|source| LifecycleError::Sandbox {
        path: process.working_dir.clone(),
        source,
    })?;
    write_config_document(process)?;
    let binary = resolve_binary(process.kind, &options.binaries, proxy_from_source);
    spawn_role(
        process.kind,
        &binary,
        &process.config_path,
        &process.working_dir,
        options.capture_stderr,
    )
}

/// Serialises the merged config with the codec the role consumes: flat JSON
/// for the proxy, structured YAML for everything else.
fn write_config_document(process: &ProcessPlan) -> Result<(), LifecycleError> {
    let encode_error = |message: String| LifecycleError::ConfigEncode {
        path: process.config_path.clone(),
        message,
    };
    let content = match process.kind {
        RoleKind::Proxy => {
            let json: serde_json::Value = serde_yaml::from_value(process.config.clone())
                .map_err(|source| encode_error(source.to_string()))?;
            serde_json::to_string_pretty(&json)
                .map_err(|source| encode_error(source.to_string()))?
        }
        _ => serde_yaml::to_string(&process.config)
            .map_err(|source| encode_error(source.to_string()))?,
    };
    fs::write(&process.config_path, content).map_err(|source| LifecycleError::ConfigWrite {
        path: process.config_path.clone(),
        source,
    })
}

/// Observed stopped-check shared by `stop` preconditions and `list`.
///
/// Removes a ledger whose pids are all dead, so a second consecutive check
/// performs no further probes of reclaimed instances.
pub(crate) fn check_stopped(paths: &InstancePaths) -> Result<bool, LifecycleError> {
    if !paths.sandbox().is_dir() {
        return Ok(true);
    }
    let ledger_path = paths.ledger_path();
    if !ledger_path.is_file() {
        return Ok(true);
    }
    let pids = read_ledger(&ledger_path)?;
    let mut any_alive = false;
    for pid in &pids {
        if probe::is_alive(*pid)? {
            any_alive = true;
        }
    }
    if !any_alive {
        remove_ledger(&ledger_path)?;
    }
    Ok(!any_alive)
}

fn generate_instance_id() -> String {
    format!(
        "{:08x}-{:04x}-{:04x}-{:08x}",
        rand::random::<u32>(),
        rand::random::<u16>(),
        rand::random::<u16>(),
        rand::random::<u32>()
    )
}

/// Recursive best-effort removal; individual failures are logged and do not
/// abort the rest of the tree.
fn remove_tree_best_effort(path: &Path) {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(error) => {
            warn_removal(path, &error);
            return;
        }
    };
    for entry in entries.flatten() {
        let entry_path = entry.path();
        if entry_path.is_dir() {
            remove_tree_best_effort(&entry_path);
        } else if let Err(error) = fs::remove_file(&entry_path) {
            warn_removal(&entry_path, &error);
        }
    }
    if let Err(error) = fs::remove_dir(path) {
        warn_removal(path, &error);
    }
}

fn warn_removal(path: &Path, error: &io::Error) {
    warn!(
        target: LIFECYCLE_TARGET,
        path = %path.display(),
        error = %error,
        "failed to remove sandbox entry"
    );
}
