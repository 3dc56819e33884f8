//! One-time world initialization for a freshly started instance.

use std::collections::BTreeMap;

use tracing::info;

use crate::client::{AttrValue, ClientError, ClusterClient, WorldBootstrap};

const WORLD_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::world");

/// Namespace attribute client libraries use to detect a local instance.
pub const LOCAL_MODE_FQDN_ATTRIBUTE: &str = "//sys/@local_mode_fqdn";

/// Bootstraps the namespace of a freshly started instance.
///
/// Runs the external baseline bootstrap, creates a single data-replication
/// cell sized for a one-node deployment, and records the local FQDN so
/// clients can auto-detect local mode. Performed once per `start`, never on
/// later operations against the same instance.
pub fn initialize_world(
    client: &mut dyn ClusterClient,
    bootstrap: &dyn WorldBootstrap,
    fqdn: &str,
) -> Result<(), ClientError> {
    bootstrap.bootstrap(client)?;

    let cell_attributes: BTreeMap<String, AttrValue> = BTreeMap::from([
        ("changelog_replication_factor".to_owned(), AttrValue::from(1)),
        ("changelog_read_quorum".to_owned(), AttrValue::from(1)),
        ("changelog_write_quorum".to_owned(), AttrValue::from(1)),
    ]);
    client.create_tablet_cell(&cell_attributes)?;

    client.set(LOCAL_MODE_FQDN_ATTRIBUTE, &AttrValue::from(fqdn))?;
    info!(target: WORLD_TARGET, fqdn, "world initialized");
    Ok(())
}

/// Resolves the local host's fully-qualified name.
#[must_use]
pub fn local_fqdn() -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = nix::unistd::gethostname() {
            let name = name.to_string_lossy().into_owned();
            if !name.is_empty() {
                return name;
            }
        }
    }
    "localhost".to_owned()
}
