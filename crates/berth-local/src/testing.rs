//! In-memory fakes for the client seam, shared by unit and integration
//! tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::client::{
    AttrValue, ClientError, ClusterClient, Connect, ConnectTarget, WorldBootstrap,
};

/// One recorded namespace operation.
#[derive(Debug, Clone, PartialEq)]
pub enum NamespaceOp {
    Container {
        path: String,
        attributes: BTreeMap<String, AttrValue>,
    },
    TabletCell {
        attributes: BTreeMap<String, AttrValue>,
    },
    WriteTable {
        path: String,
        content: Vec<u8>,
        format: String,
    },
    SetAttribute {
        path: String,
        key: String,
        value: AttrValue,
    },
    Set {
        path: String,
        value: AttrValue,
    },
}

/// Recording client; clones share one operation log.
#[derive(Debug, Clone, Default)]
pub struct FakeClient {
    ops: Arc<Mutex<Vec<NamespaceOp>>>,
}

impl FakeClient {
    /// Snapshot of every operation issued so far.
    #[must_use]
    pub fn operations(&self) -> Vec<NamespaceOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    fn record(&self, op: NamespaceOp) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
    }
}

impl ClusterClient for FakeClient {
    fn create_container(
        &mut self,
        path: &str,
        attributes: &BTreeMap<String, AttrValue>,
    ) -> Result<(), ClientError> {
        self.record(NamespaceOp::Container {
            path: path.to_owned(),
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn create_tablet_cell(
        &mut self,
        attributes: &BTreeMap<String, AttrValue>,
    ) -> Result<(), ClientError> {
        self.record(NamespaceOp::TabletCell {
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn write_table(&mut self, path: &str, content: &[u8], format: &str) -> Result<(), ClientError> {
        self.record(NamespaceOp::WriteTable {
            path: path.to_owned(),
            content: content.to_vec(),
            format: format.to_owned(),
        });
        Ok(())
    }

    fn set_attribute(
        &mut self,
        path: &str,
        key: &str,
        value: &AttrValue,
    ) -> Result<(), ClientError> {
        self.record(NamespaceOp::SetAttribute {
            path: path.to_owned(),
            key: key.to_owned(),
            value: value.clone(),
        });
        Ok(())
    }

    fn set(&mut self, path: &str, value: &AttrValue) -> Result<(), ClientError> {
        self.record(NamespaceOp::Set {
            path: path.to_owned(),
            value: value.clone(),
        });
        Ok(())
    }
}

/// Connector handing out clones of one shared [`FakeClient`].
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    client: FakeClient,
    last_target: Arc<Mutex<Option<ConnectTarget>>>,
}

impl FakeConnector {
    #[must_use]
    pub fn client(&self) -> FakeClient {
        self.client.clone()
    }

    /// Target of the most recent `connect` call, if any.
    #[must_use]
    pub fn last_target(&self) -> Option<ConnectTarget> {
        self.last_target.lock().ok().and_then(|target| target.clone())
    }
}

impl Connect for FakeConnector {
    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn ClusterClient>, ClientError> {
        if let Ok(mut last) = self.last_target.lock() {
            *last = Some(target.clone());
        }
        Ok(Box::new(self.client.clone()))
    }
}

/// Bootstrap that performs no baseline namespace work.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBootstrap;

impl WorldBootstrap for NoopBootstrap {
    fn bootstrap(&self, _client: &mut dyn ClusterClient) -> Result<(), ClientError> {
        Ok(())
    }
}
