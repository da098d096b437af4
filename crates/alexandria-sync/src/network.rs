//! Tag network view.

use tracing::debug;

use alexandria_core::{Network, Result};

use crate::snapshot::SnapshotBuilder;

/// Builds the resource/tag network from a fresh aggregate.
#[derive(Clone)]
pub struct NetworkService {
    builder: SnapshotBuilder,
}

impl NetworkService {
    pub fn new(builder: SnapshotBuilder) -> Self {
        Self { builder }
    }

    /// One node per tag, document and link; one edge per tag reference.
    pub async fn network(&self) -> Result<Network> {
        let snapshot = self.builder.aggregate().await?;
        let network = Network::from(&snapshot);
        debug!(
            subsystem = "sync",
            component = "network",
            op = "build",
            nodes = network.nodes.len(),
            edges = network.edges.len(),
            "Network built"
        );
        Ok(network)
    }
}
