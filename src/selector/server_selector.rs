//! Per-segment server selector

use super::strategy::ServerSelectorStrategy;
use crate::segment::SegmentDescriptor;
use crate::server::QueryableServer;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Tracks the candidate servers holding one segment and picks one for routing.
///
/// The candidate set is mutated only by the view controller's event handling,
/// but `pick` is called concurrently from query threads, so the set lives
/// behind its own read-write lock.
pub struct ServerSelector {
    segment: SegmentDescriptor,
    strategy: Arc<dyn ServerSelectorStrategy>,
    servers: RwLock<Vec<Arc<QueryableServer>>>,
}

impl ServerSelector {
    pub fn new(segment: SegmentDescriptor, strategy: Arc<dyn ServerSelectorStrategy>) -> Self {
        Self {
            segment,
            strategy,
            servers: RwLock::new(Vec::new()),
        }
    }

    pub fn segment(&self) -> &SegmentDescriptor {
        &self.segment
    }

    /// Add a candidate server. Adding the same server twice is a no-op.
    pub fn add_server(&self, server: Arc<QueryableServer>) {
        let mut servers = self.servers.write();
        if servers.iter().any(|s| s.name() == server.name()) {
            debug!(
                "Server {} already announced segment {}",
                server.name(),
                self.segment.id()
            );
            return;
        }
        servers.push(server);
    }

    /// Remove a candidate server; returns whether any candidates remain.
    pub fn remove_server(&self, name: &str) -> bool {
        let mut servers = self.servers.write();
        servers.retain(|s| s.name() != name);
        !servers.is_empty()
    }

    /// Choose one serving server, or `None` when no candidate is available.
    pub fn pick(&self) -> Option<Arc<QueryableServer>> {
        let snapshot = self.servers.read().clone();
        self.strategy.pick(&snapshot)
    }

    /// [`pick`](Self::pick) as a routing failure the query layer can
    /// propagate.
    pub fn pick_or_err(&self) -> crate::Result<Arc<QueryableServer>> {
        self.pick()
            .ok_or_else(|| crate::Error::NoReplicaAvailable(self.segment.id()))
    }

    pub fn is_empty(&self) -> bool {
        self.servers.read().is_empty()
    }

    pub fn candidate_count(&self) -> usize {
        self.servers.read().len()
    }

    /// Snapshot of the current candidates.
    pub fn candidates(&self) -> Vec<Arc<QueryableServer>> {
        self.servers.read().clone()
    }
}
