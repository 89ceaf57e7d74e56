//! Cluster server metadata and the broker-side connection handle

use serde::{Deserialize, Serialize};

/// Default tier assigned to servers that do not announce one
pub const DEFAULT_TIER: &str = "default_tier";

/// Role of a server in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerType {
    /// Serves immutable historical segments
    Historical,
    /// Serves segments still being built from live ingestion
    Realtime,
    /// Routes queries; never a valid segment location
    Broker,
    /// Fronts brokers; never a valid segment location
    Router,
}

impl ServerType {
    /// Whether segments announced by a server of this type belong in the
    /// timeline index. Broker and router announcements are bookkeeping noise
    /// and must never become query routing targets.
    pub fn can_serve_segments(&self) -> bool {
        matches!(self, ServerType::Historical | ServerType::Realtime)
    }
}

/// Metadata announced by a cluster server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    /// Unique server name
    pub name: String,
    /// host:port the server answers queries on
    pub host: String,
    /// Role of the server
    pub server_type: ServerType,
    /// Tier label grouping servers for replica selection
    pub tier: String,
    /// Selection priority of the tier
    pub priority: i32,
    /// Capacity in bytes
    pub max_size_bytes: u64,
}

impl ServerMetadata {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        server_type: ServerType,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            server_type,
            tier: DEFAULT_TIER.to_string(),
            priority: 0,
            max_size_bytes: 0,
        }
    }

    pub fn with_tier(mut self, tier: impl Into<String>, priority: i32) -> Self {
        self.tier = tier.into();
        self.priority = priority;
        self
    }

    pub fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }
}

/// Broker-side handle for one queryable server.
///
/// Created lazily the first time a data-serving server announces a segment and
/// dropped when its last segment disappears, so the connection descriptor is
/// only alive while the server is actually a routing target.
#[derive(Debug)]
pub struct QueryableServer {
    metadata: ServerMetadata,
    base_url: String,
}

impl QueryableServer {
    pub fn new(metadata: ServerMetadata) -> Self {
        let base_url = format!("http://{}", metadata.host);
        Self { metadata, base_url }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn tier(&self) -> &str {
        &self.metadata.tier
    }

    pub fn priority(&self) -> i32 {
        self.metadata.priority
    }

    pub fn metadata(&self) -> &ServerMetadata {
        &self.metadata
    }

    /// Connection descriptor the routing layer opens queries against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
