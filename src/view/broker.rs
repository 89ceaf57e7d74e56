//! Broker-side view of the cluster's segment placement
//!
//! Consumes the inventory event stream, maintains one versioned timeline per
//! data source, tracks which servers are live routing targets, and re-exposes
//! both the timelines and a filtered notification stream to the routing
//! layer.

use super::inventory::{CallbackAction, SegmentCallback, ServerCallback, ServerInventoryView};
use crate::config::SegmentWatcherConfig;
use crate::interval::Interval;
use crate::segment::SegmentDescriptor;
use crate::selector::{ServerSelector, ServerSelectorStrategy};
use crate::server::{QueryableServer, ServerMetadata};
use crate::timeline::{TimelineChunk, VersionedTimeline};
use crate::{Error, Result};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle of one data source's timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineState {
    /// Created, still receiving the starting snapshot
    Populating,
    /// The transport has confirmed the full snapshot was applied
    Ready,
}

/// Concurrent handle to one data source's timeline.
///
/// Mutations hold the write lock for their full duration, so readers always
/// observe a consistent snapshot; reads on different data sources never
/// contend with each other.
#[derive(Clone)]
pub struct SharedTimeline {
    state: Arc<RwLock<TimelineState>>,
    inner: Arc<RwLock<VersionedTimeline>>,
}

impl SharedTimeline {
    fn new(strategy: Arc<dyn ServerSelectorStrategy>) -> Self {
        Self {
            state: Arc::new(RwLock::new(TimelineState::Populating)),
            inner: Arc::new(RwLock::new(VersionedTimeline::new(strategy))),
        }
    }

    pub fn lookup(&self, query: Interval) -> Vec<TimelineChunk> {
        self.inner.read().lookup(query)
    }

    pub fn lookup_with_incomplete(&self, query: Interval) -> Vec<TimelineChunk> {
        self.inner.read().lookup_with_incomplete(query)
    }

    pub fn find_chunk(
        &self,
        interval: &Interval,
        version: &str,
        partition_num: u32,
    ) -> Option<Arc<ServerSelector>> {
        self.inner.read().find_chunk(interval, version, partition_num)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn state(&self) -> TimelineState {
        *self.state.read()
    }

    fn mark_ready(&self) {
        *self.state.write() = TimelineState::Ready;
    }

    fn add(&self, segment: &SegmentDescriptor, server: Arc<QueryableServer>) -> Arc<ServerSelector> {
        self.inner.write().add(segment, server)
    }

    fn remove(
        &self,
        interval: &Interval,
        version: &str,
        partition_num: u32,
        server_name: &str,
    ) -> Option<Arc<ServerSelector>> {
        self.inner
            .write()
            .remove(interval, version, partition_num, server_name)
    }
}

/// Per-server bookkeeping: the queryable handle plus the segments it holds
struct ServerEntry {
    server: Arc<QueryableServer>,
    segments: HashSet<String>,
}

/// The broker's live view of segment placement across the cluster
pub struct BrokerServerView {
    strategy: Arc<dyn ServerSelectorStrategy>,
    watcher: SegmentWatcherConfig,
    /// One timeline per observed data source
    timelines: DashMap<String, SharedTimeline>,
    /// Segment id -> its selector, for reverse bookkeeping
    selectors: DashMap<String, Arc<ServerSelector>>,
    /// Servers currently holding at least one indexed segment
    servers: DashMap<String, ServerEntry>,
    /// Metadata of every announced server, routing target or not
    known_servers: DashMap<String, ServerMetadata>,
    segment_callbacks: Mutex<Vec<Arc<dyn SegmentCallback>>>,
    initialized_tx: watch::Sender<bool>,
}

impl BrokerServerView {
    pub fn new(strategy: Arc<dyn ServerSelectorStrategy>, watcher: SegmentWatcherConfig) -> Self {
        let (initialized_tx, _) = watch::channel(false);
        Self {
            strategy,
            watcher,
            timelines: DashMap::new(),
            selectors: DashMap::new(),
            servers: DashMap::new(),
            known_servers: DashMap::new(),
            segment_callbacks: Mutex::new(Vec::new()),
            initialized_tx,
        }
    }

    /// Register this view with the inventory transport. Call before
    /// `inventory.start()` so the starting snapshot is not missed.
    pub fn attach(self: &Arc<Self>, inventory: &dyn ServerInventoryView) {
        inventory.register_server_callback(Arc::clone(self) as Arc<dyn ServerCallback>);
        inventory.register_segment_callback(Arc::clone(self) as Arc<dyn SegmentCallback>);
    }

    /// Timeline for a data source, or `None` if it has never been observed.
    pub fn get_timeline(&self, data_source: &str) -> Option<SharedTimeline> {
        self.timelines.get(data_source).map(|t| t.value().clone())
    }

    /// Like [`get_timeline`](Self::get_timeline) with an explicit error for
    /// routing-layer propagation.
    pub fn get_timeline_checked(&self, data_source: &str) -> Result<SharedTimeline> {
        self.get_timeline(data_source)
            .ok_or_else(|| Error::UnknownDataSource(data_source.to_string()))
    }

    /// Connection handle for a server currently holding indexed segments.
    pub fn get_server(&self, name: &str) -> Option<Arc<QueryableServer>> {
        self.servers.get(name).map(|entry| Arc::clone(&entry.server))
    }

    /// Announced metadata for any known server, including non-data roles.
    pub fn get_server_metadata(&self, name: &str) -> Option<ServerMetadata> {
        self.known_servers.get(name).map(|meta| meta.value().clone())
    }

    pub fn data_sources(&self) -> Vec<String> {
        self.timelines.iter().map(|t| t.key().clone()).collect()
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized_tx.borrow()
    }

    /// Wait until the transport's starting snapshot has been fully applied.
    /// Lookups work before that point; they just observe partial data.
    pub async fn wait_until_initialized(&self) {
        let mut rx = self.initialized_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Subscribe to the filtered segment event stream. Callbacks run after
    /// the timeline has been updated for the event; returning
    /// [`CallbackAction::Unregister`] drops the subscription.
    pub fn register_segment_callback(&self, callback: Arc<dyn SegmentCallback>) {
        self.segment_callbacks.lock().push(callback);
    }

    /// Drop all indexed state ahead of a transport reconnect. The transport
    /// is expected to redeliver a fresh snapshot followed by a new
    /// initialized signal; state is replaced, never merged, so no stale
    /// entries survive the gap.
    pub fn reset(&self) {
        warn!("Resetting segment view, awaiting fresh snapshot");
        self.timelines.clear();
        self.selectors.clear();
        self.servers.clear();
        self.initialized_tx.send_replace(false);
    }

    fn handle_segment_added(&self, server: &ServerMetadata, segment: &SegmentDescriptor) {
        if !self.should_index(server, segment) {
            return;
        }

        let queryable = self.queryable_server(server, segment);
        let timeline = self
            .timelines
            .entry(segment.data_source.clone())
            .or_insert_with(|| SharedTimeline::new(Arc::clone(&self.strategy)))
            .value()
            .clone();
        let selector = timeline.add(segment, queryable);
        self.selectors.insert(segment.id(), selector);

        debug!("Added segment {} from server {}", segment.id(), server.name);
        self.segment_callbacks
            .lock()
            .retain(|cb| cb.segment_added(server, segment) == CallbackAction::Continue);
    }

    fn handle_segment_removed(&self, server: &ServerMetadata, segment: &SegmentDescriptor) {
        if !self.should_index(server, segment) {
            return;
        }

        self.drop_server_segment(&server.name, &segment.id());

        let timeline = match self.timelines.get(&segment.data_source) {
            Some(timeline) => timeline.value().clone(),
            None => {
                debug!(
                    "Segment removal for unknown data source {}",
                    segment.data_source
                );
                return;
            }
        };
        if timeline
            .remove(
                &segment.interval,
                &segment.version,
                segment.partition_num,
                &server.name,
            )
            .is_some()
        {
            self.selectors.remove(&segment.id());
        }

        debug!("Removed segment {} from server {}", segment.id(), server.name);
        self.segment_callbacks
            .lock()
            .retain(|cb| cb.segment_removed(server, segment) == CallbackAction::Continue);
    }

    fn handle_view_initialized(&self) {
        for timeline in self.timelines.iter() {
            timeline.value().mark_ready();
        }
        self.initialized_tx.send_replace(true);
        info!(
            "Segment view initialized with {} data sources",
            self.timelines.len()
        );
        self.segment_callbacks
            .lock()
            .retain(|cb| cb.segment_view_initialized() == CallbackAction::Continue);
    }

    fn handle_server_added(&self, server: &ServerMetadata) {
        debug!(
            "Server {} announced ({:?}, tier {})",
            server.name, server.server_type, server.tier
        );
        self.known_servers
            .insert(server.name.clone(), server.clone());
    }

    fn handle_server_removed(&self, server: &ServerMetadata) {
        info!("Server {} withdrawn", server.name);
        self.known_servers.remove(&server.name);

        // Withdraw every segment the server still holds so its selectors and
        // connection handle are released even without explicit removals.
        let held: Vec<String> = self
            .servers
            .get(&server.name)
            .map(|entry| entry.segments.iter().cloned().collect())
            .unwrap_or_default();
        for segment_id in held {
            let selector = match self.selectors.get(&segment_id) {
                Some(selector) => Arc::clone(&selector),
                None => continue,
            };
            let segment = selector.segment().clone();
            self.handle_segment_removed(server, &segment);
        }
        self.servers.remove(&server.name);
    }

    /// Whether an announcement belongs in the index: the server must be able
    /// to serve data queries and pass the watcher filters. Role and filter
    /// decisions are symmetric for add and remove.
    fn should_index(&self, server: &ServerMetadata, segment: &SegmentDescriptor) -> bool {
        if !server.server_type.can_serve_segments() {
            debug!(
                "Ignoring segment {} from non-data server {}",
                segment.id(),
                server.name
            );
            return false;
        }
        if !self.watcher.watches_tier(&server.tier)
            || !self.watcher.watches_data_source(&segment.data_source)
        {
            debug!("Segment {} filtered out by watcher config", segment.id());
            return false;
        }
        true
    }

    fn queryable_server(
        &self,
        server: &ServerMetadata,
        segment: &SegmentDescriptor,
    ) -> Arc<QueryableServer> {
        let mut entry = self
            .servers
            .entry(server.name.clone())
            .or_insert_with(|| {
                info!("Adding queryable server {} ({})", server.name, server.host);
                ServerEntry {
                    server: Arc::new(QueryableServer::new(server.clone())),
                    segments: HashSet::new(),
                }
            });
        entry.segments.insert(segment.id());
        Arc::clone(&entry.server)
    }

    fn drop_server_segment(&self, server_name: &str, segment_id: &str) {
        if let Some(mut entry) = self.servers.get_mut(server_name) {
            entry.segments.remove(segment_id);
        }
        if self
            .servers
            .remove_if(server_name, |_, entry| entry.segments.is_empty())
            .is_some()
        {
            info!(
                "Server {} holds no segments, dropping connection handle",
                server_name
            );
        }
    }
}

impl SegmentCallback for BrokerServerView {
    fn segment_added(
        &self,
        server: &ServerMetadata,
        segment: &SegmentDescriptor,
    ) -> CallbackAction {
        self.handle_segment_added(server, segment);
        CallbackAction::Continue
    }

    fn segment_removed(
        &self,
        server: &ServerMetadata,
        segment: &SegmentDescriptor,
    ) -> CallbackAction {
        self.handle_segment_removed(server, segment);
        CallbackAction::Continue
    }

    fn segment_view_initialized(&self) -> CallbackAction {
        self.handle_view_initialized();
        CallbackAction::Continue
    }
}

impl ServerCallback for BrokerServerView {
    fn server_added(&self, server: &ServerMetadata) -> CallbackAction {
        self.handle_server_added(server);
        CallbackAction::Continue
    }

    fn server_removed(&self, server: &ServerMetadata) -> CallbackAction {
        self.handle_server_removed(server);
        CallbackAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::RandomServerSelectorStrategy;
    use crate::server::ServerType;

    fn view(watcher: SegmentWatcherConfig) -> BrokerServerView {
        BrokerServerView::new(
            Arc::new(RandomServerSelectorStrategy::with_seed(5)),
            watcher,
        )
    }

    fn historical(name: &str) -> ServerMetadata {
        ServerMetadata::new(name, format!("{}:8083", name), ServerType::Historical)
    }

    fn seg(data_source: &str, interval: &str, version: &str) -> SegmentDescriptor {
        SegmentDescriptor::new(data_source, interval.parse().unwrap(), version)
    }

    #[test]
    fn test_broker_announcements_are_ignored() {
        let view = view(SegmentWatcherConfig::default());
        let broker = ServerMetadata::new("broker-1", "broker-1:8082", ServerType::Broker);

        view.handle_segment_added(&broker, &seg("events", "2011-04-01/2011-04-09", "v1"));

        assert!(view.get_timeline("events").is_none());
        assert!(view.get_server("broker-1").is_none());
    }

    #[test]
    fn test_watcher_filters_tier_and_data_source() {
        let view = view(
            SegmentWatcherConfig::new()
                .watch_tiers(["hot"])
                .watch_data_sources(["events"]),
        );

        let cold = historical("hist-cold").with_tier("cold", 0);
        view.handle_segment_added(&cold, &seg("events", "2011-04-01/2011-04-09", "v1"));
        assert!(view.get_timeline("events").is_none());

        let hot = historical("hist-hot").with_tier("hot", 0);
        view.handle_segment_added(&hot, &seg("metrics", "2011-04-01/2011-04-09", "v1"));
        assert!(view.get_timeline("metrics").is_none());

        view.handle_segment_added(&hot, &seg("events", "2011-04-01/2011-04-09", "v1"));
        assert!(view.get_timeline("events").is_some());
    }

    #[test]
    fn test_server_handle_lifecycle_follows_segments() {
        let view = view(SegmentWatcherConfig::default());
        let server = historical("hist-1");
        let a = seg("events", "2011-04-01/2011-04-02", "v1");
        let b = seg("events", "2011-04-02/2011-04-03", "v1");

        view.handle_segment_added(&server, &a);
        view.handle_segment_added(&server, &b);
        assert!(view.get_server("hist-1").is_some());

        view.handle_segment_removed(&server, &a);
        assert!(view.get_server("hist-1").is_some());

        view.handle_segment_removed(&server, &b);
        assert!(view.get_server("hist-1").is_none());
    }

    #[test]
    fn test_reset_replaces_state() {
        let view = view(SegmentWatcherConfig::default());
        let server = historical("hist-1");
        view.handle_segment_added(&server, &seg("events", "2011-04-01/2011-04-09", "v1"));
        view.handle_view_initialized();
        assert!(view.is_initialized());

        view.reset();
        assert!(!view.is_initialized());
        assert!(view.get_timeline("events").is_none());
        assert!(view.get_server("hist-1").is_none());
    }
}
