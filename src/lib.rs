//! # segview
//!
//! A live, queryable index of which cluster servers hold which data segments,
//! for the routing layer ("broker") of a distributed analytic-query engine.
//!
//! ## Key pieces
//!
//! - **Versioned interval timeline**: resolves overlapping, multi-versioned
//!   segment intervals into the authoritative non-overlapping set of segment
//!   locations, with higher versions overshadowing lower ones and incomplete
//!   partition sets withheld from routing
//! - **Broker server view**: applies the membership transport's
//!   server/segment event stream to one timeline per data source, tracks
//!   queryable servers, and re-exposes a filtered notification stream
//! - **Replica selection**: picks one serving server among a segment's
//!   replicas, by tier priority and random choice within a tier
//!
//! ## Architecture
//!
//! The transport delivers `segment_added` / `segment_removed` /
//! `segment_view_initialized` events; the view filters them by server role
//! and watcher config and mutates the target data source's timeline under its
//! write lock. Query threads concurrently resolve intervals through
//! `lookup`, obtaining for each non-overlapping chunk a server selector to
//! `pick` a serving node from. Nothing is persisted; the index is rebuilt
//! from the transport's snapshot on every start.

pub mod config;
pub mod interval;
pub mod segment;
pub mod selector;
pub mod server;
pub mod timeline;
pub mod view;

mod error;

pub use config::SegmentWatcherConfig;
pub use error::{Error, Result};
pub use interval::Interval;
pub use segment::SegmentDescriptor;
pub use selector::{
    HighestPriorityTierSelectorStrategy, LowestPriorityTierSelectorStrategy,
    RandomServerSelectorStrategy, ServerSelector, ServerSelectorStrategy,
};
pub use server::{QueryableServer, ServerMetadata, ServerType, DEFAULT_TIER};
pub use timeline::{PartitionHolder, TimelineChunk, VersionedTimeline};
pub use view::{
    BrokerServerView, CallbackAction, SegmentCallback, ServerCallback, ServerInventoryView,
    SharedTimeline, TimelineState,
};
