//! View controller: the broker's window onto cluster segment placement
//!
//! `inventory` defines the contract with the external membership transport;
//! `broker` consumes its events and maintains the per-data-source timelines
//! the routing layer queries.

mod broker;
mod inventory;

pub use broker::{BrokerServerView, SharedTimeline, TimelineState};
pub use inventory::{CallbackAction, SegmentCallback, ServerCallback, ServerInventoryView};
