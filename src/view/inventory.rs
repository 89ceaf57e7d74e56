//! Contract with the external membership/segment transport
//!
//! The transport (a coordination-service subscription, outside this crate)
//! discovers servers and the segments they announce, and delivers events to
//! registered callbacks. Required delivery guarantees:
//!
//! - events for the same server/segment coordinate arrive in causal order
//!   (an add is never delivered after its matching remove);
//! - `segment_view_initialized` is delivered exactly once, after the full
//!   starting snapshot has been delivered;
//! - events are delivered sequentially per registration, so callbacks never
//!   run concurrently with themselves.

use crate::segment::SegmentDescriptor;
use crate::server::ServerMetadata;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Returned by callbacks to keep or drop the registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Keep delivering events to this callback
    Continue,
    /// Remove this callback registration
    Unregister,
}

/// Receives segment announcement events
pub trait SegmentCallback: Send + Sync {
    fn segment_added(&self, server: &ServerMetadata, segment: &SegmentDescriptor)
        -> CallbackAction;

    fn segment_removed(
        &self,
        server: &ServerMetadata,
        segment: &SegmentDescriptor,
    ) -> CallbackAction;

    /// The transport has delivered its full starting snapshot.
    fn segment_view_initialized(&self) -> CallbackAction;
}

/// Receives server membership events
pub trait ServerCallback: Send + Sync {
    fn server_added(&self, server: &ServerMetadata) -> CallbackAction;

    fn server_removed(&self, server: &ServerMetadata) -> CallbackAction;
}

/// The external inventory subscription
#[async_trait]
pub trait ServerInventoryView: Send + Sync {
    /// Open the subscription and begin delivering the starting snapshot.
    async fn start(&self) -> Result<()>;

    /// Close the subscription. No events are delivered afterwards.
    async fn stop(&self) -> Result<()>;

    fn register_segment_callback(&self, callback: Arc<dyn SegmentCallback>);

    fn register_server_callback(&self, callback: Arc<dyn ServerCallback>);
}
