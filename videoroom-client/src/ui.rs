//! UI collaborator boundary
//!
//! All calls are fire-and-forget; the session never consumes a return value
//! and every method defaults to a no-op.

use crate::types::{EndpointId, StreamId};

/// Display collaborator notified of roster and stream changes
pub trait RoomUi: Send + Sync {
    fn add_video_element(&self, _endpoint_id: &EndpointId, _display_name: &str, _is_local: bool) {}

    fn remove_video_element(&self, _endpoint_id: &EndpointId) {}

    fn attach_stream(&self, _stream_id: &StreamId, _endpoint_id: &EndpointId) {}

    fn set_error_message(&self, _text: &str) {}
}

/// UI implementation that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUi;

impl RoomUi for NoopUi {}
