//! Local media acquisition boundary

use crate::config::MediaConstraints;
use crate::error::Result;
use crate::types::{StreamId, TrackId, TrackKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Device/capture collaborator producing local media
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Acquire local capture tracks matching the constraints.
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalStream>;
}

/// A single locally captured track
#[derive(Debug, Clone)]
pub struct LocalTrack {
    pub id: TrackId,
    pub kind: TrackKind,
}

/// A locally acquired media stream.
///
/// Clones share the liveness flag, so stopping any clone stops the capture.
#[derive(Debug, Clone)]
pub struct LocalStream {
    id: StreamId,
    tracks: Vec<LocalTrack>,
    live: Arc<AtomicBool>,
}

impl LocalStream {
    pub fn new(id: StreamId, tracks: Vec<LocalTrack>) -> Self {
        Self {
            id,
            tracks,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Tracks in stable enumeration order. This order is also the
    /// publication order on join.
    #[must_use]
    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    /// Stop all device tracks feeding this stream. Idempotent.
    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
