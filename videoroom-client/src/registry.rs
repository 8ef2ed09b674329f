//! Track registry
//!
//! Authoritative mapping from track identifiers to track state and from
//! remote endpoint identifiers to roster state. The registry is owned and
//! mutated by the session controller only; all access happens on the single
//! logical event-loop thread, so no locking is required here.

use crate::types::{EndpointId, EndpointInfo, StreamId, TrackId, TrackKind, Variant};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A remote room participant known to this client
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    pub id: EndpointId,
    /// Last metadata value received; opaque to the core.
    pub metadata: Option<Value>,
    pub track_ids: HashSet<TrackId>,
}

/// Simulcast state of a variant-carrying video track
#[derive(Debug, Clone, Default)]
pub struct VariantState {
    pub enabled_variants: HashSet<Variant>,
    /// Advisory delivery target; meaningful only for subscribed tracks.
    pub target_variant: Option<Variant>,
}

impl VariantState {
    pub fn with_variants(variants: impl IntoIterator<Item = Variant>) -> Self {
        Self {
            enabled_variants: variants.into_iter().collect(),
            target_variant: None,
        }
    }
}

/// A published or subscribed media track
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub owner: EndpointId,
    pub kind: TrackKind,
    pub metadata: Option<Value>,
    /// Present only when the track was created with simulcast enabled.
    pub variant_state: Option<VariantState>,
    pub bound_stream: Option<StreamId>,
    /// Whether the track is subscribed (remote) rather than published.
    pub remote: bool,
}

/// Registry of tracks, remote endpoints and active streams
#[derive(Default)]
pub struct TrackRegistry {
    remote_endpoints: IndexMap<EndpointId, RemoteEndpoint>,
    tracks: IndexMap<TrackId, Track>,
    /// Every track id ever bound to a stream, for the drain rule below.
    streams: HashMap<StreamId, HashSet<TrackId>>,
    /// Append-only for the session lifetime: sibling removal notifications
    /// may arrive separately and out of order.
    removed_tracks: HashSet<TrackId>,
}

impl TrackRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a remote endpoint from a roster entry.
    pub fn upsert_remote_endpoint(&mut self, info: EndpointInfo) {
        let entry = self
            .remote_endpoints
            .entry(info.id.clone())
            .or_insert_with(|| RemoteEndpoint {
                id: info.id.clone(),
                metadata: None,
                track_ids: HashSet::new(),
            });
        entry.metadata = info.metadata;
        entry.track_ids.extend(info.track_ids);
    }

    pub fn remove_remote_endpoint(&mut self, id: &EndpointId) -> Option<RemoteEndpoint> {
        self.remote_endpoints.shift_remove(id)
    }

    #[must_use]
    pub fn remote_endpoint(&self, id: &EndpointId) -> Option<&RemoteEndpoint> {
        self.remote_endpoints.get(id)
    }

    pub fn remote_endpoints(&self) -> impl Iterator<Item = &RemoteEndpoint> {
        self.remote_endpoints.values()
    }

    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.remote_endpoints.len()
    }

    /// Insert or refresh a track, registering its stream binding and its
    /// owner's track set.
    pub fn upsert_track(&mut self, track: Track) {
        if let Some(stream_id) = &track.bound_stream {
            self.streams
                .entry(stream_id.clone())
                .or_default()
                .insert(track.id.clone());
        }
        if track.remote {
            if let Some(endpoint) = self.remote_endpoints.get_mut(&track.owner) {
                endpoint.track_ids.insert(track.id.clone());
            }
        }
        self.tracks.insert(track.id.clone(), track);
    }

    /// Mark a track removed. A stream is drained only when every track ever
    /// bound to it has been marked removed, regardless of removal order.
    /// Returns the drained stream id, if this removal drained one.
    pub fn remove_track(&mut self, id: &TrackId) -> Option<StreamId> {
        self.removed_tracks.insert(id.clone());

        let Some(track) = self.tracks.shift_remove(id) else {
            return None;
        };
        if let Some(endpoint) = self.remote_endpoints.get_mut(&track.owner) {
            endpoint.track_ids.remove(id);
        }

        let stream_id = track.bound_stream?;
        let drained = self
            .streams
            .get(&stream_id)
            .is_some_and(|members| members.iter().all(|t| self.removed_tracks.contains(t)));
        if drained {
            self.streams.remove(&stream_id);
            debug!(stream_id = %stream_id, "stream drained, all tracks removed");
            Some(stream_id)
        } else {
            None
        }
    }

    #[must_use]
    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn track_mut(&mut self, id: &TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(id)
    }

    /// At most one match per (endpoint, kind) pair. If the engine ever
    /// reports two simultaneous tracks of the same kind for one endpoint,
    /// the first in insertion order wins; an accepted limitation.
    #[must_use]
    pub fn find_track(&self, endpoint_id: &EndpointId, kind: TrackKind) -> Option<&Track> {
        self.tracks
            .values()
            .find(|t| t.owner == *endpoint_id && t.kind == kind)
    }

    /// The anchor for local simulcast operations. `None` in an audio-only
    /// room, in which case simulcast operations are no-ops.
    #[must_use]
    pub fn local_video_track(&self) -> Option<&Track> {
        self.tracks
            .values()
            .find(|t| !t.remote && t.kind == TrackKind::Video)
    }

    pub fn local_video_track_mut(&mut self) -> Option<&mut Track> {
        self.tracks
            .values_mut()
            .find(|t| !t.remote && t.kind == TrackKind::Video)
    }

    pub fn remote_video_tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks
            .values_mut()
            .filter(|t| t.remote && t.kind == TrackKind::Video)
    }

    /// Streams with at least one track not yet removed.
    pub fn active_streams(&self) -> impl Iterator<Item = &StreamId> {
        self.streams.keys()
    }

    #[must_use]
    pub fn has_stream(&self, id: &StreamId) -> bool {
        self.streams.contains_key(id)
    }

    /// Live tracks currently bound to the given stream.
    pub fn stream_tracks<'a>(
        &'a self,
        stream_id: &'a StreamId,
    ) -> impl Iterator<Item = &'a Track> {
        self.tracks
            .values()
            .filter(move |t| t.bound_stream.as_ref() == Some(stream_id))
    }
}
