//! Negotiation engine boundary
//!
//! The engine owns ICE/SDP state, encoder pipelines and per-track bitrate
//! control. The client consumes it strictly through this command trait and
//! the [`EngineEvent`] stream; no negotiation state leaks into the session.

use crate::config::{SimulcastConfig, VideoCodec};
use crate::error::Result;
use crate::media::LocalTrack;
use crate::types::{EndpointId, EndpointInfo, TrackContext, TrackId, Variant};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

/// Lifecycle events emitted by the negotiation engine.
///
/// `Connected` is delivered at most once per session and strictly before any
/// roster or track event for that session.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Connected {
        local_id: EndpointId,
        roster: Vec<EndpointInfo>,
    },
    EndpointAdded(EndpointInfo),
    EndpointUpdated(EndpointInfo),
    EndpointRemoved(EndpointId),
    TrackReady(TrackContext),
    TrackUpdated(TrackContext),
    TrackRemoved(TrackContext),
    /// Opaque negotiation payload to relay to the signaling channel.
    SendMediaEvent(Bytes),
    ConnectionError(String),
}

/// Commands accepted by the negotiation engine
#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    async fn connect(&self, display_name: &str, codec: Option<VideoCodec>) -> Result<()>;

    async fn disconnect(&self);

    /// Publish a local track. The engine assigns the track identifier only
    /// on publish completion, which is why metadata updates configured for
    /// publish time are a separate follow-up command.
    async fn add_track(
        &self,
        track: &LocalTrack,
        metadata: Value,
        simulcast: Option<SimulcastConfig>,
    ) -> Result<TrackId>;

    async fn update_track_metadata(&self, track_id: &TrackId, metadata: Value) -> Result<()>;

    async fn update_endpoint_metadata(&self, metadata: Value) -> Result<()>;

    async fn enable_track_variant(&self, track_id: &TrackId, variant: Variant) -> Result<()>;

    async fn disable_track_variant(&self, track_id: &TrackId, variant: Variant) -> Result<()>;

    /// Advisory hint selecting the variant the engine should deliver for a
    /// subscribed track. The engine may still deliver a different variant
    /// under bandwidth pressure.
    async fn set_target_variant(&self, track_id: &TrackId, variant: Variant) -> Result<()>;

    /// Opaque negotiation payload arriving from the signaling channel.
    async fn receive_media_event(&self, payload: Bytes) -> Result<()>;
}
