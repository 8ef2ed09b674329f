//! Session controller
//!
//! State machine driving join/leave, local media acquisition, track
//! publication and metadata propagation. The controller is the sole mutator
//! of the session phase and of the track registry; every action is evaluated
//! against the current phase, and `Terminated` absorbs everything that
//! arrives after it, regardless of ordering.

use crate::config::RoomConfig;
use crate::engine::{EngineEvent, NegotiationEngine};
use crate::error::{Result, RoomError};
use crate::media::{LocalStream, MediaSource};
use crate::registry::{Track, TrackRegistry, VariantState};
use crate::signaling::{ChannelAdapter, ChannelEvent, SignalingTransport};
use crate::simulcast::SimulcastController;
use crate::types::{EndpointId, EndpointInfo, TrackContext, TrackId, TrackKind, Variant};
use crate::ui::RoomUi;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Endpoint id used for the local preview video element.
pub const LOCAL_ENDPOINT_ID: &str = "local-endpoint";

const MEDIA_ACQUISITION_HINT: &str =
    "Failed to setup video room, make sure to grant camera and microphone permissions";

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Acquiring,
    Joining,
    Joined,
    Leaving,
    Terminated,
}

/// One room membership attempt. Destroyed on leave or fatal transport error;
/// not reusable after `Terminated`.
struct Session {
    phase: Phase,
    /// Set if and only if the phase is `Joined` or `Leaving`.
    local_endpoint_id: Option<EndpointId>,
}

/// Client session for one multi-party media room membership
pub struct Room {
    config: RoomConfig,
    session: Session,
    registry: TrackRegistry,
    simulcast: SimulcastController,
    engine: Arc<dyn NegotiationEngine>,
    channel: ChannelAdapter,
    media: Arc<dyn MediaSource>,
    ui: Arc<dyn RoomUi>,
    local_stream: Option<LocalStream>,
    /// Engine-assigned ids of local tracks, in publication order.
    local_track_ids: Vec<TrackId>,
    /// Whether the channel join was ever acknowledged; a teardown without it
    /// must not push a channel leave.
    channel_joined: bool,
    /// Last metadata received for any remote endpoint. The local echo of our
    /// own updates is never cached; the engine does not guarantee we observe
    /// it.
    last_endpoint_metadata: Option<Value>,
    last_track_metadata: Option<Value>,
}

impl Room {
    pub fn new(
        config: RoomConfig,
        engine: Arc<dyn NegotiationEngine>,
        transport: Arc<dyn SignalingTransport>,
        media: Arc<dyn MediaSource>,
        ui: Arc<dyn RoomUi>,
    ) -> Self {
        Self {
            config,
            session: Session {
                phase: Phase::Idle,
                local_endpoint_id: None,
            },
            registry: TrackRegistry::new(),
            simulcast: SimulcastController,
            engine,
            channel: ChannelAdapter::new(transport),
            media,
            ui,
            local_stream: None,
            local_track_ids: Vec::new(),
            channel_joined: false,
            last_endpoint_metadata: None,
            last_track_metadata: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    #[must_use]
    pub fn local_endpoint_id(&self) -> Option<&EndpointId> {
        self.session.local_endpoint_id.as_ref()
    }

    #[must_use]
    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    #[must_use]
    pub fn last_endpoint_metadata(&self) -> Option<&Value> {
        self.last_endpoint_metadata.as_ref()
    }

    #[must_use]
    pub fn last_track_metadata(&self) -> Option<&Value> {
        self.last_track_metadata.as_ref()
    }

    /// Join the room: acquire local media, request channel membership, then
    /// connect the negotiation engine. The session counts as joined only
    /// once the engine raises its `Connected` event.
    ///
    /// A no-op unless the session is `Idle`; a `join` arriving while another
    /// join is pending is rejected against the pre-transition phase.
    pub async fn join(&mut self) -> Result<()> {
        if self.session.phase != Phase::Idle {
            debug!(phase = ?self.session.phase, "join ignored, session not idle");
            return Ok(());
        }

        self.session.phase = Phase::Acquiring;
        if self.config.constraints.requests_media() {
            match self.media.acquire(&self.config.constraints).await {
                Ok(stream) => {
                    let local = EndpointId::from(LOCAL_ENDPOINT_ID);
                    self.ui.add_video_element(&local, "Me", true);
                    self.ui.attach_stream(stream.id(), &local);
                    self.local_stream = Some(stream);
                }
                Err(err) => {
                    self.ui.set_error_message(MEDIA_ACQUISITION_HINT);
                    self.session.phase = Phase::Idle;
                    return Err(err);
                }
            }
        }

        // The transport may have died while we were suspended in acquisition.
        if self.channel.is_closed() {
            self.force_teardown().await;
            return Err(RoomError::TransportLost(
                "transport closed during media acquisition".to_string(),
            ));
        }

        self.session.phase = Phase::Joining;
        match self.channel.join().await {
            Ok(ack) => {
                self.channel_joined = true;
                debug!(ack = %ack, "channel join acknowledged");
            }
            Err(err) => {
                self.release_local_media();
                self.session.phase = Phase::Idle;
                return Err(err);
            }
        }

        if self.channel.is_closed() {
            self.force_teardown().await;
            return Err(RoomError::TransportLost(
                "transport closed while joining".to_string(),
            ));
        }

        if let Err(err) = self
            .engine
            .connect(&self.config.display_name, self.config.preferred_video_codec)
            .await
        {
            self.force_teardown().await;
            return Err(RoomError::ConnectionDenied(err.to_string()));
        }

        // Still `Joining`: the engine must independently confirm identity
        // with its `Connected` event.
        Ok(())
    }

    /// Leave the room and release every held resource. Idempotent; a no-op
    /// once terminated.
    pub async fn leave(&mut self) -> Result<()> {
        if self.session.phase == Phase::Terminated {
            debug!("leave ignored, session already terminated");
            return Ok(());
        }
        self.session.phase = Phase::Leaving;
        info!("leaving room");

        self.engine.disconnect().await;
        if self.channel_joined {
            self.channel.leave().await;
        } else {
            self.channel.detach();
        }
        self.release_local_media();
        self.session.local_endpoint_id = None;
        self.session.phase = Phase::Terminated;
        Ok(())
    }

    /// Unconditional teardown triggered by transport failure. Safe to invoke
    /// from any phase; wins over any in-flight transition and never pushes a
    /// channel leave.
    pub async fn force_teardown(&mut self) {
        if self.session.phase == Phase::Terminated {
            return;
        }
        warn!(phase = ?self.session.phase, "forced session teardown");

        self.engine.disconnect().await;
        self.channel.detach();
        self.release_local_media();
        self.session.local_endpoint_id = None;
        self.session.phase = Phase::Terminated;
    }

    /// Forward an endpoint metadata update to the engine. Valid only while
    /// `Joined` or `Leaving`; the controller never caches its own metadata.
    pub async fn update_metadata(&self, metadata: Value) -> Result<()> {
        if !matches!(self.session.phase, Phase::Joined | Phase::Leaving) {
            debug!(phase = ?self.session.phase, "metadata update ignored outside active session");
            return Ok(());
        }
        self.engine.update_endpoint_metadata(metadata).await
    }

    /// Update the metadata of the first locally published track.
    pub async fn update_track_metadata(&self, metadata: Value) -> Result<()> {
        if !matches!(self.session.phase, Phase::Joined | Phase::Leaving) {
            debug!(phase = ?self.session.phase, "track metadata update ignored outside active session");
            return Ok(());
        }
        let Some(track_id) = self.local_track_ids.first() else {
            debug!("no local tracks published, track metadata update is a no-op");
            return Ok(());
        };
        self.engine.update_track_metadata(track_id, metadata).await
    }

    /// Enable a simulcast variant on the local video track. A no-op in an
    /// audio-only room or when simulcast was not configured.
    pub async fn enable_local_variant(&mut self, variant: Variant) -> Result<()> {
        if self.session.phase == Phase::Terminated {
            return Ok(());
        }
        let engine = Arc::clone(&self.engine);
        match self.registry.local_video_track_mut() {
            Some(track) => {
                self.simulcast
                    .enable_variant(engine.as_ref(), track, variant)
                    .await
            }
            None => {
                debug!("no local video track, simulcast enable is a no-op");
                Ok(())
            }
        }
    }

    /// Disable a simulcast variant on the local video track.
    pub async fn disable_local_variant(&mut self, variant: Variant) -> Result<()> {
        if self.session.phase == Phase::Terminated {
            return Ok(());
        }
        let engine = Arc::clone(&self.engine);
        match self.registry.local_video_track_mut() {
            Some(track) => {
                self.simulcast
                    .disable_variant(engine.as_ref(), track, variant)
                    .await
            }
            None => {
                debug!("no local video track, simulcast disable is a no-op");
                Ok(())
            }
        }
    }

    /// Ask the engine to deliver a specific variant of one remote endpoint's
    /// video track. A no-op when the endpoint has no video track.
    pub async fn select_target_variant(
        &mut self,
        endpoint_id: &EndpointId,
        variant: Variant,
    ) -> Result<()> {
        if self.session.phase == Phase::Terminated {
            return Ok(());
        }
        let Some(track_id) = self
            .registry
            .find_track(endpoint_id, TrackKind::Video)
            .map(|t| t.id.clone())
        else {
            debug!(endpoint_id = %endpoint_id, "endpoint has no video track, target select is a no-op");
            return Ok(());
        };
        self.select_target_for_track(&track_id, variant).await
    }

    /// Ask the engine to deliver a specific variant for every subscribed
    /// video track.
    pub async fn select_target_variant_all(&mut self, variant: Variant) -> Result<()> {
        if self.session.phase == Phase::Terminated {
            return Ok(());
        }
        let track_ids: Vec<TrackId> = self
            .registry
            .remote_video_tracks_mut()
            .map(|t| t.id.clone())
            .collect();
        for track_id in track_ids {
            self.select_target_for_track(&track_id, variant).await?;
        }
        Ok(())
    }

    async fn select_target_for_track(&mut self, track_id: &TrackId, variant: Variant) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        match self.registry.track_mut(track_id) {
            Some(track) => {
                self.simulcast
                    .select_target_variant(engine.as_ref(), track, variant)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Apply one negotiation engine lifecycle event.
    pub async fn handle_engine_event(&mut self, event: EngineEvent) -> Result<()> {
        if self.session.phase == Phase::Terminated {
            debug!("engine event ignored, session terminated");
            return Ok(());
        }
        match event {
            EngineEvent::Connected { local_id, roster } => self.on_connected(local_id, roster).await,
            EngineEvent::EndpointAdded(info) => {
                self.on_endpoint_added(info);
                Ok(())
            }
            EngineEvent::EndpointUpdated(info) => {
                self.on_endpoint_updated(info);
                Ok(())
            }
            EngineEvent::EndpointRemoved(id) => {
                self.on_endpoint_removed(&id);
                Ok(())
            }
            EngineEvent::TrackReady(ctx) => {
                self.on_track_ready(ctx);
                Ok(())
            }
            EngineEvent::TrackUpdated(ctx) => {
                self.on_track_updated(ctx);
                Ok(())
            }
            EngineEvent::TrackRemoved(ctx) => {
                self.on_track_removed(&ctx);
                Ok(())
            }
            EngineEvent::SendMediaEvent(payload) => {
                if self.channel.is_closed() {
                    debug!("dropping outgoing media event, channel closed");
                    return Ok(());
                }
                self.channel.push_media_event(payload).await
            }
            EngineEvent::ConnectionError(message) => {
                self.ui.set_error_message(&message);
                self.force_teardown().await;
                Err(RoomError::ConnectionDenied(message))
            }
        }
    }

    /// Apply one signaling channel event.
    pub async fn handle_channel_event(&mut self, event: ChannelEvent) -> Result<()> {
        if self.session.phase == Phase::Terminated {
            debug!("channel event ignored, session terminated");
            return Ok(());
        }
        match event {
            ChannelEvent::MediaEvent(payload) => self.engine.receive_media_event(payload).await,
            ChannelEvent::Disconnected => {
                self.force_teardown().await;
                Err(RoomError::TransportLost(
                    "signaling channel closed".to_string(),
                ))
            }
        }
    }

    /// Drive the session from the two event streams on a single task until
    /// the session terminates or a stream ends. Fatal errors are returned;
    /// non-fatal ones are logged and the loop continues.
    pub async fn run(&mut self, mut engine_events: mpsc::UnboundedReceiver<EngineEvent>) -> Result<()> {
        let Some(mut channel_events) = self.channel.take_events() else {
            return Err(RoomError::Engine(
                "channel event stream already consumed".to_string(),
            ));
        };
        loop {
            let outcome = tokio::select! {
                event = engine_events.recv() => match event {
                    Some(event) => self.handle_engine_event(event).await,
                    None => break,
                },
                event = channel_events.recv() => match event {
                    Some(event) => self.handle_channel_event(event).await,
                    None => break,
                },
            };
            if let Err(err) = outcome {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!(error = %err, "event handling failed");
            }
            if self.session.phase == Phase::Terminated {
                break;
            }
        }
        Ok(())
    }

    async fn on_connected(
        &mut self,
        local_id: EndpointId,
        roster: Vec<EndpointInfo>,
    ) -> Result<()> {
        if self.session.phase != Phase::Joining {
            debug!(phase = ?self.session.phase, "connected event ignored outside join");
            return Ok(());
        }

        info!(local_id = %local_id, roster_len = roster.len(), "session connected");
        self.session.local_endpoint_id = Some(local_id.clone());
        self.session.phase = Phase::Joined;

        for info in roster {
            // Guard against servers that echo the caller in the roster.
            if info.id == local_id {
                continue;
            }
            let display_name = display_name_of(info.metadata.as_ref());
            self.ui.add_video_element(&info.id, &display_name, false);
            self.registry.upsert_remote_endpoint(info);
        }

        self.publish_local_tracks(&local_id).await
    }

    /// Publish every local media track in the stable order the local stream
    /// enumerates them. Publish and metadata update are deliberately two
    /// steps: the engine assigns the identifier only on publish completion.
    async fn publish_local_tracks(&mut self, local_id: &EndpointId) -> Result<()> {
        let Some(stream) = self.local_stream.clone() else {
            return Ok(());
        };
        for local_track in stream.tracks() {
            let metadata = json!({
                "peer": self.config.display_name,
                "kind": local_track.kind,
            });
            let simulcast = match local_track.kind {
                TrackKind::Video => self.config.simulcast.clone(),
                TrackKind::Audio => None,
            };

            let track_id = self
                .engine
                .add_track(local_track, metadata.clone(), simulcast.clone())
                .await?;
            debug!(track_id = %track_id, kind = %local_track.kind, "local track published");

            self.registry.upsert_track(Track {
                id: track_id.clone(),
                owner: local_id.clone(),
                kind: local_track.kind,
                metadata: Some(metadata),
                variant_state: simulcast
                    .map(|c| VariantState::with_variants(c.enabled_variants)),
                bound_stream: Some(stream.id().clone()),
                remote: false,
            });
            self.local_track_ids.push(track_id.clone());

            if self.config.update_metadata_on_start {
                self.engine
                    .update_track_metadata(&track_id, json!("updatedMetadataOnStart"))
                    .await?;
            }
        }
        Ok(())
    }

    fn on_endpoint_added(&mut self, info: EndpointInfo) {
        if self.session.phase != Phase::Joined {
            debug!(endpoint_id = %info.id, "endpoint added before connection, ignored");
            return;
        }
        if Some(&info.id) == self.session.local_endpoint_id.as_ref() {
            return;
        }
        let display_name = display_name_of(info.metadata.as_ref());
        self.ui.add_video_element(&info.id, &display_name, false);
        self.registry.upsert_remote_endpoint(info);
    }

    fn on_endpoint_updated(&mut self, info: EndpointInfo) {
        if self.session.phase != Phase::Joined {
            return;
        }
        self.last_endpoint_metadata = info.metadata.clone();
        self.registry.upsert_remote_endpoint(info);
    }

    fn on_endpoint_removed(&mut self, id: &EndpointId) {
        if self.session.phase != Phase::Joined {
            return;
        }
        if self.registry.remove_remote_endpoint(id).is_some() {
            self.ui.remove_video_element(id);
        }
    }

    fn on_track_ready(&mut self, ctx: TrackContext) {
        if self.session.phase != Phase::Joined {
            debug!(track_id = %ctx.track_id, "track ready before connection, ignored");
            return;
        }
        debug!(
            track_id = %ctx.track_id,
            endpoint_id = %ctx.endpoint_id,
            kind = %ctx.kind,
            "remote track ready"
        );
        if let Some(stream_id) = &ctx.stream_id {
            self.ui.attach_stream(stream_id, &ctx.endpoint_id);
        }
        self.registry.upsert_track(Track {
            id: ctx.track_id,
            owner: ctx.endpoint_id,
            kind: ctx.kind,
            metadata: ctx.metadata,
            variant_state: ctx
                .simulcast_enabled
                .then(|| VariantState::with_variants(Variant::ALL)),
            bound_stream: ctx.stream_id,
            remote: true,
        });
    }

    fn on_track_updated(&mut self, ctx: TrackContext) {
        if self.session.phase != Phase::Joined {
            return;
        }
        self.last_track_metadata = ctx.metadata.clone();
        if let Some(track) = self.registry.track_mut(&ctx.track_id) {
            track.metadata = ctx.metadata;
        }
    }

    fn on_track_removed(&mut self, ctx: &TrackContext) {
        if self.session.phase != Phase::Joined {
            return;
        }
        if let Some(drained) = self.registry.remove_track(&ctx.track_id) {
            debug!(stream_id = %drained, "active stream removed");
        }
    }

    fn release_local_media(&mut self) {
        if let Some(stream) = self.local_stream.take() {
            stream.stop();
            self.ui
                .remove_video_element(&EndpointId::from(LOCAL_ENDPOINT_ID));
        }
    }
}

fn display_name_of(metadata: Option<&Value>) -> String {
    metadata
        .and_then(Value::as_str)
        .unwrap_or("undefined")
        .to_string()
}
