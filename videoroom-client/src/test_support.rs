//! Recording fakes for the external collaborators, shared by unit tests.

use crate::config::{MediaConstraints, SimulcastConfig, VideoCodec};
use crate::engine::NegotiationEngine;
use crate::error::{Result, RoomError};
use crate::media::{LocalStream, LocalTrack, MediaSource};
use crate::signaling::{SignalingTransport, TransportEvent};
use crate::types::{EndpointId, StreamId, TrackId, TrackKind, Variant};
use crate::ui::RoomUi;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Commands the fake engine has received, in order.
#[derive(Debug, Clone)]
pub enum EngineCall {
    Connect {
        display_name: String,
        codec: Option<VideoCodec>,
    },
    Disconnect,
    AddTrack {
        assigned: TrackId,
        kind: TrackKind,
        metadata: Value,
        simulcast: Option<SimulcastConfig>,
    },
    UpdateTrackMetadata {
        track_id: TrackId,
        metadata: Value,
    },
    UpdateEndpointMetadata {
        metadata: Value,
    },
    EnableVariant {
        track_id: TrackId,
        variant: Variant,
    },
    DisableVariant {
        track_id: TrackId,
        variant: Variant,
    },
    SetTargetVariant {
        track_id: TrackId,
        variant: Variant,
    },
    ReceiveMediaEvent {
        payload: Bytes,
    },
}

/// Negotiation engine fake recording every command.
pub struct FakeEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    next_track: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_track: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        })
    }

    /// Make the next engine command return an `Engine` error.
    pub fn fail_next_command(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_fail(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(RoomError::Engine("injected engine failure".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn add_track_calls(&self) -> Vec<EngineCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, EngineCall::AddTrack { .. }))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NegotiationEngine for FakeEngine {
    async fn connect(&self, display_name: &str, codec: Option<VideoCodec>) -> Result<()> {
        self.check_fail()?;
        self.calls.lock().push(EngineCall::Connect {
            display_name: display_name.to_string(),
            codec,
        });
        Ok(())
    }

    async fn disconnect(&self) {
        self.calls.lock().push(EngineCall::Disconnect);
    }

    async fn add_track(
        &self,
        track: &LocalTrack,
        metadata: Value,
        simulcast: Option<SimulcastConfig>,
    ) -> Result<TrackId> {
        self.check_fail()?;
        let n = self.next_track.fetch_add(1, Ordering::SeqCst);
        let assigned = TrackId::new(format!("published-{n}"));
        self.calls.lock().push(EngineCall::AddTrack {
            assigned: assigned.clone(),
            kind: track.kind,
            metadata,
            simulcast,
        });
        Ok(assigned)
    }

    async fn update_track_metadata(&self, track_id: &TrackId, metadata: Value) -> Result<()> {
        self.check_fail()?;
        self.calls.lock().push(EngineCall::UpdateTrackMetadata {
            track_id: track_id.clone(),
            metadata,
        });
        Ok(())
    }

    async fn update_endpoint_metadata(&self, metadata: Value) -> Result<()> {
        self.check_fail()?;
        self.calls
            .lock()
            .push(EngineCall::UpdateEndpointMetadata { metadata });
        Ok(())
    }

    async fn enable_track_variant(&self, track_id: &TrackId, variant: Variant) -> Result<()> {
        self.check_fail()?;
        self.calls.lock().push(EngineCall::EnableVariant {
            track_id: track_id.clone(),
            variant,
        });
        Ok(())
    }

    async fn disable_track_variant(&self, track_id: &TrackId, variant: Variant) -> Result<()> {
        self.check_fail()?;
        self.calls.lock().push(EngineCall::DisableVariant {
            track_id: track_id.clone(),
            variant,
        });
        Ok(())
    }

    async fn set_target_variant(&self, track_id: &TrackId, variant: Variant) -> Result<()> {
        self.check_fail()?;
        self.calls.lock().push(EngineCall::SetTargetVariant {
            track_id: track_id.clone(),
            variant,
        });
        Ok(())
    }

    async fn receive_media_event(&self, payload: Bytes) -> Result<()> {
        self.check_fail()?;
        self.calls
            .lock()
            .push(EngineCall::ReceiveMediaEvent { payload });
        Ok(())
    }
}

/// Signaling transport fake recording join/push/leave traffic.
pub struct FakeTransport {
    pub join_calls: AtomicUsize,
    pub leave_calls: AtomicUsize,
    pub pushes: Mutex<Vec<(String, Bytes)>>,
    join_result: Mutex<std::result::Result<Value, Value>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            join_calls: AtomicUsize::new(0),
            leave_calls: AtomicUsize::new(0),
            pushes: Mutex::new(Vec::new()),
            join_result: Mutex::new(Ok(json!({"status": "ok"}))),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    /// Make subsequent join requests reject with the given server payload.
    pub fn reject_join(&self, payload: Value) {
        *self.join_result.lock() = Err(payload);
    }

    /// Inject a transport event, as if it arrived from the wire.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn media_event_pushes(&self) -> Vec<Bytes> {
        self.pushes
            .lock()
            .iter()
            .filter(|(event, _)| event == crate::signaling::MEDIA_EVENT)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl SignalingTransport for FakeTransport {
    async fn join(&self) -> std::result::Result<Value, Value> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        self.join_result.lock().clone()
    }

    async fn push(&self, event: &str, payload: Bytes) -> Result<()> {
        self.pushes.lock().push((event.to_string(), payload));
        Ok(())
    }

    async fn leave(&self) {
        self.leave_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events_rx.lock().take()
    }
}

/// Media source fake handing out a fixed stream template.
pub struct FakeMediaSource {
    stream: LocalStream,
    pub fail: AtomicBool,
    pub acquire_calls: AtomicUsize,
    /// When set, `acquire` injects a transport close mid-acquisition and
    /// waits until the adapter has observed it before returning.
    pub close_during_acquire: Mutex<Option<(Arc<FakeTransport>, Arc<AtomicBool>)>>,
}

impl FakeMediaSource {
    pub fn with_tracks(tracks: Vec<LocalTrack>) -> Arc<Self> {
        Arc::new(Self {
            stream: LocalStream::new(StreamId::from("local-stream"), tracks),
            fail: AtomicBool::new(false),
            acquire_calls: AtomicUsize::new(0),
            close_during_acquire: Mutex::new(None),
        })
    }

    /// One audio and one video track, audio first (stable publish order).
    pub fn audio_video() -> Arc<Self> {
        Self::with_tracks(vec![
            LocalTrack {
                id: TrackId::from("local-audio"),
                kind: TrackKind::Audio,
            },
            LocalTrack {
                id: TrackId::from("local-video"),
                kind: TrackKind::Video,
            },
        ])
    }

    /// A handle sharing the liveness flag with whatever `acquire` hands out.
    pub fn stream(&self) -> LocalStream {
        self.stream.clone()
    }
}

#[async_trait]
impl MediaSource for FakeMediaSource {
    async fn acquire(&self, _constraints: &MediaConstraints) -> Result<LocalStream> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);

        let close = self.close_during_acquire.lock().take();
        if let Some((transport, latch)) = close {
            transport.emit(TransportEvent::Closed);
            for _ in 0..10_000 {
                if latch.load(Ordering::SeqCst) {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert!(latch.load(Ordering::SeqCst), "adapter never observed close");
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(RoomError::MediaAcquisition("permission denied".to_string()));
        }
        Ok(self.stream.clone())
    }
}

/// UI call recorded by [`RecordingUi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
    AddVideo {
        endpoint_id: EndpointId,
        display_name: String,
        is_local: bool,
    },
    RemoveVideo(EndpointId),
    AttachStream {
        stream_id: StreamId,
        endpoint_id: EndpointId,
    },
    Error(String),
}

/// UI fake recording every notification.
#[derive(Default)]
pub struct RecordingUi {
    pub calls: Mutex<Vec<UiCall>>,
}

impl RecordingUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                UiCall::Error(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl RoomUi for RecordingUi {
    fn add_video_element(&self, endpoint_id: &EndpointId, display_name: &str, is_local: bool) {
        self.calls.lock().push(UiCall::AddVideo {
            endpoint_id: endpoint_id.clone(),
            display_name: display_name.to_string(),
            is_local,
        });
    }

    fn remove_video_element(&self, endpoint_id: &EndpointId) {
        self.calls.lock().push(UiCall::RemoveVideo(endpoint_id.clone()));
    }

    fn attach_stream(&self, stream_id: &StreamId, endpoint_id: &EndpointId) {
        self.calls.lock().push(UiCall::AttachStream {
            stream_id: stream_id.clone(),
            endpoint_id: endpoint_id.clone(),
        });
    }

    fn set_error_message(&self, text: &str) {
        self.calls.lock().push(UiCall::Error(text.to_string()));
    }
}
