//! Signaling channel adapter
//!
//! Thin request/response + fire-and-forget wrapper around the signaling
//! transport. Opaque negotiation payloads are relayed in both directions
//! without inspection; every transport error or close collapses into exactly
//! one [`ChannelEvent::Disconnected`] signal.

use crate::error::{Result, RoomError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Channel event name carrying opaque negotiation payloads.
pub const MEDIA_EVENT: &str = "mediaEvent";

/// Raw events produced by the signaling transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message { event: String, payload: Bytes },
    Error(String),
    Closed,
}

/// Events the adapter delivers to the session controller
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Opaque negotiation payload for the engine, relayed untouched.
    MediaEvent(Bytes),
    /// The transport errored or closed. Emitted at most once.
    Disconnected,
}

/// Signaling transport consumed by the adapter
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Request room membership. Resolves with the server ack payload on
    /// affirmative acknowledgment, rejects with the server error payload
    /// otherwise. Never both, never neither.
    async fn join(&self) -> std::result::Result<Value, Value>;

    async fn push(&self, event: &str, payload: Bytes) -> Result<()>;

    async fn leave(&self);

    /// Take the transport event stream. Single consumer.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;
}

/// Adapter between the signaling transport and the session controller
pub struct ChannelAdapter {
    transport: Arc<dyn SignalingTransport>,
    closed: Arc<AtomicBool>,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    /// Listener subscription held while attached to the transport.
    /// Released exactly once; repeated detach is a no-op.
    relay: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelAdapter {
    pub fn new(transport: Arc<dyn SignalingTransport>) -> Self {
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();

        let relay = transport.take_events().map(|mut source| {
            let closed = Arc::clone(&closed);
            tokio::spawn(async move {
                while let Some(event) = source.recv().await {
                    match event {
                        TransportEvent::Message { event, payload }
                            if event == MEDIA_EVENT =>
                        {
                            if tx.send(ChannelEvent::MediaEvent(payload)).is_err() {
                                break;
                            }
                        }
                        TransportEvent::Message { event, .. } => {
                            debug!(event = %event, "ignoring unrelated channel message");
                        }
                        TransportEvent::Error(reason) => {
                            if !closed.swap(true, Ordering::SeqCst) {
                                warn!(reason = %reason, "signaling channel error");
                                let _ = tx.send(ChannelEvent::Disconnected);
                            }
                        }
                        TransportEvent::Closed => {
                            if !closed.swap(true, Ordering::SeqCst) {
                                debug!("signaling channel closed");
                                let _ = tx.send(ChannelEvent::Disconnected);
                            }
                        }
                    }
                }
            })
        });

        Self {
            transport,
            closed,
            events: Some(rx),
            relay: Mutex::new(relay),
        }
    }

    /// Request room membership on the channel.
    pub async fn join(&self) -> Result<Value> {
        self.transport.join().await.map_err(RoomError::JoinRejected)
    }

    /// Relay an opaque negotiation payload to the channel, binary-safe.
    pub async fn push_media_event(&self, payload: Bytes) -> Result<()> {
        self.transport.push(MEDIA_EVENT, payload).await
    }

    /// Leave the channel and release the transport subscription.
    pub async fn leave(&self) {
        self.transport.leave().await;
        self.detach();
    }

    /// Release the transport subscription without any channel traffic.
    /// Idempotent.
    pub fn detach(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.relay.lock().take() {
            handle.abort();
        }
    }

    /// Whether the transport has errored, closed, or been detached.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn closed_latch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    /// Take the adapter event stream. Single consumer.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events.take()
    }
}

impl Drop for ChannelAdapter {
    fn drop(&mut self) {
        self.detach();
    }
}
