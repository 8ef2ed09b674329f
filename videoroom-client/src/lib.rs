//! Videoroom client
//!
//! Client-side session orchestration for a multi-party WebRTC media room.
//! The crate owns session lifecycle, roster and track bookkeeping, simulcast
//! variant control and delivery statistics; media negotiation, transport I/O,
//! device capture and rendering stay behind trait boundaries supplied by the
//! embedding application.
//!
//! ## Architecture
//!
//! - **`Room`**: Session controller and state machine, the only mutator of
//!   session state
//! - **`TrackRegistry`**: Roster, track and stream bookkeeping
//! - **`SimulcastController`**: Variant enable/disable/target operations
//! - **`ChannelAdapter`**: Signaling channel wrapper relaying opaque
//!   negotiation payloads
//! - **`stats`**: Read-only delivery statistics views
//!
//! ## Usage
//!
//! ```rust,ignore
//! use videoroom_client::{Room, RoomConfig};
//!
//! let mut room = Room::new(RoomConfig::default(), engine, transport, media, ui);
//! room.join().await?;
//! room.run(engine_events).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod media;
pub mod registry;
pub mod room;
pub mod signaling;
pub mod simulcast;
pub mod stats;
pub mod types;
pub mod ui;

#[cfg(test)]
mod test_support;

pub use config::{
    MediaConstraints, RoomConfig, SimulcastConfig, VideoCodec, VideoConstraint, VideoProfile,
};
pub use engine::{EngineEvent, NegotiationEngine};
pub use error::{Result, RoomError};
pub use media::{LocalStream, LocalTrack, MediaSource};
pub use registry::{RemoteEndpoint, Track, TrackRegistry, VariantState};
pub use room::{Phase, Room};
pub use signaling::{ChannelAdapter, ChannelEvent, SignalingTransport, TransportEvent};
pub use simulcast::SimulcastController;
pub use types::{EndpointId, EndpointInfo, StreamId, TrackContext, TrackId, TrackKind, Variant};
pub use ui::{NoopUi, RoomUi};
