//! Room client configuration

use crate::types::Variant;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Preferred video codec hint forwarded to the negotiation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    H264,
}

/// Capture preferences applied when video is requested with simulcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub max_frame_rate: u32,
    pub ideal_frame_rate: u32,
}

impl Default for VideoProfile {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            max_frame_rate: 30,
            ideal_frame_rate: 24,
        }
    }
}

/// Video side of the local media constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoConstraint {
    Disabled,
    Enabled,
    /// Capture with explicit resolution/framerate preferences.
    Profile(VideoProfile),
}

impl VideoConstraint {
    #[must_use]
    pub const fn is_requested(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Local media requested on join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: VideoConstraint,
}

impl MediaConstraints {
    /// Whether any local media acquisition is needed at all.
    #[must_use]
    pub const fn requests_media(&self) -> bool {
        self.audio || self.video.is_requested()
    }
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: VideoConstraint::Enabled,
        }
    }
}

/// Simulcast publication settings for the local video track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulcastConfig {
    /// Variants enabled at publish time.
    pub enabled_variants: Vec<Variant>,
    /// Per-variant bitrate ceiling in kbps, fixed at publish time.
    pub bandwidth_kbps: HashMap<Variant, u32>,
}

impl Default for SimulcastConfig {
    fn default() -> Self {
        Self {
            enabled_variants: Variant::ALL.to_vec(),
            bandwidth_kbps: HashMap::from([
                (Variant::Low, 150),
                (Variant::Medium, 500),
                (Variant::High, 1500),
            ]),
        }
    }
}

/// Room client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Name announced to the room on connect.
    pub display_name: String,
    /// Local media requested on join.
    pub constraints: MediaConstraints,
    /// Issue a metadata update for each local track right after publishing it.
    pub update_metadata_on_start: bool,
    /// Simulcast settings; `None` publishes a single-variant video track.
    pub simulcast: Option<SimulcastConfig>,
    /// Codec hint forwarded to the negotiation engine on connect.
    pub preferred_video_codec: Option<VideoCodec>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            display_name: "someone".to_string(),
            constraints: MediaConstraints::default(),
            update_metadata_on_start: false,
            simulcast: None,
            preferred_video_codec: Some(VideoCodec::Vp8),
        }
    }
}
