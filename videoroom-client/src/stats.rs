//! Delivery statistics reporter
//!
//! Read-only views over the RTP counters the negotiation engine's transport
//! exposes. Nothing here mutates session state; the reporter only resolves
//! counter samples against the registry and compares consecutive samples.

use crate::error::Result;
use crate::registry::TrackRegistry;
use crate::types::{EndpointId, StreamId, TrackId, TrackKind, Variant};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Direction of an RTP counter sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One RTP counter sample for a single track (and variant, when simulcast
/// splits a track into several encodings).
#[derive(Debug, Clone)]
pub struct RtpReport {
    pub track_id: TrackId,
    pub direction: Direction,
    pub kind: TrackKind,
    /// Encoding this sample belongs to; `None` for audio and for
    /// single-variant video.
    pub variant: Option<Variant>,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub frames_per_second: Option<f64>,
    /// Cumulative frames encoded (outbound) or decoded (inbound).
    /// Zero for audio.
    pub frames: u64,
    /// Cumulative duration of processed audio samples, in seconds.
    /// Zero for video.
    pub total_samples_duration: f64,
}

/// Read-only counter source backed by the engine's transport
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn rtp_reports(&self) -> Result<Vec<RtpReport>>;
}

/// Frame counters of one video encoding at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSnapshot {
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub frames_per_second: Option<f64>,
    pub frames: u64,
}

impl VideoSnapshot {
    fn of(report: &RtpReport) -> Self {
        Self {
            frame_width: report.frame_width,
            frame_height: report.frame_height,
            frames_per_second: report.frames_per_second,
            frames: report.frames,
        }
    }
}

/// Per-variant counters of the locally published simulcast video track
#[derive(Debug, Clone)]
pub struct OutboundSimulcastStats {
    pub endpoint_id: EndpointId,
    pub variants: HashMap<Variant, VideoSnapshot>,
}

/// Counters of one subscribed remote video track, with the variant the
/// engine is currently delivering
#[derive(Debug, Clone)]
pub struct InboundVideoStats {
    pub endpoint_id: EndpointId,
    pub track_id: TrackId,
    pub delivered_variant: Option<Variant>,
    pub snapshot: VideoSnapshot,
}

/// Playing state of one (stream, kind) pair derived from two samples
#[derive(Debug, Clone, PartialEq)]
pub struct StreamActivity {
    pub stream_id: StreamId,
    pub kind: TrackKind,
    pub playing: bool,
}

/// Per-variant counters of the local simulcast publication.
///
/// Variants the transport reports no sample for are simply absent; a
/// disabled variant disappears from the map rather than reading as stalled.
pub async fn outbound_simulcast(
    source: &dyn StatsSource,
    local_id: &EndpointId,
) -> Result<OutboundSimulcastStats> {
    let mut variants = HashMap::new();
    for report in source.rtp_reports().await? {
        if report.direction != Direction::Outbound || report.kind != TrackKind::Video {
            continue;
        }
        let Some(variant) = report.variant else {
            debug!(track_id = %report.track_id, "outbound video sample without variant, skipped");
            continue;
        };
        variants.insert(variant, VideoSnapshot::of(&report));
    }
    Ok(OutboundSimulcastStats {
        endpoint_id: local_id.clone(),
        variants,
    })
}

/// Counters for every subscribed remote video track the registry knows.
/// Samples for tracks the registry does not know are dropped.
pub async fn inbound_simulcast(
    source: &dyn StatsSource,
    registry: &TrackRegistry,
) -> Result<Vec<InboundVideoStats>> {
    let mut stats = Vec::new();
    for report in source.rtp_reports().await? {
        if report.direction != Direction::Inbound || report.kind != TrackKind::Video {
            continue;
        }
        let Some(track) = registry.track(&report.track_id) else {
            debug!(track_id = %report.track_id, "inbound sample for unknown track, skipped");
            continue;
        };
        if !track.remote {
            continue;
        }
        stats.push(InboundVideoStats {
            endpoint_id: track.owner.clone(),
            track_id: report.track_id.clone(),
            delivered_variant: report.variant,
            snapshot: VideoSnapshot::of(&report),
        });
    }
    Ok(stats)
}

/// Derive the playing state of every active stream from two consecutive
/// report samples. Video counts as playing when frames advanced between the
/// samples; audio when the total samples duration advanced. A track missing
/// from either sample reads as not playing.
#[must_use]
pub fn stream_activity(
    before: &[RtpReport],
    after: &[RtpReport],
    registry: &TrackRegistry,
) -> Vec<StreamActivity> {
    let before: HashMap<&TrackId, &RtpReport> = inbound_by_track(before);
    let after: HashMap<&TrackId, &RtpReport> = inbound_by_track(after);

    let mut activity = Vec::new();
    for stream_id in registry.active_streams() {
        for track in registry.stream_tracks(stream_id) {
            let playing = match (before.get(&track.id), after.get(&track.id)) {
                (Some(prev), Some(next)) => match track.kind {
                    TrackKind::Video => next.frames > prev.frames,
                    TrackKind::Audio => {
                        next.total_samples_duration > prev.total_samples_duration
                    }
                },
                _ => false,
            };
            activity.push(StreamActivity {
                stream_id: stream_id.clone(),
                kind: track.kind,
                playing,
            });
        }
    }
    activity
}

fn inbound_by_track(reports: &[RtpReport]) -> HashMap<&TrackId, &RtpReport> {
    reports
        .iter()
        .filter(|r| r.direction == Direction::Inbound)
        .map(|r| (&r.track_id, r))
        .collect()
}
