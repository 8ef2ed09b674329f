//! Simulcast variant controller
//!
//! Operates on the `variant_state` sub-record of a track it is handed by the
//! session controller; never creates or destroys tracks. All operations on
//! tracks created without simulcast are no-ops, not errors.

use crate::engine::NegotiationEngine;
use crate::error::Result;
use crate::registry::Track;
use crate::types::{TrackKind, Variant};
use tracing::debug;

/// Enable/disable/select-target operations on variant-carrying tracks
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulcastController;

impl SimulcastController {
    /// Enable a variant on a locally published track and forward the command
    /// to the engine. Re-enabling an already-enabled variant is idempotent
    /// and sends no duplicate command.
    pub async fn enable_variant(
        &self,
        engine: &dyn NegotiationEngine,
        track: &mut Track,
        variant: Variant,
    ) -> Result<()> {
        let Some(state) = track.variant_state.as_mut() else {
            debug!(track_id = %track.id, "track published without simulcast, ignoring enable");
            return Ok(());
        };
        if !state.enabled_variants.insert(variant) {
            debug!(track_id = %track.id, variant = ?variant, "variant already enabled");
            return Ok(());
        }
        engine.enable_track_variant(&track.id, variant).await
    }

    /// Disable a variant on a locally published track.
    pub async fn disable_variant(
        &self,
        engine: &dyn NegotiationEngine,
        track: &mut Track,
        variant: Variant,
    ) -> Result<()> {
        let Some(state) = track.variant_state.as_mut() else {
            debug!(track_id = %track.id, "track published without simulcast, ignoring disable");
            return Ok(());
        };
        if !state.enabled_variants.remove(&variant) {
            debug!(track_id = %track.id, variant = ?variant, "variant already disabled");
            return Ok(());
        }
        engine.disable_track_variant(&track.id, variant).await
    }

    /// Record the target variant for a subscribed video track and forward
    /// the advisory hint to the engine. The target is never rolled back; the
    /// engine may deliver a different variant under bandwidth pressure.
    pub async fn select_target_variant(
        &self,
        engine: &dyn NegotiationEngine,
        track: &mut Track,
        variant: Variant,
    ) -> Result<()> {
        if !track.remote || track.kind != TrackKind::Video {
            debug!(track_id = %track.id, "target variant only applies to subscribed video tracks");
            return Ok(());
        }
        let Some(state) = track.variant_state.as_mut() else {
            debug!(track_id = %track.id, "track published without simulcast, ignoring target");
            return Ok(());
        };
        state.target_variant = Some(variant);
        engine.set_target_variant(&track.id, variant).await
    }
}
