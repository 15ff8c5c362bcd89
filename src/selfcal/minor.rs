// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The minor-cycle iterator: one major cycle's worth of mask/clean/restore
//! iterations for a single chunk.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use super::RejectReason;
use crate::{
    chunks::{ChunkWorkspace, FrequencyChunk},
    params::ContinuumParams,
    primitives::{Artifact, ImageStats, ImagingPrimitive, RestoreMode, StatsProbe},
    thresholds::{
        clean_cutoff, dynamic_range_threshold, mask_threshold, noise_threshold,
    },
};

/// The states of the minor-cycle state machine. `DirtyImage` only occurs at
/// minor cycle 0; later minor cycles reuse the major cycle's dirty map.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum MinorCycleStage {
    #[strum(serialize = "dirty image")]
    DirtyImage,

    #[strum(serialize = "mask")]
    Mask,

    #[strum(serialize = "model")]
    Model,

    #[strum(serialize = "restored image")]
    Restored,

    #[strum(serialize = "residual image")]
    Residual,

    #[strum(serialize = "done")]
    Done,
}

/// Everything recorded about one minor cycle of one major cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationState {
    pub major: usize,
    pub minor: usize,

    /// This cycle's dynamic-range target.
    pub dynamic_range: f64,

    pub mask_threshold: f64,
    pub clean_cutoff: f64,

    pub map_stats: Option<ImageStats>,
    pub model_stats: Option<ImageStats>,
    pub image_stats: Option<ImageStats>,
    pub residual_stats: Option<ImageStats>,

    pub mask_ok: bool,
    pub model_ok: bool,
    pub image_ok: bool,
    pub residual_ok: bool,

    /// Why this cycle failed, if it did.
    pub reject_reason: Option<RejectReason>,
}

impl IterationState {
    fn new(major: usize, minor: usize, dynamic_range: f64) -> IterationState {
        IterationState {
            major,
            minor,
            dynamic_range,
            mask_threshold: 0.0,
            clean_cutoff: 0.0,
            map_stats: None,
            model_stats: None,
            image_stats: None,
            residual_stats: None,
            mask_ok: false,
            model_ok: false,
            image_ok: false,
            residual_ok: false,
            reject_reason: None,
        }
    }
}

/// The outcome of running all minor cycles of one major cycle. On failure,
/// `failure` names the stage and reason, and `states` still contains every
/// cycle that ran (the failed one last, with its `reject_reason` set).
pub(crate) struct MajorCycleOutcome {
    pub(crate) states: Vec<IterationState>,
    pub(crate) failure: Option<(MinorCycleStage, RejectReason)>,
}

/// Runs the minor cycles of one major cycle for one chunk.
pub(crate) struct MinorCycleIterator<'a> {
    pub(crate) params: &'a ContinuumParams,
    pub(crate) imaging: &'a dyn ImagingPrimitive,
    pub(crate) probe: &'a dyn StatsProbe,
    pub(crate) chunk: &'a FrequencyChunk,
    pub(crate) workspace: &'a ChunkWorkspace,
}

impl MinorCycleIterator<'_> {
    /// Run all configured minor cycles of major cycle `major`.
    /// `theoretical_noise_threshold` is fixed for the chunk; `minor_targets`
    /// is this major cycle's dynamic-range schedule, one target per minor
    /// cycle.
    pub(crate) fn run_major_cycle(
        &self,
        major: usize,
        theoretical_noise_threshold: f64,
        minor_targets: &[f64],
    ) -> MajorCycleOutcome {
        let chunk = self.chunk.index;
        let mut states = Vec::with_capacity(minor_targets.len());

        // Dirty map/beam for this major cycle. Disk state is checked first:
        // if a prior run already made the pair, reuse it.
        let map = self.workspace.map(major);
        let beam = self.workspace.beam(major);
        if map.exists() && beam.exists() {
            debug!("Chunk {chunk}: reusing dirty map/beam for major cycle {major}");
        } else if let Err(e) =
            self.imaging
                .invert(&self.chunk.visibility, &map, &beam, &self.params.invert)
        {
            warn!("Chunk {chunk}, major cycle {major}: invert failed: {e}");
            return MajorCycleOutcome {
                states,
                failure: Some((MinorCycleStage::DirtyImage, RejectReason::DirtyImageInvalid)),
            };
        }

        let map_stats = match self.checked_stats(&map, &beam) {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Chunk {chunk}, major cycle {major}: dirty image unusable: {e}");
                return MajorCycleOutcome {
                    states,
                    failure: Some((
                        MinorCycleStage::DirtyImage,
                        RejectReason::DirtyImageInvalid,
                    )),
                };
            }
        };
        // A valid dirty image has max >= min and a real stddev.
        if map_stats.max < map_stats.min || !map_stats.stddev.is_finite() {
            warn!(
                "Chunk {chunk}, major cycle {major}: dirty image statistics invalid \
                 (min {}, max {}, stddev {})",
                map_stats.min, map_stats.max, map_stats.stddev
            );
            return MajorCycleOutcome {
                states,
                failure: Some((MinorCycleStage::DirtyImage, RejectReason::DirtyImageInvalid)),
            };
        }
        let imax = map_stats.max;

        for (minor, &dr_target) in minor_targets.iter().enumerate() {
            let mut state = IterationState::new(major, minor, dr_target);
            state.map_stats = Some(map_stats);

            let nt = noise_threshold(imax, minor, major, self.params.c0);
            let drt = dynamic_range_threshold(imax, dr_target, self.params.minor_cycle0_dr);
            let (mt, kind) = mask_threshold(theoretical_noise_threshold, nt, drt);
            let cutoff = clean_cutoff(mt, self.params.c1);
            state.mask_threshold = mt;
            state.clean_cutoff = cutoff;
            info!(
                "Chunk {chunk}, cycle {major}.{minor}: mask threshold {mt:.3e} ({kind}), \
                 clean cutoff {cutoff:.3e}"
            );

            match self.run_minor_cycle(major, minor, cutoff, mt, &map, &beam, &mut state) {
                Ok(()) => states.push(state),
                Err(stage) => {
                    let reason = state
                        .reject_reason
                        .expect("failed cycles always record a reason");
                    states.push(state);
                    return MajorCycleOutcome {
                        states,
                        failure: Some((stage, reason)),
                    };
                }
            }
        }

        MajorCycleOutcome {
            states,
            failure: None,
        }
    }

    /// One minor cycle: mask, model, restored image, residual. Any
    /// validation failure records a reason on `state` and returns the stage
    /// that failed.
    #[allow(clippy::too_many_arguments)]
    fn run_minor_cycle(
        &self,
        major: usize,
        minor: usize,
        cutoff: f64,
        mask_threshold: f64,
        map: &std::path::Path,
        beam: &std::path::Path,
        state: &mut IterationState,
    ) -> Result<(), MinorCycleStage> {
        let chunk = self.chunk.index;
        let ws = self.workspace;

        // Mask. Minor cycle 0 inherits the previous major cycle's final mask
        // (or a parametric/catalogue mask for the very first major cycle);
        // later minor cycles threshold the previous minor cycle's restored
        // image.
        let mask = ws.mask(major, minor);
        let mask_result = if minor == 0 {
            if major == 0 {
                self.imaging.initial_mask(&self.chunk.visibility, &mask)
            } else {
                let prev_final = ws.mask(major - 1, self.params.num_minor_cycles - 1);
                self.imaging.regrid_mask(&prev_final, &mask)
            }
        } else {
            self.imaging
                .mask_from_image(&ws.image(major, minor - 1), mask_threshold, &mask)
        };
        let mask_stats = mask_result
            .and_then(|()| Artifact::ensure_exists(&mask).map(|_| ()))
            .and_then(|()| self.probe.stats(&mask));
        match mask_stats {
            // A NaN stddev means the mask is empty.
            Ok(stats) if stats.stddev.is_finite() => state.mask_ok = true,
            Ok(stats) => {
                warn!("Chunk {chunk}, cycle {major}.{minor}: mask is empty (stddev {})", stats.stddev);
                state.reject_reason = Some(RejectReason::MaskInvalid);
                return Err(MinorCycleStage::Mask);
            }
            Err(e) => {
                warn!("Chunk {chunk}, cycle {major}.{minor}: mask failed: {e}");
                state.reject_reason = Some(RejectReason::MaskInvalid);
                return Err(MinorCycleStage::Mask);
            }
        }

        // Model. The clean continues from the previous minor cycle's model
        // rather than restarting.
        let model = ws.model(major, minor);
        let starting_model = (minor > 0).then(|| ws.model(major, minor - 1));
        let model_stats = self
            .imaging
            .clean(
                map,
                beam,
                &mask,
                cutoff,
                self.params.clean_max_iterations,
                starting_model.as_deref(),
                &model,
            )
            .and_then(|()| Artifact::ensure_exists(&model).map(|_| ()))
            .and_then(|()| self.probe.stats(&model));
        state.model_stats = match self.validate(model_stats, "model", major, minor) {
            Some(stats) => {
                state.model_ok = true;
                Some(stats)
            }
            None => {
                state.reject_reason = Some(RejectReason::ModelInvalid);
                return Err(MinorCycleStage::Model);
            }
        };

        // Restored image.
        let image = ws.image(major, minor);
        let image_stats = self
            .imaging
            .restore(map, beam, &model, RestoreMode::Clean, &image)
            .and_then(|()| Artifact::ensure_exists(&image).map(|_| ()))
            .and_then(|()| self.probe.stats(&image));
        state.image_stats = match self.validate(image_stats, "restored image", major, minor) {
            Some(stats) => {
                state.image_ok = true;
                Some(stats)
            }
            None => {
                state.reject_reason = Some(RejectReason::ImageInvalid);
                return Err(MinorCycleStage::Restored);
            }
        };

        // Residual image.
        let residual = ws.residual(major, minor);
        let residual_stats = self
            .imaging
            .restore(map, beam, &model, RestoreMode::Residual, &residual)
            .and_then(|()| Artifact::ensure_exists(&residual).map(|_| ()))
            .and_then(|()| self.probe.stats(&residual));
        state.residual_stats = match self.validate(residual_stats, "residual image", major, minor)
        {
            Some(stats) => {
                state.residual_ok = true;
                Some(stats)
            }
            None => {
                state.reject_reason = Some(RejectReason::ResidualInvalid);
                return Err(MinorCycleStage::Residual);
            }
        };

        debug!(
            "Chunk {chunk}, cycle {major}.{minor}: {} (residual stddev {:.3e})",
            MinorCycleStage::Done,
            state
                .residual_stats
                .map(|s| s.stddev)
                .unwrap_or(f64::NAN)
        );
        Ok(())
    }

    /// Stats of a dirty map/beam pair, verifying both artifacts exist.
    fn checked_stats(
        &self,
        map: &std::path::Path,
        beam: &std::path::Path,
    ) -> Result<ImageStats, crate::primitives::PrimitiveError> {
        Artifact::ensure_exists(map)?;
        Artifact::ensure_exists(beam)?;
        self.probe.stats(map)
    }

    /// Sanity-check an artifact's statistics, logging any violation. Returns
    /// None on failure.
    fn validate(
        &self,
        stats: Result<ImageStats, crate::primitives::PrimitiveError>,
        what: &str,
        major: usize,
        minor: usize,
    ) -> Option<ImageStats> {
        let chunk = self.chunk.index;
        match stats {
            Ok(stats) => match self.params.sanity_bounds.check(stats) {
                Ok(()) => Some(stats),
                Err(violation) => {
                    warn!("Chunk {chunk}, cycle {major}.{minor}: {what} rejected: {violation}");
                    None
                }
            },
            Err(e) => {
                warn!("Chunk {chunk}, cycle {major}.{minor}: {what} failed: {e}");
                None
            }
        }
    }
}
