// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The major-cycle / chunk driver.
//!
//! Each frequency chunk is imaged independently: the driver recomputes the
//! chunk's dynamic-range schedule, runs the minor-cycle iterator for each
//! major cycle and self-calibrates the chunk's visibilities between major
//! cycles. Chunks are embarrassingly parallel, so they are processed with a
//! rayon worker pool; the only shared mutable state is the parameter store,
//! which serializes per-key writes internally.

mod error;
mod minor;

pub use error::SelfCalError;
pub use minor::{IterationState, MinorCycleStage};
pub(crate) use minor::{MajorCycleOutcome, MinorCycleIterator};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{
    chunks::{ChunkWorkspace, FrequencyChunk},
    params::ContinuumParams,
    primitives::{GainSolver, ImagingPrimitive, NoiseModel, RestoringBeam, StatsProbe},
    schedule::DynamicRangeSchedule,
    store::{ParamStore, StoreError, StoreField, StoreKey},
    thresholds::theoretical_noise_threshold,
    PROGRESS_BARS,
};

/// The closed set of reasons a chunk can be rejected. Failures local to one
/// chunk are recorded as one of these, never raised; sibling chunks always
/// continue.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    #[strum(serialize = "dirty image invalid")]
    #[serde(rename = "dirty image invalid")]
    DirtyImageInvalid,

    #[strum(serialize = "mask invalid/missing")]
    #[serde(rename = "mask invalid/missing")]
    MaskInvalid,

    #[strum(serialize = "model invalid/missing")]
    #[serde(rename = "model invalid/missing")]
    ModelInvalid,

    #[strum(serialize = "image invalid/missing")]
    #[serde(rename = "image invalid/missing")]
    ImageInvalid,

    #[strum(serialize = "residual invalid/missing")]
    #[serde(rename = "residual invalid/missing")]
    ResidualInvalid,

    #[strum(serialize = "self-calibration failed")]
    #[serde(rename = "self-calibration failed")]
    SelfCalFailed,

    #[strum(serialize = "no calibrated visibility data")]
    #[serde(rename = "no calibrated visibility data")]
    UpstreamDataMissing,

    /// Set during stacking when a chunk's restoring-beam parameters are
    /// outliers.
    #[strum(serialize = "synthesised beam parameters")]
    #[serde(rename = "synthesised beam parameters")]
    SynthesisedBeam,
}

/// The aggregate record of one chunk's imaging run. Persisted to the
/// parameter store when the chunk finishes; the stacking stage only ever
/// reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk: usize,

    /// The last major cycle index reached.
    pub last_major: usize,

    /// The last minor cycle index reached within that major cycle.
    pub last_minor: usize,

    pub success: bool,
    pub reject_reason: Option<RejectReason>,

    /// The restoring beam of the final image, if imaging succeeded.
    pub restoring_beam: Option<RestoringBeam>,

    /// Combination weight: the inverse variance of the final residual.
    /// Normalized to mean 1 across accepted chunks at stacking time.
    pub weight: Option<f64>,

    /// The RMS of the final residual \[Jy/beam\].
    pub rms: Option<f64>,
}

impl ChunkResult {
    fn failed(chunk: usize, reason: RejectReason) -> ChunkResult {
        ChunkResult {
            chunk,
            last_major: 0,
            last_minor: 0,
            success: false,
            reject_reason: Some(reason),
            restoring_beam: None,
            weight: None,
            rms: None,
        }
    }
}

/// Drives the major-cycle loop over all chunks of a beam.
pub struct ContinuumDriver<'a> {
    params: &'a ContinuumParams,
    imaging: &'a dyn ImagingPrimitive,
    probe: &'a dyn StatsProbe,
    noise: &'a dyn NoiseModel,
    solver: &'a dyn GainSolver,
    store: &'a ParamStore,
}

impl<'a> ContinuumDriver<'a> {
    /// Construct a driver, validating the parameters. A validation failure
    /// here is fatal; it means no chunk can produce valid results.
    pub fn new(
        params: &'a ContinuumParams,
        imaging: &'a dyn ImagingPrimitive,
        probe: &'a dyn StatsProbe,
        noise: &'a dyn NoiseModel,
        solver: &'a dyn GainSolver,
        store: &'a ParamStore,
    ) -> Result<ContinuumDriver<'a>, SelfCalError> {
        params.validate()?;
        Ok(ContinuumDriver {
            params,
            imaging,
            probe,
            noise,
            solver,
            store,
        })
    }

    /// Image and self-calibrate every chunk. Chunk-local failures are
    /// recorded on the returned [`ChunkResult`]s; only configuration and
    /// store errors propagate.
    pub fn run(&self, chunks: &[FrequencyChunk]) -> Result<Vec<ChunkResult>, SelfCalError> {
        let pb = make_chunk_progress_bar(chunks.len(), format!("Imaging beam {}", self.params.beam));

        let results = chunks
            .par_iter()
            .map(|chunk| {
                let result = self.process_chunk(chunk);
                pb.inc(1);
                result
            })
            .collect::<Result<Vec<ChunkResult>, SelfCalError>>()?;
        pb.abandon();

        let num_ok = results.iter().filter(|r| r.success).count();
        info!(
            "Beam {}: {}/{} chunks imaged successfully",
            self.params.beam,
            num_ok,
            results.len()
        );
        Ok(results)
    }

    /// Run the full major/minor-cycle loop for one chunk. Never fails for
    /// chunk-local reasons; those are recorded on the result.
    fn process_chunk(&self, chunk: &FrequencyChunk) -> Result<ChunkResult, SelfCalError> {
        let i = chunk.index;
        let result_key = self.key(i, StoreField::ChunkResult);

        // No calibrated visibility data means there is nothing to image.
        if !chunk.visibility.exists() {
            warn!(
                "Chunk {i}: no calibrated visibility data at {}; skipping",
                chunk.visibility.display()
            );
            let result = ChunkResult::failed(i, RejectReason::UpstreamDataMissing);
            self.store.set(result_key, &result)?;
            return Ok(result);
        }

        let workspace = ChunkWorkspace::new(&self.params.beam_dir, chunk);
        workspace.create()?;

        // Idempotence: the store is the authority on "has this been
        // computed"; the final image on disk confirms it.
        if let Ok(prev) = self.store.get::<ChunkResult>(result_key) {
            if prev.success && workspace.image(prev.last_major, prev.last_minor).exists() {
                info!("Chunk {i}: already imaged; skipping");
                return Ok(prev);
            }
        }

        let noise = match self.noise.theoretical_noise(chunk) {
            Ok(noise) => noise,
            Err(e) => {
                warn!("Chunk {i}: no theoretical noise available: {e}");
                let result = ChunkResult::failed(i, RejectReason::UpstreamDataMissing);
                self.store.set(result_key, &result)?;
                return Ok(result);
            }
        };
        let tnt = theoretical_noise_threshold(noise, self.params.nsigma);

        // The schedule always looks one major cycle beyond the last
        // completed self-calibration cycle: this pass images the current
        // state and prepares the threshold for the next solve.
        let last_selfcal = match self.store.get::<usize>(self.key(i, StoreField::SelfCalCycle)) {
            Ok(cycle) => cycle,
            Err(StoreError::KeyNotFound(_)) => 0,
            Err(e) => return Err(e.into()),
        };
        let schedule = DynamicRangeSchedule::generate(self.params, last_selfcal + 2)?;

        let iterator = MinorCycleIterator {
            params: self.params,
            imaging: self.imaging,
            probe: self.probe,
            chunk,
            workspace: &workspace,
        };

        let mut states: Vec<IterationState> = vec![];
        let mut failure: Option<RejectReason> = None;
        let num_major = schedule.major.len();
        for (major, major_schedule) in schedule.major.iter().enumerate() {
            let MajorCycleOutcome {
                states: cycle_states,
                failure: cycle_failure,
            } = iterator.run_major_cycle(major, tnt, &major_schedule.minor);
            states.extend(cycle_states);
            if let Some((stage, reason)) = cycle_failure {
                warn!("Chunk {i}: aborted in major cycle {major} at the {stage} stage: {reason}");
                failure = Some(reason);
                break;
            }

            // Self-calibrate between major cycles; the last pass is the
            // continuum image itself. A failed solve is terminal for this
            // chunk, not the run.
            if major + 1 < num_major {
                let (uvmin, uvmax, solint) = self.params.selfcal_settings(major);
                let model = workspace.model(major, self.params.num_minor_cycles - 1);
                match self.solver.solve_gains(
                    &chunk.visibility,
                    &model,
                    (uvmin, uvmax),
                    solint,
                    self.params.selfcal_mode,
                ) {
                    Ok(()) => {
                        self.store
                            .set(self.key(i, StoreField::SelfCalCycle), &major)?;
                        info!(
                            "Chunk {i}: self-calibration cycle {major} solved \
                             (uv {uvmin}-{uvmax} klambda, solint {solint} min)"
                        );
                    }
                    Err(e) => {
                        warn!("Chunk {i}: self-calibration cycle {major} failed: {e}");
                        failure = Some(RejectReason::SelfCalFailed);
                        break;
                    }
                }
            }
        }

        let result = self.build_result(chunk, &workspace, &states, failure);
        self.store.set(result_key, &result)?;
        Ok(result)
    }

    /// Assemble the chunk's final record from its iteration states.
    fn build_result(
        &self,
        chunk: &FrequencyChunk,
        workspace: &ChunkWorkspace,
        states: &[IterationState],
        failure: Option<RejectReason>,
    ) -> ChunkResult {
        let i = chunk.index;
        let last = match states.last() {
            Some(last) => last,
            None => {
                return ChunkResult::failed(
                    i,
                    failure.unwrap_or(RejectReason::DirtyImageInvalid),
                )
            }
        };

        if let Some(reason) = failure {
            let mut result = ChunkResult::failed(i, reason);
            result.last_major = last.major;
            result.last_minor = last.minor;
            return result;
        }

        // Imaging succeeded; read the restoring beam of the final image and
        // derive the combination weight from the final residual.
        let final_image = workspace.image(last.major, last.minor);
        let restoring_beam = match self.imaging.restoring_beam(&final_image) {
            Ok(beam) => beam,
            Err(e) => {
                warn!("Chunk {i}: could not read the final restoring beam: {e}");
                let mut result = ChunkResult::failed(i, RejectReason::ImageInvalid);
                result.last_major = last.major;
                result.last_minor = last.minor;
                return result;
            }
        };
        let rms = last
            .residual_stats
            .map(|s| s.stddev)
            .unwrap_or(f64::NAN);

        ChunkResult {
            chunk: i,
            last_major: last.major,
            last_minor: last.minor,
            success: true,
            reject_reason: None,
            restoring_beam: Some(restoring_beam),
            weight: Some(1.0 / (rms * rms)),
            rms: Some(rms),
        }
    }

    fn key(&self, chunk: usize, field: StoreField) -> StoreKey {
        StoreKey {
            beam: self.params.beam,
            chunk: Some(chunk),
            field,
        }
    }
}

/// Convenience function to make a progress bar over chunks.
fn make_chunk_progress_bar(num_chunks: usize, message: String) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(num_chunks as _),
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message(message)
}
