// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Self-calibration and continuum imaging engine for the Apertif imaging
//! surveys.
//!
//! This crate drives the nested major/minor-cycle imaging loop: it computes
//! clean thresholds and dynamic-range schedules, runs the minor-cycle state
//! machine against an external imaging primitive, self-calibrates between
//! major cycles, and finally stacks the per-chunk images into one continuum
//! image per beam. The imaging, gain-solving and statistics engines
//! themselves are external collaborators behind traits in [`primitives`].

pub mod chunks;
pub mod constants;
mod error;
pub(crate) mod math;
pub mod params;
pub mod primitives;
pub mod schedule;
pub mod selfcal;
pub mod stacking;
pub mod store;
pub mod thresholds;

#[cfg(test)]
pub(crate) mod tests;

// Re-exports.
pub use chunks::{ChunkWorkspace, FrequencyChunk};
pub use error::ApercalError;
pub use params::ContinuumParams;
pub use primitives::{
    Artifact, GainSolver, ImageStats, ImagingPrimitive, NoiseModel, RestoringBeam, SanityBounds,
    StatsProbe,
};
pub use selfcal::{ChunkResult, ContinuumDriver, RejectReason};
pub use stacking::StackedImage;
pub use store::ParamStore;

use crossbeam_utils::atomic::AtomicCell;

/// Should progress bars be drawn while the driver runs? Defaults to false;
/// set before constructing a [`ContinuumDriver`].
pub static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
