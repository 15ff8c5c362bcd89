// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameters of the continuum/self-calibration engine.
//!
//! Every recognized option is enumerated here explicitly; components receive
//! the parsed, validated struct by reference. Invalid parameters are
//! configuration errors and abort the whole run before any chunk is touched.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    constants::*,
    primitives::{InvertSettings, SanityBounds, SolveMode},
    schedule::GrowthFunction,
};

/// Parameters needed to run the continuum/self-calibration engine on one
/// beam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuumParams {
    /// The Apertif compound beam this run images.
    pub beam: u8,

    /// The beam-level working directory; each chunk gets a subdirectory of
    /// this.
    pub beam_dir: PathBuf,

    /// The number of minor cycles per major cycle.
    pub num_minor_cycles: usize,

    /// Controls how quickly the noise threshold descends with minor- and
    /// major-cycle index. Must be positive.
    pub c0: f64,

    /// How much deeper cleaning goes below the mask threshold. Must be >= 1.
    pub c1: f64,

    /// The dynamic-range target of major cycle 0.
    pub dr_init: f64,

    /// The dynamic-range growth factor between major cycles. Must be >= 1,
    /// so that the major-cycle targets never decrease.
    pub dr0: f64,

    /// The floor applied when a minor-cycle schedule starts at a
    /// dynamic-range target of exactly 0.
    pub minor_cycle0_dr: f64,

    /// Sigma multiplier for the theoretical noise threshold.
    pub nsigma: f64,

    /// Growth law of the major-cycle dynamic-range targets. Only `square`
    /// is supported.
    pub major_growth: GrowthFunction,

    /// Growth law of the minor-cycle dynamic-range targets.
    pub minor_growth: GrowthFunction,

    /// Absolute sanity bounds every image product is checked against.
    pub sanity_bounds: SanityBounds,

    /// Gridding/weighting settings for `invert`.
    pub invert: InvertSettings,

    /// The maximum number of clean iterations per minor cycle.
    pub clean_max_iterations: u32,

    /// Per-major-cycle minimum uv distance for self-calibration
    /// \[klambda\]. Major cycles beyond the table use its last entry.
    pub selfcal_uvmin: Vec<f64>,

    /// Per-major-cycle maximum uv distance for self-calibration
    /// \[klambda\].
    pub selfcal_uvmax: Vec<f64>,

    /// Per-major-cycle gain solution interval \[minutes\].
    pub selfcal_solint: Vec<f64>,

    /// The gain-solution mode of the self-calibration primitive.
    pub selfcal_mode: SolveMode,

    /// Median-absolute-deviation threshold multiplier for rejecting chunks
    /// with outlier restoring-beam parameters during stacking.
    pub beam_mad_threshold: f64,

    /// Safety factor applied to the common restoring beam axes.
    pub beam_safety_factor: f64,
}

impl Default for ContinuumParams {
    /// The Apertif imaging-survey defaults.
    fn default() -> ContinuumParams {
        ContinuumParams {
            beam: 0,
            beam_dir: PathBuf::from("."),
            num_minor_cycles: 5,
            c0: DEFAULT_C0,
            c1: DEFAULT_C1,
            dr_init: DEFAULT_DR_INIT,
            dr0: DEFAULT_DR0,
            minor_cycle0_dr: DEFAULT_MINOR_CYCLE0_DR,
            nsigma: DEFAULT_NSIGMA,
            major_growth: GrowthFunction::Square,
            minor_growth: GrowthFunction::Square,
            sanity_bounds: SanityBounds {
                max_ceiling: DEFAULT_MAX_SANITY,
                min_floor: DEFAULT_MIN_SANITY,
            },
            invert: InvertSettings {
                image_size: 1025,
                cell_size: 4.0,
                robust: -2.0,
            },
            clean_max_iterations: 100_000,
            selfcal_uvmin: vec![0.35, 0.25, 0.15, 0.1, 0.05],
            selfcal_uvmax: vec![3.0, 3.0, 3.0, 3.0, 3.0],
            selfcal_solint: vec![10.0, 5.0, 3.0, 2.0, 1.0],
            selfcal_mode: SolveMode::Phase,
            beam_mad_threshold: DEFAULT_BEAM_MAD_THRESHOLD,
            beam_safety_factor: DEFAULT_BEAM_SAFETY_FACTOR,
        }
    }
}

impl ContinuumParams {
    /// Validate the parameters. Called once at driver construction; any
    /// error here means the run cannot produce valid results for any chunk.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.num_minor_cycles == 0 {
            return Err(ParamsError::NoMinorCycles);
        }
        if !(self.c0 > 0.0) {
            return Err(ParamsError::BadValue {
                name: "c0",
                message: format!("must be positive, got {}", self.c0),
            });
        }
        if !(self.c1 >= 1.0) {
            return Err(ParamsError::BadValue {
                name: "c1",
                message: format!("must be >= 1, got {}", self.c1),
            });
        }
        if !(self.dr_init > 0.0) {
            return Err(ParamsError::BadValue {
                name: "dr_init",
                message: format!("must be positive, got {}", self.dr_init),
            });
        }
        if !(self.dr0 >= 1.0) {
            return Err(ParamsError::BadValue {
                name: "dr0",
                message: format!(
                    "must be >= 1 so the major-cycle targets never decrease, got {}",
                    self.dr0
                ),
            });
        }
        if !(self.minor_cycle0_dr > 0.0) {
            return Err(ParamsError::BadValue {
                name: "minor_cycle0_dr",
                message: format!("must be positive, got {}", self.minor_cycle0_dr),
            });
        }
        if !(self.nsigma > 0.0) {
            return Err(ParamsError::BadValue {
                name: "nsigma",
                message: format!("must be positive, got {}", self.nsigma),
            });
        }
        if self.major_growth != GrowthFunction::Square {
            return Err(ParamsError::UnsupportedMajorGrowth(self.major_growth));
        }
        if self.selfcal_uvmin.is_empty()
            || self.selfcal_uvmax.is_empty()
            || self.selfcal_solint.is_empty()
        {
            return Err(ParamsError::EmptySelfCalTable);
        }
        if !(self.beam_mad_threshold > 0.0) {
            return Err(ParamsError::BadValue {
                name: "beam_mad_threshold",
                message: format!("must be positive, got {}", self.beam_mad_threshold),
            });
        }
        if !(self.beam_safety_factor >= 1.0) {
            return Err(ParamsError::BadValue {
                name: "beam_safety_factor",
                message: format!("must be >= 1, got {}", self.beam_safety_factor),
            });
        }
        Ok(())
    }

    /// The self-calibration settings for a major cycle: `(uvmin, uvmax,
    /// solution interval)`. Cycles deeper than the configured tables use the
    /// last entry.
    pub(crate) fn selfcal_settings(&self, major: usize) -> (f64, f64, f64) {
        let pick = |table: &[f64]| -> f64 {
            table
                .get(major)
                .copied()
                .unwrap_or_else(|| *table.last().expect("tables validated non-empty"))
        };
        (
            pick(&self.selfcal_uvmin),
            pick(&self.selfcal_uvmax),
            pick(&self.selfcal_solint),
        )
    }
}

/// An invalid engine configuration. Fatal: aborts the whole run.
#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("The number of minor cycles must be at least 1")]
    NoMinorCycles,

    #[error("Parameter '{name}' is invalid: {message}")]
    BadValue {
        name: &'static str,
        message: String,
    },

    #[error("Growth function '{0}' is not supported for major cycles; only 'square' is")]
    UnsupportedMajorGrowth(GrowthFunction),

    #[error("The self-calibration uvmin/uvmax/solint tables must not be empty")]
    EmptySelfCalTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ContinuumParams::default().validate().unwrap();
    }

    #[test]
    fn non_square_major_growth_is_fatal() {
        let params = ContinuumParams {
            major_growth: GrowthFunction::Power,
            ..ContinuumParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ParamsError::UnsupportedMajorGrowth(GrowthFunction::Power))
        ));
    }

    #[test]
    fn zero_c0_is_fatal() {
        let params = ContinuumParams {
            c0: 0.0,
            ..ContinuumParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ParamsError::BadValue { name: "c0", .. })
        ));
    }

    #[test]
    fn fractional_dr0_is_fatal() {
        // dr0 < 1 would make the major-cycle schedule decrease, so later
        // cycles would clean shallower than earlier ones.
        let params = ContinuumParams {
            dr0: 0.5,
            ..ContinuumParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ParamsError::BadValue { name: "dr0", .. })
        ));
    }

    #[test]
    fn selfcal_settings_clamp_to_last_entry() {
        let params = ContinuumParams::default();
        let deep = params.selfcal_settings(99);
        assert_eq!(deep.0, *params.selfcal_uvmin.last().unwrap());
        assert_eq!(deep.2, *params.selfcal_solint.last().unwrap());
        let first = params.selfcal_settings(0);
        assert_eq!(first.0, params.selfcal_uvmin[0]);
    }
}
