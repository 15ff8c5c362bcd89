// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dynamic-range schedules.
//!
//! Before any imaging starts for a chunk, the full nested schedule of
//! dynamic-range targets is computed: one target per major cycle, and within
//! each major cycle an interpolated sequence of targets, one per minor
//! cycle. The minor-cycle thresholds ramp from the previous major cycle's
//! target up to the current one, so each major cycle picks up cleaning where
//! the last one stopped.

mod error;
#[cfg(test)]
mod tests;

pub use error::ScheduleError;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use vec1::Vec1;

use crate::params::ContinuumParams;

/// How dynamic-range targets grow from one cycle to the next.
#[derive(
    Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum GrowthFunction {
    /// Major cycles: `dr_init * dr0^m`. Minor cycles: quadratic ease-in from
    /// the previous major-cycle target to the current one.
    #[strum(serialize = "square")]
    #[serde(rename = "square")]
    Square,

    /// Minor cycles only: reversed exponential; the targets rise quickly at
    /// first and flatten towards the current major-cycle target.
    #[strum(serialize = "power")]
    #[serde(rename = "power")]
    Power,

    /// Minor cycles only: evenly spaced targets.
    #[strum(serialize = "linear")]
    #[serde(rename = "linear")]
    Linear,
}

/// The dynamic-range targets for one major cycle and its minor cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct MajorCycleSchedule {
    /// This major cycle's dynamic-range target.
    pub target: f64,

    /// One dynamic-range target per minor cycle, ramping from the previous
    /// major cycle's target to `target`.
    pub minor: Vec1<f64>,
}

/// The full nested schedule for one chunk. Recomputed per chunk, because the
/// number of major cycles depends on how many self-calibration cycles that
/// chunk has already completed.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRangeSchedule {
    pub major: Vec1<MajorCycleSchedule>,
}

impl DynamicRangeSchedule {
    /// Generate the full nested schedule for `n_major_cycles` major cycles.
    pub fn generate(
        params: &ContinuumParams,
        n_major_cycles: usize,
    ) -> Result<DynamicRangeSchedule, ScheduleError> {
        let targets = dr_major_schedule(
            params.dr_init,
            params.dr0,
            n_major_cycles,
            params.major_growth,
        )?;
        let major = targets
            .iter()
            .enumerate()
            .map(|(majc, &target)| {
                let minor = dr_minor_schedule(
                    &targets,
                    majc,
                    params.num_minor_cycles,
                    params.minor_growth,
                    params.minor_cycle0_dr,
                )?;
                Ok(MajorCycleSchedule { target, minor })
            })
            .collect::<Result<Vec<_>, ScheduleError>>()?;
        // `targets` is non-empty, so this can't fail.
        Ok(DynamicRangeSchedule {
            major: Vec1::try_from_vec(major).expect("at least one major cycle"),
        })
    }
}

/// The per-major-cycle dynamic-range targets: `dr_init * dr0^m` for `m` in
/// `0..n_major_cycles`. Only [`GrowthFunction::Square`] is supported here;
/// anything else is a configuration error.
pub fn dr_major_schedule(
    dr_init: f64,
    dr0: f64,
    n_major_cycles: usize,
    growth: GrowthFunction,
) -> Result<Vec1<f64>, ScheduleError> {
    match growth {
        GrowthFunction::Square => (),
        other => return Err(ScheduleError::UnsupportedMajorGrowth(other)),
    }
    let targets: Vec<f64> = (0..n_major_cycles)
        .map(|m| dr_init * dr0.powi(m as i32))
        .collect();
    Vec1::try_from_vec(targets).map_err(|_| ScheduleError::NoMajorCycles)
}

/// Interpolate `n_minor_cycles` dynamic-range targets for major cycle
/// `major_index`, ramping from the previous major cycle's target (0 for the
/// first major cycle) to the current one.
///
/// If the first interpolated value is exactly 0 (always the case for major
/// cycle 0 with the square and linear laws), it is clamped to
/// `minor_cycle0_dr`, so that an undefined dynamic-range target of 0 is never
/// handed to the threshold calculator.
pub fn dr_minor_schedule(
    dr_major: &[f64],
    major_index: usize,
    n_minor_cycles: usize,
    growth: GrowthFunction,
    minor_cycle0_dr: f64,
) -> Result<Vec1<f64>, ScheduleError> {
    let current = *dr_major
        .get(major_index)
        .ok_or(ScheduleError::MajorIndexOutOfRange {
            major_index,
            n_major_cycles: dr_major.len(),
        })?;
    let previous = if major_index == 0 {
        0.0
    } else {
        dr_major[major_index - 1]
    };

    let mut targets: Vec<f64> = if n_minor_cycles == 1 {
        // A single minor cycle goes straight to the major-cycle target.
        vec![current]
    } else {
        (0..n_minor_cycles)
            .map(|i| previous + (current - previous) * growth.fraction(i, n_minor_cycles))
            .collect()
    };

    match targets.first_mut() {
        Some(first) if *first == 0.0 => *first = minor_cycle0_dr,
        Some(_) => (),
        None => return Err(ScheduleError::NoMinorCycles),
    }

    Vec1::try_from_vec(targets).map_err(|_| ScheduleError::NoMinorCycles)
}

impl GrowthFunction {
    /// The interpolation fraction for minor cycle `i` of `n` (`n >= 2`):
    /// 0 at `i == 0`, 1 at `i == n - 1`, monotonically non-decreasing.
    fn fraction(self, i: usize, n: usize) -> f64 {
        let i = i as f64;
        let last = (n - 1) as f64;
        match self {
            GrowthFunction::Square => (i / last).powi(2),
            GrowthFunction::Linear => i / last,
            // Reversed exponential: front-loaded growth, flattening towards
            // the end. The legacy formula this replaces was documented as
            // approximate; see DESIGN.md.
            GrowthFunction::Power => {
                (1.0 - 2.0_f64.powf(-i)) / (1.0 - 2.0_f64.powf(-last))
            }
        }
    }
}
