// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors when generating dynamic-range schedules. These are configuration
//! errors; they abort the whole run, not just one chunk.

use thiserror::Error;

use super::GrowthFunction;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Growth function '{0}' is not supported for major cycles; only 'square' is")]
    UnsupportedMajorGrowth(GrowthFunction),

    #[error("The number of major cycles must be at least 1")]
    NoMajorCycles,

    #[error("The number of minor cycles must be at least 1")]
    NoMinorCycles,

    #[error(
        "Major cycle index {major_index} is out of range for a schedule of {n_major_cycles} major cycles"
    )]
    MajorIndexOutOfRange {
        major_index: usize,
        n_major_cycles: usize,
    },
}
