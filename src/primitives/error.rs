// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors from external-primitive invocations and artifact validation.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrimitiveError {
    #[error("Expected artifact '{0}' was not produced")]
    MissingArtifact(PathBuf),

    #[error("{task} failed: {message}")]
    TaskFailed {
        task: &'static str,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A sanity-bound check failure on image statistics.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum BoundsViolation {
    #[error("Image standard deviation is not a real number ({stddev})")]
    StddevNotFinite { stddev: f64 },

    #[error("Image maximum {max} exceeds the sanity ceiling {ceiling}")]
    MaxTooHigh { max: f64, ceiling: f64 },

    #[error("Image minimum {min} is below the sanity floor {floor}")]
    MinTooLow { min: f64, floor: f64 },
}
