// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Named constants used throughout the engine. These are the Apertif survey
//! defaults; all of them can be overridden via
//! [`ContinuumParams`](crate::params::ContinuumParams).

/// Upper sanity bound on any image maximum \[Jy/beam\]. A clean that diverges
/// produces pixel values far above anything physical for an Apertif field.
pub const DEFAULT_MAX_SANITY: f64 = 10000.0;

/// Lower sanity bound on any image minimum \[Jy/beam\].
pub const DEFAULT_MIN_SANITY: f64 = -10.0;

/// Dynamic-range floor for the very first minor cycle of the very first major
/// cycle. The minor-cycle schedules start from the previous major cycle's
/// target, which is 0 for major cycle 0; a dynamic-range target of 0 is
/// undefined, so it is clamped to this value.
pub const DEFAULT_MINOR_CYCLE0_DR: f64 = 5.0;

/// Default `c0`: controls how quickly the noise threshold descends with
/// minor- and major-cycle index.
pub const DEFAULT_C0: f64 = 10.2;

/// Default `c1`: how much deeper cleaning goes below the mask threshold.
pub const DEFAULT_C1: f64 = 5.0;

/// Default initial dynamic-range target for major cycle 0.
pub const DEFAULT_DR_INIT: f64 = 8.0;

/// Default dynamic-range growth factor between major cycles.
pub const DEFAULT_DR0: f64 = 2.0;

/// Default sigma multiplier for the theoretical noise threshold.
pub const DEFAULT_NSIGMA: f64 = 45.0;

/// Safety factor applied to the common restoring beam axes when stacking, so
/// that no contributing chunk needs to be convolved to a beam smaller than
/// its own.
pub const DEFAULT_BEAM_SAFETY_FACTOR: f64 = 1.02;

/// Default median-absolute-deviation threshold multiplier for rejecting
/// chunks with outlier restoring-beam parameters.
pub const DEFAULT_BEAM_MAD_THRESHOLD: f64 = 3.0;

/// Scales a median absolute deviation to a Gaussian standard-deviation
/// estimate.
pub const MAD_TO_SIGMA: f64 = 1.4826;
