// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pure functions computing the clean/mask/noise thresholds that steer each
//! minor cycle. No state, no I/O; everything the minor-cycle iterator needs
//! to decide how deep to clean is derived here from image statistics and the
//! cycle indices.

#[cfg(test)]
mod tests;

use strum_macros::Display;

/// Which of the three candidate thresholds won the comparison in
/// [`mask_threshold`]. Only used for diagnostics and logging, never for
/// control flow.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum MaskThresholdKind {
    #[strum(serialize = "Theoretical noise threshold")]
    Theoretical,

    #[strum(serialize = "Noise threshold")]
    Noise,

    #[strum(serialize = "Dynamic range threshold")]
    DynamicRange,
}

/// The deepest level any clean should ever reach: `nsigma` times the
/// theoretical noise of the dataset. `noise` must be non-negative and
/// `nsigma` positive.
pub fn theoretical_noise_threshold(noise: f64, nsigma: f64) -> f64 {
    nsigma * noise
}

/// A noise threshold that descends as the minor- and major-cycle indices
/// grow, so that later cycles clean deeper into the map.
///
/// `c0` is a fixed positive configuration constant; the caller guarantees it
/// is non-zero.
pub fn noise_threshold(imax: f64, minor_cycle: usize, major_cycle: usize, c0: f64) -> f64 {
    imax / ((c0 + minor_cycle as f64 * c0) * (major_cycle + 1) as f64)
}

/// The threshold implied by this cycle's dynamic-range target: the image
/// maximum divided by the target.
///
/// A dynamic range of exactly 0 is treated as "undefined", not "infinite
/// depth"; `dynamic_range_minimum` is substituted instead.
pub fn dynamic_range_threshold(
    imax: f64,
    dynamic_range: f64,
    dynamic_range_minimum: f64,
) -> f64 {
    let dynamic_range = if dynamic_range == 0.0 {
        dynamic_range_minimum
    } else {
        dynamic_range
    };
    imax / dynamic_range
}

/// The mask threshold is the most conservative (largest) of the three
/// candidate thresholds. The returned label says which one won; ties resolve
/// to the first in the order [theoretical, noise, dynamic range].
pub fn mask_threshold(
    theoretical_noise_threshold: f64,
    noise_threshold: f64,
    dynamic_range_threshold: f64,
) -> (f64, MaskThresholdKind) {
    let candidates = [
        (theoretical_noise_threshold, MaskThresholdKind::Theoretical),
        (noise_threshold, MaskThresholdKind::Noise),
        (dynamic_range_threshold, MaskThresholdKind::DynamicRange),
    ];
    // Stable argmax: a later candidate must be strictly bigger to win.
    let mut winner = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.0 > winner.0 {
            winner = *candidate;
        }
    }
    winner
}

/// How deep the clean goes below the masking threshold. `c1` is a configured
/// constant >= 1.
pub fn clean_cutoff(mask_threshold: f64, c1: f64) -> f64 {
    mask_threshold / c1
}
