// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Threshold calculator tests.

use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn theoretical_noise_threshold_scales() {
    assert_abs_diff_eq!(theoretical_noise_threshold(1e-4, 30.0), 3e-3);
    assert_abs_diff_eq!(theoretical_noise_threshold(0.0, 30.0), 0.0);
}

#[test]
fn noise_threshold_decreases_with_minor_cycle() {
    let imax = 1.0;
    let c0 = 10.2;
    let mut last = f64::INFINITY;
    for minc in 0..5 {
        let t = noise_threshold(imax, minc, 0, c0);
        assert!(t < last, "threshold did not decrease at minor cycle {minc}");
        last = t;
    }
}

#[test]
fn noise_threshold_decreases_with_major_cycle() {
    let imax = 1.0;
    let c0 = 10.2;
    let mut last = f64::INFINITY;
    for majc in 0..5 {
        let t = noise_threshold(imax, 2, majc, c0);
        assert!(t < last, "threshold did not decrease at major cycle {majc}");
        last = t;
    }
}

#[test]
fn noise_threshold_formula() {
    // imax / ((c0 + minc*c0) * (majc+1))
    assert_abs_diff_eq!(noise_threshold(10.0, 1, 1, 5.0), 10.0 / (10.0 * 2.0));
}

#[test]
fn dynamic_range_threshold_simple() {
    assert_abs_diff_eq!(dynamic_range_threshold(100.0, 50.0, 10.0), 2.0);
}

#[test]
fn dynamic_range_of_zero_is_substituted() {
    // A dynamic range of 0 means "undefined", not "infinite depth".
    assert_abs_diff_eq!(dynamic_range_threshold(100.0, 0.0, 10.0), 10.0);
}

#[test]
fn mask_threshold_picks_the_maximum() {
    let (t, kind) = mask_threshold(0.03, 0.01, 0.05);
    assert_abs_diff_eq!(t, 0.05);
    assert_eq!(kind, MaskThresholdKind::DynamicRange);
    assert_eq!(kind.to_string(), "Dynamic range threshold");

    let (t, kind) = mask_threshold(0.5, 0.01, 0.05);
    assert_abs_diff_eq!(t, 0.5);
    assert_eq!(kind, MaskThresholdKind::Theoretical);

    let (t, kind) = mask_threshold(0.01, 0.5, 0.05);
    assert_abs_diff_eq!(t, 0.5);
    assert_eq!(kind, MaskThresholdKind::Noise);
}

#[test]
fn mask_threshold_ties_resolve_in_order() {
    // All equal: theoretical wins.
    let (_, kind) = mask_threshold(0.1, 0.1, 0.1);
    assert_eq!(kind, MaskThresholdKind::Theoretical);

    // Noise and dynamic range tied above theoretical: noise wins.
    let (_, kind) = mask_threshold(0.05, 0.1, 0.1);
    assert_eq!(kind, MaskThresholdKind::Noise);
}

#[test]
fn clean_cutoff_is_linear_in_mask_threshold() {
    let c1 = 5.0;
    let a = clean_cutoff(0.2, c1);
    let b = clean_cutoff(0.4, c1);
    assert_abs_diff_eq!(b, 2.0 * a);
    assert_abs_diff_eq!(a, 0.04);
}
