// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn median_odd_and_even() {
    assert_abs_diff_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    assert_abs_diff_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    assert_abs_diff_eq!(median(&[5.0]), 5.0);
}

#[test]
fn median_of_empty_is_nan() {
    assert!(median(&[]).is_nan());
}

#[test]
fn mad_of_constant_slice_is_zero() {
    assert_abs_diff_eq!(median_absolute_deviation(&[2.0, 2.0, 2.0]), 0.0);
}

#[test]
fn mad_simple() {
    // median = 2, |dev| = [1, 0, 1, 6] -> median 1.
    assert_abs_diff_eq!(median_absolute_deviation(&[1.0, 2.0, 3.0, 8.0]), 1.0);
}

#[test]
fn mean_simple() {
    assert_abs_diff_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
}
