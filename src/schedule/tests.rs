// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dynamic-range schedule tests.

use std::str::FromStr;

use approx::assert_abs_diff_eq;

use super::*;
use crate::params::ContinuumParams;

#[test]
fn major_schedule_is_geometric() {
    let s = dr_major_schedule(8.0, 2.0, 4, GrowthFunction::Square).unwrap();
    assert_eq!(s.len(), 4);
    assert_abs_diff_eq!(s[0], 8.0);
    assert_abs_diff_eq!(s[1], 16.0);
    assert_abs_diff_eq!(s[2], 32.0);
    assert_abs_diff_eq!(s[3], 64.0);
}

#[test]
fn major_schedule_is_pure() {
    let a = dr_major_schedule(8.0, 2.0, 5, GrowthFunction::Square).unwrap();
    let b = dr_major_schedule(8.0, 2.0, 5, GrowthFunction::Square).unwrap();
    assert_eq!(a, b);
}

#[test]
fn major_schedule_rejects_non_square_growth() {
    let result = dr_major_schedule(8.0, 2.0, 4, GrowthFunction::Linear);
    assert!(matches!(
        result,
        Err(ScheduleError::UnsupportedMajorGrowth(GrowthFunction::Linear))
    ));
    let result = dr_major_schedule(8.0, 2.0, 4, GrowthFunction::Power);
    assert!(matches!(
        result,
        Err(ScheduleError::UnsupportedMajorGrowth(GrowthFunction::Power))
    ));
}

#[test]
fn major_schedule_rejects_zero_cycles() {
    assert!(matches!(
        dr_major_schedule(8.0, 2.0, 0, GrowthFunction::Square),
        Err(ScheduleError::NoMajorCycles)
    ));
}

#[test]
fn minor_schedule_first_cycle_is_clamped() {
    let dr_major = dr_major_schedule(8.0, 2.0, 3, GrowthFunction::Square).unwrap();
    for growth in [
        GrowthFunction::Square,
        GrowthFunction::Power,
        GrowthFunction::Linear,
    ] {
        let minor = dr_minor_schedule(&dr_major, 0, 5, growth, 5.0).unwrap();
        assert_ne!(*minor.first(), 0.0, "{growth} returned a 0 first target");
        // The square and linear laws start at exactly the previous target
        // (0 for major cycle 0), so the clamp must have kicked in.
        if growth != GrowthFunction::Power {
            assert_abs_diff_eq!(*minor.first(), 5.0);
        }
    }
}

#[test]
fn minor_schedule_ends_at_the_major_target() {
    let dr_major = dr_major_schedule(8.0, 2.0, 3, GrowthFunction::Square).unwrap();
    for growth in [
        GrowthFunction::Square,
        GrowthFunction::Power,
        GrowthFunction::Linear,
    ] {
        for majc in 0..3 {
            let minor = dr_minor_schedule(&dr_major, majc, 4, growth, 5.0).unwrap();
            assert_abs_diff_eq!(*minor.last(), dr_major[majc], epsilon = 1e-12);
        }
    }
}

#[test]
fn minor_schedule_is_monotonic() {
    let dr_major = dr_major_schedule(8.0, 2.0, 3, GrowthFunction::Square).unwrap();
    for growth in [
        GrowthFunction::Square,
        GrowthFunction::Power,
        GrowthFunction::Linear,
    ] {
        let minor = dr_minor_schedule(&dr_major, 1, 6, growth, 5.0).unwrap();
        for pair in minor.windows(2) {
            assert!(
                pair[1] >= pair[0],
                "{growth} schedule is not monotonic: {minor:?}"
            );
        }
    }
}

#[test]
fn minor_schedule_starts_from_previous_major_target() {
    let dr_major = dr_major_schedule(8.0, 2.0, 3, GrowthFunction::Square).unwrap();
    let minor = dr_minor_schedule(&dr_major, 2, 5, GrowthFunction::Linear, 5.0).unwrap();
    assert_abs_diff_eq!(*minor.first(), dr_major[1]);
}

#[test]
fn single_minor_cycle_jumps_to_target() {
    let dr_major = dr_major_schedule(8.0, 2.0, 2, GrowthFunction::Square).unwrap();
    let minor = dr_minor_schedule(&dr_major, 1, 1, GrowthFunction::Square, 5.0).unwrap();
    assert_eq!(minor.len(), 1);
    assert_abs_diff_eq!(*minor.first(), 16.0);
}

#[test]
fn growth_function_parses_from_config_names() {
    assert_eq!(
        GrowthFunction::from_str("square").unwrap(),
        GrowthFunction::Square
    );
    assert_eq!(
        GrowthFunction::from_str("power").unwrap(),
        GrowthFunction::Power
    );
    assert_eq!(
        GrowthFunction::from_str("linear").unwrap(),
        GrowthFunction::Linear
    );
    assert!(GrowthFunction::from_str("cubic").is_err());
}

#[test]
fn nested_schedule_has_expected_shape() {
    let params = ContinuumParams {
        num_minor_cycles: 3,
        ..ContinuumParams::default()
    };
    let schedule = DynamicRangeSchedule::generate(&params, 4).unwrap();
    assert_eq!(schedule.major.len(), 4);
    for major in &schedule.major {
        assert_eq!(major.minor.len(), 3);
        assert_abs_diff_eq!(*major.minor.last(), major.target, epsilon = 1e-12);
    }
    // Major-cycle targets are non-decreasing by construction.
    for pair in schedule.major.windows(2) {
        assert!(pair[1].target >= pair[0].target);
    }
}
