//! Integration tests for ColorMapper

mod common;
use common::*;

use rgb_dispenser::{
    ActuationPlan, ColorMapper, DominantColor, MappingError, denormalize, normalize,
};

#[test]
fn saturated_red_yields_full_red_and_motor() {
    let mapper = ColorMapper::new(5.0).unwrap();
    let normalized = mapper.normalize(DominantColor::new(255, 0, 0)).unwrap();
    let plan = mapper.plan(normalized).unwrap();

    assert_eq!(plan, ActuationPlan::new(5.0, 0.0, 0.0, 5.0).unwrap());
    assert_eq!(plan.motor(), 5.0);
}

#[test]
fn mid_gray_yields_about_two_and_a_half_seconds_per_valve() {
    let mapper = ColorMapper::new(5.0).unwrap();
    let normalized = mapper.normalize(DominantColor::new(128, 128, 128)).unwrap();
    let plan = mapper.plan(normalized).unwrap();

    assert!(approx_eq(plan.red(), 2.51));
    assert!(approx_eq(plan.green(), 2.51));
    assert!(approx_eq(plan.blue(), 2.51));
    assert!(approx_eq(plan.motor(), 7.53));
}

#[test]
fn motor_is_exact_sum_for_every_plan() {
    let mapper = ColorMapper::default();
    for (r, g, b) in [(0, 0, 0), (1, 2, 3), (17, 200, 99), (255, 255, 255), (128, 64, 250)] {
        let plan = mapper
            .plan(normalize(DominantColor::new(r, g, b)).unwrap())
            .unwrap();
        assert_eq!(plan.motor(), plan.red() + plan.green() + plan.blue());
        assert!(plan.red() <= 5.0 && plan.green() <= 5.0 && plan.blue() <= 5.0);
        assert!(plan.motor() <= 15.0);
        assert!(plan.red() >= 0.0 && plan.green() >= 0.0 && plan.blue() >= 0.0);
    }
}

#[test]
fn normalize_stays_in_unit_range_and_round_trips() {
    for value in 0..=255 {
        let color = DominantColor::new(value, 255 - value, value / 2);
        let normalized = normalize(color).unwrap();

        for channel in [normalized.red, normalized.green, normalized.blue] {
            assert!((0.0..=1.0).contains(&channel));
        }
        assert_eq!(denormalize(normalized), color);
    }
}

#[test]
fn durations_are_not_rounded() {
    let plan = ColorMapper::new(1.0)
        .unwrap()
        .plan(normalize(DominantColor::new(1, 0, 0)).unwrap())
        .unwrap();
    assert_eq!(plan.red(), 1.0 / 255.0);
}

#[test]
fn plans_cannot_exceed_the_base_duration() {
    assert!(matches!(
        ActuationPlan::new(1000.0, 0.0, 0.0, 5.0),
        Err(MappingError::DurationOutOfRange {
            channel: "red",
            ..
        })
    ));
    assert!(matches!(
        ActuationPlan::new(5.0, 5.0, 5.01, 5.0),
        Err(MappingError::DurationOutOfRange {
            channel: "blue",
            ..
        })
    ));

    let brightest = ColorMapper::new(2.5)
        .unwrap()
        .plan(normalize(DominantColor::new(255, 255, 255)).unwrap())
        .unwrap();
    assert_eq!(brightest.motor(), 7.5);
    assert_eq!(brightest.base_duration_s(), 2.5);
}
