//! Property tests for the profile generator and parameter codec.

use proptest::prelude::*;

use axis_motion::param::{AccelUnit, ParamStore, ProfileMode};
use axis_motion::profile::{generate, MoveSpec, ProfilePriority, ShapeLimits};
use axis_motion::{UnitRatio, Units, UnitsPerSec};

fn limits(mode: ProfileMode, max_vel: f64) -> ShapeLimits {
    ShapeLimits {
        mode,
        min_vel: 0.0,
        max_vel,
        jerk_accel_ratio: 0.5,
        jerk_decel_ratio: 0.5,
        accel_unit: AccelUnit::Rate,
        priority: ProfilePriority::Velocity,
        patched_triangle: true,
    }
}

proptest! {
    /// The integral of every generated curve equals the commanded
    /// distance, for every profile shape.
    #[test]
    fn curve_integral_equals_distance(
        distance in 0.01f64..10_000.0,
        velocity in 0.1f64..5_000.0,
        accel in 1.0f64..50_000.0,
        decel in 1.0f64..50_000.0,
        mode_sel in 0u8..4,
    ) {
        let mode = match mode_sel {
            0 => ProfileMode::Trapezoid,
            1 => ProfileMode::TrapezoidAsym,
            2 => ProfileMode::QuasiS,
            _ => ProfileMode::SCurve,
        };
        let spec = MoveSpec::rest_to_rest(distance, velocity, accel, decel);
        let curve = generate(&spec, &limits(mode, 1e6)).unwrap();
        let err = (curve.distance() - distance).abs();
        prop_assert!(err < distance * 1e-9 + 1e-9, "err = {}", err);
    }

    /// The sampled peak never exceeds the velocity ceiling.
    #[test]
    fn peak_velocity_respects_ceiling(
        distance in 0.01f64..1_000.0,
        velocity in 0.1f64..10_000.0,
        accel in 1.0f64..10_000.0,
    ) {
        let max_vel = 500.0;
        let spec = MoveSpec::rest_to_rest(distance, velocity, accel, accel);
        let curve = generate(&spec, &limits(ProfileMode::Trapezoid, max_vel)).unwrap();
        let dur = curve.duration();
        for i in 0..=200 {
            let v = curve.velocity_at(dur * i as f64 / 200.0);
            prop_assert!(v <= max_vel + 1e-6, "v = {}", v);
        }
    }

    /// Pulse conversion round-trips within half a pulse.
    #[test]
    fn unit_ratio_round_trip(
        unit in 0.001f64..100.0,
        pulse in 1.0f64..100_000.0,
        distance in -10_000.0f64..10_000.0,
    ) {
        let ratio = UnitRatio::new(unit, pulse).unwrap();
        let pulses = ratio.to_pulses(Units(distance));
        let back = ratio.to_units(pulses);
        let half_pulse = ratio.units_per_pulse() / 2.0;
        prop_assert!((back.0 - distance).abs() <= half_pulse + 1e-12);
    }

    /// The parameter file codec reproduces numeric fields exactly.
    #[test]
    fn mot_codec_round_trips(
        max_vel in 0.1f64..1e7,
        min_vel in 0.0f64..0.1,
        backlash in 0.0f64..10.0,
    ) {
        use axis_motion::param::{parse_all, render_all};

        let mut store = ParamStore::with_axes(1);
        store.set_velocity_window(0, UnitsPerSec(min_vel), UnitsPerSec(max_vel)).unwrap();
        store.set_backlash(0, 1, Units(backlash)).unwrap();

        let text = render_all(&store);
        let outcome = parse_all(&text).unwrap();
        prop_assert_eq!(outcome.skipped_keys, 0);
        prop_assert_eq!(render_all(&outcome.store), text);
    }
}
