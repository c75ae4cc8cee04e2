//! Profile generation: move specs in, velocity curves out.
//!
//! Phase distances are solved on trapezoid geometry using effective
//! accel slopes; S-curve modes then split each ramp into jerk segments
//! that keep the same mean velocity, so the solved distances stay
//! exact for every profile shape.

use libm::sqrt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ParamIssue, Result};
use crate::param::{AccelUnit, AxisParams, ProfileMode};

use super::curve::{Piece, VelCurve};

/// Which commanded quantity wins for short moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum ProfilePriority {
    /// Honor the commanded peak velocity, shrinking the plateau.
    #[default]
    Velocity,
    /// Honor the commanded accel/decel times, reducing peak velocity.
    AccelTime,
}

/// A single-axis move request over unsigned distance.
#[derive(Debug, Clone, Copy)]
pub struct MoveSpec {
    /// Travel distance, non-negative user units.
    pub distance: f64,
    /// Requested plateau velocity.
    pub velocity: f64,
    /// Accel argument (slope or time, per [`AccelUnit`]).
    pub accel: f64,
    /// Decel argument (slope or time, per [`AccelUnit`]).
    pub decel: f64,
    /// Velocity entering the move.
    pub start_vel: f64,
    /// Velocity to hold at the end of the move.
    pub end_vel: f64,
}

impl MoveSpec {
    /// A stop-to-stop move.
    pub fn rest_to_rest(distance: f64, velocity: f64, accel: f64, decel: f64) -> Self {
        Self {
            distance,
            velocity,
            accel,
            decel,
            start_vel: 0.0,
            end_vel: 0.0,
        }
    }
}

/// Shaping constraints taken from the axis parameters.
#[derive(Debug, Clone, Copy)]
pub struct ShapeLimits {
    /// Profile shape.
    pub mode: ProfileMode,
    /// Lowest plateau velocity.
    pub min_vel: f64,
    /// Highest plateau velocity.
    pub max_vel: f64,
    /// Jerk fraction of the accel ramp (S modes).
    pub jerk_accel_ratio: f64,
    /// Jerk fraction of the decel ramp (S modes).
    pub jerk_decel_ratio: f64,
    /// Interpretation of accel arguments.
    pub accel_unit: AccelUnit,
    /// Short-move priority.
    pub priority: ProfilePriority,
    /// Use the corrected triangular-peak formula that accounts for
    /// boundary velocities; the legacy one ignores them.
    pub patched_triangle: bool,
}

impl ShapeLimits {
    /// Read the shaping constraints out of an axis record.
    pub fn from_params(params: &AxisParams) -> Self {
        Self {
            mode: params.profile_mode,
            min_vel: params.min_vel.0,
            max_vel: params.max_vel.0,
            jerk_accel_ratio: params.jerk_accel_ratio,
            jerk_decel_ratio: params.jerk_decel_ratio,
            accel_unit: params.accel_unit,
            priority: params.profile_priority,
            patched_triangle: params.patched_triangle,
        }
    }
}

/// Generate a velocity curve for a bounded point-to-point move.
pub fn generate(spec: &MoveSpec, limits: &ShapeLimits) -> Result<VelCurve> {
    if spec.distance < 0.0 || spec.velocity <= 0.0 || spec.accel <= 0.0 || spec.decel <= 0.0 {
        return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
    }
    if spec.distance == 0.0 {
        return Ok(VelCurve::empty());
    }

    let (accel, decel) = resolve_slopes(spec, limits);
    let (r_a, r_d) = jerk_ratios(limits);

    // Mean-velocity equivalence: an S-ramp with jerk fraction r and
    // peak slope a changes velocity like a linear ramp of slope
    // a·(1 - r/2). Solve the phase split on the effective slopes.
    let a_eff = accel * (1.0 - r_a / 2.0);
    let d_eff = decel * (1.0 - r_d / 2.0);

    let vs = spec.start_vel.max(0.0);
    let ve = spec.end_vel.max(0.0);
    let mut v = spec
        .velocity
        .min(limits.max_vel)
        .max(limits.min_vel)
        .max(vs)
        .max(ve);

    let d = spec.distance;
    let d_a = ramp_distance(vs, v, a_eff);
    let d_d = ramp_distance(ve, v, d_eff);

    let (v, t_plateau) = if d_a + d_d <= d {
        (v, (d - d_a - d_d) / v)
    } else {
        match limits.priority {
            ProfilePriority::Velocity => {
                let peak = if limits.patched_triangle {
                    sqrt((2.0 * a_eff * d_eff * d + d_eff * vs * vs + a_eff * ve * ve)
                        / (a_eff + d_eff))
                } else {
                    sqrt(2.0 * a_eff * d_eff * d / (a_eff + d_eff))
                };
                if peak <= vs.max(ve) {
                    // Degenerate short move: one ramp from vs to ve
                    // covering exactly d.
                    return Ok(single_ramp(vs, ve, d));
                }
                (peak, 0.0)
            }
            ProfilePriority::AccelTime => {
                // Keep the ramp times, shrink the peak.
                let t_a = (v - vs) / a_eff;
                let t_d = (v - ve) / d_eff;
                if t_a + t_d <= 0.0 {
                    return Ok(single_ramp(vs, ve, d));
                }
                let peak = (2.0 * d - vs * t_a - ve * t_d) / (t_a + t_d);
                if peak <= vs.max(ve) {
                    return Ok(single_ramp(vs, ve, d));
                }
                v = peak;
                // Recompute slopes so the original times hold.
                let a2 = (v - vs) / t_a;
                let d2 = (v - ve) / t_d;
                let mut curve = VelCurve::empty();
                push_ramp(&mut curve, vs, v, a2, r_a);
                push_ramp(&mut curve, v, ve, d2, r_d);
                return Ok(curve);
            }
        }
    };

    let mut curve = VelCurve::empty();
    push_ramp(&mut curve, vs, v, a_eff, r_a);
    if t_plateau > 0.0 {
        curve.push(Piece { dur: t_plateau, v0: v, a0: 0.0, jerk: 0.0 });
    }
    push_ramp(&mut curve, v, ve, d_eff, r_d);
    Ok(curve)
}

/// Generate a curve that accelerates to `velocity` and holds it
/// forever (jog / signal-search motion).
pub fn generate_jog(velocity: f64, accel: f64, start_vel: f64, limits: &ShapeLimits) -> Result<VelCurve> {
    if velocity <= 0.0 || accel <= 0.0 {
        return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
    }
    let v = velocity.min(limits.max_vel);
    let (r_a, _) = jerk_ratios(limits);
    let slope = match limits.accel_unit {
        AccelUnit::Rate => accel,
        AccelUnit::TimeToMax => limits.max_vel / accel,
    } * (1.0 - r_a / 2.0);
    let mut curve = VelCurve::empty();
    if v != start_vel {
        push_ramp(&mut curve, start_vel, v, slope, r_a);
    }
    curve.set_unbounded();
    Ok(curve)
}

/// Generate a ramp-to-zero curve from the current velocity (stops).
pub fn generate_stop(current_vel: f64, decel: f64) -> VelCurve {
    let mut curve = VelCurve::empty();
    let v = current_vel.abs();
    if v > 0.0 && decel > 0.0 {
        curve.push(Piece { dur: v / decel, v0: v, a0: -decel, jerk: 0.0 });
    }
    curve
}

fn jerk_ratios(limits: &ShapeLimits) -> (f64, f64) {
    match limits.mode {
        ProfileMode::Trapezoid | ProfileMode::TrapezoidAsym => (0.0, 0.0),
        ProfileMode::QuasiS => (1.0, 1.0),
        ProfileMode::SCurve => {
            let r = limits.jerk_accel_ratio.clamp(0.0, 1.0);
            (r, r)
        }
        ProfileMode::SCurveAsym => (
            limits.jerk_accel_ratio.clamp(0.0, 1.0),
            limits.jerk_decel_ratio.clamp(0.0, 1.0),
        ),
    }
}

/// Resolve accel arguments into slopes, honoring the unit selector and
/// symmetric-mode mirroring.
fn resolve_slopes(spec: &MoveSpec, limits: &ShapeLimits) -> (f64, f64) {
    let to_slope = |arg: f64| match limits.accel_unit {
        AccelUnit::Rate => arg,
        AccelUnit::TimeToMax => limits.max_vel / arg,
    };
    let a = to_slope(spec.accel);
    let d = match limits.mode {
        ProfileMode::Trapezoid | ProfileMode::SCurve | ProfileMode::QuasiS => a,
        ProfileMode::TrapezoidAsym | ProfileMode::SCurveAsym => to_slope(spec.decel),
    };
    (a, d)
}

#[inline]
fn ramp_distance(v_low: f64, v_high: f64, slope: f64) -> f64 {
    if v_high <= v_low || slope <= 0.0 {
        0.0
    } else {
        (v_high * v_high - v_low * v_low) / (2.0 * slope)
    }
}

/// One ramp covering exactly `d` between the boundary velocities.
fn single_ramp(vs: f64, ve: f64, d: f64) -> VelCurve {
    let mut curve = VelCurve::empty();
    let v_sum = vs + ve;
    if v_sum <= 0.0 {
        // Both ends at rest: symmetric triangle covering exactly d.
        let peak = sqrt(d).max(1e-9);
        let t_half = d / peak;
        curve.push(Piece { dur: t_half, v0: 0.0, a0: peak / t_half, jerk: 0.0 });
        curve.push(Piece { dur: t_half, v0: peak, a0: -peak / t_half, jerk: 0.0 });
        return curve;
    }
    let dur = 2.0 * d / v_sum;
    curve.push(Piece {
        dur,
        v0: vs,
        a0: (ve - vs) / dur,
        jerk: 0.0,
    });
    curve
}

/// Append an accel or decel ramp between two velocities, split into
/// jerk segments when `r > 0`.
fn push_ramp(curve: &mut VelCurve, from: f64, to: f64, eff_slope: f64, r: f64) {
    let dv = to - from;
    if dv == 0.0 || eff_slope <= 0.0 {
        return;
    }
    let t_total = dv.abs() / eff_slope;
    let sign = if dv > 0.0 { 1.0 } else { -1.0 };
    if r <= 0.0 {
        curve.push(Piece {
            dur: t_total,
            v0: from,
            a0: sign * eff_slope,
            jerk: 0.0,
        });
        return;
    }
    // Peak slope of the jerk-shaped ramp; eff = peak·(1 - r/2).
    let peak = eff_slope / (1.0 - r / 2.0);
    let t_j = r * t_total / 2.0;
    let t_m = t_total - 2.0 * t_j;
    let j = peak / t_j;
    let a = sign * peak;
    curve.push(Piece { dur: t_j, v0: from, a0: 0.0, jerk: sign * j });
    let v1 = from + a * t_j / 2.0;
    if t_m > 0.0 {
        curve.push(Piece { dur: t_m, v0: v1, a0: a, jerk: 0.0 });
    }
    let v2 = to - a * t_j / 2.0;
    curve.push(Piece { dur: t_j, v0: v2, a0: a, jerk: -sign * j });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ProfileMode;

    fn limits(mode: ProfileMode) -> ShapeLimits {
        ShapeLimits {
            mode,
            min_vel: 0.0,
            max_vel: 1000.0,
            jerk_accel_ratio: 0.5,
            jerk_decel_ratio: 0.5,
            accel_unit: AccelUnit::Rate,
            priority: ProfilePriority::Velocity,
            patched_triangle: true,
        }
    }

    #[test]
    fn trapezoid_integral_equals_distance() {
        let spec = MoveSpec::rest_to_rest(10.0, 100.0, 400.0, 400.0);
        let curve = generate(&spec, &limits(ProfileMode::Trapezoid)).unwrap();
        assert!((curve.distance() - 10.0).abs() < 1e-9);
        // accel 0.25 s + plateau + decel 0.25 s
        let peak = (0..1000)
            .map(|i| curve.velocity_at(curve.duration() * i as f64 / 1000.0))
            .fold(0.0f64, f64::max);
        assert!(peak <= 100.0 + 1e-9);
    }

    #[test]
    fn scurve_integral_equals_distance() {
        for mode in [ProfileMode::SCurve, ProfileMode::QuasiS, ProfileMode::SCurveAsym] {
            let spec = MoveSpec::rest_to_rest(25.0, 200.0, 800.0, 500.0);
            let curve = generate(&spec, &limits(mode)).unwrap();
            assert!(
                (curve.distance() - 25.0).abs() < 1e-9,
                "mode {:?} distance {}",
                mode,
                curve.distance()
            );
        }
    }

    #[test]
    fn triangular_short_move() {
        let spec = MoveSpec::rest_to_rest(1.0, 1000.0, 100.0, 100.0);
        let curve = generate(&spec, &limits(ProfileMode::Trapezoid)).unwrap();
        assert!((curve.distance() - 1.0).abs() < 1e-9);
        // Peak must stay well below the commanded plateau.
        let peak = (0..1000)
            .map(|i| curve.velocity_at(curve.duration() * i as f64 / 1000.0))
            .fold(0.0f64, f64::max);
        assert!(peak < 1000.0 * 0.5);
    }

    #[test]
    fn legacy_triangle_differs_from_patched() {
        let mut lim = limits(ProfileMode::Trapezoid);
        let spec = MoveSpec {
            distance: 1.0,
            velocity: 1000.0,
            accel: 100.0,
            decel: 100.0,
            start_vel: 5.0,
            end_vel: 0.0,
        };
        let patched = generate(&spec, &lim).unwrap();
        lim.patched_triangle = false;
        let legacy = generate(&spec, &lim).unwrap();
        assert!((patched.distance() - 1.0).abs() < 1e-9);
        assert!((legacy.duration() - patched.duration()).abs() > 1e-6);
    }

    #[test]
    fn accel_time_priority_reduces_peak() {
        let mut lim = limits(ProfileMode::Trapezoid);
        lim.priority = ProfilePriority::AccelTime;
        let spec = MoveSpec::rest_to_rest(1.0, 1000.0, 2000.0, 2000.0);
        let curve = generate(&spec, &lim).unwrap();
        assert!((curve.distance() - 1.0).abs() < 1e-9);
        // Ramp time was preserved: 1000/2000 = 0.5 s per side.
        assert!((curve.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn time_unit_accel() {
        let mut lim = limits(ProfileMode::Trapezoid);
        lim.accel_unit = AccelUnit::TimeToMax;
        // 0.5 s to reach max_vel=1000 -> slope 2000.
        let spec = MoveSpec::rest_to_rest(500.0, 1000.0, 0.5, 0.5);
        let curve = generate(&spec, &lim).unwrap();
        assert!((curve.distance() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn blended_boundary_velocities() {
        let spec = MoveSpec {
            distance: 10.0,
            velocity: 100.0,
            accel: 400.0,
            decel: 400.0,
            start_vel: 20.0,
            end_vel: 50.0,
        };
        let curve = generate(&spec, &limits(ProfileMode::TrapezoidAsym)).unwrap();
        assert!((curve.distance() - 10.0).abs() < 1e-9);
        assert!((curve.velocity_at(0.0) - 20.0).abs() < 1e-9);
        assert!((curve.final_velocity() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn jog_is_unbounded() {
        let curve = generate_jog(50.0, 100.0, 0.0, &limits(ProfileMode::Trapezoid)).unwrap();
        assert!(curve.is_unbounded());
        assert!((curve.velocity_at(10.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn stop_curve_reaches_zero() {
        let curve = generate_stop(100.0, 400.0);
        assert!((curve.duration() - 0.25).abs() < 1e-9);
        assert!((curve.final_velocity()).abs() < 1e-9);
        assert!((curve.distance() - 12.5).abs() < 1e-9);
    }
}
