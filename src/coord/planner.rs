//! Interpolation planner: geometric descriptors to path segments.

use heapless::Vec;

use libm::{acos, fabs, tan};

use crate::error::{Error, ParamIssue, Result};

use super::arc::{Arc, Vec2};
use super::group::MAX_COORD_AXES;
use super::path::{AxPos, PathSegment};

/// Control points accepted by a spline descriptor.
pub const MAX_SPLINE_POINTS: usize = 4;

/// Sub-samples per spline span when flattening. Sized so the longest
/// control polygon still fits the polyline buffer.
const SPLINE_SUBDIV: usize = 7;

/// Geometric descriptor of one coordinated move.
#[derive(Debug, Clone)]
pub enum SegmentSpec {
    /// Straight line to an endpoint.
    Line {
        /// Endpoint for every member axis.
        end: AxPos,
    },
    /// Arc from a center point and an endpoint.
    ArcCenter {
        /// Arc center in the plane.
        center: Vec2,
        /// Plane endpoint.
        end: Vec2,
        /// Counter-clockwise when `true`.
        ccw: bool,
    },
    /// Arc through a mid point to an endpoint.
    ArcPoint {
        /// Intermediate plane point.
        mid: Vec2,
        /// Plane endpoint.
        end: Vec2,
        /// Continue into a full circle.
        full_circle: bool,
    },
    /// Arc from a radius and an endpoint.
    ArcRadius {
        /// Plane endpoint.
        end: Vec2,
        /// Arc radius.
        radius: f64,
        /// Counter-clockwise when `true`.
        ccw: bool,
        /// Pick the longer candidate arc.
        long: bool,
    },
    /// Arc from a center and a sweep angle.
    ArcAngle {
        /// Arc center in the plane.
        center: Vec2,
        /// Signed sweep in degrees.
        angle_deg: f64,
    },
    /// Helix: arc plus third-axis advance from a thread pitch.
    HelixCenter {
        /// Arc center in the plane.
        center: Vec2,
        /// Plane endpoint.
        end: Vec2,
        /// Counter-clockwise when `true`.
        ccw: bool,
        /// Advance per full turn.
        pitch: f64,
    },
    /// Helix: arc plus an explicit third-axis traverse.
    HelixTraverse {
        /// Arc center in the plane.
        center: Vec2,
        /// Plane endpoint.
        end: Vec2,
        /// Counter-clockwise when `true`.
        ccw: bool,
        /// Total third-axis travel.
        traverse: f64,
    },
    /// Rotation about the world-space axis through two points, with
    /// advance along it. The start position is implicitly
    /// perpendicular to the axis.
    PitchMove {
        /// First axis point.
        p1: [f64; 3],
        /// Second axis point.
        p2: [f64; 3],
        /// Signed rotation in degrees.
        angle_deg: f64,
        /// Advance along the axis over the move.
        advance: f64,
    },
    /// Spline through control points.
    Spline {
        /// Control points after the current position.
        points: Vec<AxPos, MAX_SPLINE_POINTS>,
        /// Tension factor, 0 (round) to 1 (taut).
        factor: f64,
    },
    /// Corner-rounding arc tangent to two directions.
    Fillet {
        /// Incoming direction.
        first: Vec2,
        /// Outgoing direction.
        second: Vec2,
        /// Corner radius.
        radius: f64,
    },
}

/// Resolve a descriptor into a parametric segment starting at
/// `start`. Relative mode offsets all endpoint coordinates by the
/// start position.
pub fn resolve(
    spec: &SegmentSpec,
    start: AxPos,
    dims: usize,
    relative: bool,
) -> Result<PathSegment> {
    let base = Vec2::new(start[0], start[1]);
    let shift = |p: Vec2| {
        if relative {
            Vec2::new(p.x + base.x, p.y + base.y)
        } else {
            p
        }
    };
    let start_xy = base;

    match spec {
        SegmentSpec::Line { end } => {
            let mut target = *end;
            if relative {
                for i in 0..dims {
                    target[i] += start[i];
                }
            }
            Ok(PathSegment::line(start, target, dims))
        }
        SegmentSpec::ArcCenter { center, end, ccw } => {
            let arc = Arc::from_center(start_xy, shift(*center), shift(*end), *ccw)?;
            Ok(PathSegment::planar_arc(start, start, arc, dims))
        }
        SegmentSpec::ArcPoint {
            mid,
            end,
            full_circle,
        } => {
            let arc = Arc::from_point(start_xy, shift(*mid), shift(*end), *full_circle)?;
            Ok(PathSegment::planar_arc(start, start, arc, dims))
        }
        SegmentSpec::ArcRadius {
            end,
            radius,
            ccw,
            long,
        } => {
            let arc = Arc::from_radius(start_xy, shift(*end), *radius, *ccw, *long)?;
            Ok(PathSegment::planar_arc(start, start, arc, dims))
        }
        SegmentSpec::ArcAngle { center, angle_deg } => {
            let arc = Arc::from_angle(start_xy, shift(*center), *angle_deg)?;
            Ok(PathSegment::planar_arc(start, start, arc, dims))
        }
        SegmentSpec::HelixCenter {
            center,
            end,
            ccw,
            pitch,
        } => {
            if dims < 3 {
                return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
            }
            let arc = Arc::from_center(start_xy, shift(*center), shift(*end), *ccw)?;
            let turns = fabs(arc.sweep) / core::f64::consts::TAU;
            let mut end_pos = start;
            end_pos[2] = start[2] + pitch * turns;
            Ok(PathSegment::planar_arc(start, end_pos, arc, dims))
        }
        SegmentSpec::HelixTraverse {
            center,
            end,
            ccw,
            traverse,
        } => {
            if dims < 3 {
                return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
            }
            let arc = Arc::from_center(start_xy, shift(*center), shift(*end), *ccw)?;
            let mut end_pos = start;
            end_pos[2] = start[2] + traverse;
            Ok(PathSegment::planar_arc(start, end_pos, arc, dims))
        }
        SegmentSpec::PitchMove {
            p1,
            p2,
            angle_deg,
            advance,
        } => {
            if dims < 3 {
                return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
            }
            Ok(PathSegment::rotary(
                start,
                *p1,
                *p2,
                angle_deg.to_radians(),
                *advance,
                dims,
            ))
        }
        SegmentSpec::Spline { points, factor } => {
            if points.is_empty() {
                return Err(Error::InvalidParameter(ParamIssue::TableOrder));
            }
            let mut ctrl: Vec<AxPos, { MAX_SPLINE_POINTS + 1 }> = Vec::new();
            // Start position heads the control polygon.
            let _ = ctrl.push(start);
            for &p in points.iter() {
                let mut q = p;
                if relative {
                    for i in 0..dims {
                        q[i] += start[i];
                    }
                }
                ctrl.push(q)
                    .map_err(|_| Error::InvalidParameter(ParamIssue::TableCapacity))?;
            }
            Ok(flatten_spline(&ctrl, *factor, dims))
        }
        SegmentSpec::Fillet {
            first,
            second,
            radius,
        } => fillet_arc(start, *first, *second, *radius, dims),
    }
}

/// Cosine of the tangent angle across a junction.
pub fn junction_alignment(prev: &PathSegment, next: &PathSegment) -> f64 {
    let a = prev.tangent_at(prev.length());
    let b = next.tangent_at(0.0);
    let mut dot = 0.0;
    for i in 0..prev.dims.max(next.dims) {
        dot += a[i] * b[i];
    }
    dot.clamp(-1.0, 1.0)
}

/// Insert a corner arc between two straight segments, trimming both.
///
/// Only line/line junctions whose out-of-plane axes are stationary at
/// the corner are rounded; anything else keeps its sharp junction.
pub fn fillet_between(
    a: &PathSegment,
    b: &PathSegment,
    radius: f64,
) -> Option<(PathSegment, PathSegment, PathSegment)> {
    if !a.is_line() || !b.is_line() {
        return None;
    }
    let dims = a.dims;
    let ta = a.tangent_at(a.length());
    let tb = b.tangent_at(0.0);
    // Plane-only check.
    for i in 2..dims {
        if fabs(ta[i]) > 1e-9 || fabs(tb[i]) > 1e-9 {
            return None;
        }
    }
    let u = Vec2::new(ta[0], ta[1]);
    let v = Vec2::new(tb[0], tb[1]);
    let cos_phi = u.dot(v).clamp(-1.0, 1.0);
    if cos_phi > 1.0 - 1e-9 {
        return None; // already straight
    }
    let phi = acos(cos_phi);
    let trim = radius * tan(phi / 2.0);
    if trim >= a.length() || trim >= b.length() {
        return None; // corner too tight for the radius
    }

    let a_new_end = a.point_at(a.length() - trim);
    let b_new_start = b.point_at(trim);
    let trimmed_a = PathSegment::line(a.start, a_new_end, dims);
    let trimmed_b = PathSegment::line(b_new_start, b.end, dims);

    let turn_ccw = u.cross(v) > 0.0;
    let arc_start = Vec2::new(a_new_end[0], a_new_end[1]);
    // Center sits off the trim point, perpendicular to the incoming
    // direction, on the turning side.
    let n = if turn_ccw {
        Vec2::new(-u.y, u.x)
    } else {
        Vec2::new(u.y, -u.x)
    };
    let center = Vec2::new(arc_start.x + n.x * radius, arc_start.y + n.y * radius);
    let arc_end = Vec2::new(b_new_start[0], b_new_start[1]);
    let arc = Arc::from_center(arc_start, center, arc_end, turn_ccw).ok()?;
    let corner_seg = PathSegment::planar_arc(a_new_end, b_new_start, arc, dims);
    Some((trimmed_a, corner_seg, trimmed_b))
}

/// Standalone fillet node: corner arc from the current position,
/// tangent to `first` in and `second` out.
fn fillet_arc(start: AxPos, first: Vec2, second: Vec2, radius: f64, dims: usize) -> Result<PathSegment> {
    let nu = first.norm();
    let nv = second.norm();
    if radius <= 0.0 || nu <= 0.0 || nv <= 0.0 {
        return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
    }
    let u = Vec2::new(first.x / nu, first.y / nu);
    let v = Vec2::new(second.x / nv, second.y / nv);
    let cos_phi = u.dot(v).clamp(-1.0, 1.0);
    if cos_phi > 1.0 - 1e-9 {
        return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
    }
    let turn_ccw = u.cross(v) > 0.0;
    let start_xy = Vec2::new(start[0], start[1]);
    let n = if turn_ccw {
        Vec2::new(-u.y, u.x)
    } else {
        Vec2::new(u.y, -u.x)
    };
    let center = Vec2::new(start_xy.x + n.x * radius, start_xy.y + n.y * radius);
    let phi = acos(cos_phi);
    let sweep_deg = if turn_ccw {
        phi.to_degrees()
    } else {
        -phi.to_degrees()
    };
    let arc = Arc::from_angle(start_xy, center, sweep_deg)?;
    Ok(PathSegment::planar_arc(start, start, arc, dims))
}

/// Catmull-Rom flattening with a tension factor.
fn flatten_spline(ctrl: &[AxPos], factor: f64, dims: usize) -> PathSegment {
    let tension = factor.clamp(0.0, 1.0);
    let n = ctrl.len();
    let mut flat: Vec<AxPos, { super::path::MAX_POLYLINE_POINTS }> = Vec::new();
    let _ = flat.push(ctrl[0]);
    for i in 0..n - 1 {
        let p0 = ctrl[i.saturating_sub(1)];
        let p1 = ctrl[i];
        let p2 = ctrl[i + 1];
        let p3 = ctrl[(i + 2).min(n - 1)];
        for step in 1..=SPLINE_SUBDIV {
            let t = step as f64 / SPLINE_SUBDIV as f64;
            let t2 = t * t;
            let t3 = t2 * t;
            let mut p = [0.0; MAX_COORD_AXES];
            for k in 0..dims {
                let m1 = (1.0 - tension) * (p2[k] - p0[k]) / 2.0;
                let m2 = (1.0 - tension) * (p3[k] - p1[k]) / 2.0;
                p[k] = (2.0 * t3 - 3.0 * t2 + 1.0) * p1[k]
                    + (t3 - 2.0 * t2 + t) * m1
                    + (-2.0 * t3 + 3.0 * t2) * p2[k]
                    + (t3 - t2) * m2;
            }
            let _ = flat.push(p);
        }
    }
    PathSegment::polyline(&flat, dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(vals: &[f64]) -> AxPos {
        let mut p = [0.0; MAX_COORD_AXES];
        p[..vals.len()].copy_from_slice(vals);
        p
    }

    #[test]
    fn relative_line_offsets_from_start() {
        let seg = resolve(
            &SegmentSpec::Line { end: pos(&[1.0, 1.0]) },
            pos(&[5.0, 5.0]),
            2,
            true,
        )
        .unwrap();
        assert!((seg.end[0] - 6.0).abs() < 1e-12);
        assert!((seg.end[1] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn helix_pitch_advances_third_axis() {
        // Full circle, pitch 2: third axis climbs by 2.
        let seg = resolve(
            &SegmentSpec::HelixCenter {
                center: Vec2::new(1.0, 0.0),
                end: Vec2::new(0.0, 0.0),
                ccw: true,
                pitch: 2.0,
            },
            pos(&[0.0, 0.0, 0.0]),
            3,
            false,
        )
        .unwrap();
        // Center (1,0), start (0,0): the end point equals the start,
        // so the sweep resolves to a full turn.
        let end = seg.point_at(seg.length());
        assert!((end[2] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn fillet_between_lines_is_tangent() {
        let a = PathSegment::line(pos(&[0.0, 0.0]), pos(&[10.0, 0.0]), 2);
        let b = PathSegment::line(pos(&[10.0, 0.0]), pos(&[10.0, 10.0]), 2);
        let (ta, corner, tb) = fillet_between(&a, &b, 2.0).unwrap();

        // Trim by r·tan(45°) = 2.
        assert!((ta.length() - 8.0).abs() < 1e-9);
        assert!((tb.length() - 8.0).abs() < 1e-9);

        // G1 continuity at both junctions.
        assert!(junction_alignment(&ta, &corner) > 0.9999);
        assert!(junction_alignment(&corner, &tb) > 0.9999);
    }

    #[test]
    fn fillet_too_tight_is_skipped() {
        let a = PathSegment::line(pos(&[0.0, 0.0]), pos(&[1.0, 0.0]), 2);
        let b = PathSegment::line(pos(&[1.0, 0.0]), pos(&[1.0, 1.0]), 2);
        assert!(fillet_between(&a, &b, 5.0).is_none());
    }

    #[test]
    fn spline_passes_through_controls() {
        let mut points = Vec::new();
        points.push(pos(&[1.0, 1.0])).unwrap();
        points.push(pos(&[2.0, 0.0])).unwrap();
        let seg = resolve(
            &SegmentSpec::Spline { points, factor: 0.0 },
            pos(&[0.0, 0.0]),
            2,
            false,
        )
        .unwrap();
        let end = seg.point_at(seg.length());
        assert!((end[0] - 2.0).abs() < 1e-9 && end[1].abs() < 1e-9);
    }

    #[test]
    fn straight_junction_alignment_is_one() {
        let a = PathSegment::line(pos(&[0.0, 0.0]), pos(&[1.0, 0.0]), 2);
        let b = PathSegment::line(pos(&[1.0, 0.0]), pos(&[2.0, 0.0]), 2);
        assert!(junction_alignment(&a, &b) > 0.9999);
    }
}
