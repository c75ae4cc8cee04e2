//! Parametric path segments over a coordinate's axes.
//!
//! Every planner descriptor resolves to a [`PathSegment`]: a mapping
//! from arc-length `s ∈ [0, L]` to member-axis positions. The first
//! two member axes form the interpolation plane for circular forms;
//! axes beyond the geometry interpolate linearly in proportion to
//! path length.

use heapless::Vec;

use libm::{cos, fabs, sin, sqrt};

use super::arc::{Arc, Vec2};
use super::group::MAX_COORD_AXES;

/// Position of all member axes of one coordinate.
pub type AxPos = [f64; MAX_COORD_AXES];

/// Samples held by a flattened spline.
pub const MAX_POLYLINE_POINTS: usize = 32;

#[derive(Debug, Clone)]
enum Geometry {
    /// Straight line in N dimensions.
    Line,
    /// Arc in the first-two-axes plane; other axes linear.
    Planar { arc: Arc },
    /// Rotation about an arbitrary 3-D axis with linear advance
    /// along it (pitch move).
    Rotary {
        /// Point on the rotation axis.
        origin: [f64; 3],
        /// Unit direction of the rotation axis.
        dir: [f64; 3],
        /// Total rotation, radians, signed.
        angle: f64,
        /// Total advance along the axis.
        advance: f64,
    },
    /// Flattened spline: piecewise-linear samples by cumulative
    /// length.
    Polyline {
        pts: Vec<AxPos, MAX_POLYLINE_POINTS>,
        cum: Vec<f64, MAX_POLYLINE_POINTS>,
    },
}

/// One parametric segment of coordinated motion.
#[derive(Debug, Clone)]
pub struct PathSegment {
    /// Member-axis positions at `s = 0`.
    pub start: AxPos,
    /// Member-axis positions at `s = L`.
    pub end: AxPos,
    /// Number of live axes in the coordinate.
    pub dims: usize,
    length: f64,
    geom: Geometry,
}

impl PathSegment {
    /// Straight line between two points.
    pub fn line(start: AxPos, end: AxPos, dims: usize) -> Self {
        let mut sq = 0.0;
        for i in 0..dims {
            let d = end[i] - start[i];
            sq += d * d;
        }
        Self {
            start,
            end,
            dims,
            length: sqrt(sq),
            geom: Geometry::Line,
        }
    }

    /// Arc in the plane of the first two axes. `end` supplies the
    /// endpoint for every axis beyond the plane; its plane components
    /// are overwritten from the arc itself.
    pub fn planar_arc(start: AxPos, mut end: AxPos, arc: Arc, dims: usize) -> Self {
        let tip = arc.point_at(arc.length());
        end[0] = tip.x;
        end[1] = tip.y;
        let mut extra_sq = 0.0;
        for i in 2..dims {
            let d = end[i] - start[i];
            extra_sq += d * d;
        }
        // Helical length: arc and linear advance compose orthogonally.
        let length = sqrt(arc.length() * arc.length() + extra_sq);
        Self {
            start,
            end,
            dims,
            length,
            geom: Geometry::Planar { arc },
        }
    }

    /// Rotation about the axis through `p1` toward `p2`, by
    /// `angle` radians, advancing `advance` along the axis. The start
    /// position is implicitly perpendicular to the axis.
    pub fn rotary(
        start: AxPos,
        p1: [f64; 3],
        p2: [f64; 3],
        angle: f64,
        advance: f64,
        dims: usize,
    ) -> Self {
        let mut dir = [p2[0] - p1[0], p2[1] - p1[1], p2[2] - p1[2]];
        let n = sqrt(dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).max(1e-12);
        for d in dir.iter_mut() {
            *d /= n;
        }
        // Radius = distance from the start point to the axis.
        let rel = [start[0] - p1[0], start[1] - p1[1], start[2] - p1[2]];
        let along = rel[0] * dir[0] + rel[1] * dir[1] + rel[2] * dir[2];
        let perp = [
            rel[0] - along * dir[0],
            rel[1] - along * dir[1],
            rel[2] - along * dir[2],
        ];
        let radius = sqrt(perp[0] * perp[0] + perp[1] * perp[1] + perp[2] * perp[2]);
        let turn = radius * fabs(angle);
        let length = sqrt(turn * turn + advance * advance).max(1e-12);

        let mut seg = Self {
            start,
            end: start,
            dims,
            length,
            geom: Geometry::Rotary {
                origin: p1,
                dir,
                angle,
                advance,
            },
        };
        seg.end = seg.point_at(length);
        seg
    }

    /// Flattened polyline (spline support). Points include the start.
    pub fn polyline(points: &[AxPos], dims: usize) -> Self {
        let mut pts: Vec<AxPos, MAX_POLYLINE_POINTS> = Vec::new();
        let mut cum: Vec<f64, MAX_POLYLINE_POINTS> = Vec::new();
        let mut total = 0.0;
        let mut prev: Option<AxPos> = None;
        for &p in points.iter().take(MAX_POLYLINE_POINTS) {
            if let Some(q) = prev {
                let mut sq = 0.0;
                for i in 0..dims {
                    let d = p[i] - q[i];
                    sq += d * d;
                }
                total += sqrt(sq);
            }
            let _ = pts.push(p);
            let _ = cum.push(total);
            prev = Some(p);
        }
        let start = *pts.first().unwrap_or(&[0.0; MAX_COORD_AXES]);
        let end = *pts.last().unwrap_or(&start);
        Self {
            start,
            end,
            dims,
            length: total,
            geom: Geometry::Polyline { pts, cum },
        }
    }

    /// Path length.
    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Whether this segment is a straight line.
    #[inline]
    pub fn is_line(&self) -> bool {
        matches!(self.geom, Geometry::Line)
    }

    /// Member-axis positions at arc length `s`.
    pub fn point_at(&self, s: f64) -> AxPos {
        let s = s.clamp(0.0, self.length);
        let f = if self.length > 0.0 { s / self.length } else { 1.0 };
        match &self.geom {
            Geometry::Line => {
                let mut p = self.start;
                for i in 0..self.dims {
                    p[i] += (self.end[i] - self.start[i]) * f;
                }
                p
            }
            Geometry::Planar { arc } => {
                let mut p = self.start;
                let xy = arc.point_at(arc.length() * f);
                p[0] = xy.x;
                p[1] = xy.y;
                for i in 2..self.dims {
                    p[i] += (self.end[i] - self.start[i]) * f;
                }
                p
            }
            Geometry::Rotary {
                origin,
                dir,
                angle,
                advance,
            } => {
                let theta = angle * f;
                let rel = [
                    self.start[0] - origin[0],
                    self.start[1] - origin[1],
                    self.start[2] - origin[2],
                ];
                let rotated = rodrigues(rel, *dir, theta);
                let mut p = self.start;
                for i in 0..3.min(self.dims) {
                    p[i] = origin[i] + rotated[i] + dir[i] * advance * f;
                }
                for i in 3..self.dims {
                    p[i] += (self.end[i] - self.start[i]) * f;
                }
                p
            }
            Geometry::Polyline { pts, cum } => {
                for i in 0..pts.len().saturating_sub(1) {
                    if s <= cum[i + 1] {
                        let span = cum[i + 1] - cum[i];
                        let g = if span > 0.0 { (s - cum[i]) / span } else { 1.0 };
                        let mut p = pts[i];
                        for k in 0..self.dims {
                            p[k] += (pts[i + 1][k] - pts[i][k]) * g;
                        }
                        return p;
                    }
                }
                self.end
            }
        }
    }

    /// Unit tangent at arc length `s`.
    pub fn tangent_at(&self, s: f64) -> AxPos {
        // Finite difference is exact enough for junction-angle checks
        // and keeps every geometry on one code path.
        let eps = (self.length * 1e-6).max(1e-9);
        let a = self.point_at((s - eps).max(0.0));
        let b = self.point_at((s + eps).min(self.length));
        let mut t = [0.0; MAX_COORD_AXES];
        let mut sq = 0.0;
        for i in 0..self.dims {
            t[i] = b[i] - a[i];
            sq += t[i] * t[i];
        }
        let n = sqrt(sq).max(1e-12);
        for v in t.iter_mut() {
            *v /= n;
        }
        t
    }
}

/// Rodrigues rotation of `v` about unit axis `k` by `theta`.
fn rodrigues(v: [f64; 3], k: [f64; 3], theta: f64) -> [f64; 3] {
    let (c, s) = (cos(theta), sin(theta));
    let kv = [
        k[1] * v[2] - k[2] * v[1],
        k[2] * v[0] - k[0] * v[2],
        k[0] * v[1] - k[1] * v[0],
    ];
    let kdv = k[0] * v[0] + k[1] * v[1] + k[2] * v[2];
    [
        v[0] * c + kv[0] * s + k[0] * kdv * (1.0 - c),
        v[1] * c + kv[1] * s + k[1] * kdv * (1.0 - c),
        v[2] * c + kv[2] * s + k[2] * kdv * (1.0 - c),
    ]
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
    fn line_midpoint() {
        let seg = PathSegment::line(pos(&[0.0, 0.0]), pos(&[3.0, 4.0]), 2);
        assert!((seg.length() - 5.0).abs() < 1e-12);
        let mid = seg.point_at(2.5);
        assert!((mid[0] - 1.5).abs() < 1e-12 && (mid[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn helix_composes_lengths() {
        // Quarter turn radius 1 with a 3-unit advance on axis 2.
        let arc = Arc::from_center(Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0), Vec2::new(0.0, 1.0), true)
            .unwrap();
        let seg = PathSegment::planar_arc(pos(&[1.0, 0.0, 0.0]), pos(&[0.0, 1.0, 3.0]), arc, 3);
        let expect = ((core::f64::consts::FRAC_PI_2).powi(2) + 9.0).sqrt();
        assert!((seg.length() - expect).abs() < 1e-9);
        let end = seg.point_at(seg.length());
        assert!((end[2] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rotary_full_turn_returns() {
        // Rotate (1,0,0) a full turn about the z axis through origin.
        let seg = PathSegment::rotary(
            pos(&[1.0, 0.0, 0.0]),
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            core::f64::consts::TAU,
            0.0,
            3,
        );
        let end = seg.point_at(seg.length());
        assert!((end[0] - 1.0).abs() < 1e-9);
        assert!(end[1].abs() < 1e-9);
    }

    #[test]
    fn polyline_walks_samples() {
        let seg = PathSegment::polyline(
            &[pos(&[0.0, 0.0]), pos(&[1.0, 0.0]), pos(&[1.0, 1.0])],
            2,
        );
        assert!((seg.length() - 2.0).abs() < 1e-12);
        let p = seg.point_at(1.5);
        assert!((p[0] - 1.0).abs() < 1e-12 && (p[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tangent_continuity_line_to_arc() {
        // Line +x into a CCW arc centered above its endpoint: tangents
        // match at the junction.
        let line = PathSegment::line(pos(&[0.0, 0.0]), pos(&[10.0, 0.0]), 2);
        let arc = Arc::from_center(
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 2.0),
            Vec2::new(10.0, 4.0),
            true,
        )
        .unwrap();
        let seg = PathSegment::planar_arc(pos(&[10.0, 0.0]), pos(&[10.0, 4.0]), arc, 2);
        let t_end = line.tangent_at(line.length());
        let t_start = seg.tangent_at(0.0);
        let dot = t_end[0] * t_start[0] + t_end[1] * t_start[1];
        assert!(dot > 0.999, "dot = {}", dot);
    }
}
