//! Planar arc geometry.
//!
//! Every circular descriptor (center, through-point, radius and angle
//! forms) resolves to one internal representation: center, radius,
//! start angle and signed sweep.

use libm::{atan2, cos, fabs, sin, sqrt};

use crate::error::{Error, ParamIssue, Result};

/// Two-dimensional point / vector in the interpolation plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    /// First plane axis.
    pub x: f64,
    /// Second plane axis.
    pub y: f64,
}

impl Vec2 {
    /// Construct from components.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise difference.
    #[inline]
    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }

    /// Euclidean norm.
    #[inline]
    pub fn norm(self) -> f64 {
        sqrt(self.x * self.x + self.y * self.y)
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// Z-component of the cross product.
    #[inline]
    pub fn cross(self, rhs: Self) -> f64 {
        self.x * rhs.y - self.y * rhs.x
    }
}

/// A resolved arc: center, radius, start angle, signed sweep
/// (positive = counter-clockwise).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    /// Arc center.
    pub center: Vec2,
    /// Radius.
    pub radius: f64,
    /// Angle of the start point, radians.
    pub start_angle: f64,
    /// Signed sweep, radians.
    pub sweep: f64,
}

const TAU: f64 = core::f64::consts::TAU;

impl Arc {
    /// Arc length.
    #[inline]
    pub fn length(&self) -> f64 {
        self.radius * fabs(self.sweep)
    }

    /// Point at arc-length position `s`.
    pub fn point_at(&self, s: f64) -> Vec2 {
        let angle = self.angle_at(s);
        Vec2::new(
            self.center.x + self.radius * cos(angle),
            self.center.y + self.radius * sin(angle),
        )
    }

    /// Unit tangent at arc-length position `s`.
    pub fn tangent_at(&self, s: f64) -> Vec2 {
        let angle = self.angle_at(s);
        if self.sweep >= 0.0 {
            Vec2::new(-sin(angle), cos(angle))
        } else {
            Vec2::new(sin(angle), -cos(angle))
        }
    }

    #[inline]
    fn angle_at(&self, s: f64) -> f64 {
        let frac = if self.length() > 0.0 { s / self.length() } else { 0.0 };
        self.start_angle + self.sweep * frac
    }

    /// Resolve from a center point and an end point.
    ///
    /// The radius comes from the start point; the end point fixes the
    /// final angle (a start/end radius mismatch follows the start).
    pub fn from_center(start: Vec2, center: Vec2, end: Vec2, ccw: bool) -> Result<Self> {
        let radius = start.sub(center).norm();
        if radius <= 0.0 {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        let a0 = atan2(start.y - center.y, start.x - center.x);
        let a1 = atan2(end.y - center.y, end.x - center.x);
        let sweep = sweep_between(a0, a1, ccw);
        Ok(Self {
            center,
            radius,
            start_angle: a0,
            sweep,
        })
    }

    /// Resolve from a through-point and an end point. `full_circle`
    /// continues past the end point back to the start.
    pub fn from_point(start: Vec2, mid: Vec2, end: Vec2, full_circle: bool) -> Result<Self> {
        let center = circumcenter(start, mid, end)?;
        // Orientation of the three points picks the direction.
        let ccw = mid.sub(start).cross(end.sub(mid)) > 0.0;
        let mut arc = Self::from_center(start, center, end, ccw)?;
        if full_circle {
            arc.sweep = if ccw { TAU } else { -TAU };
        }
        Ok(arc)
    }

    /// Resolve from a radius and an end point. Two candidate centers
    /// exist; `long` picks the longer of the two arcs.
    pub fn from_radius(start: Vec2, end: Vec2, radius: f64, ccw: bool, long: bool) -> Result<Self> {
        let chord = end.sub(start);
        let d = chord.norm();
        if radius <= 0.0 || d <= 0.0 || d > 2.0 * radius {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        let mid = Vec2::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0);
        let h = sqrt(radius * radius - (d / 2.0) * (d / 2.0));
        // Unit normal to the chord.
        let n = Vec2::new(-chord.y / d, chord.x / d);
        // The minor (short) arc of a CCW traverse keeps the center on
        // the left of the chord.
        let left = Vec2::new(mid.x + n.x * h, mid.y + n.y * h);
        let right = Vec2::new(mid.x - n.x * h, mid.y - n.y * h);
        let center = match (ccw, long) {
            (true, false) => left,
            (true, true) => right,
            (false, false) => right,
            (false, true) => left,
        };
        Self::from_center(start, center, end, ccw)
    }

    /// Resolve from a center and a sweep angle in degrees.
    pub fn from_angle(start: Vec2, center: Vec2, angle_deg: f64) -> Result<Self> {
        let radius = start.sub(center).norm();
        if radius <= 0.0 || angle_deg == 0.0 {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        let a0 = atan2(start.y - center.y, start.x - center.x);
        Ok(Self {
            center,
            radius,
            start_angle: a0,
            sweep: angle_deg.to_radians(),
        })
    }
}

/// Signed sweep from `a0` to `a1` in the requested direction, in
/// `(0, 2π]`.
fn sweep_between(a0: f64, a1: f64, ccw: bool) -> f64 {
    let mut diff = a1 - a0;
    if ccw {
        while diff <= 0.0 {
            diff += TAU;
        }
        diff
    } else {
        while diff >= 0.0 {
            diff -= TAU;
        }
        diff
    }
}

/// Center of the circle through three points.
fn circumcenter(a: Vec2, b: Vec2, c: Vec2) -> Result<Vec2> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if fabs(d) < 1e-12 {
        return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
    }
    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    Ok(Vec2::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn center_form_quarter_circle() {
        // Quarter CCW from (1,0) to (0,1) around the origin.
        let arc = Arc::from_center(
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 1.0),
            true,
        )
        .unwrap();
        assert!(close(arc.radius, 1.0));
        assert!(close(arc.sweep, core::f64::consts::FRAC_PI_2));
        assert!(close(arc.length(), core::f64::consts::FRAC_PI_2));
        let end = arc.point_at(arc.length());
        assert!(close(end.x, 0.0) && close(end.y, 1.0));
    }

    #[test]
    fn cw_sweep_is_negative() {
        let arc = Arc::from_center(
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 1.0),
            false,
        )
        .unwrap();
        assert!(arc.sweep < 0.0);
        assert!(close(arc.length(), 3.0 * core::f64::consts::FRAC_PI_2));
    }

    #[test]
    fn through_point_form() {
        // Half circle through (0,1): (1,0) -> (-1,0), CCW.
        let arc = Arc::from_point(
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
            false,
        )
        .unwrap();
        assert!(close(arc.center.x, 0.0) && close(arc.center.y, 0.0));
        assert!(close(arc.radius, 1.0));
        assert!(arc.sweep > 0.0);
    }

    #[test]
    fn radius_form_short_vs_long() {
        let start = Vec2::new(0.0, 0.0);
        let end = Vec2::new(2.0, 0.0);
        let short = Arc::from_radius(start, end, 2.0, true, false).unwrap();
        let long = Arc::from_radius(start, end, 2.0, true, true).unwrap();
        assert!(short.length() < long.length());
        // Both land on the end point.
        let e1 = short.point_at(short.length());
        let e2 = long.point_at(long.length());
        assert!(close(e1.x, 2.0) && close(e1.y, 0.0));
        assert!(close(e2.x, 2.0) && close(e2.y, 0.0));
    }

    #[test]
    fn radius_too_small_rejected() {
        let err = Arc::from_radius(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 1.0, true, false);
        assert!(err.is_err());
    }

    #[test]
    fn angle_form() {
        let arc = Arc::from_angle(Vec2::new(2.0, 0.0), Vec2::new(0.0, 0.0), -90.0).unwrap();
        assert!(close(arc.length(), core::f64::consts::PI));
        let end = arc.point_at(arc.length());
        assert!(close(end.x, 0.0) && close(end.y, -2.0));
    }

    #[test]
    fn tangent_is_perpendicular_to_radius() {
        let arc = Arc::from_center(
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 1.0),
            true,
        )
        .unwrap();
        let t0 = arc.tangent_at(0.0);
        assert!(close(t0.x, 0.0) && close(t0.y, 1.0));
    }
}
