//! PVT tables and synchronized starts.
//!
//! A PVT table is an ordered list of (position, velocity, Δt µs)
//! triplets. Playback Hermite-interpolates between the points, honoring
//! the endpoint velocities, so the commanded state is C1-continuous.
//! Sync groups reserve PVT starts inside a begin/end window and fire
//! every reservation on the same control cycle.

use heapless::Vec;

use crate::error::{Error, ParamIssue, Result};
use crate::units::{AxisId, CycleTime};

/// Points per PVT table.
pub const MAX_PVT_POINTS: usize = 64;

/// Sync groups per controller.
pub const MAX_SYNC_GROUPS: usize = 4;

/// Axes per sync group.
pub const MAX_SYNC_AXES: usize = 8;

/// One PVT triplet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PvtPoint {
    /// Target position at the end of the interval.
    pub position: f64,
    /// Velocity at the end of the interval.
    pub velocity: f64,
    /// Interval length in microseconds.
    pub dt_us: u32,
}

#[derive(Debug, Clone, Copy)]
struct HermiteSeg {
    dur: f64,
    p0: f64,
    v0: f64,
    p1: f64,
    v1: f64,
}

impl HermiteSeg {
    fn position_at(&self, t: f64) -> f64 {
        let s = (t / self.dur).clamp(0.0, 1.0);
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        h00 * self.p0 + h10 * self.dur * self.v0 + h01 * self.p1 + h11 * self.dur * self.v1
    }

    fn velocity_at(&self, t: f64) -> f64 {
        let s = (t / self.dur).clamp(0.0, 1.0);
        let s2 = s * s;
        let d00 = (6.0 * s2 - 6.0 * s) / self.dur;
        let d10 = (3.0 * s2 - 4.0 * s + 1.0) / self.dur;
        let d01 = (-6.0 * s2 + 6.0 * s) / self.dur;
        let d11 = (3.0 * s2 - 2.0 * s) / self.dur;
        d00 * self.p0 + d10 * self.dur * self.v0 + d01 * self.p1 + d11 * self.dur * self.v1
    }
}

/// A compiled PVT playback curve.
#[derive(Debug, Clone, Default)]
pub struct PvtCurve {
    segs: Vec<HermiteSeg, MAX_PVT_POINTS>,
}

impl PvtCurve {
    /// Compile a table starting from the current command state.
    ///
    /// Every Δt must be a positive integer multiple of the control
    /// cycle.
    pub fn compile(
        start_pos: f64,
        start_vel: f64,
        points: &[PvtPoint],
        cycle: CycleTime,
    ) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::InvalidParameter(ParamIssue::TableOrder));
        }
        let mut segs = Vec::new();
        let mut p = start_pos;
        let mut v = start_vel;
        for point in points {
            if point.dt_us == 0 || point.dt_us % cycle.micros() != 0 {
                return Err(Error::InvalidParameter(ParamIssue::CycleMultiple));
            }
            let seg = HermiteSeg {
                dur: point.dt_us as f64 * 1e-6,
                p0: p,
                v0: v,
                p1: point.position,
                v1: point.velocity,
            };
            segs.push(seg)
                .map_err(|_| Error::InvalidParameter(ParamIssue::TableCapacity))?;
            p = point.position;
            v = point.velocity;
        }
        Ok(Self { segs })
    }

    /// Total playback duration in seconds.
    pub fn duration(&self) -> f64 {
        self.segs.iter().map(|s| s.dur).sum()
    }

    /// Final table position.
    pub fn final_position(&self) -> f64 {
        self.segs.last().map(|s| s.p1).unwrap_or(0.0)
    }

    /// Command position at time `t`.
    pub fn position_at(&self, t: f64) -> f64 {
        let mut rem = t;
        for seg in &self.segs {
            if rem < seg.dur {
                return seg.position_at(rem);
            }
            rem -= seg.dur;
        }
        self.final_position()
    }

    /// Command velocity at time `t`.
    pub fn velocity_at(&self, t: f64) -> f64 {
        let mut rem = t;
        for seg in &self.segs {
            if rem < seg.dur {
                return seg.velocity_at(rem);
            }
            rem -= seg.dur;
        }
        0.0
    }

    /// Whether playback is exhausted at time `t`.
    pub fn is_complete(&self, t: f64) -> bool {
        t >= self.duration()
    }
}

/// One axis's reserved playback inside a sync window.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// Axis to start.
    pub axis: AxisId,
    /// Compiled curve.
    pub curve: PvtCurve,
}

/// A sync group: axis map plus reservation window state.
#[derive(Debug, Default)]
pub struct SyncGroup {
    axes: Vec<AxisId, MAX_SYNC_AXES>,
    window_open: bool,
    reservations: Vec<Reservation, MAX_SYNC_AXES>,
}

impl SyncGroup {
    /// Replace the axis map.
    pub fn set_axis_map(&mut self, axes: &[AxisId]) -> Result<()> {
        if axes.len() > MAX_SYNC_AXES {
            return Err(Error::InvalidParameter(ParamIssue::TableCapacity));
        }
        self.axes.clear();
        let _ = self.axes.extend_from_slice(axes);
        Ok(())
    }

    /// Whether an axis belongs to the map.
    pub fn maps(&self, axis: AxisId) -> bool {
        self.axes.iter().any(|&a| a == axis)
    }

    /// Open the reservation window.
    pub fn begin(&mut self) {
        self.window_open = true;
        self.reservations.clear();
    }

    /// Close the reservation window (reservations stay parked until
    /// `take_reservations`).
    pub fn end(&mut self) {
        self.window_open = false;
    }

    /// Whether calls on mapped axes should be reserved right now.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.window_open
    }

    /// Park a playback for the synchronized start.
    pub fn reserve(&mut self, axis: AxisId, curve: PvtCurve) -> Result<()> {
        // A later reservation for the same axis replaces the earlier.
        if let Some(slot) = self.reservations.iter_mut().find(|r| r.axis == axis) {
            slot.curve = curve;
            return Ok(());
        }
        self.reservations
            .push(Reservation { axis, curve })
            .map_err(|_| Error::QueueFull)
    }

    /// Take all parked reservations for a simultaneous start.
    pub fn take_reservations(&mut self) -> Vec<Reservation, MAX_SYNC_AXES> {
        self.window_open = false;
        core::mem::take(&mut self.reservations)
    }

    /// Parked reservation count.
    pub fn reserved(&self) -> usize {
        self.reservations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYCLE: CycleTime = CycleTime(1000);

    #[test]
    fn hermite_hits_points_and_velocities() {
        let points = [
            PvtPoint { position: 1.0, velocity: 2.0, dt_us: 100_000 },
            PvtPoint { position: 2.0, velocity: 0.0, dt_us: 200_000 },
        ];
        let curve = PvtCurve::compile(0.0, 0.0, &points, CYCLE).unwrap();
        assert!((curve.duration() - 0.3).abs() < 1e-12);
        assert!((curve.position_at(0.1) - 1.0).abs() < 1e-9);
        assert!((curve.velocity_at(0.1) - 2.0).abs() < 1e-6);
        assert!((curve.position_at(0.3) - 2.0).abs() < 1e-9);
        assert!((curve.velocity_at(0.3)).abs() < 1e-6);
    }

    #[test]
    fn dt_must_be_cycle_multiple() {
        let points = [PvtPoint { position: 1.0, velocity: 0.0, dt_us: 1500 }];
        let err = PvtCurve::compile(0.0, 0.0, &points, CYCLE);
        assert!(matches!(
            err,
            Err(Error::InvalidParameter(ParamIssue::CycleMultiple))
        ));
    }

    #[test]
    fn reservation_window() {
        let mut group = SyncGroup::default();
        group.set_axis_map(&[0, 1]).unwrap();
        assert!(group.maps(0));
        assert!(!group.maps(3));

        group.begin();
        assert!(group.is_open());
        let points = [PvtPoint { position: 1.0, velocity: 0.0, dt_us: 1000 }];
        let curve = PvtCurve::compile(0.0, 0.0, &points, CYCLE).unwrap();
        group.reserve(0, curve.clone()).unwrap();
        group.reserve(1, curve).unwrap();
        group.end();

        let fired = group.take_reservations();
        assert_eq!(fired.len(), 2);
        assert_eq!(group.reserved(), 0);
    }
}
