//! Live position, velocity and motion-flag tracking for one axis.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::units::{Pulses, UnitRatio, Units, UnitsPerSec};

/// Samples in the live-velocity window.
const VEL_WINDOW: usize = 8;

/// Motion flag bits reported in the drive status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionFlags(pub u16);

impl MotionFlags {
    /// Pulse train active.
    pub const IN_MOTION: u16 = 1 << 0;
    /// Accelerating.
    pub const ACCEL: u16 = 1 << 1;
    /// At constant velocity.
    pub const CRUISE: u16 = 1 << 2;
    /// Decelerating.
    pub const DECEL: u16 = 1 << 3;
    /// Homing sequence active.
    pub const HOMING: u16 = 1 << 4;
    /// Torque mode active.
    pub const TORQUE: u16 = 1 << 5;
    /// Latched fault present.
    pub const FAULT: u16 = 1 << 6;

    /// Test a flag bit.
    #[inline]
    pub fn has(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    /// Set or clear a flag bit.
    #[inline]
    pub fn set(&mut self, bit: u16, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// Position representation for reported values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PosRepr {
    /// Monotonic within the soft range; no wrapping.
    Limit,
    /// Ring-wrap between the two bounds. The wrap applies only while
    /// the position is inside the window; values that start outside
    /// carry through unchanged. Rarely the right choice outside of
    /// rotary tables.
    Bound {
        /// Lower wrap bound.
        negative: Units,
        /// Upper wrap bound.
        positive: Units,
    },
}

/// Per-axis status accumulator, updated once per control cycle.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    ratio: UnitRatio,
    cmd_pos: f64,
    enc_count: i64,
    enc_offset: i64,
    /// Signed pulses delivered since the current motion started.
    drive_pulses: i64,
    vel_window: [f64; VEL_WINDOW],
    vel_idx: usize,
    repr: PosRepr,
    flags: MotionFlags,
    last_error: Option<Error>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new(UnitRatio::IDENTITY)
    }
}

impl StatusTracker {
    /// New tracker with the given calibration.
    pub fn new(ratio: UnitRatio) -> Self {
        Self {
            ratio,
            cmd_pos: 0.0,
            enc_count: 0,
            enc_offset: 0,
            drive_pulses: 0,
            vel_window: [0.0; VEL_WINDOW],
            vel_idx: 0,
            repr: PosRepr::Limit,
            flags: MotionFlags::default(),
            last_error: None,
        }
    }

    /// Update the calibration (position readings keep their pulse truth).
    pub fn set_ratio(&mut self, ratio: UnitRatio) {
        self.ratio = ratio;
    }

    /// Current command position.
    #[inline]
    pub fn cmd_pos(&self) -> Units {
        Units(self.cmd_pos)
    }

    /// Forcibly set the command position. No wrap is applied.
    pub fn set_cmd_pos(&mut self, pos: Units) {
        self.cmd_pos = pos.0;
    }

    /// Actual position derived from the encoder stream.
    #[inline]
    pub fn actual_pos(&self) -> Units {
        self.ratio.to_units(Pulses(self.enc_count + self.enc_offset))
    }

    /// Forcibly set the actual position by re-biasing the encoder.
    pub fn set_actual_pos(&mut self, pos: Units) {
        self.enc_offset = self.ratio.to_pulses(pos).0 - self.enc_count;
    }

    /// Align the actual position to the command position.
    pub fn pos_match(&mut self) {
        self.set_actual_pos(Units(self.cmd_pos));
    }

    /// Position error (command minus actual).
    #[inline]
    pub fn position_error(&self) -> Units {
        Units(self.cmd_pos - self.actual_pos().0)
    }

    /// Feed the latest encoder count.
    pub fn update_encoder(&mut self, count: i64) {
        self.enc_count = count;
    }

    /// Reset the per-motion pulse accumulator and stale fault latch.
    pub fn begin_motion(&mut self) {
        self.drive_pulses = 0;
        self.last_error = None;
        self.flags.set(MotionFlags::FAULT, false);
    }

    /// Record pulses delivered this cycle.
    pub fn add_drive_pulses(&mut self, delta: i64) {
        self.drive_pulses += delta;
    }

    /// Signed pulse count since motion start.
    #[inline]
    pub fn drive_pulses(&self) -> i64 {
        self.drive_pulses
    }

    /// Distance covered since motion start, in user units.
    #[inline]
    pub fn drive_distance(&self) -> Units {
        self.ratio.to_units(Pulses(self.drive_pulses))
    }

    /// Advance the command position by one cycle, applying the wrap
    /// rule and feeding the velocity window.
    pub fn update_cmd(&mut self, new_cmd: Units, dt_secs: f64) {
        let old = self.cmd_pos;
        let mut new = new_cmd.0;

        if let PosRepr::Bound { negative, positive } = self.repr {
            let range = positive.0 - negative.0;
            if range > 0.0 {
                let was_inside = old >= negative.0 && old <= positive.0;
                if was_inside && new > positive.0 {
                    new -= range;
                } else if was_inside && new < negative.0 {
                    new += range;
                }
            }
        }

        if dt_secs > 0.0 {
            // Velocity is measured on the raw advance, not the wrapped
            // report.
            self.vel_window[self.vel_idx] = (new_cmd.0 - old) / dt_secs;
            self.vel_idx = (self.vel_idx + 1) % VEL_WINDOW;
        }
        self.cmd_pos = new;
    }

    /// Record an idle cycle in the velocity window.
    pub fn update_idle(&mut self) {
        self.vel_window[self.vel_idx] = 0.0;
        self.vel_idx = (self.vel_idx + 1) % VEL_WINDOW;
    }

    /// Live velocity: short-window finite difference of the command
    /// stream.
    pub fn velocity(&self) -> UnitsPerSec {
        let sum: f64 = self.vel_window.iter().sum();
        UnitsPerSec(sum / VEL_WINDOW as f64)
    }

    /// Select the reported position representation.
    pub fn set_repr(&mut self, repr: PosRepr) {
        self.repr = repr;
    }

    /// Currently selected representation.
    #[inline]
    pub fn repr(&self) -> PosRepr {
        self.repr
    }

    /// Motion flag word.
    #[inline]
    pub fn flags(&self) -> MotionFlags {
        self.flags
    }

    /// Mutable access for the executor.
    pub(crate) fn flags_mut(&mut self) -> &mut MotionFlags {
        &mut self.flags
    }

    /// Pulse train active this cycle.
    #[inline]
    pub fn in_motion(&self) -> bool {
        self.flags.has(MotionFlags::IN_MOTION)
    }

    /// Latch an asynchronous motion error.
    pub(crate) fn latch_error(&mut self, err: Error) {
        self.last_error = Some(err);
        self.flags.set(MotionFlags::FAULT, true);
    }

    /// Read and keep the latched error, if any.
    #[inline]
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    /// Clear the latched error.
    pub fn clear_error(&mut self) {
        self.last_error = None;
        self.flags.set(MotionFlags::FAULT, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> StatusTracker {
        StatusTracker::new(UnitRatio::new(1.0, 1000.0).unwrap())
    }

    #[test]
    fn actual_follows_encoder() {
        let mut t = tracker();
        t.update_encoder(5000);
        assert!((t.actual_pos().0 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn pos_match_aligns() {
        let mut t = tracker();
        t.update_encoder(5000);
        t.set_cmd_pos(Units(2.0));
        t.pos_match();
        assert!((t.position_error().0).abs() < 1e-9);
        // Further encoder motion still tracks.
        t.update_encoder(6000);
        assert!((t.actual_pos().0 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn bound_wraps_inside_window_only() {
        let mut t = tracker();
        t.set_repr(PosRepr::Bound {
            negative: Units(0.0),
            positive: Units(360.0),
        });
        t.set_cmd_pos(Units(350.0));
        t.update_cmd(Units(370.0), 0.001);
        assert!((t.cmd_pos().0 - 10.0).abs() < 1e-9);

        // Starting outside the window: carried through unchanged.
        t.set_cmd_pos(Units(500.0));
        t.update_cmd(Units(510.0), 0.001);
        assert!((t.cmd_pos().0 - 510.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_window_mean() {
        let mut t = tracker();
        let mut pos = 0.0;
        for _ in 0..8 {
            pos += 0.1;
            t.update_cmd(Units(pos), 0.001);
        }
        assert!((t.velocity().0 - 100.0).abs() < 1e-6);
    }
}
