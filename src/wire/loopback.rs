//! Loopback wire: pulses echo straight into the encoder stream.
//!
//! The simulation double used by the integration tests and useful for
//! dry-running motion programs. Optional switch models derive limit,
//! home and Z-phase inputs from the simulated position so sensor
//! searches behave like a real machine.

use heapless::Vec;

use crate::error::Result;
use crate::param::MAX_AXES;
use crate::signal::{InputBits, OutputBits};
use crate::units::AxisId;

use super::drive::{DriveCommand, DriveReply};
use super::Wire;

/// Position-driven input switches for one simulated axis.
///
/// All positions are in pulses of the simulated encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchModel {
    /// Home sensor active inside `[start, end]`.
    pub home_window: Option<(i64, i64)>,
    /// Positive limit active at or beyond this count.
    pub limit_pos_at: Option<i64>,
    /// Negative limit active at or below this count.
    pub limit_neg_at: Option<i64>,
    /// Z-phase active for `z_width` counts every `z_period` counts.
    pub z_period: Option<i64>,
    /// Width of the Z-phase window in counts.
    pub z_width: i64,
}

impl SwitchModel {
    fn bits_at(&self, count: i64) -> InputBits {
        let mut bits = InputBits::default();
        if let Some((lo, hi)) = self.home_window {
            bits.set(InputBits::HOME, count >= lo && count <= hi);
        }
        if let Some(at) = self.limit_pos_at {
            bits.set(InputBits::LIMIT_POS, count >= at);
        }
        if let Some(at) = self.limit_neg_at {
            bits.set(InputBits::LIMIT_NEG, count <= at);
        }
        if let Some(period) = self.z_period {
            if period > 0 {
                let phase = count.rem_euclid(period);
                bits.set(InputBits::Z_PHASE, phase < self.z_width.max(1));
            }
        }
        bits
    }
}

#[derive(Debug, Clone, Default)]
struct AxisSim {
    count: i64,
    forced: InputBits,
    switches: SwitchModel,
    outputs: OutputBits,
    pending_reply: Option<DriveReply>,
    /// Cycles a drive reply stays in flight before poll sees it.
    reply_delay: u32,
}

/// A wire whose command pulses are echoed into its own encoder counts.
#[derive(Debug, Clone, Default)]
pub struct LoopbackWire {
    axes: Vec<AxisSim, MAX_AXES>,
}

impl LoopbackWire {
    /// A loopback with `count` simulated axes.
    pub fn new(count: u8) -> Self {
        let mut axes = Vec::new();
        for _ in 0..count.min(MAX_AXES as u8) {
            let _ = axes.push(AxisSim::default());
        }
        Self { axes }
    }

    fn axis(&mut self, id: AxisId) -> &mut AxisSim {
        &mut self.axes[id as usize]
    }

    /// Force a raw input line on or off, overriding the switch model.
    pub fn force_input(&mut self, id: AxisId, mask: u16, value: bool) {
        self.axis(id).forced.set(mask, value);
    }

    /// Install a position-driven switch model for an axis.
    pub fn set_switches(&mut self, id: AxisId, model: SwitchModel) {
        self.axis(id).switches = model;
    }

    /// Simulated encoder count.
    pub fn count(&self, id: AxisId) -> i64 {
        self.axes[id as usize].count
    }

    /// Move the simulated mechanics directly (disturbance injection).
    pub fn displace(&mut self, id: AxisId, delta: i64) {
        self.axis(id).count += delta;
    }

    /// Last output register written for an axis.
    pub fn outputs(&self, id: AxisId) -> OutputBits {
        self.axes[id as usize].outputs
    }

    /// Delay drive replies by a number of polls (timeout testing).
    pub fn set_reply_delay(&mut self, id: AxisId, polls: u32) {
        self.axis(id).reply_delay = polls;
    }
}

impl Wire for LoopbackWire {
    fn write_pulses(&mut self, axis: AxisId, delta: i64) {
        self.axis(axis).count += delta;
    }

    fn read_encoder(&mut self, axis: AxisId) -> i64 {
        self.axes[axis as usize].count
    }

    fn scan_inputs(&mut self, axis: AxisId) -> InputBits {
        let sim = &self.axes[axis as usize];
        let mut bits = sim.switches.bits_at(sim.count);
        bits.0 |= sim.forced.0;
        bits
    }

    fn write_outputs(&mut self, axis: AxisId, outputs: OutputBits) {
        self.axis(axis).outputs = outputs;
    }

    fn send_drive(&mut self, axis: AxisId, command: &DriveCommand) -> Result<()> {
        let reply = match command {
            DriveCommand::ReadParam { index } => DriveReply::Param {
                value: *index as i32,
            },
            DriveCommand::ReadAlarm => DriveReply::Alarm { code: 0 },
            _ => DriveReply::Ack,
        };
        self.axis(axis).pending_reply = Some(reply);
        Ok(())
    }

    fn poll_drive(&mut self, axis: AxisId) -> Option<DriveReply> {
        let sim = self.axis(axis);
        if sim.reply_delay > 0 {
            sim.reply_delay -= 1;
            return None;
        }
        sim.pending_reply.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulses_echo_to_encoder() {
        let mut wire = LoopbackWire::new(1);
        wire.write_pulses(0, 100);
        wire.write_pulses(0, -30);
        assert_eq!(wire.read_encoder(0), 70);
    }

    #[test]
    fn switch_model_tracks_position() {
        let mut wire = LoopbackWire::new(1);
        wire.set_switches(
            0,
            SwitchModel {
                home_window: Some((-500, 0)),
                limit_neg_at: Some(-2000),
                ..Default::default()
            },
        );
        assert!(wire.scan_inputs(0).get(InputBits::HOME));
        wire.write_pulses(0, 1000);
        assert!(!wire.scan_inputs(0).get(InputBits::HOME));
        wire.write_pulses(0, -3100);
        let scan = wire.scan_inputs(0);
        assert!(scan.get(InputBits::LIMIT_NEG));
    }

    #[test]
    fn drive_round_trip() {
        let mut wire = LoopbackWire::new(1);
        wire.send_drive(0, &DriveCommand::ReadParam { index: 7 }).unwrap();
        assert_eq!(wire.poll_drive(0), Some(DriveReply::Param { value: 7 }));
        assert_eq!(wire.poll_drive(0), None);
    }

    #[test]
    fn z_phase_period() {
        let mut wire = LoopbackWire::new(1);
        wire.set_switches(
            0,
            SwitchModel {
                z_period: Some(1000),
                z_width: 2,
                ..Default::default()
            },
        );
        assert!(wire.scan_inputs(0).get(InputBits::Z_PHASE));
        wire.write_pulses(0, 500);
        assert!(!wire.scan_inputs(0).get(InputBits::Z_PHASE));
        wire.write_pulses(0, 500);
        assert!(wire.scan_inputs(0).get(InputBits::Z_PHASE));
    }
}
