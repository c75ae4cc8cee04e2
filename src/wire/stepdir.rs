//! Single-axis step/dir adapter over embedded-hal 1.0 pins.
//!
//! Bridges the cycle-level pulse deltas onto a STEP/DIR pin pair for
//! drives wired straight to GPIO. Only the one-pulse method maps onto
//! two pins; the two-phase and quadrature methods need a pulse unit in
//! hardware and are left to that transport.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::param::{Level, PulseMethod};
use crate::signal::{InputBits, OutputBits};
use crate::units::AxisId;

use super::Wire;

/// Width of each emitted step pulse.
const PULSE_WIDTH_US: u32 = 2;

/// One-axis wire over embedded-hal STEP/DIR output pins.
///
/// The encoder stream is mirrored from the emitted pulses (open-loop
/// drives report no feedback of their own).
pub struct StepDirWire<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    step_pin: STEP,
    dir_pin: DIR,
    delay: DELAY,
    level: Level,
    invert_direction: bool,
    count: i64,
    /// Cached direction pin state to avoid redundant writes.
    dir_high: Option<bool>,
    inputs: InputBits,
    outputs: OutputBits,
}

impl<STEP, DIR, DELAY> StepDirWire<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    /// Build an adapter for the one-pulse method.
    ///
    /// Returns `None` for pulse methods this adapter cannot express.
    pub fn new(
        method: PulseMethod,
        level: Level,
        step_pin: STEP,
        dir_pin: DIR,
        delay: DELAY,
    ) -> Option<Self> {
        if method != PulseMethod::OnePulse {
            return None;
        }
        Some(Self {
            step_pin,
            dir_pin,
            delay,
            level,
            invert_direction: false,
            count: 0,
            dir_high: None,
            inputs: InputBits::default(),
            outputs: OutputBits::default(),
        })
    }

    /// Invert the direction pin sense.
    pub fn invert_direction(mut self, invert: bool) -> Self {
        self.invert_direction = invert;
        self
    }

    /// Reflect externally sampled input lines into the scan.
    pub fn set_inputs(&mut self, inputs: InputBits) {
        self.inputs = inputs;
    }

    fn set_direction(&mut self, positive: bool) {
        let high = positive != self.invert_direction;
        if self.dir_high == Some(high) {
            return;
        }
        if high {
            let _ = self.dir_pin.set_high();
        } else {
            let _ = self.dir_pin.set_low();
        }
        self.dir_high = Some(high);
    }

    fn emit_pulse(&mut self) {
        let (active, idle) = match self.level {
            Level::ActiveHigh => (true, false),
            Level::ActiveLow => (false, true),
        };
        let _ = if active {
            self.step_pin.set_high()
        } else {
            self.step_pin.set_low()
        };
        self.delay.delay_us(PULSE_WIDTH_US);
        let _ = if idle {
            self.step_pin.set_high()
        } else {
            self.step_pin.set_low()
        };
    }
}

impl<STEP, DIR, DELAY> Wire for StepDirWire<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    fn write_pulses(&mut self, _axis: AxisId, delta: i64) {
        if delta == 0 {
            return;
        }
        self.set_direction(delta > 0);
        for _ in 0..delta.unsigned_abs() {
            self.emit_pulse();
        }
        self.count += delta;
    }

    fn read_encoder(&mut self, _axis: AxisId) -> i64 {
        self.count
    }

    fn scan_inputs(&mut self, _axis: AxisId) -> InputBits {
        self.inputs
    }

    fn write_outputs(&mut self, _axis: AxisId, outputs: OutputBits) {
        self.outputs = outputs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[test]
    fn emits_pulses_with_direction() {
        let step_expect = [
            Transaction::set(State::High),
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
        ];
        let dir_expect = [Transaction::set(State::High)];
        let mut step = PinMock::new(&step_expect);
        let mut dir = PinMock::new(&dir_expect);

        {
            let mut wire = StepDirWire::new(
                PulseMethod::OnePulse,
                Level::ActiveHigh,
                step.clone(),
                dir.clone(),
                NoopDelay::new(),
            )
            .unwrap();
            wire.write_pulses(0, 2);
            assert_eq!(wire.read_encoder(0), 2);
        }

        step.done();
        dir.done();
    }

    #[test]
    fn rejects_quadrature_method() {
        let step = PinMock::new(&[]);
        let dir = PinMock::new(&[]);
        let wire = StepDirWire::new(
            PulseMethod::QuadratureLead,
            Level::ActiveHigh,
            step.clone(),
            dir.clone(),
            NoopDelay::new(),
        );
        assert!(wire.is_none());
        let mut step = step;
        let mut dir = dir;
        step.done();
        dir.done();
    }
}
