//! Per-axis signal bank: polarity, debounce filtering, outputs.

use heapless::Vec;

use crate::param::{AxisParams, Level, StopMode};

use super::bits::{FilterClass, InputBits, OutputBits, OutputSignal, Signal, INPUT_COUNT};

/// Filter bandwidth limits, in tenths of a microsecond.
const FILTER_MIN_TENTH_US: u32 = 2; // 0.2 us
const FILTER_MAX_TENTH_US: u32 = 266_660; // 26_666 us

/// Maximum simultaneously pending timed output pulses.
const MAX_TIMED: usize = 4;

#[derive(Debug, Clone, Copy)]
struct TimedPulse {
    /// General-output bits to clear on expiry.
    mask: u8,
    remaining_us: u32,
}

/// Sampled input state, debounce filters and output register for one
/// axis.
///
/// `sample()` feeds a raw electrical scan once per control cycle; a
/// level change propagates to the filtered image only after it has held
/// for the class filter time. Logical reads apply the configured active
/// level on top of the filtered image.
#[derive(Debug, Clone)]
pub struct SignalBank {
    raw: InputBits,
    filtered: InputBits,
    /// Time each line has spent at a level differing from `filtered`.
    hold_tenth_us: [u32; INPUT_COUNT],
    levels: [Level; INPUT_COUNT],
    /// Per-class debounce time, tenths of a microsecond.
    filter_tenth_us: [u32; 3],
    outputs: OutputBits,
    timed: Vec<TimedPulse, MAX_TIMED>,
    estop_policy: StopMode,
}

impl Default for SignalBank {
    fn default() -> Self {
        Self {
            raw: InputBits::default(),
            filtered: InputBits::default(),
            hold_tenth_us: [0; INPUT_COUNT],
            levels: [Level::ActiveHigh; INPUT_COUNT],
            filter_tenth_us: [FILTER_MIN_TENTH_US; 3],
            outputs: OutputBits::default(),
            timed: Vec::new(),
            estop_policy: StopMode::Emergency,
        }
    }
}

impl SignalBank {
    /// Build a bank with levels taken from the axis parameters.
    pub fn from_params(params: &AxisParams) -> Self {
        let mut bank = Self::default();
        bank.set_level(Signal::InPosition, params.inpos_level);
        bank.set_level(Signal::ServoAlarm, params.alarm_level);
        bank.set_level(Signal::LimitPositive, params.limit_level);
        bank.set_level(Signal::LimitNegative, params.limit_level);
        bank.set_level(Signal::EmergencyStop, params.estop_level);
        bank
    }

    /// Configure the active level of an input line.
    pub fn set_level(&mut self, signal: Signal, level: Level) {
        self.levels[signal.index()] = level;
    }

    /// Configure a class debounce bandwidth in microseconds.
    ///
    /// Clamped to the supported 0.2 µs – 26 666 µs window.
    pub fn set_filter_us(&mut self, class: FilterClass, micros: f64) {
        let tenths = (micros * 10.0) as u32;
        self.filter_tenth_us[class.index()] =
            tenths.clamp(FILTER_MIN_TENTH_US, FILTER_MAX_TENTH_US);
    }

    /// Stop behavior when the emergency-stop input fires.
    pub fn set_estop_policy(&mut self, policy: StopMode) {
        self.estop_policy = policy;
    }

    /// Stop behavior of the emergency-stop input.
    #[inline]
    pub fn estop_policy(&self) -> StopMode {
        self.estop_policy
    }

    /// Feed one raw scan, advancing debounce state by `dt_us`.
    pub fn sample(&mut self, scan: InputBits, dt_us: u32) {
        self.raw = scan;
        let dt_tenths = dt_us.saturating_mul(10);
        for sig in Signal::ALL {
            let idx = sig.index();
            let mask = sig.mask();
            if scan.get(mask) == self.filtered.get(mask) {
                self.hold_tenth_us[idx] = 0;
                continue;
            }
            self.hold_tenth_us[idx] = self.hold_tenth_us[idx].saturating_add(dt_tenths);
            if self.hold_tenth_us[idx] >= self.filter_tenth_us[sig.filter_class().index()] {
                self.filtered.set(mask, scan.get(mask));
                self.hold_tenth_us[idx] = 0;
            }
        }
        self.advance_timed(dt_us);
    }

    /// Raw electrical level of a line, unfiltered.
    #[inline]
    pub fn read_raw(&self, signal: Signal) -> bool {
        self.raw.get(signal.mask())
    }

    /// Level-corrected, debounced state of a line.
    #[inline]
    pub fn read_logical(&self, signal: Signal) -> bool {
        let electrical = self.filtered.get(signal.mask());
        match self.levels[signal.index()] {
            Level::ActiveHigh => electrical,
            Level::ActiveLow => !electrical,
        }
    }

    /// Filtered scan image (electrical levels).
    #[inline]
    pub fn filtered(&self) -> InputBits {
        self.filtered
    }

    /// General-purpose input nibble, logical levels.
    pub fn uio_in(&self) -> u8 {
        let mut bits = 0u8;
        for n in 0..4 {
            if self.read_logical(Signal::GeneralIn(n)) {
                bits |= 1 << n;
            }
        }
        bits
    }

    /// Write one output line.
    pub fn write_output(&mut self, signal: OutputSignal, value: bool) {
        match signal {
            OutputSignal::ServoOn => self.outputs.servo_on = value,
            OutputSignal::AlarmReset => self.outputs.alarm_reset = value,
            OutputSignal::GeneralOut(n) => {
                let mask = 1u8 << (n & 0x3);
                if value {
                    self.outputs.general |= mask;
                } else {
                    self.outputs.general &= !mask;
                }
            }
        }
    }

    /// Assert a set of general outputs for a bounded time, then clear.
    pub fn pulse_output_for_ms(&mut self, general_mask: u8, duration_ms: u32) {
        let mask = general_mask & 0x0f;
        self.outputs.general |= mask;
        if self.timed.push(TimedPulse {
            mask,
            remaining_us: duration_ms.saturating_mul(1000),
        }).is_err() {
            // Bank full: fold into the soonest-expiring slot.
            if let Some(slot) = self.timed.first_mut() {
                slot.mask |= mask;
            }
        }
    }

    /// Current output register image.
    #[inline]
    pub fn outputs(&self) -> OutputBits {
        self.outputs
    }

    fn advance_timed(&mut self, dt_us: u32) {
        let mut expired = 0u8;
        for pulse in self.timed.iter_mut() {
            pulse.remaining_us = pulse.remaining_us.saturating_sub(dt_us);
            if pulse.remaining_us == 0 {
                expired |= pulse.mask;
            }
        }
        if expired != 0 {
            self.outputs.general &= !expired;
            self.timed.retain(|p| p.remaining_us > 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(bits: u16) -> InputBits {
        InputBits(bits)
    }

    #[test]
    fn debounce_requires_hold_time() {
        let mut bank = SignalBank::default();
        bank.set_filter_us(FilterClass::Uio, 3000.0);

        // One 1 ms sample is not enough for a 3 ms filter.
        bank.sample(scan(InputBits::HOME), 1000);
        assert!(bank.read_raw(Signal::Home));
        assert!(!bank.read_logical(Signal::Home));

        bank.sample(scan(InputBits::HOME), 1000);
        bank.sample(scan(InputBits::HOME), 1000);
        assert!(bank.read_logical(Signal::Home));
    }

    #[test]
    fn glitch_rejected() {
        let mut bank = SignalBank::default();
        bank.set_filter_us(FilterClass::Uio, 2500.0);
        bank.sample(scan(InputBits::HOME), 1000);
        bank.sample(scan(0), 1000);
        bank.sample(scan(0), 1000);
        assert!(!bank.read_logical(Signal::Home));
    }

    #[test]
    fn active_low_inverts() {
        let mut bank = SignalBank::default();
        bank.set_level(Signal::LimitPositive, Level::ActiveLow);
        bank.sample(scan(0), 1000);
        assert!(bank.read_logical(Signal::LimitPositive));
        bank.sample(scan(InputBits::LIMIT_POS), 1000);
        assert!(!bank.read_logical(Signal::LimitPositive));
    }

    #[test]
    fn timed_pulse_clears() {
        let mut bank = SignalBank::default();
        bank.pulse_output_for_ms(0b0011, 2);
        assert_eq!(bank.outputs().general, 0b0011);
        bank.sample(scan(0), 1000);
        assert_eq!(bank.outputs().general, 0b0011);
        bank.sample(scan(0), 1000);
        assert_eq!(bank.outputs().general, 0);
    }

    #[test]
    fn filter_clamped() {
        let mut bank = SignalBank::default();
        bank.set_filter_us(FilterClass::Limit, 1e9);
        assert_eq!(bank.filter_tenth_us[0], 266_660);
        bank.set_filter_us(FilterClass::Limit, 0.0);
        assert_eq!(bank.filter_tenth_us[0], 2);
    }
}
