//! Position capture on an external signal edge.

use crate::signal::{Signal, SignalBank};
use crate::units::Units;

/// Latch that records the actual position at a signal edge.
///
/// The captured value is readable exactly once; reading consumes it.
#[derive(Debug, Default)]
pub struct CaptureLatch {
    armed: bool,
    signal: Option<Signal>,
    /// `true` latches on inactive→active, `false` on active→inactive.
    rising: bool,
    last_active: bool,
    value: Option<f64>,
}

impl CaptureLatch {
    /// Arm the latch on a signal edge. Overwrites any previous arming
    /// and discards an unread capture.
    pub fn arm(&mut self, signal: Signal, rising: bool, bank: &SignalBank) {
        self.armed = true;
        self.signal = Some(signal);
        self.rising = rising;
        self.last_active = bank.read_logical(signal);
        self.value = None;
    }

    /// Disarm without capturing.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Whether the latch is waiting for its edge.
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether a value is waiting to be read.
    #[inline]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Advance one cycle. Returns `true` on the capturing edge.
    pub fn tick(&mut self, bank: &SignalBank, actual: Units) -> bool {
        if !self.armed {
            return false;
        }
        let Some(signal) = self.signal else {
            return false;
        };
        let active = bank.read_logical(signal);
        let edge = if self.rising {
            active && !self.last_active
        } else {
            !active && self.last_active
        };
        self.last_active = active;
        if edge {
            self.value = Some(actual.0);
            self.armed = false;
        }
        edge
    }

    /// Read the captured value, consuming it.
    pub fn take(&mut self) -> Option<Units> {
        self.value.take().map(Units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::InputBits;

    #[test]
    fn captures_once_on_rising_edge() {
        let mut bank = SignalBank::default();
        let mut latch = CaptureLatch::default();
        bank.sample(InputBits::default(), 1000);
        latch.arm(Signal::Home, true, &bank);

        assert!(!latch.tick(&bank, Units(1.0)));
        bank.sample(InputBits(InputBits::HOME), 1000);
        assert!(latch.tick(&bank, Units(2.5)));

        // Read-once semantics.
        assert_eq!(latch.take(), Some(Units(2.5)));
        assert_eq!(latch.take(), None);

        // No re-capture without re-arming.
        bank.sample(InputBits::default(), 1000);
        bank.sample(InputBits(InputBits::HOME), 1000);
        assert!(!latch.tick(&bank, Units(9.0)));
    }

    #[test]
    fn falling_edge_polarity() {
        let mut bank = SignalBank::default();
        bank.sample(InputBits(InputBits::HOME), 1000);
        let mut latch = CaptureLatch::default();
        latch.arm(Signal::Home, false, &bank);

        bank.sample(InputBits::default(), 1000);
        assert!(latch.tick(&bank, Units(7.0)));
        assert_eq!(latch.take(), Some(Units(7.0)));
    }
}
