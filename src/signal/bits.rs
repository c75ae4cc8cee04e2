//! Digital line identities and scan bitmasks.

use serde::{Deserialize, Serialize};

/// One sampled set of per-axis input lines, raw electrical levels.
///
/// Bit set = line electrically high. Polarity correction happens in
/// the bank via the configured active levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputBits(pub u16);

impl InputBits {
    /// Encoder Z-phase.
    pub const Z_PHASE: u16 = 1 << 0;
    /// Servo in-position.
    pub const INPOSITION: u16 = 1 << 1;
    /// Servo alarm.
    pub const ALARM: u16 = 1 << 2;
    /// Positive end limit.
    pub const LIMIT_POS: u16 = 1 << 3;
    /// Negative end limit.
    pub const LIMIT_NEG: u16 = 1 << 4;
    /// Home sensor.
    pub const HOME: u16 = 1 << 5;
    /// Emergency stop input.
    pub const ESTOP: u16 = 1 << 6;
    /// First general-purpose input; the next three follow in order.
    pub const UIO_IN_0: u16 = 1 << 7;

    /// Test a single bit.
    #[inline]
    pub fn get(self, mask: u16) -> bool {
        self.0 & mask != 0
    }

    /// Set or clear a single bit.
    #[inline]
    pub fn set(&mut self, mask: u16, value: bool) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }
}

/// Number of distinct input lines per axis.
pub const INPUT_COUNT: usize = 11;

/// Per-axis input line selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    /// Encoder Z-phase.
    ZPhase,
    /// Servo in-position.
    InPosition,
    /// Servo alarm.
    ServoAlarm,
    /// Positive end limit.
    LimitPositive,
    /// Negative end limit.
    LimitNegative,
    /// Home sensor.
    Home,
    /// Emergency stop.
    EmergencyStop,
    /// General-purpose input 0–3.
    GeneralIn(u8),
}

impl Signal {
    /// Bit mask of this line in an [`InputBits`] scan.
    #[inline]
    pub fn mask(self) -> u16 {
        match self {
            Signal::ZPhase => InputBits::Z_PHASE,
            Signal::InPosition => InputBits::INPOSITION,
            Signal::ServoAlarm => InputBits::ALARM,
            Signal::LimitPositive => InputBits::LIMIT_POS,
            Signal::LimitNegative => InputBits::LIMIT_NEG,
            Signal::Home => InputBits::HOME,
            Signal::EmergencyStop => InputBits::ESTOP,
            Signal::GeneralIn(n) => InputBits::UIO_IN_0 << (n as u16 & 0x3),
        }
    }

    /// Dense index for per-line bookkeeping.
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Signal::ZPhase => 0,
            Signal::InPosition => 1,
            Signal::ServoAlarm => 2,
            Signal::LimitPositive => 3,
            Signal::LimitNegative => 4,
            Signal::Home => 5,
            Signal::EmergencyStop => 6,
            Signal::GeneralIn(n) => 7 + (n as usize & 0x3),
        }
    }

    /// All input lines, in index order.
    pub(crate) const ALL: [Signal; INPUT_COUNT] = [
        Signal::ZPhase,
        Signal::InPosition,
        Signal::ServoAlarm,
        Signal::LimitPositive,
        Signal::LimitNegative,
        Signal::Home,
        Signal::EmergencyStop,
        Signal::GeneralIn(0),
        Signal::GeneralIn(1),
        Signal::GeneralIn(2),
        Signal::GeneralIn(3),
    ];

    /// Digital filter class this line belongs to.
    #[inline]
    pub fn filter_class(self) -> FilterClass {
        match self {
            Signal::LimitPositive | Signal::LimitNegative | Signal::EmergencyStop => {
                FilterClass::Limit
            }
            Signal::InPosition | Signal::ServoAlarm => FilterClass::InposAlarm,
            Signal::ZPhase | Signal::Home | Signal::GeneralIn(_) => FilterClass::Uio,
        }
    }
}

/// Per-axis output line selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputSignal {
    /// Servo-on.
    ServoOn,
    /// Servo alarm reset.
    AlarmReset,
    /// General-purpose output 0–3.
    GeneralOut(u8),
}

/// Per-axis output register image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputBits {
    /// Servo-on line.
    pub servo_on: bool,
    /// Alarm reset line.
    pub alarm_reset: bool,
    /// General-purpose outputs, bits 0–3.
    pub general: u8,
}

/// Digital filter bandwidth class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterClass {
    /// End limits and emergency stop.
    Limit,
    /// In-position and servo alarm.
    InposAlarm,
    /// Z-phase, home sensor and general-purpose inputs.
    Uio,
}

impl FilterClass {
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            FilterClass::Limit => 0,
            FilterClass::InposAlarm => 1,
            FilterClass::Uio => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_are_distinct() {
        let mut seen = 0u16;
        for sig in Signal::ALL {
            assert_eq!(seen & sig.mask(), 0, "overlap at {:?}", sig);
            seen |= sig.mask();
        }
    }

    #[test]
    fn indices_are_dense() {
        for (expected, sig) in Signal::ALL.iter().enumerate() {
            assert_eq!(sig.index(), expected);
        }
    }
}
