//! Unit types for physical quantities.
//!
//! Provides type-safe representations of user distance units, hardware
//! pulse counts, velocities and accelerations, plus the per-axis
//! unit/pulse calibration that converts between the two worlds.

use core::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ParamIssue, Result};

/// Axis identifier. Axes are numbered densely from zero.
pub type AxisId = u8;

/// Distance in user units (mm, degrees, whatever the calibration says).
///
/// Used for configuration and the client-facing API. Internally
/// converted to [`Pulses`] at the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Units(pub f64);

impl Units {
    /// Create a new Units value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Absolute value.
    #[inline]
    pub fn abs(self) -> Self {
        Self(libm::fabs(self.0))
    }
}

impl Add for Units {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Units {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Units {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

/// Velocity in user units per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitsPerSec(pub f64);

impl UnitsPerSec {
    /// Create a new UnitsPerSec value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Mul<f64> for UnitsPerSec {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Acceleration in user units per second squared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitsPerSec2(pub f64);

impl UnitsPerSec2 {
    /// Create a new UnitsPerSec2 value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Mul<f64> for UnitsPerSec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Hardware position in pulses (signed accumulator from the origin).
///
/// Uses i64 for unlimited range in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pulses(pub i64);

impl Pulses {
    /// Create a new Pulses value.
    #[inline]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Get absolute value as u64.
    #[inline]
    pub fn abs(self) -> u64 {
        self.0.unsigned_abs()
    }
}

impl Add for Pulses {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Pulses {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Per-axis unit/pulse calibration, kept as a rational so that a
/// round number of pulses maps to a round distance and back.
///
/// `unit / pulse` is the distance one pulse moves the axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitRatio {
    /// Distance numerator in user units.
    pub unit: f64,
    /// Pulse count denominator.
    pub pulse: f64,
}

impl UnitRatio {
    /// Identity calibration: one unit per pulse.
    pub const IDENTITY: Self = Self { unit: 1.0, pulse: 1.0 };

    /// Create a calibration, validating that both terms are positive.
    pub fn new(unit: f64, pulse: f64) -> Result<Self> {
        if unit > 0.0 && pulse > 0.0 {
            Ok(Self { unit, pulse })
        } else {
            Err(Error::InvalidParameter(ParamIssue::UnitRatio))
        }
    }

    /// Distance covered by one pulse.
    #[inline]
    pub fn units_per_pulse(&self) -> f64 {
        self.unit / self.pulse
    }

    /// Pulses per one unit of distance.
    #[inline]
    pub fn pulses_per_unit(&self) -> f64 {
        self.pulse / self.unit
    }

    /// Convert a distance to the nearest whole pulse count.
    #[inline]
    pub fn to_pulses(&self, distance: Units) -> Pulses {
        Pulses(libm::round(distance.0 * self.pulses_per_unit()) as i64)
    }

    /// Convert a pulse count back to distance.
    #[inline]
    pub fn to_units(&self, pulses: Pulses) -> Units {
        Units(pulses.0 as f64 * self.units_per_pulse())
    }
}

impl Default for UnitRatio {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Control cycle period in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleTime(pub u32);

impl CycleTime {
    /// The default control cycle: 1 ms.
    pub const DEFAULT: Self = Self(1000);

    /// Cycle period in seconds.
    #[inline]
    pub fn secs(self) -> f64 {
        self.0 as f64 * 1e-6
    }

    /// Cycle period in microseconds.
    #[inline]
    pub const fn micros(self) -> u32 {
        self.0
    }
}

impl Default for CycleTime {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Extension trait for creating unit types from primitives.
pub trait UnitExt {
    /// Convert to Units.
    fn units(self) -> Units;
    /// Convert to UnitsPerSec.
    fn units_per_sec(self) -> UnitsPerSec;
    /// Convert to UnitsPerSec2.
    fn units_per_sec2(self) -> UnitsPerSec2;
}

impl UnitExt for f64 {
    #[inline]
    fn units(self) -> Units {
        Units(self)
    }

    #[inline]
    fn units_per_sec(self) -> UnitsPerSec {
        UnitsPerSec(self)
    }

    #[inline]
    fn units_per_sec2(self) -> UnitsPerSec2 {
        UnitsPerSec2(self)
    }
}
