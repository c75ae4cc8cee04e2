//! Per-axis parameter record.
//!
//! [`AxisParams`] is the complete persistent configuration of one axis:
//! calibration, pulse/encoder wiring, velocity window, profile shape,
//! signal levels, homing block, backlash and soft limits. The legacy
//! parameter file maps these onto 40 ordered numeric keys; see
//! [`crate::param::motfile`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, ParamIssue, Result};
use crate::units::{Units, UnitsPerSec, UnitsPerSec2, UnitRatio};

/// Active level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Line reads logical-true when electrically high.
    #[default]
    ActiveHigh,
    /// Line reads logical-true when electrically low.
    ActiveLow,
}

impl Level {
    pub(crate) fn code(self) -> u8 {
        match self {
            Level::ActiveHigh => 0,
            Level::ActiveLow => 1,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Level::ActiveHigh),
            1 => Ok(Level::ActiveLow),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// Encoding of the command pulse train sent to the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum PulseMethod {
    /// Single pulse line plus a direction line.
    #[default]
    OnePulse,
    /// Separate clockwise / counter-clockwise pulse lines.
    CwCcw,
    /// Quadrature output, A leads B for positive travel.
    QuadratureLead,
    /// Quadrature output, A lags B for positive travel.
    QuadratureLag,
}

impl PulseMethod {
    pub(crate) fn code(self) -> u8 {
        match self {
            PulseMethod::OnePulse => 0,
            PulseMethod::CwCcw => 1,
            PulseMethod::QuadratureLead => 2,
            PulseMethod::QuadratureLag => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(PulseMethod::OnePulse),
            1 => Ok(PulseMethod::CwCcw),
            2 => Ok(PulseMethod::QuadratureLead),
            3 => Ok(PulseMethod::QuadratureLag),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// Decoding of the encoder feedback stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum EncoderMethod {
    /// Up/down count pair.
    UpDown,
    /// Quadrature, one count per full cycle.
    Quad1x,
    /// Quadrature, two counts per full cycle.
    Quad2x,
    /// Quadrature, four counts per full cycle.
    #[default]
    Quad4x,
}

impl EncoderMethod {
    pub(crate) fn code(self) -> u8 {
        match self {
            EncoderMethod::UpDown => 0,
            EncoderMethod::Quad1x => 1,
            EncoderMethod::Quad2x => 2,
            EncoderMethod::Quad4x => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(EncoderMethod::UpDown),
            1 => Ok(EncoderMethod::Quad1x),
            2 => Ok(EncoderMethod::Quad2x),
            3 => Ok(EncoderMethod::Quad4x),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// Velocity profile shape used by the profile generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum ProfileMode {
    /// Symmetric trapezoid (decel mirrors accel).
    #[default]
    Trapezoid,
    /// Asymmetric trapezoid (independent decel).
    TrapezoidAsym,
    /// Parabolic-blend velocity, no linear accel segment.
    QuasiS,
    /// Jerk-limited S-curve, symmetric.
    SCurve,
    /// Jerk-limited S-curve with independent decel shaping.
    SCurveAsym,
}

impl ProfileMode {
    pub(crate) fn code(self) -> u8 {
        match self {
            ProfileMode::Trapezoid => 0,
            ProfileMode::TrapezoidAsym => 1,
            ProfileMode::QuasiS => 2,
            ProfileMode::SCurve => 3,
            ProfileMode::SCurveAsym => 4,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ProfileMode::Trapezoid),
            1 => Ok(ProfileMode::TrapezoidAsym),
            2 => Ok(ProfileMode::QuasiS),
            3 => Ok(ProfileMode::SCurve),
            4 => Ok(ProfileMode::SCurveAsym),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// Interpretation of the accel/decel arguments of motion calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum AccelUnit {
    /// Argument is a slope in units/sec².
    #[default]
    Rate,
    /// Argument is the time in seconds to reach `max_vel`.
    TimeToMax,
}

impl AccelUnit {
    pub(crate) fn code(self) -> u8 {
        match self {
            AccelUnit::Rate => 0,
            AccelUnit::TimeToMax => 1,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(AccelUnit::Rate),
            1 => Ok(AccelUnit::TimeToMax),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// How the start of deceleration is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum DecelDetect {
    /// Computed from the profile. Arc segments always use this.
    #[default]
    Auto,
    /// Deceleration begins when the configured remain-pulse count
    /// is left to the target.
    Manual,
}

impl DecelDetect {
    pub(crate) fn code(self) -> u8 {
        match self {
            DecelDetect::Auto => 0,
            DecelDetect::Manual => 1,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(DecelDetect::Auto),
            1 => Ok(DecelDetect::Manual),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// How a stop request or fault halts the pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// Halt the pulse train at the next cycle, ignoring deceleration.
    Emergency,
    /// Respect the configured deceleration.
    #[default]
    Slowdown,
}

impl StopMode {
    pub(crate) fn code(self) -> u8 {
        match self {
            StopMode::Emergency => 0,
            StopMode::Slowdown => 1,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(StopMode::Emergency),
            1 => Ok(StopMode::Slowdown),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// Default interpretation of move targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// Targets are absolute positions.
    #[default]
    Absolute,
    /// Targets are deltas from the current command position.
    Relative,
}

impl PositionMode {
    pub(crate) fn code(self) -> u8 {
        match self {
            PositionMode::Absolute => 0,
            PositionMode::Relative => 1,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(PositionMode::Absolute),
            1 => Ok(PositionMode::Relative),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// Signal the homing search runs toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum HomeMethod {
    /// Dedicated home sensor.
    #[default]
    HomeSensor,
    /// Positive end-limit doubles as the home signal.
    PositiveLimit,
    /// Negative end-limit doubles as the home signal.
    NegativeLimit,
    /// Encoder Z-phase alone.
    ZPhase,
}

impl HomeMethod {
    pub(crate) fn code(self) -> u8 {
        match self {
            HomeMethod::HomeSensor => 0,
            HomeMethod::PositiveLimit => 1,
            HomeMethod::NegativeLimit => 2,
            HomeMethod::ZPhase => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(HomeMethod::HomeSensor),
            1 => Ok(HomeMethod::PositiveLimit),
            2 => Ok(HomeMethod::NegativeLimit),
            3 => Ok(HomeMethod::ZPhase),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// Whether and where the Z-phase refines the home position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum ZPhaseUse {
    /// No Z-phase capture.
    #[default]
    None,
    /// Search for Z in the homing direction.
    SameDirection,
    /// Search for Z against the homing direction.
    ReverseDirection,
}

impl ZPhaseUse {
    pub(crate) fn code(self) -> u8 {
        match self {
            ZPhaseUse::None => 0,
            ZPhaseUse::SameDirection => 1,
            ZPhaseUse::ReverseDirection => 2,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ZPhaseUse::None),
            1 => Ok(ZPhaseUse::SameDirection),
            2 => Ok(ZPhaseUse::ReverseDirection),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// Cross-checks between the home signal and the end limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum HomeInterlock {
    /// No interlock.
    #[default]
    None,
    /// Error if a limit fires while the home signal is inactive.
    SensorCheck,
    /// Error if the limit-to-home distance exceeds the dog length.
    Distance,
}

impl HomeInterlock {
    pub(crate) fn code(self) -> u8 {
        match self {
            HomeInterlock::None => 0,
            HomeInterlock::SensorCheck => 1,
            HomeInterlock::Distance => 2,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(HomeInterlock::None),
            1 => Ok(HomeInterlock::SensorCheck),
            2 => Ok(HomeInterlock::Distance),
            _ => Err(Error::InvalidParameter(ParamIssue::Decode)),
        }
    }
}

/// Homing parameter block: four stage velocities, two accel stages,
/// signal selection and the post-search offset traverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomingParams {
    /// Signal the search runs toward.
    #[serde(default)]
    pub method: HomeMethod,
    /// Search direction: +1 or -1.
    #[serde(default = "default_home_dir")]
    pub direction: i8,
    /// Z-phase refinement.
    #[serde(default)]
    pub z_use: ZPhaseUse,
    /// Stage 1: fast approach velocity.
    pub fast_vel: UnitsPerSec,
    /// Stage 2: back-off velocity.
    pub backoff_vel: UnitsPerSec,
    /// Stage 3: slow re-approach velocity.
    pub slow_vel: UnitsPerSec,
    /// Stage 4: Z-phase / fine search velocity.
    pub fine_vel: UnitsPerSec,
    /// Acceleration for the approach stages.
    pub accel_1: UnitsPerSec2,
    /// Acceleration for the fine stages.
    pub accel_2: UnitsPerSec2,
    /// Final traverse after the reference is found.
    #[serde(default)]
    pub offset: Units,
    /// Sensor dog length; also the bound for the distance interlock.
    #[serde(default)]
    pub dog_length: Units,
    /// Time in ms the home level must hold before an edge is accepted.
    #[serde(default)]
    pub scan_time_ms: u32,
    /// Enable the slow re-approach stage (five-stage search).
    #[serde(default = "default_true")]
    pub fine_search: bool,
    /// Zero command and actual position after a successful search.
    #[serde(default = "default_true")]
    pub clear_after_home: bool,
    /// Limit/home cross-check.
    #[serde(default)]
    pub interlock: HomeInterlock,
}

fn default_home_dir() -> i8 {
    -1
}

fn default_true() -> bool {
    true
}

impl Default for HomingParams {
    fn default() -> Self {
        Self {
            method: HomeMethod::HomeSensor,
            direction: -1,
            z_use: ZPhaseUse::None,
            fast_vel: UnitsPerSec(10.0),
            backoff_vel: UnitsPerSec(2.0),
            slow_vel: UnitsPerSec(1.0),
            fine_vel: UnitsPerSec(0.5),
            accel_1: UnitsPerSec2(100.0),
            accel_2: UnitsPerSec2(50.0),
            offset: Units(0.0),
            dog_length: Units(0.0),
            scan_time_ms: 0,
            fine_search: true,
            clear_after_home: true,
            interlock: HomeInterlock::None,
        }
    }
}

/// Soft limit window and its stop behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftLimit {
    /// Window armed.
    #[serde(default)]
    pub enabled: bool,
    /// Lower bound of the window.
    pub negative: Units,
    /// Upper bound of the window.
    pub positive: Units,
    /// Stop behavior on violation.
    #[serde(default)]
    pub stop_mode: StopMode,
}

impl SoftLimit {
    /// Whether the window ordering holds.
    pub fn is_valid(&self) -> bool {
        self.negative.0 <= self.positive.0
    }

    /// Whether a position lies inside the armed window.
    pub fn contains(&self, pos: Units) -> bool {
        pos.0 >= self.negative.0 && pos.0 <= self.positive.0
    }
}

impl Default for SoftLimit {
    fn default() -> Self {
        Self {
            enabled: false,
            negative: Units(-1e9),
            positive: Units(1e9),
            stop_mode: StopMode::Slowdown,
        }
    }
}

/// Backlash reversal compensation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BacklashParams {
    /// Direction recorded at homing: +1 or -1. Zero means unset.
    #[serde(default)]
    pub direction: i8,
    /// Injected distance on reversal.
    #[serde(default)]
    pub amount: Units,
}

impl BacklashParams {
    /// Whether backlash compensation is configured.
    pub fn is_configured(&self) -> bool {
        self.direction != 0 && self.amount.0 > 0.0
    }
}

/// Complete per-axis configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisParams {
    /// Axis number this record belongs to.
    pub axis_no: u8,

    /// Unit/pulse calibration.
    #[serde(default)]
    pub unit_ratio: UnitRatio,

    /// Command pulse encoding.
    #[serde(default)]
    pub pulse_method: PulseMethod,

    /// Active level of the command pulse lines.
    #[serde(default)]
    pub pulse_level: Level,

    /// Encoder decoding.
    #[serde(default)]
    pub encoder_method: EncoderMethod,

    /// Invert encoder counting direction.
    #[serde(default)]
    pub encoder_invert: bool,

    /// Lowest commandable velocity.
    #[serde(default)]
    pub min_vel: UnitsPerSec,

    /// Highest commandable velocity.
    pub max_vel: UnitsPerSec,

    /// Default profile shape.
    #[serde(default)]
    pub profile_mode: ProfileMode,

    /// Interpretation of accel/decel call arguments.
    #[serde(default)]
    pub accel_unit: AccelUnit,

    /// Short-move arbitration: keep the commanded velocity or the
    /// commanded accel times.
    #[serde(default)]
    pub profile_priority: crate::profile::ProfilePriority,

    /// Use the corrected triangular-peak computation that accounts for
    /// boundary velocities. Off reproduces the legacy peak.
    #[serde(default = "default_true")]
    pub patched_triangle: bool,

    /// Fraction of the accel phase spent in jerk ramps (0..=1).
    #[serde(default = "default_jerk_ratio")]
    pub jerk_accel_ratio: f64,

    /// Fraction of the decel phase spent in jerk ramps (0..=1).
    #[serde(default = "default_jerk_ratio")]
    pub jerk_decel_ratio: f64,

    /// Deceleration start detection.
    #[serde(default)]
    pub decel_detect: DecelDetect,

    /// Remaining pulses at which manual decel begins.
    #[serde(default)]
    pub remain_pulse: i64,

    /// Default abs/rel interpretation of move targets.
    #[serde(default)]
    pub position_mode: PositionMode,

    /// Servo-on output level.
    #[serde(default)]
    pub servo_on_level: Level,

    /// Servo alarm input level.
    #[serde(default)]
    pub alarm_level: Level,

    /// In-position input level.
    #[serde(default)]
    pub inpos_level: Level,

    /// End-limit input level (both directions).
    #[serde(default)]
    pub limit_level: Level,

    /// Stop behavior when an end limit fires.
    #[serde(default)]
    pub limit_stop_mode: StopMode,

    /// Emergency-stop input level.
    #[serde(default)]
    pub estop_level: Level,

    /// Homing parameter block.
    #[serde(default)]
    pub homing: HomingParams,

    /// Backlash compensation.
    #[serde(default)]
    pub backlash: BacklashParams,

    /// Soft limit window.
    #[serde(default)]
    pub soft_limit: SoftLimit,
}

fn default_jerk_ratio() -> f64 {
    0.5
}

impl AxisParams {
    /// A record with sane defaults for the given axis number.
    pub fn new(axis_no: u8) -> Self {
        Self {
            axis_no,
            unit_ratio: UnitRatio::IDENTITY,
            pulse_method: PulseMethod::default(),
            pulse_level: Level::default(),
            encoder_method: EncoderMethod::default(),
            encoder_invert: false,
            min_vel: UnitsPerSec(0.0),
            max_vel: UnitsPerSec(1000.0),
            profile_mode: ProfileMode::default(),
            accel_unit: AccelUnit::default(),
            profile_priority: crate::profile::ProfilePriority::default(),
            patched_triangle: true,
            jerk_accel_ratio: 0.5,
            jerk_decel_ratio: 0.5,
            decel_detect: DecelDetect::default(),
            remain_pulse: 0,
            position_mode: PositionMode::default(),
            servo_on_level: Level::default(),
            alarm_level: Level::default(),
            inpos_level: Level::default(),
            limit_level: Level::default(),
            limit_stop_mode: StopMode::Slowdown,
            estop_level: Level::default(),
            homing: HomingParams::default(),
            backlash: BacklashParams::default(),
            soft_limit: SoftLimit::default(),
        }
    }

    /// Check every dependent invariant of the record.
    pub fn validate(&self) -> Result<()> {
        if self.unit_ratio.unit <= 0.0 || self.unit_ratio.pulse <= 0.0 {
            return Err(Error::InvalidParameter(ParamIssue::UnitRatio));
        }
        if self.min_vel.0 > self.max_vel.0 {
            return Err(Error::InvalidParameter(ParamIssue::VelocityOrder));
        }
        if self.max_vel.0 <= 0.0 {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        if !self.soft_limit.is_valid() {
            return Err(Error::InvalidParameter(ParamIssue::SoftLimitOrder));
        }
        if !(0.0..=1.0).contains(&self.jerk_accel_ratio)
            || !(0.0..=1.0).contains(&self.jerk_decel_ratio)
        {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        if self.homing.direction != 1 && self.homing.direction != -1 {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(AxisParams::new(0).validate().is_ok());
    }

    #[test]
    fn velocity_order_enforced() {
        let mut p = AxisParams::new(0);
        p.min_vel = UnitsPerSec(10.0);
        p.max_vel = UnitsPerSec(5.0);
        assert_eq!(
            p.validate(),
            Err(Error::InvalidParameter(ParamIssue::VelocityOrder))
        );
    }

    #[test]
    fn soft_limit_order_enforced() {
        let mut p = AxisParams::new(0);
        p.soft_limit.negative = Units(10.0);
        p.soft_limit.positive = Units(-10.0);
        assert_eq!(
            p.validate(),
            Err(Error::InvalidParameter(ParamIssue::SoftLimitOrder))
        );
    }

    #[test]
    fn enum_codes_round_trip() {
        for m in [
            PulseMethod::OnePulse,
            PulseMethod::CwCcw,
            PulseMethod::QuadratureLead,
            PulseMethod::QuadratureLag,
        ] {
            assert_eq!(PulseMethod::from_code(m.code()).unwrap(), m);
        }
        for m in [
            ProfileMode::Trapezoid,
            ProfileMode::TrapezoidAsym,
            ProfileMode::QuasiS,
            ProfileMode::SCurve,
            ProfileMode::SCurveAsym,
        ] {
            assert_eq!(ProfileMode::from_code(m.code()).unwrap(), m);
        }
    }
}
