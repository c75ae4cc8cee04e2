//! Error types for axis-motion.
//!
//! One unified error code enum covers every operation in the crate.
//! Synchronous validation failures carry enough context to identify the
//! offending call; asynchronous motion faults are additionally latched
//! per axis and readable through the axis status.

use core::fmt;

use crate::units::AxisId;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error code for all axis-motion operations.
///
/// `Ok(..)` stands in for the traditional `Success` code; every other
/// outcome is a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Axis identifier is out of range or not configured.
    InvalidAxis(AxisId),
    /// A parameter value is out of range or violates a dependent
    /// invariant. The store rejects the write without mutating state.
    InvalidParameter(ParamIssue),
    /// The axis (or coordinate) is in a state that forbids the call.
    Busy,
    /// Servo-on is required for the requested operation.
    NotServoOn,
    /// A hardware or soft limit is active in the commanded direction.
    LimitHit(LimitKind),
    /// The drive reports an active alarm.
    AlarmActive,
    /// The continuous-motion queue has no free slot.
    QueueFull,
    /// The continuous-motion queue is empty.
    QueueEmpty,
    /// The call is only valid inside a begin_node/end_node window.
    NotInNode,
    /// A blocking drive read or bounded wait exceeded its cycle budget.
    Timeout,
    /// Backlash compensation was used before being configured.
    BacklashNotConfigured,
    /// The positional compensation table is empty or not armed.
    CompensationNotConfigured,
    /// The operation is not supported by this wire or configuration.
    Unsupported,
    /// Internal inconsistency; the axis refuses to arm until cleared.
    Internal,
}

/// Which parameter check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamIssue {
    /// Value is outside its documented range.
    OutOfRange,
    /// `min_vel` must not exceed `max_vel`.
    VelocityOrder,
    /// Negative soft limit must not exceed the positive one.
    SoftLimitOrder,
    /// Unit/pulse calibration must be strictly positive.
    UnitRatio,
    /// Virtual axis mapping would duplicate an existing entry.
    DuplicateMapping,
    /// Table positions must be strictly monotonic.
    TableOrder,
    /// Table or list capacity exceeded.
    TableCapacity,
    /// PVT segment time is not a positive multiple of the cycle.
    CycleMultiple,
    /// Parameter file field could not be decoded.
    Decode,
}

/// Which limit terminated or rejected a motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LimitKind {
    /// Hardware end-limit in the positive direction.
    HardPositive,
    /// Hardware end-limit in the negative direction.
    HardNegative,
    /// Soft limit window in the positive direction.
    SoftPositive,
    /// Soft limit window in the negative direction.
    SoftNegative,
}

impl LimitKind {
    /// Whether this is a hardware limit.
    #[inline]
    pub fn is_hard(self) -> bool {
        matches!(self, LimitKind::HardPositive | LimitKind::HardNegative)
    }

    /// Sign of the violated travel direction (+1 or -1).
    #[inline]
    pub fn direction(self) -> i8 {
        match self {
            LimitKind::HardPositive | LimitKind::SoftPositive => 1,
            LimitKind::HardNegative | LimitKind::SoftNegative => -1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidAxis(id) => write!(f, "invalid axis {}", id),
            Error::InvalidParameter(issue) => write!(f, "invalid parameter: {}", issue),
            Error::Busy => write!(f, "axis busy"),
            Error::NotServoOn => write!(f, "servo not on"),
            Error::LimitHit(kind) => write!(f, "limit hit: {}", kind),
            Error::AlarmActive => write!(f, "servo alarm active"),
            Error::QueueFull => write!(f, "motion queue full"),
            Error::QueueEmpty => write!(f, "motion queue empty"),
            Error::NotInNode => write!(f, "not inside a node window"),
            Error::Timeout => write!(f, "timeout"),
            Error::BacklashNotConfigured => write!(f, "backlash not configured"),
            Error::CompensationNotConfigured => write!(f, "compensation not configured"),
            Error::Unsupported => write!(f, "operation unsupported"),
            Error::Internal => write!(f, "internal inconsistency"),
        }
    }
}

impl fmt::Display for ParamIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ParamIssue::OutOfRange => "value out of range",
            ParamIssue::VelocityOrder => "min_vel exceeds max_vel",
            ParamIssue::SoftLimitOrder => "negative soft limit exceeds positive",
            ParamIssue::UnitRatio => "unit/pulse ratio must be positive",
            ParamIssue::DuplicateMapping => "duplicate virtual axis mapping",
            ParamIssue::TableOrder => "table positions not monotonic",
            ParamIssue::TableCapacity => "table capacity exceeded",
            ParamIssue::CycleMultiple => "time not a positive multiple of the cycle",
            ParamIssue::Decode => "field could not be decoded",
        };
        f.write_str(msg)
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LimitKind::HardPositive => "+end limit",
            LimitKind::HardNegative => "-end limit",
            LimitKind::SoftPositive => "+soft limit",
            LimitKind::SoftNegative => "-soft limit",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
