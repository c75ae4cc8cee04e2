//! Typed drive-link frames.
//!
//! Vendor servo packs speak family-specific byte frames; at this seam
//! they are modeled as tagged variants and the [`crate::wire::Wire`]
//! implementation owns the encoding.

/// How a drive command read returns to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReturnMode {
    /// Suspend the caller until the reply arrives.
    Blocking,
    /// Poll for up to the given number of control cycles, then
    /// surface `Timeout`.
    NonBlocking {
        /// Cycle budget before the read times out.
        budget_cycles: u32,
    },
}

/// A command frame toward the drive.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveCommand {
    /// Set the drive-side torque limit in percent of rated torque.
    TorqueLimit {
        /// Limit in percent, 0–300.
        percent: u16,
    },
    /// Read a drive parameter.
    ReadParam {
        /// Drive parameter index.
        index: u16,
    },
    /// Write a drive parameter.
    WriteParam {
        /// Drive parameter index.
        index: u16,
        /// Raw parameter value.
        value: i32,
    },
    /// Engage or release the holding brake.
    Brake {
        /// `true` engages the brake.
        engage: bool,
    },
    /// Switch the drive to velocity control at the given setpoint.
    VelocityControl {
        /// Velocity setpoint in drive-native counts/sec.
        setpoint: i32,
    },
    /// Switch the drive to torque control at the given setpoint.
    TorqueControl {
        /// Torque setpoint in percent of rated torque.
        percent: i16,
    },
    /// Leave velocity/torque control and return to position mode.
    PositionControl,
    /// Read the active alarm code.
    ReadAlarm,
}

/// A reply frame from the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveReply {
    /// Command accepted, no payload.
    Ack,
    /// Parameter read result.
    Param {
        /// Raw parameter value.
        value: i32,
    },
    /// Alarm code; zero means no alarm.
    Alarm {
        /// Drive-family alarm code.
        code: u16,
    },
}
