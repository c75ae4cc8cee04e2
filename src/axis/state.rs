//! Axis runtime states.

/// State machine of one axis.
///
/// ```text
/// Idle -> Moving -> (StoppingDecel | StoppingEmergency) -> Idle
/// Idle -> Homing -> Idle | HomeFailed
/// Idle -> TorqueMode -> Idle
/// Idle -> Coordinated -> Idle        (group-driven playback)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisState {
    /// Ready for commands.
    #[default]
    Idle,
    /// Executing a profile move or jog.
    Moving,
    /// Ramping down after a decel-respecting stop request.
    StoppingDecel,
    /// Pulse train halts at the next cycle.
    StoppingEmergency,
    /// Homing sequence owns the axis.
    Homing,
    /// Homing terminated unsuccessfully; latched until cleared.
    HomeFailed,
    /// Drive is in torque mode; no pulse output.
    TorqueMode,
    /// Driven externally by a coordinate group, cam or PVT playback.
    Coordinated,
}

impl AxisState {
    /// Whether new motion commands are accepted in this state.
    #[inline]
    pub fn accepts_commands(self) -> bool {
        matches!(self, AxisState::Idle | AxisState::HomeFailed)
    }

    /// Whether the axis is producing pulses.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            AxisState::Moving
                | AxisState::StoppingDecel
                | AxisState::Homing
                | AxisState::Coordinated
        )
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            AxisState::Idle => "Idle",
            AxisState::Moving => "Moving",
            AxisState::StoppingDecel => "StoppingDecel",
            AxisState::StoppingEmergency => "StoppingEmergency",
            AxisState::Homing => "Homing",
            AxisState::HomeFailed => "HomeFailed",
            AxisState::TorqueMode => "TorqueMode",
            AxisState::Coordinated => "Coordinated",
        }
    }
}
