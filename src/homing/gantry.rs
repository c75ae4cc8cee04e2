//! Gantry pair coupling and over-distance monitoring.
//!
//! Two mechanically rigid axes driven as one: the slave mirrors the
//! master's command stream, a per-cycle monitor watches the actual
//! offset between the sides, and homing can run a dedicated slave pass.

use serde::{Deserialize, Serialize};

use crate::units::{AxisId, Units};

/// How homing treats the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum GantryHomeMode {
    /// Home the master; the slave just mirrors.
    #[default]
    MasterOnly,
    /// Home the master, then run a slave alignment pass.
    MasterAndSlave,
    /// Home the master and only record the slave offset.
    MeasureOnly,
}

/// Reaction to the offset leaving the allowed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum GantryPolicy {
    /// Monitoring off.
    Disabled,
    /// Report through the status flag only.
    #[default]
    Report,
    /// Report and latch the offending offset.
    Latch,
    /// Latch and slowdown-stop both axes.
    LatchSlowdown,
    /// Latch and emergency-stop both axes.
    LatchEmergency,
}

/// A master/slave gantry pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GantryPair {
    /// Master axis.
    pub master: AxisId,
    /// Slave axis.
    pub slave: AxisId,
    /// Nominal slave offset from the master.
    pub offset: Units,
    /// Allowed |actual offset − nominal| window.
    pub range: Units,
    /// Homing treatment.
    #[serde(default)]
    pub home_mode: GantryHomeMode,
    /// Share of the offset correction applied on the master, percent.
    #[serde(default)]
    pub master_gain_pct: f64,
    /// Share of the offset correction applied on the slave, percent.
    #[serde(default = "default_slave_gain")]
    pub slave_gain_pct: f64,
    /// Over-distance reaction.
    #[serde(default)]
    pub policy: GantryPolicy,

    #[serde(skip)]
    enabled: bool,
    #[serde(skip)]
    error_active: bool,
    #[serde(skip)]
    latched_offset: Option<f64>,
}

fn default_slave_gain() -> f64 {
    100.0
}

/// What the per-cycle monitor asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GantryAction {
    /// Nothing to do.
    None,
    /// Slowdown-stop both axes.
    StopSlowdown,
    /// Emergency-stop both axes.
    StopEmergency,
}

impl GantryPair {
    /// Create a pair with the default report-only policy.
    pub fn new(master: AxisId, slave: AxisId, offset: Units, range: Units) -> Self {
        Self {
            master,
            slave,
            offset,
            range,
            home_mode: GantryHomeMode::default(),
            master_gain_pct: 0.0,
            slave_gain_pct: 100.0,
            policy: GantryPolicy::default(),
            enabled: false,
            error_active: false,
            latched_offset: None,
        }
    }

    /// Arm or disarm the coupling.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.error_active = false;
        }
    }

    /// Whether the coupling is armed.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the offset is currently (or latched) out of range.
    #[inline]
    pub fn read_error_range_status(&self) -> bool {
        self.error_active
    }

    /// The latched out-of-range offset, if any.
    #[inline]
    pub fn compare_pos(&self) -> Option<Units> {
        self.latched_offset.map(Units)
    }

    /// Clear the latch and the error flag.
    pub fn clear_error(&mut self) {
        self.error_active = false;
        self.latched_offset = None;
    }

    /// Split of an offset correction between the sides, as fractions.
    pub fn correction_split(&self) -> (f64, f64) {
        (self.master_gain_pct / 100.0, self.slave_gain_pct / 100.0)
    }

    /// Per-cycle monitor. `master_act` / `slave_act` are actual
    /// positions; returns the stop action the policy demands.
    pub fn monitor(&mut self, master_act: Units, slave_act: Units) -> GantryAction {
        if !self.enabled || self.policy == GantryPolicy::Disabled {
            return GantryAction::None;
        }
        let diff = (slave_act.0 - master_act.0) - self.offset.0;
        if diff.abs() <= self.range.0 {
            if self.policy == GantryPolicy::Report {
                self.error_active = false;
            }
            return GantryAction::None;
        }
        self.error_active = true;
        match self.policy {
            GantryPolicy::Report => GantryAction::None,
            GantryPolicy::Latch => {
                self.latch(diff);
                GantryAction::None
            }
            GantryPolicy::LatchSlowdown => {
                self.latch(diff);
                GantryAction::StopSlowdown
            }
            GantryPolicy::LatchEmergency => {
                self.latch(diff);
                GantryAction::StopEmergency
            }
            GantryPolicy::Disabled => GantryAction::None,
        }
    }

    fn latch(&mut self, diff: f64) {
        if self.latched_offset.is_none() {
            self.latched_offset = Some(diff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_latches_first_offense() {
        let mut pair = GantryPair::new(0, 1, Units(1.0), Units(0.1));
        pair.policy = GantryPolicy::Latch;
        pair.set_enabled(true);

        assert_eq!(pair.monitor(Units(0.0), Units(1.05)), GantryAction::None);
        assert!(!pair.read_error_range_status());

        assert_eq!(pair.monitor(Units(0.0), Units(1.25)), GantryAction::None);
        assert!(pair.read_error_range_status());
        assert!((pair.compare_pos().unwrap().0 - 0.25).abs() < 1e-12);

        // Later, larger offenses do not overwrite the latch.
        pair.monitor(Units(0.0), Units(2.0));
        assert!((pair.compare_pos().unwrap().0 - 0.25).abs() < 1e-12);
    }

    #[test]
    fn estop_policy_requests_stop() {
        let mut pair = GantryPair::new(0, 1, Units(0.0), Units(0.1));
        pair.policy = GantryPolicy::LatchEmergency;
        pair.set_enabled(true);
        assert_eq!(
            pair.monitor(Units(0.0), Units(0.5)),
            GantryAction::StopEmergency
        );
    }

    #[test]
    fn disabled_never_fires() {
        let mut pair = GantryPair::new(0, 1, Units(0.0), Units(0.1));
        pair.policy = GantryPolicy::Disabled;
        pair.set_enabled(true);
        assert_eq!(pair.monitor(Units(0.0), Units(9.9)), GantryAction::None);
        assert!(!pair.read_error_range_status());
    }
}
