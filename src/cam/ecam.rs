//! Electronic cam: master→slave position function from a table.

use heapless::Vec;

use crate::error::{Error, ParamIssue, Result};
use crate::units::{AxisId, Units};

/// Maximum nodes per cam table.
pub const MAX_ECAM_POINTS: usize = 64;

/// Which master stream the cam samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CamSource {
    /// Master command position.
    #[default]
    Command,
    /// Master actual position.
    Actual,
}

/// One cam linkage: a slave axis tracking a master through a table.
#[derive(Debug)]
pub struct EcamTable {
    /// Master axis.
    pub master: AxisId,
    /// Slave axis.
    pub slave: AxisId,
    /// Master position where the table engages.
    pub master_start: f64,
    /// Sampled master stream.
    pub source: CamSource,
    master_pos: Vec<f64, MAX_ECAM_POINTS>,
    slave_pos: Vec<f64, MAX_ECAM_POINTS>,
    enabled: bool,
}

impl EcamTable {
    /// Build a cam from parallel position arrays. Master positions
    /// must be strictly increasing and the arrays equally long.
    pub fn new(
        master: AxisId,
        slave: AxisId,
        master_start: f64,
        source: CamSource,
        master_positions: &[f64],
        slave_positions: &[f64],
    ) -> Result<Self> {
        if master_positions.len() != slave_positions.len() || master_positions.len() < 2 {
            return Err(Error::InvalidParameter(ParamIssue::TableOrder));
        }
        for pair in master_positions.windows(2) {
            if pair[1] <= pair[0] {
                return Err(Error::InvalidParameter(ParamIssue::TableOrder));
            }
        }
        let mut mp = Vec::new();
        mp.extend_from_slice(master_positions)
            .map_err(|_| Error::InvalidParameter(ParamIssue::TableCapacity))?;
        let mut sp = Vec::new();
        sp.extend_from_slice(slave_positions)
            .map_err(|_| Error::InvalidParameter(ParamIssue::TableCapacity))?;
        Ok(Self {
            master,
            slave,
            master_start,
            source,
            master_pos: mp,
            slave_pos: sp,
            enabled: false,
        })
    }

    /// Engage or disengage the cam. On disengage the slave holds.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the slave is tracking.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Evaluate the table at a master position.
    ///
    /// Bit-exact at the nodes; linear in between; holds the boundary
    /// slave values outside the table.
    pub fn eval(&self, master: Units) -> Units {
        let x = master.0 - self.master_start;
        let n = self.master_pos.len();
        if x <= self.master_pos[0] {
            return Units(self.slave_pos[0]);
        }
        if x >= self.master_pos[n - 1] {
            return Units(self.slave_pos[n - 1]);
        }
        for i in 0..n - 1 {
            let (m0, m1) = (self.master_pos[i], self.master_pos[i + 1]);
            if x == m0 {
                return Units(self.slave_pos[i]);
            }
            if x > m0 && x <= m1 {
                if x == m1 {
                    return Units(self.slave_pos[i + 1]);
                }
                let f = (x - m0) / (m1 - m0);
                return Units(self.slave_pos[i] + f * (self.slave_pos[i + 1] - self.slave_pos[i]));
            }
        }
        Units(self.slave_pos[n - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cam() -> EcamTable {
        EcamTable::new(
            0,
            1,
            0.0,
            CamSource::Command,
            &[0.0, 100.0, 200.0, 300.0],
            &[0.0, 50.0, 150.0, 200.0],
        )
        .unwrap()
    }

    #[test]
    fn exact_at_nodes() {
        let c = cam();
        assert_eq!(c.eval(Units(0.0)).0, 0.0);
        assert_eq!(c.eval(Units(100.0)).0, 50.0);
        assert_eq!(c.eval(Units(200.0)).0, 150.0);
        assert_eq!(c.eval(Units(300.0)).0, 200.0);
    }

    #[test]
    fn linear_between_nodes() {
        let c = cam();
        assert!((c.eval(Units(150.0)).0 - 100.0).abs() < 1e-12);
        assert!((c.eval(Units(50.0)).0 - 25.0).abs() < 1e-12);
    }

    #[test]
    fn holds_outside_table() {
        let c = cam();
        assert_eq!(c.eval(Units(-10.0)).0, 0.0);
        assert_eq!(c.eval(Units(999.0)).0, 200.0);
    }

    #[test]
    fn non_monotonic_rejected() {
        let err = EcamTable::new(0, 1, 0.0, CamSource::Command, &[0.0, 5.0, 4.0], &[0.0, 1.0, 2.0]);
        assert!(err.is_err());
    }
}
