//! Parameter store: per-axis records with validated mutation.

use heapless::Vec;

use crate::error::{Error, Result};
use crate::units::{AxisId, UnitRatio, Units, UnitsPerSec};

use super::axis::{AxisParams, BacklashParams, HomingParams, SoftLimit};

/// Maximum number of axes a store can hold.
pub const MAX_AXES: usize = 16;

/// Holds one [`AxisParams`] record per configured axis.
///
/// All mutation goes through [`ParamStore::try_update`], which applies
/// the change to a scratch copy, validates every dependent invariant
/// and only then commits; a rejected write leaves the store untouched.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    axes: Vec<AxisParams, MAX_AXES>,
}

impl ParamStore {
    /// Create a store with `count` axes at default parameters.
    pub fn with_axes(count: u8) -> Self {
        let mut axes = Vec::new();
        for id in 0..count.min(MAX_AXES as u8) {
            // Capacity bounded by the min above.
            let _ = axes.push(AxisParams::new(id));
        }
        Self { axes }
    }

    /// Number of configured axes.
    #[inline]
    pub fn axis_count(&self) -> u8 {
        self.axes.len() as u8
    }

    /// Whether an axis id is configured.
    #[inline]
    pub fn has_axis(&self, id: AxisId) -> bool {
        (id as usize) < self.axes.len()
    }

    /// Borrow an axis record.
    pub fn axis(&self, id: AxisId) -> Result<&AxisParams> {
        self.axes.get(id as usize).ok_or(Error::InvalidAxis(id))
    }

    /// Replace an entire axis record after validation.
    pub fn replace(&mut self, id: AxisId, params: AxisParams) -> Result<()> {
        params.validate()?;
        let slot = self
            .axes
            .get_mut(id as usize)
            .ok_or(Error::InvalidAxis(id))?;
        let mut params = params;
        params.axis_no = id;
        *slot = params;
        Ok(())
    }

    /// Apply a mutation, validate, then commit.
    ///
    /// The closure edits a scratch copy; if the result violates an
    /// invariant the original record is left untouched and the error
    /// is returned.
    pub fn try_update<F>(&mut self, id: AxisId, f: F) -> Result<()>
    where
        F: FnOnce(&mut AxisParams),
    {
        let slot = self
            .axes
            .get_mut(id as usize)
            .ok_or(Error::InvalidAxis(id))?;
        let mut scratch = slot.clone();
        f(&mut scratch);
        scratch.axis_no = id;
        scratch.validate()?;
        *slot = scratch;
        Ok(())
    }

    /// Set the unit/pulse calibration.
    pub fn set_unit_ratio(&mut self, id: AxisId, unit: f64, pulse: f64) -> Result<()> {
        let ratio = UnitRatio::new(unit, pulse)?;
        self.try_update(id, |p| p.unit_ratio = ratio)
    }

    /// Set the velocity window. Fails with `InvalidParameter` if
    /// `min > max`, without mutating either bound.
    pub fn set_velocity_window(
        &mut self,
        id: AxisId,
        min: UnitsPerSec,
        max: UnitsPerSec,
    ) -> Result<()> {
        self.try_update(id, |p| {
            p.min_vel = min;
            p.max_vel = max;
        })
    }

    /// Set only the maximum velocity.
    pub fn set_max_vel(&mut self, id: AxisId, max: UnitsPerSec) -> Result<()> {
        self.try_update(id, |p| p.max_vel = max)
    }

    /// Set the soft limit window.
    pub fn set_soft_limit(&mut self, id: AxisId, limit: SoftLimit) -> Result<()> {
        self.try_update(id, |p| p.soft_limit = limit)
    }

    /// Set the homing parameter block.
    pub fn set_homing(&mut self, id: AxisId, homing: HomingParams) -> Result<()> {
        self.try_update(id, |p| p.homing = homing)
    }

    /// Set the backlash record.
    pub fn set_backlash(&mut self, id: AxisId, direction: i8, amount: Units) -> Result<()> {
        self.try_update(id, |p| {
            p.backlash = BacklashParams { direction, amount };
        })
    }

    /// Iterate over all records in axis order.
    pub fn iter(&self) -> impl Iterator<Item = &AxisParams> {
        self.axes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParamIssue;

    #[test]
    fn rejected_write_leaves_state() {
        let mut store = ParamStore::with_axes(2);
        store
            .set_velocity_window(0, UnitsPerSec(1.0), UnitsPerSec(100.0))
            .unwrap();

        let err = store
            .set_velocity_window(0, UnitsPerSec(200.0), UnitsPerSec(100.0))
            .unwrap_err();
        assert_eq!(err, Error::InvalidParameter(ParamIssue::VelocityOrder));

        let p = store.axis(0).unwrap();
        assert_eq!(p.min_vel, UnitsPerSec(1.0));
        assert_eq!(p.max_vel, UnitsPerSec(100.0));
    }

    #[test]
    fn unknown_axis_rejected() {
        let mut store = ParamStore::with_axes(1);
        assert_eq!(
            store.set_max_vel(5, UnitsPerSec(10.0)),
            Err(Error::InvalidAxis(5))
        );
    }

    #[test]
    fn replace_validates() {
        let mut store = ParamStore::with_axes(1);
        let mut p = AxisParams::new(0);
        p.max_vel = UnitsPerSec(-1.0);
        assert!(store.replace(0, p).is_err());
    }
}
