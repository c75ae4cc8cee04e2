//! Coordinate groups: named sets of axes for interpolated motion.

use heapless::Vec;

use crate::error::{Error, ParamIssue, Result};
use crate::param::PositionMode;
use crate::units::AxisId;

/// Axes per coordinate.
pub const MAX_COORD_AXES: usize = 6;

/// Coordinates per controller.
pub const MAX_COORDS: usize = 4;

/// Coordinate identifier.
pub type CoordId = u8;

/// An ordered axis group with its interpolation settings.
#[derive(Debug, Clone)]
pub struct Coordinate {
    axes: Vec<AxisId, MAX_COORD_AXES>,
    /// Abs/rel interpretation of segment endpoints.
    pub position_mode: PositionMode,
    /// Fillet radius inserted at G1-discontinuous junctions.
    pub connection_radius: Option<f64>,
}

impl Coordinate {
    /// Build a coordinate. Axes must be listed in ascending order
    /// (device-level ordering requirement for hardware-native arcs).
    pub fn new(axes: &[AxisId], position_mode: PositionMode) -> Result<Self> {
        if axes.is_empty() || axes.len() > MAX_COORD_AXES {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        for pair in axes.windows(2) {
            if pair[1] <= pair[0] {
                return Err(Error::InvalidParameter(ParamIssue::TableOrder));
            }
        }
        let mut list = Vec::new();
        // Length checked above.
        let _ = list.extend_from_slice(axes);
        Ok(Self {
            axes: list,
            position_mode,
            connection_radius: None,
        })
    }

    /// Member axes in order.
    #[inline]
    pub fn axes(&self) -> &[AxisId] {
        &self.axes
    }

    /// Number of member axes.
    #[inline]
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    /// Whether the group is empty (never true for a built group).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Whether an axis belongs to this coordinate.
    pub fn contains(&self, axis: AxisId) -> bool {
        self.axes.iter().any(|&a| a == axis)
    }
}

/// The controller's coordinate slots.
#[derive(Debug, Default)]
pub struct CoordManager {
    slots: [Option<Coordinate>; MAX_COORDS],
}

impl CoordManager {
    /// Map a coordinate into a slot. An axis may belong to at most one
    /// active coordinate.
    pub fn map(&mut self, id: CoordId, coord: Coordinate) -> Result<()> {
        if id as usize >= MAX_COORDS {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        for (slot, existing) in self.slots.iter().enumerate() {
            if slot == id as usize {
                continue;
            }
            if let Some(other) = existing {
                for &axis in coord.axes() {
                    if other.contains(axis) {
                        return Err(Error::Busy);
                    }
                }
            }
        }
        self.slots[id as usize] = Some(coord);
        Ok(())
    }

    /// Drop a coordinate mapping.
    pub fn reset(&mut self, id: CoordId) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(Error::InvalidParameter(ParamIssue::OutOfRange))?;
        *slot = None;
        Ok(())
    }

    /// Borrow a mapped coordinate.
    pub fn get(&self, id: CoordId) -> Result<&Coordinate> {
        self.slots
            .get(id as usize)
            .and_then(|s| s.as_ref())
            .ok_or(Error::InvalidAxis(id))
    }

    /// Mutable access to a mapped coordinate.
    pub fn get_mut(&mut self, id: CoordId) -> Result<&mut Coordinate> {
        self.slots
            .get_mut(id as usize)
            .and_then(|s| s.as_mut())
            .ok_or(Error::InvalidAxis(id))
    }
}
