//! System configuration: named axes and coordinates from TOML.

use heapless::{FnvIndexMap, String, Vec};
use serde::Deserialize;

use crate::param::{AxisParams, ParamStore};
use crate::units::CycleTime;

/// A coordinate definition from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordConfig {
    /// Coordinate slot (0–3).
    pub id: u8,
    /// Member axis numbers, ascending.
    pub axes: Vec<u8, 6>,
    /// Interpret segment targets as relative.
    #[serde(default)]
    pub relative: bool,
    /// Corner-rounding radius for automatic blending.
    #[serde(default)]
    pub connection_radius: Option<f64>,
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Control cycle in microseconds (defaults to 1000).
    #[serde(default)]
    pub cycle_us: Option<u32>,

    /// Named axis parameter blocks.
    pub axes: FnvIndexMap<String<32>, AxisParams, 16>,

    /// Named coordinate groups.
    #[serde(default)]
    pub coordinates: FnvIndexMap<String<32>, CoordConfig, 4>,
}

impl SystemConfig {
    /// Get an axis block by name.
    pub fn axis(&self, name: &str) -> Option<&AxisParams> {
        self.axes
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    /// Get a coordinate definition by name.
    pub fn coordinate(&self, name: &str) -> Option<&CoordConfig> {
        self.coordinates
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    /// List all axis names.
    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(|s| s.as_str())
    }

    /// Number of configured axes.
    pub fn axis_count(&self) -> u8 {
        self.axes.len() as u8
    }

    /// The configured control cycle.
    pub fn cycle(&self) -> CycleTime {
        self.cycle_us.map(CycleTime).unwrap_or_default()
    }

    /// Build a parameter store, placing each block at its axis number.
    pub fn build_store(&self) -> crate::error::Result<ParamStore> {
        let count = self
            .axes
            .values()
            .map(|p| p.axis_no + 1)
            .max()
            .unwrap_or(0);
        let mut store = ParamStore::with_axes(count);
        for params in self.axes.values() {
            store.replace(params.axis_no, params.clone())?;
        }
        Ok(store)
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            cycle_us: None,
            axes: FnvIndexMap::new(),
            coordinates: FnvIndexMap::new(),
        }
    }
}
