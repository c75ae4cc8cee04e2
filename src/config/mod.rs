//! Configuration module.
//!
//! Provides types for loading and validating axis and coordinate
//! configurations from TOML (with the `std` feature) or pre-parsed
//! data.

#[cfg(feature = "std")]
mod loader;
mod system;
mod validation;

pub use system::{CoordConfig, SystemConfig};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};
