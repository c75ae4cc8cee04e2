//! # axis-motion
//!
//! Cycle-driven multi-axis motion control core for pulse-train/encoder
//! hardware.
//!
//! ## Features
//!
//! - **Per-axis motion pipeline**: trapezoid / S-curve / quasi-S
//!   profiles with start/end velocities, in-flight overrides and
//!   decel/emergency stops
//! - **Homing**: five-stage sensor search with Z-phase capture,
//!   interlocks and gantry pairing
//! - **Interpolation**: linear, circular (four constructor forms),
//!   helical, spline and fillet segments over coordinate groups
//! - **Continuous motion**: deferred node queue with blending,
//!   corner rounding, deferred outputs and a direct-override stack
//! - **Position events**: comparators, edge capture, compensation
//!   tables, backlash takeup, electronic cam and gear
//! - **no_std compatible**: bounded `heapless` state throughout; file
//!   I/O and TOML parsing are `std`-gated
//!
//! ## Quick Start
//!
//! ```rust
//! use axis_motion::{Controller, LoopbackWire, Units};
//!
//! // Two simulated axes, pulses echoed straight into the encoders.
//! let mut ctl = Controller::new(LoopbackWire::new(2), 2);
//! ctl.servo_on(0, true).unwrap();
//! ctl.move_to(0, Units(10.0), 100.0, 400.0, 400.0).unwrap();
//! assert!((ctl.cmd_pos(0).unwrap().0 - 10.0).abs() < 1e-9);
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): file I/O, TOML configuration, `.mot` codec
//! - `alloc`: heap allocation for no_std with allocator
//! - `defmt`: defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Core modules
pub mod axis;
pub mod cam;
pub mod comp;
pub mod config;
pub mod controller;
pub mod coord;
pub mod error;
pub mod homing;
pub mod param;
pub mod profile;
pub mod pvt;
pub mod signal;
pub mod status;
pub mod trigger;
pub mod units;
pub mod wire;

// Re-exports for ergonomic API
pub use axis::{AxisEvent, AxisState, OverrideMoment};
pub use config::{validate_config, SystemConfig};
pub use controller::Controller;
pub use error::{Error, LimitKind, ParamIssue, Result};
pub use homing::{GantryPair, HomeResult};
pub use param::{AxisParams, ParamStore, ProfileMode};
pub use profile::{MotionPhase, MoveSpec, ProfilePriority};
pub use status::{InfoSelect, MotionInfo, PosRepr};
pub use trigger::{TriggerConfig, TriggerMode};
pub use wire::{DriveCommand, DriveReply, LoopbackWire, ReturnMode, StepDirWire, Wire};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::load_config;

// Unit types
pub use units::{AxisId, CycleTime, Pulses, UnitRatio, Units, UnitsPerSec, UnitsPerSec2};
