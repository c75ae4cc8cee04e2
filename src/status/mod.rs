//! Status module: live command/actual tracking and combined reads.

mod info;
mod tracker;

pub use info::{InfoSelect, MotionInfo};
pub use tracker::{MotionFlags, PosRepr, StatusTracker};
