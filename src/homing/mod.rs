//! Homing module: staged reference search and gantry pairing.

mod engine;
mod gantry;

pub use engine::{HomeResult, HomingSeq};
pub use gantry::{GantryAction, GantryHomeMode, GantryPair, GantryPolicy};
