//! Compensation module: positional correction tables.
//!
//! Backlash reversal injection lives in the axis executor's pulse
//! conversion; the one-time mechanical alignment (`locate`) is a
//! controller operation built on ordinary moves.

mod table;

pub use table::{CompPoint, CompTable, MAX_COMP_POINTS};
