//! Cam module: electronic cam tables and gear links.

mod ecam;
mod egear;

pub use ecam::{CamSource, EcamTable, MAX_ECAM_POINTS};
pub use egear::GearLink;
