//! Profile module: velocity curve generation and time sampling.

mod curve;
mod generator;

pub use curve::{MotionPhase, Piece, VelCurve, MAX_PIECES};
pub use generator::{
    generate, generate_jog, generate_stop, MoveSpec, ProfilePriority, ShapeLimits,
};
