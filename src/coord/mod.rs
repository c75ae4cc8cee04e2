//! Coordinate module: axis groups, interpolation geometry and the
//! continuous-motion queue.

mod arc;
mod group;
mod path;
mod planner;
mod queue;

pub use arc::{Arc, Vec2};
pub use group::{CoordId, CoordManager, Coordinate, MAX_COORDS, MAX_COORD_AXES};
pub use path::{AxPos, PathSegment, MAX_POLYLINE_POINTS};
pub use planner::{
    fillet_between, junction_alignment, resolve, SegmentSpec, MAX_SPLINE_POINTS,
};
pub use queue::{
    ContiMode, ContiNode, ContiQueue, DeferredIo, OVERRIDE_DEPTH, QUEUE_DEPTH,
};
