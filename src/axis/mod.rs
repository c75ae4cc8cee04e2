//! Axis module: per-axis state machine, executor and event channel.

mod events;
mod executor;
mod state;

pub use events::{
    AxisEvent, EventQueue, EVENT_QUEUE_DEPTH, EV_ALARM, EV_CAPTURE, EV_HOME_DONE, EV_HOME_FAILED,
    EV_LIMIT, EV_MOVE_DONE, EV_NODE_DONE, EV_STOP_DONE, EV_TRIGGER,
};
pub use executor::{AxisExecutor, OverrideMoment, TickOutcome};
pub use state::AxisState;
