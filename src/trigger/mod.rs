//! Trigger module: position comparators and edge capture.

mod capture;
mod compare;

pub use capture::CaptureLatch;
pub use compare::{
    Comparator, TriggerBank, TriggerConfig, TriggerMode, TriggerScope, COMPARATOR_COUNT,
    MAX_ARRAY_POSITIONS,
};
