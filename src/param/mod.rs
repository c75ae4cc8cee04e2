//! Parameter module: per-axis settings, validated store, legacy file codec.

mod axis;
#[cfg(feature = "std")]
mod motfile;
mod store;

pub use axis::{
    AccelUnit, AxisParams, BacklashParams, DecelDetect, EncoderMethod, HomeInterlock, HomeMethod,
    HomingParams, Level, PositionMode, ProfileMode, PulseMethod, SoftLimit, StopMode, ZPhaseUse,
};
pub use store::{ParamStore, MAX_AXES};

#[cfg(feature = "std")]
pub use motfile::{load_all, parse_all, render_all, save_all, LoadOutcome, KEY_COUNT, KEY_NAMES};
