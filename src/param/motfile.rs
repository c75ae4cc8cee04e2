//! Legacy `.mot` parameter file codec (std only).
//!
//! Text format, one `[AXIS]` section per axis, 40 ordered numeric keys
//! per section (index 0 `AXIS_NO` through 39 `SOFT_LIMIT_ENABLE`).
//! The writer emits keys in index order; the parser accepts them in any
//! order and skips unknown keys, counting them as warnings. A
//! `load_all` → `save_all` round trip reproduces every numeric field
//! byte-for-byte.

use std::fs;
use std::path::Path;
use std::string::String;

use crate::error::{Error, ParamIssue, Result};
use crate::units::{Units, UnitsPerSec, UnitsPerSec2};

use super::axis::{
    AccelUnit, AxisParams, DecelDetect, EncoderMethod, HomeInterlock, HomeMethod, Level,
    PositionMode, ProfileMode, PulseMethod, StopMode, ZPhaseUse,
};
use super::store::ParamStore;

/// Number of keys in one axis section.
pub const KEY_COUNT: usize = 40;

/// Key names in index order, for diagnostics.
pub const KEY_NAMES: [&str; KEY_COUNT] = [
    "AXIS_NO",
    "UNIT_NUMERATOR",
    "UNIT_DENOMINATOR",
    "PULSE_METHOD",
    "ENCODER_METHOD",
    "MIN_VELOCITY",
    "MAX_VELOCITY",
    "PROFILE_MODE",
    "ACCEL_UNIT",
    "JERK_ACCEL_RATIO",
    "JERK_DECEL_RATIO",
    "DECEL_MODE",
    "REMAIN_PULSE",
    "ABS_REL",
    "SERVO_ON_LEVEL",
    "ALARM_LEVEL",
    "INPOS_LEVEL",
    "LIMIT_LEVEL",
    "LIMIT_STOP_MODE",
    "ESTOP_LEVEL",
    "HOME_METHOD",
    "HOME_DIR",
    "HOME_Z_PHASE",
    "HOME_VELOCITY_1",
    "HOME_VELOCITY_2",
    "HOME_VELOCITY_3",
    "HOME_VELOCITY_4",
    "HOME_ACCEL_1",
    "HOME_ACCEL_2",
    "HOME_OFFSET",
    "HOME_DOG_LENGTH",
    "HOME_SCAN_TIME",
    "HOME_FINE_SEARCH",
    "HOME_CLEAR",
    "HOME_INTERLOCK",
    "BACKLASH_DIR",
    "BACKLASH_AMOUNT",
    "SOFT_LIMIT_NEG",
    "SOFT_LIMIT_POS",
    "SOFT_LIMIT_ENABLE",
];

/// Outcome of a parse: the rebuilt store plus a skipped-key count.
#[derive(Debug)]
pub struct LoadOutcome {
    /// The parameter store rebuilt from the file.
    pub store: ParamStore,
    /// Number of unknown or duplicate keys that were skipped.
    pub skipped_keys: usize,
}

/// Load a parameter store from a `.mot` file.
pub fn load_all<P: AsRef<Path>>(path: P) -> Result<LoadOutcome> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|_| Error::InvalidParameter(ParamIssue::Decode))?;
    parse_all(&content)
}

/// Save a parameter store to a `.mot` file.
pub fn save_all<P: AsRef<Path>>(path: P, store: &ParamStore) -> Result<()> {
    fs::write(path.as_ref(), render_all(store))
        .map_err(|_| Error::InvalidParameter(ParamIssue::Decode))
}

/// Render a store to `.mot` text.
pub fn render_all(store: &ParamStore) -> String {
    let mut out = String::new();
    for params in store.iter() {
        out.push_str("[AXIS]\n");
        for key in 0..KEY_COUNT {
            out.push_str(&format!("{}={}\n", key, encode_key(params, key)));
        }
        out.push('\n');
    }
    out
}

/// Parse `.mot` text into a store.
pub fn parse_all(content: &str) -> Result<LoadOutcome> {
    let mut sections: std::vec::Vec<AxisParams> = std::vec::Vec::new();
    let mut current: Option<AxisParams> = None;
    let mut skipped = 0usize;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.eq_ignore_ascii_case("[AXIS]") {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            current = Some(AxisParams::new(sections.len() as u8));
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            skipped += 1;
            continue;
        };
        let Some(params) = current.as_mut() else {
            skipped += 1;
            continue;
        };
        match key.trim().parse::<usize>() {
            Ok(index) if index < KEY_COUNT => {
                decode_key(params, index, value.trim())?;
            }
            _ => skipped += 1,
        }
    }
    if let Some(done) = current.take() {
        sections.push(done);
    }

    let mut store = ParamStore::with_axes(sections.len() as u8);
    for params in sections {
        let id = params.axis_no;
        store.replace(id, params)?;
    }
    Ok(LoadOutcome {
        store,
        skipped_keys: skipped,
    })
}

fn encode_key(p: &AxisParams, key: usize) -> String {
    match key {
        0 => format!("{}", p.axis_no),
        1 => format!("{}", p.unit_ratio.unit),
        2 => format!("{}", p.unit_ratio.pulse),
        // Method and polarity packed into one code, vendor style.
        3 => format!("{}", p.pulse_method.code() * 2 + p.pulse_level.code()),
        4 => format!("{}", p.encoder_method.code() * 2 + p.encoder_invert as u8),
        5 => format!("{}", p.min_vel.0),
        6 => format!("{}", p.max_vel.0),
        7 => format!("{}", p.profile_mode.code()),
        8 => format!("{}", p.accel_unit.code()),
        9 => format!("{}", p.jerk_accel_ratio),
        10 => format!("{}", p.jerk_decel_ratio),
        11 => format!("{}", p.decel_detect.code()),
        12 => format!("{}", p.remain_pulse),
        13 => format!("{}", p.position_mode.code()),
        14 => format!("{}", p.servo_on_level.code()),
        15 => format!("{}", p.alarm_level.code()),
        16 => format!("{}", p.inpos_level.code()),
        17 => format!("{}", p.limit_level.code()),
        18 => format!("{}", p.limit_stop_mode.code()),
        19 => format!("{}", p.estop_level.code()),
        20 => format!("{}", p.homing.method.code()),
        21 => format!("{}", p.homing.direction),
        22 => format!("{}", p.homing.z_use.code()),
        23 => format!("{}", p.homing.fast_vel.0),
        24 => format!("{}", p.homing.backoff_vel.0),
        25 => format!("{}", p.homing.slow_vel.0),
        26 => format!("{}", p.homing.fine_vel.0),
        27 => format!("{}", p.homing.accel_1.0),
        28 => format!("{}", p.homing.accel_2.0),
        29 => format!("{}", p.homing.offset.0),
        30 => format!("{}", p.homing.dog_length.0),
        31 => format!("{}", p.homing.scan_time_ms),
        32 => format!("{}", p.homing.fine_search as u8),
        33 => format!("{}", p.homing.clear_after_home as u8),
        34 => format!("{}", p.homing.interlock.code()),
        35 => format!("{}", p.backlash.direction),
        36 => format!("{}", p.backlash.amount.0),
        37 => format!("{}", p.soft_limit.negative.0),
        38 => format!("{}", p.soft_limit.positive.0),
        39 => {
            let code = if !p.soft_limit.enabled {
                0
            } else {
                match p.soft_limit.stop_mode {
                    StopMode::Slowdown => 1,
                    StopMode::Emergency => 2,
                }
            };
            format!("{}", code)
        }
        _ => String::new(),
    }
}

fn decode_key(p: &mut AxisParams, key: usize, value: &str) -> Result<()> {
    let decode = Error::InvalidParameter(ParamIssue::Decode);
    let as_f64 = |v: &str| v.parse::<f64>().map_err(|_| decode);
    let as_i64 = |v: &str| v.parse::<i64>().map_err(|_| decode);
    let as_u8 = |v: &str| v.parse::<u8>().map_err(|_| decode);

    match key {
        0 => p.axis_no = as_u8(value)?,
        1 => p.unit_ratio.unit = as_f64(value)?,
        2 => p.unit_ratio.pulse = as_f64(value)?,
        3 => {
            let code = as_u8(value)?;
            p.pulse_method = PulseMethod::from_code(code / 2)?;
            p.pulse_level = Level::from_code(code % 2)?;
        }
        4 => {
            let code = as_u8(value)?;
            p.encoder_method = EncoderMethod::from_code(code / 2)?;
            p.encoder_invert = code % 2 == 1;
        }
        5 => p.min_vel = UnitsPerSec(as_f64(value)?),
        6 => p.max_vel = UnitsPerSec(as_f64(value)?),
        7 => p.profile_mode = ProfileMode::from_code(as_u8(value)?)?,
        8 => p.accel_unit = AccelUnit::from_code(as_u8(value)?)?,
        9 => p.jerk_accel_ratio = as_f64(value)?,
        10 => p.jerk_decel_ratio = as_f64(value)?,
        11 => p.decel_detect = DecelDetect::from_code(as_u8(value)?)?,
        12 => p.remain_pulse = as_i64(value)?,
        13 => p.position_mode = PositionMode::from_code(as_u8(value)?)?,
        14 => p.servo_on_level = Level::from_code(as_u8(value)?)?,
        15 => p.alarm_level = Level::from_code(as_u8(value)?)?,
        16 => p.inpos_level = Level::from_code(as_u8(value)?)?,
        17 => p.limit_level = Level::from_code(as_u8(value)?)?,
        18 => p.limit_stop_mode = StopMode::from_code(as_u8(value)?)?,
        19 => p.estop_level = Level::from_code(as_u8(value)?)?,
        20 => p.homing.method = HomeMethod::from_code(as_u8(value)?)?,
        21 => p.homing.direction = value.parse::<i8>().map_err(|_| decode)?,
        22 => p.homing.z_use = ZPhaseUse::from_code(as_u8(value)?)?,
        23 => p.homing.fast_vel = UnitsPerSec(as_f64(value)?),
        24 => p.homing.backoff_vel = UnitsPerSec(as_f64(value)?),
        25 => p.homing.slow_vel = UnitsPerSec(as_f64(value)?),
        26 => p.homing.fine_vel = UnitsPerSec(as_f64(value)?),
        27 => p.homing.accel_1 = UnitsPerSec2(as_f64(value)?),
        28 => p.homing.accel_2 = UnitsPerSec2(as_f64(value)?),
        29 => p.homing.offset = Units(as_f64(value)?),
        30 => p.homing.dog_length = Units(as_f64(value)?),
        31 => p.homing.scan_time_ms = value.parse::<u32>().map_err(|_| decode)?,
        32 => p.homing.fine_search = as_u8(value)? != 0,
        33 => p.homing.clear_after_home = as_u8(value)? != 0,
        34 => p.homing.interlock = HomeInterlock::from_code(as_u8(value)?)?,
        35 => p.backlash.direction = value.parse::<i8>().map_err(|_| decode)?,
        36 => p.backlash.amount = Units(as_f64(value)?),
        37 => p.soft_limit.negative = Units(as_f64(value)?),
        38 => p.soft_limit.positive = Units(as_f64(value)?),
        39 => match as_u8(value)? {
            0 => p.soft_limit.enabled = false,
            1 => {
                p.soft_limit.enabled = true;
                p.soft_limit.stop_mode = StopMode::Slowdown;
            }
            2 => {
                p.soft_limit.enabled = true;
                p.soft_limit.stop_mode = StopMode::Emergency;
            }
            _ => return Err(decode),
        },
        _ => return Err(decode),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_parse_round_trip_is_byte_exact() {
        let mut store = ParamStore::with_axes(2);
        store.set_unit_ratio(0, 1.0, 1000.0).unwrap();
        store
            .set_velocity_window(0, UnitsPerSec(0.5), UnitsPerSec(700000.0))
            .unwrap();
        store.set_backlash(1, -1, Units(0.125)).unwrap();

        let text = render_all(&store);
        let outcome = parse_all(&text).unwrap();
        assert_eq!(outcome.skipped_keys, 0);
        assert_eq!(render_all(&outcome.store), text);
    }

    #[test]
    fn unknown_keys_are_skipped_with_warning() {
        let text = "[AXIS]\n0=0\n6=100.0\n99=7\nbogus\n";
        let outcome = parse_all(text).unwrap();
        assert_eq!(outcome.skipped_keys, 2);
        assert_eq!(outcome.store.axis(0).unwrap().max_vel, UnitsPerSec(100.0));
    }

    #[test]
    fn packed_pulse_code_round_trips() {
        let mut store = ParamStore::with_axes(1);
        store
            .try_update(0, |p| {
                p.pulse_method = PulseMethod::QuadratureLag;
                p.pulse_level = Level::ActiveLow;
            })
            .unwrap();
        let outcome = parse_all(&render_all(&store)).unwrap();
        let p = outcome.store.axis(0).unwrap();
        assert_eq!(p.pulse_method, PulseMethod::QuadratureLag);
        assert_eq!(p.pulse_level, Level::ActiveLow);
    }
}
