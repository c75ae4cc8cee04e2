//! Configuration validation.

use crate::error::{Error, ParamIssue, Result};

use super::system::SystemConfig;

/// Validate a system configuration before it is used.
///
/// Checks:
/// - Every axis block passes its own invariants
/// - Axis numbers are unique
/// - Coordinates reference existing axes, listed ascending
pub fn validate_config(config: &SystemConfig) -> Result<()> {
    let mut seen = [false; crate::param::MAX_AXES];
    for params in config.axes.values() {
        params.validate()?;
        let slot = params.axis_no as usize;
        if slot >= seen.len() || seen[slot] {
            return Err(Error::InvalidAxis(params.axis_no));
        }
        seen[slot] = true;
    }

    for coord in config.coordinates.values() {
        if coord.id as usize >= crate::coord::MAX_COORDS {
            return Err(Error::InvalidParameter(ParamIssue::OutOfRange));
        }
        for pair in coord.axes.windows(2) {
            if pair[1] <= pair[0] {
                return Err(Error::InvalidParameter(ParamIssue::TableOrder));
            }
        }
        for &axis in coord.axes.iter() {
            if !seen.get(axis as usize).copied().unwrap_or(false) {
                return Err(Error::InvalidAxis(axis));
            }
        }
    }
    Ok(())
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn duplicate_axis_numbers_rejected() {
        let toml = r#"
[axes.x]
axis_no = 0
max_vel = 100.0

[axes.y]
axis_no = 0
max_vel = 100.0
"#;
        let config: SystemConfig = toml::from_str(toml).unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn coordinate_must_reference_axes() {
        let toml = r#"
[axes.x]
axis_no = 0
max_vel = 100.0

[coordinates.xy]
id = 0
axes = [0, 1]
"#;
        let config: SystemConfig = toml::from_str(toml).unwrap();
        assert!(validate_config(&config).is_err());
    }
}
