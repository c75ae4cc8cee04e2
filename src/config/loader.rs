//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{Error, ParamIssue, Result};

use super::system::SystemConfig;

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SystemConfig> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|_| Error::InvalidParameter(ParamIssue::Decode))?;
    parse_config(&content)
}

/// Parse configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<SystemConfig> {
    let config: SystemConfig =
        toml::from_str(content).map_err(|_| Error::InvalidParameter(ParamIssue::Decode))?;
    super::validation::validate_config(&config)?;
    Ok(config)
}
