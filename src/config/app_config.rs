use std::error::Error;
use std::fs;

use super::model::ProbeConfig;

/// Load and validate the probe configuration from a JSON file.
/// Any failure here is fatal and happens before the first request goes out.
pub fn load_config(path: &str) -> Result<ProbeConfig, Box<dyn Error>> {
    let config_str = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config file {path:?}: {err}"))?;
    let config: ProbeConfig = serde_json::from_str(&config_str)
        .map_err(|err| format!("failed to parse config file {path:?}: {err}"))?;
    config.validate()?;
    Ok(config)
}
