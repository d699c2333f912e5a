//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::PulseConfig;
use std::path::Path;

/// File name looked up inside a run directory.
pub const CONFIG_FILE_NAME: &str = "pulse.toml";

/// Loads and validates `pulse.toml` from a run directory.
pub fn load_config(dir: &Path) -> Result<PulseConfig, ConfigError> {
    let content = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME))?;
    load_config_from_str(&content)
}

/// Parses and validates a `pulse.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<PulseConfig, ConfigError> {
    let config: PulseConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &PulseConfig) -> Result<(), ConfigError> {
    let wave = &config.waveform;
    if wave.module.is_empty() {
        return Err(ConfigError::MissingField("waveform.module".to_string()));
    }
    if wave.timescale.is_zero() {
        return Err(ConfigError::ValidationError(
            "waveform.timescale must be non-zero".to_string(),
        ));
    }
    if wave.enabled && wave.path.as_deref().is_none_or(str::is_empty) {
        return Err(ConfigError::MissingField("waveform.path".to_string()));
    }
    if let Some(until) = config.sim.until {
        if until.is_zero() {
            return Err(ConfigError::ValidationError(
                "sim.until must be non-zero".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::SimTime;

    #[test]
    fn empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.sim.ris_fal_dur, SimTime::from_ps(100));
        assert_eq!(config.sim.op_propag_dur, SimTime::from_ps(10));
        assert_eq!(config.sim.until, None);
        assert!(!config.sim.log);
        assert!(!config.waveform.enabled);
        assert_eq!(config.waveform.module, "top");
        assert_eq!(config.waveform.timescale, SimTime::from_ps(1));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[sim]
ris_fal_dur = "200ps"
op_propag_dur = 5
until = "10ns"
log = true

[waveform]
enabled = true
path = "out/trace.vcd"
module = "dut"
timescale = "1ns"
date = "today"
version = "pulse test"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.sim.ris_fal_dur, SimTime::from_ps(200));
        assert_eq!(config.sim.op_propag_dur, SimTime::from_ps(5));
        assert_eq!(config.sim.until, Some(SimTime::from_ns(10)));
        assert!(config.sim.log);
        assert_eq!(config.waveform.path.as_deref(), Some("out/trace.vcd"));
        assert_eq!(config.waveform.module, "dut");
        assert_eq!(config.waveform.timescale, SimTime::from_ns(1));
        assert_eq!(config.waveform.date.as_deref(), Some("today"));
        assert_eq!(config.waveform.version.as_deref(), Some("pulse test"));
    }

    #[test]
    fn enabled_waveform_requires_path() {
        let err = load_config_from_str("[waveform]\nenabled = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "waveform.path"));
    }

    #[test]
    fn zero_timescale_rejected() {
        let err = load_config_from_str("[waveform]\ntimescale = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn empty_module_rejected() {
        let err = load_config_from_str("[waveform]\nmodule = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn zero_until_rejected() {
        let err = load_config_from_str("[sim]\nuntil = \"0ns\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn bad_duration_is_parse_error() {
        let err = load_config_from_str("[sim]\nris_fal_dur = \"10 parsecs\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_key_is_parse_error() {
        let err = load_config_from_str("[sim]\nrise = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[sim]\nlog = true\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert!(config.sim.log);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
