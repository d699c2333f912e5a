//! Shared helpers for CLI commands: configuration lookup and time limits.

use std::path::{Path, PathBuf};

use pulse_common::SimTime;
use pulse_config::{PulseConfig, CONFIG_FILE_NAME};

use crate::GlobalArgs;

/// Loads the run configuration.
///
/// Uses the `--config` file when given. Otherwise reads `pulse.toml` from the
/// current directory if one exists, falling back to built-in defaults.
pub fn load_run_config(global: &GlobalArgs) -> Result<PulseConfig, Box<dyn std::error::Error>> {
    match &global.config {
        Some(path) => load_config_file(Path::new(path)),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.is_file() {
                load_config_file(&local)
            } else {
                Ok(PulseConfig::default())
            }
        }
    }
}

fn load_config_file(path: &Path) -> Result<PulseConfig, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    pulse_config::load_config_from_str(&content)
        .map_err(|e| format!("{}: {e}", path.display()).into())
}

/// Picks the run length: the command-line value, else `sim.until`.
pub fn resolve_time_limit(
    arg: Option<&str>,
    config: &PulseConfig,
) -> Result<SimTime, Box<dyn std::error::Error>> {
    if let Some(text) = arg {
        let time: SimTime = text
            .parse()
            .map_err(|e| format!("invalid time limit `{text}`: {e}"))?;
        return Ok(time);
    }
    config
        .sim
        .until
        .ok_or_else(|| "no time limit: pass --time or set `sim.until` in pulse.toml".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            config,
        }
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ci.toml");
        std::fs::write(&path, "[sim]\nop_propag_dur = \"3ps\"\nuntil = \"2ns\"\n").unwrap();
        let config = load_run_config(&global(Some(path.display().to_string()))).unwrap();
        assert_eq!(config.sim.op_propag_dur, SimTime::from_ps(3));
        assert_eq!(resolve_time_limit(None, &config).unwrap(), SimTime::from_ns(2));
    }

    #[test]
    fn invalid_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[waveform]\nenabled = true\n").unwrap();
        let err = load_run_config(&global(Some(path.display().to_string())))
            .err()
            .unwrap();
        assert!(err.to_string().contains("bad.toml"));
        assert!(err.to_string().contains("waveform.path"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_run_config(&global(Some("/nonexistent/pulse.toml".to_string())));
        assert!(err.is_err());
    }

    #[test]
    fn command_line_time_wins() {
        let config = pulse_config::load_config_from_str("[sim]\nuntil = 5\n").unwrap();
        assert_eq!(
            resolve_time_limit(Some("1ns"), &config).unwrap(),
            SimTime::from_ns(1)
        );
        assert!(resolve_time_limit(Some("soon"), &config).is_err());
        assert!(resolve_time_limit(None, &PulseConfig::default()).is_err());
    }
}
