//! `pulse check`: validate the run configuration.

use pulse_config::PulseConfig;

use crate::pipeline::load_run_config;
use crate::GlobalArgs;

/// Runs the `pulse check` command.
///
/// Loading already validates the file; on success the effective settings
/// are printed so defaults are visible.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_run_config(global)?;
    if !global.quiet {
        for line in summary(&config) {
            println!("{line}");
        }
    }
    Ok(0)
}

fn summary(config: &PulseConfig) -> Vec<String> {
    let sim = &config.sim;
    let wave = &config.waveform;
    let mut lines = vec![
        format!("sim.ris_fal_dur   = {}", sim.ris_fal_dur),
        format!("sim.op_propag_dur = {}", sim.op_propag_dur),
        match sim.until {
            Some(t) => format!("sim.until         = {t}"),
            None => "sim.until         = (not set)".to_string(),
        },
        format!("sim.log           = {}", sim.log),
    ];
    if wave.enabled {
        lines.push(format!(
            "waveform          = {} (module {}, timescale {})",
            wave.path.as_deref().unwrap_or_default(),
            wave.module,
            wave.timescale
        ));
    } else {
        lines.push("waveform          = disabled".to_string());
    }
    lines
}
