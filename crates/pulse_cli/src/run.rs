//! `pulse run`: simulate a netlist description.
//!
//! Builds the netlist, binds it from its roots, drives the power-up
//! transition plus any stimuli and clocks, and runs the scheduler until the
//! time limit. Final signal values go to stdout; a VCD waveform is written
//! when enabled in the configuration or requested with `--output`.

use std::path::Path;

use pulse_config::WaveformSettings;
use pulse_sim::{open_waveform, Scheduler, SimConfig, SimResult};

use crate::netlist_file::{LoadedNetlist, NetlistFile};
use crate::pipeline::{load_run_config, resolve_time_limit};
use crate::{GlobalArgs, RunArgs};

/// Runs the `pulse run` command. Returns exit code 0 on success.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_run_config(global)?;
    let until = resolve_time_limit(args.time.as_deref(), &config)?;
    let waveform = waveform_settings(args, &config.waveform);
    let mut sim_config = SimConfig::from(&config.sim);
    sim_config.log |= args.log;

    let mut loaded = NetlistFile::load(Path::new(&args.netlist))?.build()?;

    if !global.quiet {
        eprintln!("   Simulating {} until {until}", args.netlist);
    }

    let result = simulate(&mut loaded, sim_config, &waveform, until)?;

    if !global.quiet {
        for (_, signal) in loaded.netlist.signals() {
            println!("{} = {}", signal.name(), signal.value());
        }
        eprintln!(
            "   Finished at {}: {} updates, {} evaluations",
            result.final_time, result.updates, result.evaluations
        );
        if let Some(path) = waveform.path.as_deref().filter(|_| waveform.enabled) {
            eprintln!("   Waveform written to {path}");
        }
    }
    Ok(0)
}

fn simulate(
    loaded: &mut LoadedNetlist,
    config: SimConfig,
    waveform: &WaveformSettings,
    until: pulse_common::SimTime,
) -> Result<SimResult, Box<dyn std::error::Error>> {
    let mut tracer = open_waveform(waveform)?;
    let processes = std::mem::take(&mut loaded.processes);
    let result = {
        let mut scheduler = Scheduler::new(&mut loaded.netlist, config);
        if let Some(t) = tracer.as_mut() {
            scheduler.add_observer(t);
        }
        scheduler.simulate(&loaded.roots, until, processes)?
    };
    if let Some(t) = tracer {
        t.into_inner()?;
    }
    Ok(result)
}

/// Applies `--output` and `--no-waveform` on top of the configured settings.
fn waveform_settings(args: &RunArgs, configured: &WaveformSettings) -> WaveformSettings {
    let mut settings = configured.clone();
    if args.no_waveform {
        settings.enabled = false;
    } else if let Some(out) = &args.output {
        settings.enabled = true;
        settings.path = Some(out.clone());
    }
    settings
}
