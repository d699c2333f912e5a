//! Configuration types deserialized from `pulse.toml`.

use pulse_common::SimTime;
use serde::Deserialize;

/// The top-level run configuration parsed from `pulse.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PulseConfig {
    /// Scheduler timing and diagnostics.
    #[serde(default)]
    pub sim: SimSettings,
    /// Waveform (VCD) output.
    #[serde(default)]
    pub waveform: WaveformSettings,
}

/// Timing parameters of a simulation run.
///
/// Durations accept either an integer picosecond count or a string with a
/// unit such as `"10ns"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimSettings {
    /// Power-up rise/fall modeling delay.
    #[serde(default = "default_ris_fal_dur")]
    pub ris_fal_dur: SimTime,
    /// Delay between an operand change and the operator's result update.
    #[serde(default = "default_op_propag_dur")]
    pub op_propag_dur: SimTime,
    /// Default run length when the caller does not supply one.
    #[serde(default)]
    pub until: Option<SimTime>,
    /// Enable diagnostic tracing of every update and evaluation.
    #[serde(default)]
    pub log: bool,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            ris_fal_dur: default_ris_fal_dur(),
            op_propag_dur: default_op_propag_dur(),
            until: None,
            log: false,
        }
    }
}

/// Waveform dump settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaveformSettings {
    /// Whether a waveform is written at all.
    #[serde(default)]
    pub enabled: bool,
    /// Output file path. Required when `enabled` is set.
    #[serde(default)]
    pub path: Option<String>,
    /// Name of the scope holding the traced signals.
    #[serde(default = "default_module")]
    pub module: String,
    /// Time unit of the dump; change times are written in multiples of it.
    #[serde(default = "default_timescale")]
    pub timescale: SimTime,
    /// Text of the `$date` section. Defaults to the local date at run time.
    #[serde(default)]
    pub date: Option<String>,
    /// Text of the `$version` section.
    #[serde(default)]
    pub version: Option<String>,
}

impl Default for WaveformSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            module: default_module(),
            timescale: default_timescale(),
            date: None,
            version: None,
        }
    }
}

fn default_ris_fal_dur() -> SimTime {
    SimTime::from_ps(100)
}

fn default_op_propag_dur() -> SimTime {
    SimTime::from_ps(10)
}

fn default_module() -> String {
    "top".to_string()
}

fn default_timescale() -> SimTime {
    SimTime::from_ps(1)
}
