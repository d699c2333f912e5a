//! Per-run scheduler parameters.

use pulse_common::SimTime;
use pulse_config::SimSettings;
use serde::{Deserialize, Serialize};

/// Timing and diagnostics of one simulation run.
///
/// Built once before the run and read-only afterwards. The pre-run hook and
/// the log sink are installed on the [`Scheduler`](crate::Scheduler) itself
/// since they are not plain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Power-up rise/fall modeling delay.
    pub ris_fal_dur: SimTime,
    /// Delay between an operand change and the operator's result update.
    pub op_propag_dur: SimTime,
    /// Log every update and evaluation to the scheduler's sink.
    pub log: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ris_fal_dur: SimTime::from_ps(100),
            op_propag_dur: SimTime::from_ps(10),
            log: false,
        }
    }
}

impl From<&SimSettings> for SimConfig {
    fn from(settings: &SimSettings) -> Self {
        Self {
            ris_fal_dur: settings.ris_fal_dur,
            op_propag_dur: settings.op_propag_dur,
            log: settings.log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SimConfig::default();
        assert_eq!(c.ris_fal_dur, SimTime::from_ps(100));
        assert_eq!(c.op_propag_dur, SimTime::from_ps(10));
        assert!(!c.log);
    }

    #[test]
    fn from_loaded_settings() {
        let cfg = pulse_config::load_config_from_str(
            "[sim]\nris_fal_dur = \"1ns\"\nop_propag_dur = 5\nlog = true\n",
        )
        .unwrap();
        let c = SimConfig::from(&cfg.sim);
        assert_eq!(c.ris_fal_dur, SimTime::from_ns(1));
        assert_eq!(c.op_propag_dur, SimTime::from_ps(5));
        assert!(c.log);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SimConfig {
            ris_fal_dur: SimTime::from_ns(2),
            ..SimConfig::default()
        };
        let json = serde_json::to_string(&c).unwrap();
        let back: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
