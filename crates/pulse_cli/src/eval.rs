//! `pulse eval`: compute the value of one signal.
//!
//! By default the operator tree feeding the signal is evaluated once in
//! dependency order with no notion of time. `--timed` instead simulates
//! every undriven input the signal depends on until the network settles.

use std::path::Path;

use pulse_common::Value;
use pulse_config::PulseConfig;
use pulse_sim::{settle, Netlist, SimConfig, TracingSink};

use crate::netlist_file::NetlistFile;
use crate::pipeline::load_run_config;
use crate::{EvalArgs, GlobalArgs};

/// Runs the `pulse eval` command and prints the value to stdout.
pub fn run(args: &EvalArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_run_config(global)?;
    let mut netlist = NetlistFile::load(Path::new(&args.netlist))?.build()?.netlist;
    let value = evaluate(&mut netlist, &args.signal, args.timed, &config)?;
    println!("{value}");
    Ok(0)
}

fn evaluate(
    netlist: &mut Netlist,
    name: &str,
    timed: bool,
    config: &PulseConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let signal = netlist
        .find_signal(name)
        .ok_or_else(|| format!("no signal named `{name}`"))?;
    if timed {
        return Ok(settle(netlist, signal, SimConfig::from(&config.sim))?);
    }
    let root = netlist
        .driving_operator(signal)
        .ok_or_else(|| format!("signal `{name}` is not driven by an operator"))?;
    let value = if config.sim.log {
        netlist.static_eval_logged(root, &mut TracingSink)?
    } else {
        netlist.static_eval(root)?
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETLIST: &str = r#"{
        "signals": [
            { "name": "a", "width": 4, "default": "0110" },
            { "name": "b", "width": 4, "default": "0011" },
            { "name": "eq" }
        ],
        "operators": [
            { "kind": "add", "operands": ["a", "b"] },
            { "kind": "eq", "operands": ["add_0", { "const": "1001" }], "result": "eq" }
        ]
    }"#;

    fn netlist() -> Netlist {
        NetlistFile::parse(NETLIST).unwrap().build().unwrap().netlist
    }

    #[test]
    fn static_evaluation() {
        let mut n = netlist();
        let config = PulseConfig::default();
        let sum = evaluate(&mut n, "add_0", false, &config).unwrap();
        assert_eq!(sum, Value::from_u64(9, 4));
        let eq = evaluate(&mut n, "eq", false, &config).unwrap();
        assert_eq!(eq, Value::from_bool(true));
    }

    #[test]
    fn timed_evaluation_matches_static() {
        let mut n = netlist();
        let config = PulseConfig::default();
        assert_eq!(
            evaluate(&mut n, "eq", true, &config).unwrap(),
            Value::from_bool(true)
        );
    }

    #[test]
    fn undriven_or_unknown_signals_are_errors() {
        let mut n = netlist();
        let config = PulseConfig::default();
        let err = evaluate(&mut n, "a", false, &config).err().unwrap();
        assert_eq!(err.to_string(), "signal `a` is not driven by an operator");
        let err = evaluate(&mut n, "zz", false, &config).err().unwrap();
        assert_eq!(err.to_string(), "no signal named `zz`");
    }
}
