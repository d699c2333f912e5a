//! JSON netlist descriptions.
//!
//! A file lists signals, then operators and assignments over them, plus the
//! stimuli and clocks that drive the inputs during a run:
//!
//! ```json
//! {
//!   "signals": [
//!     { "name": "a", "default": "1" },
//!     { "name": "b", "default": "0" },
//!     { "name": "y", "width": 1 }
//!   ],
//!   "operators": [{ "kind": "xor", "operands": ["a", "b"], "result": "y" }],
//!   "stimuli": [{ "signal": "b", "steps": [{ "at": "200ps", "value": "1" }] }]
//! }
//! ```
//!
//! Values are binary strings, most significant bit first, with `x` for
//! undefined bits. Durations accept the same forms as `pulse.toml`.

use std::error::Error;
use std::path::Path;

use pulse_common::{SimTime, Value};
use pulse_sim::{Clock, DataType, Netlist, OpKind, Operand, Process, SignalId, Stimulus};
use serde::Deserialize;

/// A parsed netlist description.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetlistFile {
    #[serde(default)]
    signals: Vec<SignalDecl>,
    #[serde(default)]
    operators: Vec<OperatorDecl>,
    #[serde(default)]
    assignments: Vec<AssignmentDecl>,
    #[serde(default)]
    stimuli: Vec<StimulusDecl>,
    #[serde(default)]
    clocks: Vec<ClockDecl>,
    /// Signals the run starts from. Defaults to every undriven signal.
    #[serde(default)]
    roots: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignalDecl {
    name: String,
    #[serde(default = "default_width")]
    width: u32,
    /// Power-up value; omitted means fully undefined.
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OperatorDecl {
    kind: String,
    operands: Vec<OperandDecl>,
    /// Existing signal to drive; omitted means a fresh or shared result.
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OperandDecl {
    Signal(String),
    Const {
        #[serde(rename = "const")]
        value: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssignmentDecl {
    src: OperandDecl,
    dst: String,
    #[serde(default)]
    after: Option<SimTime>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StimulusDecl {
    signal: String,
    steps: Vec<StepDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepDecl {
    at: SimTime,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClockDecl {
    signal: String,
    half_period: SimTime,
    #[serde(default)]
    start: SimTime,
}

fn default_width() -> u32 {
    1
}

/// A netlist built from a description, ready to simulate.
pub struct LoadedNetlist {
    /// The constructed network.
    pub netlist: Netlist,
    /// Roots of the run, stimulus and clock targets included.
    pub roots: Vec<SignalId>,
    /// Stimuli and clocks, in file order.
    pub processes: Vec<Box<dyn Process>>,
}

impl NetlistFile {
    /// Reads and parses a description from disk.
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        Self::parse(&text).map_err(|e| format!("{}: {e}", path.display()).into())
    }

    /// Parses a description from JSON text.
    pub fn parse(text: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the netlist and the processes driving it.
    pub fn build(&self) -> Result<LoadedNetlist, Box<dyn Error>> {
        let mut netlist = Netlist::new();

        for decl in &self.signals {
            if netlist.find_signal(&decl.name).is_some() {
                return Err(format!("duplicate signal `{}`", decl.name).into());
            }
            let ty = match decl.width {
                0 => return Err(format!("signal `{}` has zero width", decl.name).into()),
                1 => DataType::Bit,
                width => DataType::Vector { width },
            };
            match &decl.default {
                Some(text) => {
                    netlist.add_signal(&decl.name, ty, parse_value(text)?)?;
                }
                None => {
                    netlist.add_wire(&decl.name, ty);
                }
            }
        }

        for decl in &self.operators {
            let kind: OpKind = decl.kind.parse()?;
            let operands = decl
                .operands
                .iter()
                .map(|o| operand(&netlist, o))
                .collect::<Result<Vec<_>, _>>()?;
            match &decl.result {
                Some(name) => {
                    let result = lookup(&netlist, name)?;
                    netlist.add_operator_with_result(kind, operands, result)?;
                }
                None => {
                    netlist.apply(kind, operands)?;
                }
            }
        }

        for decl in &self.assignments {
            let src = operand(&netlist, &decl.src)?;
            let dst = lookup(&netlist, &decl.dst)?;
            netlist.add_assignment(src, dst, decl.after)?;
        }

        let mut processes: Vec<Box<dyn Process>> = Vec::new();
        let mut driven = Vec::new();
        for decl in &self.stimuli {
            let signal = lookup(&netlist, &decl.signal)?;
            let steps = decl
                .steps
                .iter()
                .map(|s| -> Result<(SimTime, Value), Box<dyn Error>> {
                    Ok((s.at, sized_value(&netlist, signal, &s.value)?))
                })
                .collect::<Result<Vec<_>, _>>()?;
            processes.push(Box::new(Stimulus::new(signal, steps)));
            driven.push(signal);
        }
        for decl in &self.clocks {
            let signal = lookup(&netlist, &decl.signal)?;
            if netlist.signal(signal).width() != 1 {
                return Err(format!("clock signal `{}` must be 1 bit wide", decl.signal).into());
            }
            processes.push(Box::new(
                Clock::new(signal, decl.half_period).starting_at(decl.start),
            ));
            driven.push(signal);
        }

        let mut roots = match &self.roots {
            Some(names) => names
                .iter()
                .map(|n| lookup(&netlist, n))
                .collect::<Result<Vec<_>, _>>()?,
            None => netlist
                .signals()
                .filter(|(_, s)| s.drivers().is_empty())
                .map(|(id, _)| id)
                .collect(),
        };
        for signal in driven {
            if !roots.contains(&signal) {
                roots.push(signal);
            }
        }

        Ok(LoadedNetlist {
            netlist,
            roots,
            processes,
        })
    }
}

fn lookup(netlist: &Netlist, name: &str) -> Result<SignalId, Box<dyn Error>> {
    netlist
        .find_signal(name)
        .ok_or_else(|| format!("no signal named `{name}`").into())
}

fn operand(netlist: &Netlist, decl: &OperandDecl) -> Result<Operand, Box<dyn Error>> {
    match decl {
        OperandDecl::Signal(name) => Ok(Operand::Signal(lookup(netlist, name)?)),
        OperandDecl::Const { value } => Ok(Operand::Const(parse_value(value)?)),
    }
}

fn parse_value(text: &str) -> Result<Value, Box<dyn Error>> {
    Value::from_binary_str(text)
        .filter(|v| v.width() > 0)
        .ok_or_else(|| format!("invalid value `{text}`, expected binary digits or `x`").into())
}

fn sized_value(netlist: &Netlist, signal: SignalId, text: &str) -> Result<Value, Box<dyn Error>> {
    let value = parse_value(text)?;
    let sig = netlist.signal(signal);
    if value.width() != sig.width() {
        return Err(format!(
            "value `{text}` is {} bits wide, signal `{}` has {}",
            value.width(),
            sig.name(),
            sig.width()
        )
        .into());
    }
    Ok(value)
}
