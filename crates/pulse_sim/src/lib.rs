//! Discrete-event simulator for digital signal networks.
//!
//! A [`Netlist`] holds named signals, operator nodes and assignments. A
//! [`Scheduler`] binds the part of the netlist reachable from a set of root
//! signals to one virtual clock, drives a power-up transition on the roots
//! and then propagates changes through operators and assignments in strict
//! time order. Observers such as [`VcdTracer`] see every applied update.
//!
//! # Usage
//!
//! ```ignore
//! use pulse_common::{SimTime, Value};
//! use pulse_sim::{simulate, DataType, Netlist, OpKind, SimConfig};
//!
//! let mut netlist = Netlist::new();
//! let a = netlist.add_signal("a", DataType::Bit, Value::from_bool(true))?;
//! let b = netlist.add_signal("b", DataType::Bit, Value::from_bool(true))?;
//! let y = netlist.apply(OpKind::And, vec![a.into(), b.into()])?;
//! simulate(&mut netlist, SimConfig::default(), &[a, b], SimTime::from_ns(1), Vec::new())?;
//! assert_eq!(netlist.signal(y).value(), &Value::from_bool(true));
//! ```
//!
//! # Modules
//!
//! - `error`: Simulation error types
//! - `graph`: Signals, assignments and the netlist arenas
//! - `ops`: Operator kinds and their evaluation rules
//! - `expr`: Operator nodes, deep copy and static evaluation
//! - `kernel`: The event scheduler
//! - `process`: Resumable units of work
//! - `observer`: Update observers
//! - `vcd`: VCD waveform output

#![warn(missing_docs)]

pub mod arena;
pub mod config;
pub mod error;
pub mod expr;
pub mod graph;
pub mod ids;
pub mod kernel;
pub mod log;
pub mod observer;
pub mod ops;
pub mod process;
pub mod vcd;

use pulse_common::{SimTime, Value};

pub use config::SimConfig;
pub use error::SimError;
pub use expr::{Operator, OperatorKey};
pub use graph::{Assignment, DataType, Netlist, NodeRef, Operand, Signal};
pub use ids::{AssignmentId, ContextId, OperatorId, ProcessId, SignalId};
pub use kernel::{BeforeSimHook, Scheduler, SimResult};
pub use log::{LogSink, MemorySink, TracingSink};
pub use observer::{Change, ChangeRecorder, SignalObserver};
pub use ops::OpKind;
pub use process::{Clock, Process, ProcessCtx, Stimulus, Suspend};
pub use vcd::{open_waveform, VcdModule, VcdTracer, VcdWriter};

/// How long [`settle`] lets a network run.
pub const SETTLE_TIME: SimTime = SimTime::from_ms(100);

/// Runs `netlist` from `roots` until `until` with a fresh scheduler.
///
/// On return every bound signal holds its last value at or before `until`,
/// and all bindings are released again.
pub fn simulate<'a>(
    netlist: &'a mut Netlist,
    config: SimConfig,
    roots: &[SignalId],
    until: SimTime,
    extra: Vec<Box<dyn Process + 'a>>,
) -> Result<SimResult, SimError> {
    tracing::debug!(roots = roots.len(), until_ps = until.as_ps(), "starting simulation");
    let result = Scheduler::new(netlist, config).simulate(roots, until, extra)?;
    tracing::debug!(
        updates = result.updates,
        evaluations = result.evaluations,
        "simulation finished"
    );
    Ok(result)
}

/// Simulates everything `signal` depends on for [`SETTLE_TIME`] and returns
/// its final value.
///
/// This is the timed counterpart of [`Netlist::static_eval`]: operators run
/// with their propagation delays and the undriven inputs go through their
/// power-up transition first.
pub fn settle(netlist: &mut Netlist, signal: SignalId, config: SimConfig) -> Result<Value, SimError> {
    let roots = netlist.origin_signals(signal)?;
    simulate(netlist, config, &roots, SETTLE_TIME, Vec::new())?;
    Ok(netlist.signal(signal).value().settled())
}
