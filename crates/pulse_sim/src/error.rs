//! Simulation error types for the event-driven signal simulator.
//!
//! All errors that can occur while building a netlist, running a scheduler or
//! writing a waveform are represented as variants of [`SimError`]. None of them
//! is recoverable: each names the offending node, signal or time so the model
//! can be fixed without re-running.

use pulse_common::SimTime;
use std::io;

/// Errors that can occur during netlist construction, simulation or tracing.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A node reference does not belong to the netlist being walked.
    #[error("unrecognized node {node}")]
    UnrecognizedNode {
        /// Description of the reference that could not be resolved.
        node: String,
    },

    /// A node is already bound to a different, still-active simulation context.
    #[error("{node} is already bound to simulation context {bound}, cannot bind to {requested}")]
    AlreadyBound {
        /// The offending node.
        node: String,
        /// The context currently holding the node.
        bound: String,
        /// The context that tried to bind it.
        requested: String,
    },

    /// Event-driven propagation was requested on a node that no scheduler owns.
    #[error("{node} is not bound to any simulator")]
    Unbound {
        /// The offending node.
        node: String,
    },

    /// A waveform change was written at an earlier time than the last one.
    #[error("invalid waveform time update {last} -> {requested}")]
    TimeRewind {
        /// The last time written to the waveform.
        last: u64,
        /// The earlier time that was requested.
        requested: u64,
    },

    /// A signal was registered for tracing twice.
    #[error("signal {signal} is already registered in the waveform")]
    DuplicateVar {
        /// Name of the signal.
        signal: String,
    },

    /// A change was written for a signal that was never registered.
    #[error("signal {signal} is not registered in the waveform")]
    UnknownVar {
        /// Name or id of the signal.
        signal: String,
    },

    /// Waveform sections were written out of order.
    #[error("waveform section `{section}` written out of order: {reason}")]
    WaveformOrder {
        /// The section that was being written.
        section: &'static str,
        /// What was wrong with the order.
        reason: String,
    },

    /// An operator was given operands its kind cannot accept.
    #[error("invalid operands for {kind}: {reason}")]
    InvalidOperand {
        /// Name of the operator kind.
        kind: String,
        /// Description of the arity or width problem.
        reason: String,
    },

    /// A value's width does not match the signal it is written to.
    #[error("width mismatch on {signal}: expected {expected} bits, got {actual}")]
    WidthMismatch {
        /// Name of the signal.
        signal: String,
        /// Declared width of the signal.
        expected: u32,
        /// Width of the value.
        actual: u32,
    },

    /// Static evaluation reached a node that depends on itself.
    #[error("combinational loop through {node}")]
    CombinationalLoop {
        /// A node on the loop.
        node: String,
    },

    /// A process waited on a process id that was never spawned.
    #[error("process {0} does not exist")]
    UnknownProcess(u32),

    /// The clock would run past the largest representable time.
    #[error("time overflow scheduling {delay} after {now}")]
    TimeOverflow {
        /// Current simulation time.
        now: SimTime,
        /// Requested delay.
        delay: SimTime,
    },

    /// An I/O error occurred while writing waveform data.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),
}
