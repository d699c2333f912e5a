//! Observers of applied signal updates.

use crate::error::SimError;
use crate::graph::{Netlist, Signal};
use crate::ids::SignalId;
use pulse_common::{SimTime, Value};

/// Receives every update the scheduler applies.
///
/// Observers see updates that change nothing as well, so a trace records
/// every drive even when fan-out is not woken.
pub trait SignalObserver {
    /// Called once after binding with the signals registered for the run.
    fn before_sim(&mut self, _netlist: &Netlist, _registered: &[SignalId]) -> Result<(), SimError> {
        Ok(())
    }

    /// Called after `signal` took a new value at `time`.
    fn on_change(&mut self, time: SimTime, id: SignalId, signal: &Signal) -> Result<(), SimError>;

    /// Called once after the clock reached the run's time limit.
    fn after_sim(&mut self, _time: SimTime) -> Result<(), SimError> {
        Ok(())
    }
}

/// One recorded update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// When the update was applied.
    pub time: SimTime,
    /// The updated signal.
    pub signal: SignalId,
    /// The value after the update, event mask included.
    pub value: Value,
}

/// Keeps every update in memory.
#[derive(Debug, Default, Clone)]
pub struct ChangeRecorder {
    changes: Vec<Change>,
}

impl ChangeRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded updates in application order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Updates of one signal.
    pub fn changes_of(&self, signal: SignalId) -> Vec<&Change> {
        self.changes.iter().filter(|c| c.signal == signal).collect()
    }
}

impl SignalObserver for ChangeRecorder {
    fn on_change(&mut self, time: SimTime, id: SignalId, signal: &Signal) -> Result<(), SimError> {
        self.changes.push(Change {
            time,
            signal: id,
            value: signal.value().clone(),
        });
        Ok(())
    }
}
