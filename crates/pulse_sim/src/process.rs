//! Resumable units of work run alongside the netlist.
//!
//! A [`Process`] is an explicit state machine: the scheduler calls
//! [`Process::resume`] and the process answers how it wants to be suspended.
//! There is no preemption, so a process that keeps asking for a zero delay
//! stalls the clock.
//!
//! Writes from a process land immediately. Operators downstream only see a
//! write if it still holds when their delayed evaluation runs, so a
//! stimulus pulse shorter than the propagation delay does not reach them.

use crate::error::SimError;
use crate::graph::{Netlist, Signal};
use crate::ids::{ProcessId, SignalId};
use pulse_common::{SimTime, Value};

/// How a process yields back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspend {
    /// Resume after the given simulated duration.
    Delay(SimTime),
    /// Resume once the given process has finished.
    WaitFor(ProcessId),
    /// The process has finished and is never resumed again.
    Done,
}

/// A unit of work driven by the scheduler.
pub trait Process {
    /// Runs until the next suspension point.
    fn resume(&mut self, ctx: &mut ProcessCtx<'_>) -> Result<Suspend, SimError>;
}

/// A process's view of the simulation while it runs.
///
/// Reads see the netlist as of the current instant. Writes are queued and
/// applied by the scheduler after the process suspends.
pub struct ProcessCtx<'n> {
    now: SimTime,
    netlist: &'n Netlist,
    writes: Vec<(SignalId, Value, SimTime)>,
}

impl<'n> ProcessCtx<'n> {
    pub(crate) fn new(now: SimTime, netlist: &'n Netlist) -> Self {
        Self {
            now,
            netlist,
            writes: Vec::new(),
        }
    }

    /// The current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Current value of a signal.
    pub fn value(&self, id: SignalId) -> &Value {
        self.netlist.signal(id).value()
    }

    /// A signal of the simulated netlist.
    pub fn signal(&self, id: SignalId) -> &Signal {
        self.netlist.signal(id)
    }

    /// Looks a signal up by name.
    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.netlist.find_signal(name)
    }

    /// Drives `value` onto `signal` at the current instant.
    pub fn write(&mut self, signal: SignalId, value: Value) {
        self.write_after(signal, value, SimTime::zero());
    }

    /// Drives `value` onto `signal` after `delay`.
    pub fn write_after(&mut self, signal: SignalId, value: Value, delay: SimTime) {
        self.writes.push((signal, value, delay));
    }

    pub(crate) fn into_writes(self) -> Vec<(SignalId, Value, SimTime)> {
        self.writes
    }
}

/// A process backed by a closure.
pub struct FnProcess<F>(F);

impl<F> Process for FnProcess<F>
where
    F: FnMut(&mut ProcessCtx<'_>) -> Result<Suspend, SimError>,
{
    fn resume(&mut self, ctx: &mut ProcessCtx<'_>) -> Result<Suspend, SimError> {
        (self.0)(ctx)
    }
}

/// Wraps a closure as a [`Process`].
pub fn from_fn<F>(f: F) -> FnProcess<F>
where
    F: FnMut(&mut ProcessCtx<'_>) -> Result<Suspend, SimError>,
{
    FnProcess(f)
}

/// Drives scripted values onto one signal at absolute times.
///
/// Root signals are reset to their default at the end of the power-up
/// rise/fall period, so steps that must stick should start at or after it.
#[derive(Debug, Clone)]
pub struct Stimulus {
    signal: SignalId,
    steps: Vec<(SimTime, Value)>,
    next: usize,
}

impl Stimulus {
    /// Creates a stimulus; steps are sorted by time, ties keep their order.
    pub fn new(signal: SignalId, steps: impl IntoIterator<Item = (SimTime, Value)>) -> Self {
        let mut steps: Vec<_> = steps.into_iter().collect();
        steps.sort_by_key(|(t, _)| *t);
        Self {
            signal,
            steps,
            next: 0,
        }
    }
}

impl Process for Stimulus {
    fn resume(&mut self, ctx: &mut ProcessCtx<'_>) -> Result<Suspend, SimError> {
        while let Some((time, value)) = self.steps.get(self.next) {
            if *time > ctx.now() {
                return Ok(Suspend::Delay(*time - ctx.now()));
            }
            ctx.write(self.signal, value.clone());
            self.next += 1;
        }
        Ok(Suspend::Done)
    }
}

/// A free-running square wave on a 1-bit signal.
#[derive(Debug, Clone)]
pub struct Clock {
    signal: SignalId,
    half_period: SimTime,
    start: SimTime,
    level: bool,
    started: bool,
}

impl Clock {
    /// Toggles `signal` every `half_period`, starting low at time zero.
    pub fn new(signal: SignalId, half_period: SimTime) -> Self {
        Self {
            signal,
            half_period,
            start: SimTime::zero(),
            level: false,
            started: false,
        }
    }

    /// Delays the first (low) edge until `start`.
    pub fn starting_at(mut self, start: SimTime) -> Self {
        self.start = start;
        self
    }
}

impl Process for Clock {
    fn resume(&mut self, ctx: &mut ProcessCtx<'_>) -> Result<Suspend, SimError> {
        if self.half_period.is_zero() {
            return Err(SimError::InvalidOperand {
                kind: "clock".to_string(),
                reason: "half period must be non-zero".to_string(),
            });
        }
        if !self.started {
            self.started = true;
            if self.start > ctx.now() {
                return Ok(Suspend::Delay(self.start - ctx.now()));
            }
        }
        ctx.write(self.signal, Value::from_bool(self.level));
        self.level = !self.level;
        Ok(Suspend::Delay(self.half_period))
    }
}
