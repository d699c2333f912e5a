//! Event scheduler: binds a netlist to a virtual clock and runs it.
//!
//! [`Scheduler`] owns everything that belongs to one run: the clock, the
//! pending-event queue, the registered-signal set and the spawned processes.
//! A run goes through three phases:
//!
//! 1. **Binding.** Every node reachable from the root signals is bound to the
//!    scheduler's context. Signals are loaded with their default value.
//! 2. **Power-up.** Each root gets its default with a full event mask at the
//!    current time, then the same value with no event one rise/fall period
//!    later.
//! 3. **Run.** Events are drained in `(time, enqueue order)` order until the
//!    time limit. A signal change wakes its fan-out, which re-evaluates after
//!    the propagation delay.
//!
//! Operators and assignments read their operands when the delayed
//! re-evaluation runs, not when it was requested. An input pulse shorter
//! than the propagation delay is therefore filtered out: by the time the
//! node looks, the input is back at its old value and nothing changes.
//!
//! Bindings are released when the scheduler is dropped.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use pulse_common::{SimTime, Value};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::graph::{Netlist, NodeRef, Operand};
use crate::ids::{AssignmentId, ContextId, OperatorId, ProcessId, SignalId};
use crate::log::{LogSink, TracingSink};
use crate::observer::SignalObserver;
use crate::process::{Process, ProcessCtx, Suspend};

/// Pre-run hook, called once after binding with the scheduler itself.
pub type BeforeSimHook<'a> = Box<dyn FnOnce(&mut Scheduler<'a>) -> Result<(), SimError> + 'a>;

/// Work stored in the event queue.
#[derive(Debug, Clone)]
enum Action {
    /// Store a value on a signal.
    Update { signal: SignalId, value: Value },
    /// Re-evaluate an operator and drive its result.
    Evaluate(OperatorId),
    /// Copy an assignment's source onto its destination.
    Drive(AssignmentId),
    /// Resume a process.
    Resume(ProcessId),
}

/// A queued action. Ordered by time, then by enqueue sequence.
#[derive(Debug, Clone)]
struct Scheduled {
    time: SimTime,
    seq: u64,
    action: Action,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

struct ProcessSlot<'a> {
    process: Box<dyn Process + 'a>,
    done: bool,
    waiters: Vec<ProcessId>,
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimResult {
    /// The clock value when the run returned.
    pub final_time: SimTime,
    /// Signal updates applied.
    pub updates: u64,
    /// Operator evaluations and assignment drives executed.
    pub evaluations: u64,
    /// Queue entries processed.
    pub events: u64,
}

/// The simulation core for one run.
pub struct Scheduler<'a> {
    ctx: ContextId,
    netlist: &'a mut Netlist,
    config: SimConfig,
    now: SimTime,
    seq: u64,
    queue: BinaryHeap<Reverse<Scheduled>>,
    /// Signals bound by this run, in binding order.
    registered: Vec<SignalId>,
    /// Coalesces wake-ups of one node at one instant.
    pending: HashSet<(NodeRef, SimTime)>,
    /// Signals whose event mask must be cleared when the clock advances.
    touched: Vec<SignalId>,
    processes: Vec<ProcessSlot<'a>>,
    observers: Vec<&'a mut dyn SignalObserver>,
    logger: Box<dyn LogSink + 'a>,
    before_sim: Option<BeforeSimHook<'a>>,
    stats: SimResult,
}

impl<'a> Scheduler<'a> {
    /// Creates a scheduler with a fresh context over `netlist`.
    pub fn new(netlist: &'a mut Netlist, config: SimConfig) -> Self {
        Self {
            ctx: ContextId::fresh(),
            netlist,
            config,
            now: SimTime::zero(),
            seq: 0,
            queue: BinaryHeap::new(),
            registered: Vec::new(),
            pending: HashSet::new(),
            touched: Vec::new(),
            processes: Vec::new(),
            observers: Vec::new(),
            logger: Box::new(TracingSink),
            before_sim: None,
            stats: SimResult::default(),
        }
    }

    /// Replaces the log sink used when [`SimConfig::log`] is set.
    pub fn set_logger(&mut self, sink: impl LogSink + 'a) {
        self.logger = Box::new(sink);
    }

    /// Installs a hook that [`simulate`](Self::simulate) calls once after binding.
    pub fn set_before_sim(
        &mut self,
        hook: impl FnOnce(&mut Scheduler<'a>) -> Result<(), SimError> + 'a,
    ) {
        self.before_sim = Some(Box::new(hook));
    }

    /// Attaches an observer of every applied update.
    pub fn add_observer(&mut self, observer: &'a mut dyn SignalObserver) {
        self.observers.push(observer);
    }

    /// This run's context identity.
    pub fn context(&self) -> ContextId {
        self.ctx
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The run parameters.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The simulated netlist.
    pub fn netlist(&self) -> &Netlist {
        self.netlist
    }

    /// Signals bound so far, in binding order.
    pub fn registered_signals(&self) -> &[SignalId] {
        &self.registered
    }

    /// Counters so far.
    pub fn stats(&self) -> SimResult {
        SimResult {
            final_time: self.now,
            ..self.stats
        }
    }

    /// Binds every node reachable from `roots` to this run.
    ///
    /// Signals are registered and loaded with their default value the first
    /// time they are reached. The load carries a full event mask, which is
    /// cleared when the clock first advances. Nodes already bound to this run
    /// are skipped.
    pub fn bind(&mut self, roots: &[SignalId]) -> Result<(), SimError> {
        let mut stack: Vec<NodeRef> = roots.iter().rev().map(|&s| NodeRef::Signal(s)).collect();
        while let Some(node) = stack.pop() {
            if !self.netlist.bind(node, self.ctx)? {
                continue;
            }
            let mut next = Vec::new();
            match node {
                NodeRef::Signal(id) => {
                    self.registered.push(id);
                    self.touched.push(id);
                    let sig = self.netlist.signal_mut(id);
                    sig.set_to_default();
                    next.extend(sig.fan_out());
                }
                NodeRef::Operator(id) => {
                    let op = self.netlist.operator(id);
                    next.push(NodeRef::Signal(op.result()));
                    next.extend(
                        op.operands()
                            .iter()
                            .filter_map(Operand::as_signal)
                            .map(NodeRef::Signal),
                    );
                }
                NodeRef::Assignment(id) => {
                    let asg = self.netlist.assignment(id);
                    next.extend(asg.src().as_signal().map(NodeRef::Signal));
                    next.push(NodeRef::Signal(asg.dst()));
                }
            }
            stack.extend(next.into_iter().rev());
        }
        Ok(())
    }

    /// Schedules the power-up transition of each root.
    pub fn init_signals(&mut self, roots: &[SignalId]) -> Result<(), SimError> {
        let settle_at = self.after(self.config.ris_fal_dur)?;
        let mut seen = HashSet::new();
        let roots: Vec<SignalId> = roots.iter().copied().filter(|r| seen.insert(*r)).collect();
        for &root in &roots {
            let value = self.netlist.try_signal(root)?.default_value().with_full_event();
            self.push(self.now, Action::Update { signal: root, value });
        }
        for &root in &roots {
            let value = self.netlist.signal(root).default_value().settled();
            self.push(settle_at, Action::Update { signal: root, value });
        }
        Ok(())
    }

    /// Schedules `value` onto `signal` after `delay`.
    pub fn schedule_update(
        &mut self,
        signal: SignalId,
        value: Value,
        delay: SimTime,
    ) -> Result<(), SimError> {
        let sig = self.netlist.try_signal(signal)?;
        if sig.width() != value.width() {
            return Err(SimError::WidthMismatch {
                signal: sig.name().to_string(),
                expected: sig.width(),
                actual: value.width(),
            });
        }
        let at = self.after(delay)?;
        self.push(at, Action::Update { signal, value });
        Ok(())
    }

    /// Requests event-driven propagation from a bound node.
    ///
    /// A signal wakes its fan-out; an operator or assignment schedules its
    /// own re-evaluation after its delay.
    pub fn propagate(&mut self, node: NodeRef) -> Result<(), SimError> {
        self.check_bound(node)?;
        match node {
            NodeRef::Signal(id) => self.wake_fan_out(id),
            _ => self.wake(node),
        }
    }

    /// Starts a process at the current time.
    pub fn spawn(&mut self, process: impl Process + 'a) -> ProcessId {
        self.spawn_boxed(Box::new(process))
    }

    fn spawn_boxed(&mut self, process: Box<dyn Process + 'a>) -> ProcessId {
        let pid = ProcessId::from_raw(self.processes.len() as u32);
        self.processes.push(ProcessSlot {
            process,
            done: false,
            waiters: Vec::new(),
        });
        self.push(self.now, Action::Resume(pid));
        pid
    }

    /// Returns `true` once the process has returned [`Suspend::Done`].
    pub fn is_done(&self, pid: ProcessId) -> bool {
        self.processes
            .get(pid.as_raw() as usize)
            .is_some_and(|slot| slot.done)
    }

    /// Drains the queue up to and including `until`, then sets the clock to
    /// `until`.
    pub fn run_until(&mut self, until: SimTime) -> Result<(), SimError> {
        while let Some(Reverse(next)) = self.queue.peek() {
            if next.time > until {
                break;
            }
            let Some(Reverse(event)) = self.queue.pop() else {
                break;
            };
            self.advance_to(event.time);
            self.stats.events += 1;
            self.dispatch(event.action)?;
        }
        self.advance_to(until.max(self.now));
        Ok(())
    }

    /// Runs a complete simulation and consumes the scheduler.
    ///
    /// Binds `roots`, runs the pre-run hook and the observers' `before_sim`,
    /// schedules the power-up transition, starts `extra` processes and runs
    /// until `until`.
    pub fn simulate(
        mut self,
        roots: &[SignalId],
        until: SimTime,
        extra: Vec<Box<dyn Process + 'a>>,
    ) -> Result<SimResult, SimError> {
        self.bind(roots)?;
        if let Some(hook) = self.before_sim.take() {
            hook(&mut self)?;
        }
        for obs in self.observers.iter_mut() {
            obs.before_sim(self.netlist, &self.registered)?;
        }
        self.init_signals(roots)?;
        for process in extra {
            self.spawn_boxed(process);
        }
        self.run_until(until)?;
        for obs in self.observers.iter_mut() {
            obs.after_sim(self.now)?;
        }
        Ok(self.stats())
    }

    fn dispatch(&mut self, action: Action) -> Result<(), SimError> {
        match action {
            Action::Update { signal, value } => self.apply_update(signal, value),
            Action::Evaluate(op) => {
                self.pending.remove(&(NodeRef::Operator(op), self.now));
                self.check_bound(NodeRef::Operator(op))?;
                let value = self.netlist.evaluate(op);
                self.stats.evaluations += 1;
                if self.config.log {
                    let line = format!("\"{}\" -> {value}", self.netlist.operator_label(op));
                    self.logger.log(self.now, &line);
                }
                let result = self.netlist.operator(op).result();
                self.apply_update(result, value)
            }
            Action::Drive(a) => {
                self.pending.remove(&(NodeRef::Assignment(a), self.now));
                self.check_bound(NodeRef::Assignment(a))?;
                let asg = self.netlist.assignment(a);
                let dst = asg.dst();
                let value = self.netlist.operand_value(asg.src()).settled();
                self.stats.evaluations += 1;
                self.apply_update(dst, value)
            }
            Action::Resume(pid) => self.resume(pid),
        }
    }

    fn apply_update(&mut self, id: SignalId, value: Value) -> Result<(), SimError> {
        self.check_bound(NodeRef::Signal(id))?;
        let sig = self.netlist.signal(id);
        if sig.width() != value.width() {
            return Err(SimError::WidthMismatch {
                signal: sig.name().to_string(),
                expected: sig.width(),
                actual: value.width(),
            });
        }
        if self.config.log {
            let line = format!("{} <= {value}", sig.name());
            self.logger.log(self.now, &line);
        }
        let changed = self.netlist.signal_mut(id).update_value(value);
        self.stats.updates += 1;
        self.touched.push(id);
        for obs in self.observers.iter_mut() {
            obs.on_change(self.now, id, self.netlist.signal(id))?;
        }
        if changed {
            self.wake_fan_out(id)?;
        }
        Ok(())
    }

    fn wake_fan_out(&mut self, id: SignalId) -> Result<(), SimError> {
        let fan_out: Vec<NodeRef> = self.netlist.signal(id).fan_out().collect();
        for node in fan_out {
            self.check_bound(node)?;
            self.wake(node)?;
        }
        Ok(())
    }

    /// Schedules one re-evaluation of `node`, merged with any already
    /// pending for the same instant.
    fn wake(&mut self, node: NodeRef) -> Result<(), SimError> {
        let (delay, action) = match node {
            NodeRef::Operator(op) => (self.config.op_propag_dur, Action::Evaluate(op)),
            NodeRef::Assignment(a) => {
                let after = self.netlist.assignment(a).after();
                (after.unwrap_or(self.config.op_propag_dur), Action::Drive(a))
            }
            NodeRef::Signal(_) => return Ok(()),
        };
        let at = self.after(delay)?;
        if self.pending.insert((node, at)) {
            self.push(at, action);
        }
        Ok(())
    }

    fn resume(&mut self, pid: ProcessId) -> Result<(), SimError> {
        let index = pid.as_raw() as usize;
        let slot = self
            .processes
            .get_mut(index)
            .ok_or(SimError::UnknownProcess(pid.as_raw()))?;
        if slot.done {
            return Ok(());
        }
        let mut ctx = ProcessCtx::new(self.now, self.netlist);
        let suspend = slot.process.resume(&mut ctx)?;
        let writes = ctx.into_writes();
        for (signal, value, delay) in writes {
            self.schedule_update(signal, value, delay)?;
        }
        match suspend {
            Suspend::Delay(d) => {
                let at = self.after(d)?;
                self.push(at, Action::Resume(pid));
            }
            Suspend::WaitFor(other) => {
                let target = self
                    .processes
                    .get_mut(other.as_raw() as usize)
                    .ok_or(SimError::UnknownProcess(other.as_raw()))?;
                if target.done {
                    self.push(self.now, Action::Resume(pid));
                } else {
                    target.waiters.push(pid);
                }
            }
            Suspend::Done => {
                let slot = &mut self.processes[index];
                slot.done = true;
                let waiters = std::mem::take(&mut slot.waiters);
                for waiter in waiters {
                    self.push(self.now, Action::Resume(waiter));
                }
            }
        }
        Ok(())
    }

    fn check_bound(&self, node: NodeRef) -> Result<(), SimError> {
        match self.netlist.binding(node)? {
            Some(ctx) if ctx == self.ctx => Ok(()),
            Some(other) => Err(SimError::AlreadyBound {
                node: self.netlist.describe(node),
                bound: other.to_string(),
                requested: self.ctx.to_string(),
            }),
            None => Err(SimError::Unbound {
                node: self.netlist.describe(node),
            }),
        }
    }

    /// Moves the clock forward, clearing event masks left by earlier instants.
    fn advance_to(&mut self, time: SimTime) {
        if time > self.now {
            for id in self.touched.drain(..) {
                self.netlist.signal_mut(id).clear_event();
            }
            self.now = time;
        }
    }

    fn after(&self, delay: SimTime) -> Result<SimTime, SimError> {
        self.now
            .checked_add(delay)
            .ok_or(SimError::TimeOverflow {
                now: self.now,
                delay,
            })
    }

    fn push(&mut self, time: SimTime, action: Action) {
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(Reverse(Scheduled { time, seq, action }));
    }
}

impl Drop for Scheduler<'_> {
    fn drop(&mut self) {
        self.netlist.release(self.ctx);
    }
}
