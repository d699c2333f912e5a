//! The signal graph: named wires, assignments and the edges between them.
//!
//! A [`Netlist`] owns every node in arenas and links them by ID. Each signal
//! records the operators and assignments that read it (`fan_out`) and the
//! ones that drive it (`drivers`), which gives the scheduler its notification
//! edges and the expression engine its upstream walk. Operator storage and
//! construction live in [`crate::expr`].

use crate::arena::Arena;
use crate::error::SimError;
use crate::expr::{Operator, OperatorKey};
use crate::ids::{AssignmentId, ContextId, OperatorId, SignalId};
use pulse_common::{SimTime, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Bit width and shape of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// A single bit.
    Bit,
    /// A vector of `width` bits.
    Vector {
        /// Number of bits.
        width: u32,
    },
}

impl DataType {
    /// Returns the number of bits.
    pub fn width(self) -> u32 {
        match self {
            DataType::Bit => 1,
            DataType::Vector { width } => width,
        }
    }

    /// Returns `true` for [`DataType::Bit`].
    pub fn is_scalar(self) -> bool {
        matches!(self, DataType::Bit)
    }
}

/// A reference to any bindable node of a netlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    /// A signal.
    Signal(SignalId),
    /// An operator.
    Operator(OperatorId),
    /// An assignment.
    Assignment(AssignmentId),
}

impl From<SignalId> for NodeRef {
    fn from(id: SignalId) -> Self {
        NodeRef::Signal(id)
    }
}

impl From<OperatorId> for NodeRef {
    fn from(id: OperatorId) -> Self {
        NodeRef::Operator(id)
    }
}

impl From<AssignmentId> for NodeRef {
    fn from(id: AssignmentId) -> Self {
        NodeRef::Assignment(id)
    }
}

/// An input of an operator or the source of an assignment.
///
/// Constants are terminal: they are never bound and never notify anyone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operand {
    /// The current value of a signal.
    Signal(SignalId),
    /// A fixed value.
    Const(Value),
}

impl From<SignalId> for Operand {
    fn from(id: SignalId) -> Self {
        Operand::Signal(id)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Const(value)
    }
}

impl Operand {
    /// Returns the signal ID if this operand reads a signal.
    pub fn as_signal(&self) -> Option<SignalId> {
        match self {
            Operand::Signal(id) => Some(*id),
            Operand::Const(_) => None,
        }
    }
}

/// A named wire or register.
#[derive(Debug, Clone)]
pub struct Signal {
    name: String,
    ty: DataType,
    value: Value,
    default: Value,
    pub(crate) fan_out: BTreeSet<NodeRef>,
    pub(crate) drivers: Vec<NodeRef>,
    pub(crate) binding: Option<ContextId>,
}

impl Signal {
    pub(crate) fn new(name: String, ty: DataType, default: Value) -> Self {
        Self {
            name,
            ty,
            value: default.clone(),
            default,
            fan_out: BTreeSet::new(),
            drivers: Vec::new(),
            binding: None,
        }
    }

    /// The signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type.
    pub fn ty(&self) -> DataType {
        self.ty
    }

    /// Declared width in bits.
    pub fn width(&self) -> u32 {
        self.ty.width()
    }

    /// The current value, including the event mask of the last update.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The power-up value.
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Operators and assignments that read this signal.
    pub fn fan_out(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.fan_out.iter().copied()
    }

    /// Operators and assignments that drive this signal.
    pub fn drivers(&self) -> &[NodeRef] {
        &self.drivers
    }

    /// The simulation context currently holding this signal.
    pub fn binding(&self) -> Option<ContextId> {
        self.binding
    }

    /// Loads the default value with every defined bit flagged as changed.
    pub fn set_to_default(&mut self) {
        self.value = self.default.with_full_event();
    }

    /// Replaces the current value and returns `true` if any bit has an event.
    ///
    /// The stored event mask is the union of the bits that differ from the
    /// previous value and any event bits the caller already set on `value`.
    pub fn update_value(&mut self, value: Value) -> bool {
        let event = &value.diff(&self.value) | value.event_mask();
        self.value = value.with_event(event);
        self.value.has_event()
    }

    pub(crate) fn store_settled(&mut self, value: Value) {
        self.value = value.settled();
    }

    pub(crate) fn clear_event(&mut self) {
        self.value = self.value.settled();
    }
}

/// A drive relationship: when `src` changes, `dst` takes its value after a delay.
#[derive(Debug, Clone)]
pub struct Assignment {
    src: Operand,
    dst: SignalId,
    after: Option<SimTime>,
    pub(crate) binding: Option<ContextId>,
}

impl Assignment {
    /// The driving operand.
    pub fn src(&self) -> &Operand {
        &self.src
    }

    /// The driven signal.
    pub fn dst(&self) -> SignalId {
        self.dst
    }

    /// Explicit delay; `None` uses the run's propagation delay.
    pub fn after(&self) -> Option<SimTime> {
        self.after
    }

    /// The simulation context currently holding this assignment.
    pub fn binding(&self) -> Option<ContextId> {
        self.binding
    }
}

/// Arena-backed storage for a whole signal network.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    pub(crate) signals: Arena<SignalId, Signal>,
    pub(crate) operators: Arena<OperatorId, Operator>,
    pub(crate) assignments: Arena<AssignmentId, Assignment>,
    pub(crate) op_cache: HashMap<OperatorKey, OperatorId>,
}

impl Netlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a signal with the given power-up value.
    pub fn add_signal(
        &mut self,
        name: impl Into<String>,
        ty: DataType,
        default: Value,
    ) -> Result<SignalId, SimError> {
        let name = name.into();
        if default.width() != ty.width() {
            return Err(SimError::WidthMismatch {
                signal: name,
                expected: ty.width(),
                actual: default.width(),
            });
        }
        Ok(self.signals.alloc(Signal::new(name, ty, default)))
    }

    /// Adds a signal whose power-up value is fully undefined.
    pub fn add_wire(&mut self, name: impl Into<String>, ty: DataType) -> SignalId {
        let name = name.into();
        let default = Value::undefined(ty.width());
        self.signals.alloc(Signal::new(name, ty, default))
    }

    /// Replaces a signal's power-up value.
    pub fn set_default(&mut self, id: SignalId, default: Value) -> Result<(), SimError> {
        let sig = self.try_signal(id)?;
        if default.width() != sig.width() {
            return Err(SimError::WidthMismatch {
                signal: sig.name().to_string(),
                expected: sig.width(),
                actual: default.width(),
            });
        }
        self.signals[id].default = default;
        Ok(())
    }

    /// Returns the signal with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID was not allocated by this netlist.
    pub fn signal(&self, id: SignalId) -> &Signal {
        &self.signals[id]
    }

    pub(crate) fn signal_mut(&mut self, id: SignalId) -> &mut Signal {
        &mut self.signals[id]
    }

    /// Returns the signal, or an error if the ID is foreign to this netlist.
    pub fn try_signal(&self, id: SignalId) -> Result<&Signal, SimError> {
        self.signals
            .try_get(id)
            .ok_or_else(|| SimError::UnrecognizedNode {
                node: format!("signal {}", id.as_raw()),
            })
    }

    /// Finds the first signal with the given name.
    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.signals
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    /// Iterates over all signals in creation order.
    pub fn signals(&self) -> impl Iterator<Item = (SignalId, &Signal)> {
        self.signals.iter()
    }

    /// Number of signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Adds an assignment `dst <= src`, optionally with its own delay.
    pub fn add_assignment(
        &mut self,
        src: impl Into<Operand>,
        dst: SignalId,
        after: Option<SimTime>,
    ) -> Result<AssignmentId, SimError> {
        let src = src.into();
        let src_width = self.operand_width(&src)?;
        let dst_sig = self.try_signal(dst)?;
        if src_width != dst_sig.width() {
            return Err(SimError::WidthMismatch {
                signal: dst_sig.name().to_string(),
                expected: dst_sig.width(),
                actual: src_width,
            });
        }
        let src_signal = src.as_signal();
        let id = self.assignments.alloc(Assignment {
            src,
            dst,
            after,
            binding: None,
        });
        if let Some(s) = src_signal {
            self.signals[s].fan_out.insert(NodeRef::Assignment(id));
        }
        self.signals[dst].drivers.push(NodeRef::Assignment(id));
        Ok(id)
    }

    /// Returns the assignment with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID was not allocated by this netlist.
    pub fn assignment(&self, id: AssignmentId) -> &Assignment {
        &self.assignments[id]
    }

    /// Returns the assignment, or an error if the ID is foreign to this netlist.
    pub fn try_assignment(&self, id: AssignmentId) -> Result<&Assignment, SimError> {
        self.assignments
            .try_get(id)
            .ok_or_else(|| SimError::UnrecognizedNode {
                node: format!("assignment {}", id.as_raw()),
            })
    }

    /// Number of assignments.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Width of an operand, checking that a signal operand exists.
    pub fn operand_width(&self, operand: &Operand) -> Result<u32, SimError> {
        match operand {
            Operand::Signal(id) => Ok(self.try_signal(*id)?.width()),
            Operand::Const(v) => Ok(v.width()),
        }
    }

    /// Current value of an operand.
    pub fn operand_value<'a>(&'a self, operand: &'a Operand) -> &'a Value {
        match operand {
            Operand::Signal(id) => self.signals[*id].value(),
            Operand::Const(v) => v,
        }
    }

    /// Returns the context a node is bound to.
    pub fn binding(&self, node: NodeRef) -> Result<Option<ContextId>, SimError> {
        Ok(match node {
            NodeRef::Signal(id) => self.try_signal(id)?.binding,
            NodeRef::Operator(id) => self.try_operator(id)?.binding,
            NodeRef::Assignment(id) => self.try_assignment(id)?.binding,
        })
    }

    /// Binds a node to `ctx`.
    ///
    /// Returns `true` if the node was newly bound and `false` if it was
    /// already bound to `ctx`. Binding to a second context fails until the
    /// first one is released.
    pub fn bind(&mut self, node: NodeRef, ctx: ContextId) -> Result<bool, SimError> {
        match self.binding(node)? {
            Some(bound) if bound == ctx => Ok(false),
            Some(bound) => Err(SimError::AlreadyBound {
                node: self.describe(node),
                bound: bound.to_string(),
                requested: ctx.to_string(),
            }),
            None => {
                let slot = match node {
                    NodeRef::Signal(id) => &mut self.signals[id].binding,
                    NodeRef::Operator(id) => &mut self.operators[id].binding,
                    NodeRef::Assignment(id) => &mut self.assignments[id].binding,
                };
                *slot = Some(ctx);
                Ok(true)
            }
        }
    }

    /// Clears every binding held by `ctx`.
    pub fn release(&mut self, ctx: ContextId) {
        let held = Some(ctx);
        for (_, s) in self.signals.iter_mut() {
            if s.binding == held {
                s.binding = None;
            }
        }
        for (_, op) in self.operators.iter_mut() {
            if op.binding == held {
                op.binding = None;
            }
        }
        for (_, a) in self.assignments.iter_mut() {
            if a.binding == held {
                a.binding = None;
            }
        }
    }

    /// Human-readable name of a node for errors and logs.
    pub fn describe(&self, node: NodeRef) -> String {
        match node {
            NodeRef::Signal(id) => match self.signals.try_get(id) {
                Some(s) => format!("signal {}", s.name),
                None => format!("signal {}", id.as_raw()),
            },
            NodeRef::Operator(id) => match self.operators.try_get(id) {
                Some(_) => format!("operator \"{}\"", self.operator_label(id)),
                None => format!("operator {}", id.as_raw()),
            },
            NodeRef::Assignment(id) => match self.assignments.try_get(id) {
                Some(a) => format!(
                    "assignment {} <= {}",
                    self.signals[a.dst].name,
                    self.operand_label(&a.src)
                ),
                None => format!("assignment {}", id.as_raw()),
            },
        }
    }

    pub(crate) fn operand_label(&self, operand: &Operand) -> String {
        match operand {
            Operand::Signal(id) => self.signals[*id].name.clone(),
            Operand::Const(v) => format!("'{v}'"),
        }
    }

    /// Walks drivers upstream from `sig` and returns the undriven signals it
    /// ultimately depends on, in discovery order.
    ///
    /// Signals reached through a feedback loop are visited once.
    pub fn origin_signals(&self, sig: SignalId) -> Result<Vec<SignalId>, SimError> {
        self.try_signal(sig)?;
        let mut origins = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![sig];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let drivers = &self.signals[id].drivers;
            if drivers.is_empty() {
                origins.push(id);
                continue;
            }
            let mut inputs = Vec::new();
            for driver in drivers {
                match *driver {
                    NodeRef::Operator(op) => inputs.extend(
                        self.operators[op].operands().iter().filter_map(Operand::as_signal),
                    ),
                    NodeRef::Assignment(a) => inputs.extend(self.assignments[a].src.as_signal()),
                    NodeRef::Signal(_) => {}
                }
            }
            // Reverse so the first input is popped first.
            stack.extend(inputs.into_iter().rev());
        }
        Ok(origins)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bit => write!(f, "bit"),
            DataType::Vector { width } => write!(f, "vector[{width}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpKind;
    use pulse_common::Bits;

    fn bit(n: &mut Netlist, name: &str, v: u64) -> SignalId {
        n.add_signal(name, DataType::Bit, Value::from_u64(v, 1)).unwrap()
    }

    #[test]
    fn data_type_width() {
        assert_eq!(DataType::Bit.width(), 1);
        assert!(DataType::Bit.is_scalar());
        let v = DataType::Vector { width: 8 };
        assert_eq!(v.width(), 8);
        assert!(!v.is_scalar());
        assert_eq!(v.to_string(), "vector[8]");
    }

    #[test]
    fn add_signal_checks_default_width() {
        let mut n = Netlist::new();
        let err = n
            .add_signal("s", DataType::Vector { width: 3 }, Value::from_u64(0, 2))
            .unwrap_err();
        assert!(matches!(err, SimError::WidthMismatch { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn add_wire_is_undefined() {
        let mut n = Netlist::new();
        let w = n.add_wire("w", DataType::Vector { width: 2 });
        assert!(n.signal(w).value().is_undefined());
        assert_eq!(n.find_signal("w"), Some(w));
        assert_eq!(n.find_signal("nope"), None);
    }

    #[test]
    fn set_default_replaces_power_up_value() {
        let mut n = Netlist::new();
        let w = n.add_wire("w", DataType::Vector { width: 2 });
        let v = Value::from_binary_str("10").unwrap();
        n.set_default(w, v.clone()).unwrap();
        assert_eq!(n.signal(w).default_value(), &v);
        assert!(n.signal(w).value().is_undefined());
        n.signal_mut(w).set_to_default();
        assert_eq!(n.signal(w).value(), &v);

        let err = n.set_default(w, Value::from_bool(true)).unwrap_err();
        assert!(matches!(err, SimError::WidthMismatch { expected: 2, actual: 1, .. }));
        let err = n
            .set_default(SignalId::from_raw(9), Value::from_bool(true))
            .unwrap_err();
        assert!(matches!(err, SimError::UnrecognizedNode { .. }));
    }

    #[test]
    fn set_to_default_flags_defined_bits() {
        let mut n = Netlist::new();
        let s = n
            .add_signal("s", DataType::Vector { width: 2 }, Value::from_binary_str("x1").unwrap())
            .unwrap();
        let sig = n.signal_mut(s);
        sig.set_to_default();
        assert_eq!(sig.value().event_mask(), &Bits::from_u64(0b01, 2));
    }

    #[test]
    fn update_value_reports_changes() {
        let mut n = Netlist::new();
        let s = bit(&mut n, "s", 0);
        let sig = n.signal_mut(s);
        assert!(sig.update_value(Value::from_bool(true)));
        assert!(!sig.update_value(Value::from_bool(true)));
        assert!(sig.update_value(Value::from_bool(true).with_full_event()));
        assert!(sig.update_value(Value::undefined(1)));
    }

    #[test]
    fn assignment_links_fan_out_and_drivers() {
        let mut n = Netlist::new();
        let a = bit(&mut n, "a", 0);
        let b = n.add_wire("b", DataType::Bit);
        let asg = n.add_assignment(a, b, None).unwrap();
        assert_eq!(n.signal(a).fan_out().collect::<Vec<_>>(), vec![NodeRef::Assignment(asg)]);
        assert_eq!(n.signal(b).drivers(), &[NodeRef::Assignment(asg)]);
        assert_eq!(n.describe(asg.into()), "assignment b <= a");
    }

    #[test]
    fn assignment_width_mismatch() {
        let mut n = Netlist::new();
        let a = bit(&mut n, "a", 0);
        let b = n.add_wire("b", DataType::Vector { width: 4 });
        assert!(matches!(
            n.add_assignment(a, b, None),
            Err(SimError::WidthMismatch { .. })
        ));
    }

    #[test]
    fn bind_is_idempotent_per_context() {
        let mut n = Netlist::new();
        let a = bit(&mut n, "a", 0);
        let c1 = ContextId::fresh();
        let c2 = ContextId::fresh();
        assert!(n.bind(a.into(), c1).unwrap());
        assert!(!n.bind(a.into(), c1).unwrap());
        let err = n.bind(a.into(), c2).unwrap_err();
        assert!(matches!(err, SimError::AlreadyBound { .. }));
        n.release(c1);
        assert!(n.bind(a.into(), c2).unwrap());
    }

    #[test]
    fn bind_rejects_foreign_nodes() {
        let mut n = Netlist::new();
        let err = n.bind(NodeRef::Signal(SignalId::from_raw(9)), ContextId::fresh()).unwrap_err();
        assert_eq!(err.to_string(), "unrecognized node signal 9");
    }

    #[test]
    fn origin_signals_walks_through_operators_and_assignments() {
        let mut n = Netlist::new();
        let a = bit(&mut n, "a", 0);
        let b = bit(&mut n, "b", 0);
        let c = bit(&mut n, "c", 0);
        let ab = n.apply(OpKind::And, vec![a.into(), b.into()]).unwrap();
        let abc = n.apply(OpKind::Or, vec![ab.into(), c.into(), a.into()]).unwrap();
        let out = n.add_wire("out", DataType::Bit);
        n.add_assignment(abc, out, None).unwrap();
        assert_eq!(n.origin_signals(out).unwrap(), vec![a, b, c]);
        assert_eq!(n.origin_signals(a).unwrap(), vec![a]);
    }

    #[test]
    fn origin_signals_survives_feedback() {
        let mut n = Netlist::new();
        let a = bit(&mut n, "a", 0);
        let q = n.add_wire("q", DataType::Bit);
        n.add_operator_with_result(OpKind::Xor, vec![a.into(), q.into()], q)
            .unwrap();
        assert_eq!(n.origin_signals(q).unwrap(), vec![a]);
    }
}
