//! Operator nodes: construction, structural identity, deep copy and static
//! evaluation.
//!
//! An operator reads its operands and drives exactly one result signal. Two
//! operators are structurally equal when they have the same kind and the same
//! operands, compared as a multiset for commutative kinds and as an ordered
//! list otherwise. [`Netlist::apply`] uses that identity to reuse existing
//! nodes instead of building duplicates.

use crate::error::SimError;
use crate::graph::{DataType, Netlist, NodeRef, Operand, Signal};
use crate::ids::{ContextId, OperatorId, SignalId};
use crate::log::LogSink;
use crate::ops::OpKind;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use pulse_common::{SimTime, Value};
use std::collections::{HashMap, HashSet};

/// An operator node.
///
/// During a timed run the operator samples its operands when its delayed
/// evaluation fires, so it only reports inputs that held for at least the
/// propagation delay.
#[derive(Debug, Clone)]
pub struct Operator {
    kind: OpKind,
    operands: Vec<Operand>,
    result: SignalId,
    pub(crate) binding: Option<ContextId>,
}

impl Operator {
    /// The operator kind.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Operands in declaration order.
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// The signal this operator drives.
    pub fn result(&self) -> SignalId {
        self.result
    }

    /// The simulation context currently holding this operator.
    pub fn binding(&self) -> Option<ContextId> {
        self.binding
    }

    /// The structural identity of this operator.
    pub fn key(&self) -> OperatorKey {
        OperatorKey::new(self.kind, self.operands.clone())
    }
}

/// Structural identity of an operator: kind plus canonically ordered operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperatorKey {
    kind: OpKind,
    operands: Vec<Operand>,
}

impl OperatorKey {
    /// Builds the key, sorting operands when the kind is commutative.
    pub fn new(kind: OpKind, mut operands: Vec<Operand>) -> Self {
        if kind.is_commutative() {
            operands.sort();
        }
        Self { kind, operands }
    }
}

impl Netlist {
    /// Adds a new operator with a fresh result signal named `<kind>_<n>`.
    ///
    /// `n` starts at the operator count and is bumped past names already
    /// used by other signals.
    pub fn add_operator(
        &mut self,
        kind: OpKind,
        operands: Vec<Operand>,
    ) -> Result<OperatorId, SimError> {
        let width = self.check_operands(kind, &operands)?;
        let scalar = width == 1
            && match (kind, operands.first()) {
                (OpKind::Eq | OpKind::Ne, _) => true,
                (_, Some(Operand::Signal(id))) => self.signals[*id].ty().is_scalar(),
                _ => false,
            };
        let ty = if scalar {
            DataType::Bit
        } else {
            DataType::Vector { width }
        };
        let name = self.unused_result_name(kind);
        let result = self.add_wire(name, ty);
        let key = OperatorKey::new(kind, operands.clone());
        let id = self.link_operator(kind, operands, result);
        self.op_cache.entry(key).or_insert(id);
        Ok(id)
    }

    /// Adds an operator that drives an existing signal.
    ///
    /// The result may also appear among the operands, which builds a
    /// feedback node. Such operators are never reused by [`apply`](Self::apply).
    pub fn add_operator_with_result(
        &mut self,
        kind: OpKind,
        operands: Vec<Operand>,
        result: SignalId,
    ) -> Result<OperatorId, SimError> {
        let width = self.check_operands(kind, &operands)?;
        let sig = self.try_signal(result)?;
        if sig.width() != width {
            return Err(SimError::WidthMismatch {
                signal: sig.name().to_string(),
                expected: sig.width(),
                actual: width,
            });
        }
        Ok(self.link_operator(kind, operands, result))
    }

    /// Returns the result signal of an operator structurally equal to
    /// `kind(operands)`, creating one if none exists yet.
    pub fn apply(&mut self, kind: OpKind, operands: Vec<Operand>) -> Result<SignalId, SimError> {
        let key = OperatorKey::new(kind, operands.clone());
        if let Some(&id) = self.op_cache.get(&key) {
            return Ok(self.operators[id].result);
        }
        let id = self.add_operator(kind, operands)?;
        Ok(self.operators[id].result)
    }

    /// Returns the operator with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID was not allocated by this netlist.
    pub fn operator(&self, id: OperatorId) -> &Operator {
        &self.operators[id]
    }

    /// Returns the operator, or an error if the ID is foreign to this netlist.
    pub fn try_operator(&self, id: OperatorId) -> Result<&Operator, SimError> {
        self.operators
            .try_get(id)
            .ok_or_else(|| SimError::UnrecognizedNode {
                node: format!("operator {}", id.as_raw()),
            })
    }

    /// Number of operators.
    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    /// The operator driving `sig`, if any.
    pub fn driving_operator(&self, sig: SignalId) -> Option<OperatorId> {
        self.signals[sig].drivers().iter().find_map(|d| match d {
            NodeRef::Operator(op) => Some(*op),
            _ => None,
        })
    }

    /// Returns `true` if both operators have the same kind and operands.
    pub fn structurally_equal(&self, a: OperatorId, b: OperatorId) -> bool {
        self.operators[a].key() == self.operators[b].key()
    }

    /// Computes an operator's result from its operands' current values.
    ///
    /// The result signal is not touched.
    pub fn evaluate(&self, id: OperatorId) -> Value {
        let op = &self.operators[id];
        let values: Vec<&Value> = op
            .operands
            .iter()
            .map(|o| self.operand_value(o))
            .collect();
        op.kind.eval(&values)
    }

    /// Text form used in logs, e.g. `and(a, b)`.
    pub fn operator_label(&self, id: OperatorId) -> String {
        let op = &self.operators[id];
        let args: Vec<String> = op.operands.iter().map(|o| self.operand_label(o)).collect();
        format!("{}({})", op.kind, args.join(", "))
    }

    /// Copies the operator tree rooted at `root` and returns the new root.
    ///
    /// Operators that drive an operand are copied along with fresh result
    /// signals. Undriven and assignment-driven operands are leaves and stay
    /// shared with the original. A subtree reached twice is copied once, and
    /// a node that feeds back into itself copies to a single node that feeds
    /// back into its own copy.
    pub fn deep_copy(&mut self, root: OperatorId) -> Result<OperatorId, SimError> {
        self.try_operator(root)?;
        let mut memo = CopyMemo::default();
        Ok(self.copy_operator(root, &mut memo))
    }

    fn copy_operator(&mut self, id: OperatorId, memo: &mut CopyMemo) -> OperatorId {
        if let Some(&copy) = memo.operators.get(&id) {
            return copy;
        }
        let (kind, operands, result) = {
            let op = &self.operators[id];
            (op.kind, op.operands.clone(), op.result)
        };
        let fresh = {
            let old = &self.signals[result];
            Signal::new(old.name().to_string(), old.ty(), old.default_value().clone())
        };
        let new_result = self.signals.alloc(fresh);
        let copy = self.operators.alloc(Operator {
            kind,
            operands: Vec::new(),
            result: new_result,
            binding: None,
        });
        memo.operators.insert(id, copy);
        memo.signals.insert(result, new_result);

        let mut copied = Vec::with_capacity(operands.len());
        for operand in operands {
            let mapped = match operand {
                Operand::Signal(s) => Operand::Signal(self.copy_signal(s, memo)),
                Operand::Const(v) => Operand::Const(v),
            };
            copied.push(mapped);
        }
        for s in copied.iter().filter_map(Operand::as_signal) {
            self.signals[s].fan_out.insert(NodeRef::Operator(copy));
        }
        self.signals[new_result].drivers.push(NodeRef::Operator(copy));
        self.operators[copy].operands = copied;
        copy
    }

    fn copy_signal(&mut self, sig: SignalId, memo: &mut CopyMemo) -> SignalId {
        if let Some(&copy) = memo.signals.get(&sig) {
            return copy;
        }
        match self.driving_operator(sig) {
            Some(op) => {
                self.copy_operator(op, memo);
                memo.signals.get(&sig).copied().unwrap_or(sig)
            }
            None => sig,
        }
    }

    /// Evaluates the tree feeding `root` without a scheduler and returns the
    /// root's result value.
    ///
    /// Every operator and assignment upstream of `root` is evaluated exactly
    /// once, after everything it reads. Results are stored on their signals
    /// with an empty event mask.
    pub fn static_eval(&mut self, root: OperatorId) -> Result<Value, SimError> {
        self.static_eval_inner(root, None)
    }

    /// Like [`static_eval`](Self::static_eval), logging one line per
    /// evaluated node to `sink`.
    pub fn static_eval_logged(
        &mut self,
        root: OperatorId,
        sink: &mut dyn LogSink,
    ) -> Result<Value, SimError> {
        self.static_eval_inner(root, Some(sink))
    }

    fn static_eval_inner(
        &mut self,
        root: OperatorId,
        mut sink: Option<&mut dyn LogSink>,
    ) -> Result<Value, SimError> {
        self.try_operator(root)?;
        let order = self.upstream_order(NodeRef::Operator(root))?;
        for node in order {
            match node {
                NodeRef::Operator(op) => {
                    let value = self.evaluate(op);
                    if let Some(sink) = sink.as_deref_mut() {
                        let line = format!("\"{}\" -> {value}", self.operator_label(op));
                        sink.log(SimTime::zero(), &line);
                    }
                    let result = self.operators[op].result;
                    self.signals[result].store_settled(value);
                }
                NodeRef::Assignment(a) => {
                    let asg = &self.assignments[a];
                    let value = self.operand_value(asg.src()).clone();
                    let dst = asg.dst();
                    if let Some(sink) = sink.as_deref_mut() {
                        let line = format!("{} <= {value}", self.signals[dst].name());
                        sink.log(SimTime::zero(), &line);
                    }
                    self.signals[dst].store_settled(value);
                }
                NodeRef::Signal(_) => {}
            }
        }
        Ok(self.signals[self.operators[root].result].value().clone())
    }

    /// Topological order of `start` and every driver it transitively reads.
    fn upstream_order(&self, start: NodeRef) -> Result<Vec<NodeRef>, SimError> {
        let mut graph: DiGraphMap<NodeRef, ()> = DiGraphMap::new();
        graph.add_node(start);
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            let inputs: Vec<SignalId> = match node {
                NodeRef::Operator(op) => self.operators[op]
                    .operands
                    .iter()
                    .filter_map(Operand::as_signal)
                    .collect(),
                NodeRef::Assignment(a) => self.assignments[a].src().as_signal().into_iter().collect(),
                NodeRef::Signal(_) => Vec::new(),
            };
            for input in inputs {
                for &driver in self.signals[input].drivers() {
                    if !graph.contains_node(driver) {
                        stack.push(driver);
                    }
                    graph.add_edge(driver, node, ());
                }
            }
        }
        toposort(&graph, None).map_err(|cycle| SimError::CombinationalLoop {
            node: self.describe(cycle.node_id()),
        })
    }

    fn unused_result_name(&self, kind: OpKind) -> String {
        let taken: HashSet<&str> = self.signals.iter().map(|(_, s)| s.name()).collect();
        let mut n = self.operators.len();
        loop {
            let name = format!("{}_{n}", kind.name());
            if !taken.contains(name.as_str()) {
                return name;
            }
            n += 1;
        }
    }

    /// Checks operand existence, arity and widths; returns the result width.
    fn check_operands(&self, kind: OpKind, operands: &[Operand]) -> Result<u32, SimError> {
        let widths = operands
            .iter()
            .map(|o| self.operand_width(o))
            .collect::<Result<Vec<_>, _>>()?;
        kind.result_width(&widths)
            .map_err(|reason| SimError::InvalidOperand {
                kind: kind.name().to_string(),
                reason,
            })
    }

    fn link_operator(&mut self, kind: OpKind, operands: Vec<Operand>, result: SignalId) -> OperatorId {
        let inputs: Vec<SignalId> = operands.iter().filter_map(Operand::as_signal).collect();
        let id = self.operators.alloc(Operator {
            kind,
            operands,
            result,
            binding: None,
        });
        for s in inputs {
            self.signals[s].fan_out.insert(NodeRef::Operator(id));
        }
        self.signals[result].drivers.push(NodeRef::Operator(id));
        id
    }
}

#[derive(Default)]
struct CopyMemo {
    operators: HashMap<OperatorId, OperatorId>,
    signals: HashMap<SignalId, SignalId>,
}
