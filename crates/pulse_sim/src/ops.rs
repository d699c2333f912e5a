//! Built-in operator kinds and their evaluation rules.
//!
//! Every rule is validity-aware: a result bit is only marked valid when its
//! value is fully determined by the valid bits of the operands. Results are
//! produced with an empty event mask; the scheduler computes events when the
//! value is stored on a signal.

use pulse_common::{Bits, Value};
use std::fmt;
use std::str::FromStr;

/// The closed set of operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    /// Bitwise AND over two or more operands.
    And,
    /// Bitwise OR over two or more operands.
    Or,
    /// Bitwise XOR over two or more operands.
    Xor,
    /// Bitwise NOT of one operand.
    Not,
    /// Wrapping addition over two or more operands.
    Add,
    /// Wrapping subtraction `a - b`.
    Sub,
    /// Equality `a == b`, 1 bit wide.
    Eq,
    /// Inequality `a != b`, 1 bit wide.
    Ne,
    /// Concatenation, first operand is the most significant part.
    Concat,
    /// `sel ? a : b` over operands `(sel, a, b)`.
    Mux,
}

impl OpKind {
    /// Lower-case mnemonic used in logs and generated signal names.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::And => "and",
            OpKind::Or => "or",
            OpKind::Xor => "xor",
            OpKind::Not => "not",
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Eq => "eq",
            OpKind::Ne => "ne",
            OpKind::Concat => "concat",
            OpKind::Mux => "mux",
        }
    }

    /// Returns `true` if operand order does not affect the result.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            OpKind::And | OpKind::Or | OpKind::Xor | OpKind::Add | OpKind::Eq | OpKind::Ne
        )
    }

    /// Checks arity and operand widths, returning the result width.
    pub fn result_width(self, widths: &[u32]) -> Result<u32, String> {
        match self {
            OpKind::And | OpKind::Or | OpKind::Xor | OpKind::Add => {
                if widths.len() < 2 {
                    return Err(format!("expected at least 2 operands, got {}", widths.len()));
                }
                same_width(widths)
            }
            OpKind::Not => {
                if widths.len() != 1 {
                    return Err(format!("expected 1 operand, got {}", widths.len()));
                }
                Ok(widths[0])
            }
            OpKind::Sub => {
                exact_arity(widths, 2)?;
                same_width(widths)
            }
            OpKind::Eq | OpKind::Ne => {
                exact_arity(widths, 2)?;
                same_width(widths).map(|_| 1)
            }
            OpKind::Concat => {
                if widths.is_empty() {
                    return Err("expected at least 1 operand, got 0".to_string());
                }
                Ok(widths.iter().sum())
            }
            OpKind::Mux => {
                exact_arity(widths, 3)?;
                if widths[0] != 1 {
                    return Err(format!("select must be 1 bit wide, got {}", widths[0]));
                }
                same_width(&widths[1..])
            }
        }
    }

    /// Computes the result from operand values.
    ///
    /// Operands must already satisfy [`result_width`](Self::result_width).
    pub fn eval(self, operands: &[&Value]) -> Value {
        match self {
            OpKind::And => fold(operands, and2),
            OpKind::Or => fold(operands, or2),
            OpKind::Xor => fold(operands, |a, b| {
                Value::new(a.raw() ^ b.raw(), a.valid_mask() & b.valid_mask())
            }),
            OpKind::Not => {
                let a = operands[0];
                Value::new(!a.raw(), a.valid_mask().clone())
            }
            OpKind::Add => fold(operands, |a, b| arith(a, b, Bits::wrapping_add)),
            OpKind::Sub => arith(operands[0], operands[1], Bits::wrapping_sub),
            OpKind::Eq => compare(operands[0], operands[1], true),
            OpKind::Ne => compare(operands[0], operands[1], false),
            OpKind::Concat => fold(operands, Value::concat),
            OpKind::Mux => mux(operands[0], operands[1], operands[2]),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl OpKind {
    /// Every operator kind, in declaration order.
    pub const ALL: [OpKind; 10] = [
        OpKind::And,
        OpKind::Or,
        OpKind::Xor,
        OpKind::Not,
        OpKind::Add,
        OpKind::Sub,
        OpKind::Eq,
        OpKind::Ne,
        OpKind::Concat,
        OpKind::Mux,
    ];
}

impl FromStr for OpKind {
    type Err = String;

    /// Parses the mnemonic returned by [`OpKind::name`], ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown operator kind `{s}`"))
    }
}

fn exact_arity(widths: &[u32], n: usize) -> Result<(), String> {
    if widths.len() == n {
        Ok(())
    } else {
        Err(format!("expected {n} operands, got {}", widths.len()))
    }
}

fn same_width(widths: &[u32]) -> Result<u32, String> {
    let first = widths[0];
    match widths.iter().find(|&&w| w != first) {
        Some(w) => Err(format!("operand widths differ ({first} vs {w})")),
        None => Ok(first),
    }
}

fn fold(operands: &[&Value], f: impl Fn(&Value, &Value) -> Value) -> Value {
    let mut acc = operands[0].clone();
    for &v in &operands[1..] {
        acc = f(&acc, v);
    }
    acc
}

/// A known 0 on either side decides the bit.
fn and2(a: &Value, b: &Value) -> Value {
    let (va, vb) = (a.valid_mask(), b.valid_mask());
    let known_zero_a = va & &!a.raw();
    let known_zero_b = vb & &!b.raw();
    let valid = &(&(va & vb) | &known_zero_a) | &known_zero_b;
    Value::new(a.raw() & b.raw(), valid)
}

/// A known 1 on either side decides the bit.
fn or2(a: &Value, b: &Value) -> Value {
    let valid = &(&(a.valid_mask() & b.valid_mask()) | a.raw()) | b.raw();
    Value::new(a.raw() | b.raw(), valid)
}

fn arith(a: &Value, b: &Value, f: impl Fn(&Bits, &Bits) -> Bits) -> Value {
    if a.is_fully_valid() && b.is_fully_valid() {
        Value::new(f(a.raw(), b.raw()), Bits::ones(a.width()))
    } else {
        Value::undefined(a.width())
    }
}

fn compare(a: &Value, b: &Value, eq: bool) -> Value {
    let both_known = a.valid_mask() & b.valid_mask();
    let differs = &both_known & &(a.raw() ^ b.raw());
    if !differs.is_zero() {
        Value::from_bool(!eq)
    } else if a.is_fully_valid() && b.is_fully_valid() {
        Value::from_bool(eq)
    } else {
        Value::undefined(1)
    }
}

fn mux(sel: &Value, a: &Value, b: &Value) -> Value {
    match sel.to_u64() {
        Some(1) => a.settled(),
        Some(_) => b.settled(),
        None => {
            let agree = &(a.valid_mask() & b.valid_mask()) & &!&(a.raw() ^ b.raw());
            Value::new(a.raw().clone(), agree)
        }
    }
}
