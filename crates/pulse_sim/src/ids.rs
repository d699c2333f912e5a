//! Opaque ID newtypes for netlist nodes, processes and simulation contexts.
//!
//! Node IDs are thin `u32` wrappers created by [`Arena::alloc`](crate::arena::Arena::alloc).

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a signal in a netlist.
    SignalId
);

define_id!(
    /// Opaque, copyable ID for an operator node in a netlist.
    OperatorId
);

define_id!(
    /// Opaque, copyable ID for an assignment in a netlist.
    AssignmentId
);

define_id!(
    /// Opaque, copyable ID for a unit of work spawned on a scheduler.
    ProcessId
);

/// Identity of one simulation context (one scheduler instance).
///
/// Every call to [`ContextId::fresh`] returns a value never handed out before
/// in this process, so a node's binding unambiguously names its owner.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContextId(u32);

impl ContextId {
    /// Allocates a new, unique context identity.
    pub fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_roundtrip() {
        assert_eq!(SignalId::from_raw(42).as_raw(), 42);
        assert_eq!(OperatorId::from_raw(7).as_raw(), 7);
    }

    #[test]
    fn ids_order_by_index() {
        assert!(SignalId::from_raw(1) < SignalId::from_raw(2));
    }

    #[test]
    fn fresh_contexts_are_distinct() {
        let a = ContextId::fresh();
        let b = ContextId::fresh();
        assert_ne!(a, b);
        assert_eq!(format!("{a}"), format!("#{}", a.as_raw()));
    }
}
