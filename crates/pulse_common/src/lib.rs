//! Shared value and time types for the Pulse signal simulator.
//!
//! This crate provides three-state logic levels, packed bit vectors, simulation
//! values carrying validity and event masks, and picosecond simulation time.

#![warn(missing_docs)]

pub mod bits;
pub mod logic;
pub mod time;
pub mod value;

pub use bits::Bits;
pub use logic::Logic;
pub use time::{ParseTimeError, SimTime};
pub use value::Value;
