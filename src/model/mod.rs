//! Plain data structures shared by the readers and the normalization engine.
//!
//! This module defines the coordinate-side view (chains, atom sites, the coordinate
//! index) and the restraint-side products (records, alignments, recovery hints). The types
//! carry no resolution logic of their own; they are filled by `io` readers and consumed by
//! `ops` and the dispatchers.

pub mod alignment;
pub mod atom;
pub mod chain;
pub mod index;
pub mod reasons;
pub mod restraint;
pub mod types;
