//! Domain layer - poll entities and their invariants.

pub mod poll;
