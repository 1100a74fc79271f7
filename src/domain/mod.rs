//! Domain layer types and invariants.

pub mod descriptor;
pub mod error;
pub mod posts;
