//! Application services: the read-through orchestrator, search, and the contracts their
//! adapters implement.

pub mod error;
pub mod search;
pub mod trending;
pub mod upstream;
