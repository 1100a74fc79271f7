//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod log_sink;
pub mod reddit;
pub mod redis;
pub mod search;
pub mod startup;
pub mod telemetry;
