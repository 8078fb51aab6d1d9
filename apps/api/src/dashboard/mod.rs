//! Read-only aggregates over the records a caller can see.

pub mod handlers;
pub mod map;
pub mod stats;
