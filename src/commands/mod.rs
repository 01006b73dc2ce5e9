//! CLI command implementations.

pub mod provision;
