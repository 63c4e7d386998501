//! Command-line arguments for the cluster binaries.

pub mod coordinator;
pub mod worker;
