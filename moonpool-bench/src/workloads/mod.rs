//! Reference workloads.

pub mod counting;
