//! Policy subsystems layered over the core pipeline.

pub mod policy;
