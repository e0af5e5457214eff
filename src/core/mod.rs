//! Core modules for opwarden's mediation pipeline.
//!
//! Extraction, the sandboxed store, execution, auditing and orchestration
//! live here; the permission policy lives in [`crate::plugins::policy`].

pub mod agent;
pub mod audit;
pub mod config;
pub mod confirm;
pub mod error;
pub mod executor;
pub mod external_action;
pub mod extract;
pub mod gatekeeper;
pub mod operation;
pub mod orchestrator;
pub mod output;
pub mod prompt;
pub mod store;
pub mod time;
