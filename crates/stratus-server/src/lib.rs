//! # Stratus Server
//!
//! Wires configuration, the two cache tiers, the resilience layer and the
//! upstream client into a runnable application, and exposes it as a CLI.

pub mod app;
pub mod cli;

pub use app::{build_app, policy_table, App};
pub use cli::{Cli, Command};
