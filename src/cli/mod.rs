//! Command line front end
//!
//! Only available with the `cli` feature.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{list_models, main, report_failure, run, Cli, CliBackend, ERROR_MARKER};
