//! Command-line interface.

mod commands;
mod helpers;

pub use commands::{exit_code, run};
