//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod runall;
pub mod status;
pub mod update;
pub mod upload;
pub mod validate;
