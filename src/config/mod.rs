//! Configuration model for tac1100.
//!
//! A YAML file (from `--config` or `$TAC1100_CONFIG`) supplies defaults for
//! lock handling, the serial line and register I/O. Every field is optional,
//! unknown fields are ignored, and command-line flags override file values.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

pub use model::Config;
pub use types::CONFIG_ENV_VAR;
