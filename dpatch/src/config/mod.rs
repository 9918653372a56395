//! Configuration lookup, parsing and validation.
//!
//! Sources configuration from CLI flags only (there is no separate
//! application-config file; the workspace INI the server loads is
//! runtime task data, handled by [`crate::workspace`], not application
//! configuration), merges it over hard-coded defaults, and validates the
//! result into a runtime [`AppSettings`].

mod cli;
mod settings;

pub use self::cli::{CliOptions, Command};
pub use self::settings::{AppSettings, RunMode};
