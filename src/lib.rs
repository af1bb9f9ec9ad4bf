//! Crate entry point for the **lalibela** self-updater.
//!
//! The heart of the crate is [`upgrade`]: a verified, fail-closed pipeline
//! that moves the installed `lalibela` binary to the newest GitHub release.
//! The remaining modules are the small amount of glue the CLI needs
//! (config file, per-user paths, terminal status line).

mod config;
mod paths;
mod progress;
pub mod upgrade;

pub use config::{Config, UpdateSettings, load_config};
pub use paths::lalibela_home;
pub use upgrade::{UpdateError, UpdateOutcome, Updater, cmd_upgrade};
