//! # lalibela
//!
//! Command-line shell around the self-update pipeline.
//!
//! - `lalibela upgrade` verifies and installs the latest release
//! - `lalibela home` prints the configuration directory
//!
//! Log verbosity is read from `LALIBELA_LOG` (e.g. `LALIBELA_LOG=debug`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use lalibela::{cmd_upgrade, lalibela_home};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "lalibela",
    version,
    about = "lalibela - self-updating project scaffolder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Update lalibela itself to the latest signed release
    Upgrade,
    /// Show the lalibela config directory
    Home,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("LALIBELA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Upgrade => cmd_upgrade(),
        Cmd::Home => {
            println!("{}", lalibela_home()?.display());
            Ok(())
        }
    }
}
