// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! modenv - Named Mod Environment Manager CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

mod cmd_env;
mod cmd_toggle;
mod session;

use cmd_env::CmdEnv;
use cmd_toggle::CmdToggle;

#[derive(Parser)]
#[clap(
    name = "modenv",
    about = "Named Mod Environment Manager",
    version,
    long_about = "Save, switch and manage named sets of enabled mods and install paths"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(flatten)]
    store: StoreFlags,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

#[derive(Parser, Clone, Debug, Default)]
pub struct StoreFlags {
    /// Host configuration file (data/write paths and held mods)
    #[clap(long, env = "MODENV_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Environments file
    #[clap(long = "envs-file", env = "MODENV_ENVS_FILE", global = true)]
    pub envs_file: Option<PathBuf>,

    /// Seconds to wait for another modenv process to finish
    #[clap(
        long = "lock-timeout",
        env = "MODENV_LOCK_TIMEOUT",
        default_value_t = 5,
        global = true
    )]
    pub lock_timeout: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Manage named environments
    Env(CmdEnv),

    /// Enable mods matching the given patterns
    Enable(CmdToggle),

    /// Disable mods matching the given patterns
    Disable(CmdToggle),
}

impl Opt {
    fn run(self) -> Result<i32> {
        // Setup logging
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        // Dispatch to command
        match self.cmd {
            Command::Env(mut cmd) => cmd.run(&self.store),
            Command::Enable(mut cmd) => cmd.run(&self.store, true),
            Command::Disable(mut cmd) => cmd.run(&self.store, false),
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
