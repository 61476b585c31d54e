// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `modenv env` commands.

use clap::{Args, Subcommand, ValueEnum};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use modenv::{ActivationReport, SnapshotKind};

use crate::session::{confirm, Session};
use crate::StoreFlags;

/// Manage named environments
#[derive(Debug, Args)]
pub struct CmdEnv {
    #[clap(subcommand)]
    cmd: EnvCommand,
}

#[derive(Debug, Subcommand)]
enum EnvCommand {
    /// Switch mods and paths to a saved environment
    Activate {
        /// Environment to activate
        name: String,
    },

    /// Save the current mods and paths as a new environment
    Create {
        /// Name of the new environment
        name: String,

        /// Overwrite an existing environment without asking
        #[clap(short, long)]
        yes: bool,
    },

    /// Delete an environment
    Remove {
        /// Environment to delete
        name: String,
    },

    /// Update an environment from the current mods and paths
    Save {
        /// Environment to update (default: the active one)
        name: Option<String>,
    },

    /// Show all environments
    List {
        /// Output format
        #[clap(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Table,
    Yaml,
}

impl CmdEnv {
    pub fn run(&mut self, flags: &StoreFlags) -> Result<i32> {
        let mut session = Session::open(flags)?;

        match &self.cmd {
            EnvCommand::Activate { name } => {
                let report = session.manager_mut().activate(name)?;
                print_activation(&report);
            }
            EnvCommand::Create { name, yes } => {
                let assume_yes = *yes;
                let mut ask = |prompt: &str| confirm(prompt, assume_yes);
                let kind = session.manager_mut().create(name, &mut ask)?;
                let verb = match kind {
                    SnapshotKind::Created => "Created",
                    SnapshotKind::Overwritten => "Overwrote",
                };
                println!("{verb} env {}", name.green());
            }
            EnvCommand::Remove { name } => {
                let report = session.manager_mut().delete(name)?;
                if let Some(fallback) = &report.fallback {
                    print_activation(fallback);
                }
                println!("Removed env {}", report.name.green());
            }
            EnvCommand::Save { name } => {
                let saved = session.manager_mut().save(name.as_deref())?;
                println!("Saved env {}", saved.green());
            }
            EnvCommand::List { format } => {
                match format {
                    ListFormat::Table => print_table(&session),
                    ListFormat::Yaml => print_yaml(&session)?,
                }
                session.close()?;
                return Ok(0);
            }
        }

        session.commit()?;
        Ok(0)
    }
}

fn print_activation(report: &ActivationReport) {
    for change in &report.changes {
        if change.changed {
            println!("  {}", change.to_string().green());
        } else {
            tracing::info!("{change}");
        }
    }
    for name in &report.not_installed {
        println!(
            "  {}",
            format!("{name} is not installed so cannot be disabled").yellow()
        );
    }
    println!(
        "Activated env {} ({} mod(s) changed)",
        report.name.green(),
        report.flipped()
    );
}

fn print_table(session: &Session) {
    for entry in session.manager().list() {
        let env = entry.environment;
        if entry.active {
            println!("{} {}", "*".green(), entry.name.green().bold());
        } else {
            println!("  {}", entry.name);
        }
        println!("    data:  {}", env.data_path.display().to_string().cyan());
        println!("    write: {}", env.write_path.display().to_string().cyan());
        if !env.disabled.is_empty() {
            let disabled: Vec<&str> = env.disabled.iter().map(String::as_str).collect();
            println!("    disabled: {}", disabled.join(", ").dimmed());
        }
        if !env.held.is_empty() {
            let held: Vec<&str> = env.held.iter().map(String::as_str).collect();
            println!("    held: {}", held.join(", ").dimmed());
        }
    }
}

fn print_yaml(session: &Session) -> Result<()> {
    let mut environments = serde_yaml::Mapping::new();
    let mut active = serde_yaml::Value::Null;
    for entry in session.manager().list() {
        if entry.active {
            active = entry.name.into();
        }
        environments.insert(
            entry.name.into(),
            serde_yaml::to_value(entry.environment).into_diagnostic()?,
        );
    }

    let mut document = serde_yaml::Mapping::new();
    document.insert("active".into(), active);
    document.insert("environments".into(), environments.into());
    print!("{}", serde_yaml::to_string(&document).into_diagnostic()?);
    Ok(())
}
