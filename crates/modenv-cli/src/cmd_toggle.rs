// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `modenv enable` and `modenv disable` commands.

use clap::Args;
use colored::Colorize;
use miette::Result;

use crate::session::Session;
use crate::StoreFlags;

/// Switch mods on or off in the active environment
#[derive(Debug, Args)]
pub struct CmdToggle {
    /// Mod names, globs or unique fragments of a name
    #[clap(required = true)]
    patterns: Vec<String>,
}

impl CmdToggle {
    pub fn run(&mut self, flags: &StoreFlags, enabled: bool) -> Result<i32> {
        let mut session = Session::open(flags)?;
        let manager = session.manager_mut();
        let report = if enabled {
            manager.enable(&self.patterns)?
        } else {
            manager.disable(&self.patterns)?
        };

        for change in &report.changes {
            if change.changed {
                println!("{}", change.to_string().green());
            } else {
                println!("{}", change.to_string().dimmed());
            }
        }
        let failed = report.has_failures();
        for (_, err) in report.failures {
            eprintln!("{:?}", miette::Report::new(err));
        }

        session.commit()?;
        Ok(if failed { 1 } else { 0 })
    }
}
