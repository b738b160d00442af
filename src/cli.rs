//! Command-line interface built on clap.
//!
//! [`Cli`] holds the [`Command`] subcommands (split, separate, progress, demo)
//! and the global flags (`--verbose`, `--config`).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::assembly::SplitDirective;

/// Batch tracking for a materials lab: split assemblies, follow jobs.
#[derive(Debug, Parser)]
#[command(name = "kcb", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enables debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "kcb.toml")]
    pub config: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Splits an assembly into groups and prints the children.
    Split {
        /// Assembly identifier, e.g. `abc.1.2.3`.
        identifier: String,

        /// Number of samples in the assembly.
        #[arg(long)]
        samples: u32,

        #[command(flatten)]
        mode: SplitMode,
    },

    /// Splits an assembly into single samples.
    Separate {
        identifier: String,

        #[arg(long)]
        samples: u32,
    },

    /// Shows the progress of a job stored as JSON.
    Progress {
        /// Path to the job file.
        job: PathBuf,
    },

    /// Runs a job through an in-memory chain and splits its batch.
    Demo,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct SplitMode {
    /// Samples per group.
    #[arg(long)]
    pub size: Option<u32>,

    /// Number of groups.
    #[arg(long)]
    pub parts: Option<u32>,
}

impl SplitMode {
    pub fn directive(&self) -> SplitDirective {
        match (self.size, self.parts) {
            (Some(size), _) => SplitDirective::BySize(size),
            (None, Some(parts)) => SplitDirective::ByParts(parts),
            // clap enforces exactly one of the two
            (None, None) => SplitDirective::Separate,
        }
    }
}
