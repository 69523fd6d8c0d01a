//! Command-line interface definition for wfctl
//!
//! This module defines the CLI surface using clap's derive API. It is the
//! thin, out-of-scope entrypoint collaborator the core session consumes:
//! it supplies `host`, `port`, `quiet`, `keepgoing`, a startup script, and
//! the global argument list, then hands off to [`crate::session::Session`].

use clap::Parser;
use std::path::PathBuf;

/// wfctl - transactional command-line client for a device-management API
#[derive(Parser, Debug, Clone)]
#[command(name = "wfctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Device hostname or IP address
    #[arg(index = 1)]
    pub host: Option<String>,

    /// Device port
    #[arg(index = 2)]
    pub port: Option<u16>,

    /// Path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Suppress informational stdout (command results still print)
    #[arg(short, long)]
    pub quiet: bool,

    /// Keep the REPL running after a command fails instead of exiting
    #[arg(short = 'k', long)]
    pub keepgoing: bool,

    /// Run this script non-interactively instead of reading stdin
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Global argument substituted for `$N` in commands (repeatable, in order)
    #[arg(short, long = "arg")]
    pub globargs: Vec<String>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            config: None,
            quiet: false,
            keepgoing: false,
            script: None,
            globargs: Vec::new(),
        }
    }
}
