//! Configuration for wfctl: an optional YAML file with CLI-flag overrides.
//!
//! A file provides defaults, then anything set on the command line wins.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::{Result, WfctlError};

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    80
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

/// Session configuration: connection target, output/error-exit policy,
/// timeouts, an optional startup script, and the session-global arguments
/// substituted for `$N`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub quiet: bool,

    #[serde(default)]
    pub keepgoing: bool,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub script: Option<String>,

    #[serde(default)]
    pub globargs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            quiet: false,
            keepgoing: false,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            script: None,
            globargs: Vec::new(),
        }
    }
}

impl Config {
    /// Load defaults from an optional YAML file, then apply CLI overrides.
    /// A missing file is not an error -- it just means "use the built-in
    /// defaults before applying CLI flags".
    pub fn load(path: Option<&str>, cli: &Cli) -> Result<Self> {
        let mut config = match path {
            Some(p) if Path::new(p).exists() => Self::from_file(p)?,
            Some(p) => {
                tracing::warn!("config file not found at {}, using defaults", p);
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_cli_overrides(cli);
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WfctlError::Config(format!("failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents).map_err(|e| WfctlError::Config(format!("failed to parse config: {}", e)).into())
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if cli.quiet {
            self.quiet = true;
        }
        if cli.keepgoing {
            self.keepgoing = true;
        }
        if let Some(script) = &cli.script {
            self.script = Some(script.to_string_lossy().to_string());
        }
        if !cli.globargs.is_empty() {
            self.globargs = cli.globargs.clone();
        }
    }

    /// Reject an empty host and a zero port; anything else is acceptable.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(WfctlError::Config("host must not be empty".to_string()).into());
        }
        if self.port == 0 {
            return Err(WfctlError::Config("port must be nonzero".to_string()).into());
        }
        if self.connect_timeout_ms == 0 {
            return Err(WfctlError::Config("connect_timeout_ms must be greater than 0".to_string()).into());
        }
        if self.request_timeout_ms == 0 {
            return Err(WfctlError::Config("request_timeout_ms must be greater than 0".to_string()).into());
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
