//! wfctl - transactional command-line client for a device-management HTTP API
//!
//! This library implements the control session: a line-oriented command
//! interpreter, a client-side staged-state transaction engine (diffing,
//! RFC 6902 JSON-Patch application, batch coalescing), an `OPTIONS`-driven
//! capability cache, and the HTTP transport feeding both.
//!
//! # Architecture
//!
//! - `command`: tokeniser, `$N` variable resolver, and the `Command` vocabulary
//! - `transport`: single-flight, synchronous HTTP transport
//! - `caps`: per-resource `OPTIONS`-driven capability cache
//! - `diff`: staged/orig diff records and the recursive structural differ
//! - `deferred`: the deferred-command log and commit planner (patch coalescing)
//! - `session`: the state machine and command handlers tying the above together
//! - `config`: file + CLI-flag configuration layer
//! - `error`: the typed error/exit-code taxonomy
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use wfctl::{Config, Session};
//!
//! fn main() -> anyhow::Result<()> {
//!     let cli = wfctl::cli::Cli::default();
//!     let config = Config::load(None, &cli)?;
//!     config.validate()?;
//!
//!     let mut session = Session::connect(
//!         config.host.clone(),
//!         config.port,
//!         config.quiet,
//!         config.keepgoing,
//!         config.globargs.clone(),
//!         config.connect_timeout(),
//!         config.request_timeout(),
//!     )?;
//!     session.dispatch_line("fetch env/devname")?;
//!     Ok(())
//! }
//! ```

pub mod caps;
pub mod cli;
pub mod command;
pub mod config;
pub mod deferred;
pub mod diff;
pub mod error;
pub mod session;
pub mod transport;

pub use config::Config;
pub use error::{Result, WfctlError};
pub use session::{DispatchOutcome, Session};

#[cfg(test)]
pub mod test_utils;
