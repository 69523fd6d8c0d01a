//! wfctl - transactional command-line client for a device-management HTTP API
//!
//! Thin entrypoint: parses CLI flags, loads configuration, opens one
//! control session, and drives it from either a script file or stdin. The
//! REPL loop itself -- reading lines, echoing a prompt -- stays here;
//! everything it calls into (tokenising, dispatch, the transaction engine)
//! lives in the library.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wfctl::cli::Cli;
use wfctl::config::Config;
use wfctl::session::DispatchOutcome;
use wfctl::Session;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse_args();
    let config = Config::load(cli.config.as_deref(), &cli)?;
    config.validate()?;

    let mut session = Session::connect(
        config.host.clone(),
        config.port,
        config.quiet,
        config.keepgoing,
        config.globargs.clone(),
        config.connect_timeout(),
        config.request_timeout(),
    )?;

    if let Some(script) = &config.script {
        let content = std::fs::read_to_string(script)?;
        run_lines(&mut session, content.lines(), config.keepgoing);
        return Ok(());
    }

    let stdin = io::stdin();
    let interactive = atty_like_stdin();
    loop {
        if interactive && !config.quiet {
            print!("wfctl> ");
            io::stdout().flush().ok();
        }
        let mut line = String::new();
        let bytes_read = stdin.lock().read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        run_one(&mut session, line, config.keepgoing);
    }
    Ok(())
}

/// Drive the session over an already-split sequence of lines (used for
/// `--script`), applying the same exit-on-failure policy as the REPL.
fn run_lines<'a>(session: &mut Session, lines: impl Iterator<Item = &'a str>, keepgoing: bool) {
    for line in lines {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        run_one(session, line, keepgoing);
    }
}

/// Dispatch one command line, handling `quit` and the
/// exit-on-failure/`keepgoing` policy.
fn run_one(session: &mut Session, line: &str, keepgoing: bool) {
    match session.dispatch_line(line) {
        Ok(DispatchOutcome::Quit) => std::process::exit(0),
        Ok(DispatchOutcome::Continue) => {}
        Err(e) => {
            eprintln!("error: {}", e);
            tracing::error!(error = %e, "command failed");
            if !keepgoing {
                std::process::exit(e.exit_code());
            }
        }
    }
}

/// Best-effort interactivity check without pulling in a terminal-styling
/// dependency: a script piped via stdin redirection still works either way
/// since empty-read just ends the loop.
fn atty_like_stdin() -> bool {
    use std::io::IsTerminal;
    io::stdin().is_terminal()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wfctl=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}
