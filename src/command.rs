//! Command tokeniser, `$N` variable resolver, and the `Command` vocabulary.
//!
//! Commands parse directly into a tagged `Command` enum off a static arity
//! table, so arity checking is a property of parsing rather than something
//! each handler re-derives.

use crate::error::WfctlError;

/// One positional-arity table entry: command word -> number of
/// whitespace-delimited positional args, *excluding* the trailing
/// rest-of-line body slot that every command yields.
const ARITY_TABLE: &[(&str, usize)] = &[
    ("quit", 0),
    ("fetch", 1),
    ("push", 1),
    ("pushf", 2),
    ("delete", 1),
    ("transact", 0),
    ("jp", 3),
    ("jpf", 4),
    ("exist", 2),
    ("jtest", 2),
    ("jtestf", 3),
    ("test", 1),
    ("testf", 2),
    ("diff", 0),
    ("commit", 0),
    ("abort", 0),
    ("exec", 1),
    ("summary", 0),
    ("start", 1),
    ("stop", 1),
    ("reload", 0),
    ("restart", 0),
    ("reboot", 0),
    ("shutdown", 0),
];

fn arity_of(word: &str) -> Option<usize> {
    ARITY_TABLE.iter().find(|(w, _)| *w == word).map(|(_, n)| *n)
}

/// The fixed command vocabulary, already arity-checked by the tokeniser.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    Fetch { resource: String },
    Push { resource: String, body: String },
    Pushf { resource: String, path: String },
    Delete { resource: String },
    Transact,
    Jp { resource: String, op: String, pointer: String, body: String },
    Jpf { resource: String, op: String, pointer: String, path: String },
    Exist { resource: String, pointer: String },
    Jtest { resource: String, pointer: String, value: String },
    Jtestf { resource: String, pointer: String, path: String },
    Test { resource: String, body: String },
    Testf { resource: String, path: String },
    Diff,
    Commit,
    Abort,
    Exec { path: String },
    Summary,
    Start { name: String },
    Stop { name: String },
    Reload,
    Restart,
    Reboot,
    Shutdown,
}

/// Replace `$N` with `globargs[N]`, or the empty string when `N` is out of
/// range. Anything else passes through unchanged; no quoting or escaping.
pub fn resolve_var(word: &str, globargs: &[String]) -> String {
    if let Some(rest) = word.strip_prefix('$') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = rest.parse::<usize>() {
                return globargs.get(n).cloned().unwrap_or_default();
            }
        }
    }
    word.to_string()
}

/// Pop the first whitespace-delimited word from `s`, returning it and the
/// (trimmed) remainder.
fn pop_first_word(s: &str) -> (&str, &str) {
    let trimmed = s.trim_start();
    match trimmed.find(char::is_whitespace) {
        Some(i) => (&trimmed[..i], trimmed[i..].trim_start()),
        None => (trimmed, ""),
    }
}

/// Tokenise a raw command line into (positional args, body), resolving
/// `$N` substitutions on every slot, per the static arity table.
fn tokenize(line: &str, globargs: &[String]) -> Result<(String, Vec<String>, String), WfctlError> {
    let (word, rest) = pop_first_word(line);
    if word.is_empty() {
        return Err(WfctlError::BadCommand("empty command line".to_string()));
    }
    let arity = arity_of(word)
        .ok_or_else(|| WfctlError::BadCommand(format!("'{}' is not a recognized command", word)))?;

    let mut positional = Vec::with_capacity(arity);
    let mut remainder = rest;
    for _ in 0..arity {
        if remainder.is_empty() {
            return Err(WfctlError::BadCommand("not enough positional args".to_string()));
        }
        let (arg, next) = pop_first_word(remainder);
        positional.push(resolve_var(arg, globargs));
        remainder = next;
    }
    let body = resolve_var(remainder.trim(), globargs);
    Ok((word.to_string(), positional, body))
}

/// Parse one line into a fully arity-checked `Command`.
pub fn parse(line: &str, globargs: &[String]) -> Result<Command, WfctlError> {
    let (word, a, body) = tokenize(line, globargs)?;
    let cmd = match word.as_str() {
        "quit" => Command::Quit,
        "fetch" => Command::Fetch { resource: a[0].clone() },
        "push" => Command::Push { resource: a[0].clone(), body },
        "pushf" => Command::Pushf { resource: a[0].clone(), path: a[1].clone() },
        "delete" => Command::Delete { resource: a[0].clone() },
        "transact" => Command::Transact,
        "jp" => Command::Jp {
            resource: a[0].clone(),
            op: a[1].clone(),
            pointer: a[2].clone(),
            body,
        },
        "jpf" => Command::Jpf {
            resource: a[0].clone(),
            op: a[1].clone(),
            pointer: a[2].clone(),
            path: a[3].clone(),
        },
        "exist" => Command::Exist { resource: a[0].clone(), pointer: a[1].clone() },
        "jtest" => Command::Jtest { resource: a[0].clone(), pointer: a[1].clone(), value: body },
        "jtestf" => Command::Jtestf { resource: a[0].clone(), pointer: a[1].clone(), path: a[2].clone() },
        "test" => Command::Test { resource: a[0].clone(), body },
        "testf" => Command::Testf { resource: a[0].clone(), path: a[1].clone() },
        "diff" => Command::Diff,
        "commit" => Command::Commit,
        "abort" => Command::Abort,
        "exec" => Command::Exec { path: a[0].clone() },
        "summary" => Command::Summary,
        "start" => Command::Start { name: a[0].clone() },
        "stop" => Command::Stop { name: a[0].clone() },
        "reload" => Command::Reload,
        "restart" => Command::Restart,
        "reboot" => Command::Reboot,
        "shutdown" => Command::Shutdown,
        _ => unreachable!("arity_of covers exactly ARITY_TABLE's words"),
    };
    Ok(cmd)
}

/// True for the commands forbidden while a transaction is open.
pub fn forbidden_in_transaction(cmd: &Command) -> bool {
    matches!(
        cmd,
        Command::Exec { .. }
            | Command::Start { .. }
            | Command::Stop { .. }
            | Command::Reload
            | Command::Restart
            | Command::Reboot
            | Command::Shutdown
    )
}
