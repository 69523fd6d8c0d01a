//! Error types for wfctl
//!
//! This module defines the typed error taxonomy used throughout the
//! application, using `thiserror` for ergonomic error handling. Every
//! variant carries the process exit code it maps to (see [`WfctlError::exit_code`]).

use thiserror::Error;

/// Main error type for wfctl operations
///
/// Every variant corresponds to one of the error kinds a command handler
/// can surface, and maps to a fixed process exit code via
/// [`WfctlError::exit_code`].
#[derive(Error, Debug)]
pub enum WfctlError {
    /// Transport-level failure: refused connection, timeout, premature
    /// disconnect, or any other socket-level error.
    #[error("connection failed: {0}")]
    BadConnection(String),

    /// HTTP response outside 200-399 that was not otherwise reinterpreted.
    #[error("server responded with status {0}")]
    BadStatus(u16),

    /// Target path missing, not a regular file, or an I/O error during read.
    #[error("file error: {0}")]
    BadFile(String),

    /// Malformed JSON in user input or in a server response.
    #[error("JSON error: {0}")]
    BadJson(String),

    /// Unknown command word, arity mismatch, forbidden method per
    /// capabilities, a command disallowed in a transaction, or an invalid
    /// JSON-Patch op.
    #[error("command error: {0}")]
    BadCommand(String),

    /// RFC 6902 conflict while applying a staged patch.
    #[error("JSON Patch conflict: {0}")]
    BadPatch(String),

    /// Malformed or non-resolving JSON Pointer.
    #[error("JSON Pointer error: {0}")]
    BadPointer(String),

    /// Expected `Allow` header missing on an `OPTIONS` response.
    #[error("missing Allow header for {0}")]
    BadHeader(String),

    /// Configuration error (validation failure, unreadable config file).
    #[error("configuration error: {0}")]
    Config(String),
}

impl WfctlError {
    /// The process exit code this error maps to, per the documented error
    /// taxonomy.
    pub fn exit_code(&self) -> i32 {
        match self {
            WfctlError::BadConnection(_) => 1,
            WfctlError::BadStatus(_) => 2,
            WfctlError::BadFile(_) => 3,
            WfctlError::BadJson(_) => 4,
            WfctlError::BadCommand(_) => 5,
            WfctlError::BadPatch(_) => 6,
            WfctlError::BadPointer(_) => 7,
            WfctlError::BadHeader(_) => 8,
            WfctlError::Config(_) => 5,
        }
    }
}

/// Nominal (success) exit code.
pub const NOMINAL: i32 = 0;

/// Result type alias for wfctl operations.
///
/// Uses `anyhow::Error` at the outermost boundary (session construction,
/// config loading, `main`) for rich error context, while handlers return
/// `Result<_, WfctlError>` directly so the dispatcher can inspect the exact
/// kind and compute an exit code.
pub type Result<T> = anyhow::Result<T>;
