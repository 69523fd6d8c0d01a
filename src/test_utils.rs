//! Shared test helpers: temp files/dirs and a config fixture builder.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::config::Config;
use crate::error::WfctlError;

/// A fresh temporary directory, cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("failed to create temporary directory")
}

/// Write `content` to `name` inside `dir`, returning the full path.
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("failed to write test file");
    path
}

/// Assert `result` is an `Err` whose message contains `expected`.
pub fn assert_error_contains<T>(result: Result<T, WfctlError>, expected: &str) {
    match result {
        Ok(_) => panic!("expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let msg = e.to_string();
            assert!(msg.contains(expected), "error message '{}' does not contain '{}'", msg, expected);
        }
    }
}

/// A `Config` pointed at `127.0.0.1:0` -- a destination no listener can ever
/// bind to, so connecting to it fails fast and deterministically without a
/// mock server. Useful wherever a test wants a real (not simulated)
/// `BadConnection` outcome. Note this does *not* pass `Config::validate`
/// (port 0 is rejected there); it is meant to be read directly by callers
/// like `Session::connect` that take a host/port pair rather than a `Config`.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_exists() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn create_test_file_round_trips_content() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "test.txt", "content");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn assert_error_contains_success() {
        let result: Result<(), WfctlError> = Err(WfctlError::BadFile("missing thing".to_string()));
        assert_error_contains(result, "missing thing");
    }

    #[test]
    #[should_panic(expected = "expected error containing")]
    fn assert_error_contains_panics_on_ok() {
        let result: Result<(), WfctlError> = Ok(());
        assert_error_contains(result, "anything");
    }

    #[test]
    fn test_config_has_sane_defaults() {
        let config = test_config();
        assert_eq!(config.host, "127.0.0.1");
    }
}
