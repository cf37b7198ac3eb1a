//! Root folder resolution precedence tests
//!
//! Environment mutation requires serialized execution.

use std::path::{Path, PathBuf};

use matchbook_common::config::{resolve_root_folder, ROOT_ENV_VAR};
use serial_test::serial;

#[test]
#[serial]
fn env_var_used_when_no_cli_argument() {
    std::env::set_var(ROOT_ENV_VAR, "/tmp/matchbook-env");

    let resolved = resolve_root_folder(None);
    assert_eq!(resolved, PathBuf::from("/tmp/matchbook-env"));

    std::env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn cli_argument_beats_env_var() {
    std::env::set_var(ROOT_ENV_VAR, "/tmp/matchbook-env");

    let resolved = resolve_root_folder(Some(Path::new("/tmp/matchbook-cli")));
    assert_eq!(resolved, PathBuf::from("/tmp/matchbook-cli"));

    std::env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn falls_back_to_platform_default() {
    std::env::remove_var(ROOT_ENV_VAR);

    // No CLI argument and no env var: whatever comes back must be non-empty
    // and end with the application directory name
    let resolved = resolve_root_folder(None);
    assert!(resolved.to_string_lossy().contains("matchbook"));
}
