//! Scenario fixtures shared by the integration tests

use std::path::{Path, PathBuf};

/// Path to a scenario under `tests/fixtures/scenarios`
pub fn scenario_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/scenarios")
        .join(name)
}

/// Path to a config file under `tests/fixtures`
pub fn config_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}
