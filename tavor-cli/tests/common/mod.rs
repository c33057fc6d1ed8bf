#![allow(dead_code)]

use assert_cmd::Command;
use std::time::Duration;
use tavor_test_utils::{API_KEY, MockTavor};

const TAVOR_ENVS: &[&str] = &[
    "TAVOR_API_KEY",
    "TAVOR_BASE_URL",
    "TAVOR_BOX_CPU",
    "TAVOR_BOX_MIB_RAM",
    "TAVOR_BOX_TIMEOUT",
];

/// `tavor` binary with a clean environment, unauthenticated.
pub fn bare() -> Command {
    let bin_path = env!("CARGO_BIN_EXE_tavor");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(30));
    for name in TAVOR_ENVS {
        cmd.env_remove(name);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

/// `tavor` binary pointed at `mock`.
pub fn tavor(mock: &MockTavor) -> Command {
    let mut cmd = bare();
    cmd.env("TAVOR_API_KEY", API_KEY)
        .env("TAVOR_BASE_URL", mock.uri());
    cmd
}
