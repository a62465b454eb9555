//! Integration tests for coderun
//!
//! These tests run real toolchains (python3, node, javac, g++, ...). Each
//! test returns early with a note on stderr when a toolchain it needs is
//! not on the PATH configured for sandboxed processes.
//! Run with: cargo test -p coderun --features integration-tests

#![cfg(feature = "integration-tests")]

use std::fs;
use std::path::Path;

use coderun::{Config, Engine, SupportedLanguage, TestCase};

mod config_loading;
mod isolation;
mod languages;
mod outcomes;
mod run_once;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

pub(crate) fn fixture_cases(name: &str) -> Vec<TestCase> {
    let path = format!("{FIXTURES_PATH}/cases/{name}");
    let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("Invalid cases in {path}: {e}"))
}

/// Whether the programs a language's toolchain runs are on the PATH the
/// sandbox gives them; prints a skip note otherwise
pub(crate) fn require(language: SupportedLanguage) -> bool {
    let config = Config::default();
    let Ok(toolchain) = config.get_toolchain(language) else {
        eprintln!("skipping: {language} is not configured");
        return false;
    };
    let sandbox_path = toolchain.run.path.as_str();
    let missing: Vec<&str> = toolchain
        .compile
        .iter()
        .filter_map(|compile| compile.command.first())
        .chain(toolchain.run.command.first())
        .map(String::as_str)
        .filter(|program| !program.starts_with("./"))
        .filter(|program| !on_path(sandbox_path, program))
        .collect();
    if missing.is_empty() {
        true
    } else {
        eprintln!("skipping: {} not on {sandbox_path}", missing.join(", "));
        false
    }
}

fn on_path(path: &str, program: &str) -> bool {
    if program.starts_with('/') {
        return Path::new(program).is_file();
    }
    std::env::split_paths(path).any(|dir| dir.join(program).is_file())
}

/// Whether the nlohmann/json header the C++ harness includes is installed
pub(crate) fn require_nlohmann() -> bool {
    let found = ["/usr/include", "/usr/local/include", "/opt/homebrew/include"]
        .iter()
        .any(|dir| Path::new(dir).join("nlohmann/json.hpp").is_file());
    if !found {
        eprintln!("skipping: nlohmann/json.hpp not installed");
    }
    found
}

/// Default configuration with workspaces under a private root
pub(crate) fn test_config() -> Config {
    let root = std::env::temp_dir().join(format!("coderun-it-{}", uuid::Uuid::new_v4()));
    fs::create_dir(&root).expect("Failed to create workspace root");
    let mut config = Config::default();
    config.workspace_root = Some(root);
    config
}

pub(crate) fn test_engine() -> Engine {
    Engine::new(test_config())
}

/// Assert that no workspace outlived its run, then remove the root
pub(crate) fn assert_workspaces_removed(engine: &Engine) {
    let root = engine.config().workspace_root();
    let leftovers: Vec<_> = fs::read_dir(&root)
        .expect("Failed to list workspace root")
        .flatten()
        .map(|entry| entry.file_name())
        .collect();
    assert!(leftovers.is_empty(), "workspaces left behind: {leftovers:?}");
    fs::remove_dir(&root).expect("Failed to remove workspace root");
}
