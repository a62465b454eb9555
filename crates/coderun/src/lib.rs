//! An engine for running untrusted solutions against JSON test cases.
//!
//! Coderun takes a function written by a user in one of ten languages,
//! wraps it in a generated harness that feeds it each test case, runs the
//! result in a disposable workspace under resource limits and grades what
//! comes back.
//!
//! # Features
//!
//! - **Harness generation**: test data is embedded as native literals, results come back as one JSON line.
//! - **Sandboxed execution**: a private workspace, a cleared environment and a killed process group for every run.
//! - **Resource limits**: CPU time, wall time, memory, stack, open files and output size.
//! - **cgroup v2 support**: optional per-run memory and process accounting.
//! - **TOML configuration**: per-language compile and run commands with limit overrides.
//!
//! # Example
//!
//! ```no_run
//! use coderun::{Config, Engine, SupportedLanguage, TestCase};
//! use serde_json::json;
//!
//! # async fn demo() {
//! let engine = Engine::new(Config::new());
//! let code = "def solve(input):\n    return [0, 1] if input['target'] == 9 else []\n";
//! let cases = [TestCase::new(json!({"nums": [2, 7], "target": 9}), json!([0, 1]))];
//! let result = engine.submit_run(code, SupportedLanguage::Python, &cases).await;
//! assert!(result.all_passed());
//! # }
//! ```

#[cfg(not(unix))]
compile_error!("coderun relies on process groups and rlimits and only builds on Unix");

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, HarnessMode, MemoryIsolation, Toolchain};
pub use harness::{HarnessError, HarnessGenerator, Program};
pub use language::{AdapterRegistry, LanguageAdapter, SupportedLanguage, UnknownLanguage};
pub use runner::{Engine, EngineError, RunOnceOutput, RunRequest};
pub use sandbox::{Isolation, Sandbox, SandboxError, SandboxOutcome, prepare_cgroup};
pub use types::{
    Comparison, ExecutionOutcome, ResourceLimits, RunResult, RunStatus, TestCase, TestResult,
};

pub mod config;
pub mod harness;
pub mod language;
pub mod runner;
pub mod sandbox;
pub mod types;
