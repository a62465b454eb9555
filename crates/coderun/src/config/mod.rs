use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::language::{CompileConfig, DEFAULT_SANDBOX_PATH, RunConfig, Toolchain};
use crate::language::SupportedLanguage;
use crate::types::ResourceLimits;

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../coderun.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' is not enabled in the configuration")]
    LanguageNotFound(String),

    #[error("unknown language '{0}' in configuration")]
    UnknownLanguage(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How test cases are mapped onto processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HarnessMode {
    /// One generated program evaluates every case in a single process
    #[default]
    Batch,

    /// One generated program, workspace and process per case
    PerCase,
}

/// Primitive used to enforce the memory ceiling on every run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryIsolation {
    /// Address-space rlimit on every process of the run
    #[default]
    Rlimit,

    /// A cgroup v2 child per run (`memory.max`, `pids.max`)
    Cgroup,
}

/// Config for coderun
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory under which per-run workspaces are created (OS temp dir if unset)
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub harness_mode: HarnessMode,

    #[serde(default)]
    pub memory_isolation: MemoryIsolation,

    /// Cgroup v2 directory under which per-run cgroups are created.
    ///
    /// Only used when `memory_isolation = "cgroup"`. The directory is created
    /// and its memory and pids controllers enabled at startup.
    #[serde(default = "default_cg_root")]
    pub cg_root: PathBuf,

    /// Upper bound on runs executing at the same time
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Default resource limits applied to every run step.
    /// This will be overridden by per-language and per-request limits
    #[serde(default)]
    pub default_limits: ResourceLimits,

    /// Base resource limits for compile steps
    #[serde(default = "default_compile_limits")]
    pub compile_limits: ResourceLimits,

    /// Toolchains keyed by language tag; only listed languages are enabled
    #[serde(default)]
    pub languages: HashMap<String, Toolchain>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            workspace_root: None,
            harness_mode: HarnessMode::default(),
            memory_isolation: MemoryIsolation::default(),
            cg_root: default_cg_root(),
            max_concurrent_runs: default_max_concurrent_runs(),
            default_limits: ResourceLimits::default(),
            compile_limits: default_compile_limits(),
            languages: HashMap::new(),
        }
    }

    /// Get the toolchain configured for a language
    pub fn get_toolchain(&self, language: SupportedLanguage) -> Result<&Toolchain, ConfigError> {
        self.languages
            .get(language.tag())
            .ok_or_else(|| ConfigError::LanguageNotFound(language.to_string()))
    }

    /// Languages enabled in this configuration, in tag order
    pub fn enabled_languages(&self) -> Vec<SupportedLanguage> {
        let mut languages: Vec<_> = self
            .languages
            .keys()
            .filter_map(|tag| tag.parse().ok())
            .collect();
        languages.sort_by_key(|language: &SupportedLanguage| language.tag());
        languages
    }

    /// Directory under which workspaces are created
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Merge run limits: defaults → language → request overrides
    pub fn effective_limits(
        &self,
        toolchain: &Toolchain,
        overrides: Option<&ResourceLimits>,
    ) -> ResourceLimits {
        let mut limits = self.default_limits.clone();
        if let Some(ref lang_limits) = toolchain.run.limits {
            limits = limits.with_overrides(lang_limits);
        }
        if let Some(overrides) = overrides {
            limits = limits.with_overrides(overrides);
        }
        limits
    }

    /// Merge compile limits: compile defaults → language compile limits
    pub fn effective_compile_limits(&self, toolchain: &Toolchain) -> ResourceLimits {
        match toolchain.compile.as_ref().and_then(|c| c.limits.as_ref()) {
            Some(lang_limits) => self.compile_limits.with_overrides(lang_limits),
            None => self.compile_limits.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_cg_root() -> PathBuf {
    PathBuf::from("/sys/fs/cgroup/coderun")
}

fn default_max_concurrent_runs() -> usize {
    4
}

/// Default compilation limits
fn default_compile_limits() -> ResourceLimits {
    ResourceLimits {
        time_limit: Some(30.0),
        wall_time_limit: Some(30.0),
        memory_limit: Some(2 * ResourceLimits::GB),
        max_processes: Some(256), // compilers and build tools fork
        max_output: Some(1024),
        ..Default::default()
    }
}
