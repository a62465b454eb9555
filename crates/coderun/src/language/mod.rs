//! Language adapters
//!
//! One adapter per [`SupportedLanguage`] describes how a [`Program`] is
//! written into a workspace, how it is compiled (if at all) and how it is
//! run. Adapters are built once from the configuration and never mutated
//! afterwards; the [`AdapterRegistry`] hands out shared references to them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use crate::language::interpreted::{BashAdapter, JavaScriptAdapter, PythonAdapter};
pub use crate::language::jvm::{JavaAdapter, KotlinAdapter};
pub use crate::language::native::{CppAdapter, GoAdapter, ObjectiveCAdapter, RustAdapter, SwiftAdapter};

use crate::config::{Config, Toolchain};
use crate::harness::{Program, SourceRole};
use crate::sandbox::{SandboxError, Workspace};

mod interpreted;
mod jvm;
mod native;

/// Languages the engine knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SupportedLanguage {
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "kotlin")]
    Kotlin,
    #[serde(rename = "cpp")]
    Cpp,
    #[serde(rename = "go")]
    Go,
    #[serde(rename = "rust")]
    Rust,
    #[serde(rename = "swift")]
    Swift,
    #[serde(rename = "objective-c")]
    ObjectiveC,
    #[serde(rename = "bash")]
    Bash,
}

impl SupportedLanguage {
    const ALL: [SupportedLanguage; 10] = [
        SupportedLanguage::Python,
        SupportedLanguage::JavaScript,
        SupportedLanguage::Java,
        SupportedLanguage::Kotlin,
        SupportedLanguage::Cpp,
        SupportedLanguage::Go,
        SupportedLanguage::Rust,
        SupportedLanguage::Swift,
        SupportedLanguage::ObjectiveC,
        SupportedLanguage::Bash,
    ];

    /// Every supported language
    pub fn all() -> &'static [SupportedLanguage] {
        &Self::ALL
    }

    /// Tag used in configuration files and requests
    pub fn tag(&self) -> &'static str {
        match self {
            SupportedLanguage::Python => "python",
            SupportedLanguage::JavaScript => "javascript",
            SupportedLanguage::Java => "java",
            SupportedLanguage::Kotlin => "kotlin",
            SupportedLanguage::Cpp => "cpp",
            SupportedLanguage::Go => "go",
            SupportedLanguage::Rust => "rust",
            SupportedLanguage::Swift => "swift",
            SupportedLanguage::ObjectiveC => "objective-c",
            SupportedLanguage::Bash => "bash",
        }
    }

    /// Human readable name
    pub fn name(&self) -> &'static str {
        match self {
            SupportedLanguage::Python => "Python 3",
            SupportedLanguage::JavaScript => "JavaScript (Node.js)",
            SupportedLanguage::Java => "Java",
            SupportedLanguage::Kotlin => "Kotlin",
            SupportedLanguage::Cpp => "C++17",
            SupportedLanguage::Go => "Go",
            SupportedLanguage::Rust => "Rust",
            SupportedLanguage::Swift => "Swift",
            SupportedLanguage::ObjectiveC => "Objective-C",
            SupportedLanguage::Bash => "Bash",
        }
    }
}

impl fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A language tag that does not name a [`SupportedLanguage`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown language '{0}'")]
pub struct UnknownLanguage(pub String);

impl FromStr for SupportedLanguage {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|language| language.tag() == s)
            .ok_or_else(|| UnknownLanguage(s.to_owned()))
    }
}

/// A process to spawn inside a workspace
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    /// Executable name (looked up on the spec's `PATH`) or absolute path
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Complete environment; nothing is inherited from the engine
    pub env: BTreeMap<String, String>,
}

impl ProcessSpec {
    /// A process with a minimal environment rooted at `working_dir`
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let home = working_dir.to_string_lossy().into_owned();
        let mut env = BTreeMap::new();
        env.insert("PATH".to_owned(), crate::config::DEFAULT_SANDBOX_PATH.to_owned());
        env.insert("HOME".to_owned(), home.clone());
        env.insert("TMPDIR".to_owned(), home);
        env.insert("LANG".to_owned(), "C.UTF-8".to_owned());
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir,
            env,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build a spec from a configured command template
    ///
    /// Returns `None` when the command is empty. A program given as
    /// `./name` is resolved against the workspace.
    pub fn from_template(
        command: &[String],
        env: &HashMap<String, String>,
        path: &str,
        materialized: &Materialized,
        binary: &str,
        workspace: &Path,
    ) -> Option<Self> {
        let workspace_str = workspace.to_string_lossy();
        let expanded =
            Toolchain::expand_command(command, &materialized.sources, binary, &workspace_str);
        let (program, args) = expanded.split_first()?;

        let program = match program.strip_prefix("./") {
            Some(local) => workspace.join(local).to_string_lossy().into_owned(),
            None => program.clone(),
        };

        let mut spec = ProcessSpec::new(program, workspace)
            .args(args.iter().cloned())
            .env("PATH", path);
        for (key, value) in env {
            let value =
                Toolchain::expand_value(value, materialized.primary(), binary, &workspace_str);
            spec = spec.env(key.clone(), value);
        }
        Some(spec)
    }

    /// Command line for logs and diagnostics
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Source files written into a workspace, entry point first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// File names relative to the workspace
    pub sources: Vec<String>,
}

impl Materialized {
    pub fn new(sources: Vec<String>) -> Self {
        Self { sources }
    }

    /// File name of the entry point
    pub fn primary(&self) -> &str {
        self.sources.first().map(String::as_str).unwrap_or_default()
    }

    /// Absolute path of the entry point
    pub fn primary_path(&self, workspace: &Workspace) -> PathBuf {
        workspace.path().join(self.primary())
    }
}

/// Per-language strategy for materializing, compiling and running a program
///
/// Adapters only describe work; the sandbox spawns the processes. Every
/// side effect of an adapter is confined to the workspace it is handed.
#[async_trait]
pub trait LanguageAdapter: fmt::Debug + Send + Sync {
    fn language(&self) -> SupportedLanguage;

    fn toolchain(&self) -> &Toolchain;

    /// Canonical file name for a source file of the given role
    fn file_name(&self, role: SourceRole) -> &'static str;

    /// Canonical name of the compiled artifact
    fn binary_name(&self) -> &'static str {
        "main"
    }

    /// Write every file of `program` into the workspace under its canonical name
    async fn materialize(
        &self,
        workspace: &Workspace,
        program: &Program,
    ) -> Result<Materialized, SandboxError> {
        let mut sources = Vec::with_capacity(2);
        for file in program.files() {
            let name = self.file_name(file.role);
            workspace.write_file(name, file.contents.as_bytes()).await?;
            sources.push(name.to_owned());
        }
        debug!(language = %self.language(), ?sources, "materialized program");
        Ok(Materialized::new(sources))
    }

    /// Compiler invocation, `None` for interpreted languages
    fn compile_command(
        &self,
        workspace: &Workspace,
        materialized: &Materialized,
    ) -> Option<ProcessSpec> {
        let toolchain = self.toolchain();
        let compile = toolchain.compile.as_ref()?;
        ProcessSpec::from_template(
            &compile.command,
            &compile.env,
            &toolchain.run.path,
            materialized,
            self.binary_name(),
            workspace.path(),
        )
    }

    /// Invocation of the materialized (and compiled) program
    fn run_command(&self, workspace: &Workspace, materialized: &Materialized) -> ProcessSpec {
        let run = &self.toolchain().run;
        ProcessSpec::from_template(
            &run.command,
            &run.env,
            &run.path,
            materialized,
            self.binary_name(),
            workspace.path(),
        )
        // Empty run commands are rejected when the configuration is loaded
        .unwrap_or_else(|| {
            ProcessSpec::new(
                materialized.primary_path(workspace).to_string_lossy(),
                workspace.path(),
            )
        })
    }
}

/// Build the adapter for a language
pub fn adapter_for(language: SupportedLanguage, toolchain: Toolchain) -> Arc<dyn LanguageAdapter> {
    match language {
        SupportedLanguage::Python => Arc::new(PythonAdapter::new(toolchain)),
        SupportedLanguage::JavaScript => Arc::new(JavaScriptAdapter::new(toolchain)),
        SupportedLanguage::Java => Arc::new(JavaAdapter::new(toolchain)),
        SupportedLanguage::Kotlin => Arc::new(KotlinAdapter::new(toolchain)),
        SupportedLanguage::Cpp => Arc::new(CppAdapter::new(toolchain)),
        SupportedLanguage::Go => Arc::new(GoAdapter::new(toolchain)),
        SupportedLanguage::Rust => Arc::new(RustAdapter::new(toolchain)),
        SupportedLanguage::Swift => Arc::new(SwiftAdapter::new(toolchain)),
        SupportedLanguage::ObjectiveC => Arc::new(ObjectiveCAdapter::new(toolchain)),
        SupportedLanguage::Bash => Arc::new(BashAdapter::new(toolchain)),
    }
}

/// Immutable table of adapters, built once at startup
///
/// Cloning is cheap; every clone shares the same table.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: Arc<HashMap<SupportedLanguage, Arc<dyn LanguageAdapter>>>,
}

impl AdapterRegistry {
    /// Registry holding exactly the given adapters
    ///
    /// A later adapter for the same language replaces an earlier one.
    pub fn new(adapters: impl IntoIterator<Item = Arc<dyn LanguageAdapter>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.language(), adapter))
            .collect();
        Self {
            adapters: Arc::new(adapters),
        }
    }

    /// One adapter per language enabled in the configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.enabled_languages().into_iter().filter_map(|language| {
            config
                .get_toolchain(language)
                .ok()
                .map(|toolchain| adapter_for(language, toolchain.clone()))
        }))
    }

    pub fn get(&self, language: SupportedLanguage) -> Option<Arc<dyn LanguageAdapter>> {
        self.adapters.get(&language).cloned()
    }

    pub fn contains(&self, language: SupportedLanguage) -> bool {
        self.adapters.contains_key(&language)
    }

    /// Registered languages in tag order
    pub fn languages(&self) -> Vec<SupportedLanguage> {
        let mut languages: Vec<_> = self.adapters.keys().copied().collect();
        languages.sort_by_key(|language| language.tag());
        languages
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
