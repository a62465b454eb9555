use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::ResourceLimits;

/// Default PATH for sandboxed processes
pub const DEFAULT_SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Toolchain invocation for one language
///
/// Commands are argument vectors with placeholders:
/// - `{source}`: the primary source file name
/// - `{sources}`: every materialized source file, one argument each (whole-argument only)
/// - `{binary}`: the canonical output name
/// - `{workspace}`: absolute path of the run's workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toolchain {
    /// Compilation configuration (None for interpreted languages)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Execution configuration
    pub run: RunConfig,
}

impl Toolchain {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Expand placeholders in the given command
    pub fn expand_command(
        command: &[String],
        sources: &[String],
        binary: &str,
        workspace: &str,
    ) -> Vec<String> {
        let source = sources.first().map(String::as_str).unwrap_or_default();
        let mut expanded = Vec::with_capacity(command.len() + sources.len());
        for arg in command {
            if arg == "{sources}" {
                expanded.extend(sources.iter().cloned());
                continue;
            }
            expanded.push(Self::expand_value(arg, source, binary, workspace));
        }
        expanded
    }

    /// Expand placeholders inside a single value (arguments and environment values)
    pub fn expand_value(value: &str, source: &str, binary: &str, workspace: &str) -> String {
        value
            .replace("{source}", source)
            .replace("{output}", binary)
            .replace("{binary}", binary)
            .replace("{workspace}", workspace)
    }
}

/// Configuration for the compilation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command and arguments with placeholders
    pub command: Vec<String>,

    /// Environment variables to set during compilation
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Resource limits for compilation (overrides `compile_limits`)
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

/// Configuration for the execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    pub command: Vec<String>,

    /// Environment variables to set
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// PATH environment variable for the sandboxed process
    ///
    /// Defaults to "/usr/local/bin:/usr/bin:/bin" if not specified.
    #[serde(default = "default_sandbox_path")]
    pub path: String,

    /// Resource limits for execution (overrides `default_limits`)
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

fn default_sandbox_path() -> String {
    DEFAULT_SANDBOX_PATH.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn expand_command_source_placeholder() {
        let cmd = strings(&["python3", "{source}"]);
        let result = Toolchain::expand_command(&cmd, &strings(&["main.py"]), "main", "/w");
        assert_eq!(result, vec!["python3", "main.py"]);
    }

    #[test]
    fn expand_command_output_and_binary_placeholders() {
        let cmd = strings(&["g++", "-o", "{output}", "{source}"]);
        let result = Toolchain::expand_command(&cmd, &strings(&["main.cpp"]), "main", "/w");
        assert_eq!(result, vec!["g++", "-o", "main", "main.cpp"]);

        let cmd = strings(&["./{binary}"]);
        let result = Toolchain::expand_command(&cmd, &strings(&["main.cpp"]), "main", "/w");
        assert_eq!(result, vec!["./main"]);
    }

    #[test]
    fn expand_command_sources_expands_to_every_file() {
        let cmd = strings(&["javac", "-d", ".", "{sources}"]);
        let sources = strings(&["Main.java", "Solution.java"]);
        let result = Toolchain::expand_command(&cmd, &sources, "Main", "/w");
        assert_eq!(result, vec!["javac", "-d", ".", "Main.java", "Solution.java"]);
    }

    #[test]
    fn expand_command_sources_only_as_whole_argument() {
        let cmd = strings(&["--files={sources}"]);
        let result = Toolchain::expand_command(&cmd, &strings(&["a", "b"]), "x", "/w");
        assert_eq!(result, vec!["--files={sources}"]);
    }

    #[test]
    fn expand_command_workspace_placeholder() {
        let cmd = strings(&["{workspace}/{binary}"]);
        let result = Toolchain::expand_command(&cmd, &strings(&["main.rs"]), "main", "/tmp/ws");
        assert_eq!(result, vec!["/tmp/ws/main"]);
    }

    #[test]
    fn expand_command_empty() {
        let result = Toolchain::expand_command(&[], &strings(&["main.c"]), "main", "/w");
        assert!(result.is_empty());
    }

    #[test]
    fn expand_value_placeholder_in_middle() {
        let result = Toolchain::expand_value("prefix-{binary}.jar", "Main.kt", "main", "/w");
        assert_eq!(result, "prefix-main.jar");
    }

    #[test]
    fn toolchain_is_compiled() {
        let compiled = Toolchain {
            compile: Some(CompileConfig {
                command: strings(&["g++"]),
                env: HashMap::new(),
                limits: None,
            }),
            run: RunConfig {
                command: strings(&["./{binary}"]),
                env: HashMap::new(),
                path: DEFAULT_SANDBOX_PATH.to_owned(),
                limits: None,
            },
        };
        assert!(compiled.is_compiled());

        let interpreted = Toolchain {
            compile: None,
            ..compiled
        };
        assert!(!interpreted.is_compiled());
    }
}
