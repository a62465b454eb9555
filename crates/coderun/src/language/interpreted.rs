//! Adapters for interpreted languages
//!
//! These run the entry file through an interpreter; there is no compile step
//! unless the configuration adds one.

use async_trait::async_trait;

use crate::config::Toolchain;
use crate::harness::{Program, SourceRole};
use crate::language::{LanguageAdapter, Materialized, SupportedLanguage};
use crate::sandbox::{SandboxError, Workspace};

#[derive(Debug, Clone)]
pub struct PythonAdapter {
    toolchain: Toolchain,
}

impl PythonAdapter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Python
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn file_name(&self, _role: SourceRole) -> &'static str {
        "main.py"
    }
}

#[derive(Debug, Clone)]
pub struct JavaScriptAdapter {
    toolchain: Toolchain,
}

impl JavaScriptAdapter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl LanguageAdapter for JavaScriptAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::JavaScript
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn file_name(&self, _role: SourceRole) -> &'static str {
        "main.js"
    }
}

/// Bash scripts are written with a shebang line and the executable bit set,
/// so a toolchain may run them either as `./main.sh` or through `bash`.
#[derive(Debug, Clone)]
pub struct BashAdapter {
    toolchain: Toolchain,
}

impl BashAdapter {
    const SHEBANG: &'static str = "#!/usr/bin/env bash\n";

    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

#[async_trait]
impl LanguageAdapter for BashAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Bash
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn file_name(&self, _role: SourceRole) -> &'static str {
        "main.sh"
    }

    async fn materialize(
        &self,
        workspace: &Workspace,
        program: &Program,
    ) -> Result<Materialized, SandboxError> {
        let name = self.file_name(SourceRole::Entry);
        let mut script = String::with_capacity(program.entry().contents.len() + Self::SHEBANG.len());
        if !program.entry().contents.starts_with("#!") {
            script.push_str(Self::SHEBANG);
        }
        script.push_str(&program.entry().contents);

        workspace.write_file(name, script.as_bytes()).await?;
        workspace.set_executable(name).await?;
        Ok(Materialized::new(vec![name.to_owned()]))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::os::unix::fs::PermissionsExt;

    use super::*;
    use crate::config::{DEFAULT_SANDBOX_PATH, RunConfig};

    fn bash_toolchain() -> Toolchain {
        Toolchain {
            compile: None,
            run: RunConfig {
                command: vec!["bash".to_owned(), "{source}".to_owned()],
                env: HashMap::new(),
                path: DEFAULT_SANDBOX_PATH.to_owned(),
                limits: None,
            },
        }
    }

    #[tokio::test]
    async fn bash_materialize_adds_shebang_and_exec_bit() {
        let workspace = Workspace::create(&std::env::temp_dir()).await.unwrap();
        let adapter = BashAdapter::new(bash_toolchain());

        let materialized = adapter
            .materialize(&workspace, &Program::new("echo hi\n"))
            .await
            .unwrap();
        assert_eq!(materialized.primary(), "main.sh");

        let path = materialized.primary_path(&workspace);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "#!/usr/bin/env bash\necho hi\n");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o100, 0o100);

        workspace.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn bash_materialize_keeps_existing_shebang() {
        let workspace = Workspace::create(&std::env::temp_dir()).await.unwrap();
        let adapter = BashAdapter::new(bash_toolchain());

        let materialized = adapter
            .materialize(&workspace, &Program::new("#!/bin/sh\necho hi\n"))
            .await
            .unwrap();
        let contents = std::fs::read_to_string(materialized.primary_path(&workspace)).unwrap();
        assert_eq!(contents, "#!/bin/sh\necho hi\n");

        workspace.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn run_command_uses_interpreter() {
        let workspace = Workspace::create(&std::env::temp_dir()).await.unwrap();
        let adapter = BashAdapter::new(bash_toolchain());
        let materialized = adapter
            .materialize(&workspace, &Program::new("true"))
            .await
            .unwrap();

        assert!(adapter.compile_command(&workspace, &materialized).is_none());
        let spec = adapter.run_command(&workspace, &materialized);
        assert_eq!(spec.program, "bash");
        assert_eq!(spec.args, vec!["main.sh"]);
        assert_eq!(spec.working_dir, workspace.path());

        workspace.cleanup().await.unwrap();
    }
}
