//! Execution sandbox
//!
//! Each execution gets a fresh [`Workspace`], the program is materialized
//! and compiled there by its language adapter, and every process runs in
//! its own process group under the configured limits. The state machine per
//! execution is
//!
//! ```text
//! Created → [Compiling → CompileFailed | Compiled] → Running
//!         → Completed | TimedOut | Crashed → CleanedUp
//! ```
//!
//! Memory is bounded either by `RLIMIT_AS` on every process or by a cgroup
//! v2 child per process tree; the choice is made once for the whole sandbox.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use crate::sandbox::cgroup::prepare_cgroup;
pub use crate::sandbox::workspace::{WORKSPACE_PREFIX, Workspace};
use crate::harness::Program;
use crate::language::{LanguageAdapter, ProcessSpec};
use crate::sandbox::cgroup::ProcessCgroup;
use crate::sandbox::process::run_process;
use crate::types::{ExecutionOutcome, ResourceLimits};

mod cgroup;
mod limits;
mod memory;
mod process;
mod workspace;

/// Errors raised by the engine's own machinery, never by the program under test
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cgroup error: {0}")]
    Cgroup(String),
}

/// How memory and process counts are bounded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    /// `RLIMIT_AS` and friends on every process
    Rlimit,

    /// A cgroup per process tree, created under a prepared root
    Cgroup { root: PathBuf },
}

/// Stages of one execution, logged as they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Created,
    Compiling,
    CompileFailed,
    Compiled,
    Running,
    Completed,
    TimedOut,
    Crashed,
    CleanedUp,
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SandboxState::Created => "created",
            SandboxState::Compiling => "compiling",
            SandboxState::CompileFailed => "compile_failed",
            SandboxState::Compiled => "compiled",
            SandboxState::Running => "running",
            SandboxState::Completed => "completed",
            SandboxState::TimedOut => "timed_out",
            SandboxState::Crashed => "crashed",
            SandboxState::CleanedUp => "cleaned_up",
        };
        f.write_str(name)
    }
}

/// Terminal result of one execution
#[derive(Debug, Clone)]
pub enum SandboxOutcome {
    /// The compiler failed or ran out of time; nothing was run
    CompileFailed { diagnostic: String },

    /// The program exited with status 0 within its limits
    Completed(ExecutionOutcome),

    /// The wall clock deadline fired or the CPU time limit was used up
    TimedOut(ExecutionOutcome),

    /// Non-zero exit, death by signal, or the memory ceiling was hit
    Crashed(ExecutionOutcome),
}

impl SandboxOutcome {
    pub fn state(&self) -> SandboxState {
        match self {
            SandboxOutcome::CompileFailed { .. } => SandboxState::CompileFailed,
            SandboxOutcome::Completed(_) => SandboxState::Completed,
            SandboxOutcome::TimedOut(_) => SandboxState::TimedOut,
            SandboxOutcome::Crashed(_) => SandboxState::Crashed,
        }
    }
}

/// Runs programs in disposable workspaces
#[derive(Debug, Clone)]
pub struct Sandbox {
    workspace_root: PathBuf,
    isolation: Isolation,
}

impl Sandbox {
    pub fn new(workspace_root: impl Into<PathBuf>, isolation: Isolation) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            isolation,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn isolation(&self) -> &Isolation {
        &self.isolation
    }

    /// Materialize, compile and run `program` in a fresh workspace
    ///
    /// `stdin` is written to the run step only. The workspace is removed
    /// before this returns, and also if the returned future is dropped.
    #[instrument(skip_all, fields(language = %adapter.language()))]
    pub async fn execute(
        &self,
        adapter: &dyn LanguageAdapter,
        program: &Program,
        stdin: Option<&[u8]>,
        compile_limits: &ResourceLimits,
        run_limits: &ResourceLimits,
    ) -> Result<SandboxOutcome, SandboxError> {
        let workspace = Workspace::create(&self.workspace_root).await?;
        enter(SandboxState::Created);

        let result = self
            .execute_in(&workspace, adapter, program, stdin, compile_limits, run_limits)
            .await;

        if let Err(e) = workspace.cleanup().await {
            warn!(error = %e, "workspace cleanup failed");
        }
        enter(SandboxState::CleanedUp);
        result
    }

    async fn execute_in(
        &self,
        workspace: &Workspace,
        adapter: &dyn LanguageAdapter,
        program: &Program,
        stdin: Option<&[u8]>,
        compile_limits: &ResourceLimits,
        run_limits: &ResourceLimits,
    ) -> Result<SandboxOutcome, SandboxError> {
        let materialized = adapter.materialize(workspace, program).await?;

        if let Some(compile) = adapter.compile_command(workspace, &materialized) {
            enter(SandboxState::Compiling);
            let outcome = self.run_step(&compile, None, compile_limits).await?;
            if !outcome.is_success() {
                enter(SandboxState::CompileFailed);
                return Ok(SandboxOutcome::CompileFailed {
                    diagnostic: compile_diagnostic(&outcome, compile_limits),
                });
            }
            enter(SandboxState::Compiled);
        }

        enter(SandboxState::Running);
        let run = adapter.run_command(workspace, &materialized);
        let outcome = self.run_step(&run, stdin, run_limits).await?;

        let outcome = if outcome.time_limit_hit() {
            SandboxOutcome::TimedOut(outcome)
        } else if outcome.is_success() {
            SandboxOutcome::Completed(outcome)
        } else {
            SandboxOutcome::Crashed(outcome)
        };
        enter(outcome.state());
        Ok(outcome)
    }

    /// Run one process, inside its own cgroup under cgroup isolation
    async fn run_step(
        &self,
        spec: &ProcessSpec,
        stdin: Option<&[u8]>,
        limits: &ResourceLimits,
    ) -> Result<ExecutionOutcome, SandboxError> {
        match &self.isolation {
            Isolation::Rlimit => run_process(spec, stdin, limits, None).await,
            Isolation::Cgroup { root } => {
                let cgroup = ProcessCgroup::create(root, limits)?;
                let result = run_process(spec, stdin, limits, Some(&cgroup)).await;
                cgroup.remove().await;
                result
            }
        }
    }
}

fn enter(state: SandboxState) {
    debug!(%state, "sandbox state");
}

/// Compiler output for a failed compile step, stdout first
fn compile_diagnostic(outcome: &ExecutionOutcome, limits: &ResourceLimits) -> String {
    let mut text = outcome.stdout_lossy();
    let stderr = outcome.stderr_lossy();
    if !text.is_empty() && !stderr.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&stderr);

    let reason = if outcome.time_limit_hit() {
        Some(format!(
            "compilation timed out after {}s",
            limits.wall_time_limit.unwrap_or_default()
        ))
    } else if outcome.memory_exceeded {
        Some("compiler exceeded the memory limit".to_owned())
    } else if text.trim().is_empty() {
        Some(match (outcome.exit_code, outcome.signal) {
            (Some(code), _) => format!("compiler exited with status {code}"),
            (None, Some(signal)) => format!("compiler killed by signal {signal}"),
            (None, None) => "compiler failed".to_owned(),
        })
    } else {
        None
    };

    match reason {
        Some(reason) if text.trim().is_empty() => reason,
        Some(reason) => format!("{reason}\n{text}"),
        None => text,
    }
}
