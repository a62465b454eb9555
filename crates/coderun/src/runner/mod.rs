//! Test orchestration
//!
//! The [`Engine`] turns a submission into a [`RunResult`]: it resolves the
//! language adapter, generates the harness, drives the sandbox and grades
//! the harness report. Every failure on the way, including a panic inside
//! the engine, comes back as a `RunResult` status rather than an error.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

pub use crate::runner::report::{
    HarnessEntry, RAW_FALLBACK_MESSAGE, assemble, json_equal, parse_report, raw_fallback,
};

mod report;

use crate::config::{Config, HarnessMode, MemoryIsolation};
use crate::harness::{HarnessError, HarnessGenerator, Program};
use crate::language::{AdapterRegistry, LanguageAdapter, SupportedLanguage};
use crate::sandbox::{Isolation, Sandbox, SandboxError, SandboxOutcome, prepare_cgroup};
use crate::types::{ExecutionOutcome, ResourceLimits, RunResult, RunStatus, TestCase, TestResult};

/// Longest stderr excerpt carried in a run message
const MAX_MESSAGE_BYTES: usize = 4096;

/// Errors from [`Engine::run_once`]
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("language '{0}' is not supported")]
    UnsupportedLanguage(String),

    #[error("compilation failed:\n{0}")]
    Compile(String),

    #[error("time limit of {limit_ms} ms exceeded")]
    TimeLimit { limit_ms: f64 },

    #[error("memory limit exceeded")]
    MemoryLimit,

    #[error("{0}")]
    Runtime(String),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A graded run submission
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub code: String,
    pub language: SupportedLanguage,
    pub test_cases: Vec<TestCase>,
    /// Request-level overrides of the run limits
    pub limits: Option<ResourceLimits>,
}

impl RunRequest {
    pub fn new(code: impl Into<String>, language: SupportedLanguage, test_cases: Vec<TestCase>) -> Self {
        Self {
            code: code.into(),
            language,
            test_cases,
            limits: None,
        }
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// Output of an ungraded [`Engine::run_once`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOnceOutput {
    /// Stdout parsed as JSON, or the trimmed text if it is not JSON
    pub output: Value,
    pub execution_time_ms: f64,
    pub memory_usage_kb: u64,
}

#[derive(Debug)]
struct EngineInner {
    config: Config,
    registry: AdapterRegistry,
    harness: HarnessGenerator,
    sandbox: Sandbox,
    permits: Semaphore,
}

/// The execution engine
///
/// Cloning is cheap; clones share the adapter registry, the harness
/// generator and the bound on concurrent runs. Runs share nothing else.
#[derive(Debug, Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

/// Aborts the spawned run if the caller stops waiting for it
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Engine {
    /// Build an engine from configuration
    ///
    /// Under cgroup isolation the cgroup hierarchy is prepared here; if
    /// that fails every run uses rlimits instead.
    pub fn new(config: Config) -> Self {
        let isolation = match config.memory_isolation {
            MemoryIsolation::Rlimit => Isolation::Rlimit,
            MemoryIsolation::Cgroup => match prepare_cgroup(&config.cg_root) {
                Ok(true) => Isolation::Cgroup {
                    root: config.cg_root.clone(),
                },
                Ok(false) => {
                    warn!("cgroup v2 memory controller unavailable, falling back to rlimit isolation");
                    Isolation::Rlimit
                }
                Err(e) => {
                    warn!(error = %e, cg_root = %config.cg_root.display(), "cgroup setup failed, falling back to rlimit isolation");
                    Isolation::Rlimit
                }
            },
        };
        let registry = AdapterRegistry::from_config(&config);
        let sandbox = Sandbox::new(config.workspace_root(), isolation);
        Self::with_parts(config, registry, HarnessGenerator::new(), sandbox)
    }

    /// Build an engine from explicitly constructed parts
    pub fn with_parts(
        config: Config,
        registry: AdapterRegistry,
        harness: HarnessGenerator,
        sandbox: Sandbox,
    ) -> Self {
        debug!(
            languages = ?registry.languages(),
            isolation = ?sandbox.isolation(),
            mode = ?config.harness_mode,
            "engine ready"
        );
        let permits = Semaphore::new(config.max_concurrent_runs.max(1));
        Self {
            inner: Arc::new(EngineInner {
                config,
                registry,
                harness,
                sandbox,
                permits,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.inner.registry
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.inner.sandbox
    }

    /// Run `code` against `test_cases` and grade it
    pub async fn submit_run(
        &self,
        code: &str,
        language: SupportedLanguage,
        test_cases: &[TestCase],
    ) -> RunResult {
        self.submit(RunRequest::new(code, language, test_cases.to_vec()))
            .await
    }

    /// [`submit_run`](Self::submit_run) with the language given as a tag
    pub async fn submit_run_tagged(&self, code: &str, tag: &str, test_cases: &[TestCase]) -> RunResult {
        match tag.parse::<SupportedLanguage>() {
            Ok(language) => self.submit_run(code, language, test_cases).await,
            Err(e) => RunResult::not_executed(
                RunStatus::UnsupportedLanguage,
                test_cases.len(),
                Some(e.to_string()),
            ),
        }
    }

    /// Run a request to completion
    ///
    /// The run executes on its own task. If the returned future is dropped
    /// the task is aborted, which kills its processes and removes its
    /// workspace.
    pub async fn submit(&self, request: RunRequest) -> RunResult {
        let total = request.test_cases.len();
        let engine = self.clone();
        let mut task = AbortOnDrop(tokio::spawn(async move { engine.run(request).await }));

        match (&mut task.0).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "run task failed");
                RunResult::not_executed(
                    RunStatus::InternalError,
                    total,
                    Some(format!("run aborted: {e}")),
                )
            }
        }
    }

    #[instrument(skip_all, fields(language = %request.language, cases = request.test_cases.len()))]
    async fn run(&self, request: RunRequest) -> RunResult {
        let total = request.test_cases.len();
        let Some(adapter) = self.inner.registry.get(request.language) else {
            return unsupported(request.language, total);
        };
        if !self.inner.harness.supports(request.language) {
            return unsupported(request.language, total);
        }

        let Ok(_permit) = self.inner.permits.acquire().await else {
            return RunResult::not_executed(
                RunStatus::InternalError,
                total,
                Some("engine is shutting down".to_owned()),
            );
        };

        let config = &self.inner.config;
        let compile_limits = config.effective_compile_limits(adapter.toolchain());
        let run_limits = config.effective_limits(adapter.toolchain(), request.limits.as_ref());

        let result = match config.harness_mode {
            HarnessMode::Batch => {
                self.run_batch(adapter.as_ref(), &request, &compile_limits, &run_limits)
                    .await
            }
            HarnessMode::PerCase => {
                self.run_per_case(adapter.as_ref(), &request, &compile_limits, &run_limits)
                    .await
            }
        };
        debug!(
            status = ?result.status,
            passed = result.passed_tests,
            total = result.total_tests,
            "run finished"
        );
        result
    }

    /// Every case in one generated program and one process
    async fn run_batch(
        &self,
        adapter: &dyn LanguageAdapter,
        request: &RunRequest,
        compile_limits: &ResourceLimits,
        run_limits: &ResourceLimits,
    ) -> RunResult {
        let cases = &request.test_cases;
        let total = cases.len();

        let program = match self.generate(request.language, &request.code, cases) {
            Ok(program) => program,
            Err(result) => return result,
        };
        let outcome = match self
            .inner
            .sandbox
            .execute(adapter, &program, None, compile_limits, run_limits)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return internal_error(total, &e),
        };

        match outcome {
            SandboxOutcome::CompileFailed { diagnostic } => {
                RunResult::not_executed(RunStatus::CompileError, total, Some(diagnostic))
            }
            SandboxOutcome::TimedOut(outcome) => RunResult {
                total_execution_time_ms: outcome.exceeded_limit_ms(run_limits),
                max_memory_usage_kb: outcome.peak_memory_kb,
                ..RunResult::not_executed(
                    RunStatus::TimeLimitExceeded,
                    total,
                    Some(time_limit_message(&outcome, run_limits)),
                )
            },
            SandboxOutcome::Crashed(outcome) => crashed(total, &outcome, run_limits),
            SandboxOutcome::Completed(outcome) => {
                let stdout = outcome.stdout_lossy();
                match parse_report(&stdout) {
                    Some(entries) => RunResult::from_results(
                        assemble(cases, entries, outcome.peak_memory_kb),
                        None,
                    ),
                    None => {
                        warn!(stdout_len = stdout.len(), "harness report not parseable, comparing raw output");
                        RunResult::from_results(
                            raw_fallback(cases, &stdout, outcome.wall_time_ms, outcome.peak_memory_kb),
                            Some(RAW_FALLBACK_MESSAGE.to_owned()),
                        )
                    }
                }
            }
        }
    }

    /// One generated program, workspace and process per case
    ///
    /// Timeouts and crashes fail only their own case.
    async fn run_per_case(
        &self,
        adapter: &dyn LanguageAdapter,
        request: &RunRequest,
        compile_limits: &ResourceLimits,
        run_limits: &ResourceLimits,
    ) -> RunResult {
        let cases = &request.test_cases;
        let total = cases.len();
        let mut results = Vec::with_capacity(total);

        for (index, case) in cases.iter().enumerate() {
            let single = std::slice::from_ref(case);
            let program = match self.generate(request.language, &request.code, single) {
                Ok(program) => program,
                Err(result) => return result,
            };
            let outcome = match self
                .inner
                .sandbox
                .execute(adapter, &program, None, compile_limits, run_limits)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => return internal_error(total, &e),
            };

            let result = match outcome {
                SandboxOutcome::CompileFailed { diagnostic } => {
                    return RunResult::not_executed(RunStatus::CompileError, total, Some(diagnostic));
                }
                SandboxOutcome::TimedOut(outcome) => TestResult {
                    execution_time_ms: outcome.exceeded_limit_ms(run_limits),
                    memory_usage_kb: outcome.peak_memory_kb,
                    ..TestResult::failed(index, case, time_limit_message(&outcome, run_limits))
                },
                SandboxOutcome::Crashed(outcome) => {
                    let error = if outcome.memory_exceeded {
                        memory_limit_message(run_limits)
                    } else {
                        failure_message(&outcome)
                    };
                    TestResult {
                        execution_time_ms: outcome.wall_time_ms,
                        memory_usage_kb: outcome.peak_memory_kb,
                        ..TestResult::failed(index, case, error)
                    }
                }
                SandboxOutcome::Completed(outcome) => {
                    let stdout = outcome.stdout_lossy();
                    let graded = match parse_report(&stdout) {
                        Some(entries) => assemble(single, entries, outcome.peak_memory_kb),
                        None => raw_fallback(single, &stdout, outcome.wall_time_ms, outcome.peak_memory_kb),
                    };
                    graded
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| TestResult::failed(index, case, "no result reported"))
                }
            };
            results.push(TestResult { index, ..result });
        }

        RunResult::from_results(results, None)
    }

    fn generate(
        &self,
        language: SupportedLanguage,
        code: &str,
        cases: &[TestCase],
    ) -> Result<Program, RunResult> {
        self.inner
            .harness
            .generate(language, code, cases)
            .map_err(|e| match e {
                HarnessError::UnsupportedLanguage(language) => unsupported(language, cases.len()),
                other => RunResult::not_executed(
                    RunStatus::InternalError,
                    cases.len(),
                    Some(format!("harness generation failed: {other}")),
                ),
            })
    }

    /// Run `code` as a complete program with `input` as JSON on stdin
    ///
    /// No harness is generated and nothing is graded.
    #[instrument(skip(self, code, input))]
    pub async fn run_once(
        &self,
        code: &str,
        language: SupportedLanguage,
        input: &Value,
    ) -> Result<RunOnceOutput, EngineError> {
        let adapter = self
            .inner
            .registry
            .get(language)
            .ok_or_else(|| EngineError::UnsupportedLanguage(language.to_string()))?;
        let stdin = serde_json::to_vec(input).map_err(|e| EngineError::Internal(e.to_string()))?;

        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        let config = &self.inner.config;
        let compile_limits = config.effective_compile_limits(adapter.toolchain());
        let run_limits = config.effective_limits(adapter.toolchain(), None);
        let program = Program::new(code);

        let outcome = self
            .inner
            .sandbox
            .execute(adapter.as_ref(), &program, Some(&stdin), &compile_limits, &run_limits)
            .await?;

        match outcome {
            SandboxOutcome::CompileFailed { diagnostic } => Err(EngineError::Compile(diagnostic)),
            SandboxOutcome::TimedOut(outcome) => Err(EngineError::TimeLimit {
                limit_ms: outcome.exceeded_limit_ms(&run_limits),
            }),
            SandboxOutcome::Crashed(outcome) if outcome.memory_exceeded => Err(EngineError::MemoryLimit),
            SandboxOutcome::Crashed(outcome) => Err(EngineError::Runtime(failure_message(&outcome))),
            SandboxOutcome::Completed(outcome) => {
                let stdout = outcome.stdout_lossy();
                let text = stdout.trim();
                let output = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()));
                Ok(RunOnceOutput {
                    output,
                    execution_time_ms: outcome.wall_time_ms,
                    memory_usage_kb: outcome.peak_memory_kb,
                })
            }
        }
    }
}

fn unsupported(language: SupportedLanguage, total: usize) -> RunResult {
    RunResult::not_executed(
        RunStatus::UnsupportedLanguage,
        total,
        Some(format!("language '{language}' is not supported")),
    )
}

fn internal_error(total: usize, err: &SandboxError) -> RunResult {
    error!(error = %err, "sandbox failure");
    RunResult::not_executed(RunStatus::InternalError, total, Some(err.to_string()))
}

fn crashed(total: usize, outcome: &ExecutionOutcome, limits: &ResourceLimits) -> RunResult {
    let (status, message) = if outcome.memory_exceeded {
        (RunStatus::MemoryLimitExceeded, memory_limit_message(limits))
    } else {
        (RunStatus::RuntimeError, failure_message(outcome))
    };
    RunResult {
        total_execution_time_ms: outcome.wall_time_ms,
        max_memory_usage_kb: outcome.peak_memory_kb,
        ..RunResult::not_executed(status, total, Some(message))
    }
}

fn time_limit_message(outcome: &ExecutionOutcome, limits: &ResourceLimits) -> String {
    format!("time limit of {} ms exceeded", outcome.exceeded_limit_ms(limits))
}

fn memory_limit_message(limits: &ResourceLimits) -> String {
    match limits.memory_limit {
        Some(kb) => format!("memory limit of {kb} KB exceeded"),
        None => "memory limit exceeded".to_owned(),
    }
}

/// How the program failed, with the end of its stderr
fn failure_message(outcome: &ExecutionOutcome) -> String {
    let status = match (outcome.exit_code, outcome.signal) {
        (Some(code), _) => format!("program exited with status {code}"),
        (None, Some(signal)) => format!("program killed by signal {signal}"),
        (None, None) => "program failed".to_owned(),
    };
    let stderr = outcome.stderr_lossy();
    let stderr = tail(stderr.trim(), MAX_MESSAGE_BYTES);
    if stderr.is_empty() {
        status
    } else {
        format!("{status}\n{stderr}")
    }
}

/// The last `max` bytes of `text`, cut at a character boundary
fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
