use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU time limit in seconds
    #[serde(default)]
    pub time_limit: Option<f64>,

    /// Wall clock time limit in seconds
    #[serde(default)]
    pub wall_time_limit: Option<f64>,

    /// Memory limit in kilobytes
    #[serde(default)]
    pub memory_limit: Option<u64>,

    /// Stack size limit in kilobytes
    #[serde(default)]
    pub stack_limit: Option<u64>,

    /// Maximum number of processes/threads (enforced under cgroup isolation)
    #[serde(default)]
    pub max_processes: Option<u32>,

    /// Maximum captured size of stdout and of stderr, each, in kilobytes
    #[serde(default)]
    pub max_output: Option<u64>,

    /// Maximum open files
    #[serde(default)]
    pub max_open_files: Option<u32>,
}

impl ResourceLimits {
    /// 1 kilobyte in bytes
    pub const KB: u64 = 1;
    /// 1 megabyte in kilobytes
    pub const MB: u64 = 1024;
    /// 1 gigabyte in kilobytes
    pub const GB: u64 = 1024 * 1024;

    /// Captured output cap used when no `max_output` is configured
    pub const DEFAULT_OUTPUT_CAP_KB: u64 = 8 * Self::MB;

    /// Create new resource limits with the default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits with every field unset, useful as an override base
    pub fn unset() -> Self {
        Self {
            time_limit: None,
            wall_time_limit: None,
            memory_limit: None,
            stack_limit: None,
            max_processes: None,
            max_output: None,
            max_open_files: None,
        }
    }

    /// Set the CPU time limit in seconds
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    /// Set the wall clock time limit in seconds
    pub fn with_wall_time_limit(mut self, seconds: f64) -> Self {
        self.wall_time_limit = Some(seconds);
        self
    }

    /// Set the memory limit in kilobytes
    pub fn with_memory_limit(mut self, kb: u64) -> Self {
        self.memory_limit = Some(kb);
        self
    }

    /// Set the stack size limit in kilobytes
    pub fn with_stack_limit(mut self, kb: u64) -> Self {
        self.stack_limit = Some(kb);
        self
    }

    /// Set the maximum number of processes
    pub fn with_max_processes(mut self, count: u32) -> Self {
        self.max_processes = Some(count);
        self
    }

    /// Set the maximum output size in kilobytes
    pub fn with_max_output(mut self, kb: u64) -> Self {
        self.max_output = Some(kb);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    ///
    /// Returns a new ResourceLimits with values from `overrides` taking precedence
    /// over values from `self` when both are present.
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            time_limit: overrides.time_limit.or(self.time_limit),
            wall_time_limit: overrides.wall_time_limit.or(self.wall_time_limit),
            memory_limit: overrides.memory_limit.or(self.memory_limit),
            stack_limit: overrides.stack_limit.or(self.stack_limit),
            max_processes: overrides.max_processes.or(self.max_processes),
            max_output: overrides.max_output.or(self.max_output),
            max_open_files: overrides.max_open_files.or(self.max_open_files),
        }
    }

    /// Wall clock deadline, if one is configured
    pub fn wall_time(&self) -> Option<Duration> {
        self.wall_time_limit
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Wall clock limit in milliseconds, as reported on timeouts
    pub fn wall_time_ms(&self) -> f64 {
        self.wall_time_limit.unwrap_or(0.0) * 1000.0
    }

    /// CPU time limit in milliseconds, rounded up to whole seconds as
    /// `RLIMIT_CPU` enforces it
    pub fn cpu_time_ms(&self) -> Option<f64> {
        self.time_limit
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| secs.ceil() * 1000.0)
    }

    /// Output capture cap in bytes
    pub fn output_cap_bytes(&self) -> usize {
        let kb = self.max_output.unwrap_or(Self::DEFAULT_OUTPUT_CAP_KB);
        usize::try_from(kb.saturating_mul(1024)).unwrap_or(usize::MAX)
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit: Some(10.0),
            wall_time_limit: Some(10.0),
            memory_limit: Some(524288), // 512 MB
            stack_limit: Some(65536),   // 64 MB
            max_processes: Some(64),
            max_output: Some(8192), // 8 MB
            max_open_files: Some(256),
        }
    }
}

/// Substrings that toolchains print when an allocation fails
const OUT_OF_MEMORY_MARKERS: [&str; 9] = [
    "MemoryError",
    "std::bad_alloc",
    "java.lang.OutOfMemoryError",
    "JavaScript heap out of memory",
    "runtime: out of memory",
    "memory allocation of",
    "Cannot allocate memory",
    "out of memory",
    "Out of memory",
];

/// Result of one process invocation inside a workspace
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    /// Exit code if the program exited normally
    pub exit_code: Option<i32>,

    /// Signal number if the program was killed by a signal
    pub signal: Option<i32>,

    /// Captured standard output, capped
    pub stdout: Vec<u8>,

    /// Captured standard error, capped
    pub stderr: Vec<u8>,

    /// Wall clock time in milliseconds
    pub wall_time_ms: f64,

    /// The wall clock deadline fired and the process group was killed
    pub timed_out: bool,

    /// The kernel killed the program for using up its CPU time
    pub cpu_time_exceeded: bool,

    /// The memory ceiling was hit
    pub memory_exceeded: bool,

    /// Peak resident memory of the whole process tree in kilobytes
    pub peak_memory_kb: u64,

    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl ExecutionOutcome {
    /// Check if the process exited with code 0 within its limits
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.time_limit_hit() && !self.memory_exceeded && self.exit_code == Some(0)
    }

    /// Either the wall clock deadline or the CPU time limit was hit
    pub fn time_limit_hit(&self) -> bool {
        self.timed_out || self.cpu_time_exceeded
    }

    /// The limit that stopped the program, in milliseconds
    pub fn exceeded_limit_ms(&self, limits: &ResourceLimits) -> f64 {
        match limits.cpu_time_ms() {
            Some(cpu_ms) if self.cpu_time_exceeded => cpu_ms,
            _ => limits.wall_time_ms(),
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Flag `memory_exceeded` when the evidence says the ceiling was hit.
    ///
    /// Under address-space limiting the kernel does not report the cause of a
    /// failed allocation, so a failed run is also checked for the messages
    /// runtimes print when an allocation fails.
    pub fn detect_memory_limit(&mut self, limit_kb: u64) {
        if self.time_limit_hit() {
            return;
        }
        if self.peak_memory_kb >= limit_kb {
            self.memory_exceeded = true;
            return;
        }
        if self.exit_code != Some(0) {
            let stderr = String::from_utf8_lossy(&self.stderr);
            if OUT_OF_MEMORY_MARKERS
                .iter()
                .any(|marker| stderr.contains(marker))
            {
                self.memory_exceeded = true;
            }
        }
    }
}

/// A single test case submitted with a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: Value,

    #[serde(alias = "expectedOutput")]
    pub expected_output: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestCase {
    pub fn new(input: Value, expected_output: Value) -> Self {
        Self {
            input,
            expected_output,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// How a test result's verdict was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Deep equality on JSON values, reported by the harness
    #[default]
    Structural,

    /// Trimmed stdout compared with the expected value's string form
    RawText,
}

/// Result of a single test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub index: usize,
    pub input: Value,
    pub expected_output: Value,
    pub actual_output: Option<Value>,
    pub passed: bool,
    pub execution_time_ms: f64,
    pub memory_usage_kb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub comparison: Comparison,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestResult {
    /// A failed result for a case that produced no output
    pub fn failed(index: usize, case: &TestCase, error: impl Into<String>) -> Self {
        Self {
            index,
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            actual_output: None,
            passed: false,
            execution_time_ms: 0.0,
            memory_usage_kb: 0,
            error: Some(error.into()),
            comparison: Comparison::Structural,
            description: case.description.clone(),
        }
    }
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The program ran to completion; see the per-case verdicts
    Success,
    CompileError,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    UnsupportedLanguage,
    InternalError,
}

impl RunStatus {
    /// Whether the test cases were executed under this status
    pub fn executed(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

/// Result of a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub status: RunStatus,
    pub test_results: Vec<TestResult>,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub total_execution_time_ms: f64,
    pub max_memory_usage_kb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RunResult {
    /// A run that ended before any test case was executed
    pub fn not_executed(status: RunStatus, total_tests: usize, message: Option<String>) -> Self {
        Self {
            status,
            test_results: Vec::new(),
            total_tests,
            passed_tests: 0,
            total_execution_time_ms: 0.0,
            max_memory_usage_kb: 0,
            message,
        }
    }

    /// Aggregate per-case results into a run result
    pub fn from_results(test_results: Vec<TestResult>, message: Option<String>) -> Self {
        let passed_tests = test_results.iter().filter(|r| r.passed).count();
        let total_execution_time_ms = test_results.iter().map(|r| r.execution_time_ms).sum();
        let max_memory_usage_kb = test_results
            .iter()
            .map(|r| r.memory_usage_kb)
            .max()
            .unwrap_or(0);

        Self {
            status: RunStatus::Success,
            total_tests: test_results.len(),
            test_results,
            passed_tests,
            total_execution_time_ms,
            max_memory_usage_kb,
            message,
        }
    }

    /// Whether every test case passed
    pub fn all_passed(&self) -> bool {
        self.status == RunStatus::Success && self.passed_tests == self.total_tests
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // ResourceLimits tests

    #[test]
    fn resource_limits_default_has_all_fields() {
        let limits = ResourceLimits::default();
        assert!(limits.time_limit.is_some());
        assert!(limits.wall_time_limit.is_some());
        assert!(limits.memory_limit.is_some());
        assert!(limits.stack_limit.is_some());
        assert!(limits.max_processes.is_some());
        assert!(limits.max_output.is_some());
        assert!(limits.max_open_files.is_some());
    }

    #[test]
    fn resource_limits_builder_methods() {
        let limits = ResourceLimits::new()
            .with_time_limit(5.0)
            .with_wall_time_limit(10.0)
            .with_memory_limit(1024)
            .with_stack_limit(512)
            .with_max_processes(4)
            .with_max_output(2048);

        assert_eq!(limits.time_limit, Some(5.0));
        assert_eq!(limits.wall_time_limit, Some(10.0));
        assert_eq!(limits.memory_limit, Some(1024));
        assert_eq!(limits.stack_limit, Some(512));
        assert_eq!(limits.max_processes, Some(4));
        assert_eq!(limits.max_output, Some(2048));
    }

    #[test]
    fn with_overrides_unset_preserves_base() {
        let base = ResourceLimits::default();
        let result = base.with_overrides(&ResourceLimits::unset());
        assert_eq!(result, base);
    }

    #[test]
    fn with_overrides_partial_override() {
        let base = ResourceLimits {
            time_limit: Some(2.0),
            memory_limit: Some(256 * ResourceLimits::MB),
            max_processes: None,
            ..Default::default()
        };
        let overrides = ResourceLimits::unset()
            .with_time_limit(5.0)
            .with_max_processes(4);

        let result = base.with_overrides(&overrides);
        assert_eq!(result.time_limit, Some(5.0));
        assert_eq!(result.memory_limit, Some(256 * ResourceLimits::MB));
        assert_eq!(result.max_processes, Some(4));
    }

    #[test]
    fn wall_time_ignores_non_positive_values() {
        assert_eq!(
            ResourceLimits::unset().with_wall_time_limit(0.0).wall_time(),
            None
        );
        assert_eq!(
            ResourceLimits::unset().with_wall_time_limit(-1.0).wall_time(),
            None
        );
        assert_eq!(
            ResourceLimits::unset().with_wall_time_limit(1.5).wall_time(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn output_cap_defaults_when_unset() {
        assert_eq!(
            ResourceLimits::unset().output_cap_bytes(),
            8 * 1024 * 1024
        );
        assert_eq!(
            ResourceLimits::unset().with_max_output(1).output_cap_bytes(),
            1024
        );
    }

    // ExecutionOutcome tests

    #[test]
    fn outcome_success_requires_zero_exit() {
        let ok = ExecutionOutcome {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(ok.is_success());

        let failed = ExecutionOutcome {
            exit_code: Some(1),
            ..Default::default()
        };
        assert!(!failed.is_success());

        let timed_out = ExecutionOutcome {
            exit_code: Some(0),
            timed_out: true,
            ..Default::default()
        };
        assert!(!timed_out.is_success());
    }

    #[test]
    fn cpu_limit_reports_the_cpu_limit() {
        let limits = ResourceLimits::unset()
            .with_time_limit(1.2)
            .with_wall_time_limit(5.0);
        let mut outcome = ExecutionOutcome {
            signal: Some(24),
            cpu_time_exceeded: true,
            peak_memory_kb: 4096,
            ..Default::default()
        };
        assert!(outcome.time_limit_hit());
        assert!(!outcome.is_success());
        assert_eq!(outcome.exceeded_limit_ms(&limits), 2000.0);

        outcome.detect_memory_limit(1024);
        assert!(!outcome.memory_exceeded);

        outcome.cpu_time_exceeded = false;
        outcome.timed_out = true;
        assert_eq!(outcome.exceeded_limit_ms(&limits), 5000.0);
    }

    #[test]
    fn detect_memory_limit_from_peak() {
        let mut outcome = ExecutionOutcome {
            exit_code: Some(0),
            peak_memory_kb: 2048,
            ..Default::default()
        };
        outcome.detect_memory_limit(1024);
        assert!(outcome.memory_exceeded);
    }

    #[test]
    fn detect_memory_limit_from_stderr_marker() {
        let mut outcome = ExecutionOutcome {
            exit_code: Some(1),
            stderr: b"Traceback (most recent call last):\nMemoryError\n".to_vec(),
            ..Default::default()
        };
        outcome.detect_memory_limit(1024 * 1024);
        assert!(outcome.memory_exceeded);
    }

    #[test]
    fn detect_memory_limit_ignores_markers_on_success() {
        let mut outcome = ExecutionOutcome {
            exit_code: Some(0),
            stderr: b"MemoryError mentioned in a log line".to_vec(),
            ..Default::default()
        };
        outcome.detect_memory_limit(1024 * 1024);
        assert!(!outcome.memory_exceeded);
    }

    #[test]
    fn detect_memory_limit_skips_timeouts() {
        let mut outcome = ExecutionOutcome {
            timed_out: true,
            peak_memory_kb: 4096,
            ..Default::default()
        };
        outcome.detect_memory_limit(1024);
        assert!(!outcome.memory_exceeded);
    }

    // Test case and result tests

    #[test]
    fn test_case_accepts_both_expected_output_spellings() {
        let snake: TestCase =
            serde_json::from_value(json!({"input": 1, "expected_output": 2})).unwrap();
        let camel: TestCase =
            serde_json::from_value(json!({"input": 1, "expectedOutput": 2})).unwrap();
        assert_eq!(snake, camel);
        assert_eq!(snake.description, None);
    }

    #[test]
    fn run_result_aggregates() {
        let case = TestCase::new(json!(1), json!(1));
        let mut first = TestResult::failed(0, &case, "boom");
        first.execution_time_ms = 1.5;
        first.memory_usage_kb = 100;
        let mut second = TestResult::failed(1, &case, "");
        second.passed = true;
        second.error = None;
        second.execution_time_ms = 2.5;
        second.memory_usage_kb = 300;

        let run = RunResult::from_results(vec![first, second], None);
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.total_tests, 2);
        assert_eq!(run.passed_tests, 1);
        assert_eq!(run.total_execution_time_ms, 4.0);
        assert_eq!(run.max_memory_usage_kb, 300);
        assert!(!run.all_passed());
    }

    #[test]
    fn run_result_not_executed_has_no_results() {
        let run = RunResult::not_executed(RunStatus::CompileError, 3, Some("oops".into()));
        assert_eq!(run.total_tests, 3);
        assert_eq!(run.passed_tests, 0);
        assert!(run.test_results.is_empty());
        assert!(!run.status.executed());
    }

    #[test]
    fn run_result_serializes_camel_case() {
        let run = RunResult::not_executed(RunStatus::TimeLimitExceeded, 1, None);
        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["status"], "time_limit_exceeded");
        assert_eq!(value["totalTests"], 1);
        assert_eq!(value["passedTests"], 0);
        assert!(value.get("message").is_none());
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn with_overrides_identity(
            time in proptest::option::of(0.0f64..1000.0),
            wall_time in proptest::option::of(0.0f64..1000.0),
            memory in proptest::option::of(0u64..1_000_000),
            stack in proptest::option::of(0u64..1_000_000),
            procs in proptest::option::of(0u32..100),
            output in proptest::option::of(0u64..1_000_000),
            open_files in proptest::option::of(0u32..1000),
        ) {
            let base = ResourceLimits {
                time_limit: time,
                wall_time_limit: wall_time,
                memory_limit: memory,
                stack_limit: stack,
                max_processes: procs,
                max_output: output,
                max_open_files: open_files,
            };

            let result = base.with_overrides(&ResourceLimits::unset());
            prop_assert_eq!(result, base);
        }

        #[test]
        fn detect_memory_limit_never_panics(stderr in ".*", code in proptest::option::of(-5i32..5)) {
            let mut outcome = ExecutionOutcome {
                exit_code: code,
                stderr: stderr.into_bytes(),
                ..Default::default()
            };
            outcome.detect_memory_limit(1024);
        }
    }
}
