//! Run-level statuses produced by real programs

use std::time::{Duration, Instant};

use coderun::{
    Config, Engine, HarnessMode, ResourceLimits, RunRequest, RunStatus, SupportedLanguage, TestCase,
};
use serde_json::json;

use super::{
    assert_workspaces_removed, fixture_cases, fixture_source, require, require_nlohmann, test_config,
    test_engine,
};

fn one_case() -> Vec<TestCase> {
    vec![TestCase::new(json!(1), json!(1))]
}

#[tokio::test]
async fn test_infinite_loop_is_time_limit_exceeded() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "def solve(input):\n    while True:\n        pass\n";
    let request = RunRequest::new(code, SupportedLanguage::Python, fixture_cases("two_sum.json"))
        .with_limits(ResourceLimits::unset().with_wall_time_limit(1.0));

    let started = Instant::now();
    let result = engine.submit(request).await;

    assert_eq!(result.status, RunStatus::TimeLimitExceeded);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.total_tests, 3);
    assert_eq!(result.passed_tests, 0);
    assert!(result.test_results.is_empty());
    assert_eq!(result.total_execution_time_ms, 1000.0);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_syntax_error_is_a_runtime_error() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "def solve(input)\n    return input\n";

    let result = engine
        .submit_run(code, SupportedLanguage::Python, &one_case())
        .await;

    assert_eq!(result.status, RunStatus::RuntimeError);
    assert!(result.message.unwrap().contains("SyntaxError"));
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_exit_from_solution_is_a_runtime_error() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "import os\n\ndef solve(input):\n    os._exit(3)\n";

    let result = engine
        .submit_run(code, SupportedLanguage::Python, &one_case())
        .await;

    assert_eq!(result.status, RunStatus::RuntimeError);
    assert!(result.message.unwrap().starts_with("program exited with status 3"));
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_huge_allocation_is_memory_limit_exceeded() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "def solve(input):\n    return len(bytearray(4 << 30))\n";
    let request = RunRequest::new(code, SupportedLanguage::Python, one_case())
        .with_limits(ResourceLimits::unset().with_memory_limit(256 * ResourceLimits::MB));

    let result = engine.submit(request).await;

    assert_eq!(result.status, RunStatus::MemoryLimitExceeded, "{:?}", result.message);
    assert_eq!(result.passed_tests, 0);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_cpp_compile_error() {
    if !(require(SupportedLanguage::Cpp) && require_nlohmann()) {
        return;
    }
    let engine = test_engine();
    let code = fixture_source("compile_error.cpp");

    let result = engine
        .submit_run(&code, SupportedLanguage::Cpp, &fixture_cases("two_sum.json"))
        .await;

    assert_eq!(result.status, RunStatus::CompileError);
    assert_eq!(result.total_tests, 3);
    assert!(result.test_results.is_empty());
    let diagnostic = result.message.unwrap();
    assert!(diagnostic.contains("main.cpp"), "{diagnostic}");
    assert!(diagnostic.contains("error"), "{diagnostic}");
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_reserved_identifier_is_an_internal_error() {
    let engine = test_engine();
    let code = "def solve(input):\n    __harness_cases = []\n    return input\n";

    let result = engine
        .submit_run(code, SupportedLanguage::Python, &one_case())
        .await;

    assert_eq!(result.status, RunStatus::InternalError);
    assert!(result.message.unwrap().contains("__harness_"));
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_unconfigured_language_is_unsupported() {
    let mut config = test_config();
    config.languages.clear();
    let engine = Engine::new(config);

    let result = engine
        .submit_run("def solve(x): return x", SupportedLanguage::Python, &one_case())
        .await;

    assert_eq!(result.status, RunStatus::UnsupportedLanguage);
    assert_eq!(result.total_tests, 1);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_non_report_output_falls_back_to_text() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    // Exiting before the harness prints its report leaves only user output
    let code = "import os, sys\n\ndef solve(input):\n    os.write(1, b'hello\\n')\n    os._exit(0)\n";
    let cases = vec![
        TestCase::new(json!(null), json!("hello")),
        TestCase::new(json!(null), json!("hello")),
    ];

    let result = engine.submit_run(code, SupportedLanguage::Python, &cases).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.message.as_deref(), Some(coderun::runner::RAW_FALLBACK_MESSAGE));
    assert_eq!(result.test_results.len(), 2);
    assert!(result.test_results[0].passed);
    assert!(!result.test_results[1].passed);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_per_case_mode_contains_a_hang() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let mut config: Config = test_config();
    config.harness_mode = HarnessMode::PerCase;
    let engine = Engine::new(config);
    let code = "def solve(input):\n    while input == 2:\n        pass\n    return input\n";
    let cases = (1..=3).map(|n| TestCase::new(json!(n), json!(n))).collect();
    let request = RunRequest::new(code, SupportedLanguage::Python, cases)
        .with_limits(ResourceLimits::unset().with_wall_time_limit(1.0));

    let result = engine.submit(request).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.passed_tests, 2);
    assert!(result.test_results[0].passed);
    assert!(!result.test_results[1].passed);
    assert!(result.test_results[1].error.as_deref().unwrap().contains("time limit"));
    assert!(result.test_results[2].passed);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_solutions_can_start_threads_under_default_limits() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = r#"import threading

def solve(input):
    results = [0] * input
    def work(i):
        results[i] = i * i
    threads = [threading.Thread(target=work, args=(i,)) for i in range(input)]
    for thread in threads:
        thread.start()
    for thread in threads:
        thread.join()
    return results
"#;

    let result = engine
        .submit_run(code, SupportedLanguage::Python, &[TestCase::new(json!(4), json!([0, 1, 4, 9]))])
        .await;

    assert_eq!(result.status, RunStatus::Success, "{:?}", result.message);
    assert!(result.all_passed(), "{:#?}", result.test_results);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_multithreaded_spin_is_time_limit_exceeded() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = r#"import threading

def spin():
    while True:
        pass

def solve(input):
    for _ in range(2):
        threading.Thread(target=spin, daemon=True).start()
    spin()
"#;
    let request = RunRequest::new(code, SupportedLanguage::Python, one_case())
        .with_limits(ResourceLimits::unset().with_time_limit(1.0).with_wall_time_limit(5.0));

    let result = engine.submit(request).await;

    assert_eq!(result.status, RunStatus::TimeLimitExceeded, "{:?}", result.message);
    assert_workspaces_removed(&engine);
}
