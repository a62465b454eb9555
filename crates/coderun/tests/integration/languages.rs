//! Two-sum solved in every supported language through the real harnesses

use coderun::{Comparison, RunStatus, SupportedLanguage};
use serde_json::json;

use super::{
    assert_workspaces_removed, fixture_cases, fixture_source, require, require_nlohmann, test_engine,
};

async fn assert_two_sum_passes(language: SupportedLanguage, source: &str) {
    let engine = test_engine();
    let code = fixture_source(source);
    let cases = fixture_cases("two_sum.json");

    let result = engine.submit_run(&code, language, &cases).await;

    assert_eq!(result.status, RunStatus::Success, "{language}: {:?}", result.message);
    assert_eq!(result.total_tests, 3);
    assert_eq!(result.test_results.len(), 3);
    assert_eq!(result.passed_tests, 3, "{language}: {:#?}", result.test_results);
    for (index, test) in result.test_results.iter().enumerate() {
        assert_eq!(test.index, index);
        assert_eq!(test.input, cases[index].input);
        assert_eq!(test.actual_output, Some(cases[index].expected_output.clone()));
    }
    assert_eq!(result.test_results[2].description.as_deref(), Some("duplicate values"));

    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_python_two_sum() {
    if require(SupportedLanguage::Python) {
        assert_two_sum_passes(SupportedLanguage::Python, "two_sum.py").await;
    }
}

#[tokio::test]
async fn test_python_solution_class() {
    if require(SupportedLanguage::Python) {
        assert_two_sum_passes(SupportedLanguage::Python, "two_sum_class.py").await;
    }
}

#[tokio::test]
async fn test_javascript_two_sum() {
    if require(SupportedLanguage::JavaScript) {
        assert_two_sum_passes(SupportedLanguage::JavaScript, "two_sum.js").await;
    }
}

#[tokio::test]
async fn test_java_two_sum() {
    if require(SupportedLanguage::Java) {
        assert_two_sum_passes(SupportedLanguage::Java, "Solution.java").await;
    }
}

#[tokio::test]
async fn test_kotlin_two_sum() {
    if require(SupportedLanguage::Kotlin) {
        assert_two_sum_passes(SupportedLanguage::Kotlin, "Solution.kt").await;
    }
}

#[tokio::test]
async fn test_cpp_two_sum() {
    if require(SupportedLanguage::Cpp) && require_nlohmann() {
        assert_two_sum_passes(SupportedLanguage::Cpp, "two_sum.cpp").await;
    }
}

#[tokio::test]
async fn test_go_two_sum() {
    if require(SupportedLanguage::Go) {
        assert_two_sum_passes(SupportedLanguage::Go, "solution.go").await;
    }
}

#[tokio::test]
async fn test_rust_two_sum() {
    if require(SupportedLanguage::Rust) {
        assert_two_sum_passes(SupportedLanguage::Rust, "two_sum.rs").await;
    }
}

#[tokio::test]
async fn test_swift_two_sum() {
    if require(SupportedLanguage::Swift) {
        assert_two_sum_passes(SupportedLanguage::Swift, "two_sum.swift").await;
    }
}

#[cfg(target_os = "macos")]
#[tokio::test]
async fn test_objective_c_two_sum() {
    if require(SupportedLanguage::ObjectiveC) {
        assert_two_sum_passes(SupportedLanguage::ObjectiveC, "two_sum.m").await;
    }
}

#[tokio::test]
async fn test_bash_two_sum() {
    if !require(SupportedLanguage::Bash) {
        return;
    }
    let engine = test_engine();
    let code = fixture_source("two_sum.sh");
    let cases = fixture_cases("two_sum.json");

    let result = engine.submit_run(&code, SupportedLanguage::Bash, &cases).await;

    assert_eq!(result.status, RunStatus::Success, "{:?}", result.message);
    assert_eq!(result.passed_tests, 3, "{:#?}", result.test_results);
    // Bash reports what the function printed
    assert_eq!(result.test_results[0].actual_output, Some(json!("[0,1]")));
    assert_eq!(result.test_results[0].comparison, Comparison::Structural);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_wrong_answer_is_reported_per_case() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "def solve(input):\n    return [0, 1]\n";
    let cases = fixture_cases("two_sum.json");

    let result = engine.submit_run(code, SupportedLanguage::Python, &cases).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.passed_tests, 2);
    assert!(!result.test_results[1].passed);
    assert_eq!(result.test_results[1].actual_output, Some(json!([0, 1])));
    assert!(!result.all_passed());
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_numbers_compare_by_value() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "def solve(input):\n    return {'half': input['n'] / 2, 'flag': True}\n";
    let cases = vec![
        coderun::TestCase::new(json!({"n": 4}), json!({"flag": true, "half": 2})),
        coderun::TestCase::new(json!({"n": 2}), json!({"flag": 1, "half": 1})),
    ];

    let result = engine.submit_run(code, SupportedLanguage::Python, &cases).await;

    assert_eq!(result.status, RunStatus::Success);
    assert!(result.test_results[0].passed);
    assert!(!result.test_results[1].passed, "true must not equal 1");
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_raising_solution_fails_only_its_case() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "def solve(input):\n    if input == 0:\n        raise ValueError('zero')\n    return input\n";
    let cases = vec![
        coderun::TestCase::new(json!(1), json!(1)),
        coderun::TestCase::new(json!(0), json!(0)),
    ];

    let result = engine.submit_run(code, SupportedLanguage::Python, &cases).await;

    assert_eq!(result.status, RunStatus::Success);
    assert!(result.test_results[0].passed);
    assert!(!result.test_results[1].passed);
    assert!(result.test_results[1].error.as_deref().unwrap().contains("zero"));
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_identity_round_trips_in_every_language() {
    let identities: [(SupportedLanguage, &str); 9] = [
        (SupportedLanguage::Python, "def solve(input):\n    return input\n"),
        (SupportedLanguage::JavaScript, "function solve(input) {\n    return input;\n}\n"),
        (
            SupportedLanguage::Java,
            "class Solution {\n    public Object solve(Object input) {\n        return input;\n    }\n}\n",
        ),
        (
            SupportedLanguage::Kotlin,
            "class Solution {\n    fun solve(input: Any?): Any? = input\n}\n",
        ),
        (SupportedLanguage::Cpp, "json solve(const json& input) {\n    return input;\n}\n"),
        (SupportedLanguage::Go, "func solve(input interface{}) interface{} {\n\treturn input\n}\n"),
        (SupportedLanguage::Rust, "fn solve(input: &Value) -> Value {\n    input.clone()\n}\n"),
        (SupportedLanguage::Swift, "func solve(_ input: Any) -> Any {\n    return input\n}\n"),
        (SupportedLanguage::Bash, "solve() {\n    printf '%s\\n' \"$1\"\n}\n"),
    ];
    let value = json!({
        "name": "h\u{e9}llo \"quoted\"\n\ttab",
        "list": [1, -2, 3.5, true, null, []],
        "nested": {"empty": {}, "zero": 0}
    });
    let cases = vec![coderun::TestCase::new(value.clone(), value.clone())];

    let engine = test_engine();
    for (language, code) in identities {
        if !require(language) || (language == SupportedLanguage::Cpp && !require_nlohmann()) {
            continue;
        }
        let result = engine.submit_run(code, language, &cases).await;
        assert_eq!(result.status, RunStatus::Success, "{language}: {:?}", result.message);
        assert!(result.test_results[0].passed, "{language}: {:#?}", result.test_results[0]);
        if language != SupportedLanguage::Bash {
            assert_eq!(result.test_results[0].actual_output, Some(value.clone()), "{language}");
        }
    }
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_rust_keeps_large_unsigned_integers_exact() {
    if !require(SupportedLanguage::Rust) {
        return;
    }
    let engine = test_engine();
    let code = "fn solve(input: &Value) -> Value {\n    input.clone()\n}\n";
    let value = json!({"big": u64::MAX});
    let cases = vec![
        coderun::TestCase::new(value.clone(), value.clone()),
        coderun::TestCase::new(value.clone(), json!({"big": 1.8446744073709552e19})),
    ];

    let result = engine.submit_run(code, SupportedLanguage::Rust, &cases).await;

    assert_eq!(result.status, RunStatus::Success, "{:?}", result.message);
    assert!(result.test_results[0].passed, "{:#?}", result.test_results[0]);
    assert_eq!(result.test_results[0].actual_output, Some(value));
    assert!(!result.test_results[1].passed);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_solve_receives_the_whole_input_as_one_argument() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "def solve(input):\n    return [0, 1] if input['target'] == 9 else []\n";
    let cases = [coderun::TestCase::new(json!({"nums": [2, 7], "target": 9}), json!([0, 1]))];

    let result = engine.submit_run(code, SupportedLanguage::Python, &cases).await;

    assert!(result.all_passed(), "{:#?}", result.test_results);
    assert_workspaces_removed(&engine);
}
