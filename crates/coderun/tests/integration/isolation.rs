//! Runs must not see each other, the host environment, or outlive themselves

use coderun::{RunStatus, SupportedLanguage, TestCase};
use serde_json::json;

use super::{assert_workspaces_removed, require, test_engine};

const PYTHON_SENTINEL: &str = r#"import os, time

def solve(input):
    with open("mine-%d" % input, "w") as f:
        f.write(str(input))
    time.sleep(0.3)
    return sorted(name for name in os.listdir(".") if name.startswith("mine-"))
"#;

const JAVASCRIPT_SENTINEL: &str = r#"const fs = require("fs");

function solve(input) {
    fs.writeFileSync(`mine-${input}`, String(input));
    const until = Date.now() + 300;
    while (Date.now() < until) {}
    return fs.readdirSync(".").filter((name) => name.startsWith("mine-")).sort();
}
"#;

const BASH_SENTINEL: &str = r#"solve() {
    printf '%s' "$1" > "mine-$1"
    sleep 0.3
    local names=(mine-*) joined
    joined=$(printf '"%s",' "${names[@]}")
    printf '[%s]\n' "${joined%,}"
}
"#;

#[tokio::test]
async fn test_concurrent_runs_in_different_languages_get_private_workspaces() {
    let mut jobs = Vec::new();
    for (language, code) in [
        (SupportedLanguage::Python, PYTHON_SENTINEL),
        (SupportedLanguage::JavaScript, JAVASCRIPT_SENTINEL),
        (SupportedLanguage::Bash, BASH_SENTINEL),
    ] {
        if require(language) {
            jobs.push((language, code));
        }
    }
    if jobs.len() < 2 {
        eprintln!("skipping: fewer than two languages available");
        return;
    }
    let engine = test_engine();

    let mut runs = tokio::task::JoinSet::new();
    for n in 0..6 {
        let (language, code) = jobs[n % jobs.len()];
        let engine = engine.clone();
        runs.spawn(async move {
            let cases = vec![TestCase::new(json!(n), json!([format!("mine-{n}")]))];
            (language, engine.submit_run(code, language, &cases).await)
        });
    }

    while let Some(joined) = runs.join_next().await {
        let (language, result) = joined.unwrap();
        assert_eq!(result.status, RunStatus::Success, "{language}: {:?}", result.message);
        assert!(result.all_passed(), "{language}: {:#?}", result.test_results);
    }
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_host_environment_is_not_inherited() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "import os\n\ndef solve(input):\n    return input in os.environ\n";
    let cases = vec![
        TestCase::new(json!("CARGO_MANIFEST_DIR"), json!(false)),
        TestCase::new(json!("PATH"), json!(true)),
    ];

    let result = engine.submit_run(code, SupportedLanguage::Python, &cases).await;

    assert!(result.all_passed(), "{:#?}", result.test_results);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_background_children_are_killed() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = r#"import subprocess

def solve(input):
    child = subprocess.Popen(["sleep", "30"], start_new_session=False)
    return child.pid
"#;

    let result = engine
        .submit_run(code, SupportedLanguage::Python, &[TestCase::new(json!(null), json!(0))])
        .await;

    assert_eq!(result.status, RunStatus::Success);
    let pid = result.test_results[0]
        .actual_output
        .as_ref()
        .and_then(|value| value.as_i64())
        .expect("solution reports the child pid");

    let mut gone = false;
    for _ in 0..100 {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => gone = true,
            Ok(stat) => gone = stat[stat.rfind(')').unwrap_or(0)..].starts_with(") Z"),
        }
        if gone {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(gone, "background child {pid} outlived the run");
    assert_workspaces_removed(&engine);
}
