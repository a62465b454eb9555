use coderun::{EngineError, SupportedLanguage};
use serde_json::json;

use super::{assert_workspaces_removed, require, test_engine};

#[tokio::test]
async fn test_run_once_reads_json_from_stdin() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();
    let code = "import json, sys\n\ndata = json.load(sys.stdin)\nprint(json.dumps({'sum': sum(data['nums'])}))\n";

    let output = engine
        .run_once(code, SupportedLanguage::Python, &json!({"nums": [1, 2, 3]}))
        .await
        .expect("run_once failed");

    assert_eq!(output.output, json!({"sum": 6}));
    assert!(output.execution_time_ms > 0.0);
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_run_once_returns_plain_text() {
    if !require(SupportedLanguage::JavaScript) {
        return;
    }
    let engine = test_engine();

    let output = engine
        .run_once("console.log('hello there');", SupportedLanguage::JavaScript, &json!(null))
        .await
        .expect("run_once failed");

    assert_eq!(output.output, json!("hello there"));
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_run_once_compiles_first() {
    if !require(SupportedLanguage::Rust) {
        return;
    }
    let engine = test_engine();
    let code = "use std::io::Read;\n\nfn main() {\n    let mut s = String::new();\n    std::io::stdin().read_to_string(&mut s).unwrap();\n    println!(\"{}\", s.trim().len());\n}\n";

    let output = engine
        .run_once(code, SupportedLanguage::Rust, &json!("abc"))
        .await
        .expect("run_once failed");

    // "abc" arrives with its quotes
    assert_eq!(output.output, json!(5));
    assert_workspaces_removed(&engine);
}

#[tokio::test]
async fn test_run_once_errors() {
    if !require(SupportedLanguage::Python) {
        return;
    }
    let engine = test_engine();

    let crashed = engine
        .run_once("raise SystemExit('bad input')", SupportedLanguage::Python, &json!(1))
        .await;
    assert!(matches!(crashed, Err(EngineError::Runtime(message)) if message.contains("bad input")));

    let mut limits_engine_config = engine.config().clone();
    limits_engine_config.default_limits.wall_time_limit = Some(0.5);
    let slow = coderun::Engine::new(limits_engine_config);
    let timed_out = slow
        .run_once("while True:\n    pass\n", SupportedLanguage::Python, &json!(1))
        .await;
    assert!(matches!(timed_out, Err(EngineError::TimeLimit { .. })));

    assert_workspaces_removed(&engine);
}
