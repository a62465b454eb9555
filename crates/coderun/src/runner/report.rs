//! Turning harness output into test results

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::harness::text_form;
use crate::types::{Comparison, TestCase, TestResult};

/// One element of the JSON array a harness prints
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessEntry {
    pub index: usize,

    #[serde(default)]
    pub actual_output: Value,

    /// Absent when the harness leaves the verdict to the engine
    #[serde(default)]
    pub passed: Option<bool>,

    #[serde(default)]
    pub execution_time_ms: f64,

    #[serde(default)]
    pub error: Option<String>,
}

/// Parse the report a harness prints as the last non-empty line of stdout
///
/// Returns `None` if that line is not a JSON array of entries.
pub fn parse_report(stdout: &str) -> Option<Vec<HarnessEntry>> {
    let line = stdout.lines().rev().find(|line| !line.trim().is_empty())?;
    serde_json::from_str(line.trim()).ok()
}

/// Deep equality on JSON values
///
/// Numbers compare by value (`1` equals `1.0`), booleans never equal
/// numbers, object key order is irrelevant.
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, value)| y.get(key).is_some_and(|other| json_equal(value, other)))
        }
        _ => a == b,
    }
}

/// One result per case, in submission order, from the harness entries
///
/// Entries are matched by index. Entries with an index past the end or an
/// index already seen are ignored; cases without an entry fail.
pub fn assemble(cases: &[TestCase], entries: Vec<HarnessEntry>, memory_kb: u64) -> Vec<TestResult> {
    let mut slots: Vec<Option<HarnessEntry>> = vec![None; cases.len()];
    for entry in entries {
        match slots.get_mut(entry.index) {
            Some(slot) if slot.is_none() => *slot = Some(entry),
            Some(_) => warn!(index = entry.index, "duplicate harness entry ignored"),
            None => warn!(index = entry.index, "harness entry for unknown case ignored"),
        }
    }

    cases
        .iter()
        .zip(slots)
        .enumerate()
        .map(|(index, (case, entry))| match entry {
            Some(entry) => from_entry(index, case, entry, memory_kb),
            None => TestResult {
                memory_usage_kb: memory_kb,
                ..TestResult::failed(index, case, "no result reported")
            },
        })
        .collect()
}

fn from_entry(index: usize, case: &TestCase, entry: HarnessEntry, memory_kb: u64) -> TestResult {
    let passed = entry.error.is_none()
        && entry
            .passed
            .unwrap_or_else(|| json_equal(&entry.actual_output, &case.expected_output));
    let actual_output = match (&entry.error, &entry.actual_output) {
        (Some(_), Value::Null) => None,
        _ => Some(entry.actual_output),
    };
    TestResult {
        index,
        input: case.input.clone(),
        expected_output: case.expected_output.clone(),
        actual_output,
        passed,
        execution_time_ms: entry.execution_time_ms.max(0.0),
        memory_usage_kb: memory_kb,
        error: entry.error,
        comparison: Comparison::Structural,
        description: case.description.clone(),
    }
}

/// Explanation attached to a run whose output was not a report
pub const RAW_FALLBACK_MESSAGE: &str =
    "program output was not a JSON report; the first test case was compared against the raw output";

/// Results for output that is not a harness report
///
/// The trimmed output is compared with the first case's expected value in
/// its text form. Every other case fails, so one result per case remains.
pub fn raw_fallback(
    cases: &[TestCase],
    stdout: &str,
    execution_time_ms: f64,
    memory_kb: u64,
) -> Vec<TestResult> {
    let actual = stdout.trim();
    cases
        .iter()
        .enumerate()
        .map(|(index, case)| {
            if index > 0 {
                return TestResult {
                    memory_usage_kb: memory_kb,
                    ..TestResult::failed(
                        index,
                        case,
                        "no result reported: only the first test case can be compared against raw output",
                    )
                };
            }
            TestResult {
                index,
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                actual_output: Some(Value::String(actual.to_owned())),
                passed: actual == text_form(&case.expected_output).trim(),
                execution_time_ms,
                memory_usage_kb: memory_kb,
                error: None,
                comparison: Comparison::RawText,
                description: case.description.clone(),
            }
        })
        .collect()
}
