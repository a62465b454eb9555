//! Python harness
//!
//! Test data is embedded as native Python literals. The user's `solve` is
//! looked up at run time: a module-level `solve` function first, then the
//! `solve` method of a no-argument `Solution` instance.

use std::fmt::Write;

use crate::harness::literal::python_literal;
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = r#"import json
import sys
import time
from typing import *

sys.setrecursionlimit(100000)
__harness_stdout = sys.stdout
sys.stdout = sys.stderr
"#;

const ENTRY: &str = r#"def __harness_key(key):
    if key is True:
        return "true"
    if key is False:
        return "false"
    if key is None:
        return "null"
    return str(key)


def __harness_plain(value):
    if value is None or isinstance(value, (bool, int, float, str)):
        return value
    if isinstance(value, dict):
        return {__harness_key(k): __harness_plain(v) for k, v in value.items()}
    if isinstance(value, (list, tuple, set, frozenset)):
        return [__harness_plain(v) for v in value]
    raise TypeError("result of type %s is not JSON serializable" % type(value).__name__)


def __harness_equal(a, b):
    if isinstance(a, bool) or isinstance(b, bool):
        return isinstance(a, bool) and isinstance(b, bool) and a == b
    if isinstance(a, (int, float)) and isinstance(b, (int, float)):
        return a == b
    if isinstance(a, list) and isinstance(b, list):
        return len(a) == len(b) and all(__harness_equal(x, y) for x, y in zip(a, b))
    if isinstance(a, dict) and isinstance(b, dict):
        return a.keys() == b.keys() and all(__harness_equal(a[k], b[k]) for k in a)
    return type(a) is type(b) and a == b


def __harness_resolve():
    fn = globals().get("solve")
    if callable(fn):
        return fn
    cls = globals().get("Solution")
    if isinstance(cls, type):
        method = getattr(cls(), "solve", None)
        if callable(method):
            return method
    return None


def __harness_main():
    fn = __harness_resolve()
    results = []
    for index, (data, expected) in enumerate(__harness_cases):
        entry = {"index": index, "actualOutput": None, "passed": False, "executionTimeMs": 0.0}
        if fn is None:
            entry["error"] = "no solve function or Solution.solve method defined"
            results.append(entry)
            continue
        start = time.perf_counter()
        try:
            actual = fn(data)
            entry["executionTimeMs"] = (time.perf_counter() - start) * 1000.0
            actual = __harness_plain(actual)
            json.dumps(actual, allow_nan=False)
            entry["actualOutput"] = actual
            entry["passed"] = __harness_equal(actual, expected)
        except MemoryError:
            raise
        except BaseException as exc:
            entry["executionTimeMs"] = (time.perf_counter() - start) * 1000.0
            entry["actualOutput"] = None
            entry["error"] = "%s: %s" % (type(exc).__name__, exc)
        results.append(entry)
    sys.stdout.flush()
    __harness_stdout.write(json.dumps(results, allow_nan=False) + "\n")
    __harness_stdout.flush()


__harness_main()
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonHarness;

impl HarnessTemplate for PythonHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Python
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut data = String::from("__harness_cases = [\n");
        for (index, case) in cases.iter().enumerate() {
            let input = python_literal(&case.input);
            let expected = python_literal(&case.expected_output);
            check_case_size(index, &[&input, &expected], self.max_case_bytes())?;
            let _ = writeln!(data, "    ({input}, {expected}),");
        }
        data.push_str("]\n");

        let mut source = SourceBuilder::new();
        source
            .prelude(PRELUDE)
            .data(&data)
            .user_code(user_code)
            .entry(ENTRY);
        Ok(Program::new(source.finish()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn embeds_cases_as_python_literals() {
        let cases = vec![
            TestCase::new(json!({"flag": true, "none": null}), json!([1, 2.5])),
            TestCase::new(json!("a\"b"), json!(false)),
        ];
        let program = PythonHarness
            .render("def solve(x):\n    return x\n", &cases)
            .unwrap();
        let text = &program.entry().contents;

        assert!(text.contains(r#"    ({"flag": True, "none": None}, [1, 2.5]),"#));
        assert!(text.contains(r#"    ("a\"b", False),"#));
        assert!(program.user_code().is_none());
    }

    #[test]
    fn user_code_sits_between_data_and_entry() {
        let program = PythonHarness.render("def solve(x):\n    return x\n", &[]).unwrap();
        let text = &program.entry().contents;

        let data = text.find("__harness_cases = [").unwrap();
        let user = text.find("def solve(x):").unwrap();
        let entry = text.find("def __harness_main():").unwrap();
        assert!(data < user && user < entry);
        assert!(text.starts_with("import json\n"));
        assert!(text.ends_with("__harness_main()\n"));
    }

    #[test]
    fn oversized_case_is_rejected() {
        let big = "x".repeat(crate::harness::DEFAULT_MAX_CASE_BYTES);
        let cases = vec![TestCase::new(json!(big), json!(null))];
        assert!(matches!(
            PythonHarness.render("", &cases),
            Err(HarnessError::LiteralTooLarge { index: 0, .. })
        ));
    }
}
