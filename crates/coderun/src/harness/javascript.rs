//! JavaScript (Node.js) harness
//!
//! Each case is embedded as JSON text inside a string literal and parsed
//! with `JSON.parse`, so keys such as `__proto__` stay ordinary properties.
//! `solve` may return a promise; it is awaited.

use std::fmt::Write;

use crate::harness::literal::js_string_literal;
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = r#"const __harness_perf = require("perf_hooks").performance;
const __harness_write = process.stdout.write.bind(process.stdout);
process.stdout.write = (chunk, encoding, callback) =>
    process.stderr.write(chunk, encoding, callback);
"#;

const ENTRY: &str = r#"function __harness_resolve() {
    if (typeof solve === "function") {
        return solve;
    }
    if (typeof Solution === "function") {
        const instance = new Solution();
        if (typeof instance.solve === "function") {
            return instance.solve.bind(instance);
        }
    }
    return null;
}

function __harness_equal(a, b) {
    if (a === b) {
        return true;
    }
    if (typeof a !== typeof b || a === null || b === null) {
        return false;
    }
    if (Array.isArray(a) || Array.isArray(b)) {
        if (!Array.isArray(a) || !Array.isArray(b) || a.length !== b.length) {
            return false;
        }
        return a.every((item, i) => __harness_equal(item, b[i]));
    }
    if (typeof a === "object") {
        const keys = Object.keys(a);
        if (keys.length !== Object.keys(b).length) {
            return false;
        }
        return keys.every(
            (key) => Object.prototype.hasOwnProperty.call(b, key) && __harness_equal(a[key], b[key])
        );
    }
    return false;
}

function __harness_describe(err) {
    if (err instanceof Error) {
        return `${err.name}: ${err.message}`;
    }
    return String(err);
}

async function __harness_main() {
    const fn = __harness_resolve();
    const results = [];
    for (let index = 0; index < __harness_cases.length; index++) {
        const [input, expected] = __harness_cases[index];
        const entry = { index, actualOutput: null, passed: false, executionTimeMs: 0 };
        if (fn === null) {
            entry.error = "no solve function or Solution.solve method defined";
            results.push(entry);
            continue;
        }
        const start = __harness_perf.now();
        try {
            let actual = fn(input);
            if (actual !== null && typeof actual === "object" && typeof actual.then === "function") {
                actual = await actual;
            }
            entry.executionTimeMs = __harness_perf.now() - start;
            const text = JSON.stringify(actual);
            entry.actualOutput = text === undefined ? null : JSON.parse(text);
            entry.passed = __harness_equal(entry.actualOutput, expected);
        } catch (err) {
            entry.executionTimeMs = __harness_perf.now() - start;
            entry.actualOutput = null;
            entry.error = __harness_describe(err);
        }
        results.push(entry);
    }
    __harness_write(JSON.stringify(results) + "\n");
}

__harness_main().catch((err) => {
    process.stderr.write(String((err && err.stack) || err) + "\n");
    process.exitCode = 1;
});
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScriptHarness;

impl HarnessTemplate for JavaScriptHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::JavaScript
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut data = String::from("const __harness_cases = [\n");
        for (index, case) in cases.iter().enumerate() {
            let input = js_string_literal(&case.input.to_string());
            let expected = js_string_literal(&case.expected_output.to_string());
            check_case_size(index, &[&input, &expected], self.max_case_bytes())?;
            let _ = writeln!(data, "    [JSON.parse({input}), JSON.parse({expected})],");
        }
        data.push_str("];\n");

        let mut source = SourceBuilder::new();
        source
            .prelude(PRELUDE)
            .data(&data)
            .user_code(user_code)
            .entry(ENTRY);
        Ok(Program::new(source.finish()))
    }
}
