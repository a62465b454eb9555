//! Rust harness
//!
//! The generated program has no dependencies, so it carries its own JSON
//! `Value` type. The user writes `fn solve(input: &Value) -> Value` and may
//! use the accessors, `From` conversions and indexing defined on `Value`.
//! Test data is built by one generated function per case; integers above
//! `i64::MAX` arrive as `Value::UInt` and anything outside `u64` as
//! `Value::Float`.

use std::fmt::Write;

use crate::harness::literal::rust_value_expr;
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = r#"#![allow(
    dead_code,
    unused_imports,
    unused_variables,
    unused_mut,
    unreachable_patterns,
    non_snake_case,
    non_upper_case_globals
)]

use std::collections::*;
use std::io::Write as _;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

static __harness_NULL: Value = Value::Null;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::UInt(u) => Some(*u),
            Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f < 1.8e19 => Some(*f as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Vec<(String, Value)>> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(i), Value::UInt(u)) | (Value::UInt(u), Value::Int(i)) => {
                u64::try_from(*i).is_ok_and(|i| i == *u)
            }
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
                f.fract() == 0.0 && *f >= -9.223372036854775808e18 && *f < 9.223372036854775808e18 && *f as i64 == *i
            }
            (Value::UInt(u), Value::Float(f)) | (Value::Float(f), Value::UInt(u)) => {
                f.fract() == 0.0 && *f >= 0.0 && *f < 1.8446744073709551616e19 && *f as u64 == *u
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter().any(|(other_key, other)| other_key == key && other == value)
                    })
            }
            _ => false,
        }
    }
}

impl std::ops::Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        match self {
            Value::Array(items) => items.get(index).unwrap_or(&__harness_NULL),
            _ => &__harness_NULL,
        }
    }
}

impl std::ops::Index<&str> for Value {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&__harness_NULL)
    }
}

macro_rules! __harness_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Value {
                match (i64::try_from(value), u64::try_from(value)) {
                    (Ok(i), _) => Value::Int(i),
                    (_, Ok(u)) => Value::UInt(u),
                    _ => Value::Float(value as f64),
                }
            }
        })*
    };
}

__harness_from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Value {
        Value::Float(f64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::Str(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Value {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Value {
        value.map_or(Value::Null, Into::into)
    }
}

fn __harness_quote(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn __harness_json(out: &mut String, value: &Value) -> Result<(), String> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::UInt(u) => out.push_str(&u.to_string()),
        Value::Float(f) if f.is_finite() => out.push_str(&format!("{f:?}")),
        Value::Float(f) => return Err(format!("result contains non-finite number {f}")),
        Value::Str(s) => __harness_quote(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                __harness_json(out, item)?;
            }
            out.push(']');
        }
        Value::Object(fields) => {
            out.push('{');
            for (i, (key, item)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                __harness_quote(out, key);
                out.push(':');
                __harness_json(out, item)?;
            }
            out.push('}');
        }
    }
    Ok(())
}
"#;

const ENTRY: &str = r#"extern "C" {
    #[link_name = "dup"]
    fn __harness_dup(fd: i32) -> i32;
    #[link_name = "dup2"]
    fn __harness_dup2(from: i32, to: i32) -> i32;
}

fn __harness_panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

fn main() {
    let _ = std::io::stdout().flush();
    let __harness_fd = unsafe { __harness_dup(1) };
    unsafe {
        __harness_dup2(2, 1);
    }

    let mut report = String::from("[");
    for index in 0..__harness_case_count {
        let (input, expected) = __harness_case(index);
        let start = std::time::Instant::now();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| solve(&input)));
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;

        let mut actual = String::from("null");
        let mut passed = false;
        let mut error = None;
        match outcome {
            Ok(value) => {
                let mut encoded = String::new();
                match __harness_json(&mut encoded, &value) {
                    Ok(()) => {
                        actual = encoded;
                        passed = value == expected;
                    }
                    Err(message) => error = Some(message),
                }
            }
            Err(payload) => error = Some(format!("panic: {}", __harness_panic_message(&*payload))),
        }

        if index > 0 {
            report.push(',');
        }
        report.push_str(&format!(
            "{{\"index\":{index},\"actualOutput\":{actual},\"passed\":{passed},\"executionTimeMs\":{elapsed:?}"
        ));
        if let Some(message) = error {
            report.push_str(",\"error\":");
            __harness_quote(&mut report, &message);
        }
        report.push('}');
    }
    report.push_str("]\n");

    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    if __harness_fd >= 0 {
        use std::os::unix::io::FromRawFd;
        let mut out = unsafe { std::fs::File::from_raw_fd(__harness_fd) };
        let _ = out.write_all(report.as_bytes());
        let _ = out.flush();
    }
}
"#;

/// Cap on the generated constructor code for one case
const MAX_CASE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct RustHarness;

impl HarnessTemplate for RustHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Rust
    }

    fn max_case_bytes(&self) -> usize {
        MAX_CASE_BYTES
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut data = format!("const __harness_case_count: usize = {};\n", cases.len());
        let mut dispatch = String::from(
            "\nfn __harness_case(index: usize) -> (Value, Value) {\n    match index {\n",
        );
        for (index, case) in cases.iter().enumerate() {
            let input = rust_value_expr(&case.input);
            let expected = rust_value_expr(&case.expected_output);
            check_case_size(index, &[&input, &expected], self.max_case_bytes())?;
            let _ = write!(
                data,
                "\nfn __harness_input_{index}() -> Value {{\n    {input}\n}}\n\
                 \nfn __harness_expected_{index}() -> Value {{\n    {expected}\n}}\n"
            );
            let _ = writeln!(
                dispatch,
                "        {index} => (__harness_input_{index}(), __harness_expected_{index}()),"
            );
        }
        dispatch.push_str("        _ => (Value::Null, Value::Null),\n    }\n}\n");
        data.push_str(&dispatch);

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
    fn cases_become_constructor_functions() {
        let cases = vec![TestCase::new(json!({"n": 3}), json!([true]))];
        let program = RustHarness
            .render("fn solve(input: &Value) -> Value { input.clone() }", &cases)
            .unwrap();
        let text = &program.entry().contents;

        assert!(text.starts_with("#![allow("));
        assert!(text.contains(
            "fn __harness_input_0() -> Value {\n    Value::Object(vec![(String::from(\"n\"), Value::Int(3))])\n}"
        ));
        assert!(text.contains("0 => (__harness_input_0(), __harness_expected_0()),"));
        assert!(text.contains("const __harness_case_count: usize = 1;"));
    }

    #[test]
    fn large_unsigned_values_stay_exact() {
        let cases = vec![TestCase::new(json!({"big": u64::MAX}), json!(u64::MAX))];
        let program = RustHarness
            .render("fn solve(input: &Value) -> Value { input[\"big\"].clone() }", &cases)
            .unwrap();
        let text = &program.entry().contents;

        assert!(text.contains("Value::UInt(18446744073709551615)"));
        assert!(text.contains("Value::UInt(u) => out.push_str(&u.to_string()),"));
        assert!(!text.contains("1.8446744073709552e19"));
    }

    #[test]
    fn case_cap_is_tighter_than_default() {
        let big = json!(vec![0; MAX_CASE_BYTES / 8]);
        assert!(matches!(
            RustHarness.render("", &[TestCase::new(big, json!(0))]),
            Err(HarnessError::LiteralTooLarge { limit: MAX_CASE_BYTES, .. })
        ));
    }
}
