//! Literal encoders
//!
//! Every encoder turns a value into source text that the target language's
//! lexer reads back as exactly that value. The output is plain ASCII without
//! raw line breaks, so it can sit on one line of any generated file.

use std::fmt::Write;

use serde_json::{Number, Value};

/// Array/object nesting depth; scalars are depth 0
pub fn nesting_depth(value: &Value) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(value, 0usize)];
    while let Some((value, depth)) = stack.pop() {
        match value {
            Value::Array(items) => {
                deepest = deepest.max(depth + 1);
                stack.extend(items.iter().map(|item| (item, depth + 1)));
            }
            Value::Object(map) => {
                deepest = deepest.max(depth + 1);
                stack.extend(map.values().map(|item| (item, depth + 1)));
            }
            _ => {}
        }
    }
    deepest
}

/// String form of a value for text comparison: strings as-is, everything
/// else as compact JSON
pub fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_hex(out: &mut String, prefix: &str, width: usize, code: u32) {
    let _ = write!(out, "{prefix}{code:0width$x}");
}

/// Floats keep a fraction or exponent so they never lex as integers
fn float_text(number: &Number) -> String {
    let text = number.to_string();
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

fn python_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(c),
            c if (c as u32) <= 0xff => push_hex(out, "\\x", 2, c as u32),
            c if (c as u32) <= 0xffff => push_hex(out, "\\u", 4, c as u32),
            c => push_hex(out, "\\U", 8, c as u32),
        }
    }
    out.push('"');
}

fn python_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) if n.is_f64() => out.push_str(&float_text(n)),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => python_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                python_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                python_string(key, out);
                out.push_str(": ");
                python_value(item, out);
            }
            out.push('}');
        }
    }
}

/// Python expression building the value from `None`, `True`, numbers,
/// strings, lists and dicts
pub fn python_literal(value: &Value) -> String {
    let mut out = String::new();
    python_value(value, &mut out);
    out
}

/// Double-quoted JavaScript string literal
pub fn js_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(c),
            c if (c as u32) < 0x80 => push_hex(&mut out, "\\x", 2, c as u32),
            c => {
                // Covers U+2028 and U+2029, which end a line in older engines
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    push_hex(&mut out, "\\u", 4, u32::from(*unit));
                }
            }
        }
    }
    out.push('"');
    out
}

/// Double-quoted Java string literal
///
/// `\u` escapes are only used above ASCII: Java translates them before
/// lexing, so an escaped line break would end the literal.
pub fn java_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            c if (c as u32) < 0x80 => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    push_hex(&mut out, "\\u", 4, u32::from(*unit));
                }
            }
        }
    }
    out.push('"');
    out
}

/// Characters per literal in chunked JVM string expressions
///
/// A class-file constant holds at most 65535 bytes of modified UTF-8, which
/// a chunk this size stays under whatever it contains.
pub const JVM_CHUNK_CHARS: usize = 8192;

fn chunks(s: &str, size: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(size)
            .map_or(rest.len(), |(offset, _)| offset);
        let (head, tail) = rest.split_at(end);
        parts.push(head);
        rest = tail;
    }
    parts
}

/// Java expression evaluating to `s`, split into constants small enough for
/// the class-file format
pub fn java_string_expr(s: &str) -> String {
    let parts = chunks(s, JVM_CHUNK_CHARS);
    match parts.as_slice() {
        [] => "\"\"".to_owned(),
        [single] => java_string_literal(single),
        parts => {
            let mut out = String::from("new StringBuilder()");
            for part in parts {
                let _ = write!(out, ".append({})", java_string_literal(part));
            }
            out.push_str(".toString()");
            out
        }
    }
}

/// Double-quoted Kotlin string literal, with `$` escaped so no template
/// expansion happens
pub fn kotlin_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            ' '..='~' => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    push_hex(&mut out, "\\u", 4, u32::from(*unit));
                }
            }
        }
    }
    out.push('"');
    out
}

/// Kotlin expression evaluating to `s`; see [`java_string_expr`]
pub fn kotlin_string_expr(s: &str) -> String {
    let parts = chunks(s, JVM_CHUNK_CHARS);
    match parts.as_slice() {
        [] => "\"\"".to_owned(),
        [single] => kotlin_string_literal(single),
        parts => {
            let mut out = String::from("buildString {");
            for part in parts {
                let _ = write!(out, " append({});", kotlin_string_literal(part));
            }
            out.push_str(" }");
            out
        }
    }
}

/// Encoded bytes per piece of a C string literal
const C_CHUNK_BYTES: usize = 4096;

/// C/C++/Objective-C string literal of the UTF-8 bytes of `s`, as adjacent
/// literals the compiler concatenates
///
/// Octal escapes always take three digits so a following digit is never
/// absorbed, and `?` is escaped to rule out trigraphs.
pub fn c_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    let mut piece_start = 0;
    out.push('"');
    for byte in s.bytes() {
        if out.len() - piece_start >= C_CHUNK_BYTES {
            out.push_str("\" \"");
            piece_start = out.len() - 1;
        }
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'?' => out.push_str("\\?"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b' '..=b'~' => out.push(char::from(byte)),
            other => {
                let _ = write!(out, "\\{other:03o}");
            }
        }
    }
    out.push('"');
    out
}

/// Interpreted Go string literal
pub fn go_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(c),
            c if (c as u32) < 0x80 => push_hex(&mut out, "\\x", 2, c as u32),
            c if (c as u32) <= 0xffff => push_hex(&mut out, "\\u", 4, c as u32),
            c => push_hex(&mut out, "\\U", 8, c as u32),
        }
    }
    out.push('"');
    out
}

/// Swift string literal
pub fn swift_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            ' '..='~' => out.push(c),
            c => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
        }
    }
    out.push('"');
    out
}

/// Rust string literal
pub fn rust_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(c),
            c => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
        }
    }
    out.push('"');
    out
}

fn rust_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("Value::Null"),
        Value::Bool(b) => {
            let _ = write!(out, "Value::Bool({b})");
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i == i64::MIN {
                    out.push_str("Value::Int(i64::MIN)");
                } else {
                    let _ = write!(out, "Value::Int({i})");
                }
            } else if let Some(u) = n.as_u64() {
                let _ = write!(out, "Value::UInt({u})");
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                let _ = write!(out, "Value::Float({f:?}f64)");
            }
        }
        Value::String(s) => {
            let _ = write!(out, "Value::Str(String::from({}))", rust_string_literal(s));
        }
        Value::Array(items) => {
            out.push_str("Value::Array(vec![");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                rust_value(item, out);
            }
            out.push_str("])");
        }
        Value::Object(map) => {
            out.push_str("Value::Object(vec![");
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "(String::from({}), ", rust_string_literal(key));
                rust_value(item, out);
                out.push(')');
            }
            out.push_str("])");
        }
    }
}

/// Rust expression constructing the harness `Value` for `value`
pub fn rust_value_expr(value: &Value) -> String {
    let mut out = String::new();
    rust_value(value, &mut out);
    out
}

/// Single-quoted shell word; `None` when `s` holds a NUL byte, which no
/// shell word can carry
pub fn bash_single_quoted(s: &str) -> Option<String> {
    if s.contains('\0') {
        return None;
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    Some(out)
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    /// Decode a C literal produced by [`c_string_literal`]
    fn decode_c(literal: &str) -> Vec<u8> {
        let inner = &literal[1..literal.len() - 1];
        let inner = inner.replace("\" \"", "");
        let bytes = inner.as_bytes();
        let mut out = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'\\' {
                out.push(bytes[i]);
                i += 1;
                continue;
            }
            match bytes[i + 1] {
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b't' => out.push(b'\t'),
                b'0'..=b'7' => {
                    let digits = std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap();
                    out.push(u8::from_str_radix(digits, 8).unwrap());
                    i += 4;
                    continue;
                }
                other => out.push(other),
            }
            i += 2;
        }
        out
    }

    /// Decode a Java literal produced by [`java_string_literal`]
    fn decode_java(literal: &str) -> String {
        let chars: Vec<char> = literal[1..literal.len() - 1].chars().collect();
        let mut units = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] != '\\' {
                units.push(chars[i] as u16);
                i += 1;
                continue;
            }
            match chars[i + 1] {
                'n' => units.push(b'\n' as u16),
                'r' => units.push(b'\r' as u16),
                't' => units.push(b'\t' as u16),
                'b' => units.push(8),
                'f' => units.push(12),
                'u' => {
                    let hex: String = chars[i + 2..i + 6].iter().collect();
                    units.push(u16::from_str_radix(&hex, 16).unwrap());
                    i += 6;
                    continue;
                }
                '0'..='7' => {
                    let oct: String = chars[i + 1..i + 4].iter().collect();
                    units.push(u16::from_str_radix(&oct, 8).unwrap());
                    i += 4;
                    continue;
                }
                other => units.push(other as u16),
            }
            i += 2;
        }
        String::from_utf16(&units).unwrap()
    }

    proptest! {
        #[test]
        fn c_literal_round_trips(s in any::<String>()) {
            let literal = c_string_literal(&s);
            prop_assert!(literal.is_ascii());
            prop_assert!(!literal.contains('\n'));
            prop_assert_eq!(decode_c(&literal), s.as_bytes());
        }

        #[test]
        fn java_literal_round_trips(s in any::<String>()) {
            let literal = java_string_literal(&s);
            prop_assert!(literal.is_ascii());
            prop_assert_eq!(decode_java(&literal), s);
        }

        #[test]
        fn encoders_emit_single_line_ascii(s in any::<String>()) {
            for literal in [
                js_string_literal(&s),
                kotlin_string_literal(&s),
                go_string_literal(&s),
                swift_string_literal(&s),
                rust_string_literal(&s),
                python_literal(&serde_json::Value::String(s.clone())),
            ] {
                prop_assert!(literal.is_ascii());
                prop_assert!(!literal.contains('\n') && !literal.contains('\r'));
            }
        }
    }
}
