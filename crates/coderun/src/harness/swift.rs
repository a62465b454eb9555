//! Swift harness
//!
//! The user writes `func solve(_ input: Any) -> Any`. Inputs arrive as
//! `[String: Any]`, `[Any]`, `String`, `Bool`, `Int`, `Double` or `NSNull`;
//! results may use any of those, optionals and the other integer types.
//! JSON is parsed by the harness itself rather than `JSONSerialization`,
//! whose number bridging differs between platforms.

use std::fmt::Write;

use crate::harness::literal::swift_string_literal;
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = r#"import Foundation
#if canImport(Glibc)
import Glibc
#elseif canImport(Darwin)
import Darwin
#endif

fflush(stdout)
let __harness_out = dup(1)
dup2(2, 1)

indirect enum __harness_Value {
    case null
    case bool(Bool)
    case int(Int)
    case double(Double)
    case string(String)
    case array([__harness_Value])
    case object([(String, __harness_Value)])
}

enum __harness_Error: Error, CustomStringConvertible {
    case unsupported(String)
    case nonFinite

    var description: String {
        switch self {
        case .unsupported(let type): return "result of type \(type) is not JSON serializable"
        case .nonFinite: return "result contains a non-finite number"
        }
    }
}

struct __harness_Parser {
    let bytes: [UInt8]
    var pos = 0

    init(_ text: String) {
        bytes = Array(text.utf8)
    }

    mutating func skip() {
        while pos < bytes.count && (bytes[pos] == 0x20 || bytes[pos] == 0x09 || bytes[pos] == 0x0a || bytes[pos] == 0x0d) {
            pos += 1
        }
    }

    mutating func value() -> __harness_Value {
        skip()
        switch bytes[pos] {
        case UInt8(ascii: "{"):
            pos += 1
            var fields: [(String, __harness_Value)] = []
            skip()
            if bytes[pos] == UInt8(ascii: "}") {
                pos += 1
                return .object(fields)
            }
            repeat {
                skip()
                let key = string()
                skip()
                pos += 1
                fields.append((key, value()))
                skip()
                pos += 1
            } while bytes[pos - 1] == UInt8(ascii: ",")
            return .object(fields)
        case UInt8(ascii: "["):
            pos += 1
            var items: [__harness_Value] = []
            skip()
            if bytes[pos] == UInt8(ascii: "]") {
                pos += 1
                return .array(items)
            }
            repeat {
                items.append(value())
                skip()
                pos += 1
            } while bytes[pos - 1] == UInt8(ascii: ",")
            return .array(items)
        case UInt8(ascii: "\""):
            return .string(string())
        case UInt8(ascii: "t"):
            pos += 4
            return .bool(true)
        case UInt8(ascii: "f"):
            pos += 5
            return .bool(false)
        case UInt8(ascii: "n"):
            pos += 4
            return .null
        default:
            return number()
        }
    }

    mutating func hex4() -> UInt32 {
        let text = String(decoding: bytes[pos..<pos + 4], as: UTF8.self)
        pos += 4
        return UInt32(text, radix: 16) ?? 0xfffd
    }

    mutating func string() -> String {
        var out: [UInt8] = []
        pos += 1
        while bytes[pos] != UInt8(ascii: "\"") {
            let byte = bytes[pos]
            pos += 1
            if byte != UInt8(ascii: "\\") {
                out.append(byte)
                continue
            }
            let escape = bytes[pos]
            pos += 1
            switch escape {
            case UInt8(ascii: "n"): out.append(0x0a)
            case UInt8(ascii: "r"): out.append(0x0d)
            case UInt8(ascii: "t"): out.append(0x09)
            case UInt8(ascii: "b"): out.append(0x08)
            case UInt8(ascii: "f"): out.append(0x0c)
            case UInt8(ascii: "u"):
                var code = hex4()
                if code >= 0xd800 && code < 0xdc00 && pos + 6 <= bytes.count && bytes[pos] == UInt8(ascii: "\\") {
                    pos += 2
                    let low = hex4()
                    code = low >= 0xdc00 && low < 0xe000 ? 0x10000 + ((code - 0xd800) << 10) + (low - 0xdc00) : 0xfffd
                }
                let scalar = Unicode.Scalar(code) ?? "\u{fffd}"
                out.append(contentsOf: Array(String(Character(scalar)).utf8))
            default: out.append(escape)
            }
        }
        pos += 1
        return String(decoding: out, as: UTF8.self)
    }

    mutating func number() -> __harness_Value {
        let start = pos
        let allowed = Array("+-0123456789.eE".utf8)
        while pos < bytes.count && allowed.contains(bytes[pos]) {
            pos += 1
        }
        let text = String(decoding: bytes[start..<pos], as: UTF8.self)
        if !text.contains(".") && !text.contains("e") && !text.contains("E"), let int = Int(text) {
            return .int(int)
        }
        return .double(Double(text) ?? 0)
    }
}

func __harness_parse(_ text: String) -> __harness_Value {
    var parser = __harness_Parser(text)
    return parser.value()
}

func __harness_any(_ value: __harness_Value) -> Any {
    switch value {
    case .null: return NSNull()
    case .bool(let b): return b
    case .int(let i): return i
    case .double(let d): return d
    case .string(let s): return s
    case .array(let items): return items.map(__harness_any)
    case .object(let fields):
        var dict: [String: Any] = [:]
        for (key, item) in fields {
            dict[key] = __harness_any(item)
        }
        return dict
    }
}

func __harness_from(_ value: Any) throws -> __harness_Value {
    let mirror = Mirror(reflecting: value)
    if mirror.displayStyle == .optional {
        guard let wrapped = mirror.children.first else {
            return .null
        }
        return try __harness_from(wrapped.value)
    }
    switch value {
    case is NSNull: return .null
    case let b as Bool: return .bool(b)
    case let i as Int: return .int(i)
    case let i as Int8: return .int(Int(i))
    case let i as Int16: return .int(Int(i))
    case let i as Int32: return .int(Int(i))
    case let i as Int64: return .int(Int(i))
    case let i as UInt8: return .int(Int(i))
    case let i as UInt16: return .int(Int(i))
    case let i as UInt32: return .int(Int(i))
    case let i as UInt: return i <= UInt(Int.max) ? .int(Int(i)) : .double(Double(i))
    case let i as UInt64: return i <= UInt64(Int.max) ? .int(Int(i)) : .double(Double(i))
    case let d as Double:
        guard d.isFinite else { throw __harness_Error.nonFinite }
        return .double(d)
    case let f as Float:
        guard f.isFinite else { throw __harness_Error.nonFinite }
        return .double(Double(f))
    case let s as String: return .string(s)
    case let s as Substring: return .string(String(s))
    case let c as Character: return .string(String(c))
    case let items as [Any]: return .array(try items.map(__harness_from))
    case let dict as [String: Any]:
        return .object(try dict.map { ($0.key, try __harness_from($0.value)) })
    default: throw __harness_Error.unsupported(String(describing: type(of: value)))
    }
}

func __harness_equal(_ a: __harness_Value, _ b: __harness_Value) -> Bool {
    switch (a, b) {
    case (.null, .null): return true
    case let (.bool(x), .bool(y)): return x == y
    case let (.int(x), .int(y)): return x == y
    case let (.double(x), .double(y)): return x == y
    case let (.int(x), .double(y)), let (.double(y), .int(x)): return Double(x) == y
    case let (.string(x), .string(y)): return x == y
    case let (.array(x), .array(y)):
        return x.count == y.count && zip(x, y).allSatisfy { __harness_equal($0, $1) }
    case let (.object(x), .object(y)):
        guard x.count == y.count else { return false }
        for (key, item) in x {
            guard let other = y.first(where: { $0.0 == key }), __harness_equal(item, other.1) else {
                return false
            }
        }
        return true
    default: return false
    }
}

func __harness_quote(_ s: String) -> String {
    var out = "\""
    for scalar in s.unicodeScalars {
        switch scalar {
        case "\"": out += "\\\""
        case "\\": out += "\\\\"
        default:
            if scalar.value < 0x20 {
                let hex = String(scalar.value, radix: 16)
                out += "\\u" + String(repeating: "0", count: 4 - hex.count) + hex
            } else {
                out.unicodeScalars.append(scalar)
            }
        }
    }
    return out + "\""
}

func __harness_json(_ value: __harness_Value) -> String {
    switch value {
    case .null: return "null"
    case .bool(let b): return b ? "true" : "false"
    case .int(let i): return String(i)
    case .double(let d): return "\(d)"
    case .string(let s): return __harness_quote(s)
    case .array(let items): return "[" + items.map(__harness_json).joined(separator: ",") + "]"
    case .object(let fields):
        return "{" + fields.map { __harness_quote($0.0) + ":" + __harness_json($0.1) }.joined(separator: ",") + "}"
    }
}
"#;

const ENTRY: &str = r#"var __harness_entries: [String] = []
for (__harness_index, __harness_case) in __harness_cases.enumerated() {
    let input = __harness_any(__harness_parse(__harness_case.0))
    let expected = __harness_parse(__harness_case.1)
    let start = Date()
    let result = solve(input)
    let elapsed = Date().timeIntervalSince(start) * 1000.0

    var entry = "{\"index\":\(__harness_index)"
    do {
        let actual = try __harness_from(result)
        entry += ",\"actualOutput\":" + __harness_json(actual)
        entry += ",\"passed\":" + (__harness_equal(actual, expected) ? "true" : "false")
    } catch {
        entry += ",\"actualOutput\":null,\"passed\":false,\"error\":" + __harness_quote("\(error)")
    }
    entry += ",\"executionTimeMs\":\(elapsed)}"
    __harness_entries.append(entry)
}

fflush(stdout)
let __harness_report = Array(("[" + __harness_entries.joined(separator: ",") + "]\n").utf8)
__harness_report.withUnsafeBytes { buffer in
    var offset = 0
    while offset < buffer.count {
        let written = write(__harness_out, buffer.baseAddress! + offset, buffer.count - offset)
        if written <= 0 {
            break
        }
        offset += written
    }
}
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct SwiftHarness;

impl HarnessTemplate for SwiftHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Swift
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut data = String::from("let __harness_cases: [(String, String)] = [\n");
        for (index, case) in cases.iter().enumerate() {
            let input = swift_string_literal(&case.input.to_string());
            let expected = swift_string_literal(&case.expected_output.to_string());
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
