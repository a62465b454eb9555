//! Java harness
//!
//! The generated `Main.java` holds the test data, a small JSON reader and
//! writer, and the loop that calls `Solution.solve`. The user's code goes to
//! `Solution.java` untouched.
//!
//! Test data is carried as JSON text returned from one static method per
//! case, so no single method or constant outgrows the class-file limits.
//! Inputs reach `solve` as `Map<String, Object>`, `List<Object>`, `String`,
//! `Boolean`, `Integer`/`Long`/`BigInteger`, `Double` or `null`.

use std::fmt::Write;

use crate::harness::literal::java_string_expr;
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = r#"import java.io.FileDescriptor;
import java.io.FileOutputStream;
import java.io.PrintStream;
import java.lang.reflect.Constructor;
import java.lang.reflect.InvocationTargetException;
import java.lang.reflect.Method;
import java.lang.reflect.Modifier;
import java.math.BigDecimal;
import java.math.BigInteger;
import java.util.ArrayList;
import java.util.LinkedHashMap;
import java.util.List;
import java.util.Map;

public class Main {"#;

const ENTRY: &str = r#"    static final class __harness_Reader {
        private final String text;
        private int pos;

        private __harness_Reader(String text) {
            this.text = text;
        }

        static Object parse(String text) {
            __harness_Reader reader = new __harness_Reader(text);
            Object value = reader.value();
            reader.skip();
            if (reader.pos != text.length()) {
                throw new IllegalArgumentException("trailing characters in JSON");
            }
            return value;
        }

        private void skip() {
            while (pos < text.length() && " \t\r\n".indexOf(text.charAt(pos)) >= 0) {
                pos++;
            }
        }

        private Object value() {
            skip();
            char c = text.charAt(pos);
            switch (c) {
                case '{':
                    return object();
                case '[':
                    return array();
                case '"':
                    return string();
                case 't':
                    pos += 4;
                    return Boolean.TRUE;
                case 'f':
                    pos += 5;
                    return Boolean.FALSE;
                case 'n':
                    pos += 4;
                    return null;
                default:
                    return number();
            }
        }

        private Map<String, Object> object() {
            Map<String, Object> map = new LinkedHashMap<>();
            pos++;
            skip();
            if (text.charAt(pos) == '}') {
                pos++;
                return map;
            }
            while (true) {
                skip();
                String key = string();
                skip();
                pos++;
                map.put(key, value());
                skip();
                if (text.charAt(pos++) == '}') {
                    return map;
                }
            }
        }

        private List<Object> array() {
            List<Object> list = new ArrayList<>();
            pos++;
            skip();
            if (text.charAt(pos) == ']') {
                pos++;
                return list;
            }
            while (true) {
                list.add(value());
                skip();
                if (text.charAt(pos++) == ']') {
                    return list;
                }
            }
        }

        private String string() {
            StringBuilder out = new StringBuilder();
            pos++;
            while (true) {
                char c = text.charAt(pos++);
                if (c == '"') {
                    return out.toString();
                }
                if (c != '\\') {
                    out.append(c);
                    continue;
                }
                char escape = text.charAt(pos++);
                switch (escape) {
                    case 'n': out.append('\n'); break;
                    case 'r': out.append('\r'); break;
                    case 't': out.append('\t'); break;
                    case 'b': out.append('\b'); break;
                    case 'f': out.append('\f'); break;
                    case 'u':
                        out.append((char) Integer.parseInt(text.substring(pos, pos + 4), 16));
                        pos += 4;
                        break;
                    default: out.append(escape);
                }
            }
        }

        private Object number() {
            int start = pos;
            while (pos < text.length() && "+-0123456789.eE".indexOf(text.charAt(pos)) >= 0) {
                pos++;
            }
            String literal = text.substring(start, pos);
            if (literal.indexOf('.') >= 0 || literal.indexOf('e') >= 0 || literal.indexOf('E') >= 0) {
                return Double.parseDouble(literal);
            }
            BigInteger big = new BigInteger(literal);
            if (big.bitLength() < 32) {
                return big.intValue();
            }
            if (big.bitLength() < 64) {
                return big.longValue();
            }
            return big;
        }
    }

    static void __harness_quote(StringBuilder out, String s) {
        out.append('"');
        for (int i = 0; i < s.length(); i++) {
            char c = s.charAt(i);
            if (c == '"' || c == '\\') {
                out.append('\\').append(c);
            } else if (c < 0x20 || c > 0x7e) {
                out.append(String.format("\\u%04x", (int) c));
            } else {
                out.append(c);
            }
        }
        out.append('"');
    }

    static void __harness_json(StringBuilder out, Object value) {
        if (value == null) {
            out.append("null");
        } else if (value instanceof Boolean) {
            out.append(value.toString());
        } else if (value instanceof Double || value instanceof Float) {
            double d = ((Number) value).doubleValue();
            if (Double.isNaN(d) || Double.isInfinite(d)) {
                throw new IllegalArgumentException("result contains a non-finite number");
            }
            out.append(Double.toString(d));
        } else if (value instanceof BigDecimal) {
            out.append(((BigDecimal) value).toString());
        } else if (value instanceof Number) {
            out.append(value.toString());
        } else if (value instanceof CharSequence || value instanceof Character) {
            __harness_quote(out, value.toString());
        } else if (value instanceof Map) {
            out.append('{');
            boolean first = true;
            for (Map.Entry<?, ?> entry : ((Map<?, ?>) value).entrySet()) {
                if (!first) {
                    out.append(',');
                }
                first = false;
                __harness_quote(out, String.valueOf(entry.getKey()));
                out.append(':');
                __harness_json(out, entry.getValue());
            }
            out.append('}');
        } else if (value instanceof Iterable) {
            out.append('[');
            boolean first = true;
            for (Object item : (Iterable<?>) value) {
                if (!first) {
                    out.append(',');
                }
                first = false;
                __harness_json(out, item);
            }
            out.append(']');
        } else if (value.getClass().isArray()) {
            out.append('[');
            int length = java.lang.reflect.Array.getLength(value);
            for (int i = 0; i < length; i++) {
                if (i > 0) {
                    out.append(',');
                }
                __harness_json(out, java.lang.reflect.Array.get(value, i));
            }
            out.append(']');
        } else {
            throw new IllegalArgumentException(
                "result of type " + value.getClass().getName() + " is not JSON serializable");
        }
    }

    static BigDecimal __harness_decimal(Number n) {
        if (n instanceof BigInteger) {
            return new BigDecimal((BigInteger) n);
        }
        if (n instanceof Double || n instanceof Float) {
            return new BigDecimal(n.doubleValue());
        }
        return BigDecimal.valueOf(n.longValue());
    }

    static boolean __harness_equal(Object a, Object b) {
        if (a == null || b == null) {
            return a == b;
        }
        if (a instanceof Boolean || b instanceof Boolean) {
            return a.equals(b);
        }
        if (a instanceof Number && b instanceof Number) {
            return __harness_decimal((Number) a).compareTo(__harness_decimal((Number) b)) == 0;
        }
        if (a instanceof String && b instanceof String) {
            return a.equals(b);
        }
        if (a instanceof List && b instanceof List) {
            List<?> x = (List<?>) a;
            List<?> y = (List<?>) b;
            if (x.size() != y.size()) {
                return false;
            }
            for (int i = 0; i < x.size(); i++) {
                if (!__harness_equal(x.get(i), y.get(i))) {
                    return false;
                }
            }
            return true;
        }
        if (a instanceof Map && b instanceof Map) {
            Map<?, ?> x = (Map<?, ?>) a;
            Map<?, ?> y = (Map<?, ?>) b;
            if (x.size() != y.size()) {
                return false;
            }
            for (Map.Entry<?, ?> entry : x.entrySet()) {
                if (!y.containsKey(entry.getKey()) || !__harness_equal(entry.getValue(), y.get(entry.getKey()))) {
                    return false;
                }
            }
            return true;
        }
        return false;
    }

    static Object __harness_target;

    static Method __harness_resolve() throws Exception {
        Class<?> cls;
        try {
            cls = Class.forName("Solution");
        } catch (ClassNotFoundException e) {
            return null;
        }
        for (Method method : cls.getDeclaredMethods()) {
            if (!method.getName().equals("solve") || method.getParameterCount() != 1) {
                continue;
            }
            method.setAccessible(true);
            if (!Modifier.isStatic(method.getModifiers())) {
                Constructor<?> constructor = cls.getDeclaredConstructor();
                constructor.setAccessible(true);
                __harness_target = constructor.newInstance();
            }
            return method;
        }
        return null;
    }

    static String __harness_case(String kind, int index) throws Exception {
        return (String) Main.class.getDeclaredMethod("__harness_" + kind + "_" + index).invoke(null);
    }

    public static void main(String[] args) throws Exception {
        PrintStream out = new PrintStream(new FileOutputStream(FileDescriptor.out), false, "UTF-8");
        System.setOut(System.err);

        Method method = __harness_resolve();
        StringBuilder report = new StringBuilder("[");
        for (int index = 0; index < __harness_case_count; index++) {
            Object input = __harness_Reader.parse(__harness_case("input", index));
            Object expected = __harness_Reader.parse(__harness_case("expected", index));
            String actual = "null";
            boolean passed = false;
            String error = null;
            double elapsed = 0.0;

            if (method == null) {
                error = "no Solution class with a one-argument solve method";
            } else {
                long start = System.nanoTime();
                try {
                    Object result = method.invoke(__harness_target, input);
                    elapsed = (System.nanoTime() - start) / 1e6;
                    StringBuilder encoded = new StringBuilder();
                    __harness_json(encoded, result);
                    actual = encoded.toString();
                    passed = __harness_equal(__harness_Reader.parse(actual), expected);
                } catch (InvocationTargetException e) {
                    elapsed = (System.nanoTime() - start) / 1e6;
                    Throwable cause = e.getCause() == null ? e : e.getCause();
                    if (cause instanceof OutOfMemoryError) {
                        throw (OutOfMemoryError) cause;
                    }
                    error = cause.toString();
                } catch (Exception | StackOverflowError e) {
                    elapsed = (System.nanoTime() - start) / 1e6;
                    actual = "null";
                    error = e.toString();
                }
            }

            if (index > 0) {
                report.append(',');
            }
            report.append("{\"index\":").append(index)
                .append(",\"actualOutput\":").append(actual)
                .append(",\"passed\":").append(passed)
                .append(",\"executionTimeMs\":").append(elapsed);
            if (error != null) {
                report.append(",\"error\":");
                __harness_quote(report, error);
            }
            report.append('}');
        }
        report.append(']');

        System.err.flush();
        out.println(report);
        out.flush();
        System.exit(0);
    }
}
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct JavaHarness;

impl HarnessTemplate for JavaHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Java
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut data = format!("    static final int __harness_case_count = {};\n", cases.len());
        for (index, case) in cases.iter().enumerate() {
            let input = java_string_expr(&case.input.to_string());
            let expected = java_string_expr(&case.expected_output.to_string());
            check_case_size(index, &[&input, &expected], self.max_case_bytes())?;
            let _ = write!(
                data,
                "\n    static String __harness_input_{index}() {{\n        return {input};\n    }}\n\
                 \n    static String __harness_expected_{index}() {{\n        return {expected};\n    }}\n"
            );
        }

        let mut source = SourceBuilder::new();
        source.prelude(PRELUDE).data(&data).entry(ENTRY);
        Ok(Program::new(source.finish()).with_user_code(user_code))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn data_lives_in_per_case_methods() {
        let cases = vec![
            TestCase::new(json!([1, 2]), json!(3)),
            TestCase::new(json!("\u{e9}"), json!(null)),
        ];
        let program = JavaHarness.render("class Solution {}", &cases).unwrap();
        let main = &program.entry().contents;

        assert!(main.contains("static final int __harness_case_count = 2;"));
        assert!(main.contains("static String __harness_input_0() {\n        return \"[1,2]\";"));
        assert!(main.contains("static String __harness_expected_1() {\n        return \"null\";"));
        assert!(main.contains(r#"return "\"\u00e9\"";"#));
        assert!(main.starts_with("import java.io.FileDescriptor;"));
        assert!(main.trim_end().ends_with('}'));
    }

    #[test]
    fn user_code_is_a_separate_file() {
        let code = "public class Solution { public Object solve(Object in) { return in; } }";
        let program = JavaHarness.render(code, &[]).unwrap();
        assert_eq!(program.user_code().unwrap().contents, code);
        assert!(program.entry().contents.contains("__harness_case_count = 0;"));
    }

    #[test]
    fn large_cases_use_chunked_builders() {
        let big = json!("x".repeat(crate::harness::literal::JVM_CHUNK_CHARS * 3));
        let program = JavaHarness
            .render("", &[TestCase::new(big, json!(0))])
            .unwrap();
        assert!(program.entry().contents.contains("new StringBuilder().append("));
    }
}
