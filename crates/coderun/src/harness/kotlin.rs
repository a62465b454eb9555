//! Kotlin harness
//!
//! Mirrors the Java harness in Kotlin: `Main.kt` carries data, JSON helpers
//! and the entry point, `Solution.kt` the user's code. `solve` is resolved
//! in this order: a `Solution` class or object, then a top-level `solve`
//! function in `Solution.kt`.

use std::fmt::Write;

use crate::harness::literal::kotlin_string_expr;
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = r#"import java.io.FileDescriptor
import java.io.FileOutputStream
import java.io.PrintStream
import java.lang.reflect.InvocationTargetException
import java.lang.reflect.Method
import java.lang.reflect.Modifier
import java.math.BigDecimal
import java.math.BigInteger
"#;

const ENTRY: &str = r#"class __harness_Reader private constructor(private val text: String) {
    private var pos = 0

    companion object {
        fun parse(text: String): Any? {
            val reader = __harness_Reader(text)
            val value = reader.value()
            reader.skip()
            require(reader.pos == text.length) { "trailing characters in JSON" }
            return value
        }
    }

    private fun skip() {
        while (pos < text.length && text[pos] in " \t\r\n") {
            pos++
        }
    }

    private fun value(): Any? {
        skip()
        return when (text[pos]) {
            '{' -> obj()
            '[' -> arr()
            '"' -> str()
            't' -> { pos += 4; true }
            'f' -> { pos += 5; false }
            'n' -> { pos += 4; null }
            else -> num()
        }
    }

    private fun obj(): Map<String, Any?> {
        val map = LinkedHashMap<String, Any?>()
        pos++
        skip()
        if (text[pos] == '}') {
            pos++
            return map
        }
        do {
            skip()
            val key = str()
            skip()
            pos++
            map[key] = value()
            skip()
        } while (text[pos++] == ',')
        return map
    }

    private fun arr(): List<Any?> {
        val list = ArrayList<Any?>()
        pos++
        skip()
        if (text[pos] == ']') {
            pos++
            return list
        }
        do {
            list.add(value())
            skip()
        } while (text[pos++] == ',')
        return list
    }

    private fun str(): String {
        val out = StringBuilder()
        pos++
        while (text[pos] != '"') {
            val c = text[pos++]
            if (c != '\\') {
                out.append(c)
                continue
            }
            when (val escape = text[pos++]) {
                'n' -> out.append('\n')
                'r' -> out.append('\r')
                't' -> out.append('\t')
                'b' -> out.append('\b')
                'f' -> out.append('\u000C')
                'u' -> {
                    out.append(text.substring(pos, pos + 4).toInt(16).toChar())
                    pos += 4
                }
                else -> out.append(escape)
            }
        }
        pos++
        return out.toString()
    }

    private fun num(): Any {
        val start = pos
        while (pos < text.length && text[pos] in "+-0123456789.eE") {
            pos++
        }
        val literal = text.substring(start, pos)
        if (literal.any { it == '.' || it == 'e' || it == 'E' }) {
            return literal.toDouble()
        }
        val big = BigInteger(literal)
        return when {
            big.bitLength() < 32 -> big.toInt()
            big.bitLength() < 64 -> big.toLong()
            else -> big
        }
    }
}

fun __harness_quote(out: StringBuilder, s: String) {
    out.append('"')
    for (c in s) {
        when {
            c == '"' || c == '\\' -> out.append('\\').append(c)
            c < ' ' || c > '~' -> out.append(String.format("\\u%04x", c.code))
            else -> out.append(c)
        }
    }
    out.append('"')
}

fun __harness_json(out: StringBuilder, value: Any?) {
    when (value) {
        null -> out.append("null")
        is Boolean -> out.append(value.toString())
        is Double, is Float -> {
            val d = (value as Number).toDouble()
            require(d.isFinite()) { "result contains a non-finite number" }
            out.append(d.toString())
        }
        is Number -> out.append(value.toString())
        is CharSequence, is Char -> __harness_quote(out, value.toString())
        is Map<*, *> -> {
            out.append('{')
            var first = true
            for ((key, item) in value) {
                if (!first) out.append(',')
                first = false
                __harness_quote(out, key.toString())
                out.append(':')
                __harness_json(out, item)
            }
            out.append('}')
        }
        is Iterable<*> -> {
            out.append('[')
            var first = true
            for (item in value) {
                if (!first) out.append(',')
                first = false
                __harness_json(out, item)
            }
            out.append(']')
        }
        else -> {
            require(value.javaClass.isArray) {
                "result of type ${value.javaClass.name} is not JSON serializable"
            }
            out.append('[')
            for (i in 0 until java.lang.reflect.Array.getLength(value)) {
                if (i > 0) out.append(',')
                __harness_json(out, java.lang.reflect.Array.get(value, i))
            }
            out.append(']')
        }
    }
}

fun __harness_decimal(n: Number): BigDecimal = when (n) {
    is BigDecimal -> n
    is BigInteger -> BigDecimal(n)
    is Double, is Float -> BigDecimal(n.toDouble())
    else -> BigDecimal.valueOf(n.toLong())
}

fun __harness_equal(a: Any?, b: Any?): Boolean {
    if (a == null || b == null) return a == null && b == null
    if (a is Boolean || b is Boolean) return a == b
    if (a is Number && b is Number) return __harness_decimal(a).compareTo(__harness_decimal(b)) == 0
    if (a is String && b is String) return a == b
    if (a is List<*> && b is List<*>) {
        return a.size == b.size && a.indices.all { __harness_equal(a[it], b[it]) }
    }
    if (a is Map<*, *> && b is Map<*, *>) {
        return a.size == b.size && a.all { (key, item) -> b.containsKey(key) && __harness_equal(item, b[key]) }
    }
    return false
}

class __harness_Target(val method: Method, val receiver: Any?)

fun __harness_resolve(): __harness_Target? {
    for (name in listOf("Solution", "SolutionKt")) {
        val cls = try {
            Class.forName(name)
        } catch (e: ClassNotFoundException) {
            continue
        }
        val method = cls.declaredMethods.firstOrNull { it.name == "solve" && it.parameterCount == 1 } ?: continue
        method.isAccessible = true
        if (Modifier.isStatic(method.modifiers)) {
            return __harness_Target(method, null)
        }
        val singleton = cls.declaredFields.firstOrNull { it.name == "INSTANCE" && Modifier.isStatic(it.modifiers) }
        val receiver = singleton?.get(null)
            ?: cls.getDeclaredConstructor().also { it.isAccessible = true }.newInstance()
        return __harness_Target(method, receiver)
    }
    return null
}

fun __harness_case(kind: String, index: Int): String =
    Class.forName("MainKt").getDeclaredMethod("__harness_${kind}_$index").invoke(null) as String

fun main() {
    val out = PrintStream(FileOutputStream(FileDescriptor.out), false, "UTF-8")
    System.setOut(System.err)

    val target = __harness_resolve()
    val report = StringBuilder("[")
    for (index in 0 until __harness_case_count) {
        val input = __harness_Reader.parse(__harness_case("input", index))
        val expected = __harness_Reader.parse(__harness_case("expected", index))
        var actual = "null"
        var passed = false
        var error: String? = null
        var elapsed = 0.0

        if (target == null) {
            error = "no Solution class, object or top-level solve function"
        } else {
            val start = System.nanoTime()
            try {
                val result = target.method.invoke(target.receiver, input)
                elapsed = (System.nanoTime() - start) / 1e6
                val encoded = StringBuilder()
                __harness_json(encoded, result)
                actual = encoded.toString()
                passed = __harness_equal(__harness_Reader.parse(actual), expected)
            } catch (e: InvocationTargetException) {
                elapsed = (System.nanoTime() - start) / 1e6
                val cause = e.cause ?: e
                if (cause is OutOfMemoryError) throw cause
                error = cause.toString()
            } catch (e: Exception) {
                elapsed = (System.nanoTime() - start) / 1e6
                actual = "null"
                error = e.toString()
            } catch (e: StackOverflowError) {
                elapsed = (System.nanoTime() - start) / 1e6
                actual = "null"
                error = e.toString()
            }
        }

        if (index > 0) report.append(',')
        report.append("{\"index\":").append(index)
            .append(",\"actualOutput\":").append(actual)
            .append(",\"passed\":").append(passed)
            .append(",\"executionTimeMs\":").append(elapsed)
        if (error != null) {
            report.append(",\"error\":")
            __harness_quote(report, error)
        }
        report.append('}')
    }
    report.append(']')

    System.err.flush()
    out.println(report)
    out.flush()
    System.exit(0)
}
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct KotlinHarness;

impl HarnessTemplate for KotlinHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Kotlin
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut data = format!("const val __harness_case_count = {}\n", cases.len());
        for (index, case) in cases.iter().enumerate() {
            let input = kotlin_string_expr(&case.input.to_string());
            let expected = kotlin_string_expr(&case.expected_output.to_string());
            check_case_size(index, &[&input, &expected], self.max_case_bytes())?;
            let _ = write!(
                data,
                "\nfun __harness_input_{index}(): String = {input}\n\
                 \nfun __harness_expected_{index}(): String = {expected}\n"
            );
        }

        let mut source = SourceBuilder::new();
        source.prelude(PRELUDE).data(&data).entry(ENTRY);
        Ok(Program::new(source.finish()).with_user_code(user_code))
    }
}
