//! Bash harness
//!
//! The user defines a function `solve` that receives the input as compact
//! JSON in `$1` and prints its answer. The trimmed output passes when it
//! equals the expected value's text form (strings unquoted) or its compact
//! JSON. `actualOutput` is reported as the output string.

use std::fmt::Write;

use crate::harness::literal::{bash_single_quoted, text_form};
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = "exec 3>&1 1>&2\n";

const ENTRY: &str = r#"set +e +u
set +o pipefail

__harness_json_string() {
    local s=$1
    s=${s//\\/\\\\}
    s=${s//\"/\\\"}
    s=${s//$'\n'/\\n}
    s=${s//$'\r'/\\r}
    s=${s//$'\t'/\\t}
    s=${s//[[:cntrl:]]/}
    printf '"%s"' "$s"
}

__harness_now_us() {
    if [[ -n ${EPOCHREALTIME-} ]]; then
        printf '%s' "${EPOCHREALTIME//[.,]/}"
    else
        date +%s%6N
    fi
}

__harness_report='['
for __harness_i in "${!__harness_inputs[@]}"; do
    if (( __harness_i > 0 )); then
        __harness_report+=','
    fi
    if ! declare -F solve > /dev/null; then
        __harness_report+="{\"index\":$__harness_i,\"actualOutput\":null,\"passed\":false,\"executionTimeMs\":0,\"error\":\"no solve function defined\"}"
        continue
    fi

    __harness_start=$(__harness_now_us)
    __harness_actual=$(solve "${__harness_inputs[__harness_i]}")
    __harness_status=$?
    __harness_end=$(__harness_now_us)
    __harness_us=$(( __harness_end - __harness_start ))
    __harness_ms=$(printf '%d.%03d' $(( __harness_us / 1000 )) $(( __harness_us % 1000 )))

    __harness_actual="${__harness_actual#"${__harness_actual%%[![:space:]]*}"}"
    __harness_actual="${__harness_actual%"${__harness_actual##*[![:space:]]}"}"

    __harness_passed=false
    if (( __harness_status == 0 )) && [[ "$__harness_actual" == "${__harness_expected_text[__harness_i]}" || "$__harness_actual" == "${__harness_expected_json[__harness_i]}" ]]; then
        __harness_passed=true
    fi

    __harness_report+="{\"index\":$__harness_i,\"actualOutput\":$(__harness_json_string "$__harness_actual"),\"passed\":$__harness_passed,\"executionTimeMs\":$__harness_ms"
    if (( __harness_status != 0 )); then
        __harness_report+=",\"error\":\"solve exited with status $__harness_status\""
    fi
    __harness_report+='}'
done
__harness_report+=']'

printf '%s\n' "$__harness_report" >&3
"#;

fn quoted(index: usize, text: &str) -> Result<String, HarnessError> {
    bash_single_quoted(text).ok_or_else(|| HarnessError::Unrepresentable {
        index,
        reason: "bash strings cannot contain NUL characters".to_owned(),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BashHarness;

impl HarnessTemplate for BashHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Bash
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut inputs = String::from("__harness_inputs=(\n");
        let mut expected_text = String::from("__harness_expected_text=(\n");
        let mut expected_json = String::from("__harness_expected_json=(\n");
        for (index, case) in cases.iter().enumerate() {
            let input = quoted(index, &case.input.to_string())?;
            let text = quoted(index, &text_form(&case.expected_output))?;
            let json = quoted(index, &case.expected_output.to_string())?;
            check_case_size(index, &[&input, &text, &json], self.max_case_bytes())?;
            let _ = writeln!(inputs, "    {input}");
            let _ = writeln!(expected_text, "    {text}");
            let _ = writeln!(expected_json, "    {json}");
        }
        let data = format!("{inputs})\n{expected_text})\n{expected_json})\n");

        let mut source = SourceBuilder::new();
        source
            .prelude(PRELUDE)
            .data(&data)
            .user_code(user_code)
            .entry(ENTRY);
        Ok(Program::new(source.finish()))
    }
}
