//! Go harness
//!
//! `main.go` holds the data and entry point; the user's code goes to
//! `solution.go` in package `main` and defines
//! `func solve(input interface{}) interface{}`. Inputs are decoded the way
//! `encoding/json` always decodes into `interface{}` (numbers as float64);
//! results are compared exactly through `big.Rat`.

use std::fmt::Write;

use crate::harness::literal::go_string_literal;
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = r#"package main

import (
	"bytes"
	"encoding/json"
	"fmt"
	"math/big"
	"os"
	"time"
)
"#;

const ENTRY: &str = r#"type __harness_entry struct {
	Index           int             `json:"index"`
	ActualOutput    json.RawMessage `json:"actualOutput"`
	Passed          bool            `json:"passed"`
	ExecutionTimeMs float64         `json:"executionTimeMs"`
	Error           string          `json:"error,omitempty"`
}

func __harness_decode(data []byte) (interface{}, error) {
	decoder := json.NewDecoder(bytes.NewReader(data))
	decoder.UseNumber()
	var value interface{}
	err := decoder.Decode(&value)
	return value, err
}

func __harness_equal(a, b interface{}) bool {
	switch x := a.(type) {
	case nil:
		return b == nil
	case bool:
		y, ok := b.(bool)
		return ok && x == y
	case string:
		y, ok := b.(string)
		return ok && x == y
	case json.Number:
		y, ok := b.(json.Number)
		if !ok {
			return false
		}
		rx, okx := new(big.Rat).SetString(string(x))
		ry, oky := new(big.Rat).SetString(string(y))
		return okx && oky && rx.Cmp(ry) == 0
	case []interface{}:
		y, ok := b.([]interface{})
		if !ok || len(x) != len(y) {
			return false
		}
		for i := range x {
			if !__harness_equal(x[i], y[i]) {
				return false
			}
		}
		return true
	case map[string]interface{}:
		y, ok := b.(map[string]interface{})
		if !ok || len(x) != len(y) {
			return false
		}
		for key, item := range x {
			other, present := y[key]
			if !present || !__harness_equal(item, other) {
				return false
			}
		}
		return true
	}
	return false
}

func __harness_run(input interface{}) (result interface{}, err error) {
	defer func() {
		if r := recover(); r != nil {
			err = fmt.Errorf("panic: %v", r)
		}
	}()
	return solve(input), nil
}

func main() {
	out := os.Stdout
	os.Stdout = os.Stderr

	entries := make([]__harness_entry, 0, len(__harness_cases))
	for index, data := range __harness_cases {
		entry := __harness_entry{Index: index, ActualOutput: json.RawMessage("null")}
		var input interface{}
		if err := json.Unmarshal([]byte(data[0]), &input); err != nil {
			entry.Error = "invalid input: " + err.Error()
			entries = append(entries, entry)
			continue
		}

		start := time.Now()
		actual, err := __harness_run(input)
		entry.ExecutionTimeMs = float64(time.Since(start).Nanoseconds()) / 1e6
		if err != nil {
			entry.Error = err.Error()
		} else if encoded, err := json.Marshal(actual); err != nil {
			entry.Error = "result is not JSON serializable: " + err.Error()
		} else {
			entry.ActualOutput = encoded
			got, _ := __harness_decode(encoded)
			want, _ := __harness_decode([]byte(data[1]))
			entry.Passed = __harness_equal(got, want)
		}
		entries = append(entries, entry)
	}

	report, err := json.Marshal(entries)
	if err != nil {
		fmt.Fprintln(os.Stderr, "harness:", err)
		os.Exit(1)
	}
	out.Write(append(report, '\n'))
}
"#;

/// Package clause added to user code that lacks one
const PACKAGE_CLAUSE: &str = "package main\n\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct GoHarness;

impl HarnessTemplate for GoHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Go
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut data = String::from("var __harness_cases = [][2]string{\n");
        for (index, case) in cases.iter().enumerate() {
            let input = go_string_literal(&case.input.to_string());
            let expected = go_string_literal(&case.expected_output.to_string());
            check_case_size(index, &[&input, &expected], self.max_case_bytes())?;
            let _ = writeln!(data, "\t{{{input}, {expected}}},");
        }
        data.push_str("}\n");

        let mut source = SourceBuilder::new();
        source.prelude(PRELUDE).data(&data).entry(ENTRY);

        let has_package = user_code
            .lines()
            .any(|line| line.trim_start().starts_with("package "));
        let user_file = if has_package {
            user_code.to_owned()
        } else {
            format!("{PACKAGE_CLAUSE}{user_code}")
        };
        Ok(Program::new(source.finish()).with_user_code(user_file))
    }
}
