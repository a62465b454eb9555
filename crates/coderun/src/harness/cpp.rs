//! C++ harness
//!
//! The user implements `json solve(const json& input)` over nlohmann::json,
//! whose equality already compares numbers by value and objects by key.
//! Test data is embedded as JSON text in C string literals.

use std::fmt::Write;

use crate::harness::literal::c_string_literal;
use crate::harness::{HarnessError, HarnessTemplate, Program, SourceBuilder, check_case_size};
use crate::language::SupportedLanguage;
use crate::types::TestCase;

const PRELUDE: &str = r#"#include <algorithm>
#include <array>
#include <bitset>
#include <chrono>
#include <climits>
#include <cmath>
#include <cstdint>
#include <cstdio>
#include <cstring>
#include <deque>
#include <functional>
#include <iostream>
#include <iterator>
#include <limits>
#include <list>
#include <map>
#include <memory>
#include <new>
#include <numeric>
#include <queue>
#include <set>
#include <sstream>
#include <stack>
#include <stdexcept>
#include <string>
#include <tuple>
#include <unordered_map>
#include <unordered_set>
#include <utility>
#include <vector>

#include <unistd.h>

#include <nlohmann/json.hpp>

using json = nlohmann::json;
using namespace std;
"#;

const ENTRY: &str = r#"static double __harness_elapsed_ms(std::chrono::steady_clock::time_point start) {
    auto elapsed = std::chrono::steady_clock::now() - start;
    return std::chrono::duration<double, std::milli>(elapsed).count();
}

static void __harness_write_all(int fd, const std::string& text) {
    size_t offset = 0;
    while (offset < text.size()) {
        ssize_t written = ::write(fd, text.data() + offset, text.size() - offset);
        if (written <= 0) {
            return;
        }
        offset += static_cast<size_t>(written);
    }
}

int main() {
    std::fflush(stdout);
    int __harness_out = ::dup(STDOUT_FILENO);
    ::dup2(STDERR_FILENO, STDOUT_FILENO);

    json results = json::array();
    for (size_t index = 0; index < __harness_cases.size(); ++index) {
        json input = json::parse(__harness_cases[index].first);
        json expected = json::parse(__harness_cases[index].second);
        json entry = {
            {"index", index},
            {"actualOutput", nullptr},
            {"passed", false},
            {"executionTimeMs", 0.0},
        };

        auto start = std::chrono::steady_clock::now();
        try {
            json actual = solve(input);
            entry["executionTimeMs"] = __harness_elapsed_ms(start);
            entry["passed"] = actual == expected;
            entry["actualOutput"] = std::move(actual);
        } catch (const std::bad_alloc&) {
            throw;
        } catch (const std::exception& e) {
            entry["executionTimeMs"] = __harness_elapsed_ms(start);
            entry["error"] = std::string("exception: ") + e.what();
        } catch (...) {
            entry["executionTimeMs"] = __harness_elapsed_ms(start);
            entry["error"] = "unknown exception";
        }
        results.push_back(std::move(entry));
    }

    std::cout.flush();
    std::fflush(stdout);
    __harness_write_all(
        __harness_out, results.dump(-1, ' ', true, json::error_handler_t::replace) + "\n");
    return 0;
}
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct CppHarness;

impl HarnessTemplate for CppHarness {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Cpp
    }

    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError> {
        let mut data = String::from(
            "static const std::vector<std::pair<const char*, const char*>> __harness_cases = {\n",
        );
        for (index, case) in cases.iter().enumerate() {
            let input = c_string_literal(&case.input.to_string());
            let expected = c_string_literal(&case.expected_output.to_string());
            check_case_size(index, &[&input, &expected], self.max_case_bytes())?;
            let _ = writeln!(data, "    {{{input}, {expected}}},");
        }
        data.push_str("};\n");

        let mut source = SourceBuilder::new();
        source
            .prelude(PRELUDE)
            .data(&data)
            .user_code(user_code)
            .entry(ENTRY);
        Ok(Program::new(source.finish()))
    }
}
