//! Harness generation
//!
//! A harness is the program that actually runs: the user's code plus a
//! generated entry point that calls the user's `solve` on every embedded
//! test case and prints one JSON array as the last line of stdout:
//!
//! ```text
//! [{"index":0,"actualOutput":[0,1],"passed":true,"executionTimeMs":0.04}, ...]
//! ```
//!
//! An entry may also carry an `error` string when `solve` raised or its
//! result could not be represented as JSON. Everything else the program
//! prints is routed to stderr.
//!
//! Source text is assembled append-only from four sections (prelude, data
//! declarations, user code, entry point). Test data is embedded through a
//! per-language literal encoder, never by splicing raw text into a template.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

pub use crate::harness::literal::{nesting_depth, text_form};

use crate::language::SupportedLanguage;
use crate::types::TestCase;

mod bash;
mod cpp;
mod go;
mod java;
mod javascript;
mod kotlin;
pub mod literal;
mod objc;
mod python;
mod rust;
mod swift;

/// Identifier prefix reserved for generated code
pub const RESERVED_PREFIX: &str = "__harness_";

/// Deepest array/object nesting accepted in test data
pub const MAX_NESTING_DEPTH: usize = 64;

/// Default cap on the encoded size of a single test case
pub const DEFAULT_MAX_CASE_BYTES: usize = 8 * 1024 * 1024;

/// Errors that occur while generating a harness
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("no harness template for language '{0}'")]
    UnsupportedLanguage(SupportedLanguage),

    #[error("user code must not use the reserved identifier prefix '{prefix}'", prefix = RESERVED_PREFIX)]
    ReservedIdentifier,

    #[error("test case {index}: nesting exceeds {max} levels", max = MAX_NESTING_DEPTH)]
    NestingTooDeep { index: usize },

    #[error("test case {index}: encoded data is {size} bytes, limit is {limit}")]
    LiteralTooLarge {
        index: usize,
        size: usize,
        limit: usize,
    },

    #[error("test case {index}: {reason}")]
    Unrepresentable { index: usize, reason: String },
}

/// Which part of a program a source file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRole {
    /// The file holding the program's entry point
    Entry,

    /// The user's code, for languages that keep it in its own file
    UserCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub role: SourceRole,
    pub contents: String,
}

/// Program text ready to be materialized by a language adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    entry: SourceFile,
    user_code: Option<SourceFile>,
}

impl Program {
    /// A program consisting of a single entry file
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: SourceFile {
                role: SourceRole::Entry,
                contents: entry.into(),
            },
            user_code: None,
        }
    }

    /// Keep the user's code in a file of its own
    pub fn with_user_code(mut self, code: impl Into<String>) -> Self {
        self.user_code = Some(SourceFile {
            role: SourceRole::UserCode,
            contents: code.into(),
        });
        self
    }

    pub fn entry(&self) -> &SourceFile {
        &self.entry
    }

    pub fn user_code(&self) -> Option<&SourceFile> {
        self.user_code.as_ref()
    }

    /// Every file, entry first
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        std::iter::once(&self.entry).chain(self.user_code.as_ref())
    }
}

/// Per-language harness template
pub trait HarnessTemplate: fmt::Debug + Send + Sync {
    fn language(&self) -> SupportedLanguage;

    /// Cap on the encoded size of one test case's data
    fn max_case_bytes(&self) -> usize {
        DEFAULT_MAX_CASE_BYTES
    }

    /// Build the program. `cases` have been validated for nesting depth and
    /// `user_code` for reserved identifiers.
    fn render(&self, user_code: &str, cases: &[TestCase]) -> Result<Program, HarnessError>;
}

/// Produces harness programs from user code and test cases
///
/// Built once and shared; the template table is immutable.
#[derive(Debug, Clone)]
pub struct HarnessGenerator {
    templates: Arc<HashMap<SupportedLanguage, Arc<dyn HarnessTemplate>>>,
}

impl HarnessGenerator {
    /// Generator with a template for every supported language
    pub fn new() -> Self {
        let templates: [Arc<dyn HarnessTemplate>; 10] = [
            Arc::new(python::PythonHarness),
            Arc::new(javascript::JavaScriptHarness),
            Arc::new(java::JavaHarness),
            Arc::new(kotlin::KotlinHarness),
            Arc::new(cpp::CppHarness),
            Arc::new(go::GoHarness),
            Arc::new(rust::RustHarness),
            Arc::new(swift::SwiftHarness),
            Arc::new(objc::ObjectiveCHarness),
            Arc::new(bash::BashHarness),
        ];
        Self::with_templates(templates)
    }

    /// Generator holding exactly the given templates
    pub fn with_templates(templates: impl IntoIterator<Item = Arc<dyn HarnessTemplate>>) -> Self {
        let templates = templates
            .into_iter()
            .map(|template| (template.language(), template))
            .collect();
        Self {
            templates: Arc::new(templates),
        }
    }

    pub fn supports(&self, language: SupportedLanguage) -> bool {
        self.templates.contains_key(&language)
    }

    /// Generate the harness for `cases`, reported with indices `0..cases.len()`
    #[instrument(skip(self, user_code, cases), fields(cases = cases.len()))]
    pub fn generate(
        &self,
        language: SupportedLanguage,
        user_code: &str,
        cases: &[TestCase],
    ) -> Result<Program, HarnessError> {
        let template = self
            .templates
            .get(&language)
            .ok_or(HarnessError::UnsupportedLanguage(language))?;

        if user_code.contains(RESERVED_PREFIX) {
            return Err(HarnessError::ReservedIdentifier);
        }
        for (index, case) in cases.iter().enumerate() {
            if nesting_depth(&case.input) > MAX_NESTING_DEPTH
                || nesting_depth(&case.expected_output) > MAX_NESTING_DEPTH
            {
                return Err(HarnessError::NestingTooDeep { index });
            }
        }

        let program = template.render(user_code, cases)?;
        debug!(
            entry_len = program.entry().contents.len(),
            split = program.user_code().is_some(),
            "generated harness"
        );
        Ok(program)
    }
}

impl Default for HarnessGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject a case whose encoded data exceeds the template's cap
pub(crate) fn check_case_size(
    index: usize,
    encoded: &[&str],
    limit: usize,
) -> Result<(), HarnessError> {
    let size = encoded.iter().map(|part| part.len()).sum();
    if size > limit {
        return Err(HarnessError::LiteralTooLarge { index, size, limit });
    }
    Ok(())
}

/// Append-only assembly of one source file
#[derive(Debug, Default)]
pub(crate) struct SourceBuilder {
    prelude: String,
    data: String,
    user_code: String,
    entry: String,
}

impl SourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prelude(&mut self, text: &str) -> &mut Self {
        self.prelude.push_str(text);
        self
    }

    pub fn data(&mut self, text: &str) -> &mut Self {
        self.data.push_str(text);
        self
    }

    pub fn user_code(&mut self, code: &str) -> &mut Self {
        self.user_code.push_str(code);
        if !code.ends_with('\n') {
            self.user_code.push('\n');
        }
        self
    }

    pub fn entry(&mut self, text: &str) -> &mut Self {
        self.entry.push_str(text);
        self
    }

    /// Concatenate the sections in order
    pub fn finish(self) -> String {
        let mut out = String::with_capacity(
            self.prelude.len() + self.data.len() + self.user_code.len() + self.entry.len() + 3,
        );
        for section in [self.prelude, self.data, self.user_code, self.entry] {
            if section.is_empty() {
                continue;
            }
            if !out.is_empty() && !out.ends_with("\n\n") {
                out.push('\n');
            }
            out.push_str(&section);
        }
        out
    }
}
