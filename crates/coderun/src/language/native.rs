//! Adapters for languages compiled to a native executable
//!
//! Each compiles into the workspace as `main` and runs that binary.

use crate::config::Toolchain;
use crate::harness::SourceRole;
use crate::language::{LanguageAdapter, SupportedLanguage};

#[derive(Debug, Clone)]
pub struct CppAdapter {
    toolchain: Toolchain,
}

impl CppAdapter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl LanguageAdapter for CppAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Cpp
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn file_name(&self, _role: SourceRole) -> &'static str {
        "main.cpp"
    }
}

/// Go keeps the user's code in its own file of package `main`, so compiler
/// diagnostics point at the user's own line numbers.
#[derive(Debug, Clone)]
pub struct GoAdapter {
    toolchain: Toolchain,
}

impl GoAdapter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl LanguageAdapter for GoAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Go
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn file_name(&self, role: SourceRole) -> &'static str {
        match role {
            SourceRole::Entry => "main.go",
            SourceRole::UserCode => "solution.go",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RustAdapter {
    toolchain: Toolchain,
}

impl RustAdapter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl LanguageAdapter for RustAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Rust
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn file_name(&self, _role: SourceRole) -> &'static str {
        "main.rs"
    }
}

#[derive(Debug, Clone)]
pub struct SwiftAdapter {
    toolchain: Toolchain,
}

impl SwiftAdapter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl LanguageAdapter for SwiftAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Swift
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    // swiftc only allows top-level statements in a file named main.swift
    fn file_name(&self, _role: SourceRole) -> &'static str {
        "main.swift"
    }
}

#[derive(Debug, Clone)]
pub struct ObjectiveCAdapter {
    toolchain: Toolchain,
}

impl ObjectiveCAdapter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl LanguageAdapter for ObjectiveCAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::ObjectiveC
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn file_name(&self, _role: SourceRole) -> &'static str {
        "main.m"
    }
}
