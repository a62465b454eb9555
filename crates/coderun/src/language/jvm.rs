//! Adapters for JVM languages
//!
//! The generated entry point lives in `Main` and the user's code in
//! `Solution`; both file names are fixed so the public type name always
//! matches its file.

use crate::config::Toolchain;
use crate::harness::SourceRole;
use crate::language::{LanguageAdapter, SupportedLanguage};

#[derive(Debug, Clone)]
pub struct JavaAdapter {
    toolchain: Toolchain,
}

impl JavaAdapter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl LanguageAdapter for JavaAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Java
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn file_name(&self, role: SourceRole) -> &'static str {
        match role {
            SourceRole::Entry => "Main.java",
            SourceRole::UserCode => "Solution.java",
        }
    }

    /// Name of the class holding `main`
    fn binary_name(&self) -> &'static str {
        "Main"
    }
}

#[derive(Debug, Clone)]
pub struct KotlinAdapter {
    toolchain: Toolchain,
}

impl KotlinAdapter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

impl LanguageAdapter for KotlinAdapter {
    fn language(&self) -> SupportedLanguage {
        SupportedLanguage::Kotlin
    }

    fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn file_name(&self, role: SourceRole) -> &'static str {
        match role {
            SourceRole::Entry => "Main.kt",
            SourceRole::UserCode => "Solution.kt",
        }
    }
}
