//! Where the external tools live.

use std::path::{Path, PathBuf};

use gfwx_regress_pipeline::{IntentPolicy, Tool};

/// Resolved executable path for every [`Tool`], plus the policy for the
/// `--intent bgr` flag passed to the codec under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    compressor: PathBuf,
    decompressor: PathBuf,
    comparator: PathBuf,
    reference: PathBuf,
    combined: PathBuf,
    intent: IntentPolicy,
}

impl Toolchain {
    /// Every tool under its default file name inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            compressor: dir.join(Tool::Compressor.default_file_name()),
            decompressor: dir.join(Tool::Decompressor.default_file_name()),
            comparator: dir.join(Tool::Comparator.default_file_name()),
            reference: dir.join(Tool::Reference.default_file_name()),
            combined: dir.join(Tool::Combined.default_file_name()),
            intent: IntentPolicy::default(),
        }
    }

    /// Use `program` for `tool` instead of the default location.
    #[must_use]
    pub fn with_program(mut self, tool: Tool, program: impl Into<PathBuf>) -> Self {
        *self.slot(tool) = program.into();
        self
    }

    #[must_use]
    pub const fn with_intent(mut self, intent: IntentPolicy) -> Self {
        self.intent = intent;
        self
    }

    /// Executable for `tool`.
    #[must_use]
    pub fn program(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Compressor => &self.compressor,
            Tool::Decompressor => &self.decompressor,
            Tool::Comparator => &self.comparator,
            Tool::Reference => &self.reference,
            Tool::Combined => &self.combined,
        }
    }

    #[must_use]
    pub const fn intent(&self) -> IntentPolicy {
        self.intent
    }

    fn slot(&mut self, tool: Tool) -> &mut PathBuf {
        match tool {
            Tool::Compressor => &mut self.compressor,
            Tool::Decompressor => &mut self.decompressor,
            Tool::Comparator => &mut self.comparator,
            Tool::Reference => &mut self.reference,
            Tool::Combined => &mut self.combined,
        }
    }
}

impl Default for Toolchain {
    /// Tools in the working directory.
    fn default() -> Self {
        Self::in_dir(Path::new("."))
    }
}
