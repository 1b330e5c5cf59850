//! Argument lists for the external codec tools.
//!
//! The harness never links the codec; it drives black-box executables.
//! This module only decides *which* tool runs with *which* arguments.
//! Locating and spawning the executables is up to the caller.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use crate::types::{Configuration, IntentPolicy};

/// The external executables a test run depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Codec under test, compression direction.
    Compressor,
    /// Codec under test, decompression direction.
    Decompressor,
    /// Pixel-level image comparator.
    Comparator,
    /// Independently built reference encoder.
    Reference,
    /// Compress-then-decompress test tool.
    Combined,
}

impl Tool {
    pub const ALL: [Self; 5] = [
        Self::Compressor,
        Self::Decompressor,
        Self::Comparator,
        Self::Reference,
        Self::Combined,
    ];

    /// Executable file name looked up in the tools directory.
    #[must_use]
    pub const fn default_file_name(self) -> &'static str {
        match self {
            Self::Compressor => "compress",
            Self::Decompressor => "decompress",
            Self::Comparator => "compare",
            Self::Reference => "reference_test_app",
            Self::Combined => "test_app",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_file_name())
    }
}

/// A tool together with its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub tool: Tool,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    /// `compress INPUT OUTPUT --quality N --filter F --encoder E [--intent bgr]`
    #[must_use]
    pub fn compress(
        source: &Path,
        output: &Path,
        config: &Configuration,
        intent: IntentPolicy,
    ) -> Self {
        let mut args: Vec<OsString> = vec![source.into(), output.into()];
        push_codec_flags(&mut args, config, intent);
        Self {
            tool: Tool::Compressor,
            args,
        }
    }

    /// `decompress INPUT OUTPUT --downsampling N`
    #[must_use]
    pub fn decompress(compressed: &Path, output: &Path, config: &Configuration) -> Self {
        Self {
            tool: Tool::Decompressor,
            args: vec![
                compressed.into(),
                output.into(),
                "--downsampling".into(),
                config.downsampling().to_string().into(),
            ],
        }
    }

    /// `compare IMAGE_A IMAGE_B`
    #[must_use]
    pub fn compare(a: &Path, b: &Path) -> Self {
        Self {
            tool: Tool::Comparator,
            args: vec![a.into(), b.into()],
        }
    }

    /// `reference_test_app INPUT OUTPUT QUALITY FILTER ENCODER`, all
    /// positional.
    #[must_use]
    pub fn reference(source: &Path, output: &Path, config: &Configuration) -> Self {
        Self {
            tool: Tool::Reference,
            args: vec![
                source.into(),
                output.into(),
                config.quality().to_string().into(),
                config.filter().as_arg().into(),
                config.encoder().as_arg().into(),
            ],
        }
    }

    /// `test_app INPUT OUTPUT.GFWX OUTPUT --quality N --filter F --encoder E [--intent bgr]`
    #[must_use]
    pub fn combined(
        source: &Path,
        compressed: &Path,
        decompressed: &Path,
        config: &Configuration,
        intent: IntentPolicy,
    ) -> Self {
        let mut args: Vec<OsString> = vec![source.into(), compressed.into(), decompressed.into()];
        push_codec_flags(&mut args, config, intent);
        Self {
            tool: Tool::Combined,
            args,
        }
    }
}

fn push_codec_flags(args: &mut Vec<OsString>, config: &Configuration, intent: IntentPolicy) {
    let flags: [OsString; 6] = [
        "--quality".into(),
        config.quality().to_string().into(),
        "--filter".into(),
        config.filter().as_arg().into(),
        "--encoder".into(),
        config.encoder().as_arg().into(),
    ];
    args.extend(flags);
    if intent.applies_to(config.quality()) {
        args.push("--intent".into());
        args.push("bgr".into());
    }
}
