//! Pipeline stages and the order they run in.
//!
//! A test case is a fixed sequence of [`StageKind`]s. The sequence is a
//! pure function of the configuration's quality and the
//! [`PipelineMode`]; it is chosen once when the case is planned and
//! never reordered while running.

use std::fmt;

use serde::Serialize;

use crate::artifact::ArtifactKind;
use crate::types::Quality;

/// How compression and decompression are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    /// Separate compressor and decompressor executables.
    #[default]
    Separate,
    /// One combined tool that compresses and decompresses in a single
    /// invocation.
    Combined,
}

/// One atomic step of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Compress the source image with the codec under test.
    Compress,
    /// Decompress the artifact written by [`StageKind::Compress`].
    Decompress,
    /// Compress and decompress with the combined test tool.
    CompressDecompress,
    /// Compress with the reference implementation and require a
    /// byte-identical artifact.
    CompareWithReference,
    /// Require the decompressed image to be pixel-equal to the source.
    /// Lossless only.
    CompareRoundtrip,
}

const LOSSLESS_SEPARATE: [StageKind; 4] = [
    StageKind::Compress,
    StageKind::Decompress,
    StageKind::CompareWithReference,
    StageKind::CompareRoundtrip,
];

const LOSSY_SEPARATE: [StageKind; 3] = [
    StageKind::Compress,
    StageKind::Decompress,
    StageKind::CompareWithReference,
];

const LOSSLESS_COMBINED: [StageKind; 3] = [
    StageKind::CompressDecompress,
    StageKind::CompareWithReference,
    StageKind::CompareRoundtrip,
];

const LOSSY_COMBINED: [StageKind; 2] = [
    StageKind::CompressDecompress,
    StageKind::CompareWithReference,
];

/// The ordered stages for a configuration of the given quality.
///
/// Lossy configurations never include [`StageKind::CompareRoundtrip`]:
/// exact pixel equality is not expected after lossy coding.
#[must_use]
pub const fn stage_sequence(quality: Quality, mode: PipelineMode) -> &'static [StageKind] {
    match (mode, quality.is_lossless()) {
        (PipelineMode::Separate, true) => &LOSSLESS_SEPARATE,
        (PipelineMode::Separate, false) => &LOSSY_SEPARATE,
        (PipelineMode::Combined, true) => &LOSSLESS_COMBINED,
        (PipelineMode::Combined, false) => &LOSSY_COMBINED,
    }
}

impl StageKind {
    /// Short kebab-case label for reports and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::Decompress => "decompress",
            Self::CompressDecompress => "compress-decompress",
            Self::CompareWithReference => "compare-with-reference",
            Self::CompareRoundtrip => "compare-roundtrip",
        }
    }

    /// Artifacts this stage reads (besides the source image).
    #[must_use]
    pub const fn inputs(self) -> &'static [ArtifactKind] {
        match self {
            Self::Compress | Self::CompressDecompress => &[],
            Self::Decompress | Self::CompareWithReference => &[ArtifactKind::Compressed],
            Self::CompareRoundtrip => &[ArtifactKind::Decompressed],
        }
    }

    /// Artifacts this stage writes. Their containing directories must
    /// exist before the stage's tool runs.
    #[must_use]
    pub const fn outputs(self) -> &'static [ArtifactKind] {
        match self {
            Self::Compress => &[ArtifactKind::Compressed],
            Self::Decompress => &[ArtifactKind::Decompressed],
            Self::CompressDecompress => &[ArtifactKind::Compressed, ArtifactKind::Decompressed],
            Self::CompareWithReference => &[ArtifactKind::ReferenceCompressed],
            Self::CompareRoundtrip => &[],
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a stage failed.
///
/// Every variant is an expected outcome of testing a codec, not an
/// error of the harness itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// The compressor exited unsuccessfully.
    CompressFailed,
    /// The combined tool exited unsuccessfully.
    CombinedFailed,
    /// The decompressor exited unsuccessfully.
    DecompressFailed,
    /// The reference implementation exited unsuccessfully.
    ReferenceFailed,
    /// Reference and codec artifacts differ in at least one byte.
    ReferenceMismatch,
    /// The comparator found the decompressed image differs from the source.
    RoundtripMismatch,
}

impl FailureReason {
    /// Human-readable description used in the report.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::CompressFailed => "failed to compress image",
            Self::CombinedFailed => "failed to compress the image",
            Self::DecompressFailed => "failed to decompress the image",
            Self::ReferenceFailed => "reference failed to compress the image",
            Self::ReferenceMismatch => "reference produced different output",
            Self::RoundtripMismatch => "compressed and decompressed images are different",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of executing one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage succeeded; the next one may run.
    Pass,
    /// The stage failed; the test case stops here.
    Fail(FailureReason),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lossless_runs_roundtrip_last() {
        let stages = stage_sequence(Quality::LOSSLESS, PipelineMode::Separate);
        assert_eq!(
            stages,
            [
                StageKind::Compress,
                StageKind::Decompress,
                StageKind::CompareWithReference,
                StageKind::CompareRoundtrip,
            ]
        );
    }

    #[test]
    fn lossy_never_runs_roundtrip() {
        for value in [1, 64, 124, 1023] {
            let quality = Quality::new(value).unwrap();
            for mode in [PipelineMode::Separate, PipelineMode::Combined] {
                let stages = stage_sequence(quality, mode);
                assert!(
                    !stages.contains(&StageKind::CompareRoundtrip),
                    "quality {value} in {mode:?} includes roundtrip"
                );
                assert_eq!(stages.last(), Some(&StageKind::CompareWithReference));
            }
        }
    }

    #[test]
    fn combined_mode_replaces_compress_and_decompress() {
        let stages = stage_sequence(Quality::LOSSLESS, PipelineMode::Combined);
        assert_eq!(
            stages,
            [
                StageKind::CompressDecompress,
                StageKind::CompareWithReference,
                StageKind::CompareRoundtrip,
            ]
        );
    }

    #[test]
    fn every_input_is_written_by_an_earlier_stage() {
        for quality in [Quality::LOSSLESS, Quality::new(124).unwrap()] {
            for mode in [PipelineMode::Separate, PipelineMode::Combined] {
                let stages = stage_sequence(quality, mode);
                for (i, stage) in stages.iter().enumerate() {
                    for input in stage.inputs() {
                        assert!(
                            stages[..i].iter().any(|s| s.outputs().contains(input)),
                            "{stage} reads {input:?} before anything writes it"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn failure_messages() {
        assert_eq!(
            FailureReason::ReferenceFailed.to_string(),
            "reference failed to compress the image"
        );
        assert_eq!(
            FailureReason::ReferenceMismatch.to_string(),
            "reference produced different output"
        );
        assert_eq!(
            FailureReason::RoundtripMismatch.to_string(),
            "compressed and decompressed images are different"
        );
    }
}
