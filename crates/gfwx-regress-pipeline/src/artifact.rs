//! Deterministic artifact and quarantine path derivation.
//!
//! Every path is a pure function of the roots, the image identifier,
//! the configuration name and the artifact kind. Rerunning a test case
//! therefore overwrites its previous artifacts instead of adding new
//! ones, and two configurations never share an artifact path.
//!
//! ```text
//! <output_root>/<configuration>/<image dir>/<image file name>.gfwx
//! <output_root>/<configuration>/<image dir>/<image file name>
//! <output_root>/<configuration>/<image dir>/<image file name>.orig_gfwx
//! <quarantine_root>/<image dir>/<image file name>
//! ```
//!
//! Directory creation is not done here; see `gfwx-regress-io`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::types::ImageId;

/// The kinds of file a test case produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Bitstream written by the codec under test.
    Compressed,
    /// Image written by the decompressor.
    Decompressed,
    /// Bitstream written by the reference implementation.
    ReferenceCompressed,
}

impl ArtifactKind {
    /// All artifact kinds.
    pub const ALL: [Self; 3] = [Self::Compressed, Self::Decompressed, Self::ReferenceCompressed];

    /// Suffix appended to the image file name. The decompressed image
    /// keeps the source's name.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Compressed => ".gfwx",
            Self::Decompressed => "",
            Self::ReferenceCompressed => ".orig_gfwx",
        }
    }
}

/// Output and quarantine roots for one run.
///
/// Passed explicitly to everything that derives paths, so runs with
/// distinct roots never interfere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    output_root: PathBuf,
    quarantine_root: PathBuf,
}

impl ArtifactLayout {
    /// Default output directory name, relative to the working directory.
    pub const DEFAULT_OUTPUT_DIR: &'static str = "gfwx_out";

    /// Default quarantine directory name, relative to the working directory.
    pub const DEFAULT_QUARANTINE_DIR: &'static str = "gfwx_fails";

    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>, quarantine_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            quarantine_root: quarantine_root.into(),
        }
    }

    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    #[must_use]
    pub fn quarantine_root(&self) -> &Path {
        &self.quarantine_root
    }

    /// Path of one artifact of one test case.
    #[must_use]
    pub fn path_for(&self, image: &ImageId, configuration: &str, kind: ArtifactKind) -> PathBuf {
        let mut file_name = OsString::from(image.file_name());
        file_name.push(kind.suffix());
        self.output_root
            .join(configuration)
            .join(image.parent())
            .join(file_name)
    }

    /// All artifact paths of one test case.
    #[must_use]
    pub fn paths_for(&self, image: &ImageId, configuration: &str) -> ArtifactPaths {
        ArtifactPaths {
            compressed: self.path_for(image, configuration, ArtifactKind::Compressed),
            decompressed: self.path_for(image, configuration, ArtifactKind::Decompressed),
            reference: self.path_for(image, configuration, ArtifactKind::ReferenceCompressed),
        }
    }

    /// Where a failing image is copied. Mirrors the corpus layout and
    /// ignores the configuration, so one image has one quarantine entry.
    #[must_use]
    pub fn quarantine_path_for(&self, image: &ImageId) -> PathBuf {
        self.quarantine_root.join(image.as_path())
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::new(Self::DEFAULT_OUTPUT_DIR, Self::DEFAULT_QUARANTINE_DIR)
    }
}

/// Resolved artifact paths for one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub compressed: PathBuf,
    pub decompressed: PathBuf,
    pub reference: PathBuf,
}

impl ArtifactPaths {
    #[must_use]
    pub fn get(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Compressed => &self.compressed,
            ArtifactKind::Decompressed => &self.decompressed,
            ArtifactKind::ReferenceCompressed => &self.reference,
        }
    }
}
