//! Shared types for the gfwx-regress test pipeline.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Codec quality parameter.
///
/// [`Quality::LOSSLESS`] (1024) selects lossless coding; every smaller
/// value is a lossy quality whose meaning is opaque to the harness.
/// Zero is rejected, matching the reference implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Quality(pub(crate) u16);

impl Quality {
    /// Sentinel quality meaning "no information loss".
    pub const LOSSLESS: Self = Self(1024);

    /// Smallest accepted quality.
    pub const MIN: u16 = 1;

    /// Create a quality value.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidQuality`] if `value` is outside
    /// `1..=1024`.
    pub const fn new(value: u16) -> Result<Self, PipelineError> {
        if value < Self::MIN || value > Self::LOSSLESS.0 {
            return Err(PipelineError::InvalidQuality(value));
        }
        Ok(Self(value))
    }

    /// The raw quality number passed to the codec tools.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns `true` for the lossless sentinel.
    #[must_use]
    pub const fn is_lossless(self) -> bool {
        self.0 == Self::LOSSLESS.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::LOSSLESS
    }
}

impl TryFrom<u16> for Quality {
    type Error = PipelineError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for u16 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Wavelet lifting filter selected for compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Linear (5/3-style) lifting.
    #[default]
    Linear,
    /// Cubic lifting.
    Cubic,
}

impl Filter {
    /// The spelling the codec tools accept on their command lines.
    #[must_use]
    pub const fn as_arg(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Cubic => "cubic",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for Filter {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "cubic" => Ok(Self::Cubic),
            other => Err(PipelineError::UnknownFilter(other.to_owned())),
        }
    }
}

/// Entropy encoder selected for compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoder {
    /// Fastest, least compact.
    Turbo,
    /// Fast adaptive coding.
    Fast,
    /// Context-modelling coder, most compact.
    #[default]
    Contextual,
}

impl Encoder {
    /// The spelling the codec tools accept on their command lines.
    #[must_use]
    pub const fn as_arg(self) -> &'static str {
        match self {
            Self::Turbo => "turbo",
            Self::Fast => "fast",
            Self::Contextual => "contextual",
        }
    }
}

impl fmt::Display for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for Encoder {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "turbo" => Ok(Self::Turbo),
            "fast" => Ok(Self::Fast),
            "contextual" => Ok(Self::Contextual),
            other => Err(PipelineError::UnknownEncoder(other.to_owned())),
        }
    }
}

/// When the compressor is told to treat pixels as BGR.
///
/// The reference implementation always encodes with BGR intent, so
/// byte-exact comparison generally needs [`IntentPolicy::Always`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentPolicy {
    /// Pass `--intent bgr` on every compression.
    #[default]
    Always,
    /// Pass `--intent bgr` only for lossy configurations.
    LossyOnly,
    /// Never pass an intent flag.
    Never,
}

impl IntentPolicy {
    /// Whether the intent flag applies at the given quality.
    #[must_use]
    pub const fn applies_to(self, quality: Quality) -> bool {
        match self {
            Self::Always => true,
            Self::LossyOnly => !quality.is_lossless(),
            Self::Never => false,
        }
    }
}

/// One named point of the test matrix.
///
/// Fields are crate-private so every instance has passed validation: the
/// name is non-empty and usable as a single directory component,
/// since artifacts are namespaced by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ConfigurationSpec")]
pub struct Configuration {
    pub(crate) name: String,
    pub(crate) quality: Quality,
    pub(crate) filter: Filter,
    pub(crate) encoder: Encoder,
    pub(crate) downsampling: u8,
}

/// Unvalidated shape of a [`Configuration`], as read from JSON.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigurationSpec {
    name: String,
    #[serde(default)]
    quality: Quality,
    #[serde(default)]
    filter: Filter,
    #[serde(default)]
    encoder: Encoder,
    #[serde(default)]
    downsampling: u8,
}

impl TryFrom<ConfigurationSpec> for Configuration {
    type Error = PipelineError;

    fn try_from(spec: ConfigurationSpec) -> Result<Self, Self::Error> {
        Self::try_new(
            spec.name,
            spec.quality,
            spec.filter,
            spec.encoder,
            spec.downsampling,
        )
    }
}

impl Configuration {
    /// Create a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfigName`] if `name` is empty,
    /// `.`/`..`, or contains a path separator.
    pub fn try_new(
        name: impl Into<String>,
        quality: Quality,
        filter: Filter,
        encoder: Encoder,
        downsampling: u8,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        let is_single_component = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        if !is_single_component {
            return Err(PipelineError::InvalidConfigName(name));
        }
        Ok(Self {
            name,
            quality,
            filter,
            encoder,
            downsampling,
        })
    }

    /// Matrix entry name; also the artifact namespace directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn quality(&self) -> Quality {
        self.quality
    }

    #[must_use]
    pub const fn filter(&self) -> Filter {
        self.filter
    }

    #[must_use]
    pub const fn encoder(&self) -> Encoder {
        self.encoder
    }

    /// Downsampling scale passed to the decompressor (0 = full size).
    #[must_use]
    pub const fn downsampling(&self) -> u8 {
        self.downsampling
    }

    /// Shorthand for `self.quality().is_lossless()`.
    #[must_use]
    pub const fn is_lossless(&self) -> bool {
        self.quality.is_lossless()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (quality={}, filter={}, encoder={}, downsampling={})",
            self.name, self.quality, self.filter, self.encoder, self.downsampling,
        )
    }
}

/// An image identifier: its path relative to the corpus root.
///
/// Only normal components are allowed, so joining an `ImageId` onto
/// any root can never escape that root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ImageId(PathBuf);

impl ImageId {
    /// Wrap a corpus-relative path.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotRelative`] if the path is empty or has
    /// any root, prefix, `.` or `..` component.
    pub fn new(relative: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let relative = relative.into();
        let well_formed = relative.components().next().is_some()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(PipelineError::NotRelative(relative));
        }
        Ok(Self(relative))
    }

    /// The relative path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Last component, extension included. Derived artifacts are named
    /// after it, so `cat.png` and `cat.PNG` never share an artifact.
    #[must_use]
    pub fn file_name(&self) -> &std::ffi::OsStr {
        self.0.file_name().unwrap_or_default()
    }

    /// Directory part of the relative path (empty at the corpus root).
    #[must_use]
    pub fn parent(&self) -> &Path {
        self.0.parent().unwrap_or_else(|| Path::new(""))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.display(), f)
    }
}

/// Errors raised while building configurations and test plans.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Quality outside `1..=1024`.
    #[error("quality must be between 1 and 1024, got {0}")]
    InvalidQuality(u16),

    /// Unrecognised filter spelling.
    #[error("unknown filter '{0}' (expected linear or cubic)")]
    UnknownFilter(String),

    /// Unrecognised encoder spelling.
    #[error("unknown encoder '{0}' (expected turbo, fast or contextual)")]
    UnknownEncoder(String),

    /// Configuration name cannot serve as a directory namespace.
    #[error("invalid configuration name '{0}'")]
    InvalidConfigName(String),

    /// Two matrix entries share a name and would share artifacts.
    #[error("duplicate configuration name '{0}'")]
    DuplicateConfigName(String),

    /// The matrix has no configurations.
    #[error("test matrix is empty")]
    EmptyMatrix,

    /// An image identifier that is not a plain relative path.
    #[error("image path must be relative to the corpus root: {}", .0.display())]
    NotRelative(PathBuf),
}
