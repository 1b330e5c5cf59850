//! The test matrix: the set of configurations every image runs under.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::runner::TestCase;
use crate::stage::PipelineMode;
use crate::types::{Configuration, Encoder, Filter, ImageId, PipelineError, Quality};

/// A non-empty list of uniquely named configurations.
///
/// Deserializes from a JSON array of configuration objects. Each entry
/// needs a `name`; `quality` (default 1024), `filter` (default
/// `linear`), `encoder` (default `contextual`) and `downsampling`
/// (default 0) are optional.
///
/// Order matters: cases are planned configuration-major, and when
/// several configurations fail on one image the last one in matrix
/// order owns the quarantine entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Configuration>", into = "Vec<Configuration>")]
pub struct TestMatrix(Vec<Configuration>);

impl TestMatrix {
    /// Build a matrix from configurations.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyMatrix`] for an empty list and
    /// [`PipelineError::DuplicateConfigName`] if two configurations share
    /// a name (they would overwrite each other's artifacts).
    pub fn new(configurations: Vec<Configuration>) -> Result<Self, PipelineError> {
        if configurations.is_empty() {
            return Err(PipelineError::EmptyMatrix);
        }
        let mut seen = HashSet::with_capacity(configurations.len());
        for config in &configurations {
            if !seen.insert(config.name()) {
                return Err(PipelineError::DuplicateConfigName(config.name().to_owned()));
            }
        }
        Ok(Self(configurations))
    }

    /// A matrix of exactly one configuration.
    #[must_use]
    pub fn single(configuration: Configuration) -> Self {
        Self(vec![configuration])
    }

    #[must_use]
    pub fn configurations(&self) -> &[Configuration] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A validated matrix is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cartesian product of configurations and images.
    ///
    /// Cases are ordered configuration-major, then in image order.
    #[must_use]
    pub fn cases<'m>(&'m self, images: &[ImageId], mode: PipelineMode) -> Vec<TestCase<'m>> {
        self.0
            .iter()
            .flat_map(|config| {
                images
                    .iter()
                    .map(move |image| TestCase::new(image.clone(), config, mode))
            })
            .collect()
    }
}

impl Default for TestMatrix {
    /// The built-in regression matrix: one lossless and two lossy points.
    fn default() -> Self {
        let entries = [
            ("lossless_linear_turbo", Quality::LOSSLESS, Filter::Linear, Encoder::Turbo),
            ("lossy_cubic_fast", Quality(124), Filter::Cubic, Encoder::Fast),
            ("lossy_cubic_contextual", Quality(64), Filter::Cubic, Encoder::Contextual),
        ];
        Self(
            entries
                .into_iter()
                .map(|(name, quality, filter, encoder)| Configuration {
                    name: name.to_owned(),
                    quality,
                    filter,
                    encoder,
                    downsampling: 0,
                })
                .collect(),
        )
    }
}

impl TryFrom<Vec<Configuration>> for TestMatrix {
    type Error = PipelineError;

    fn try_from(configurations: Vec<Configuration>) -> Result<Self, Self::Error> {
        Self::new(configurations)
    }
}

impl From<TestMatrix> for Vec<Configuration> {
    fn from(matrix: TestMatrix) -> Self {
        matrix.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stage::StageKind;

    #[test]
    fn default_matrix_has_one_lossless_entry() {
        let matrix = TestMatrix::default();
        assert_eq!(matrix.len(), 3);
        let lossless: Vec<_> = matrix
            .configurations()
            .iter()
            .filter(|c| c.is_lossless())
            .map(Configuration::name)
            .collect();
        assert_eq!(lossless, ["lossless_linear_turbo"]);
        // Revalidating the built-in entries must succeed.
        assert!(TestMatrix::new(matrix.configurations().to_vec()).is_ok());
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert_eq!(TestMatrix::new(Vec::new()), Err(PipelineError::EmptyMatrix));
        let config =
            Configuration::try_new("dup", Quality::LOSSLESS, Filter::Linear, Encoder::Turbo, 0)
                .unwrap();
        assert_eq!(
            TestMatrix::new(vec![config.clone(), config]),
            Err(PipelineError::DuplicateConfigName("dup".to_owned()))
        );
    }

    #[test]
    fn deserializes_from_json_array() {
        let matrix: TestMatrix = serde_json::from_str(
            r#"[
                {"name": "ll", "quality": 1024, "filter": "linear", "encoder": "turbo"},
                {"name": "lossy", "quality": 200, "filter": "cubic", "encoder": "fast", "downsampling": 1}
            ]"#,
        )
        .unwrap();
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.configurations()[1].downsampling(), 1);
        assert!(serde_json::from_str::<TestMatrix>("[]").is_err());
        assert!(serde_json::from_str::<TestMatrix>(r#"[{"name": "a"}, {"name": "a"}]"#).is_err());
    }

    #[test]
    fn cases_are_configuration_major() {
        let matrix = TestMatrix::default();
        let images = [
            ImageId::new("a.png").unwrap(),
            ImageId::new("b.png").unwrap(),
        ];
        let cases = matrix.cases(&images, PipelineMode::Separate);
        assert_eq!(cases.len(), 6);
        assert_eq!(cases[0].configuration().name(), "lossless_linear_turbo");
        assert_eq!(cases[1].image(), &images[1]);
        assert_eq!(cases[2].configuration().name(), "lossy_cubic_fast");
        assert!(cases[0].stages().contains(&StageKind::CompareRoundtrip));
        assert!(!cases[2].stages().contains(&StageKind::CompareRoundtrip));
    }
}
