//! Quarantine of failing inputs.
//!
//! The source image of every failed case is copied to the quarantine
//! root under its corpus-relative path, so the failures can be rerun as a
//! corpus of their own. Files are only ever added or overwritten: an
//! image failing in several configurations is copied once per failure,
//! and quarantine is never cleaned.

use std::fs;
use std::path::PathBuf;

use gfwx_regress_pipeline::{FailureRecord, TestResult};

use crate::error::HarnessError;
use crate::store::ArtifactStore;

/// Copies failing inputs into quarantine.
#[derive(Debug, Clone)]
pub struct FailureTriage {
    corpus_root: PathBuf,
    store: ArtifactStore,
}

impl FailureTriage {
    #[must_use]
    pub fn new(corpus_root: impl Into<PathBuf>, store: ArtifactStore) -> Self {
        Self {
            corpus_root: corpus_root.into(),
            store,
        }
    }

    /// Quarantine the input of `result` if it failed.
    ///
    /// Returns the record of the copied file, or `None` for a passing
    /// result (nothing is touched then).
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::CreateDir`] or [`HarnessError::Quarantine`]
    /// if the copy cannot be made.
    pub fn quarantine(&self, result: &TestResult) -> Result<Option<FailureRecord>, HarnessError> {
        let destination = self.store.layout().quarantine_path_for(&result.image);
        let Some(record) = FailureRecord::for_result(result, destination) else {
            return Ok(None);
        };

        self.store
            .ensure_container_exists(&record.quarantine_path)?;
        let source = self.corpus_root.join(result.image.as_path());
        fs::copy(&source, &record.quarantine_path).map_err(|e| HarnessError::Quarantine {
            from: source.clone(),
            to: record.quarantine_path.clone(),
            source: e,
        })?;
        log::info!(
            "quarantined {} ({}: {})",
            record.quarantine_path.display(),
            record.configuration,
            record.reason,
        );
        Ok(Some(record))
    }
}
