//! Run-wide aggregation of test results.
//!
//! The pass/fail polarity is explicit: a run passes if and only if every
//! recorded case has [`Outcome::Pass`]. A run with zero cases passes.

use std::fmt::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::runner::{Outcome, TestResult};
use crate::stage::{FailureReason, StageKind};
use crate::types::ImageId;

/// Exit status for a run where every case passed.
pub const EXIT_PASSED: u8 = 0;

/// Exit status for a run where at least one case failed.
pub const EXIT_FAILED: u8 = 1;

/// A failing input copied into quarantine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub image: ImageId,
    pub configuration: String,
    pub stage: StageKind,
    pub reason: FailureReason,
    pub quarantine_path: PathBuf,
}

impl FailureRecord {
    /// Build a record for a failed result; `None` for a passing one.
    #[must_use]
    pub fn for_result(result: &TestResult, quarantine_path: PathBuf) -> Option<Self> {
        match result.outcome {
            Outcome::Pass => None,
            Outcome::Fail { stage, reason, .. } => Some(Self {
                image: result.image.clone(),
                configuration: result.configuration.clone(),
                stage,
                reason,
                quarantine_path,
            }),
        }
    }
}

/// Accumulates one [`TestResult`] per case.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    results: Vec<TestResult>,
    failures: Vec<FailureRecord>,
}

impl Reporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished case.
    pub fn record(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// Record a quarantined failure.
    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.failures.push(failure);
    }

    #[must_use]
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_pass()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// `true` iff no recorded case failed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_pass())
    }

    /// [`EXIT_PASSED`] iff every case passed, [`EXIT_FAILED`] otherwise.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        if self.all_passed() {
            EXIT_PASSED
        } else {
            EXIT_FAILED
        }
    }

    /// Human-readable report: a header per configuration, one line per
    /// image, then a totals line.
    ///
    /// ```text
    /// ==== Case: lossless_linear_turbo
    ///     cat.png: OK
    ///     dog.png: reference failed to compress the image [compare-with-reference]
    /// 1 passed, 1 failed
    /// ```
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mut current: Option<&str> = None;
        for result in &self.results {
            if current != Some(result.configuration.as_str()) {
                let _ = writeln!(out, "==== Case: {}", result.configuration);
                current = Some(result.configuration.as_str());
            }
            match result.outcome {
                Outcome::Pass => {
                    let _ = writeln!(out, "\t{}: OK", result.image);
                }
                Outcome::Fail { stage, reason, .. } => {
                    let _ = writeln!(out, "\t{}: {reason} [{stage}]", result.image);
                }
            }
        }
        let _ = writeln!(out, "{} passed, {} failed", self.passed(), self.failed());
        out
    }

    /// Serializable snapshot of the run.
    #[must_use]
    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            passed: self.passed(),
            failed: self.failed(),
            all_passed: self.all_passed(),
            results: &self.results,
            failures: &self.failures,
        }
    }
}

/// JSON-friendly view of a [`Reporter`].
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub passed: usize,
    pub failed: usize,
    pub all_passed: bool,
    pub results: &'a [TestResult],
    pub failures: &'a [FailureRecord],
}
