//! Test case execution: a small explicit state machine.
//!
//! ```text
//! Pending -> Running(0) -> Running(1) -> ... -> Passed
//!                 \             \
//!                  +-------------+----------> Failed(stage, reason)
//! ```
//!
//! Stages run in the case's fixed order. The first failing stage ends
//! the case: later stages read artifacts of earlier ones and mean
//! nothing after a failure. Terminal states are final.
//!
//! Actually executing a stage is delegated to a [`StageExecutor`], so
//! this module stays free of process and filesystem access.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::artifact::{ArtifactLayout, ArtifactPaths};
use crate::stage::{FailureReason, PipelineMode, StageKind, StageOutcome, stage_sequence};
use crate::types::{Configuration, ImageId};

/// One (image, configuration) pair with its planned stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase<'m> {
    image: ImageId,
    configuration: &'m Configuration,
    stages: &'static [StageKind],
}

impl<'m> TestCase<'m> {
    /// Plan a test case. The stage list is fixed here and never changes.
    #[must_use]
    pub const fn new(image: ImageId, configuration: &'m Configuration, mode: PipelineMode) -> Self {
        Self {
            image,
            configuration,
            stages: stage_sequence(configuration.quality(), mode),
        }
    }

    #[must_use]
    pub const fn image(&self) -> &ImageId {
        &self.image
    }

    #[must_use]
    pub const fn configuration(&self) -> &'m Configuration {
        self.configuration
    }

    #[must_use]
    pub const fn stages(&self) -> &'static [StageKind] {
        self.stages
    }
}

/// Everything a stage needs to run.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// Absolute (or working-directory relative) path of the source image.
    pub source: &'a Path,
    /// Artifact paths of this case.
    pub artifacts: &'a ArtifactPaths,
    /// Configuration under test.
    pub configuration: &'a Configuration,
}

/// Runs a single stage.
///
/// Implementations turn expected codec problems (non-zero exits,
/// mismatching outputs) into [`StageOutcome::Fail`]. `Err` is reserved
/// for environment problems that must abort the whole run.
pub trait StageExecutor {
    /// Fatal error type.
    type Error;

    /// Execute `stage` for the case described by `context`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the test environment is broken.
    fn execute(
        &self,
        stage: StageKind,
        context: &StageContext<'_>,
    ) -> Result<StageOutcome, Self::Error>;
}

/// Where a test case is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has run yet.
    Pending,
    /// The stage at `stage_index` is next to run.
    Running { stage_index: usize },
    /// Every stage passed.
    Passed,
    /// The stage at `stage_index` failed; no later stage ran.
    Failed {
        stage_index: usize,
        stage: StageKind,
        reason: FailureReason,
    },
}

impl RunState {
    /// `true` for [`RunState::Passed`] and [`RunState::Failed`].
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed { .. })
    }
}

/// Final verdict of one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    Pass,
    Fail {
        stage_index: usize,
        stage: StageKind,
        reason: FailureReason,
    },
}

impl Outcome {
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Result of one test case, produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    pub image: ImageId,
    pub configuration: String,
    pub outcome: Outcome,
    /// Number of stages that were executed (including a failing one).
    pub stages_run: usize,
}

/// Drives one [`TestCase`] through its stages.
#[derive(Debug)]
pub struct CaseRunner<'c, 'm> {
    case: &'c TestCase<'m>,
    source: PathBuf,
    artifacts: ArtifactPaths,
    state: RunState,
    stages_run: usize,
}

impl<'c, 'm> CaseRunner<'c, 'm> {
    /// Prepare a runner. `corpus_root` locates the source image;
    /// `layout` locates the artifacts.
    #[must_use]
    pub fn new(case: &'c TestCase<'m>, corpus_root: &Path, layout: &ArtifactLayout) -> Self {
        Self {
            case,
            source: corpus_root.join(case.image.as_path()),
            artifacts: layout.paths_for(&case.image, case.configuration.name()),
            state: RunState::Pending,
            stages_run: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    #[must_use]
    pub const fn artifacts(&self) -> &ArtifactPaths {
        &self.artifacts
    }

    /// Perform one transition. Terminal states are left unchanged.
    ///
    /// # Errors
    ///
    /// Propagates a fatal executor error; the state is left at the
    /// stage that could not be executed.
    pub fn step<E: StageExecutor>(&mut self, executor: &E) -> Result<RunState, E::Error> {
        let stages = self.case.stages;
        self.state = match self.state {
            RunState::Pending => {
                if stages.is_empty() {
                    RunState::Passed
                } else {
                    RunState::Running { stage_index: 0 }
                }
            }
            RunState::Running { stage_index } => {
                let stage = stages[stage_index];
                let context = StageContext {
                    source: &self.source,
                    artifacts: &self.artifacts,
                    configuration: self.case.configuration,
                };
                let outcome = executor.execute(stage, &context)?;
                self.stages_run += 1;
                match outcome {
                    StageOutcome::Pass if stage_index + 1 < stages.len() => RunState::Running {
                        stage_index: stage_index + 1,
                    },
                    StageOutcome::Pass => RunState::Passed,
                    StageOutcome::Fail(reason) => RunState::Failed {
                        stage_index,
                        stage,
                        reason,
                    },
                }
            }
            terminal @ (RunState::Passed | RunState::Failed { .. }) => terminal,
        };
        Ok(self.state)
    }

    /// Step until a terminal state is reached.
    ///
    /// # Errors
    ///
    /// Propagates a fatal executor error.
    pub fn run<E: StageExecutor>(mut self, executor: &E) -> Result<TestResult, E::Error> {
        while !self.step(executor)?.is_terminal() {}
        let outcome = match self.state {
            RunState::Failed {
                stage_index,
                stage,
                reason,
            } => Outcome::Fail {
                stage_index,
                stage,
                reason,
            },
            _ => Outcome::Pass,
        };
        Ok(TestResult {
            image: self.case.image.clone(),
            configuration: self.case.configuration.name().to_owned(),
            outcome,
            stages_run: self.stages_run,
        })
    }
}

/// Run a test case to completion.
///
/// # Errors
///
/// Propagates a fatal executor error.
pub fn run_case<E: StageExecutor>(
    case: &TestCase<'_>,
    corpus_root: &Path,
    layout: &ArtifactLayout,
    executor: &E,
) -> Result<TestResult, E::Error> {
    CaseRunner::new(case, corpus_root, layout).run(executor)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::convert::Infallible;

    use super::*;
    use crate::types::{Encoder, Filter, Quality};

    /// Records every executed stage and fails the one listed in `fail`.
    struct Scripted {
        fail: Option<(StageKind, FailureReason)>,
        executed: RefCell<Vec<StageKind>>,
    }

    impl Scripted {
        fn passing() -> Self {
            Self {
                fail: None,
                executed: RefCell::new(Vec::new()),
            }
        }

        fn failing_at(stage: StageKind, reason: FailureReason) -> Self {
            Self {
                fail: Some((stage, reason)),
                executed: RefCell::new(Vec::new()),
            }
        }
    }

    impl StageExecutor for Scripted {
        type Error = Infallible;

        fn execute(
            &self,
            stage: StageKind,
            _context: &StageContext<'_>,
        ) -> Result<StageOutcome, Infallible> {
            self.executed.borrow_mut().push(stage);
            Ok(match self.fail {
                Some((failing, reason)) if failing == stage => StageOutcome::Fail(reason),
                _ => StageOutcome::Pass,
            })
        }
    }

    /// Aborts at the first stage.
    struct Broken;

    impl StageExecutor for Broken {
        type Error = &'static str;

        fn execute(
            &self,
            _stage: StageKind,
            _context: &StageContext<'_>,
        ) -> Result<StageOutcome, &'static str> {
            Err("disk on fire")
        }
    }

    fn lossless() -> Configuration {
        Configuration::try_new("ll", Quality::LOSSLESS, Filter::Linear, Encoder::Turbo, 0).unwrap()
    }

    fn lossy() -> Configuration {
        Configuration::try_new("ly", Quality::new(124).unwrap(), Filter::Cubic, Encoder::Fast, 0)
            .unwrap()
    }

    fn run(config: &Configuration, executor: &Scripted) -> TestResult {
        let case = TestCase::new(
            ImageId::new("cat.png").unwrap(),
            config,
            PipelineMode::Separate,
        );
        run_case(&case, Path::new("corpus"), &ArtifactLayout::default(), executor).unwrap()
    }

    #[test]
    fn lossless_pass_runs_all_four_stages() {
        let executor = Scripted::passing();
        let result = run(&lossless(), &executor);
        assert_eq!(result.outcome, Outcome::Pass);
        assert_eq!(result.stages_run, 4);
        assert_eq!(
            *executor.executed.borrow(),
            [
                StageKind::Compress,
                StageKind::Decompress,
                StageKind::CompareWithReference,
                StageKind::CompareRoundtrip,
            ]
        );
    }

    #[test]
    fn lossy_pass_never_runs_roundtrip() {
        let executor = Scripted::passing();
        let result = run(&lossy(), &executor);
        assert!(result.outcome.is_pass());
        assert!(!executor.executed.borrow().contains(&StageKind::CompareRoundtrip));
    }

    #[test]
    fn first_failure_short_circuits() {
        let executor = Scripted::failing_at(StageKind::Decompress, FailureReason::DecompressFailed);
        let result = run(&lossless(), &executor);
        assert_eq!(
            result.outcome,
            Outcome::Fail {
                stage_index: 1,
                stage: StageKind::Decompress,
                reason: FailureReason::DecompressFailed,
            }
        );
        assert_eq!(result.stages_run, 2);
        assert_eq!(
            *executor.executed.borrow(),
            [StageKind::Compress, StageKind::Decompress]
        );
    }

    #[test]
    fn reference_failure_is_reported_with_its_stage() {
        let executor =
            Scripted::failing_at(StageKind::CompareWithReference, FailureReason::ReferenceFailed);
        let result = run(&lossy(), &executor);
        assert_eq!(
            result.outcome,
            Outcome::Fail {
                stage_index: 2,
                stage: StageKind::CompareWithReference,
                reason: FailureReason::ReferenceFailed,
            }
        );
    }

    #[test]
    fn state_machine_transitions() {
        let config = lossy();
        let case = TestCase::new(
            ImageId::new("dir/cat.png").unwrap(),
            &config,
            PipelineMode::Separate,
        );
        let layout = ArtifactLayout::new("out", "fails");
        let executor = Scripted::passing();
        let mut runner = CaseRunner::new(&case, Path::new("corpus"), &layout);

        assert_eq!(runner.state(), RunState::Pending);
        assert_eq!(
            runner.step(&executor).unwrap(),
            RunState::Running { stage_index: 0 }
        );
        assert!(executor.executed.borrow().is_empty());
        assert_eq!(
            runner.step(&executor).unwrap(),
            RunState::Running { stage_index: 1 }
        );
        assert_eq!(
            runner.step(&executor).unwrap(),
            RunState::Running { stage_index: 2 }
        );
        assert_eq!(runner.step(&executor).unwrap(), RunState::Passed);
        // Terminal states are final.
        assert_eq!(runner.step(&executor).unwrap(), RunState::Passed);
        assert_eq!(executor.executed.borrow().len(), 3);
        assert_eq!(
            runner.artifacts().compressed,
            Path::new("out/ly/dir/cat.png.gfwx")
        );
    }

    #[test]
    fn fatal_errors_propagate() {
        let config = lossless();
        let case = TestCase::new(
            ImageId::new("cat.png").unwrap(),
            &config,
            PipelineMode::Separate,
        );
        let result = run_case(&case, Path::new("."), &ArtifactLayout::default(), &Broken);
        assert_eq!(result, Err("disk on fire"));
    }
}
