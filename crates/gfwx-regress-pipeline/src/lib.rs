//! gfwx-regress-pipeline: test planning and aggregation (sans-IO).
//!
//! Plans and evaluates a differential regression run of the GFWX codec:
//! corpus images x test matrix -> test cases -> fixed stage sequences ->
//! per-case outcomes -> run verdict.
//!
//! This crate has **no I/O** -- it never spawns a process or touches the
//! filesystem. Stage execution is abstracted behind [`StageExecutor`];
//! the process-backed implementation, corpus scanning and quarantine
//! copying live in `gfwx-regress-io`.

pub mod artifact;
pub mod command;
pub mod matrix;
pub mod report;
pub mod runner;
pub mod stage;
pub mod types;

pub use artifact::{ArtifactKind, ArtifactLayout, ArtifactPaths};
pub use command::{Tool, ToolCommand};
pub use matrix::TestMatrix;
pub use report::{EXIT_FAILED, EXIT_PASSED, FailureRecord, Reporter, RunSummary};
pub use runner::{
    CaseRunner, Outcome, RunState, StageContext, StageExecutor, TestCase, TestResult, run_case,
};
pub use stage::{FailureReason, PipelineMode, StageKind, StageOutcome, stage_sequence};
pub use types::{
    Configuration, Encoder, Filter, ImageId, IntentPolicy, PipelineError, Quality,
};
