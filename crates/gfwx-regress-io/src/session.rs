//! A complete regression run.
//!
//! 1. Scan the corpus, skipping the output and quarantine roots.
//! 2. Plan one test case per (configuration, image), configuration-major.
//! 3. Run the cases on a worker pool. Cases share no mutable state:
//!    artifacts are named after the configuration and the image's full
//!    relative path, so two cases never write the same file, and
//!    directory creation tolerates concurrent callers.
//! 4. Record results and quarantine failures sequentially, in case order,
//!    so the report and quarantine contents do not depend on scheduling.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::thread;

use gfwx_regress_pipeline::{
    ArtifactLayout, Outcome, PipelineMode, Reporter, TestMatrix, TestResult, run_case,
};
use rayon::prelude::*;

use crate::corpus::CorpusScanner;
use crate::error::HarnessError;
use crate::process::ProcessInvoker;
use crate::stages::ProcessExecutor;
use crate::store::ArtifactStore;
use crate::toolchain::Toolchain;
use crate::triage::FailureTriage;

/// Everything needed to run the matrix against a corpus.
#[derive(Debug, Clone)]
pub struct Session {
    corpus_root: PathBuf,
    matrix: TestMatrix,
    layout: ArtifactLayout,
    toolchain: Toolchain,
    invoker: ProcessInvoker,
    mode: PipelineMode,
    jobs: Option<NonZeroUsize>,
}

impl Session {
    /// Session with the default artifact layout, tools in the working
    /// directory, the default timeout and separate-tool stages.
    #[must_use]
    pub fn new(corpus_root: impl Into<PathBuf>, matrix: TestMatrix) -> Self {
        Self {
            corpus_root: corpus_root.into(),
            matrix,
            layout: ArtifactLayout::default(),
            toolchain: Toolchain::default(),
            invoker: ProcessInvoker::default(),
            mode: PipelineMode::default(),
            jobs: None,
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: ArtifactLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    #[must_use]
    pub const fn with_invoker(mut self, invoker: ProcessInvoker) -> Self {
        self.invoker = invoker;
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: PipelineMode) -> Self {
        self.mode = mode;
        self
    }

    /// Limit the number of concurrently running cases. `None` uses the
    /// available parallelism.
    #[must_use]
    pub const fn with_jobs(mut self, jobs: Option<NonZeroUsize>) -> Self {
        self.jobs = jobs;
        self
    }

    #[must_use]
    pub const fn matrix(&self) -> &TestMatrix {
        &self.matrix
    }

    /// Run every case and collect the results.
    ///
    /// Codec failures end up in the returned [`Reporter`]; only a broken
    /// environment yields `Err`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`HarnessError`]: unreadable corpus,
    /// unwritable output, missing tool, failed quarantine copy.
    pub fn run(&self) -> Result<Reporter, HarnessError> {
        let images = CorpusScanner::new(&self.corpus_root)
            .excluding(self.layout.output_root())
            .excluding(self.layout.quarantine_root())
            .collect()?;
        let cases = self.matrix.cases(&images, self.mode);
        log::info!(
            "{} images x {} configurations = {} cases",
            images.len(),
            self.matrix.len(),
            cases.len()
        );

        let store = ArtifactStore::new(self.layout.clone());
        let executor = ProcessExecutor::new(store.clone(), self.invoker, self.toolchain.clone());
        let jobs = self.jobs.map_or_else(default_jobs, NonZeroUsize::get);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("gfwx-regress-{i}"))
            .build()?;
        log::debug!("running on {jobs} workers");

        let results = pool.install(|| {
            cases
                .par_iter()
                .map(|case| {
                    let result = run_case(case, &self.corpus_root, &self.layout, &executor)?;
                    log_result(&result);
                    Ok(result)
                })
                .collect::<Result<Vec<_>, HarnessError>>()
        })?;

        let triage = FailureTriage::new(&self.corpus_root, store);
        let mut reporter = Reporter::new();
        for result in results {
            if let Some(record) = triage.quarantine(&result)? {
                reporter.record_failure(record);
            }
            reporter.record(result);
        }
        log::info!(
            "{} passed, {} failed",
            reporter.passed(),
            reporter.failed()
        );
        Ok(reporter)
    }
}

fn default_jobs() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn log_result(result: &TestResult) {
    match result.outcome {
        Outcome::Pass => log::info!("[{}] {}: OK", result.configuration, result.image),
        Outcome::Fail { stage, reason, .. } => log::info!(
            "[{}] {}: {reason} [{stage}]",
            result.configuration,
            result.image
        ),
    }
}
