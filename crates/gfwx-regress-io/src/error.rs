//! Fatal harness errors.
//!
//! Everything here means the test environment is broken (unreadable
//! corpus, unwritable output, missing executable). Codec problems are
//! never errors; they are [`StageOutcome::Fail`] values.
//!
//! [`StageOutcome::Fail`]: gfwx_regress_pipeline::StageOutcome::Fail

use std::io;
use std::path::PathBuf;

use gfwx_regress_pipeline::PipelineError;

/// An error that aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The corpus root cannot be listed.
    #[error("cannot read corpus root {}: {source}", path.display())]
    CorpusUnreadable { path: PathBuf, source: io::Error },

    /// Walking the corpus hit an unreadable entry.
    #[error("failed to walk corpus: {0}")]
    CorpusWalk(#[from] walkdir::Error),

    /// A discovered path could not be turned into an image identifier.
    #[error(transparent)]
    InvalidImage(#[from] PipelineError),

    /// An output or quarantine directory could not be created.
    #[error("cannot create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// A stale artifact from an earlier run could not be removed.
    #[error("cannot remove stale artifact {}: {source}", path.display())]
    ClearArtifact { path: PathBuf, source: io::Error },

    /// A tool executable could not be started.
    #[error("cannot launch {}: {source}", program.display())]
    Spawn { program: PathBuf, source: io::Error },

    /// Waiting on (or killing) a started tool failed.
    #[error("failed waiting for {}: {source}", program.display())]
    Wait { program: PathBuf, source: io::Error },

    /// An artifact a tool reported as written could not be read.
    #[error("cannot read artifact {}: {source}", path.display())]
    ReadArtifact { path: PathBuf, source: io::Error },

    /// Copying a failing input into quarantine failed.
    #[error("cannot quarantine {} as {}: {source}", from.display(), to.display())]
    Quarantine {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// The worker pool could not be started.
    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
