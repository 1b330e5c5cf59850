//! Process-backed [`StageExecutor`].
//!
//! Each stage maps to a single tool invocation, except
//! [`StageKind::CompareWithReference`], which runs the reference encoder
//! and then compares its output byte-for-byte with ours.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use gfwx_regress_pipeline::{
    ArtifactKind, FailureReason, StageContext, StageExecutor, StageKind, StageOutcome, ToolCommand,
};

use crate::error::HarnessError;
use crate::process::{ProcessInvoker, ProcessStatus};
use crate::store::ArtifactStore;
use crate::toolchain::Toolchain;

const CHUNK: usize = 64 * 1024;

/// Executes stages by spawning the configured tools.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    store: ArtifactStore,
    invoker: ProcessInvoker,
    toolchain: Toolchain,
}

impl ProcessExecutor {
    #[must_use]
    pub const fn new(store: ArtifactStore, invoker: ProcessInvoker, toolchain: Toolchain) -> Self {
        Self {
            store,
            invoker,
            toolchain,
        }
    }

    #[must_use]
    pub const fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn invoke(&self, command: &ToolCommand) -> Result<ProcessStatus, HarnessError> {
        self.invoker
            .run(self.toolchain.program(command.tool), &command.args)
    }

    /// Run `command`, mapping an unsuccessful exit to `reason`.
    fn run_tool(
        &self,
        command: &ToolCommand,
        context: &StageContext<'_>,
        reason: FailureReason,
    ) -> Result<StageOutcome, HarnessError> {
        match self.invoke(command)? {
            ProcessStatus::Success => Ok(StageOutcome::Pass),
            ProcessStatus::Failure(exit) => {
                log::warn!(
                    "{} [{}] {}: {reason} ({exit})",
                    context.source.display(),
                    context.configuration.name(),
                    command.tool,
                );
                Ok(StageOutcome::Fail(reason))
            }
        }
    }

    fn compare_with_reference(
        &self,
        context: &StageContext<'_>,
    ) -> Result<StageOutcome, HarnessError> {
        let ours = &context.artifacts.compressed;
        let theirs = &context.artifacts.reference;
        let command = ToolCommand::reference(context.source, theirs, context.configuration);
        if let StageOutcome::Fail(reason) =
            self.run_tool(&command, context, FailureReason::ReferenceFailed)?
        {
            return Ok(StageOutcome::Fail(reason));
        }

        let identical = match files_identical(ours, theirs) {
            Ok(identical) => identical,
            // A tool that exits 0 without writing its output has still
            // produced something different from ours.
            Err(ArtifactReadError { path, source }) if source.kind() == io::ErrorKind::NotFound => {
                log::warn!("{} missing after successful run", path.display());
                false
            }
            Err(ArtifactReadError { path, source }) => {
                return Err(HarnessError::ReadArtifact { path, source });
            }
        };
        if identical {
            Ok(StageOutcome::Pass)
        } else {
            log::warn!(
                "{} [{}]: {}",
                context.source.display(),
                context.configuration.name(),
                FailureReason::ReferenceMismatch,
            );
            Ok(StageOutcome::Fail(FailureReason::ReferenceMismatch))
        }
    }
}

impl StageExecutor for ProcessExecutor {
    type Error = HarnessError;

    fn execute(
        &self,
        stage: StageKind,
        context: &StageContext<'_>,
    ) -> Result<StageOutcome, HarnessError> {
        for &kind in stage.outputs() {
            let path = context.artifacts.get(kind);
            self.store.ensure_container_exists(path)?;
            remove_stale(path)?;
        }

        let artifacts = context.artifacts;
        let config = context.configuration;
        let intent = self.toolchain.intent();
        match stage {
            StageKind::Compress => self.run_tool(
                &ToolCommand::compress(context.source, &artifacts.compressed, config, intent),
                context,
                FailureReason::CompressFailed,
            ),
            StageKind::Decompress => self.run_tool(
                &ToolCommand::decompress(&artifacts.compressed, &artifacts.decompressed, config),
                context,
                FailureReason::DecompressFailed,
            ),
            StageKind::CompressDecompress => self.run_tool(
                &ToolCommand::combined(
                    context.source,
                    &artifacts.compressed,
                    &artifacts.decompressed,
                    config,
                    intent,
                ),
                context,
                FailureReason::CombinedFailed,
            ),
            StageKind::CompareWithReference => self.compare_with_reference(context),
            StageKind::CompareRoundtrip => self.run_tool(
                &ToolCommand::compare(context.source, artifacts.get(ArtifactKind::Decompressed)),
                context,
                FailureReason::RoundtripMismatch,
            ),
        }
    }
}

/// Delete an output left by an earlier run, so a tool that exits 0
/// without writing cannot pass on the old file.
fn remove_stale(path: &Path) -> Result<(), HarnessError> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::debug!("removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(HarnessError::ClearArtifact {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[derive(Debug)]
struct ArtifactReadError {
    path: PathBuf,
    source: io::Error,
}

/// Streaming byte-for-byte comparison of two files.
fn files_identical(a: &Path, b: &Path) -> Result<bool, ArtifactReadError> {
    let open = |path: &Path| {
        File::open(path).map_err(|source| ArtifactReadError {
            path: path.to_path_buf(),
            source,
        })
    };
    let len = |file: &File, path: &Path| {
        file.metadata()
            .map(|m| m.len())
            .map_err(|source| ArtifactReadError {
                path: path.to_path_buf(),
                source,
            })
    };

    let (file_a, file_b) = (open(a)?, open(b)?);
    if len(&file_a, a)? != len(&file_b, b)? {
        return Ok(false);
    }

    let mut reader_a = BufReader::with_capacity(CHUNK, file_a);
    let mut reader_b = BufReader::with_capacity(CHUNK, file_b);
    let mut buf_a = vec![0; CHUNK];
    let mut buf_b = vec![0; CHUNK];
    loop {
        let n = read_full(&mut reader_a, &mut buf_a).map_err(|source| ArtifactReadError {
            path: a.to_path_buf(),
            source,
        })?;
        let m = read_full(&mut reader_b, &mut buf_b).map_err(|source| ArtifactReadError {
            path: b.to_path_buf(),
            source,
        })?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; short only at end of file.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn stale_output_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "cat.png.orig_gfwx", b"last run");
        remove_stale(&old).unwrap();
        assert!(!old.exists());
        // Nothing to remove is fine too.
        remove_stale(&old).unwrap();
    }

    #[test]
    fn stale_directory_in_the_way_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("cat.png.gfwx");
        fs::create_dir(&blocker).unwrap();
        assert!(matches!(
            remove_stale(&blocker),
            Err(HarnessError::ClearArtifact { .. })
        ));
    }

    #[test]
    fn identical_files_compare_equal() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a", b"GFWX payload");
        let b = write(dir.path(), "b", b"GFWX payload");
        assert!(files_identical(&a, &b).unwrap());
    }

    #[test]
    fn length_difference_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a", b"GFWX payload");
        let b = write(dir.path(), "b", b"GFWX payload!");
        assert!(!files_identical(&a, &b).unwrap());
    }

    #[test]
    fn content_difference_past_first_chunk_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![7_u8; CHUNK * 2 + 10];
        let a = write(dir.path(), "a", &bytes);
        bytes[CHUNK + 3] = 8;
        let b = write(dir.path(), "b", &bytes);
        assert!(!files_identical(&a, &b).unwrap());
        assert!(files_identical(&a, &a).unwrap());
    }

    #[test]
    fn empty_files_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a", b"");
        let b = write(dir.path(), "b", b"");
        assert!(files_identical(&a, &b).unwrap());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a", b"x");
        let missing = dir.path().join("b");
        let err = files_identical(&a, &missing).unwrap_err();
        assert_eq!(err.path, missing);
        assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
    }
}
