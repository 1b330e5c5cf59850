//! Artifact storage: path lookup plus lazy directory creation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gfwx_regress_pipeline::{ArtifactKind, ArtifactLayout, ImageId};

use crate::error::HarnessError;

/// Outcome of [`ensure_container_exists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    /// The directory was missing and has been created.
    Created,
    /// The directory was already there.
    AlreadyExists,
}

/// Make sure the directory that will contain `path` exists.
///
/// Idempotent and safe to call concurrently for the same directory:
/// losing a creation race counts as [`DirStatus::AlreadyExists`]. Never
/// creates or removes files.
///
/// # Errors
///
/// Returns [`HarnessError::CreateDir`] for any failure other than the
/// directory already existing, e.g. permission denied or a regular
/// file in the way.
pub fn ensure_container_exists(path: &Path) -> Result<DirStatus, HarnessError> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(DirStatus::AlreadyExists);
    };
    if parent.is_dir() {
        return Ok(DirStatus::AlreadyExists);
    }
    match fs::create_dir_all(parent) {
        Ok(()) => Ok(DirStatus::Created),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && parent.is_dir() => {
            Ok(DirStatus::AlreadyExists)
        }
        Err(source) => Err(HarnessError::CreateDir {
            path: parent.to_path_buf(),
            source,
        }),
    }
}

/// Derives artifact paths for a run and prepares their directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    layout: ArtifactLayout,
}

impl ArtifactStore {
    #[must_use]
    pub const fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub const fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Pure path lookup; see [`ArtifactLayout::path_for`].
    #[must_use]
    pub fn path_for(&self, image: &ImageId, configuration: &str, kind: ArtifactKind) -> PathBuf {
        self.layout.path_for(image, configuration, kind)
    }

    /// See [`ensure_container_exists`].
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::CreateDir`] if the directory cannot be
    /// created.
    pub fn ensure_container_exists(&self, path: &Path) -> Result<DirStatus, HarnessError> {
        let status = ensure_container_exists(path)?;
        if status == DirStatus::Created {
            log::debug!("created directory for {}", path.display());
        }
        Ok(status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn creates_then_reports_existing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a/b/c.gfwx");
        assert_eq!(ensure_container_exists(&file).unwrap(), DirStatus::Created);
        assert!(dir.path().join("a/b").is_dir());
        assert!(!file.exists(), "must not create the file itself");
        assert_eq!(
            ensure_container_exists(&file).unwrap(),
            DirStatus::AlreadyExists
        );
    }

    #[test]
    fn bare_file_name_needs_no_directory() {
        assert_eq!(
            ensure_container_exists(Path::new("c.gfwx")).unwrap(),
            DirStatus::AlreadyExists
        );
    }

    #[test]
    fn file_in_the_way_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocker"), b"").unwrap();
        let result = ensure_container_exists(&dir.path().join("blocker/x.gfwx"));
        assert!(matches!(result, Err(HarnessError::CreateDir { .. })));
    }

    #[test]
    fn concurrent_callers_never_fail() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deep/shared/dir/file.png");
        let created = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| ensure_container_exists(&target).unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|s| *s == DirStatus::Created)
                .count()
        });
        assert!(created >= 1);
        assert!(dir.path().join("deep/shared/dir").is_dir());
    }

    #[test]
    fn store_paths_follow_layout() {
        let layout = ArtifactLayout::new("out", "fails");
        let store = ArtifactStore::new(layout.clone());
        let image = ImageId::new("x/cat.png").unwrap();
        assert_eq!(
            store.path_for(&image, "cfg", ArtifactKind::Compressed),
            layout.path_for(&image, "cfg", ArtifactKind::Compressed)
        );
    }
}
