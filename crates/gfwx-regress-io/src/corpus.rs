//! Corpus discovery.
//!
//! Walks the corpus root recursively and yields the relative path of
//! every file whose extension (case-insensitively) belongs to the
//! accepted image format. Directory entries are visited in file-name
//! order, so an unchanged corpus always yields the same sequence.
//!
//! Directories registered with [`CorpusScanner::excluding`] are not
//! descended into. The harness excludes its own output and quarantine
//! roots, so pointing it at a corpus that contains them does not test
//! yesterday's artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use gfwx_regress_pipeline::ImageId;
use image::ImageFormat;
use walkdir::WalkDir;

use crate::error::HarnessError;

/// Enumerates images under a corpus root.
#[derive(Debug, Clone)]
pub struct CorpusScanner {
    root: PathBuf,
    format: ImageFormat,
    excluded: Vec<PathBuf>,
}

impl CorpusScanner {
    /// Scanner accepting PNG files.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            format: ImageFormat::Png,
            excluded: Vec::new(),
        }
    }

    /// Accept a different image format instead of PNG.
    #[must_use]
    pub const fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Never descend into `dir`. A directory that does not exist at scan
    /// time is ignored.
    #[must_use]
    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` has an extension of the accepted format.
    ///
    /// `image` lowercases the extension before matching, so `CAT.PNG`
    /// is accepted just like `cat.png`.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(ImageFormat::from_extension)
            .is_some_and(|format| format == self.format)
    }

    /// Start a lazy scan.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::CorpusUnreadable`] if the root cannot be
    /// listed. Errors hit later while walking are yielded by the iterator.
    pub fn scan(&self) -> Result<Images<'_>, HarnessError> {
        fs::read_dir(&self.root).map_err(|source| HarnessError::CorpusUnreadable {
            path: self.root.clone(),
            source,
        })?;
        let excluded = self
            .excluded
            .iter()
            .filter_map(|dir| fs::canonicalize(dir).ok())
            .collect();
        Ok(Images {
            scanner: self,
            excluded,
            walker: WalkDir::new(&self.root)
                .sort_by_file_name()
                .into_iter(),
        })
    }

    /// Scan the whole corpus eagerly.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`scan`](Self::scan) or of the walk.
    pub fn collect(&self) -> Result<Vec<ImageId>, HarnessError> {
        self.scan()?.collect()
    }
}

/// Lazy iterator over the images of a corpus. Not restartable; call
/// [`CorpusScanner::scan`] again for a fresh pass.
pub struct Images<'a> {
    scanner: &'a CorpusScanner,
    /// Canonical forms of the excluded directories that exist.
    excluded: Vec<PathBuf>,
    walker: walkdir::IntoIter,
}

impl Images<'_> {
    fn is_excluded(&self, dir: &Path) -> bool {
        !self.excluded.is_empty()
            && fs::canonicalize(dir).is_ok_and(|canonical| self.excluded.contains(&canonical))
    }
}

impl Iterator for Images<'_> {
    type Item = Result<ImageId, HarnessError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            let path = entry.path();
            if entry.depth() > 0 && entry.file_type().is_dir() && self.is_excluded(path) {
                self.walker.skip_current_dir();
                continue;
            }
            if !self.scanner.accepts(path) || !path.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.scanner.root) else {
                continue;
            };
            return Some(ImageId::new(relative).map_err(HarnessError::from));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"not really a png").unwrap();
    }

    #[test]
    fn finds_png_files_recursively_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "cat.png");
        touch(dir.path(), "birds/BIRD.PNG");
        touch(dir.path(), "birds/notes.txt");
        touch(dir.path(), "dog.jpg");
        touch(dir.path(), "noext");

        let images = CorpusScanner::new(dir.path()).collect().unwrap();
        let names: Vec<_> = images.iter().map(|i| i.as_path().to_path_buf()).collect();
        assert_eq!(
            names,
            [PathBuf::from("birds/BIRD.PNG"), PathBuf::from("cat.png")]
        );
    }

    #[test]
    fn scan_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c/d.png", "c/a.png"] {
            touch(dir.path(), name);
        }
        let scanner = CorpusScanner::new(dir.path());
        assert_eq!(scanner.collect().unwrap(), scanner.collect().unwrap());
    }

    #[test]
    fn directories_named_like_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("album.png")).unwrap();
        touch(dir.path(), "album.png/inner.png");
        let images = CorpusScanner::new(dir.path()).collect().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].as_path(), Path::new("album.png/inner.png"));
    }

    #[test]
    fn other_formats_can_be_selected() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.jpeg");
        let scanner = CorpusScanner::new(dir.path()).with_format(ImageFormat::Jpeg);
        let images = scanner.collect().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].as_path(), Path::new("b.jpeg"));
    }

    #[test]
    fn excluded_directories_are_not_scanned() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "cat.png");
        touch(dir.path(), "gfwx_out/lossless/cat.png");
        touch(dir.path(), "gfwx_fails/cat.png");
        touch(dir.path(), "gfwx_outdoors/tree.png");

        let images = CorpusScanner::new(dir.path())
            .excluding(dir.path().join("gfwx_out"))
            .excluding(dir.path().join("gfwx_fails"))
            .excluding(dir.path().join("never_created"))
            .collect()
            .unwrap();

        let names: Vec<_> = images.iter().map(|i| i.as_path().to_path_buf()).collect();
        assert_eq!(
            names,
            [PathBuf::from("cat.png"), PathBuf::from("gfwx_outdoors/tree.png")]
        );
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = CorpusScanner::new(dir.path().join("nope"));
        assert!(matches!(
            scanner.scan(),
            Err(HarnessError::CorpusUnreadable { .. })
        ));
    }
}
