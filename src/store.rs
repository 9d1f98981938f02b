//! Rotating segment store.
//!
//! A thin abstraction over the directory the encoder writes into. The encoder
//! owns rotation: it rewrites the manifest and deletes chunks that fall out of
//! the sliding window. This component only resets the directory before a
//! launch, tears it down after a stop, and reads whatever is currently there.
//! A chunk listed in a manifest snapshot may legitimately vanish before a
//! reader fetches it; callers treat that as a routine 404, not a failure.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Manifest filename, conventional for HLS feeds.
pub const MANIFEST_NAME: &str = "playlist.m3u8";

/// File extension of media chunks.
pub const CHUNK_EXTENSION: &str = "ts";

/// Chunk naming pattern handed to the encoder.
pub const CHUNK_PATTERN: &str = "segment_%03d.ts";

/// Handle on the directory holding the live feed's manifest and chunks.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    root: PathBuf,
}

impl SegmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the manifest file. Pure accessor, no I/O.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    /// Path of a chunk by filename. Pure accessor, no I/O; callers validate
    /// the name before trusting the result.
    pub fn chunk_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Chunk naming pattern (with the encoder's `%03d` placeholder) inside
    /// this store.
    pub fn chunk_pattern(&self) -> PathBuf {
        self.root.join(CHUNK_PATTERN)
    }

    /// Clear out any prior feed and (re)create the output directory.
    ///
    /// Only chunk files and the manifest are removed; anything else in the
    /// directory is left alone. Runs only while no encoder is writing.
    pub fn reset(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| Error::storage(&self.root, e))?;

        let entries = fs::read_dir(&self.root).map_err(|e| Error::storage(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::storage(&self.root, e))?;
            let path = entry.path();
            let name = entry.file_name();
            let stale = name.to_str() == Some(MANIFEST_NAME)
                || path
                    .extension()
                    .map_or(false, |ext| ext == CHUNK_EXTENSION);
            if stale {
                fs::remove_file(&path).map_err(|e| Error::storage(&path, e))?;
            }
        }

        Ok(())
    }

    /// Delete the entire directory tree. Missing directory is fine.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(&self.root, e)),
        }
    }

    /// Current manifest bytes, or [`Error::NotFound`] if the encoder has not
    /// written one (yet, or anymore).
    pub fn current_manifest(&self) -> Result<Vec<u8>> {
        match fs::read(self.manifest_path()) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found("manifest")),
            Err(e) => Err(e.into()),
        }
    }

    pub fn manifest_exists(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Number of chunk files currently on disk.
    pub fn count_chunks(&self) -> Result<usize> {
        Ok(self.list_chunks()?.len())
    }

    /// Chunk filenames currently on disk, sorted.
    ///
    /// Diagnostics only: the manifest is the authoritative list of servable
    /// chunks, because the encoder deletes rotated-out files on its own
    /// schedule.
    pub fn list_chunks(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| Error::storage(&self.root, e))?;

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path
                .extension()
                .map_or(false, |ext| ext == CHUNK_EXTENSION)
            {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
