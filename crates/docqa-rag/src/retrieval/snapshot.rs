//! On-disk index snapshots
//!
//! A snapshot is a single file, `index.snapshot`, in the snapshot directory.
//! Its first line is the manifest (format version, entry count, header and the
//! SHA-256 of the rest of the file); the rest is the index as JSON. The file is
//! written to a temporary file in the same directory and renamed into place,
//! so a reader sees either the previous snapshot or the new one.
//!
//! `update` holds the store's lock across load, change and save, so sessions
//! sharing one store never overwrite each other's entries. Across processes,
//! the snapshot is re-checked just before the rename and the update is redone
//! when another writer got there first.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use super::index::{IndexHeader, VectorIndex};
use crate::error::{Error, Result};

pub const SNAPSHOT_FILE: &str = "index.snapshot";
pub const FORMAT_VERSION: u32 = 2;

/// Attempts before a contended cross-process update gives up
const UPDATE_ATTEMPTS: usize = 3;

/// Integrity record stored as the first line of the snapshot file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: u32,
    pub entry_count: usize,
    /// Hex SHA-256 of the index bytes that follow the manifest line
    pub checksum: String,
    pub header: IndexHeader,
}

/// Handle to a snapshot directory; clones share the lock
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Whether a snapshot file is present
    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Write the index, replacing any previous snapshot
    pub fn save(&self, index: &VectorIndex) -> Result<SnapshotManifest> {
        let (manifest, bytes) = encode(index)?;
        let _guard = self.lock.lock();
        self.write_atomic(&bytes)?;
        self.log_saved(&manifest);
        Ok(manifest)
    }

    /// Read and verify the snapshot; `NotFound` when no snapshot file exists
    pub fn load(&self) -> Result<VectorIndex> {
        let _guard = self.lock.lock();
        match self.read()? {
            Some((_, index)) => Ok(index),
            None => Err(Error::NotFound(self.dir.display().to_string())),
        }
    }

    /// Replace the snapshot with `change(current)`, where `current` is the
    /// persisted index (None when there is none yet).
    ///
    /// No other update or save through this store, or a clone of it, runs in
    /// between. Returns the index that was written.
    pub fn update<F>(&self, mut change: F) -> Result<VectorIndex>
    where
        F: FnMut(Option<VectorIndex>) -> Result<VectorIndex>,
    {
        let _guard = self.lock.lock();

        for attempt in 1..=UPDATE_ATTEMPTS {
            let current = self.read()?;
            let seen = current.as_ref().map(|(manifest, _)| manifest.checksum.clone());
            let updated = change(current.map(|(_, index)| index))?;
            let (manifest, bytes) = encode(&updated)?;

            // Another process may have written since `current` was read
            let latest = self.read_manifest()?.map(|manifest| manifest.checksum);
            if latest != seen {
                tracing::warn!(
                    path = %self.dir.display(),
                    attempt,
                    "Snapshot changed during update, retrying"
                );
                continue;
            }

            self.write_atomic(&bytes)?;
            self.log_saved(&manifest);
            return Ok(updated);
        }

        Err(Error::index(format!(
            "snapshot in {} kept changing during update",
            self.dir.display()
        )))
    }

    fn read(&self) -> Result<Option<(SnapshotManifest, VectorIndex)>> {
        let Some(bytes) = self.read_file()? else {
            return Ok(None);
        };
        let (manifest, index_bytes) = split(&bytes)?;

        if checksum(index_bytes) != manifest.checksum {
            return Err(Error::index(format!(
                "checksum mismatch for {}",
                self.path().display()
            )));
        }

        let index: VectorIndex = serde_json::from_slice(index_bytes)
            .map_err(|e| Error::index(format!("index data is corrupt: {}", e)))?;
        if index.len() != manifest.entry_count || index.header() != &manifest.header {
            return Err(Error::index("index data does not match its manifest"));
        }
        index.check_entries()?;

        tracing::debug!(
            path = %self.dir.display(),
            entries = index.len(),
            "Loaded index snapshot"
        );

        Ok(Some((manifest, index)))
    }

    fn read_manifest(&self) -> Result<Option<SnapshotManifest>> {
        match self.read_file()? {
            Some(bytes) => Ok(Some(split(&bytes)?.0)),
            None => Ok(None),
        }
    }

    fn read_file(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path()) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path()).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn log_saved(&self, manifest: &SnapshotManifest) {
        tracing::debug!(
            path = %self.dir.display(),
            entries = manifest.entry_count,
            "Saved index snapshot"
        );
    }
}

/// Manifest line, newline, index JSON
fn encode(index: &VectorIndex) -> Result<(SnapshotManifest, Vec<u8>)> {
    let index_bytes = serde_json::to_vec(index)?;
    let manifest = SnapshotManifest {
        format_version: FORMAT_VERSION,
        entry_count: index.len(),
        checksum: checksum(&index_bytes),
        header: index.header().clone(),
    };

    let mut bytes = serde_json::to_vec(&manifest)?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&index_bytes);
    Ok((manifest, bytes))
}

fn split(bytes: &[u8]) -> Result<(SnapshotManifest, &[u8])> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| Error::index("snapshot has no manifest line"))?;

    let manifest: SnapshotManifest = serde_json::from_slice(&bytes[..newline])
        .map_err(|e| Error::index(format!("snapshot manifest is corrupt: {}", e)))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(Error::index(format!(
            "unsupported snapshot format version {}",
            manifest.format_version
        )));
    }

    Ok((manifest, &bytes[newline + 1..]))
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{IndexEntry, Metric};
    use crate::types::{Chunk, ChunkSource};

    fn index_of(source: &str, count: u32) -> VectorIndex {
        let entries = (0..count)
            .map(|i| {
                IndexEntry::new(
                    vec![i as f32, 1.0 - i as f32 * 0.1, 0.25],
                    Chunk::new(
                        format!("passage {}", i),
                        ChunkSource { source_name: source.into(), page_number: i },
                    ),
                )
            })
            .collect();
        VectorIndex::build(Metric::Cosine, "test-model", entries).unwrap()
    }

    fn sample_index() -> VectorIndex {
        index_of("guide.pdf", 5)
    }

    fn sources(index: &VectorIndex) -> Vec<String> {
        let mut names: Vec<String> = index
            .entries()
            .iter()
            .map(|e| e.chunk.source.source_name.clone())
            .collect();
        names.dedup();
        names
    }

    #[test]
    fn test_missing_snapshot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("vectorstore"));
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_round_trip_preserves_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("vectorstore"));
        let index = sample_index();

        let manifest = store.save(&index).unwrap();
        assert_eq!(manifest.entry_count, 5);
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, index);

        let query = [0.5, 0.5, 0.5];
        let before: Vec<String> = index.search(&query, 3).unwrap().into_iter().map(|h| h.entry.chunk.text).collect();
        let after: Vec<String> = loaded.search(&query, 3).unwrap().into_iter().map(|h| h.entry.chunk.text).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_resave_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save(&sample_index()).unwrap();
        let first = std::fs::read(store.path()).unwrap();

        let loaded = store.load().unwrap();
        store.save(&loaded).unwrap();
        let second = std::fs::read(store.path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_tampered_index_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save(&sample_index()).unwrap();

        let mut bytes = std::fs::read(store.path()).unwrap();
        bytes.extend_from_slice(b" ");
        std::fs::write(store.path(), bytes).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Index(_)));
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save(&sample_index()).unwrap();
        store.update(|current| current.unwrap().merge(&index_of("extra.pdf", 1))).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![SNAPSHOT_FILE.to_string()]);
    }

    #[test]
    fn test_interrupted_write_keeps_last_good_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save(&sample_index()).unwrap();

        // A writer that died before its rename leaves only a stray temp file,
        // plus whatever older layouts left in the directory
        let mut stray = NamedTempFile::new_in(dir.path()).unwrap();
        stray.write_all(b"{\"format_version\":2,\"entry_count\":9").unwrap();
        stray.keep().unwrap();
        std::fs::write(dir.path().join("manifest.json"), b"{\"checksum\":\"stale\"}").unwrap();

        assert_eq!(store.load().unwrap(), sample_index());

        let updated = store
            .update(|current| current.unwrap().merge(&index_of("later.pdf", 2)))
            .unwrap();
        assert_eq!(updated.len(), 7);
        assert_eq!(store.load().unwrap(), updated);
    }

    #[test]
    fn test_update_starts_from_persisted_index() {
        let dir = tempfile::tempdir().unwrap();
        let first = SnapshotStore::new(dir.path());
        let second = first.clone();

        first.update(|current| {
            assert!(current.is_none());
            Ok(index_of("a.pdf", 1))
        })
        .unwrap();
        second
            .update(|current| current.unwrap().merge(&index_of("b.pdf", 1)))
            .unwrap();
        first
            .update(|current| current.unwrap().merge(&index_of("c.pdf", 1)))
            .unwrap();

        assert_eq!(sources(&first.load().unwrap()), vec!["a.pdf", "b.pdf", "c.pdf"]);
    }

    #[test]
    fn test_failed_update_leaves_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save(&sample_index()).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = store
            .update(|_| Err(Error::IndexMismatch("dimensions differ".into())))
            .unwrap_err();
        assert!(matches!(err, Error::IndexMismatch(_)));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_concurrent_updates_keep_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save(&index_of("seed.pdf", 1)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .update(|current| current.unwrap().merge(&index_of(&format!("doc{}.pdf", i), 1)))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load().unwrap().len(), 9);
    }
}
