//! The on-disk index mapping artifact names to manifest digests.

use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

use rustix::fs::FlockOperation;

use crate::digest::Digest;

use super::{try_io, StoreError};

pub(super) const INDEX_FILE: &str = "index.json";

const LOCK_FILE: &str = "index.lock";

/// One `{referenceName, manifestDigest}` record.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IndexEntry {
    pub reference_name: String,
    pub manifest_digest: Digest,
}

/// The persisted list of artifacts, in insertion order.
///
/// `index.json` is the single source of truth for which artifacts
/// exist. It is always rewritten wholesale: load, mutate in memory,
/// persist. There is no append log.
#[derive(Debug, Default)]
pub(super) struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    pub fn load(store_path: &Path) -> Result<Index, StoreError> {
        let path = store_path.join(INDEX_FILE);
        let file = try_io!(&path, File::open(&path));
        let entries = serde_json::from_reader(io::BufReader::new(file))?;

        Ok(Index { entries })
    }

    /// Persist atomically: write a temporary file in the store
    /// directory, fsync it, then rename it over the old index. A crash
    /// leaves either the previous or the new file, never a torn one.
    pub fn persist(&self, store_path: &Path) -> Result<(), StoreError> {
        let path = store_path.join(INDEX_FILE);

        let mut tmp = try_io!(store_path, tempfile::NamedTempFile::new_in(store_path));
        serde_json::to_writer(&mut tmp, &self.entries)?;

        try_io!(&path, tmp.as_file().sync_all());
        try_io!(&path, tmp.persist(&path).map_err(|e| e.error));

        Ok(())
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn find_name(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.reference_name == name)
    }

    /// Point `name` at `digest`. An existing entry is updated in
    /// place, keeping its position; a new name goes to the end.
    pub fn upsert(&mut self, name: &str, digest: Digest) {
        match self.find_name(name) {
            Some(position) => self.entries[position].manifest_digest = digest,

            None => self.entries.push(IndexEntry {
                reference_name: name.to_owned(),
                manifest_digest: digest,
            }),
        }
    }

    pub fn remove(&mut self, position: usize) -> IndexEntry {
        self.entries.remove(position)
    }
}

/// Advisory lock scoped to the store's index.
///
/// Mutations hold it exclusively for the whole load-mutate-persist
/// cycle; readers hold it shared. Released on drop.
pub(super) struct StoreLock {
    file: File,
}

impl StoreLock {
    pub fn exclusive(store_path: &Path) -> Result<StoreLock, StoreError> {
        StoreLock::acquire(store_path, FlockOperation::LockExclusive)
    }

    pub fn shared(store_path: &Path) -> Result<StoreLock, StoreError> {
        StoreLock::acquire(store_path, FlockOperation::LockShared)
    }

    fn acquire(store_path: &Path, operation: FlockOperation) -> Result<StoreLock, StoreError> {
        let path = store_path.join(LOCK_FILE);

        let file = try_io!(
            &path,
            OpenOptions::new().create(true).write(true).open(&path),
        );
        try_io!(&path, rustix::fs::flock(&file, operation));

        Ok(StoreLock { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = rustix::fs::flock(&self.file, FlockOperation::Unlock);
    }
}
