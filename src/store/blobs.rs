//! The content-addressed blob directory.

use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use crate::digest::{Digest, DigestAlgorithm, DigestWriter};

use super::{try_io, StoreError};

const BLOBS_DIR: &str = "blobs";

/// Blob storage keyed by digest, laid out as
/// `blobs/<algorithm>/<hex>`.
///
/// Content is written once and never modified. Manifests live in the
/// same space as layers, and two artifacts referring to the same
/// content share one file.
#[derive(Debug)]
pub(super) struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(store_path: &Path) -> BlobStore {
        BlobStore {
            root: store_path.join(BLOBS_DIR),
        }
    }

    pub fn path(&self, digest: &Digest) -> PathBuf {
        self.root
            .join(digest.algorithm().as_str())
            .join(digest.encoded())
    }

    /// Open the blob for `digest`.
    ///
    /// A missing file is an integrity error: the caller got the digest
    /// from the index or a stored manifest.
    pub fn open(&self, digest: &Digest) -> Result<File, StoreError> {
        let path = self.path(digest);

        File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::MissingBlob(digest.clone()),
            _ => StoreError::Io(e, path),
        })
    }

    /// Copy `reader` into the store, hashing while writing.
    ///
    /// The content is streamed to a temporary file in the blob
    /// directory. When a blob with the resulting digest already
    /// exists, the temporary file is discarded and the existing blob
    /// is left untouched; otherwise the temporary file is renamed into
    /// place. Same-digest racers are therefore safe, and retries are
    /// idempotent.
    ///
    /// Returns the digest and size of the content.
    pub fn write(&self, reader: &mut dyn Read) -> Result<(Digest, u64), StoreError> {
        let dir = self.root.join(DigestAlgorithm::SHA256.as_str());
        try_io!(&dir, fs::create_dir_all(&dir));

        let tmp = try_io!(&dir, tempfile::NamedTempFile::new_in(&dir));

        let mut writer = DigestWriter::new(io::BufWriter::new(tmp.as_file()));
        try_io!(&dir, io::copy(reader, &mut writer));
        try_io!(&dir, writer.flush());
        let (digest, size) = writer.finalize();

        let path = self.path(&digest);

        if !path.exists() {
            try_io!(&path, tmp.as_file().sync_all());
            try_io!(&path, tmp.persist(&path).map_err(|e| e.error));
        }

        Ok((digest, size))
    }

    pub fn write_bytes(&self, data: &[u8]) -> Result<(Digest, u64), StoreError> {
        self.write(&mut io::Cursor::new(data))
    }

    /// Every digest present on disk, with its file path.
    ///
    /// Entries that do not parse as digests (for example abandoned
    /// temporary files) are not reported.
    pub fn enumerate(&self) -> Result<Vec<(Digest, PathBuf)>, StoreError> {
        let mut found = Vec::new();

        let algorithms = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(StoreError::Io(e, self.root.clone())),
        };

        for algorithm in algorithms {
            let algorithm = try_io!(&self.root, algorithm);
            let dir = algorithm.path();

            if !try_io!(&dir, algorithm.file_type()).is_dir() {
                continue;
            }

            for entry in try_io!(&dir, fs::read_dir(&dir)) {
                let entry = try_io!(&dir, entry);

                let source = format!(
                    "{}:{}",
                    algorithm.file_name().to_string_lossy(),
                    entry.file_name().to_string_lossy(),
                );

                if let Ok(digest) = Digest::try_from(source) {
                    found.push((digest, entry.path()));
                }
            }
        }

        Ok(found)
    }
}
