//! The artifact store: the top-level API binding the index, the blob
//! directory and the manifest model together.

mod blobs;
mod events;
mod index;

use std::{
    collections::{BTreeMap, HashSet},
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use crate::{
    artifact::{
        Artifact, Descriptor, Manifest, ANNOTATION_TITLE, DEFAULT_ARTIFACT_TYPE, EMPTY_CONFIG_BLOB,
    },
    blob::{determine_blob_mime_type, ArtifactBlob, BlobError, BlobSource},
    config::SystemContext,
    digest::Digest,
    reference::{ArtifactReference, ArtifactStorageReference},
};

use blobs::BlobStore;
use index::{Index, IndexEntry, StoreLock};

pub use events::{EventHandler, NoEventHandler};

/// Errors from store operations.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store path cannot be empty")]
    EmptyStorePath,

    #[error("store path {0:?} must be absolute")]
    StorePathNotAbsolute(PathBuf),

    #[error("append and replace options are mutually exclusive")]
    AppendAndReplace,

    #[error("at least one blob is required")]
    NoBlobs,

    #[error("artifact {0} already exists")]
    AlreadyExists(String),

    #[error("artifact {0} does not exist")]
    NotFound(String),

    #[error("more than one artifact matches digest {0}")]
    AmbiguousDigest(String),

    #[error("no blob with the title {0}")]
    TitleNotFound(String),

    /// The index or a stored manifest points at content that is not in
    /// the blob directory. The store is corrupt.
    #[error("blob {0} referenced by the index is missing from the store")]
    MissingBlob(Digest),

    #[error("invalid blob title {0:?}")]
    InvalidTitle(String),

    #[error("{0}")]
    Blob(#[from] BlobError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error in {1}: {0}")]
    Io(io::Error, PathBuf),
}

macro_rules! try_io {
    ($path:expr, $e:expr $(,)?) => {
        $e.map_err(|e| StoreError::Io(io::Error::from(e), $path.into()))?
    };
}

// Make visible to mods.
use try_io;

/// Options for [`ArtifactStore::add`].
#[derive(Debug, Default)]
pub struct AddOptions {
    /// Extend the layers of the existing artifact with this name.
    /// Appending to a name that is not in the store is a plain add.
    pub append: bool,

    /// Discard the existing artifact with this name, if any, and build
    /// a new one from only the supplied blobs.
    pub replace: bool,

    /// MIME type of the artifact as a whole. Defaults to
    /// [`DEFAULT_ARTIFACT_TYPE`] for new artifacts; an append keeps
    /// the stored type unless this is set.
    pub artifact_mime_type: Option<String>,

    /// Annotations recorded in the manifest.
    pub annotations: BTreeMap<String, String>,
}

/// Options for [`ArtifactStore::extract`].
#[derive(Debug, Default)]
pub struct ExtractOptions {
    /// Extract only the layer whose title annotation equals this
    /// value. No matching layer is an error.
    pub title: Option<String>,
}

/// Result of [`ArtifactStore::prune`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub blobs_removed: usize,
    pub bytes_reclaimed: u64,
}

/// A file-backed store for OCI artifacts.
///
/// All state lives under a single directory: the `index.json` document
/// naming the stored artifacts, and a `blobs/<algorithm>/<hex>` tree
/// holding layer and manifest content. Every mutation loads the index,
/// computes the effect, writes new content into the blob tree, and
/// atomically persists the updated index — under an advisory lock, so
/// concurrent processes see either the old or the new state, never a
/// torn one.
pub struct ArtifactStore {
    store_path: PathBuf,
    blobs: BlobStore,
    system_context: SystemContext,
    events: Box<dyn EventHandler>,
}

impl ArtifactStore {
    /// Open the store at `store_path`, initializing it on first use.
    ///
    /// The path must be absolute; the directory and an empty index are
    /// created when missing. `system_context` is kept for the registry
    /// transport and is not read by the local store.
    pub fn new(
        store_path: impl Into<PathBuf>,
        system_context: SystemContext,
    ) -> Result<ArtifactStore, StoreError> {
        let store_path = store_path.into();

        if store_path.as_os_str().is_empty() {
            return Err(StoreError::EmptyStorePath);
        }

        if !store_path.is_absolute() {
            return Err(StoreError::StorePathNotAbsolute(store_path));
        }

        try_io!(&store_path, fs::create_dir_all(&store_path));

        let store = ArtifactStore {
            blobs: BlobStore::new(&store_path),
            store_path,
            system_context,
            events: Box::new(NoEventHandler),
        };

        // First use: persist an empty index so readers always have a
        // file to load.
        let _lock = StoreLock::exclusive(&store.store_path)?;
        if !store.store_path.join(index::INDEX_FILE).exists() {
            Index::default().persist(&store.store_path)?;
        }

        Ok(store)
    }

    /// Install a handler for store events.
    pub fn set_event_handler(&mut self, events: Box<dyn EventHandler>) {
        self.events = events;
    }

    /// Directory this store operates on.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Configuration forwarded to the registry transport.
    pub fn system_context(&self) -> &SystemContext {
        &self.system_context
    }

    /// Store a new artifact, or extend or replace an existing one.
    ///
    /// Each blob is classified, then hashed while it streams into the
    /// content-addressed directory; content already present is not
    /// written twice. The manifest is serialized canonically, stored
    /// as a blob like any layer, and the index entry for `reference`
    /// is pointed at it.
    ///
    /// The index write is the last step and is atomic: any failure
    /// before it leaves the previous state intact, at the cost of
    /// possibly orphaning blobs written earlier in the call (see
    /// [`prune`](Self::prune)).
    ///
    /// Returns the digest of the new manifest.
    pub fn add(
        &self,
        reference: &ArtifactReference,
        artifact_blobs: Vec<ArtifactBlob>,
        options: AddOptions,
    ) -> Result<Digest, StoreError> {
        if options.append && options.replace {
            return Err(StoreError::AppendAndReplace);
        }

        if artifact_blobs.is_empty() {
            return Err(StoreError::NoBlobs);
        }

        let _lock = StoreLock::exclusive(&self.store_path)?;
        let mut store_index = Index::load(&self.store_path)?;

        let mut manifest = match store_index.find_name(reference.name()) {
            Some(position) if options.append => {
                self.read_manifest(&store_index.entries()[position].manifest_digest)?
            }

            Some(_) if !options.replace => {
                return Err(StoreError::AlreadyExists(reference.name().to_owned()));
            }

            _ => Manifest::new(DEFAULT_ARTIFACT_TYPE.to_owned()),
        };

        if let Some(artifact_type) = &options.artifact_mime_type {
            manifest.artifact_type = artifact_type.clone();
        }

        for (key, value) in &options.annotations {
            manifest.annotations.insert(key.clone(), value.clone());
        }

        for blob in artifact_blobs {
            let file_name = blob.file_name.clone();
            let (source, media_type) = determine_blob_mime_type(blob)?;

            let (digest, size) = match source {
                BlobSource::File(path) => {
                    let mut file = try_io!(&path, File::open(&path));
                    self.blobs.write(&mut file)?
                }

                BlobSource::Reader(mut reader) => self.blobs.write(&mut *reader)?,
            };

            self.events.blob_written(&digest, size);

            let mut annotations = BTreeMap::new();
            annotations.insert(ANNOTATION_TITLE.to_owned(), file_name);

            manifest.layers.push(Descriptor {
                media_type,
                digest,
                size,
                annotations,
            });
        }

        // The unused config descriptor points at the shared `{}` blob.
        self.blobs.write_bytes(EMPTY_CONFIG_BLOB)?;

        let encoded = manifest.to_canonical_json()?;
        let (manifest_digest, _) = self.blobs.write_bytes(&encoded)?;
        self.events.manifest_written(&manifest_digest);

        store_index.upsert(reference.name(), manifest_digest.clone());
        store_index.persist(&self.store_path)?;
        self.events.index_persisted(store_index.entries().len());

        Ok(manifest_digest)
    }

    /// Delete the index entry for `reference`.
    ///
    /// Blob and manifest content stays on disk; unreferenced content
    /// is reclaimed only by [`prune`](Self::prune). Returns the digest
    /// the removed entry pointed at.
    pub fn remove(&self, reference: &ArtifactStorageReference) -> Result<Digest, StoreError> {
        let _lock = StoreLock::exclusive(&self.store_path)?;
        let mut store_index = Index::load(&self.store_path)?;

        let position = resolve(&store_index, reference)?;
        let entry = store_index.remove(position);

        store_index.persist(&self.store_path)?;
        self.events.index_persisted(store_index.entries().len());

        Ok(entry.manifest_digest)
    }

    /// Every artifact in the store, in index order.
    ///
    /// An index entry whose manifest blob is missing is an integrity
    /// error, not an entry to skip.
    pub fn list(&self) -> Result<Vec<Artifact>, StoreError> {
        let _lock = StoreLock::shared(&self.store_path)?;
        let store_index = Index::load(&self.store_path)?;

        store_index
            .entries()
            .iter()
            .map(|entry| self.read_artifact(entry))
            .collect()
    }

    /// Materialize the single artifact matching `reference`, with all
    /// its annotations.
    pub fn inspect(&self, reference: &ArtifactStorageReference) -> Result<Artifact, StoreError> {
        let _lock = StoreLock::shared(&self.store_path)?;
        let store_index = Index::load(&self.store_path)?;

        let position = resolve(&store_index, reference)?;
        self.read_artifact(&store_index.entries()[position])
    }

    /// Copy layer contents to files under `target`.
    ///
    /// Each selected layer is written to `target/<title>`; the title
    /// falls back to the layer digest's hex form when the annotation
    /// is missing. Content is verified against the layer digest during
    /// the copy. `target` must be an existing writable directory.
    pub fn extract(
        &self,
        reference: &ArtifactStorageReference,
        target: impl AsRef<Path>,
        options: ExtractOptions,
    ) -> Result<(), StoreError> {
        let target = target.as_ref();

        let _lock = StoreLock::shared(&self.store_path)?;
        let store_index = Index::load(&self.store_path)?;

        let position = resolve(&store_index, reference)?;
        let artifact = self.read_artifact(&store_index.entries()[position])?;

        let mut extracted = 0;

        for layer in &artifact.manifest.layers {
            let title = match layer.title() {
                Some(title) => title.to_owned(),
                None => layer.digest.encoded().to_owned(),
            };

            if options.title.as_ref().is_some_and(|filter| title != *filter) {
                continue;
            }

            // A title from a stored manifest names a file inside
            // `target`, nothing else.
            if title.is_empty() || title.contains(['/', '\\']) || title == ".." {
                return Err(StoreError::InvalidTitle(title));
            }

            let blob = self.blobs.open(&layer.digest)?;
            let mut content = layer.digest.wrap_reader(io::BufReader::new(blob));

            let path = target.join(&title);
            let mut output = try_io!(&path, File::create(&path));
            let bytes = try_io!(&path, io::copy(&mut content, &mut output));

            self.events.blob_extracted(&title, bytes);
            extracted += 1;
        }

        if extracted == 0 {
            if let Some(filter) = options.title {
                return Err(StoreError::TitleNotFound(filter));
            }
        }

        Ok(())
    }

    /// Remove every blob that is not reachable from the index.
    ///
    /// Reachable content is the manifests the index points at, plus
    /// each manifest's config and layer blobs. Everything else in the
    /// blob directory is deleted. This is the reclamation path for
    /// content orphaned by append, replace and remove.
    pub fn prune(&self) -> Result<PruneReport, StoreError> {
        let _lock = StoreLock::exclusive(&self.store_path)?;
        let store_index = Index::load(&self.store_path)?;

        let mut reachable = HashSet::new();

        for entry in store_index.entries() {
            let manifest = self.read_manifest(&entry.manifest_digest)?;

            reachable.insert(entry.manifest_digest.clone());
            reachable.insert(manifest.config.digest);

            for layer in manifest.layers {
                reachable.insert(layer.digest);
            }
        }

        let mut report = PruneReport::default();

        for (digest, path) in self.blobs.enumerate()? {
            if reachable.contains(&digest) {
                continue;
            }

            let size = try_io!(&path, fs::metadata(&path)).len();
            try_io!(&path, fs::remove_file(&path));

            self.events.blob_pruned(&digest, size);
            report.blobs_removed += 1;
            report.bytes_reclaimed += size;
        }

        Ok(report)
    }

    fn read_manifest(&self, digest: &Digest) -> Result<Manifest, StoreError> {
        let file = self.blobs.open(digest)?;
        Ok(serde_json::from_reader(io::BufReader::new(file))?)
    }

    fn read_artifact(&self, entry: &IndexEntry) -> Result<Artifact, StoreError> {
        let manifest = self.read_manifest(&entry.manifest_digest)?;

        Ok(Artifact {
            name: entry.reference_name.clone(),
            manifest,
        })
    }
}

/// Find the index position for `reference`: by exact name for a parsed
/// reference, by digest or unique digest prefix for a candidate.
fn resolve(
    store_index: &Index,
    reference: &ArtifactStorageReference,
) -> Result<usize, StoreError> {
    match reference {
        ArtifactStorageReference::Resolved(parsed) => store_index
            .find_name(parsed.name())
            .ok_or_else(|| StoreError::NotFound(parsed.name().to_owned())),

        ArtifactStorageReference::PossibleDigest(candidate) => {
            let exact = store_index.entries().iter().position(|e| {
                e.manifest_digest.as_str() == candidate.as_str()
                    || e.manifest_digest.encoded() == candidate.as_str()
            });

            if let Some(position) = exact {
                return Ok(position);
            }

            let prefix = candidate.strip_prefix("sha256:").unwrap_or(candidate);

            let mut matches = store_index
                .entries()
                .iter()
                .enumerate()
                .filter(|(_, e)| e.manifest_digest.encoded().starts_with(prefix));

            match (matches.next(), matches.next()) {
                (Some((position, _)), None) => Ok(position),
                (Some(_), Some(_)) => Err(StoreError::AmbiguousDigest(candidate.clone())),
                (None, _) => Err(StoreError::NotFound(candidate.clone())),
            }
        }
    }
}
