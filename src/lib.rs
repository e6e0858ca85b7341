//! A local, file-backed store for OCI artifacts.
//!
//! An artifact is a named bundle of one or more content-addressed
//! blobs, described by an OCI image manifest. The store keeps blob and
//! manifest content under a `blobs/<algorithm>/<hex>` directory, and an
//! `index.json` document mapping reference names to manifest digests.
//! Mutations rewrite the index atomically under an advisory lock, so
//! an interrupted operation never leaves the store torn.
//!
//! # Examples
//!
//! ```no_run
//! use oci_artifact_store::*;
//!
//! let store = ArtifactStore::new("/var/lib/artifacts", SystemContext::default())?;
//!
//! let reference = ArtifactReference::new("quay.io/podman/machine-os:5.1")?;
//! let blob = ArtifactBlob::from_file("/tmp/disk.qcow2");
//! let digest = store.add(&reference, vec![blob], AddOptions::default())?;
//!
//! println!("stored {digest}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod artifact;
mod blob;
mod config;
mod digest;
mod mime;
mod store;

pub mod reference;

pub use artifact::{
    Artifact, Descriptor, Manifest, ANNOTATION_TITLE, DEFAULT_ARTIFACT_TYPE, MEDIA_TYPE_EMPTY,
    MEDIA_TYPE_IMAGE_MANIFEST,
};
pub use blob::{ArtifactBlob, BlobError};
pub use config::SystemContext;
pub use digest::{Digest, DigestAlgorithm, DigestError};
pub use reference::{ArtifactReference, ArtifactStorageReference, ParseError};
pub use store::{
    AddOptions, ArtifactStore, EventHandler, ExtractOptions, NoEventHandler, PruneReport,
    StoreError,
};
