//! In-memory model for stored artifacts.

use std::collections::BTreeMap;

use crate::digest::Digest;

/// Media type of an OCI image manifest.
pub const MEDIA_TYPE_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Media type of the OCI empty descriptor.
pub const MEDIA_TYPE_EMPTY: &str = "application/vnd.oci.empty.v1+json";

/// Artifact type recorded when the caller does not provide one.
pub const DEFAULT_ARTIFACT_TYPE: &str = "application/vnd.unknown.artifact.v1";

/// Annotation holding the original file name of a layer.
pub const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";

/// Content of the blob behind the empty descriptor.
pub(crate) const EMPTY_CONFIG_BLOB: &[u8] = b"{}";

/// A reference to one blob: MIME type, digest, size and annotations.
///
/// Field names follow the OCI image specification verbatim.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,

    pub digest: Digest,

    pub size: u64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    /// The OCI empty descriptor: a two-byte `{}` blob standing in for
    /// the unused image config of an artifact manifest.
    pub(crate) fn empty_config() -> Descriptor {
        Descriptor {
            media_type: MEDIA_TYPE_EMPTY.to_owned(),
            digest: Digest::from_bytes(EMPTY_CONFIG_BLOB),
            size: EMPTY_CONFIG_BLOB.len() as u64,
            annotations: BTreeMap::new(),
        }
    }

    /// Original file name of the layer, if recorded.
    pub fn title(&self) -> Option<&str> {
        self.annotations.get(ANNOTATION_TITLE).map(String::as_str)
    }
}

/// An OCI image manifest describing one artifact.
///
/// Layer order is insertion order; appends extend the list at the end.
/// Serialization is canonical — fixed field order, sorted annotation
/// keys, no extra whitespace — so the digest of the encoded form is
/// stable and interoperable with other OCI tooling.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,

    pub media_type: String,

    /// MIME type of the artifact as a whole.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artifact_type: String,

    pub config: Descriptor,

    pub layers: Vec<Descriptor>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Manifest {
    /// Manifest with no layers and the given artifact type.
    pub(crate) fn new(artifact_type: String) -> Manifest {
        Manifest {
            schema_version: 2,
            media_type: MEDIA_TYPE_IMAGE_MANIFEST.to_owned(),
            artifact_type,
            config: Descriptor::empty_config(),
            layers: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }

    /// Canonical JSON encoding. This is the byte sequence the manifest
    /// digest is computed over, and the exact content of the manifest
    /// blob on disk.
    pub fn to_canonical_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn digest(&self) -> serde_json::Result<Digest> {
        Ok(Digest::from_bytes(self.to_canonical_json()?))
    }
}

/// A stored artifact: its index name and its manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub manifest: Manifest,
}

impl Artifact {
    /// Digest of the manifest's canonical encoding.
    ///
    /// Always recomputed, never cached, so a manifest mutation is
    /// reflected immediately.
    pub fn digest(&self) -> serde_json::Result<Digest> {
        self.manifest.digest()
    }

    /// Sum of the sizes of all layers.
    pub fn total_size_bytes(&self) -> u64 {
        self.manifest.layers.iter().map(|l| l.size).sum()
    }
}
