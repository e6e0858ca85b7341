//! References to artifacts stored in the local store.

mod parser;

use std::fmt;

use crate::digest::Digest;

/// Errors from [`ArtifactReference::new`] and
/// [`ArtifactStorageReference::new`].
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("invalid reference format")]
    InvalidFormat,

    #[error("repository name must be canonical")]
    MissingRegistry,

    #[error("cannot specify 64-byte hexadecimal strings")]
    ImageId,

    #[error("cannot use both a tag and a digest in the same reference")]
    TaggedAndDigested,

    #[error("name or digest cannot be empty")]
    EmptyNameOrDigest,
}

/// A validated, normalized name for a stored artifact, in the
/// `registry/repository[:tag][@digest]` form.
///
/// The parser refuses to guess: a name without a registry component is
/// rejected instead of being completed with a default registry, and a
/// bare 64-character hexadecimal string is rejected instead of being
/// read as a repository name. A reference cannot carry both a tag and
/// a digest. When neither is present, the tag defaults to `latest`.
///
/// # Examples
///
/// ```
/// # use oci_artifact_store::*;
/// let reference = ArtifactReference::new("quay.io/podman/machine-os").unwrap();
/// assert_eq!(reference.name(), "quay.io/podman/machine-os:latest");
/// assert_eq!(reference.tag(), Some("latest"));
///
/// // Re-parsing the normalized form is the identity.
/// let again = ArtifactReference::new(reference.name()).unwrap();
/// assert_eq!(again.name(), reference.name());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactReference {
    name: String,
    tag: Option<String>,
    digest: Option<Digest>,
}

impl ArtifactReference {
    pub fn new(name: &str) -> Result<ArtifactReference, ParseError> {
        parser::parse(name)
    }

    /// Normalized reference string. This is the key used by the store
    /// index.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag part, if the reference carries one.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Digest part, if the reference carries one.
    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl TryFrom<&str> for ArtifactReference {
    type Error = ParseError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        ArtifactReference::new(name)
    }
}

/// User input naming an artifact either by reference or by manifest
/// digest.
///
/// Lookup operations accept both `name:tag` strings and digests or
/// digest prefixes without the caller pre-classifying the input. A
/// string that parses as a reference resolves by name; anything else is
/// kept verbatim as a digest candidate to be matched against the index
/// later. The two states are mutually exclusive by construction.
///
/// # Examples
///
/// ```
/// # use oci_artifact_store::*;
/// let by_name = ArtifactStorageReference::new("quay.io/podman/machine-os:5.1").unwrap();
/// assert!(by_name.reference().is_some());
/// assert!(by_name.possible_digest().is_none());
///
/// let by_prefix = ArtifactStorageReference::new("8b96f36deaf1d2").unwrap();
/// assert!(by_prefix.reference().is_none());
/// assert_eq!(by_prefix.possible_digest(), Some("8b96f36deaf1d2"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactStorageReference {
    /// The input parsed as a full artifact reference.
    Resolved(ArtifactReference),

    /// The input did not parse as a reference; it may be a full digest,
    /// a `sha256:`-prefixed digest, or a bare hex prefix.
    PossibleDigest(String),
}

impl ArtifactStorageReference {
    /// Classify `name_or_digest`.
    ///
    /// Only two inputs fail: an empty string, and a reference carrying
    /// both a tag and a digest. Every other parse failure is stored as
    /// a digest candidate.
    pub fn new(name_or_digest: &str) -> Result<ArtifactStorageReference, ParseError> {
        if name_or_digest.is_empty() {
            return Err(ParseError::EmptyNameOrDigest);
        }

        match ArtifactReference::new(name_or_digest) {
            Ok(reference) => Ok(ArtifactStorageReference::Resolved(reference)),

            Err(ParseError::TaggedAndDigested) => Err(ParseError::TaggedAndDigested),

            Err(_) => Ok(ArtifactStorageReference::PossibleDigest(
                name_or_digest.to_owned(),
            )),
        }
    }

    pub fn reference(&self) -> Option<&ArtifactReference> {
        match self {
            ArtifactStorageReference::Resolved(reference) => Some(reference),
            ArtifactStorageReference::PossibleDigest(_) => None,
        }
    }

    pub fn possible_digest(&self) -> Option<&str> {
        match self {
            ArtifactStorageReference::Resolved(_) => None,
            ArtifactStorageReference::PossibleDigest(candidate) => Some(candidate),
        }
    }
}

impl fmt::Display for ArtifactStorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactStorageReference::Resolved(reference) => fmt::Display::fmt(reference, f),
            ArtifactStorageReference::PossibleDigest(candidate) => f.write_str(candidate),
        }
    }
}

impl TryFrom<&str> for ArtifactStorageReference {
    type Error = ParseError;

    fn try_from(name_or_digest: &str) -> Result<Self, Self::Error> {
        ArtifactStorageReference::new(name_or_digest)
    }
}
