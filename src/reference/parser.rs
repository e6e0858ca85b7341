//! Parse a name for an artifact in the local store.
//!
//! The accepted grammar is the OCI reference-name form, with one
//! deliberate restriction: the name must be canonical (it must carry a
//! registry host), so a short name is never silently completed.

use super::*;

const DEFAULT_TAG: &str = "latest";

type Result<T> = std::result::Result<T, ParseError>;

pub(super) fn parse(reference: &str) -> Result<ArtifactReference> {
    if reference.is_empty() {
        return Err(ParseError::InvalidFormat);
    }

    // A bare image ID would otherwise be read as a repository name.
    if reference.len() == 64 && reference.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::ImageId);
    }

    // Extract the digest after the last `@`.
    let (base, digest) = match reference.rsplit_once('@') {
        None => (reference, None),
        Some((base, d)) => {
            let digest = Digest::try_from(d).map_err(|_| ParseError::InvalidFormat)?;
            (base, Some(digest))
        }
    };

    // Extract the tag after the last `:`.
    //
    // If the value after `:` contains a `/`, it is the port number of
    // the registry, not a tag.
    let (base, tag) = match base.rsplit_once(':') {
        Some((base, tag)) if !tag.contains('/') => {
            if !is_valid_tag(tag) {
                return Err(ParseError::InvalidFormat);
            }
            (base, Some(tag))
        }
        _ => (base, None),
    };

    if tag.is_some() && digest.is_some() {
        return Err(ParseError::TaggedAndDigested);
    }

    // The name must carry a registry host before the first `/`.
    match base.split_once('/') {
        None => {
            // Distinguish a syntactically-broken name from a valid but
            // non-canonical short name.
            if is_valid_repository(base) {
                return Err(ParseError::MissingRegistry);
            }
            return Err(ParseError::InvalidFormat);
        }

        Some((registry, repository)) if is_registry_host(registry) => {
            if !is_valid_host(registry) || !is_valid_repository(repository) {
                return Err(ParseError::InvalidFormat);
            }
        }

        // There is a `/`, but the first component does not look like a
        // host. The whole base is a namespaced short name.
        Some(_) => {
            if is_valid_repository(base) {
                return Err(ParseError::MissingRegistry);
            }
            return Err(ParseError::InvalidFormat);
        }
    }

    let (name, tag) = if let Some(digest) = &digest {
        (format!("{base}@{digest}"), None)
    } else {
        let tag = tag.unwrap_or(DEFAULT_TAG);
        (format!("{base}:{tag}"), Some(tag.to_owned()))
    };

    Ok(ArtifactReference { name, tag, digest })
}

/// A first component with a `.` or a `:`, or `localhost`, is a
/// registry host. Anything else is a repository namespace.
fn is_registry_host(component: &str) -> bool {
    component == "localhost" || component.contains('.') || component.contains(':')
}

fn is_valid_host(host: &str) -> bool {
    let (name, port) = match host.split_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host, None),
    };

    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }

    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
}

fn is_valid_repository(path: &str) -> bool {
    !path.is_empty() && path.split('/').all(is_valid_path_component)
}

/// Repository path components are lowercase alphanumerics with inner
/// `.`, `_` and `-` separators.
fn is_valid_path_component(component: &str) -> bool {
    let bytes = component.as_bytes();

    let inner_ok = bytes.iter().all(|b| {
        b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(*b, b'.' | b'_' | b'-')
    });

    let edge_ok = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    inner_ok && bytes.first().is_some_and(edge_ok) && bytes.last().is_some_and(edge_ok)
}

/// Tags start with an alphanumeric or `_`, followed by up to 127
/// alphanumerics, `.`, `_` or `-`.
fn is_valid_tag(tag: &str) -> bool {
    let mut bytes = tag.bytes();

    let first_ok = bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_');

    first_ok
        && tag.len() <= 128
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

#[cfg(test)]
const FULL_DIGEST: &str = "8b96f36deaf1d2713858eebd9ef2fee9610df8452fbd083bbfa7dca66d6fcd0b";

#[test]
fn parse_valid_references() {
    macro_rules! check {
        ($input:expr, $name:expr, $tag:expr) => {
            let reference = ArtifactReference::new($input).unwrap();
            assert_eq!(reference.name(), $name);
            assert_eq!(reference.tag(), $tag);
        };
    }

    check!(
        "quay.io/podman/machine-os:5.1",
        "quay.io/podman/machine-os:5.1",
        Some("5.1")
    );

    check!(
        "docker.io/library/nginx:latest",
        "docker.io/library/nginx:latest",
        Some("latest")
    );

    check!(
        "quay.io/machine-os/podman",
        "quay.io/machine-os/podman:latest",
        Some("latest")
    );

    check!(
        "localhost:5000/myimage:v1.0",
        "localhost:5000/myimage:v1.0",
        Some("v1.0")
    );

    let digested = format!("quay.io/machine-os/podman@sha256:{FULL_DIGEST}");
    let reference = ArtifactReference::new(&digested).unwrap();
    assert_eq!(reference.name(), digested);
    assert_eq!(reference.tag(), None);
    assert_eq!(reference.digest().unwrap().encoded(), FULL_DIGEST);
}

#[test]
fn normalized_form_reparses_to_itself() {
    for input in [
        "quay.io/machine-os/podman",
        "quay.io/podman/machine-os:5.1",
        "localhost:5000/myimage",
    ] {
        let first = ArtifactReference::new(input).unwrap();
        let second = ArtifactReference::new(first.name()).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn reject_invalid_references() {
    macro_rules! check {
        ($input:expr, $error:pat) => {
            assert!(
                matches!(ArtifactReference::new($input), Err($error)),
                "unexpected result for {:?}: {:?}",
                $input,
                ArtifactReference::new($input),
            );
        };
    }

    check!("", ParseError::InvalidFormat);
    check!("invalid::reference", ParseError::InvalidFormat);
    check!("quay.io/Repo/name", ParseError::InvalidFormat);
    check!("quay.io/", ParseError::InvalidFormat);

    // Partial digests are not valid digests.
    check!(
        "quay.io/machine-os/podman@sha256:8b96f36deaf1d2",
        ParseError::InvalidFormat
    );

    // A raw image ID is ambiguous with a repository name.
    check!(
        "84ddb405470e733d0202d6946e48fc75a7ee231337bdeb31a8579407a7052d9e",
        ParseError::ImageId
    );

    // Short names are not completed with a default registry.
    check!("machine-os:latest", ParseError::MissingRegistry);
    check!("podman/machine-os", ParseError::MissingRegistry);
}

#[test]
fn reject_tag_and_digest_together() {
    let input = format!("quay.io/machine-os/podman:latest@sha256:{FULL_DIGEST}");

    assert!(matches!(
        ArtifactReference::new(&input),
        Err(ParseError::TaggedAndDigested),
    ));
}

#[test]
fn storage_reference_classification() {
    // Valid references resolve, with tag defaulting.
    let re = ArtifactStorageReference::new("quay.io/machine-os/podman").unwrap();
    assert_eq!(re.reference().unwrap().name(), "quay.io/machine-os/podman:latest");
    assert_eq!(re.possible_digest(), None);

    let digested = format!("quay.io/machine-os/podman@sha256:{FULL_DIGEST}");
    let re = ArtifactStorageReference::new(&digested).unwrap();
    assert_eq!(re.reference().unwrap().name(), digested);

    // Everything that fails reference parsing becomes a digest
    // candidate, kept verbatim.
    for input in [
        "sha256:8b96f36deaf1d2",
        "8b96f36deaf1d2",
        "84ddb405470e733d0202d6946e48fc75a7ee231337bdeb31a8579407a7052d9e",
        "invalid::reference",
        "machine-os:latest",
    ] {
        let re = ArtifactStorageReference::new(input).unwrap();
        assert_eq!(re.reference(), None, "input {input:?}");
        assert_eq!(re.possible_digest(), Some(input));
    }

    // Only two hard failures: empty input and tag+digest conflicts.
    assert!(matches!(
        ArtifactStorageReference::new(""),
        Err(ParseError::EmptyNameOrDigest),
    ));

    let conflict = format!("quay.io/podman/machine-os:5.1@sha256:{FULL_DIGEST}");
    assert!(matches!(
        ArtifactStorageReference::new(&conflict),
        Err(ParseError::TaggedAndDigested),
    ));
}
