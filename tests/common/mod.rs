//! Helpers shared by the store tests.

use std::{fs, path::Path};

use oci_artifact_store::*;

pub const TEST_ARTIFACT_TYPE: &str = "application/vnd.test+type";

/// Deterministic pseudo-random bytes. Tests must not depend on an
/// entropy source.
pub fn content(size: usize, seed: u64) -> Vec<u8> {
    let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;

    (0..size)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

fn seed_for(file_name: &str, size: usize) -> u64 {
    file_name
        .bytes()
        .fold(size as u64, |a, b| a.wrapping_mul(31).wrapping_add(b.into()))
}

/// Create a file with deterministic content under `dir`, returning a
/// blob for it and the digest of its content.
pub fn test_blob(dir: &Path, file_name: &str, size: usize) -> (ArtifactBlob, Digest) {
    let data = content(size, seed_for(file_name, size));

    let path = dir.join(file_name);
    fs::write(&path, &data).unwrap();

    (ArtifactBlob::from_file(path), Digest::from_bytes(&data))
}

/// Options with the artifact type every test artifact uses unless it
/// says otherwise.
pub fn default_options() -> AddOptions {
    AddOptions {
        artifact_mime_type: Some(TEST_ARTIFACT_TYPE.to_owned()),
        ..AddOptions::default()
    }
}

/// Add an artifact made of `files` (name, size) pairs. Returns the
/// manifest digest and the content digest of every file.
pub fn add_artifact(
    store: &ArtifactStore,
    scratch: &Path,
    name: &str,
    files: &[(&str, usize)],
    options: AddOptions,
) -> (Digest, Vec<(String, Digest)>) {
    let reference = ArtifactReference::new(name).unwrap();

    let mut blobs = Vec::new();
    let mut checksums = Vec::new();

    for (file_name, size) in files {
        let (blob, digest) = test_blob(scratch, file_name, *size);
        blobs.push(blob);
        checksums.push(((*file_name).to_owned(), digest));
    }

    let digest = store.add(&reference, blobs, options).unwrap();

    (digest, checksums)
}
