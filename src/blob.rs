//! Blob inputs for [`ArtifactStore::add`](crate::ArtifactStore::add).

use std::{
    fmt,
    fs::File,
    io::{self, Cursor, Read},
    path::PathBuf,
};

use crate::mime::{self, SNIFF_LEN};

/// One file to be added to an artifact.
///
/// The content comes from `file_path` or from `reader`, never both.
/// `file_name` is recorded in the layer's title annotation and drives
/// the extension-based MIME fallback.
pub struct ArtifactBlob {
    /// Path to an existing file. Mutually exclusive with `reader`.
    pub file_path: Option<PathBuf>,

    /// In-memory or streaming source. Mutually exclusive with
    /// `file_path`.
    pub reader: Option<Box<dyn Read>>,

    /// Name for the layer title annotation.
    pub file_name: String,
}

impl ArtifactBlob {
    /// Blob backed by a file on disk. The file name defaults to the
    /// last path component.
    pub fn from_file(path: impl Into<PathBuf>) -> ArtifactBlob {
        let path = path.into();

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        ArtifactBlob {
            file_path: Some(path),
            reader: None,
            file_name,
        }
    }

    /// Blob backed by a reader.
    pub fn from_reader(reader: impl Read + 'static, file_name: impl Into<String>) -> ArtifactBlob {
        ArtifactBlob {
            file_path: None,
            reader: Some(Box::new(reader)),
            file_name: file_name.into(),
        }
    }

    /// Replace the file name used for the title annotation.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> ArtifactBlob {
        self.file_name = file_name.into();
        self
    }
}

impl fmt::Debug for ArtifactBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactBlob")
            .field("file_path", &self.file_path)
            .field("reader", &self.reader.as_ref().map(|_| ".."))
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// Errors from blob classification.
#[derive(thiserror::Error, Debug)]
pub enum BlobError {
    #[error("either a blob file path or a blob reader must be provided, but not both")]
    InvalidSource,

    #[error("I/O error in {1}: {0}")]
    Io(io::Error, PathBuf),
}

/// Where the blob content is copied from after classification.
pub(crate) enum BlobSource {
    /// The caller reopens the file when copying.
    File(PathBuf),

    /// Complete content: the sniffed bytes followed by the unread
    /// remainder.
    Reader(Box<dyn Read>),
}

/// Determine the MIME type of a blob's content.
///
/// For a file path, the first [`SNIFF_LEN`] bytes are classified and
/// the path is handed back; no reader stays open. For a reader source,
/// the bytes consumed by the sniffer are chained back in front of the
/// remainder, so the caller always gets the complete content exactly
/// once.
pub(crate) fn determine_blob_mime_type(
    blob: ArtifactBlob,
) -> Result<(BlobSource, String), BlobError> {
    match (blob.file_path, blob.reader) {
        (Some(_), Some(_)) | (None, None) => Err(BlobError::InvalidSource),

        (Some(path), None) => {
            let head = File::open(&path)
                .and_then(read_head)
                .map_err(|e| BlobError::Io(e, path.clone()))?;

            let mime_type = mime::classify(&head, &blob.file_name);

            Ok((BlobSource::File(path), mime_type))
        }

        (None, Some(mut reader)) => {
            let head = read_head(reader.by_ref())
                .map_err(|e| BlobError::Io(e, blob.file_name.clone().into()))?;

            let mime_type = mime::classify(&head, &blob.file_name);
            let replay = Cursor::new(head).chain(reader);

            Ok((BlobSource::Reader(Box::new(replay)), mime_type))
        }
    }
}

fn read_head(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    reader.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(head)
}
