use std::{
    fmt,
    io::{self, Read, Write},
};

use sha2::Digest as _;

/// Algorithm used to compute a digest value.
///
/// See [`Digest`] for an example.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DigestAlgorithm {
    SHA256,
    SHA512,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::SHA256 => "sha256",
            DigestAlgorithm::SHA512 => "sha512",
        }
    }
}

/// A content digest, in the `algorithm:hex` form used by OCI
/// descriptors and blob directories.
///
/// # Examples
///
/// ```
/// # use oci_artifact_store::*;
/// const HEX: &str = "123456789012345678901234567890123456789012345678901234567890abcd";
///
/// let digest = Digest::try_from(format!("sha256:{}", HEX)).unwrap();
/// assert_eq!(digest.algorithm(), DigestAlgorithm::SHA256);
/// assert_eq!(digest.encoded(), HEX);
/// assert_eq!(digest.to_string(), format!("sha256:{}", HEX));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct Digest {
    source: String,
    algorithm: DigestAlgorithm,
}

/// Errors from the digest parser.
#[derive(thiserror::Error, Debug)]
pub enum DigestError {
    #[error("invalid digest algorithm")]
    InvalidAlgorithm,

    #[error("invalid digest value")]
    InvalidValue,
}

impl Digest {
    /// Compute the SHA-256 digest of a byte buffer.
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Digest {
        let hex = HexString(sha2::Sha256::digest(data.as_ref()));

        Digest {
            source: format!("sha256:{hex}"),
            algorithm: DigestAlgorithm::SHA256,
        }
    }

    /// Full `algorithm:hex` string.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Hexadecimal part, without the algorithm prefix.
    pub fn encoded(&self) -> &str {
        self.source
            .split_once(':')
            .map(|(_, h)| h)
            .unwrap_or_default()
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Return a `Read` instance to verify the content against this digest.
    ///
    /// When all data from `reader` is consumed, the computed digest is
    /// compared with the expected one. On a mismatch, the final read
    /// returns an [`InvalidData`](::std::io::ErrorKind::InvalidData)
    /// error instead of the end-of-file.
    pub fn wrap_reader<R: Read>(&self, reader: R) -> impl Read {
        let hasher: Box<dyn digest::DynDigest> = match self.algorithm {
            DigestAlgorithm::SHA256 => Box::new(sha2::Sha256::new()),
            DigestAlgorithm::SHA512 => Box::new(sha2::Sha512::new()),
        };

        VerifyingReader {
            hasher,
            expected: self.encoded().to_owned(),
            reader,
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl serde::Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.source)
    }
}

impl TryFrom<String> for Digest {
    type Error = DigestError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        let (algorithm, value, expected_size) = {
            if let Some(h) = source.strip_prefix("sha256:") {
                (DigestAlgorithm::SHA256, h, 256 / 8 * 2)
            } else if let Some(h) = source.strip_prefix("sha512:") {
                (DigestAlgorithm::SHA512, h, 512 / 8 * 2)
            } else {
                return Err(DigestError::InvalidAlgorithm);
            }
        };

        // The hash value must have the exact length for the algorithm,
        // and contain only hexadecimal digits.
        if value.len() == expected_size && value.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Digest { source, algorithm })
        } else {
            Err(DigestError::InvalidValue)
        }
    }
}

impl TryFrom<&str> for Digest {
    type Error = DigestError;

    fn try_from(source: &str) -> Result<Self, Self::Error> {
        Digest::try_from(source.to_owned())
    }
}

/// Compute a SHA-256 digest while copying data to `writer`.
///
/// The write-side twin of [`Digest::wrap_reader`]: blobs are hashed in
/// the same pass that streams them into the store.
pub(crate) struct DigestWriter<W> {
    hasher: sha2::Sha256,
    written: u64,
    writer: W,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(writer: W) -> Self {
        DigestWriter {
            hasher: sha2::Sha256::new(),
            written: 0,
            writer,
        }
    }

    /// Consume the writer, returning the digest of everything written
    /// and the number of bytes.
    pub fn finalize(self) -> (Digest, u64) {
        let hex = HexString(self.hasher.finalize());

        let digest = Digest {
            source: format!("sha256:{hex}"),
            algorithm: DigestAlgorithm::SHA256,
        };

        (digest, self.written)
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

struct VerifyingReader<R> {
    hasher: Box<dyn digest::DynDigest>,
    expected: String,
    reader: R,
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let buf_len = buf.len();
        let n = self.reader.read(buf)?;

        if n == 0 && buf_len > 0 {
            // On EOF, compare the computed digest with the expected one.
            return self.check_hash();
        }

        self.hasher.update(&buf[..n]);

        Ok(n)
    }
}

impl<R> VerifyingReader<R> {
    fn check_hash(&mut self) -> io::Result<usize> {
        const MAX_DIGEST_SIZE: usize = 512 / 8;

        debug_assert_eq!(self.hasher.output_size() * 2, self.expected.len());

        let mut buffer = [0u8; MAX_DIGEST_SIZE];
        let out = &mut buffer[..self.hasher.output_size()];

        self.hasher
            .finalize_into_reset(out)
            .map_err(io::Error::other)?;

        let computed = HexString(&out).to_string();
        if computed.eq_ignore_ascii_case(&self.expected) {
            Ok(0)
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "digest mismatch: expected {}, got {}",
                    self.expected, computed
                ),
            ))
        }
    }
}

/// Encode a byte buffer as hex string.
pub(crate) struct HexString<T>(pub T);

impl<T: AsRef<[u8]>> fmt::Display for HexString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .as_ref()
            .iter()
            .try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}

#[test]
fn encode_hex_bytes() {
    assert_eq!(HexString(b"\x01\x20\xf0").to_string(), "0120f0");
}

#[test]
fn digest_of_bytes() {
    /// Digest for `abc`.
    const DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    let digest = Digest::from_bytes(b"abc");
    assert_eq!(digest.algorithm(), DigestAlgorithm::SHA256);
    assert_eq!(digest.encoded(), DIGEST);
    assert_eq!(digest.as_str(), format!("sha256:{DIGEST}"));
}

#[test]
fn reject_invalid_digest_strings() {
    assert!(matches!(
        Digest::try_from("md5:0000"),
        Err(DigestError::InvalidAlgorithm),
    ));

    assert!(matches!(
        Digest::try_from("sha256:0000"),
        Err(DigestError::InvalidValue),
    ));

    assert!(matches!(
        Digest::try_from(format!("sha256:{:064}", "x")),
        Err(DigestError::InvalidValue),
    ));
}

#[test]
fn writer_matches_reader() {
    use std::io::Cursor;

    let mut writer = DigestWriter::new(io::sink());
    writer.write_all(b"some blob content").unwrap();
    let (digest, size) = writer.finalize();

    assert_eq!(size, 17);

    // Accept the content it was computed from.
    let mut output = Vec::new();
    digest
        .wrap_reader(Cursor::new("some blob content"))
        .read_to_end(&mut output)
        .unwrap();
    assert_eq!(output, b"some blob content");

    // Reject anything else.
    output.clear();
    let err = digest
        .wrap_reader(Cursor::new("some blob contenX"))
        .read_to_end(&mut output)
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[test]
fn digest_in_json() {
    #[derive(serde::Serialize, serde::Deserialize, Debug)]
    struct Example {
        digest: Digest,
    }

    let digest = Digest::from_bytes(b"x");
    let json = serde_json::to_string(&Example {
        digest: digest.clone(),
    })
    .unwrap();

    assert_eq!(json, format!(r#"{{"digest":"{digest}"}}"#));

    let parsed: Example = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.digest, digest);
}
