//! MIME type detection for blob content.
//!
//! Classification looks at the first bytes of the content: byte-order
//! marks, HTML tags, and a table of magic-number signatures, with a
//! printable-text scan as the final step. The file name extension is
//! consulted only when the content scan is ambiguous.

/// Number of leading bytes considered by the sniffer.
pub(crate) const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Magic-number signatures checked against the start of the content.
const EXACT_SIGNATURES: &[(&[u8], &str)] = &[
    (b"\xEF\xBB\xBF", TEXT_PLAIN),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\x89PNG\r\n\x1A\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x00asm", "application/wasm"),
];

/// Tags that identify HTML content. Matched case-insensitively after
/// leading whitespace, and only when followed by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Fallbacks by file extension, for content the signature scan cannot
/// identify.
const EXTENSIONS: &[(&str, &str)] = &[
    ("gz", "application/x-gzip"),
    ("jar", "application/zip"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("tar", "application/x-tar"),
    ("tgz", "application/x-gzip"),
    ("txt", TEXT_PLAIN),
    ("wasm", "application/wasm"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("zip", "application/zip"),
    ("zst", "application/zstd"),
];

/// Classify blob content from its leading bytes.
///
/// A signature match always wins over the file name; the extension
/// table is consulted only when the content scan ends in
/// `application/octet-stream`.
pub(crate) fn classify(head: &[u8], file_name: &str) -> String {
    let sniffed = detect_content_type(head);

    if sniffed == OCTET_STREAM {
        if let Some(from_extension) = by_extension(file_name) {
            return from_extension.to_owned();
        }
    }

    sniffed.to_owned()
}

fn detect_content_type(head: &[u8]) -> &'static str {
    for (signature, content_type) in EXACT_SIGNATURES {
        if head.starts_with(signature) {
            return content_type;
        }
    }

    let trimmed = skip_whitespace(head);

    for tag in HTML_TAGS {
        if html_tag_matches(trimmed, tag) {
            return TEXT_HTML;
        }
    }

    if trimmed.len() >= 5 && trimmed[..5].eq_ignore_ascii_case(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    // RIFF container with a WEBP chunk.
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return "image/webp";
    }

    // POSIX tar puts its magic at offset 257.
    if head.len() >= 262 && &head[257..262] == b"ustar" {
        return "application/x-tar";
    }

    if head.iter().any(|&b| is_binary_byte(b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn by_extension(file_name: &str) -> Option<&'static str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();

    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == extension)
        .map(|(_, content_type)| *content_type)
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());

    &data[start..]
}

/// The tag must appear in full, case-insensitively, followed by a
/// space or `>`.
fn html_tag_matches(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() {
        return false;
    }

    data[..tag.len()].eq_ignore_ascii_case(tag) && matches!(data[tag.len()], b' ' | b'>')
}

/// Control characters other than tab, newline, form feed, carriage
/// return and escape mark the content as binary.
fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[test]
fn signatures_override_extensions() {
    const PNG: &[u8] = b"\x89PNG\r\n\x1A\n\x00\x00";
    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JF";

    assert_eq!(classify(PNG, "picture.txt"), "image/png");
    assert_eq!(classify(JPEG, "data.bin"), "image/jpeg");
    assert_eq!(classify(b"\x1F\x8B\x08\x00", "layer"), "application/x-gzip");
}

#[test]
fn text_and_html_detection() {
    assert_eq!(classify(b"Hello, World!", "test.txt"), TEXT_PLAIN);
    assert_eq!(classify(b"Small", "small.txt"), TEXT_PLAIN);

    // JSON has no signature of its own; it is plain text.
    assert_eq!(
        classify(br#"{"key": "value", "number": 123}"#, "test.json"),
        TEXT_PLAIN
    );

    assert_eq!(
        classify(b"<!DOCTYPE html><html><body>Test</body></html>", "test.html"),
        TEXT_HTML
    );

    assert_eq!(
        classify(b"  \n\t<html><head></head></html>", "page"),
        TEXT_HTML
    );

    assert_eq!(
        classify(b"<?xml version=\"1.0\"?><a/>", "doc"),
        "text/xml; charset=utf-8"
    );

    // Empty content has nothing binary in it.
    assert_eq!(classify(b"", "empty"), TEXT_PLAIN);
}

#[test]
fn extension_fallback_for_unknown_binary() {
    // No signature, binary bytes: the extension decides.
    const JUNK: &[u8] = b"\x00\x01\x02\x03binary";

    assert_eq!(classify(JUNK, "archive.tar"), "application/x-tar");
    assert_eq!(classify(JUNK, "bundle.ZST"), "application/zstd");
    assert_eq!(classify(JUNK, "no-extension"), OCTET_STREAM);
    assert_eq!(classify(JUNK, "unknown.xyz"), OCTET_STREAM);
}

#[test]
fn tar_magic_at_offset() {
    let mut data = vec![0u8; 400];
    data[257..262].copy_from_slice(b"ustar");

    assert_eq!(classify(&data, "layer"), "application/x-tar");
}
