//! Record dump format detection.
//!
//! Record dumps are JSON-lines files with one [`Record`](crate::source::Record)
//! per line. They may be stored as-is or gzip-compressed; the encoding is
//! recognised from the first bytes of the file rather than its extension.
//!
//! # Example
//!
//! ```
//! use replay_extract::format::{detect_encoding, DumpEncoding};
//!
//! assert_eq!(detect_encoding(b"\x1F\x8B\x08\x00"), DumpEncoding::Gzip);
//! assert_eq!(detect_encoding(b"{\"tick\":0}"), DumpEncoding::Plain);
//! assert_eq!(detect_encoding(b""), DumpEncoding::Plain);
//! ```

/// The gzip member magic bytes.
pub const GZIP_MAGIC: &[u8; 2] = b"\x1F\x8B";

/// How a record dump is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpEncoding {
    /// Uncompressed JSON lines.
    Plain,
    /// Gzip-compressed JSON lines.
    Gzip,
}

impl DumpEncoding {
    /// Conventional file extension for the encoding.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            DumpEncoding::Plain => "jsonl",
            DumpEncoding::Gzip => "jsonl.gz",
        }
    }
}

/// Detects the encoding of a record dump from its leading bytes.
///
/// Anything that does not start with the gzip magic is treated as plain
/// text; malformed content surfaces later as a per-line decode error.
#[must_use]
pub fn detect_encoding(data: &[u8]) -> DumpEncoding {
    if data.starts_with(GZIP_MAGIC) {
        DumpEncoding::Gzip
    } else {
        DumpEncoding::Plain
    }
}
