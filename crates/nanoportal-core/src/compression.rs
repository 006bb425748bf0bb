//! Output compression
//!
//! Negotiation only ever offers gzip. Clients advertising it under the
//! legacy `x-gzip` name get that name echoed back in `Content-Encoding`.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// Content types worth compressing (prefix match)
const COMPRESSIBLE_TYPES: &[&str] = &[
    "text/",
    "application/json",
    "application/javascript",
    "application/xml",
    "application/rss+xml",
    "image/svg+xml",
];

/// Result of `Accept-Encoding` negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptedEncoding {
    /// gzip is acceptable; `alias` is the name the client used
    Gzip {
        /// `"gzip"` or `"x-gzip"`
        alias: &'static str,
    },
    /// Send the body uncompressed
    Identity,
}

impl AcceptedEncoding {
    /// Negotiate from a raw `Accept-Encoding` value.
    ///
    /// The common browser orderings `gzip,...` and `deflate, gzip,...` are
    /// accepted directly. Otherwise a comma-separated entry of `gzip` or
    /// `x-gzip` qualifies when it has no parameters or carries a quality
    /// value starting with `0.` or `1`. Matching is case-sensitive.
    pub fn negotiate(header: &str) -> Self {
        if header.starts_with("gzip,") || header.starts_with("deflate, gzip,") {
            return Self::Gzip { alias: "gzip" };
        }

        header
            .split(',')
            .find_map(|entry| {
                let entry = entry.trim_start();
                let (alias, rest) = if let Some(rest) = entry.strip_prefix("x-gzip") {
                    ("x-gzip", rest)
                } else if let Some(rest) = entry.strip_prefix("gzip") {
                    ("gzip", rest)
                } else {
                    return None;
                };
                quality_allows(rest).then_some(Self::Gzip { alias })
            })
            .unwrap_or(Self::Identity)
    }

    /// Value for the `Content-Encoding` header, if any
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Self::Gzip { alias } => Some(*alias),
            Self::Identity => None,
        }
    }

    /// Whether compression was negotiated
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Gzip { .. })
    }
}

/// Check what follows the encoding name: nothing, or `;q=0.` / `;q=1`.
fn quality_allows(rest: &str) -> bool {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return true;
    }
    let Some(params) = rest.strip_prefix(';') else {
        return false;
    };
    match params.trim_start().strip_prefix("q=") {
        Some(q) => q.starts_with("0.") || q.starts_with('1'),
        None => false,
    }
}

/// Whether a content type is worth compressing
pub fn is_compressible(content_type: &str) -> bool {
    COMPRESSIBLE_TYPES
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
}

/// Gzip a buffer at the given level (clamped to 0-9)
pub fn gzip(data: &[u8], level: u32) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GZIP: AcceptedEncoding = AcceptedEncoding::Gzip { alias: "gzip" };
    const X_GZIP: AcceptedEncoding = AcceptedEncoding::Gzip { alias: "x-gzip" };

    #[test]
    fn test_fast_path_browser_orderings() {
        assert_eq!(AcceptedEncoding::negotiate("gzip, deflate, br"), GZIP);
        assert_eq!(AcceptedEncoding::negotiate("deflate, gzip, br"), GZIP);
    }

    #[test]
    fn test_quality_values() {
        assert_eq!(AcceptedEncoding::negotiate("gzip;q=0.5"), GZIP);
        assert_eq!(AcceptedEncoding::negotiate("deflate;q=1.0, gzip;q=1"), GZIP);
        assert_eq!(AcceptedEncoding::negotiate("br, gzip ; q=0.8"), GZIP);
        assert_eq!(
            AcceptedEncoding::negotiate("gzip;q=0"),
            AcceptedEncoding::Identity
        );
    }

    #[test]
    fn test_x_gzip_alias() {
        assert_eq!(AcceptedEncoding::negotiate("x-gzip"), X_GZIP);
        assert_eq!(AcceptedEncoding::negotiate("deflate, x-gzip;q=0.9"), X_GZIP);
        assert_eq!(X_GZIP.content_encoding(), Some("x-gzip"));
    }

    #[test]
    fn test_no_compression() {
        for header in ["", "identity", "deflate", "br", "gzipper", "GZIP", "*"] {
            assert_eq!(
                AcceptedEncoding::negotiate(header),
                AcceptedEncoding::Identity,
                "{header:?}"
            );
        }
        assert_eq!(AcceptedEncoding::Identity.content_encoding(), None);
    }

    #[test]
    fn test_compressible_types() {
        assert!(is_compressible("text/html; charset=utf-8"));
        assert!(is_compressible("application/json"));
        assert!(!is_compressible("image/png"));
    }

    #[test]
    fn test_gzip_magic_bytes() {
        let compressed = gzip(b"Hello, World! Hello, World! Hello, World!", 6).unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
    }
}
