//! PDF Header Parser
//!
//! Parses the `%PDF-x.y` header according to ISO 32000-1 Section 7.5.2

use crate::error::{PdfError, Result};
use std::fmt;
use tracing::warn;

const MAGIC: &[u8] = b"%PDF-";

/// PDF version, ordered oldest to newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PdfVersion {
    V1_0,
    V1_1,
    V1_2,
    V1_3,
    #[default]
    V1_4,
    V1_5,
    V1_6,
    V1_7,
    V2_0,
}

impl PdfVersion {
    pub const ALL: [PdfVersion; 9] = [
        PdfVersion::V1_0,
        PdfVersion::V1_1,
        PdfVersion::V1_2,
        PdfVersion::V1_3,
        PdfVersion::V1_4,
        PdfVersion::V1_5,
        PdfVersion::V1_6,
        PdfVersion::V1_7,
        PdfVersion::V2_0,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PdfVersion::V1_0 => "1.0",
            PdfVersion::V1_1 => "1.1",
            PdfVersion::V1_2 => "1.2",
            PdfVersion::V1_3 => "1.3",
            PdfVersion::V1_4 => "1.4",
            PdfVersion::V1_5 => "1.5",
            PdfVersion::V1_6 => "1.6",
            PdfVersion::V1_7 => "1.7",
            PdfVersion::V2_0 => "2.0",
        }
    }

    /// Version named like a Catalog `/Version` entry, e.g. `1.6`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == name)
    }

    /// Header line for writing, e.g. `%PDF-1.7`
    pub fn header(&self) -> String {
        format!("%PDF-{}", self.as_str())
    }

    /// Whether cross-reference streams (and object streams) may appear
    pub fn supports_xref_streams(&self) -> bool {
        *self >= PdfVersion::V1_3
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PDF Header information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    pub version: PdfVersion,
    /// A comment line with high-bit bytes follows the version line
    pub has_binary_marker: bool,
}

/// Version assumed when the header names one this parser does not know
pub const FALLBACK_VERSION: PdfVersion = PdfVersion::V1_3;

impl PdfHeader {
    /// Parse the header from the first bytes of a file
    pub fn parse(start: &[u8]) -> Result<Self> {
        if !start.starts_with(MAGIC) {
            return Err(PdfError::NoPdfFile);
        }

        let digits = start.get(MAGIC.len()..MAGIC.len() + 3).unwrap_or_default();
        let version = std::str::from_utf8(digits)
            .ok()
            .and_then(PdfVersion::from_name)
            .unwrap_or_else(|| {
                warn!(
                    "Unknown PDF version {:?} in header, assuming {}",
                    String::from_utf8_lossy(digits),
                    FALLBACK_VERSION
                );
                FALLBACK_VERSION
            });

        Ok(Self {
            version,
            has_binary_marker: Self::check_binary_marker(start),
        })
    }

    fn check_binary_marker(start: &[u8]) -> bool {
        let Some(eol) = start.iter().position(|&b| b == b'\n' || b == b'\r') else {
            return false;
        };
        let rest = &start[eol..];
        let rest = &rest[rest.iter().take_while(|b| b.is_ascii_whitespace()).count()..];
        let line_end = rest
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
            .unwrap_or(rest.len());
        let line = &rest[..line_end];
        line.first() == Some(&b'%') && line.iter().skip(1).filter(|&&b| b >= 128).count() >= 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        for version in PdfVersion::ALL {
            let header = format!("{}\n", version.header());
            assert_eq!(PdfHeader::parse(header.as_bytes()).unwrap().version, version);
        }
    }

    #[test]
    fn test_missing_magic() {
        assert!(matches!(
            PdfHeader::parse(b"%PS-Adobe-3.0").unwrap_err(),
            PdfError::NoPdfFile
        ));
        assert!(matches!(PdfHeader::parse(b"").unwrap_err(), PdfError::NoPdfFile));
        assert!(matches!(
            PdfHeader::parse(b" %PDF-1.4").unwrap_err(),
            PdfError::NoPdfFile
        ));
    }

    #[test]
    fn test_unknown_minor_version_falls_back() {
        assert_eq!(PdfHeader::parse(b"%PDF-1.9\n").unwrap().version, PdfVersion::V1_3);
        assert_eq!(PdfHeader::parse(b"%PDF-").unwrap().version, PdfVersion::V1_3);
        assert!(FALLBACK_VERSION.supports_xref_streams());
    }

    #[test]
    fn test_binary_marker() {
        let with_marker = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n1 0 obj";
        assert!(PdfHeader::parse(with_marker).unwrap().has_binary_marker);
        assert!(!PdfHeader::parse(b"%PDF-1.7\n1 0 obj").unwrap().has_binary_marker);
    }

    #[test]
    fn test_version_ordering() {
        assert!(PdfVersion::V1_7 > PdfVersion::V1_4);
        assert!(PdfVersion::V2_0 > PdfVersion::V1_7);
        assert!(PdfVersion::V1_3.supports_xref_streams());
        assert!(!PdfVersion::V1_2.supports_xref_streams());
        assert_eq!(PdfVersion::from_name("1.6"), Some(PdfVersion::V1_6));
        assert_eq!(PdfVersion::V1_5.to_string(), "1.5");
    }
}
