//! Test Suite for pdf-objgraph
//!
//! Programmatic generators for well-formed and deliberately broken PDF
//! files, shared by the cross-module tests and the benchmarks.

pub mod generators;

pub use generators::{StreamEncoding, TestPdfBuilder, XRefFormat};

/// Common test utilities
pub mod utils {
    use std::io::Write;

    /// Write `data` to a temporary file that lives as long as the handle
    pub fn temp_pdf(data: &[u8]) -> anyhow::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        file.write_all(data)?;
        file.flush()?;
        Ok(file)
    }

    /// Position of the first `needle` in `data`
    pub fn find(data: &[u8], needle: &[u8]) -> Option<usize> {
        data.windows(needle.len()).position(|w| w == needle)
    }
}
