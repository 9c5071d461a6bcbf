//! # pdf-objgraph
//!
//! The document-structure layer of a PDF engine: everything between the raw
//! bytes of a file and a graph of typed, addressable objects.
//!
//! ## Features
//!
//! - **Tokenizer**: byte-level lexing with exact token push-back
//! - **Object model**: `Variant` values, dictionaries and arrays with dirty
//!   tracking, streams, and indirect objects that load on first access
//! - **Cross-reference discovery**: classic tables, xref streams, hybrid
//!   files and every incremental update reachable through `/Prev`
//! - **Object streams**: compressed objects expanded into the object table
//! - **Recovery**: lenient handling of damaged files with a strict mode that
//!   turns every recoverable condition into an error
//! - **Encryption seam**: plug in a security handler; strings and streams are
//!   decrypted as objects load
//! - **Serializer**: write an object table back out with a classic xref table
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_objgraph::parser::PdfParser;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = PdfParser::open("document.pdf")?;
//! println!("Version: {}", parser.version());
//!
//! let catalog = parser.catalog()?;
//! if let Some(pages) = parser.get_indirect_key(catalog, "Pages")? {
//!     println!("Pages: {:?}", pages);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Writing
//!
//! ```rust,no_run
//! use pdf_objgraph::parser::PdfParser;
//! use pdf_objgraph::writer::PdfWriter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = PdfParser::open("input.pdf")?;
//! let mut writer = PdfWriter::create("output.pdf")?;
//! writer.write_document(parser.version(), parser.objects(), parser.trailer().dict())?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod objects;
pub mod parser;
pub mod writer;

pub use error::{PdfError, Result, ResultExt};
pub use objects::{
    Array, DataType, Dictionary, IndirectObjectTable, LoadState, Name, Object, PdfString,
    Reference, Stream, Variant,
};
pub use parser::{ParseOptions, PdfParser, PdfVersion, SecurityHandler, SecurityHandlerFactory};
pub use writer::PdfWriter;

/// Current version of pdf-objgraph
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Supported PDF versions
pub mod pdf_version {
    /// Header versions the parser recognizes
    pub const SUPPORTED_VERSIONS: &[&str] =
        &["1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7", "2.0"];
}
