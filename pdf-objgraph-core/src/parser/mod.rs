//! PDF Parser Module
//!
//! Reads the structure of a PDF file according to ISO 32000-1 (PDF 1.7) and
//! ISO 32000-2 (PDF 2.0): header, cross-reference tables and streams,
//! trailers of every incremental update, object streams and the encryption
//! dictionary. Objects are handed out through an [`IndirectObjectTable`]
//! and read from the file when first accessed.
//!
//! [`IndirectObjectTable`]: crate::objects::IndirectObjectTable

pub mod encryption_handler;
pub mod filters;
pub mod header;
pub mod lexer;
pub mod linearization;
pub(crate) mod loader;
pub mod object_stream;
pub mod reader;
pub mod stack_safe;
pub mod trailer;
mod variant_reader;
pub mod xref;
pub mod xref_stream;

#[cfg(test)]
pub(crate) mod test_helpers;



pub use self::encryption_handler::{EncryptionInfo, SecurityHandler, SecurityHandlerFactory};
pub use self::header::{PdfHeader, PdfVersion};
pub use self::lexer::{Token, TokenKind, Tokenizer};
pub use self::linearization::Linearization;
pub use self::object_stream::ObjectStream;
pub use self::reader::PdfParser;
pub use self::trailer::PdfTrailer;
pub use self::xref::{XRefEntry, XRefTable};
pub use self::xref_stream::{XRefStream, XRefStreamBuilder};

/// Default cap on the number of cross-reference sections followed through
/// `/Prev` and `/XRefStm`
pub const MAX_XREF_SECTIONS: usize = 500;

/// Options for parsing PDF files with different levels of strictness
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Turn every recoverable condition into an error
    pub strict: bool,
    /// Objects that fail to parse become free entries instead of failing the document
    pub ignore_broken_objects: bool,
    /// Parse object values when first accessed rather than while opening
    pub load_on_demand: bool,
    /// Search for `endstream` when a stream's `/Length` is unusable
    pub lenient_streams: bool,
    /// How far to search for `endstream` during stream recovery
    pub max_recovery_bytes: usize,
    /// Reject trailers whose `/Size` is larger than this
    pub max_objects: Option<usize>,
    /// Upper bound on cross-reference sections, stops `/Prev` loops
    pub max_xref_sections: usize,
    /// Whether `create_object` may reuse numbers from the free list
    pub can_reuse_object_numbers: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict: false,
            ignore_broken_objects: true,
            load_on_demand: true,
            lenient_streams: false,
            max_recovery_bytes: 1000,
            max_objects: None,
            max_xref_sections: MAX_XREF_SECTIONS,
            can_reuse_object_numbers: true,
        }
    }
}

impl ParseOptions {
    /// Create options for strict parsing
    pub fn strict() -> Self {
        Self {
            strict: true,
            ignore_broken_objects: false,
            lenient_streams: false,
            max_recovery_bytes: 0,
            ..Self::default()
        }
    }

    /// Create options for lenient parsing of damaged files
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ignore_broken_objects: true,
            lenient_streams: true,
            max_recovery_bytes: 5000,
            ..Self::default()
        }
    }

    /// Parse every object while opening
    pub fn eager(mut self) -> Self {
        self.load_on_demand = false;
        self
    }
}
