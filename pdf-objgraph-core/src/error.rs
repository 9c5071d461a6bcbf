use thiserror::Error;

use crate::objects::Reference;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a PDF file: missing %PDF- magic")]
    NoPdfFile,

    #[error("No %%EOF marker found at end of file")]
    NoEOFToken,

    #[error("No cross-reference section found: {0}")]
    NoXRef(String),

    #[error("Invalid cross-reference section: {0}")]
    InvalidXRef(String),

    #[error("Invalid cross-reference stream: {0}")]
    InvalidXRefStream(String),

    #[error("Invalid cross-reference entry type: {0}")]
    InvalidXRefType(u64),

    #[error("No trailer dictionary found")]
    NoTrailer,

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    #[error("Unexpected end of file: {0}")]
    UnexpectedEOF(String),

    #[error("Expected a number, found {0:?}")]
    NoNumber(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("No such object: {0}")]
    NoObject(String),

    #[error("Invalid stream length: {0}")]
    InvalidStreamLength(String),

    #[error("Invalid encryption dictionary: {0}")]
    InvalidEncryptionDict(String),

    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    #[error("Circular reference detected at {0}")]
    CircularReference(Reference),

    #[error("Internal logic error: {0}")]
    InternalLogic(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<PdfError>,
    },
}

pub type Result<T> = std::result::Result<T, PdfError>;

impl PdfError {
    /// Wrap this error with a call-stack note.
    pub fn context(self, context: impl Into<String>) -> Self {
        PdfError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every call-stack note peeled off.
    pub fn root(&self) -> &PdfError {
        let mut current = self;
        while let PdfError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Call-stack notes from the outermost to the innermost.
    pub fn notes(&self) -> Vec<&str> {
        let mut notes = Vec::new();
        let mut current = self;
        while let PdfError::Context { context, source } = current {
            notes.push(context.as_str());
            current = source;
        }
        notes
    }

    /// True if the document needs a (different) password before objects can be read.
    pub fn is_invalid_password(&self) -> bool {
        matches!(self.root(), PdfError::InvalidPassword(_))
    }
}

/// Adds call-stack notes to fallible results.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_pdf_error_display() {
        let error = PdfError::InvalidXRef("subsection count mismatch".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid cross-reference section: subsection count mismatch"
        );
        assert_eq!(
            PdfError::CircularReference(Reference::new(4, 0)).to_string(),
            "Circular reference detected at 4 0 R"
        );
    }

    #[test]
    fn test_pdf_error_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error = PdfError::from(io_error);

        match pdf_error {
            PdfError::Io(ref err) => assert_eq!(err.kind(), ErrorKind::NotFound),
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_context_keeps_root() {
        let error = PdfError::NoTrailer
            .context("Unable to read trailer")
            .context("Unable to load xref entries");

        assert!(matches!(error.root(), PdfError::NoTrailer));
        assert_eq!(
            error.notes(),
            vec!["Unable to load xref entries", "Unable to read trailer"]
        );
        assert_eq!(
            error.to_string(),
            "Unable to load xref entries: Unable to read trailer: No trailer dictionary found"
        );
    }

    #[test]
    fn test_invalid_password_detection_through_context() {
        let error = PdfError::InvalidPassword("A password is required".to_string())
            .context("Unable to read objects");
        assert!(error.is_invalid_password());
        assert!(!PdfError::NoTrailer.is_invalid_password());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(PdfError::NoEOFToken);
        let annotated = result.with_context(|| format!("checking {} bytes", 5));
        let err = annotated.unwrap_err();
        assert_eq!(err.notes(), vec!["checking 5 bytes"]);
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfError>();
    }
}
