//! Linearization dictionary detection
//!
//! A linearized file (ISO 32000-1 Annex F) starts with an object whose
//! dictionary carries `/Linearized`. It is only recorded as a hint; parsing
//! never depends on it.

use super::lexer::Tokenizer;
use crate::error::Result;
use crate::objects::{Dictionary, Reference, Variant};
use std::io::{Read, Seek};
use tracing::warn;

/// How far into the file the linearization dictionary may start
pub const LINEARIZATION_WINDOW: usize = 1024;

/// The linearization parameter dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    reference: Reference,
    dict: Dictionary,
}

impl Linearization {
    pub fn reference(&self) -> Reference {
        self.reference
    }

    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    /// `/L`: file length
    pub fn file_length(&self) -> Option<i64> {
        self.number("L")
    }

    /// `/T`: offset of the first page's cross-reference section
    pub fn main_xref_offset(&self) -> Option<i64> {
        self.number("T")
    }

    /// `/N`: page count
    pub fn page_count(&self) -> Option<i64> {
        self.number("N")
    }

    /// `/O`: object number of the first page
    pub fn first_page_object(&self) -> Option<i64> {
        self.number("O")
    }

    fn number(&self, key: &str) -> Option<i64> {
        self.dict.get(key).and_then(Variant::as_number)
    }
}

/// Look for a linearization dictionary in the first bytes of the file.
/// Anything that does not parse is logged and ignored.
pub(crate) fn detect_linearization<R: Read + Seek>(
    tokenizer: &mut Tokenizer<R>,
) -> Option<Linearization> {
    match read_linearization(tokenizer) {
        Ok(found) => found,
        Err(e) => {
            warn!("Ignoring unreadable linearization dictionary: {}", e);
            None
        }
    }
}

fn read_linearization<R: Read + Seek>(
    tokenizer: &mut Tokenizer<R>,
) -> Result<Option<Linearization>> {
    tokenizer.seek(0)?;
    let head = tokenizer.read_raw(LINEARIZATION_WINDOW)?;
    let Some(keyword) = head.windows(3).position(|w| w == b"obj") else {
        return Ok(None);
    };

    // The header starts the line holding "obj"
    let start = head[..keyword]
        .iter()
        .rposition(|&b| b == b'\n' || b == b'\r')
        .map_or(0, |p| p + 1);

    tokenizer.seek(start as u64)?;
    let reference = tokenizer.read_object_header()?;
    let value = tokenizer.next_variant()?;
    Ok(match value {
        Variant::Dictionary(dict) if dict.contains_key("Linearized") => {
            Some(Linearization { reference, dict })
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn detect(input: &[u8]) -> Option<Linearization> {
        detect_linearization(&mut Tokenizer::new(Cursor::new(input.to_vec())))
    }

    #[test]
    fn test_detect_linearized_file() {
        let found = detect(
            b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n4 0 obj\n<< /Linearized 1 /L 9000 /O 6 /E 800 /N 2 /T 8700 >>\nendobj\n",
        )
        .unwrap();
        assert_eq!(found.reference(), Reference::new(4, 0));
        assert_eq!(found.file_length(), Some(9000));
        assert_eq!(found.main_xref_offset(), Some(8700));
        assert_eq!(found.page_count(), Some(2));
        assert_eq!(found.first_page_object(), Some(6));
    }

    #[test]
    fn test_without_binary_comment() {
        let found = detect(b"%PDF-1.5\n7 0 obj << /Linearized 1 /N 1 >> endobj").unwrap();
        assert_eq!(found.reference(), Reference::new(7, 0));
    }

    #[test]
    fn test_ordinary_first_object() {
        assert!(detect(b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n").is_none());
    }

    #[test]
    fn test_no_object_in_window() {
        let mut input = b"%PDF-1.4\n".to_vec();
        input.extend(std::iter::repeat(b' ').take(LINEARIZATION_WINDOW));
        input.extend_from_slice(b"1 0 obj << /Linearized 1 >> endobj");
        assert!(detect(&input).is_none());
    }

    #[test]
    fn test_broken_dictionary_is_ignored() {
        assert!(detect(b"%PDF-1.5\n4 0 obj\n<< /Linearized 1 /L ").is_none());
    }
}
