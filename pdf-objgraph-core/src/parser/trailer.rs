//! PDF Trailer
//!
//! The trailer dictionary according to ISO 32000-1 Section 7.5.5. Files with
//! incremental updates carry one trailer per revision; the parser starts from
//! the newest one and fills in keys it lacks from older revisions.

use crate::error::{PdfError, Result};
use crate::objects::{Array, Dictionary, PdfString, Reference, Variant};
use tracing::debug;

/// Keys an older trailer may contribute to the merged trailer
pub const MERGED_KEYS: [&str; 5] = ["Size", "Root", "Encrypt", "Info", "ID"];

/// The document trailer, merged across revisions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfTrailer {
    dict: Dictionary,
}

/// Keys that describe one cross-reference section rather than the document
pub const SECTION_KEYS: [&str; 8] = [
    "Prev",
    "XRefStm",
    "Type",
    "W",
    "Index",
    "Length",
    "Filter",
    "DecodeParms",
];

impl PdfTrailer {
    pub fn from_dict(dict: Dictionary) -> Self {
        Self { dict }
    }

    /// The trailer of the newest section, a `trailer` dictionary or the
    /// dictionary of an xref stream, without its section keys
    pub fn from_section(mut dict: Dictionary) -> Self {
        for key in SECTION_KEYS {
            dict.remove(key);
        }
        Self { dict }
    }

    /// Fill keys missing from this trailer with the values of an older one.
    /// Keys already present are never replaced. Returns how many were added.
    pub fn merge(&mut self, older: &Dictionary) -> usize {
        let mut added = 0;
        for key in MERGED_KEYS {
            if self.dict.contains_key(key) {
                continue;
            }
            if let Some(value) = older.get(key) {
                self.dict.insert(key, value.clone());
                added += 1;
            }
        }
        if added > 0 {
            debug!("Merged {} keys from an older trailer", added);
        }
        added
    }

    /// The `/Size` entry
    pub fn size(&self) -> Option<i64> {
        self.dict.get("Size").and_then(Variant::as_number)
    }

    /// Reference to the document catalog
    pub fn root(&self) -> Option<Reference> {
        self.dict.get("Root").and_then(Variant::as_reference)
    }

    /// Reference to the document information dictionary
    pub fn info(&self) -> Option<Reference> {
        self.dict.get("Info").and_then(Variant::as_reference)
    }

    /// The `/Encrypt` entry, a reference or a direct dictionary
    pub fn encrypt(&self) -> Option<&Variant> {
        self.dict.get("Encrypt").filter(|value| !value.is_null())
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypt().is_some()
    }

    /// The `/ID` file identifier array
    pub fn id(&self) -> Option<&Array> {
        self.dict.get("ID").and_then(Variant::as_array)
    }

    /// First element of `/ID`, the permanent document identifier
    pub fn document_id(&self) -> Result<&PdfString> {
        self.id()
            .and_then(|id| id.get(0))
            .and_then(Variant::as_string)
            .ok_or_else(|| {
                PdfError::InvalidEncryptionDict("no document ID found in trailer".to_string())
            })
    }

    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    pub fn dict_mut(&mut self) -> &mut Dictionary {
        &mut self.dict
    }

    pub fn into_dict(self) -> Dictionary {
        self.dict
    }
}

/// Byte offset stored under `key` (`/Prev` or `/XRefStm`) of a section trailer
pub(crate) fn section_offset(dict: &Dictionary, key: &str) -> Option<u64> {
    dict.get(key)
        .and_then(Variant::as_number)
        .and_then(|n| u64::try_from(n).ok())
}
