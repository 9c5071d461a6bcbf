//! PDF Cross-Reference Table
//!
//! Entries collected from classic `xref` sections (ISO 32000-1 Section 7.5.4)
//! and cross-reference streams (Section 7.5.8). The first section read is the
//! newest one, so an entry is only stored for an object number that has not
//! been seen yet.

use super::lexer::{is_whitespace, Tokenizer};
use crate::error::{PdfError, Result};
use crate::objects::MAX_GENERATION;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Seek};
use tracing::{debug, warn};

/// Size of one classic xref record, `nnnnnnnnnn ggggg n\r\n`
pub const XREF_ENTRY_SIZE: usize = 20;

/// One cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free entry; `next_free` links the free list
    Free { next_free: u64, generation: u16 },
    /// Object stored at a byte offset in the file
    InUse { offset: u64, generation: u16 },
    /// Object stored inside the object stream `container`
    Compressed { container: u32, index: u32 },
}

impl XRefEntry {
    pub fn generation(&self) -> u16 {
        match self {
            XRefEntry::Free { generation, .. } | XRefEntry::InUse { generation, .. } => *generation,
            XRefEntry::Compressed { .. } => 0,
        }
    }

    pub fn is_in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free { .. })
    }

    /// Clamp a generation read from a file to the representable range.
    pub(crate) fn clamp_generation(generation: u64) -> u16 {
        u16::try_from(generation).unwrap_or(MAX_GENERATION)
    }
}

/// Entries by object number, bounded by a logical size (the trailer `/Size`).
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    size: u32,
}

impl XRefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(size: u32) -> Self {
        Self {
            entries: BTreeMap::new(),
            size,
        }
    }

    /// Number of object slots, including unparsed ones.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Extend the table so object numbers below `size` can be stored.
    pub fn grow_to(&mut self, size: u32) {
        if size > self.size {
            self.size = size;
        }
    }

    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    pub fn is_parsed(&self, object_number: u32) -> bool {
        self.entries.contains_key(&object_number)
    }

    /// Store `entry` unless the slot is out of range or already parsed.
    /// Returns whether the entry was stored.
    pub fn set_if_unparsed(&mut self, object_number: u32, entry: XRefEntry) -> bool {
        if object_number >= self.size || self.is_parsed(object_number) {
            return false;
        }
        self.entries.insert(object_number, entry);
        true
    }

    /// Parsed entries in object number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> {
        self.entries.iter().map(|(n, e)| (*n, e))
    }

    /// Number of parsed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Object numbers of every object stream that holds compressed entries.
    pub fn containers(&self) -> BTreeSet<u32> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                XRefEntry::Compressed { container, .. } => Some(*container),
                _ => None,
            })
            .collect()
    }

    /// Compressed object numbers stored in `container`.
    pub fn compressed_in(&self, container: u32) -> BTreeSet<u32> {
        self.entries
            .iter()
            .filter_map(|(n, entry)| match entry {
                XRefEntry::Compressed { container: c, .. } if *c == container => Some(*n),
                _ => None,
            })
            .collect()
    }
}

/// Read the records of one `first count` subsection into `table`.
///
/// The tokenizer must be positioned right after the `count` number.
pub(crate) fn read_xref_subsection<R: Read + Seek>(
    tokenizer: &mut Tokenizer<R>,
    first: i64,
    count: i64,
    table: &mut XRefTable,
) -> Result<()> {
    let (first, count) = match (u32::try_from(first), u32::try_from(count)) {
        (Ok(first), Ok(count)) => (first, count),
        _ => {
            return Err(PdfError::InvalidXRef(format!(
                "invalid subsection header {first} {count}"
            )))
        }
    };
    let end = first.checked_add(count).ok_or_else(|| {
        PdfError::ValueOutOfRange(format!("subsection {first} {count} exceeds object numbers"))
    })?;

    if end > table.size() {
        warn!(
            "There are more objects ({}) in this xref table than specified in the /Size key of the trailer ({})",
            end,
            table.size()
        );
        table.grow_to(end);
    }

    debug!("Reading xref subsection {} with {} objects", first, count);

    while tokenizer.look()?.is_some_and(is_whitespace) {
        tokenizer.get_char()?;
    }

    let mut read = 0u32;
    while read < count {
        let record = tokenizer.read_raw(XREF_ENTRY_SIZE)?;
        if record.len() != XREF_ENTRY_SIZE {
            break;
        }

        let object_number = first + read;
        if !table.is_parsed(object_number) {
            let (offset, generation, kind) = parse_xref_record(&record).ok_or_else(|| {
                PdfError::InvalidXRef(format!(
                    "malformed entry for object {}: {:?}",
                    object_number,
                    String::from_utf8_lossy(&record)
                ))
            })?;
            let generation = XRefEntry::clamp_generation(generation);
            match kind {
                b'n' => {
                    table.set_if_unparsed(object_number, XRefEntry::InUse { offset, generation });
                }
                b'f' => {
                    table.set_if_unparsed(
                        object_number,
                        XRefEntry::Free {
                            next_free: offset,
                            generation,
                        },
                    );
                }
                other => warn!(
                    "Ignoring xref entry for object {} with unknown type {:?}",
                    object_number, other as char
                ),
            }
        }
        read += 1;
    }

    if read != count {
        warn!("Read {} xref entries, expected {}", read, count);
        return Err(PdfError::NoXRef(format!(
            "subsection {first} ended after {read} of {count} entries"
        )));
    }
    Ok(())
}

/// Split a record into offset (10 digits), generation (5 digits) and type
/// character. Two more characters (the end of line) must follow the type.
pub(crate) fn parse_xref_record(record: &[u8]) -> Option<(u64, u64, u8)> {
    let mut pos = 0;
    let offset = scan_digits(record, &mut pos, 10)?;
    let generation = scan_digits(record, &mut pos, 5)?;
    skip_spaces(record, &mut pos);
    let kind = *record.get(pos)?;
    record.get(pos + 2)?;
    Some((offset, generation, kind))
}

fn skip_spaces(record: &[u8], pos: &mut usize) {
    while record.get(*pos).is_some_and(|&b| is_whitespace(b)) {
        *pos += 1;
    }
}

fn scan_digits(record: &[u8], pos: &mut usize, max: usize) -> Option<u64> {
    skip_spaces(record, pos);
    let start = *pos;
    while *pos - start < max && record.get(*pos).is_some_and(u8::is_ascii_digit) {
        *pos += 1;
    }
    if *pos == start {
        return None;
    }
    record[start..*pos]
        .iter()
        .try_fold(0u64, |acc, &d| acc.checked_mul(10)?.checked_add(u64::from(d - b'0')))
}
