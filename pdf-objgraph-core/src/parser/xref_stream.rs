//! Cross-reference stream support for PDF 1.5+
//!
//! Implements cross-reference streams according to ISO 32000-1:2008
//! Section 7.5.8. The decoded payload is a flat run of fixed-width,
//! big-endian records whose layout comes from `/W` and `/Index`.

use super::xref::{XRefEntry, XRefTable};
use crate::error::{PdfError, Result};
use crate::objects::{Array, Dictionary, Name, Variant};

/// Widest field a record may declare, in bytes
pub const MAX_FIELD_WIDTH: usize = 4;

/// Record layout of a cross-reference stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefStream {
    widths: [usize; 3],
    index: Vec<(u32, u32)>,
    size: u32,
}

impl XRefStream {
    /// Validate the stream dictionary and extract the record layout.
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        if dict.get_type().and_then(Name::as_str) != Some("XRef") {
            return Err(PdfError::NoXRef(
                "object is not a /Type /XRef stream".to_string(),
            ));
        }

        let size = dict
            .get("Size")
            .and_then(Variant::as_number)
            .ok_or_else(|| PdfError::NoXRef("xref stream has no /Size".to_string()))?;
        let size = u32::try_from(size)
            .map_err(|_| PdfError::InvalidXRefStream(format!("invalid /Size {size}")))?;

        let widths = Self::read_widths(dict)?;
        let index = match dict.get("Index") {
            None => vec![(0, size)],
            Some(Variant::Array(array)) => Self::read_index(array)?,
            Some(other) => {
                return Err(PdfError::InvalidXRefStream(format!(
                    "/Index must be an array, found {}",
                    other.data_type()
                )))
            }
        };

        Ok(Self {
            widths,
            index,
            size,
        })
    }

    fn read_widths(dict: &Dictionary) -> Result<[usize; 3]> {
        let array = dict
            .get("W")
            .and_then(Variant::as_array)
            .filter(|array| array.len() == 3)
            .ok_or_else(|| {
                PdfError::NoXRef("xref stream needs a /W array of three numbers".to_string())
            })?;

        let mut widths = [0usize; 3];
        for (slot, value) in widths.iter_mut().zip(array.iter()) {
            let width = value.as_number().ok_or_else(|| {
                PdfError::NoXRef(format!("/W entry of type {}", value.data_type()))
            })?;
            *slot = usize::try_from(width)
                .ok()
                .filter(|w| *w <= MAX_FIELD_WIDTH)
                .ok_or_else(|| {
                    PdfError::InvalidXRefStream(format!(
                        "field width {width} outside 0..={MAX_FIELD_WIDTH}"
                    ))
                })?;
        }

        if widths.iter().sum::<usize>() == 0 {
            return Err(PdfError::InvalidXRefStream(
                "/W declares zero-length records".to_string(),
            ));
        }
        Ok(widths)
    }

    fn read_index(array: &Array) -> Result<Vec<(u32, u32)>> {
        if array.len() % 2 != 0 {
            return Err(PdfError::InvalidXRefStream(format!(
                "/Index has an odd number of elements ({})",
                array.len()
            )));
        }

        let number = |value: &Variant| -> Result<u32> {
            value
                .as_number()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    PdfError::InvalidXRefStream(format!("invalid /Index element {value:?}"))
                })
        };

        let elements: Vec<&Variant> = array.iter().collect();
        elements
            .chunks(2)
            .map(|pair| {
                let first = number(pair[0])?;
                let count = number(pair[1])?;
                first.checked_add(count).ok_or_else(|| {
                    PdfError::InvalidXRefStream(format!("/Index range {first} {count} overflows"))
                })?;
                Ok((first, count))
            })
            .collect()
    }

    pub fn widths(&self) -> [usize; 3] {
        self.widths
    }

    pub fn index(&self) -> &[(u32, u32)] {
        &self.index
    }

    /// The `/Size` of the stream dictionary
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Bytes per record
    pub fn entry_len(&self) -> usize {
        self.widths.iter().sum()
    }

    /// Decode every record of `data`. The whole layout is checked against
    /// the buffer first, so a truncated stream yields no entries at all.
    pub fn decode_entries(&self, data: &[u8]) -> Result<Vec<(u32, XRefEntry)>> {
        let entry_len = self.entry_len();
        let records: u64 = self.index.iter().map(|(_, count)| u64::from(*count)).sum();
        let needed = records.saturating_mul(entry_len as u64);
        if needed > data.len() as u64 {
            return Err(PdfError::InvalidXRefStream(format!(
                "/Index needs {needed} bytes but the stream holds {}",
                data.len()
            )));
        }

        let mut entries = Vec::with_capacity(records as usize);
        let mut records = data.chunks_exact(entry_len);
        for &(first, count) in &self.index {
            for object_number in first..first + count {
                let record = records.next().ok_or_else(|| {
                    PdfError::InternalLogic("xref stream record count mismatch".to_string())
                })?;
                entries.push((object_number, self.decode_record(record)?));
            }
        }
        Ok(entries)
    }

    fn decode_record(&self, record: &[u8]) -> Result<XRefEntry> {
        let [w0, w1, w2] = self.widths;
        let kind = if w0 == 0 { 1 } else { read_field(&record[..w0]) };
        let field2 = read_field(&record[w0..w0 + w1]);
        let field3 = read_field(&record[w0 + w1..w0 + w1 + w2]);

        match kind {
            0 => Ok(XRefEntry::Free {
                next_free: field2,
                generation: XRefEntry::clamp_generation(field3),
            }),
            1 => Ok(XRefEntry::InUse {
                offset: field2,
                generation: XRefEntry::clamp_generation(field3),
            }),
            2 => Ok(XRefEntry::Compressed {
                container: u32::try_from(field2).map_err(|_| {
                    PdfError::InvalidXRefStream(format!("object stream number {field2}"))
                })?,
                index: u32::try_from(field3).map_err(|_| {
                    PdfError::InvalidXRefStream(format!("object stream index {field3}"))
                })?,
            }),
            other => Err(PdfError::InvalidXRefType(other)),
        }
    }

    /// Decode `data` and store every entry whose slot is still unparsed.
    /// Returns the number of entries stored.
    pub fn apply(&self, data: &[u8], table: &mut XRefTable) -> Result<usize> {
        let entries = self.decode_entries(data)?;
        Ok(entries
            .into_iter()
            .filter(|(object_number, entry)| table.set_if_unparsed(*object_number, *entry))
            .count())
    }
}

/// Read a big-endian field
fn read_field(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |value, &byte| (value << 8) | u64::from(byte))
}

/// Builds the dictionary and unfiltered payload of a cross-reference stream
#[derive(Debug, Default)]
pub struct XRefStreamBuilder {
    entries: Vec<(u32, XRefEntry)>,
    trailer_entries: Dictionary,
}

impl XRefStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) -> &mut Self {
        self.entries.push((object_number, entry));
        self
    }

    /// Extra dictionary keys such as `/Root` or `/Prev`
    pub fn add_trailer_entry(&mut self, key: &str, value: impl Into<Variant>) -> &mut Self {
        self.trailer_entries.insert(key, value);
        self
    }

    /// Returns the stream dictionary (without `/Length`) and the payload.
    pub fn build(&self) -> (Dictionary, Vec<u8>) {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|(n, _)| *n);
        entries.dedup_by_key(|(n, _)| *n);

        let (mut max_field2, mut max_field3) = (0u64, 0u64);
        for (_, entry) in &entries {
            let (f2, f3) = fields(entry);
            max_field2 = max_field2.max(f2);
            max_field3 = max_field3.max(f3);
        }
        let widths = [1, bytes_needed(max_field2), bytes_needed(max_field3)];

        let mut data = Vec::with_capacity(entries.len() * widths.iter().sum::<usize>());
        let mut index = Array::new();
        let mut run: Option<(u32, u32)> = None;
        for (object_number, entry) in &entries {
            let kind = match entry {
                XRefEntry::Free { .. } => 0,
                XRefEntry::InUse { .. } => 1,
                XRefEntry::Compressed { .. } => 2,
            };
            let (f2, f3) = fields(entry);
            write_field(&mut data, kind, widths[0]);
            write_field(&mut data, f2, widths[1]);
            write_field(&mut data, f3, widths[2]);

            run = match run {
                Some((first, count)) if first + count == *object_number => Some((first, count + 1)),
                Some((first, count)) => {
                    index.push(first as i64);
                    index.push(count as i64);
                    Some((*object_number, 1))
                }
                None => Some((*object_number, 1)),
            };
        }
        if let Some((first, count)) = run {
            index.push(first as i64);
            index.push(count as i64);
        }

        let size = entries.last().map(|(n, _)| n + 1).unwrap_or(0);
        let mut dict = self.trailer_entries.clone();
        dict.insert("Type", Name::from("XRef"));
        dict.insert("Size", size as i64);
        dict.insert(
            "W",
            widths
                .iter()
                .map(|w| Variant::Number(*w as i64))
                .collect::<Array>(),
        );
        dict.insert("Index", index);
        (dict, data)
    }
}

fn fields(entry: &XRefEntry) -> (u64, u64) {
    match *entry {
        XRefEntry::Free {
            next_free,
            generation,
        } => (next_free, u64::from(generation)),
        XRefEntry::InUse { offset, generation } => (offset, u64::from(generation)),
        XRefEntry::Compressed { container, index } => (u64::from(container), u64::from(index)),
    }
}

/// Minimum bytes needed to represent a value
fn bytes_needed(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        (64 - value.leading_zeros()).div_ceil(8) as usize
    }
}

/// Write a field value with specified width (big-endian)
fn write_field(output: &mut Vec<u8>, value: u64, width: usize) {
    for i in (0..width).rev() {
        output.push((value >> (i * 8)) as u8);
    }
}
