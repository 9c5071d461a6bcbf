//! PDF Object Stream Expander
//!
//! Handles compressed objects stored in object streams (PDF 1.5+,
//! ISO 32000-1 Section 7.5.7). The decoded payload starts with `/N` pairs of
//! `object_number offset`, followed by the object bodies; offsets are relative
//! to `/First`.

use super::lexer::Tokenizer;
use crate::error::{PdfError, Result, ResultExt};
use crate::objects::{Dictionary, IndirectObjectTable, Object, Reference, Variant};
use std::collections::BTreeSet;
use std::io::Cursor;
use tracing::{debug, warn};

/// A decoded object stream
#[derive(Debug, Clone)]
pub struct ObjectStream {
    /// Number of objects in the stream
    n: usize,
    /// Offset of the first object body
    first: u64,
    data: Vec<u8>,
}

impl ObjectStream {
    /// `data` is the already decoded stream payload.
    pub fn new(dict: &Dictionary, data: Vec<u8>) -> Result<Self> {
        let n = required_count(dict, "N")?;
        let first = required_count(dict, "First")?;
        Ok(Self {
            n: n as usize,
            first,
            data,
        })
    }

    /// Decode the stream of a container object.
    pub fn from_object(object: &Object) -> Result<Self> {
        let dict = object
            .value()?
            .as_dict()
            .cloned()
            .ok_or_else(|| {
                PdfError::InvalidDataType(format!(
                    "object stream {} is not a dictionary",
                    object.reference()
                ))
            })?;
        let stream = object.stream()?.ok_or_else(|| {
            PdfError::InvalidDataType(format!(
                "object stream {} has no stream data",
                object.reference()
            ))
        })?;
        let data = stream.decode(&dict)?;
        Self::new(&dict, data)
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The `(object_number, relative_offset)` table at the start of the payload
    pub fn offsets(&self) -> Result<Vec<(u32, u64)>> {
        let mut tokenizer = Tokenizer::new(Cursor::new(self.data.as_slice()));
        let mut offsets = Vec::with_capacity(self.n.min(self.data.len()));
        for _ in 0..self.n {
            let object_number = tokenizer.read_next_number()?;
            let offset = tokenizer.read_next_number()?;
            match (u32::try_from(object_number), u64::try_from(offset)) {
                (Ok(object_number), Ok(offset)) => offsets.push((object_number, offset)),
                _ => {
                    return Err(PdfError::ValueOutOfRange(format!(
                        "object stream entry {object_number} {offset}"
                    )))
                }
            }
        }
        Ok(offsets)
    }

    /// Parse the objects of the stream, or only those in `wanted`.
    pub fn objects(&self, wanted: Option<&BTreeSet<u32>>) -> Result<Vec<(Reference, Variant)>> {
        let mut objects = Vec::new();
        for (object_number, offset) in self.offsets()? {
            if wanted.is_some_and(|wanted| !wanted.contains(&object_number)) {
                continue;
            }
            let position = self.first.checked_add(offset).ok_or_else(|| {
                PdfError::ValueOutOfRange(format!("object offset {offset} in object stream"))
            })?;

            // A fresh tokenizer per body so nothing queued leaks into the offset table
            let mut tokenizer = Tokenizer::new(Cursor::new(self.data.as_slice()));
            tokenizer.seek(position)?;
            let value = tokenizer
                .next_variant()
                .with_context(|| format!("Unable to read object {object_number} 0 R"))?;
            objects.push((Reference::new(object_number, 0), value));
        }
        Ok(objects)
    }
}

fn required_count(dict: &Dictionary, key: &str) -> Result<u64> {
    let value = dict
        .get(key)
        .and_then(Variant::as_number)
        .ok_or_else(|| PdfError::InvalidDataType(format!("object stream has no /{key}")))?;
    u64::try_from(value)
        .map_err(|_| PdfError::ValueOutOfRange(format!("object stream /{key} is {value}")))
}

/// Expand the container object `container` into `table`. Only the ids in
/// `wanted` are materialized; an object already in the table is replaced.
/// The container is removed afterwards. Returns the references inserted.
pub(crate) fn expand_object_stream(
    table: &mut IndirectObjectTable,
    container: u32,
    wanted: &BTreeSet<u32>,
) -> Result<Vec<Reference>> {
    let container_ref = Reference::new(container, 0);
    let stream = {
        let object = table.get_object(container_ref).ok_or_else(|| {
            PdfError::NoObject(format!("Loading of object {container_ref} failed"))
        })?;
        ObjectStream::from_object(object)?
    };

    let objects = stream.objects(Some(wanted))?;
    let mut inserted = Vec::with_capacity(objects.len());
    for (reference, value) in objects {
        if table.contains(reference) {
            warn!("Object: {} will be deleted and loaded again", reference);
        }
        table.insert(Object::new(reference, value));
        inserted.push(reference);
    }

    if inserted.len() < wanted.len() {
        warn!(
            "Object stream {} holds {} of {} requested objects",
            container_ref,
            inserted.len(),
            wanted.len()
        );
    }
    debug!(
        "Expanded object stream {} into {} objects",
        container_ref,
        inserted.len()
    );

    table.remove_object(container_ref);
    Ok(inserted)
}
