//! Serialization of values, indirect objects and complete documents with a
//! classic cross-reference table.
//!
//! The output is plain text apart from stream payloads, which are written as
//! they are held in memory: filters still applied, document encryption
//! already removed. For that reason `/Encrypt` is never carried into the
//! written trailer.

use crate::error::Result;
use crate::objects::{Dictionary, IndirectObjectTable, Object, Reference, Variant};
use crate::parser::PdfVersion;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Trailer keys copied into a written document
const TRAILER_KEYS: [&str; 3] = ["Root", "Info", "ID"];

pub struct PdfWriter<W: Write> {
    writer: W,
    current_position: u64,
    xref_positions: BTreeMap<u32, (u64, u16)>,
}

impl PdfWriter<BufWriter<File>> {
    /// Create `path` and write to it through a buffer
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> PdfWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            current_position: 0,
            xref_positions: BTreeMap::new(),
        }
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.current_position
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write a complete single-revision document.
    ///
    /// Every live object in `objects` is written except cross-reference
    /// streams and object streams, whose content is already held as
    /// standalone objects. `/Root`, `/Info` and `/ID` are copied from
    /// `trailer`.
    pub fn write_document(
        &mut self,
        version: PdfVersion,
        objects: &IndirectObjectTable,
        trailer: &Dictionary,
    ) -> Result<()> {
        self.xref_positions.clear();
        self.write_header(version)?;

        let mut references = objects.references();
        references.sort();
        for reference in references {
            let Some(object) = objects.get_object(reference) else {
                continue;
            };
            if is_container(object)? {
                debug!("Not writing container object {}", reference);
                continue;
            }
            self.write_object(object)?;
        }

        let xref_position = self.current_position;
        let size = self.write_xref(objects)?;
        self.write_trailer(trailer, size, xref_position)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_header(&mut self, version: PdfVersion) -> Result<()> {
        self.write_bytes(format!("{}\n", version.header()).as_bytes())?;
        // Binary comment so transfer tools treat the file as binary
        self.write_bytes(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])
    }

    /// Write `n g obj ... endobj`, recording the offset for the xref table.
    /// A stream's `/Length` is rewritten to match its payload.
    pub fn write_object(&mut self, object: &Object) -> Result<()> {
        let reference = object.reference();
        self.xref_positions.insert(
            reference.object_number(),
            (self.current_position, reference.generation()),
        );

        let header = format!(
            "{} {} obj\n",
            reference.object_number(),
            reference.generation()
        );
        self.write_bytes(header.as_bytes())?;

        // The stream is read first; loading it needs the body exclusively
        let stream = object.stream()?;
        let value = object.value()?;
        match (&*value, stream) {
            (Variant::Dictionary(dict), Some(stream)) => {
                let mut dict = dict.clone();
                dict.insert("Length", stream.len() as i64);
                self.write_variant(&Variant::Dictionary(dict))?;
                self.write_bytes(b"\nstream\n")?;
                self.write_bytes(stream.raw_data())?;
                self.write_bytes(b"\nendstream")?;
            }
            (value, _) => self.write_variant(value)?,
        }

        self.write_bytes(b"\nendobj\n")
    }

    pub fn write_variant(&mut self, value: &Variant) -> Result<()> {
        let mut out = Vec::new();
        encode_variant(&mut out, value);
        self.write_bytes(&out)
    }

    /// One subsection from 0; gaps are chained into the free list
    fn write_xref(&mut self, objects: &IndirectObjectTable) -> Result<u32> {
        let size = self
            .xref_positions
            .keys()
            .next_back()
            .map_or(1, |&highest| highest + 1);

        let free: Vec<u32> = (1..size)
            .filter(|number| !self.xref_positions.contains_key(number))
            .collect();
        let free_generation = |number: u32| {
            objects
                .free_objects()
                .filter(|r| r.object_number() == number)
                .map(Reference::generation)
                .max()
                .unwrap_or(0)
        };

        let mut table = format!("xref\n0 {size}\n");
        let head = free.first().copied().unwrap_or(0);
        table.push_str(&format!("{head:010} 65535 f \n"));
        for number in 1..size {
            match self.xref_positions.get(&number) {
                Some(&(offset, generation)) => {
                    table.push_str(&format!("{offset:010} {generation:05} n \n"));
                }
                None => {
                    let next = free
                        .iter()
                        .copied()
                        .find(|&n| n > number)
                        .unwrap_or(0);
                    let generation = free_generation(number);
                    table.push_str(&format!("{next:010} {generation:05} f \n"));
                }
            }
        }
        debug!("Writing xref table with {} entries", size);
        self.write_bytes(table.as_bytes())?;
        Ok(size)
    }

    fn write_trailer(&mut self, source: &Dictionary, size: u32, xref_position: u64) -> Result<()> {
        let mut trailer = Dictionary::new();
        trailer.insert("Size", i64::from(size));
        for key in TRAILER_KEYS {
            if let Some(value) = source.get(key) {
                trailer.insert(key, value.clone());
            }
        }

        self.write_bytes(b"trailer\n")?;
        self.write_variant(&Variant::Dictionary(trailer))?;
        self.write_bytes(format!("\nstartxref\n{xref_position}\n%%EOF\n").as_bytes())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.current_position += data.len() as u64;
        Ok(())
    }
}

/// Serialized form of `value`
pub fn to_bytes(value: &Variant) -> Vec<u8> {
    let mut out = Vec::new();
    encode_variant(&mut out, value);
    out
}

fn is_container(object: &Object) -> Result<bool> {
    let value = object.value()?;
    Ok(value
        .as_dict()
        .and_then(Dictionary::get_type)
        .is_some_and(|t| *t == "XRef" || *t == "ObjStm"))
}

fn encode_variant(out: &mut Vec<u8>, value: &Variant) {
    match value {
        Variant::Null => out.extend_from_slice(b"null"),
        Variant::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Variant::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Variant::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),
        Variant::String(s) if s.is_hex() => {
            out.push(b'<');
            for b in s.as_bytes() {
                out.extend_from_slice(format!("{b:02X}").as_bytes());
            }
            out.push(b'>');
        }
        Variant::String(s) => {
            out.push(b'(');
            escape_literal(out, s.as_bytes());
            out.push(b')');
        }
        Variant::Name(name) => {
            out.push(b'/');
            out.extend_from_slice(&name.escaped());
        }
        Variant::Array(array) => {
            out.push(b'[');
            for (i, item) in array.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                encode_variant(out, item);
            }
            out.push(b']');
        }
        Variant::Dictionary(dict) => {
            out.extend_from_slice(b"<<");
            for (key, item) in dict.iter_for_output() {
                out.extend_from_slice(b" /");
                out.extend_from_slice(&key.escaped());
                out.push(b' ');
                encode_variant(out, item);
            }
            out.extend_from_slice(b" >>");
        }
        Variant::Reference(reference) => {
            out.extend_from_slice(reference.to_string().as_bytes());
        }
        Variant::RawData(data) => out.extend_from_slice(data),
    }
}

/// Plain decimal notation with at least one fractional digit, so the value
/// reads back as a Real
fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0.0".to_string();
    }
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

fn escape_literal(out: &mut Vec<u8>, data: &[u8]) {
    for &b in data {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            _ => out.push(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Array, Name, PdfString, Stream};
    use crate::parser::Tokenizer;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn written(value: &Variant) -> String {
        String::from_utf8(to_bytes(value)).unwrap()
    }

    fn read_back(value: &Variant) -> Variant {
        Tokenizer::new(Cursor::new(to_bytes(value)))
            .next_variant()
            .unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(written(&Variant::Null), "null");
        assert_eq!(written(&Variant::Bool(true)), "true");
        assert_eq!(written(&Variant::Number(-17)), "-17");
        assert_eq!(written(&Variant::Real(2.0)), "2.0");
        assert_eq!(written(&Variant::Real(-0.25)), "-0.25");
        assert_eq!(written(&Variant::Real(f64::NAN)), "0.0");
        assert_eq!(written(&Variant::Reference(Reference::new(12, 3))), "12 3 R");
    }

    #[test]
    fn test_strings() {
        let literal = Variant::String(PdfString::new(b"a(b)\\c\n".to_vec()));
        assert_eq!(written(&literal), "(a\\(b\\)\\\\c\\n)");

        let hex = Variant::String(PdfString::new_hex(vec![0x00, 0xAB, 0x7F]));
        assert_eq!(written(&hex), "<00AB7F>");

        assert_eq!(read_back(&literal), literal);
        assert_eq!(read_back(&hex), hex);
    }

    #[test]
    fn test_names_are_escaped() {
        let name = Variant::Name(Name::new(b"A B#".to_vec()));
        assert_eq!(written(&name), "/A#20B#23");
        assert_eq!(read_back(&name), name);
    }

    #[test]
    fn test_type_is_written_first() {
        let mut dict = Dictionary::new();
        dict.insert("Count", 0);
        dict.insert("Kids", Array::new());
        dict.insert("Type", Name::from("Pages"));
        assert_eq!(
            written(&Variant::Dictionary(dict)),
            "<< /Type /Pages /Count 0 /Kids [] >>"
        );
    }

    #[test]
    fn test_nested_values_read_back() {
        let mut inner = Dictionary::new();
        inner.insert("Real", 1.5);
        inner.insert("Ref", Reference::new(4, 0));
        let mut array = Array::new();
        array.push(1);
        array.push(Variant::Dictionary(inner));
        array.push(PdfString::from("text"));
        let value = Variant::Array(array);

        assert_eq!(read_back(&value), value);
    }

    #[test]
    fn test_stream_length_is_refreshed() {
        let mut dict = Dictionary::new();
        dict.insert("Length", 999);
        let object = Object::with_stream(Reference::new(1, 0), dict, Stream::new(b"abc".to_vec()));

        let mut writer = PdfWriter::new(Vec::new());
        writer.write_object(&object).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text, "1 0 obj\n<< /Length 3 >>\nstream\nabc\nendstream\nendobj\n");
    }

    #[test]
    fn test_document_layout() {
        let mut objects = IndirectObjectTable::new();
        let mut catalog = Dictionary::new();
        catalog.insert("Type", Name::from("Catalog"));
        objects.insert(Object::new(Reference::new(1, 0), catalog));
        objects.insert(Object::new(Reference::new(3, 0), 42));

        let mut trailer = Dictionary::new();
        trailer.insert("Root", Reference::new(1, 0));
        trailer.insert("Encrypt", Reference::new(9, 0));

        let mut writer = PdfWriter::new(Vec::new());
        writer
            .write_document(PdfVersion::V1_4, &objects, &trailer)
            .unwrap();
        let output = writer.into_inner();
        let at = |needle: &[u8]| output.windows(needle.len()).position(|w| w == needle).unwrap();
        let first = at(b"1 0 obj");
        let xref = at(b"xref\n0 4\n");
        let text = String::from_utf8_lossy(&output);

        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.contains("0000000002 65535 f \n"));
        assert!(text.contains(&format!("{first:010} 00000 n \n")));
        assert!(text.contains("0000000000 00000 f \n"));
        assert!(text.contains("trailer\n<< /Root 1 0 R /Size 4 >>"));
        assert!(!text.contains("Encrypt"));
        assert!(text.ends_with(&format!("startxref\n{xref}\n%%EOF\n")));
    }

    #[test]
    fn test_containers_are_skipped() {
        let mut objects = IndirectObjectTable::new();
        let mut objstm = Dictionary::new();
        objstm.insert("Type", Name::from("ObjStm"));
        objects.insert(Object::with_stream(
            Reference::new(1, 0),
            objstm,
            Stream::new(Vec::new()),
        ));
        objects.insert(Object::new(Reference::new(2, 0), Variant::Null));

        let mut writer = PdfWriter::new(Vec::new());
        writer
            .write_document(PdfVersion::V1_5, &objects, &Dictionary::new())
            .unwrap();
        let text = String::from_utf8_lossy(&writer.into_inner()).into_owned();
        assert!(!text.contains("ObjStm"));
        assert!(text.contains("2 0 obj\nnull\nendobj\n"));
    }
}
