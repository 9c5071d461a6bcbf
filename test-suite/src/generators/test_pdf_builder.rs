//! Test PDF Builder
//!
//! Writes a file revision by revision. Objects are appended as they are
//! added; `end_revision` closes the current revision with a classic xref
//! table or an xref stream whose offsets match the bytes written, chained to
//! the previous revision through `/Prev`.

use anyhow::{bail, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::Write;

/// Field widths of generated xref streams
const XREF_WIDTHS: [usize; 3] = [1, 4, 2];
const XREF_ROW: usize = 7;

/// How the payload of a generated xref stream is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamEncoding {
    /// FlateDecode the payload
    pub compress: bool,
    /// PNG Up predictor, `/Predictor 12 /Columns 7`; only applies with `compress`
    pub predictor: bool,
}

impl StreamEncoding {
    pub fn plain() -> Self {
        Self::default()
    }

    /// What most writers produce
    pub fn flate_png() -> Self {
        Self {
            compress: true,
            predictor: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefFormat {
    Table,
    Stream(StreamEncoding),
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Free { next: u32, generation: u16 },
    InUse { offset: u64, generation: u16 },
    Compressed { container: u32, index: u32 },
}

impl Entry {
    fn fields(self) -> (u8, u64, u16) {
        match self {
            Entry::Free { next, generation } => (0, u64::from(next), generation),
            Entry::InUse { offset, generation } => (1, offset, generation),
            Entry::Compressed { container, index } => (2, u64::from(container), index as u16),
        }
    }
}

/// Builder for creating test PDFs
pub struct TestPdfBuilder {
    buffer: Vec<u8>,
    entries: BTreeMap<u32, Entry>,
    highest: u32,
    last_xref: Option<u64>,
    revisions: usize,
}

impl TestPdfBuilder {
    /// Start a file with `%PDF-<version>` and a binary marker line
    pub fn new(version: &str) -> Self {
        let mut buffer = format!("%PDF-{version}\n").into_bytes();
        buffer.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            buffer,
            entries: BTreeMap::new(),
            highest: 0,
            last_xref: None,
            revisions: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Offset of the most recently written xref section
    pub fn last_xref(&self) -> Option<u64> {
        self.last_xref
    }

    pub fn revisions(&self) -> usize {
        self.revisions
    }

    pub fn object(&mut self, number: u32, body: &str) -> &mut Self {
        self.object_with_generation(number, 0, body)
    }

    pub fn object_with_generation(&mut self, number: u32, generation: u16, body: &str) -> &mut Self {
        self.record(number, generation);
        self.write(format!("{number} {generation} obj\n{body}\nendobj\n").as_bytes());
        self
    }

    /// An uncompressed stream; `/Length` is appended to `dict_entries`
    pub fn stream(&mut self, number: u32, dict_entries: &str, data: &[u8]) -> &mut Self {
        self.record(number, 0);
        self.write_stream(number, dict_entries, data);
        self
    }

    /// A FlateDecode stream holding `data`
    pub fn flate_stream(&mut self, number: u32, dict_entries: &str, data: &[u8]) -> Result<&mut Self> {
        let encoded = deflate(data)?;
        self.record(number, 0);
        self.write_stream(number, &format!("{dict_entries} /Filter /FlateDecode"), &encoded);
        Ok(self)
    }

    /// An object stream `container` holding `members`; each member is
    /// recorded as compressed at its index
    pub fn object_stream(
        &mut self,
        container: u32,
        members: &[(u32, &str)],
        compress: bool,
    ) -> Result<&mut Self> {
        let mut header = String::new();
        let mut bodies = String::new();
        for (number, body) in members {
            header.push_str(&format!("{number} {} ", bodies.len()));
            bodies.push_str(body);
            bodies.push('\n');
        }
        header.push('\n');
        let first = header.len();
        let mut payload = header.into_bytes();
        payload.extend_from_slice(bodies.as_bytes());

        let dict = format!("/Type /ObjStm /N {} /First {first}", members.len());
        if compress {
            self.flate_stream(container, &dict, &payload)?;
        } else {
            self.stream(container, &dict, &payload);
        }

        for (index, (number, _)) in members.iter().enumerate() {
            self.highest = self.highest.max(*number);
            self.entries.insert(
                *number,
                Entry::Compressed {
                    container,
                    index: index as u32,
                },
            );
        }
        Ok(self)
    }

    /// Record `number` as free in the current revision
    pub fn free(&mut self, number: u32, generation: u16) -> &mut Self {
        self.highest = self.highest.max(number);
        self.entries
            .insert(number, Entry::Free { next: 0, generation });
        self
    }

    /// Append bytes that are not part of any object
    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.write(data);
        self
    }

    /// Close the revision, chaining `/Prev` to the previous one.
    /// Returns the offset of the new xref section.
    pub fn end_revision(&mut self, format: XRefFormat, trailer_entries: &str) -> Result<u64> {
        let prev = self.last_xref;
        self.end_revision_with_prev(format, trailer_entries, prev)
    }

    /// Close the revision with an explicit `/Prev`
    pub fn end_revision_with_prev(
        &mut self,
        format: XRefFormat,
        trailer_entries: &str,
        prev: Option<u64>,
    ) -> Result<u64> {
        if self.revisions == 0 {
            self.entries.entry(0).or_insert(Entry::Free {
                next: 0,
                generation: 65535,
            });
        }
        let prev_entry = prev.map(|p| format!("/Prev {p} ")).unwrap_or_default();

        let offset = match format {
            XRefFormat::Table => {
                self.write_table(&format!("{prev_entry}{trailer_entries}"))?
            }
            XRefFormat::Stream(encoding) => {
                self.write_xref_stream(encoding, &format!("{prev_entry}{trailer_entries}"))?
            }
        };

        self.write(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
        self.last_xref = Some(offset);
        self.revisions += 1;
        Ok(offset)
    }

    /// Write an xref stream holding only the compressed entries recorded so
    /// far, for a hybrid file whose table names it with `/XRefStm`. The
    /// stream object itself is left for the table to index.
    pub fn hybrid_stream_section(&mut self, encoding: StreamEncoding) -> Result<u64> {
        let compressed: BTreeMap<u32, Entry> = self
            .entries
            .iter()
            .filter(|(_, e)| matches!(e, Entry::Compressed { .. }))
            .map(|(n, e)| (*n, *e))
            .collect();
        if compressed.is_empty() {
            bail!("a hybrid section needs compressed entries");
        }
        self.entries
            .retain(|_, e| !matches!(e, Entry::Compressed { .. }));

        let number = self.highest + 1;
        self.highest = number;
        let offset = self.position();
        self.record(number, 0);
        self.write_xref_stream_object(number, &compressed, encoding, "")?;
        Ok(offset)
    }

    pub fn build(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn write_table(&mut self, trailer_entries: &str) -> Result<u64> {
        if self
            .entries
            .values()
            .any(|e| matches!(e, Entry::Compressed { .. }))
        {
            bail!("compressed objects need an xref stream");
        }

        let offset = self.position();
        let mut table = String::from("xref\n");
        for (first, run) in runs(&self.entries) {
            table.push_str(&format!("{first} {}\n", run.len()));
            for entry in run {
                let (kind, field2, field3) = entry.fields();
                let marker = if kind == 0 { 'f' } else { 'n' };
                table.push_str(&format!("{field2:010} {field3:05} {marker} \n"));
            }
        }
        table.push_str(&format!(
            "trailer\n<< /Size {} {trailer_entries} >>\n",
            self.highest + 1
        ));
        self.write(table.as_bytes());
        self.entries.clear();
        Ok(offset)
    }

    fn write_xref_stream(&mut self, encoding: StreamEncoding, trailer_entries: &str) -> Result<u64> {
        let number = self.highest + 1;
        self.highest = number;
        let offset = self.position();
        self.record(number, 0);

        let entries = std::mem::take(&mut self.entries);
        self.write_xref_stream_object(number, &entries, encoding, trailer_entries)?;
        Ok(offset)
    }

    fn write_xref_stream_object(
        &mut self,
        number: u32,
        entries: &BTreeMap<u32, Entry>,
        encoding: StreamEncoding,
        trailer_entries: &str,
    ) -> Result<()> {
        let mut rows = Vec::with_capacity(entries.len() * XREF_ROW);
        let mut index = String::new();
        for (first, run) in runs(entries) {
            index.push_str(&format!("{first} {} ", run.len()));
            for entry in run {
                let (kind, field2, field3) = entry.fields();
                rows.push(kind);
                rows.extend_from_slice(&(field2 as u32).to_be_bytes());
                rows.extend_from_slice(&field3.to_be_bytes());
            }
        }

        let mut dict = format!(
            "/Type /XRef /Size {} /W [{} {} {}] /Index [{}]",
            self.highest + 1,
            XREF_WIDTHS[0],
            XREF_WIDTHS[1],
            XREF_WIDTHS[2],
            index.trim_end()
        );
        let payload = match (encoding.compress, encoding.predictor) {
            (true, true) => {
                dict.push_str(&format!(
                    " /Filter /FlateDecode /DecodeParms << /Predictor 12 /Columns {XREF_ROW} >>"
                ));
                deflate(&png_up(&rows, XREF_ROW))?
            }
            (true, false) => {
                dict.push_str(" /Filter /FlateDecode");
                deflate(&rows)?
            }
            (false, _) => rows,
        };
        if !trailer_entries.is_empty() {
            dict.push(' ');
            dict.push_str(trailer_entries.trim_end());
        }

        self.write_stream(number, &dict, &payload);
        Ok(())
    }

    fn write_stream(&mut self, number: u32, dict_entries: &str, data: &[u8]) {
        self.write(
            format!(
                "{number} 0 obj\n<< {dict_entries} /Length {} >>\nstream\n",
                data.len()
            )
            .as_bytes(),
        );
        self.write(data);
        self.write(b"\nendstream\nendobj\n");
    }

    fn record(&mut self, number: u32, generation: u16) {
        self.highest = self.highest.max(number);
        let offset = self.position();
        self.entries
            .insert(number, Entry::InUse { offset, generation });
    }

    fn write(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }
}

/// Consecutive object numbers grouped into subsections
fn runs(entries: &BTreeMap<u32, Entry>) -> Vec<(u32, Vec<Entry>)> {
    let mut runs: Vec<(u32, Vec<Entry>)> = Vec::new();
    for (&number, &entry) in entries {
        match runs.last_mut() {
            Some((first, run)) if *first + run.len() as u32 == number => run.push(entry),
            _ => runs.push((number, vec![entry])),
        }
    }
    runs
}

pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// PNG "Up" filter over rows of `columns` bytes
pub fn png_up(data: &[u8], columns: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / columns + 1);
    let mut previous = vec![0u8; columns];
    for row in data.chunks(columns) {
        out.push(2);
        for (i, &b) in row.iter().enumerate() {
            out.push(b.wrapping_sub(previous[i]));
        }
        previous[..row.len()].copy_from_slice(row);
    }
    out
}
