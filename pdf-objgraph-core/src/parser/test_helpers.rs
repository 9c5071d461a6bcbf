//! Helper functions for creating valid test PDFs with correct offsets

use std::collections::BTreeMap;

/// How the fixture writes its cross-reference section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefKind {
    Table,
    /// A `/Type /XRef` stream, uncompressed, `/W [1 4 2]`
    Stream,
}

/// Assembles a single-revision PDF whose xref offsets match the bytes written
pub struct PdfFixture {
    version: String,
    objects: Vec<(u32, Vec<u8>)>,
    trailer: String,
    kind: XRefKind,
    raw_entries: BTreeMap<u32, String>,
    startxref: Option<u64>,
    omit_size: bool,
}

impl PdfFixture {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            objects: Vec::new(),
            trailer: String::new(),
            kind: XRefKind::Table,
            raw_entries: BTreeMap::new(),
            startxref: None,
            omit_size: false,
        }
    }

    /// `n 0 obj <body> endobj`
    pub fn object(&mut self, number: u32, body: &str) -> &mut Self {
        let text = format!("{number} 0 obj\n{body}\nendobj\n");
        self.objects.push((number, text.into_bytes()));
        self
    }

    /// A stream object; `/Length` is added to `dict_entries`
    pub fn stream_object(&mut self, number: u32, dict_entries: &str, data: &[u8]) -> &mut Self {
        let mut text = format!(
            "{number} 0 obj\n<< {dict_entries} /Length {} >>\nstream\n",
            data.len()
        )
        .into_bytes();
        text.extend_from_slice(data);
        text.extend_from_slice(b"\nendstream\nendobj\n");
        self.objects.push((number, text));
        self
    }

    /// Bytes written verbatim where object `number` is expected
    pub fn raw_object(&mut self, number: u32, text: &str) -> &mut Self {
        self.objects.push((number, format!("{text}\n").into_bytes()));
        self
    }

    /// Replace the xref record of `number`, without its end of line
    pub fn raw_entry(&mut self, number: u32, record: &str) -> &mut Self {
        self.raw_entries.insert(number, record.to_string());
        self
    }

    /// Extra trailer entries such as `/Root 1 0 R`
    pub fn trailer(&mut self, entries: &str) -> &mut Self {
        self.trailer = entries.to_string();
        self
    }

    pub fn xref_kind(&mut self, kind: XRefKind) -> &mut Self {
        self.kind = kind;
        self
    }

    pub fn startxref_override(&mut self, offset: u64) -> &mut Self {
        self.startxref = Some(offset);
        self
    }

    pub fn omit_size(&mut self) -> &mut Self {
        self.omit_size = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n", self.version).into_bytes();
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut offsets = BTreeMap::new();
        for (number, text) in &self.objects {
            offsets.insert(*number, out.len() as u64);
            out.extend_from_slice(text);
        }

        let highest = offsets
            .keys()
            .chain(self.raw_entries.keys())
            .copied()
            .max()
            .unwrap_or(0);
        let xref_offset = out.len() as u64;

        match self.kind {
            XRefKind::Table => {
                let size = highest + 1;
                out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
                for number in 0..size {
                    let record = match (self.raw_entries.get(&number), offsets.get(&number)) {
                        (Some(raw), _) => raw.clone(),
                        (None, Some(offset)) => format!("{offset:010} 00000 n"),
                        (None, None) if number == 0 => "0000000000 65535 f".to_string(),
                        (None, None) => "0000000000 00001 f".to_string(),
                    };
                    out.extend_from_slice(record.as_bytes());
                    out.extend_from_slice(b" \n");
                }
                let size_entry = self.size_entry(size);
                out.extend_from_slice(
                    format!("trailer\n<< {size_entry}{} >>\n", self.trailer).as_bytes(),
                );
            }
            XRefKind::Stream => {
                let own_number = highest + 1;
                let size = own_number + 1;
                offsets.insert(own_number, xref_offset);

                let mut data = Vec::new();
                for number in 0..size {
                    let (kind, field2, field3) = match offsets.get(&number) {
                        Some(&offset) => (1u8, offset, 0u16),
                        None if number == 0 => (0, 0, 65535),
                        None => (0, 0, 1),
                    };
                    data.push(kind);
                    data.extend_from_slice(&(field2 as u32).to_be_bytes());
                    data.extend_from_slice(&field3.to_be_bytes());
                }
                let size_entry = self.size_entry(size);
                out.extend_from_slice(
                    format!(
                        "{own_number} 0 obj\n<< /Type /XRef {size_entry}/W [1 4 2] /Length {} {} >>\nstream\n",
                        data.len(),
                        self.trailer
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(&data);
                out.extend_from_slice(b"\nendstream\nendobj\n");
            }
        }

        let startxref = self.startxref.unwrap_or(xref_offset);
        out.extend_from_slice(format!("startxref\n{startxref}\n%%EOF\n").as_bytes());
        out
    }

    fn size_entry(&self, size: u32) -> String {
        if self.omit_size {
            String::new()
        } else {
            format!("/Size {size} ")
        }
    }
}

/// Creates a minimal valid PDF with correct xref offsets
pub fn create_minimal_pdf() -> Vec<u8> {
    let mut fixture = PdfFixture::new("1.4");
    fixture
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .trailer("/Root 1 0 R");
    fixture.build()
}

/// Position of the first `needle` in `data`
pub fn find(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).position(|w| w == needle)
}

/// Replace every `from` in `data`
pub fn replace(data: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut rest = data;
    while let Some(position) = find(rest, from) {
        out.extend_from_slice(&rest[..position]);
        out.extend_from_slice(to);
        rest = &rest[position + from.len()..];
    }
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_point_at_objects() {
        let data = create_minimal_pdf();
        let at = |needle: &[u8]| find(&data, needle).unwrap();

        let record = format!("{:010} 00000 n \n", at(b"2 0 obj"));
        assert!(find(&data, record.as_bytes()).is_some());
        let tail = format!("startxref\n{}\n%%EOF\n", at(b"xref\n"));
        assert!(data.ends_with(tail.as_bytes()));
    }

    #[test]
    fn test_replace() {
        assert_eq!(replace(b"a startxref b", b"startxref", b"startref"), b"a startref b");
    }
}
