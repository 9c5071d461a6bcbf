//! Byte-exact files with one or more revisions for the integration tests

#![allow(dead_code)]

use pdf_objgraph::parser::{ParseOptions, PdfParser};
use std::io::Cursor;
use tracing_subscriber::EnvFilter;

pub type Parser = PdfParser<Cursor<Vec<u8>>>;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn parse(data: Vec<u8>) -> pdf_objgraph::Result<Parser> {
    init_logging();
    PdfParser::read(Cursor::new(data), ParseOptions::default())
}

pub fn parse_strict(data: Vec<u8>) -> pdf_objgraph::Result<Parser> {
    init_logging();
    PdfParser::read(Cursor::new(data), ParseOptions::strict())
}

/// One indirect object as `revision` writes it
pub fn object(number: u32, body: &str) -> String {
    format!("{number} 0 obj\n{body}\nendobj\n")
}

/// Appends revisions, each closed by a classic xref table and trailer
pub struct Revisions {
    pub data: Vec<u8>,
    last_xref: Option<usize>,
    size: u32,
}

impl Revisions {
    pub fn new(version: &str) -> Self {
        Self {
            data: format!("%PDF-{version}\n").into_bytes(),
            last_xref: None,
            size: 1,
        }
    }

    /// Write `objects` and an xref table listing them; returns the table offset
    pub fn revision(&mut self, objects: &[(u32, &str)], trailer: &str) -> usize {
        let prev = self.last_xref;
        self.revision_with_prev(objects, trailer, prev)
    }

    pub fn revision_with_prev(
        &mut self,
        objects: &[(u32, &str)],
        trailer: &str,
        prev: Option<usize>,
    ) -> usize {
        let mut offsets = Vec::new();
        for (number, body) in objects {
            offsets.push((*number, self.data.len()));
            self.data.extend_from_slice(object(*number, body).as_bytes());
            self.size = self.size.max(number + 1);
        }

        let xref = self.data.len();
        let mut table = String::from("xref\n");
        if self.last_xref.is_none() {
            table.push_str("0 1\n0000000000 65535 f \n");
        }
        for (number, offset) in offsets {
            table.push_str(&format!("{number} 1\n{offset:010} 00000 n \n"));
        }
        let prev = prev.map(|p| format!(" /Prev {p}")).unwrap_or_default();
        table.push_str(&format!(
            "trailer\n<< /Size {}{prev} {trailer} >>\nstartxref\n{xref}\n%%EOF\n",
            self.size
        ));
        self.data.extend_from_slice(table.as_bytes());
        self.last_xref = Some(xref);
        xref
    }

    pub fn position(&self) -> usize {
        self.data.len()
    }
}
