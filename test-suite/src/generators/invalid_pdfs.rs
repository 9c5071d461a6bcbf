//! Invalid PDF Generators
//!
//! Deliberately damaged files. Each generator documents the damage; the
//! expected parser reaction is asserted by the tests that use them.

use super::minimal_pdfs::{classic_minimal, CATALOG, PAGE, PAGES};
use super::test_pdf_builder::{TestPdfBuilder, XRefFormat};
use anyhow::{bail, Result};

fn replace_once(data: &[u8], from: &[u8], to: &[u8]) -> Result<Vec<u8>> {
    let Some(position) = crate::utils::find(data, from) else {
        bail!("{:?} not found", String::from_utf8_lossy(from));
    };
    let mut out = data[..position].to_vec();
    out.extend_from_slice(to);
    out.extend_from_slice(&data[position + from.len()..]);
    Ok(out)
}

/// Cut off in the middle of the xref table
pub fn truncated_xref() -> Result<Vec<u8>> {
    let data = classic_minimal()?;
    let Some(xref) = crate::utils::find(&data, b"xref\n") else {
        bail!("no xref keyword");
    };
    Ok(data[..xref + 20].to_vec())
}

/// `%PDX-1.4` instead of `%PDF-1.4`
pub fn no_header() -> Result<Vec<u8>> {
    replace_once(&classic_minimal()?, b"%PDF-", b"%PDX-")
}

/// Bytes appended after `%%EOF`
pub fn garbage_after_eof() -> Result<Vec<u8>> {
    let mut data = classic_minimal()?;
    data.extend_from_slice(b"\x00\x00 trailing garbage from a broken upload \x00\n");
    Ok(data)
}

/// `startref` instead of `startxref`
pub fn startref_typo() -> Result<Vec<u8>> {
    replace_once(&classic_minimal()?, b"startxref", b"startref")
}

/// `startxref` names an offset past the end of the file
pub fn startxref_beyond_eof() -> Result<Vec<u8>> {
    let data = classic_minimal()?;
    let Some(marker) = crate::utils::find(&data, b"startxref\n") else {
        bail!("no startxref");
    };
    let mut out = data[..marker].to_vec();
    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", data.len() * 10).as_bytes());
    Ok(out)
}

/// Trailer without `/Size`
pub fn missing_size() -> Result<Vec<u8>> {
    let data = classic_minimal()?;
    let Some(size) = crate::utils::find(&data, b"/Size ") else {
        bail!("no /Size");
    };
    // Blank out "/Size 5" keeping every offset intact
    let mut out = data;
    for b in &mut out[size..size + 7] {
        *b = b' ';
    }
    Ok(out)
}

/// The newest section's `/Prev` points back at itself
pub fn prev_cycle() -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.4");
    builder.object(1, CATALOG).object(2, PAGES).object(3, PAGE);
    builder.end_revision(XRefFormat::Table, "/Root 1 0 R")?;

    builder.object(3, PAGE);
    let own = builder.position();
    builder.end_revision_with_prev(XRefFormat::Table, "/Root 1 0 R", Some(own))?;
    Ok(builder.into_bytes())
}

/// Object 3 is listed in use at offset 0
pub fn zero_offset_entry() -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.4");
    builder.object(1, CATALOG).object(2, PAGES);
    let xref = builder.position();
    builder.end_revision(XRefFormat::Table, "/Root 1 0 R")?;
    let data = builder.into_bytes();

    // Append an entry for object 3 by widening the only subsection
    let table = &data[xref as usize..];
    let with_entry = replace_once(table, b"0 3\n", b"0 4\n")?;
    let with_entry = replace_once(
        &with_entry,
        b"trailer",
        b"0000000000 00000 n \ntrailer",
    )?;
    let with_entry = replace_once(&with_entry, b"/Size 3", b"/Size 4")?;

    let mut out = data[..xref as usize].to_vec();
    out.extend_from_slice(&with_entry);
    Ok(out)
}

/// The xref entry of object 3 points at bytes that are not an object
pub fn broken_object() -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.4");
    builder.object(1, CATALOG).object(2, PAGES);
    builder.object(3, PAGE);
    builder.end_revision(XRefFormat::Table, "/Root 1 0 R")?;
    // Same length, different object number
    replace_once(&builder.into_bytes(), b"3 0 obj", b"9 0 obj")
}

/// A stream whose `/Length` is shorter than its data
pub fn short_stream_length() -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.4");
    builder.object(1, CATALOG).object(2, PAGES).object(3, PAGE);
    builder.stream(4, "", b"BT (Hello) Tj ET");
    builder.end_revision(XRefFormat::Table, "/Root 1 0 R")?;
    replace_once(&builder.into_bytes(), b"/Length 16", b"/Length 04")
}

/// Object 4 nests arrays `depth` deep
pub fn excessive_nesting(depth: usize) -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.4");
    builder.object(1, CATALOG).object(2, PAGES).object(3, PAGE);
    let body = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
    builder.object(4, &body);
    builder.end_revision(XRefFormat::Table, "/Root 1 0 R")?;
    Ok(builder.into_bytes())
}

/// A single uncompressed xref stream with caller-supplied `/W`, `/Index`
/// and payload
pub fn custom_xref_stream(widths: &str, index: Option<&str>, payload: &[u8]) -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.5");
    builder.object(1, CATALOG);
    let offset = builder.position();

    let index = index.map(|i| format!(" /Index [{i}]")).unwrap_or_default();
    let header = format!(
        "2 0 obj\n<< /Type /XRef /Size 3 /W [{widths}]{index} /Root 1 0 R /Length {} >>\nstream\n",
        payload.len()
    );
    builder
        .raw(header.as_bytes())
        .raw(payload)
        .raw(b"\nendstream\nendobj\n")
        .raw(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
    Ok(builder.into_bytes())
}

/// `/Index` with an odd number of elements
pub fn odd_index_xref_stream() -> Result<Vec<u8>> {
    custom_xref_stream("1 4 2", Some("0 3 7"), &[0u8; 21])
}

/// `/W [0 0 0]`
pub fn zero_width_xref_stream() -> Result<Vec<u8>> {
    custom_xref_stream("0 0 0", None, b"")
}

/// A width beyond what a field can hold
pub fn oversized_width_xref_stream() -> Result<Vec<u8>> {
    custom_xref_stream("1 9 2", None, &[0u8; 36])
}

/// Fewer bytes than `/Index` claims
pub fn truncated_xref_stream() -> Result<Vec<u8>> {
    custom_xref_stream("1 4 2", Some("0 3"), &[0u8; 10])
}
