//! Minimal PDF Generators
//!
//! Small well-formed documents, one per cross-reference layout.

use super::test_pdf_builder::{StreamEncoding, TestPdfBuilder, XRefFormat};
use anyhow::Result;

pub const CATALOG: &str = "<< /Type /Catalog /Pages 2 0 R >>";
pub const PAGES: &str = "<< /Type /Pages /Kids [3 0 R] /Count 1 >>";
pub const PAGE: &str = "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>";
pub const INFO: &str = "<< /Producer (pdf-objgraph test suite) >>";

fn document_body(builder: &mut TestPdfBuilder) {
    builder
        .object(1, CATALOG)
        .object(2, PAGES)
        .object(3, PAGE);
}

/// Catalog, page tree with one page, and an info dictionary behind a
/// classic xref table
pub fn classic_minimal() -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.4");
    document_body(&mut builder);
    builder.object(4, INFO);
    builder.end_revision(XRefFormat::Table, "/Root 1 0 R /Info 4 0 R")?;
    Ok(builder.into_bytes())
}

/// The same document indexed by an xref stream
pub fn xref_stream_document(encoding: StreamEncoding) -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.5");
    document_body(&mut builder);
    builder.object(4, INFO);
    builder.end_revision(XRefFormat::Stream(encoding), "/Root 1 0 R /Info 4 0 R")?;
    Ok(builder.into_bytes())
}

/// Catalog and page tree stored in object stream 7; the page and a content
/// stream stay uncompressed
pub fn object_stream_document(compress: bool) -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.5");
    builder
        .object(3, PAGE)
        .flate_stream(4, "", b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET")?;
    builder.object_stream(7, &[(1, CATALOG), (2, PAGES)], compress)?;
    builder.end_revision(XRefFormat::Stream(StreamEncoding::flate_png()), "/Root 1 0 R")?;
    Ok(builder.into_bytes())
}

/// A classic table for the plain objects plus an `/XRefStm` stream for the
/// objects held in an object stream
pub fn hybrid_document() -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.5");
    builder.object(3, PAGE);
    builder.object_stream(7, &[(1, CATALOG), (2, PAGES)], true)?;
    let stream = builder.hybrid_stream_section(StreamEncoding::flate_png())?;
    builder.end_revision(XRefFormat::Table, &format!("/Root 1 0 R /XRefStm {stream}"))?;
    Ok(builder.into_bytes())
}

/// `revisions` incremental updates, each redefining object 5 as
/// `<< /Revision n >>`. Only the first trailer carries `/Info`.
pub fn incremental_updates(revisions: usize, format: XRefFormat) -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.5");
    document_body(&mut builder);
    builder.object(4, INFO).object(5, "<< /Revision 1 >>");
    builder.end_revision(format, "/Root 1 0 R /Info 4 0 R")?;

    for revision in 2..=revisions {
        builder.object(5, &format!("<< /Revision {revision} >>"));
        builder.end_revision(format, "/Root 1 0 R")?;
    }
    Ok(builder.into_bytes())
}

/// A page tree with `pages` pages, each with its own content stream
pub fn many_objects(pages: u32, format: XRefFormat) -> Result<Vec<u8>> {
    let mut builder = TestPdfBuilder::new("1.5");
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    builder.object(1, CATALOG).object(
        2,
        &format!("<< /Type /Pages /Kids [{}] /Count {pages} >>", kids.join(" ")),
    );
    for i in 0..pages {
        let page = 3 + 2 * i;
        builder.object(
            page,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R >>",
                page + 1
            ),
        );
        let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", i + 1);
        builder.stream(page + 1, "", content.as_bytes());
    }
    builder.end_revision(format, "/Root 1 0 R")?;
    Ok(builder.into_bytes())
}
