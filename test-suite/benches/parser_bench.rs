//! Parser Benchmarks
//!
//! Full parses of generated documents, lazy and eager, plus writing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdf_objgraph::parser::{ParseOptions, PdfParser};
use pdf_objgraph::writer::PdfWriter;
use pdf_objgraph_test_suite::generators::minimal_pdfs::{
    classic_minimal, incremental_updates, many_objects, object_stream_document,
};
use pdf_objgraph_test_suite::{StreamEncoding, XRefFormat};
use std::io::Cursor;

/// Generate test PDFs of various sizes and layouts
fn generate_test_pdfs() -> Vec<(String, Vec<u8>)> {
    let mut pdfs = Vec::new();
    let stream = XRefFormat::Stream(StreamEncoding::flate_png());

    if let Ok(data) = classic_minimal() {
        pdfs.push(("minimal".to_string(), data));
    }
    if let Ok(data) = object_stream_document(true) {
        pdfs.push(("object_stream".to_string(), data));
    }
    if let Ok(data) = incremental_updates(10, XRefFormat::Table) {
        pdfs.push(("10_revisions".to_string(), data));
    }
    for pages in [10, 100, 1000] {
        if let Ok(data) = many_objects(pages, XRefFormat::Table) {
            pdfs.push((format!("{pages}_pages_table"), data));
        }
        if let Ok(data) = many_objects(pages, stream) {
            pdfs.push((format!("{pages}_pages_stream"), data));
        }
    }
    pdfs
}

fn benchmark_parsing(c: &mut Criterion) {
    let test_pdfs = generate_test_pdfs();
    let mut group = c.benchmark_group("pdf_parsing");
    group.sample_size(20);

    for (name, pdf_data) in &test_pdfs {
        group.bench_with_input(BenchmarkId::new("lazy", name), pdf_data, |b, pdf| {
            b.iter(|| {
                let cursor = Cursor::new(black_box(pdf.clone()));
                PdfParser::read(cursor, ParseOptions::default()).map(|p| p.objects().len())
            });
        });
        group.bench_with_input(BenchmarkId::new("eager", name), pdf_data, |b, pdf| {
            b.iter(|| {
                let cursor = Cursor::new(black_box(pdf.clone()));
                PdfParser::read(cursor, ParseOptions::default().eager()).map(|p| p.objects().len())
            });
        });
    }

    group.finish();
}

fn benchmark_writing(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdf_writing");
    let Ok(data) = many_objects(100, XRefFormat::Table) else {
        return;
    };
    let Ok(parser) = PdfParser::read(Cursor::new(data), ParseOptions::default().eager()) else {
        return;
    };

    group.bench_function("100_pages", |b| {
        b.iter(|| {
            let mut writer = PdfWriter::new(Vec::new());
            writer
                .write_document(parser.version(), parser.objects(), parser.trailer().dict())
                .map(|_| writer.position())
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_parsing, benchmark_writing);
criterion_main!(benches);
