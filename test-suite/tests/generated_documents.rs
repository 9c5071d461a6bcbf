//! Parsing the well-formed generated documents, one per xref layout

use pdf_objgraph::objects::{IndirectObjectTable, LoadState, Reference, Variant};
use pdf_objgraph::parser::{ParseOptions, PdfParser};
use pdf_objgraph::writer::PdfWriter;
use pdf_objgraph_test_suite::generators::minimal_pdfs::{
    classic_minimal, hybrid_document, incremental_updates, many_objects, object_stream_document,
    xref_stream_document,
};
use pdf_objgraph_test_suite::{utils, StreamEncoding, XRefFormat};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::io::Cursor;

type Snapshot = BTreeMap<Reference, (Variant, Option<Vec<u8>>)>;

fn parse(data: Vec<u8>) -> anyhow::Result<PdfParser<Cursor<Vec<u8>>>> {
    Ok(PdfParser::read(Cursor::new(data), ParseOptions::default())?)
}

/// Every document object with its value and raw stream bytes; xref streams
/// and object streams are file structure, not content
fn snapshot(objects: &IndirectObjectTable) -> anyhow::Result<Snapshot> {
    let mut out = BTreeMap::new();
    for object in objects.iter() {
        let stream = object.stream()?.map(|s| s.raw_data().to_vec());
        let value = object.value()?.clone();
        let structural = value
            .as_dict()
            .and_then(|d| d.get_type())
            .is_some_and(|t| *t == "XRef" || *t == "ObjStm");
        if !structural {
            out.insert(object.reference(), (value, stream));
        }
    }
    Ok(out)
}

fn catalog_type<R: std::io::Read + std::io::Seek>(parser: &PdfParser<R>) -> String {
    let catalog = parser.catalog().unwrap();
    let value = catalog.value().unwrap();
    let name = value.as_dict().unwrap().get_type().unwrap();
    name.as_str().unwrap().to_string()
}

fn pages_count<R: std::io::Read + std::io::Seek>(parser: &PdfParser<R>) -> i64 {
    let catalog = parser.catalog().unwrap();
    let pages = parser.get_indirect_key(catalog, "Pages").unwrap().unwrap();
    pages.as_dict().unwrap().get_number_or("Count", -1)
}

#[test]
fn test_classic_table() {
    let parser = parse(classic_minimal().unwrap()).unwrap();
    assert_eq!(catalog_type(&parser), "Catalog");
    assert_eq!(pages_count(&parser), 1);
    assert_eq!(parser.trailer().info(), Some(Reference::new(4, 0)));
    assert_eq!(parser.incremental_updates(), 0);
}

#[test]
fn test_xref_stream_encodings() {
    for encoding in [
        StreamEncoding::plain(),
        StreamEncoding {
            compress: true,
            predictor: false,
        },
        StreamEncoding::flate_png(),
    ] {
        let parser = parse(xref_stream_document(encoding).unwrap()).unwrap();
        assert_eq!(catalog_type(&parser), "Catalog", "{encoding:?}");
        assert_eq!(pages_count(&parser), 1);
        // The xref stream is object 5 and stays in the table
        assert!(parser.get_object(Reference::new(5, 0)).is_some());
    }
}

#[test]
fn test_object_stream_members_replace_container() {
    for compress in [false, true] {
        let parser = parse(object_stream_document(compress).unwrap()).unwrap();
        assert_eq!(catalog_type(&parser), "Catalog");
        assert_eq!(pages_count(&parser), 1);
        assert!(parser.get_object(Reference::new(7, 0)).is_none());

        let content = parser.get_object(Reference::new(4, 0)).unwrap();
        let decoded = {
            let stream = content.stream().unwrap().unwrap();
            let value = content.value().unwrap();
            stream.decode(value.as_dict().unwrap()).unwrap()
        };
        assert_eq!(decoded, b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET");
    }
}

#[test]
fn test_hybrid_file() {
    let parser = parse(hybrid_document().unwrap()).unwrap();
    assert_eq!(catalog_type(&parser), "Catalog");
    assert_eq!(pages_count(&parser), 1);
    assert!(parser.get_object(Reference::new(7, 0)).is_none());
}

#[test]
fn test_newest_revision_wins() {
    for format in [
        XRefFormat::Table,
        XRefFormat::Stream(StreamEncoding::flate_png()),
    ] {
        let parser = parse(incremental_updates(3, format).unwrap()).unwrap();
        let object = parser.get_object(Reference::new(5, 0)).unwrap();
        let revision = object.value().unwrap().as_dict().unwrap().get_number_or("Revision", 0);
        assert_eq!(revision, 3, "{format:?}");
        assert_eq!(parser.incremental_updates(), 2);
        // Only the oldest trailer names /Info
        assert_eq!(parser.trailer().info(), Some(Reference::new(4, 0)));
    }
}

#[test]
fn test_objects_load_on_demand() {
    let parser = parse(many_objects(20, XRefFormat::Table).unwrap()).unwrap();
    let last_page = parser.get_object(Reference::new(41, 0)).unwrap();
    assert_eq!(last_page.load_state(), LoadState::NotLoaded);
    assert!(last_page.value().unwrap().is_dictionary());
    assert_eq!(last_page.load_state(), LoadState::Loaded);
}

#[test]
fn test_eager_and_lazy_agree() {
    let data = object_stream_document(true).unwrap();
    let lazy = parse(data.clone()).unwrap();
    let eager = PdfParser::read(Cursor::new(data), ParseOptions::default().eager()).unwrap();

    for object in eager.objects().iter() {
        assert_eq!(object.load_state(), LoadState::Loaded);
    }
    assert_eq!(
        snapshot(lazy.objects()).unwrap(),
        snapshot(eager.objects()).unwrap()
    );
}

#[test]
fn test_every_in_use_entry_is_reachable() {
    let parser = parse(many_objects(5, XRefFormat::Stream(StreamEncoding::flate_png())).unwrap())
        .unwrap();
    for (number, entry) in parser.xref().iter() {
        if entry.is_in_use() {
            let reference = Reference::new(number, entry.generation());
            let object = parser.get_object(reference).unwrap();
            assert_eq!(object.reference(), reference);
        }
    }
}

#[test]
fn test_written_documents_read_back() {
    let documents = [
        classic_minimal().unwrap(),
        xref_stream_document(StreamEncoding::flate_png()).unwrap(),
        object_stream_document(true).unwrap(),
        hybrid_document().unwrap(),
        incremental_updates(4, XRefFormat::Table).unwrap(),
    ];

    for data in documents {
        let parser = parse(data).unwrap();
        let before = snapshot(parser.objects()).unwrap();

        let mut writer = PdfWriter::new(Vec::new());
        writer
            .write_document(parser.version(), parser.objects(), parser.trailer().dict())
            .unwrap();
        let reparsed = parse(writer.into_inner()).unwrap();

        assert_eq!(snapshot(reparsed.objects()).unwrap(), before);
        assert_eq!(reparsed.trailer().root(), parser.trailer().root());
    }
}

#[test]
fn test_file_backed_parse() {
    let file = utils::temp_pdf(&classic_minimal().unwrap()).unwrap();
    let parser = PdfParser::open(file.path()).unwrap();
    assert_eq!(catalog_type(&parser), "Catalog");

    let strict = PdfParser::open_strict(file.path()).unwrap();
    assert_eq!(pages_count(&strict), 1);
}
