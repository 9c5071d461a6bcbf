//! Property tests for value parsing and serialization

use pdf_objgraph::parser::Tokenizer;
use pdf_objgraph::writer::to_bytes;
use pdf_objgraph::{Array, Dictionary, Name, PdfString, Reference, Variant};
use proptest::prelude::*;
use std::io::Cursor;

#[derive(Debug, Clone)]
enum Item {
    Integer(i64),
    Reference(u32, u16),
}

fn item() -> impl Strategy<Value = Item> {
    prop_oneof![
        (-100_000i64..100_000).prop_map(Item::Integer),
        (1u32..10_000, 0u16..5).prop_map(|(n, g)| Item::Reference(n, g)),
    ]
}

fn scalar() -> impl Strategy<Value = Variant> {
    prop_oneof![
        Just(Variant::Null),
        any::<bool>().prop_map(Variant::Bool),
        any::<i32>().prop_map(|n| Variant::Number(n as i64)),
        (-1_000_000i32..1_000_000).prop_map(|n| Variant::Real(n as f64 / 8.0)),
        prop::collection::vec(any::<u8>(), 0..24)
            .prop_map(|bytes| Variant::String(PdfString::new(bytes))),
        prop::collection::vec(any::<u8>(), 0..12)
            .prop_map(|bytes| Variant::String(PdfString::new_hex(bytes))),
        "[A-Za-z][A-Za-z0-9 #/()]{0,10}".prop_map(|name| Variant::Name(Name::from(name))),
        (1u32..1000, 0u16..3).prop_map(|(n, g)| Variant::Reference(Reference::new(n, g))),
    ]
}

fn variant() -> impl Strategy<Value = Variant> {
    scalar().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6)
                .prop_map(|items| Variant::Array(Array::from(items))),
            prop::collection::btree_map("[A-Z][a-z]{0,6}", inner, 0..6).prop_map(|entries| {
                Variant::Dictionary(entries.into_iter().collect::<Dictionary>())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn test_reference_lookahead_restores_tokens(items in prop::collection::vec(item(), 1..40)) {
        let text = items
            .iter()
            .map(|item| match item {
                Item::Integer(n) => n.to_string(),
                Item::Reference(n, g) => format!("{n} {g} R"),
            })
            .collect::<Vec<_>>()
            .join(" ");

        let mut tokenizer = Tokenizer::new(Cursor::new(text.into_bytes()));
        for item in &items {
            let expected = match item {
                Item::Integer(n) => Variant::Number(*n),
                Item::Reference(n, g) => Variant::Reference(Reference::new(*n, *g)),
            };
            prop_assert_eq!(tokenizer.next_variant().unwrap(), expected);
        }
        prop_assert!(tokenizer.next_token().unwrap().is_none());
    }

    #[test]
    fn test_written_values_read_back(value in variant()) {
        let bytes = to_bytes(&value);
        let mut tokenizer = Tokenizer::new(Cursor::new(bytes));
        prop_assert_eq!(tokenizer.next_variant().unwrap(), value);
    }

    #[test]
    fn test_arbitrary_bytes_never_panic(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut tokenizer = Tokenizer::new(Cursor::new(data));
        for _ in 0..64 {
            if tokenizer.next_variant().is_err() {
                break;
            }
        }
    }
}
