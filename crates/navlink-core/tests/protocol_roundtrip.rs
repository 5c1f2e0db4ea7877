//! Integration tests for the navlink-core protocol codec.
//!
//! These tests drive every catalog message through the public API: build from
//! parameters, frame with a sequence counter, split back out of a datagram,
//! and decode, exercising the catalog, dialect, codec, and counter together.

use std::collections::BTreeMap;

use navlink_core::{
    decode_frame, encode_message,
    protocol::{split_datagram, FieldDef, FieldType, Frame, MessageDef, SequenceCounter},
    Catalog, Dialect, FieldValue, Message,
};

/// Sample parameters for any definition, one distinct value per field.
fn sample_params(def: &MessageDef) -> BTreeMap<String, FieldValue> {
    def.fields
        .iter()
        .enumerate()
        .map(|(i, field)| (field.name.to_string(), sample_value(field, i as i64 + 1)))
        .collect()
}

fn sample_value(field: &FieldDef, n: i64) -> FieldValue {
    match (field.ty, field.is_array()) {
        (FieldType::Char, _) => FieldValue::Text("ab".to_string()),
        (_, true) => FieldValue::Text(format!("{n},{}", n + 1)),
        (ty, false) if ty.is_float() => FieldValue::Float(n as f64 + 0.25),
        (_, false) => FieldValue::Int(n),
    }
}

#[test]
fn test_dialect_covers_catalog() {
    let catalog = Catalog::navlink();
    let dialect = Dialect::navlink();

    assert!(dialect.validate(&catalog).is_ok());
    for entry in catalog.all() {
        assert_eq!(dialect.get(entry.id).map(|d| d.name), Some(entry.name.as_str()));
    }
}

#[test]
fn test_roundtrip_every_catalog_message() {
    // Arrange
    let catalog = Catalog::navlink();
    let dialect = Dialect::navlink();
    let counter = SequenceCounter::new();

    for entry in catalog.all() {
        let def = dialect.get(entry.id).unwrap();
        let original = Message::build(def, &sample_params(def)).unwrap();

        // Act
        let bytes = encode_message(&original, counter.next(), 252, 1).unwrap();
        let (frame, consumed) = decode_frame(&bytes, &dialect).unwrap();
        let decoded = frame.message(&dialect).unwrap();

        // Assert
        assert_eq!(consumed, bytes.len(), "{} consumed length", entry.name);
        assert_eq!(decoded, original, "{} round trip", entry.name);
        assert_eq!(frame.header.message_id, entry.id);
    }
}

#[test]
fn test_sequence_numbers_advance_across_frames() {
    // Arrange
    let counter = SequenceCounter::new();
    let dialect = Dialect::navlink();

    // Act
    let frames: Vec<Frame> = (0..3)
        .map(|_| {
            let bytes = encode_message(&Message::heartbeat(), counter.next(), 251, 1).unwrap();
            decode_frame(&bytes, &dialect).unwrap().0
        })
        .collect();

    // Assert
    let seqs: Vec<u8> = frames.iter().map(|f| f.header.sequence).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
}

#[test]
fn test_datagram_with_several_frames_splits_in_order() {
    // Arrange
    let dialect = Dialect::navlink();
    let def = dialect.by_name("VOTE_PHASE").unwrap();
    let vote = Message::build(def, &sample_params(def)).unwrap();

    let mut datagram = encode_message(&Message::heartbeat(), 0, 1, 1).unwrap();
    datagram.extend(encode_message(&vote, 1, 252, 1).unwrap());

    // Act
    let frames: Vec<Frame> = split_datagram(&datagram, &dialect)
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    // Assert
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].message(&dialect).unwrap(), Message::heartbeat());
    assert_eq!(frames[1].message(&dialect).unwrap(), vote);
}
