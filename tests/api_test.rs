#![allow(missing_docs)]

use flexcode::{Builder, BuilderOptions, FlexError, FlexReader, Flexcode, Value, ValueType};

fn sample_document() -> Value {
    Value::map([
        ("name", Value::from("flexcode")),
        ("version", Value::UInt(3)),
        ("offset", Value::Int(-40_000)),
        ("ratio", Value::Float(0.5)),
        ("precise", Value::Float(0.1)),
        ("enabled", Value::Bool(true)),
        ("missing", Value::Null),
        ("raw", Value::Blob(vec![0, 1, 2, 255])),
        (
            "tags",
            Value::Vector(vec!["a".into(), "bb".into(), "ccc".into()]),
        ),
        (
            "nested",
            Value::map([("deep", Value::Vector(vec![Value::Int(1), Value::Vector(vec![])]))]),
        ),
    ])
}

// --- TESTS ---

/// Memory round trip through the value tree.
#[test]
fn test_encode_decode() -> flexcode::Result<()> {
    let doc = sample_document();
    let bytes = Flexcode::encode(&doc)?;
    assert_eq!(Flexcode::decode(&bytes)?, doc);
    Ok(())
}

/// Standard file IO through `save`, `load` and `open`.
#[test]
fn test_standard_file_io() -> flexcode::Result<()> {
    let dir = tempfile::tempdir()?;
    let file_path = dir.path().join("doc.flex");
    let doc = sample_document();

    Flexcode::save(&file_path, &doc)?;
    assert_eq!(Flexcode::load(&file_path)?, doc);

    let reader = Flexcode::open(&file_path)?;
    assert_eq!(reader.len(), Flexcode::encode(&doc)?.len());
    let root = reader.root()?;
    let name = root
        .as_map()?
        .get("name")?
        .ok_or_else(|| FlexError::Format("name".into()))?;
    assert_eq!(name.as_str()?, "flexcode");
    Ok(())
}

#[test]
fn test_reader_from_bytes() -> flexcode::Result<()> {
    let mut builder = Builder::new();
    builder.start_vector()?;
    builder.add_uint16(500)?;
    builder.add_string("two")?;
    builder.end_vector()?;
    let reader = FlexReader::from_bytes(builder.into_bytes()?)?;

    let vector = reader.root()?.as_vector()?;
    assert_eq!(vector.index(0)?.as_u64()?, 500);
    assert_eq!(vector.index(1)?.as_str()?, "two");
    assert!(vector.index(2).is_err());
    Ok(())
}

#[test]
fn test_options_from_config() -> flexcode::Result<()> {
    let options: BuilderOptions =
        serde_json::from_str(r#"{ "initial_capacity": 16 }"#).map_err(|e| FlexError::Format(e.to_string()))?;
    assert_eq!(options.get_initial_capacity(), 16);

    let defaults: BuilderOptions =
        serde_json::from_str("{}").map_err(|e| FlexError::Format(e.to_string()))?;
    assert_eq!(defaults, BuilderOptions::default());

    let bytes = options.encode(&sample_document())?;
    let via_facade = Flexcode::builder().initial_capacity(16).encode(&sample_document())?;
    assert_eq!(bytes, via_facade);
    assert_eq!(Flexcode::decode(&bytes)?, sample_document());
    Ok(())
}

#[test]
fn test_value_ints_pick_narrow_widths() -> flexcode::Result<()> {
    let bytes = Flexcode::encode(&Value::Int(-1))?;
    assert_eq!(bytes, vec![0xFF, 4, 1]);

    let bytes = Flexcode::encode(&Value::UInt(u64::MAX))?;
    assert_eq!(bytes.len(), 10);
    assert_eq!(Flexcode::decode(&bytes)?, Value::UInt(u64::MAX));
    Ok(())
}

#[test]
fn test_value_key_with_nul_fails() {
    let doc = Value::map([("bad\0key", Value::Null)]);
    assert!(matches!(Flexcode::encode(&doc), Err(FlexError::Encoding(_))));
}

#[test]
fn test_typed_vector_decodes_to_plain_vector() -> flexcode::Result<()> {
    let mut builder = Builder::new();
    builder.start_vector()?;
    builder.add_int16(-2)?;
    builder.add_int16(7)?;
    builder.end_fixed_typed_vector()?;
    let bytes = builder.into_bytes()?;

    assert_eq!(
        Flexcode::decode(&bytes)?,
        Value::Vector(vec![Value::Int(-2), Value::Int(7)])
    );
    Ok(())
}

#[test]
fn test_keys_decode_via_as_str() -> flexcode::Result<()> {
    let bytes = Flexcode::encode(&Value::map([("k", Value::Bool(false))]))?;
    let reader = FlexReader::from_bytes(bytes)?;
    let map = reader.root()?.as_map()?;
    let keys = map.keys();
    assert_eq!(keys.element_type(), Some(ValueType::Key));
    assert_eq!(keys.index(0)?.as_str()?, "k");
    Ok(())
}

// --- MALFORMED INPUT ---

#[test]
fn test_truncated_buffers_are_format_errors() -> flexcode::Result<()> {
    let bytes = Flexcode::encode(&sample_document())?;
    assert!(matches!(Flexcode::decode(&[]), Err(FlexError::Format(_))));
    assert!(matches!(Flexcode::decode(&[1]), Err(FlexError::Format(_))));

    for cut in 1..bytes.len() {
        let result = Flexcode::decode(&bytes[cut..]);
        if let Err(e) = result {
            assert!(matches!(e, FlexError::Format(_)), "cut {cut}: {e}");
        }
    }
    Ok(())
}

#[test]
fn test_bad_trailer_width_is_rejected() {
    assert!(matches!(
        Flexcode::decode(&[0, 0, 3]),
        Err(FlexError::Format(_))
    ));
}

#[test]
fn test_unknown_type_code_is_rejected() {
    // Type code 60 is unassigned.
    assert!(matches!(
        Flexcode::decode(&[0, 60 << 2, 1]),
        Err(FlexError::Format(_))
    ));
}

#[test]
fn test_open_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = FlexReader::open(dir.path().join("absent.flex"));
    assert!(matches!(result, Err(FlexError::Io(_))));
}
