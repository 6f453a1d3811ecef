#![allow(missing_docs)]

use flexcode::{Builder, Flexcode, Inspector, Value, ValueType};

fn build_sample() -> flexcode::Result<Vec<u8>> {
    let mut builder = Builder::new();
    builder.start_map()?;
    builder.add_key("scores")?;
    builder.start_vector()?;
    builder.add_uint8(9)?;
    builder.add_uint16(1_000)?;
    builder.end_typed_vector()?;
    builder.add_key("title")?;
    builder.add_string("report")?;
    builder.end_map()?;
    builder.into_bytes()
}

#[test]
fn test_inspect_tree_shape() -> flexcode::Result<()> {
    let bytes = build_sample()?;
    let report = Flexcode::inspect_bytes(&bytes)?;

    assert_eq!(report.buffer_size, bytes.len());
    assert_eq!(report.root_byte_width, 1);
    assert_eq!(report.tree.value_type, ValueType::Map);
    assert_eq!(report.tree.children.len(), 2);

    let scores = &report.tree.children[0];
    assert_eq!(scores.key.as_deref(), Some("scores"));
    assert_eq!(scores.value_type, ValueType::VectorUInt);
    assert_eq!(scores.bit_width, 16);
    assert_eq!(scores.children.len(), 2);
    assert_eq!(scores.children[1].summary.as_deref(), Some("1000"));

    let title = &report.tree.children[1];
    assert_eq!(title.summary.as_deref(), Some("\"report\""));
    assert!(title.payload_offset.is_some());
    Ok(())
}

#[test]
fn test_inspect_display() -> flexcode::Result<()> {
    let bytes = build_sample()?;
    let report = Inspector::inspect_bytes(&bytes)?;
    let text = report.to_string();

    assert!(text.contains("FLEXCODE INSPECTOR REPORT"));
    assert!(text.contains("\"scores\": [VectorUInt/16]"));
    assert!(text.contains("└── \"title\": [String/8]"));
    Ok(())
}

#[test]
fn test_report_serializes() -> flexcode::Result<()> {
    let bytes = Flexcode::encode(&Value::Vector(vec![Value::Bool(true)]))?;
    let report = Inspector::inspect_bytes(&bytes)?;
    let json = serde_json::to_value(&report).map_err(|e| flexcode::FlexError::Format(e.to_string()))?;

    assert_eq!(json["tree"]["value_type"], "Vector");
    assert_eq!(json["tree"]["children"][0]["value_type"], "Bool");
    assert_eq!(json["tree"]["children"][0]["summary"], "true");
    Ok(())
}

#[test]
fn test_inspect_file() -> flexcode::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("inspect.flex");
    std::fs::write(&path, build_sample()?)?;

    let report = Inspector::inspect(&path)?;
    assert_eq!(report.tree.children.len(), 2);
    Ok(())
}
