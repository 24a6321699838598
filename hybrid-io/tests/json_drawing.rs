use std::fs;

use hybrid_core::document::{Document, EntityId};
use hybrid_core::geometry::Point2;
use hybrid_io::{DocumentLoader, DocumentSaver, IoError, JsonDrawing};

fn sample() -> (Document, EntityId, EntityId) {
    let mut doc = Document::new();
    let polyline = doc.add_polyline(
        [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)],
        false,
        "0",
    );
    doc.set_extension(polyline, "HybridData/Data", r#"[{"x":0.0,"y":0.0,"id":1}]"#);
    let table = doc.add_table("Induction Bend", Point2::new(50.0, 50.0), "Hybrid_Points_TBL");
    doc.ensure_table_style("Induction Bend");
    (doc, polyline, table)
}

#[test]
fn save_then_load_preserves_entities_and_payloads() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("drawing.json");
    let (doc, polyline, table) = sample();

    let facade = JsonDrawing::new();
    facade.save(&doc, &path).expect("保存图纸失败");
    let loaded = facade.load(&path).expect("读取图纸失败");

    assert_eq!(loaded.entities().count(), 2);
    assert_eq!(
        loaded.polyline(polyline).map(|pl| pl.vertices.len()),
        Some(2)
    );
    assert!(loaded.table(table).is_some());
    assert_eq!(
        loaded.extension(polyline, "HybridData/Data"),
        doc.extension(polyline, "HybridData/Data")
    );
    assert!(loaded.has_table_style("Induction Bend"));
}

#[test]
fn loaded_document_allocates_fresh_entity_ids() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("drawing.json");
    let (doc, polyline, table) = sample();
    JsonDrawing::new().save(&doc, &path).expect("保存图纸失败");

    let mut loaded = JsonDrawing::new().load(&path).expect("读取图纸失败");
    let line = loaded.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), "0");
    assert_ne!(line, polyline);
    assert_ne!(line, table);
}

#[test]
fn missing_file_reports_read_error() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let err = JsonDrawing::new()
        .load(&dir.path().join("absent.json"))
        .unwrap_err();
    assert!(matches!(err, IoError::ReadError { .. }));
}

#[test]
fn foreign_or_future_files_are_rejected() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let facade = JsonDrawing::new();
    let encoded = facade.encode(&Document::new()).expect("编码失败");

    let path = dir.path().join("foreign.json");
    fs::write(&path, encoded.replace("hybrid-drawing", "other-format")).expect("写入失败");
    assert!(matches!(facade.load(&path), Err(IoError::InvalidDocument(_))));

    let path = dir.path().join("future.json");
    fs::write(&path, encoded.replace("\"version\": 1", "\"version\": 9")).expect("写入失败");
    assert!(matches!(facade.load(&path), Err(IoError::UnsupportedFeature(_))));

    let path = dir.path().join("truncated.json");
    fs::write(&path, &encoded[..encoded.len() / 2]).expect("写入失败");
    assert!(matches!(facade.load(&path), Err(IoError::InvalidDocument(_))));
}
