use std::f64::consts::PI;
use std::path::PathBuf;

use panelcut_core::{
    document::Entity,
    primitive::{Primitive, TextAlignment},
};
use panelcut_io::{DocumentLoader, DxfFacade};
use serde_json::json;

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn load_basic_entities_keeps_order_and_layers() {
    let loader = DxfFacade::new();
    let doc = loader
        .load(&fixture("basic_entities.dxf"))
        .expect("读取 DXF 失败");

    assert_eq!(doc.version(), Some("AC1009"));

    let kinds: Vec<_> = doc.entities().map(|(_, e)| e.entity.kind().to_string()).collect();
    assert_eq!(
        kinds,
        vec!["LINE", "CIRCLE", "ARC", "LWPOLYLINE", "TEXT", "MTEXT", "SPLINE"]
    );

    let layers: Vec<_> = doc.layers().map(|layer| layer.name.clone()).collect();
    assert_eq!(
        layers,
        vec!["0", "OUTLINE", "HIDDEN_STUFF", "HOLES", "SLOTS", "NOTES", "CURVES"]
    );

    let hidden = doc.layer("HIDDEN_STUFF").expect("缺少 HIDDEN_STUFF 图层");
    assert!(!hidden.is_visible);
    assert_eq!(hidden.color, 3);
    assert_eq!(hidden.linetype, "DASHED");
    assert!(doc.layer("OUTLINE").expect("缺少 OUTLINE 图层").is_visible);
}

#[test]
fn load_basic_entities_parses_geometry() {
    let doc = DxfFacade::new()
        .load(&fixture("basic_entities.dxf"))
        .expect("读取 DXF 失败");
    let entities: Vec<_> = doc.entities().map(|(_, e)| e).collect();

    match &entities[1].entity {
        Entity::Primitive(Primitive::Circle(circle)) => {
            assert!((circle.center.x() - 50.0).abs() < 1e-9);
            assert!((circle.radius - 4.0).abs() < 1e-9);
        }
        other => panic!("期望 CIRCLE，实际为 {other:?}"),
    }
    assert_eq!(entities[1].color, Some(5));

    match &entities[2].entity {
        Entity::Primitive(Primitive::Arc(arc)) => {
            assert!((arc.start_angle - PI).abs() < 1e-9);
            assert!((arc.end_angle - 1.5 * PI).abs() < 1e-9);
        }
        other => panic!("期望 ARC，实际为 {other:?}"),
    }

    match &entities[3].entity {
        Entity::Primitive(Primitive::Polyline(polyline)) => {
            assert!(polyline.is_closed);
            assert_eq!(polyline.vertices.len(), 4);
        }
        other => panic!("期望 LWPOLYLINE，实际为 {other:?}"),
    }

    match &entities[5].entity {
        Entity::Primitive(Primitive::Text(text)) => {
            assert!(text.is_multiline);
            assert_eq!(text.content, "FIRST LINE\nSECOND LINE");
            assert_eq!(text.alignment, TextAlignment::BaselineLeft);
        }
        other => panic!("期望 MTEXT，实际为 {other:?}"),
    }

    assert!(matches!(&entities[6].entity, Entity::Unsupported(u) if u.kind == "SPLINE"));
    assert_eq!(entities[6].layer, "CURVES");
}

#[test]
fn line_serializes_as_plain_coordinates() {
    let doc = DxfFacade::new()
        .load(&fixture("basic_entities.dxf"))
        .expect("读取 DXF 失败");
    let (_, first) = doc.entities().next().expect("文档为空");
    let primitive = first.entity.as_primitive().expect("首个实体应为图元");
    let value = serde_json::to_value(primitive).expect("序列化失败");
    assert_eq!(
        value,
        json!({ "Line": { "start": [0.0, 0.0], "end": [300.0, 0.0] } })
    );
}

#[test]
fn linear_dimensions_are_read_and_other_kinds_are_kept_unsupported() {
    let doc = DxfFacade::new()
        .load(&fixture("dimensions.dxf"))
        .expect("读取 DXF 失败");
    let entities: Vec<_> = doc.entities().map(|(_, e)| e).collect();
    assert_eq!(entities.len(), 2);

    match &entities[0].entity {
        Entity::Primitive(Primitive::Dimension(dimension)) => {
            assert!((dimension.measurement() - 120.0).abs() < 1e-9);
            assert!((dimension.location.y() + 25.0).abs() < 1e-9);
            assert!(dimension.text.is_none());
        }
        other => panic!("期望 DIMENSION，实际为 {other:?}"),
    }

    assert!(matches!(&entities[1].entity, Entity::Unsupported(u) if u.kind == "DIMENSION"));
    assert_eq!(entities[1].layer, "DIMS");
}

#[test]
fn paper_space_line_and_viewport_are_not_loaded() {
    let doc = DxfFacade::new()
        .load(&fixture("paper_space.dxf"))
        .expect("读取 DXF 失败");
    let kinds: Vec<_> = doc.entities().map(|(_, e)| e.entity.kind().to_string()).collect();
    assert_eq!(kinds, vec!["LWPOLYLINE"]);
    assert!(doc.entities().all(|(_, e)| e.layer == "OUTLINE"));
}

#[test]
fn missing_file_reports_read_error() {
    let err = DxfFacade::new()
        .load(&fixture("does_not_exist.dxf"))
        .unwrap_err();
    assert!(matches!(err, panelcut_io::IoError::ReadError { .. }));
}
