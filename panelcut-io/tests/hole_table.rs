use std::path::PathBuf;

use panelcut_io::{read_hole_csv, sidecar_path};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn malformed_rows_are_skipped_and_valid_rows_kept() {
    let table = read_hole_csv(&fixture("holes.csv")).expect("读取孔位表失败");

    let names: Vec<_> = table.holes.iter().map(|hole| hole.name.as_str()).collect();
    assert_eq!(names, vec!["H1", "H2", "H5", "H7"]);

    let skipped_lines: Vec<_> = table.skipped.iter().map(|row| row.line).collect();
    assert_eq!(skipped_lines, vec![4, 5, 7]);
    assert!(table.skipped[1].reason.contains("found 4"));
    assert!(table.skipped[2].reason.contains("non-finite"));
    assert_eq!(table.skipped[2].row[2], "inf");

    let h1 = &table.holes[0];
    assert_eq!(h1.panel_name, "panel_a");
    assert!((h1.x - 50.0).abs() < 1e-12);
    assert!(!h1.is_side_drilled());
    assert_eq!(h1.label(), "d8 h12");

    let h2 = &table.holes[1];
    assert!((h2.y - 60.33).abs() < 1e-12);
    assert!(h2.is_side_drilled());
    assert_eq!(h2.label(), "d5 h20 z9.5");
    assert!((h2.normal.x() - 1.0).abs() < 1e-12);

    // z 不取整：0.004 仍是侧孔
    let h7 = &table.holes[3];
    assert!(h7.is_side_drilled());
    assert_eq!(h7.label(), "d6 h15 z0.004");
    assert_eq!(h7.table_z(), 0.0);
}

#[test]
fn missing_table_means_no_holes() {
    let table = read_hole_csv(&fixture("absent.csv")).expect("缺失的孔位表不应报错");
    assert!(table.is_empty());
    assert!(table.skipped.is_empty());
}

#[test]
fn sidecar_sits_next_to_drawing() {
    let drawing = fixture("basic_entities.dxf");
    assert_eq!(sidecar_path(&drawing), fixture("basic_entities.csv"));
}
