use std::fs;
use std::path::Path;

use assert_cmd::Command;
use panelcut_core::document::Document;
use panelcut_core::geometry::Point2;
use panelcut_io::{DocumentLoader, DocumentSaver, DxfFacade};
use predicates::prelude::*;
use tempfile::TempDir;

fn cli() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_panelcut"));
    cmd.env_remove("PANELCUT_CONFIG");
    cmd
}

fn write_panel(path: &Path) {
    let mut doc = Document::new();
    doc.add_polyline(
        [
            Point2::new(0.0, 0.0),
            Point2::new(300.0, 0.0),
            Point2::new(300.0, 200.0),
            Point2::new(0.0, 200.0),
        ],
        true,
        "OUTLINE",
    );
    doc.add_circle(Point2::new(200.0, 100.0), 4.0, "HOLES");
    DxfFacade::new().save(&doc, path).expect("写入图纸失败");
}

#[test]
fn help_lists_subcommands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transform"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn transform_writes_layered_output() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let input = dir.path().join("panel_a.dxf");
    let output = dir.path().join("panel_a_out.dxf");
    write_panel(&input);
    fs::write(
        dir.path().join("panel_a.csv"),
        "panel_name,hole_name,x,y,z,diameter,depth,nx,ny,nz\npanel_a,H1,50,40,0,8,12,0,0,1\n",
    )
    .expect("写入孔位表失败");

    cli()
        .current_dir(dir.path())
        .arg("transform")
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 holes"))
        .stdout(predicate::str::contains("CUT: 1"));

    let out = DxfFacade::new().load(&output).expect("读取输出失败");
    for layer in ["CUT", "DRILL", "DRILL_MARKS", "ANNOTATION", "DIMENSION", "DELETED"] {
        assert!(out.layer(layer).is_some(), "missing layer {layer}");
    }
}

#[test]
fn transform_failure_exits_non_zero() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let output = dir.path().join("out.dxf");

    cli()
        .current_dir(dir.path())
        .arg("transform")
        .arg(dir.path().join("missing.dxf"))
        .arg(&output)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to transform"));
    assert!(!output.exists());
}

#[test]
fn broken_config_falls_back_to_defaults() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let input = dir.path().join("panel.dxf");
    let output = dir.path().join("panel_out.dxf");
    let config = dir.path().join("broken.toml");
    write_panel(&input);
    fs::write(&config, "[classifier\nslot_max_size = ").expect("写入配置失败");

    cli()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("transform")
        .arg(&input)
        .arg(&output)
        .assert()
        .success();
    assert!(output.exists());
}

#[test]
fn report_counts_a_single_file() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let input = dir.path().join("panel.dxf");
    write_panel(&input);

    cli()
        .current_dir(dir.path())
        .arg("report")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Layer: OUTLINE, Entities: 1"))
        .stdout(predicate::str::contains("Layer: HOLES, Entities: 1"));
}

#[test]
fn report_walks_directories_recursively() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let nested = dir.path().join("nested");
    fs::create_dir_all(&nested).expect("创建子目录失败");
    write_panel(&dir.path().join("a.dxf"));
    write_panel(&nested.join("B.DXF"));
    fs::write(dir.path().join("notes.txt"), "not a drawing").expect("写入文件失败");

    cli()
        .current_dir(dir.path())
        .arg("report")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("a.dxf"))
        .stdout(predicate::str::contains("B.DXF"))
        .stdout(predicate::str::contains("notes.txt").not());
}

#[test]
fn report_rejects_missing_path() {
    let dir = TempDir::new().expect("创建临时目录失败");
    cli()
        .current_dir(dir.path())
        .arg("report")
        .arg(dir.path().join("nowhere"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid path"));
}
