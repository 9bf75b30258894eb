//! 孔位表（CSV）读取。
//!
//! 列顺序：`panel_name,hole_name,x,y,z,diameter,depth,nx,ny,nz`，首行为表头。

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use panelcut_core::{geometry::Vector3, hole::HoleRecord};

use crate::IoError;

const FIELD_COUNT: usize = 10;

/// 按列位置反序列化的原始行。
#[derive(Debug, Deserialize)]
struct HoleRow {
    panel_name: String,
    hole_name: String,
    x: f64,
    y: f64,
    z: f64,
    diameter: f64,
    depth: f64,
    nx: f64,
    ny: f64,
    nz: f64,
}

impl HoleRow {
    fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        [
            ("x", self.x),
            ("y", self.y),
            ("z", self.z),
            ("diameter", self.diameter),
            ("depth", self.depth),
            ("nx", self.nx),
            ("ny", self.ny),
            ("nz", self.nz),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
    }
}

/// 被跳过的数据行。
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid hole row at line {line}: {reason}")]
pub struct HoleRowError {
    pub line: u64,
    pub reason: String,
    pub row: Vec<String>,
}

/// 读取结果：有效孔位与被跳过的行。
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HoleTable {
    pub holes: Vec<HoleRecord>,
    pub skipped: Vec<HoleRowError>,
}

impl HoleTable {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }
}

/// 与图纸同名的孔位表路径：`panel.dxf` → `panel.csv`。
pub fn sidecar_path(drawing: &Path) -> PathBuf {
    drawing.with_extension("csv")
}

/// 读取孔位表。文件不存在视为没有孔；格式错误的行记录后跳过。
pub fn read_hole_csv(path: &Path) -> Result<HoleTable, IoError> {
    if !path.exists() {
        info!(path = %path.display(), "未找到孔位表，按无孔处理");
        return Ok(HoleTable::default());
    }
    info!(path = %path.display(), "读取孔位表");

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|source| IoError::HoleTable {
            path: path.to_path_buf(),
            source,
        })?;

    let mut table = HoleTable::default();
    for result in reader.records() {
        let outcome = match result {
            Ok(record) => parse_row(&record),
            Err(err) => Err(HoleRowError {
                line: err.position().map(|pos| pos.line()).unwrap_or(0),
                reason: err.to_string(),
                row: Vec::new(),
            }),
        };
        match outcome {
            Ok(hole) => table.holes.push(hole),
            Err(skipped) => {
                warn!(
                    line = skipped.line,
                    row = ?skipped.row,
                    reason = %skipped.reason,
                    "跳过无效的孔位行"
                );
                table.skipped.push(skipped);
            }
        }
    }

    info!(
        holes = table.holes.len(),
        skipped = table.skipped.len(),
        "孔位表读取完成"
    );
    Ok(table)
}

fn parse_row(record: &StringRecord) -> Result<HoleRecord, HoleRowError> {
    let line = record.position().map(|pos| pos.line()).unwrap_or(0);
    let row: Vec<String> = record.iter().map(str::to_string).collect();
    let invalid = |reason: String| HoleRowError {
        line,
        reason,
        row: row.clone(),
    };

    if record.len() != FIELD_COUNT {
        return Err(invalid(format!(
            "expected {FIELD_COUNT} fields, found {}",
            record.len()
        )));
    }

    let parsed: HoleRow = record
        .deserialize(None)
        .map_err(|err| invalid(err.to_string()))?;
    if let Some((column, value)) = parsed.first_non_finite() {
        return Err(invalid(format!("non-finite value {value} in column {column}")));
    }

    Ok(HoleRecord {
        panel_name: parsed.panel_name,
        name: parsed.hole_name,
        x: round2(parsed.x),
        y: round2(parsed.y),
        z: parsed.z,
        diameter: parsed.diameter,
        depth: parsed.depth,
        normal: Vector3::new(round2(parsed.nx), round2(parsed.ny), round2(parsed.nz)),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
