use std::fmt;
use std::path::{Path, PathBuf};

use panelcut_core::document::Document;
use panelcut_io::{DocumentLoader, DxfFacade};

use crate::errors::EngineError;

/// 单个文件的图层实体计数，按图层首次出现的顺序排列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerReport {
    pub path: PathBuf,
    pub layers: Vec<(String, usize)>,
}

impl LayerReport {
    pub fn from_document(path: impl Into<PathBuf>, document: &Document) -> Self {
        let mut layers: Vec<(String, usize)> = Vec::new();
        for (_, entity) in document.entities() {
            match layers.iter_mut().find(|(name, _)| *name == entity.layer) {
                Some((_, count)) => *count += 1,
                None => layers.push((entity.layer.clone(), 1)),
            }
        }
        Self {
            path: path.into(),
            layers,
        }
    }

    pub fn total(&self) -> usize {
        self.layers.iter().map(|(_, count)| count).sum()
    }

    pub fn count(&self, layer: &str) -> Option<usize> {
        self.layers
            .iter()
            .find(|(name, _)| name == layer)
            .map(|(_, count)| *count)
    }
}

impl fmt::Display for LayerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analyzing file: {}", self.path.display())?;
        writeln!(f, "Layers found in modelspace and number of entities on each layer:")?;
        for (name, count) in &self.layers {
            writeln!(f, "  - Layer: {name}, Entities: {count}")?;
        }
        write!(f, "{}", "-".repeat(20))
    }
}

/// 读取一个 DXF 文件并统计各图层实体数。
pub fn report_file(path: &Path) -> Result<LayerReport, EngineError> {
    let document = DxfFacade::new().load(path)?;
    Ok(LayerReport::from_document(path, &document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelcut_core::geometry::Point2;

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "CUT");
        doc.add_circle(Point2::new(5.0, 5.0), 2.0, "DRILL");
        doc.add_line(Point2::new(0.0, 5.0), Point2::new(10.0, 5.0), "CUT");
        doc
    }

    #[test]
    fn counts_follow_first_appearance() {
        let report = LayerReport::from_document("a.dxf", &sample());
        assert_eq!(
            report.layers,
            vec![("CUT".to_string(), 2), ("DRILL".to_string(), 1)]
        );
        assert_eq!(report.total(), 3);
        assert_eq!(report.count("DRILL"), Some(1));
        assert_eq!(report.count("DELETED"), None);
    }

    #[test]
    fn display_lists_each_layer() {
        let report = LayerReport::from_document("a.dxf", &sample());
        let text = report.to_string();
        assert!(text.starts_with("Analyzing file: a.dxf\n"));
        assert!(text.contains("  - Layer: CUT, Entities: 2\n"));
        assert!(text.ends_with("--------------------"));
    }
}
