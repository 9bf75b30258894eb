//! 图元到语义图层的分类。

use std::collections::BTreeMap;

use panelcut_config::ClassifierConfig;
use panelcut_core::document::{Document, Entity, EntityId};
use panelcut_core::layer::LayerTag;
use panelcut_core::primitive::Primitive;
use tracing::{debug, info};

use crate::errors::EngineError;
use crate::model::{TaggedDrawing, TaggedPrimitive};

/// 只依赖图元类型与几何尺寸，同一输入总是得到同一标签。
pub fn classify(primitive: &Primitive, settings: &ClassifierConfig) -> LayerTag {
    let slot_max = settings.slot_max_size;
    match primitive {
        Primitive::Circle(_) => LayerTag::Drill,
        Primitive::Arc(arc) => {
            if arc.radius <= slot_max / 2.0 {
                LayerTag::Drill
            } else {
                LayerTag::Cut
            }
        }
        Primitive::Polyline(polyline) => {
            if !polyline.is_closed {
                return LayerTag::Cut;
            }
            match primitive.bounds() {
                Some(bounds) if bounds.width() <= slot_max && bounds.height() <= slot_max => {
                    debug!(
                        width = bounds.width(),
                        height = bounds.height(),
                        "发现小槽孔"
                    );
                    LayerTag::Drill
                }
                _ => LayerTag::Cut,
            }
        }
        Primitive::Line(_) => LayerTag::Cut,
        Primitive::Text(_) => LayerTag::Annotation,
        Primitive::Dimension(_) => LayerTag::Dimension,
    }
}

/// 对文档实体分类；不支持的实体类型直接报错。
pub fn classify_entity(
    id: EntityId,
    entity: &Entity,
    settings: &ClassifierConfig,
) -> Result<LayerTag, EngineError> {
    match entity {
        Entity::Primitive(primitive) => Ok(classify(primitive, settings)),
        Entity::Unsupported(unsupported) => Err(EngineError::UnsupportedEntity {
            kind: unsupported.kind.clone(),
            id: id.get(),
        }),
    }
}

/// 按输入顺序分类整份文档，遇到第一个不支持的实体即终止。
pub fn classify_document(
    document: &Document,
    settings: &ClassifierConfig,
) -> Result<TaggedDrawing, EngineError> {
    let mut items = Vec::with_capacity(document.entity_count());
    for (id, entity) in document.entities() {
        let tag = classify_entity(*id, &entity.entity, settings)?;
        let Entity::Primitive(primitive) = &entity.entity else {
            continue;
        };
        items.push(TaggedPrimitive {
            id: *id,
            tag,
            primitive: primitive.clone(),
            color: entity.color,
        });
    }
    let drawing = TaggedDrawing::from_items(items);
    for tag in LayerTag::ALL {
        let count = drawing.count_tag(tag);
        if count > 0 {
            debug!(layer = %tag, count, "分类结果");
        }
    }
    Ok(drawing)
}

/// 一组数值的最小、最大与平均值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { min, max, avg })
    }
}

/// 输入图纸的统计信息，处理前输出到日志。
#[derive(Debug, Clone, Default)]
pub struct InputStatistics {
    pub kinds: BTreeMap<String, usize>,
    pub radii: Vec<f64>,
    pub line_lengths: Vec<f64>,
    pub polyline_widths: Vec<f64>,
    pub polyline_heights: Vec<f64>,
    pub text_heights: Vec<f64>,
}

impl InputStatistics {
    pub fn collect(document: &Document) -> Self {
        let mut stats = Self::default();
        for (_, entity) in document.entities() {
            *stats.kinds.entry(entity.entity.kind().to_string()).or_default() += 1;
            let Entity::Primitive(primitive) = &entity.entity else {
                continue;
            };
            match primitive {
                Primitive::Circle(circle) => stats.radii.push(circle.radius),
                Primitive::Arc(arc) => stats.radii.push(arc.radius),
                Primitive::Line(line) => stats.line_lengths.push(line.length()),
                Primitive::Polyline(_) => {
                    if let Some(bounds) = primitive.bounds() {
                        stats.polyline_widths.push(bounds.width());
                        stats.polyline_heights.push(bounds.height());
                    }
                }
                Primitive::Text(text) => stats.text_heights.push(text.height),
                Primitive::Dimension(_) => {}
            }
        }
        stats
    }

    pub fn log(&self) {
        for (kind, count) in &self.kinds {
            info!(kind = %kind, count, "输入实体");
        }
        let groups = [
            ("radius", &self.radii),
            ("line_length", &self.line_lengths),
            ("polyline_width", &self.polyline_widths),
            ("polyline_height", &self.polyline_heights),
            ("text_height", &self.text_heights),
        ];
        for (name, values) in groups {
            if let Some(summary) = Summary::of(values) {
                info!(
                    metric = name,
                    min = summary.min,
                    max = summary.max,
                    avg = summary.avg,
                    "输入尺寸统计"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelcut_core::geometry::Point2;
    use panelcut_core::primitive::{Arc, Circle, Line, Polyline, Text};

    fn settings() -> ClassifierConfig {
        ClassifierConfig::default()
    }

    fn rectangle(width: f64, height: f64, closed: bool) -> Primitive {
        Primitive::Polyline(Polyline::new(
            [
                Point2::new(0.0, 0.0),
                Point2::new(width, 0.0),
                Point2::new(width, height),
                Point2::new(0.0, height),
            ],
            closed,
        ))
    }

    #[test]
    fn circles_and_small_arcs_are_drilled() {
        let circle = Primitive::Circle(Circle::new(Point2::new(0.0, 0.0), 40.0));
        assert_eq!(classify(&circle, &settings()), LayerTag::Drill);

        let small = Primitive::Arc(Arc::new(Point2::new(0.0, 0.0), 5.0, 0.0, 1.0));
        let large = Primitive::Arc(Arc::new(Point2::new(0.0, 0.0), 5.01, 0.0, 1.0));
        assert_eq!(classify(&small, &settings()), LayerTag::Drill);
        assert_eq!(classify(&large, &settings()), LayerTag::Cut);
    }

    #[test]
    fn polylines_depend_on_closure_and_size() {
        assert_eq!(classify(&rectangle(8.0, 4.0, true), &settings()), LayerTag::Drill);
        assert_eq!(classify(&rectangle(10.0, 10.0, true), &settings()), LayerTag::Drill);
        assert_eq!(classify(&rectangle(8.0, 4.0, false), &settings()), LayerTag::Cut);
        assert_eq!(classify(&rectangle(300.0, 4.0, true), &settings()), LayerTag::Cut);
    }

    #[test]
    fn lines_and_text_follow_their_kind() {
        let line = Primitive::Line(Line::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)));
        let text = Primitive::Text(Text::new(Point2::new(0.0, 0.0), "A", 2.5));
        assert_eq!(classify(&line, &settings()), LayerTag::Cut);
        assert_eq!(classify(&text, &settings()), LayerTag::Annotation);
    }

    #[test]
    fn classification_is_repeatable() {
        let inputs = [
            rectangle(8.0, 4.0, true),
            Primitive::Arc(Arc::new(Point2::new(1.0, 1.0), 3.0, 0.5, 2.0)),
            Primitive::Line(Line::new(Point2::new(0.0, 0.0), Point2::new(5.0, 0.0))),
        ];
        for primitive in &inputs {
            assert_eq!(
                classify(primitive, &settings()),
                classify(primitive, &settings())
            );
        }
    }

    #[test]
    fn larger_slot_threshold_changes_result() {
        let wide = ClassifierConfig { slot_max_size: 20.0 };
        let arc = Primitive::Arc(Arc::new(Point2::new(0.0, 0.0), 8.0, 0.0, 1.0));
        assert_eq!(classify(&arc, &settings()), LayerTag::Cut);
        assert_eq!(classify(&arc, &wide), LayerTag::Drill);
    }

    #[test]
    fn unsupported_entity_is_fatal() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "0");
        doc.add_unsupported("SPLINE", "CURVES");

        let err = classify_document(&doc, &settings()).unwrap_err();
        match err {
            EngineError::UnsupportedEntity { kind, id } => {
                assert_eq!(kind, "SPLINE");
                assert_eq!(id, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn document_order_and_colors_are_kept() {
        let mut doc = Document::new();
        doc.add_circle(Point2::new(5.0, 5.0), 2.0, "HOLES");
        doc.add_primitive(
            Primitive::Line(Line::new(Point2::new(0.0, 0.0), Point2::new(9.0, 0.0))),
            "OUTLINE",
            Some(3),
        );

        let drawing = classify_document(&doc, &settings()).expect("classify");
        let tags: Vec<_> = drawing.iter().map(|item| item.tag).collect();
        assert_eq!(tags, vec![LayerTag::Drill, LayerTag::Cut]);
        assert_eq!(drawing.items()[1].color, Some(3));
    }

    #[test]
    fn statistics_cover_each_kind() {
        let mut doc = Document::new();
        doc.add_circle(Point2::new(0.0, 0.0), 4.0, "0");
        doc.add_arc(Point2::new(0.0, 0.0), 2.0, 0.0, 1.0, "0");
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0), "0");
        doc.add_text(Point2::new(0.0, 0.0), "X", 2.5, "0");

        let stats = InputStatistics::collect(&doc);
        assert_eq!(stats.kinds.get("CIRCLE"), Some(&1));
        assert_eq!(stats.kinds.get("TEXT"), Some(&1));
        let radii = Summary::of(&stats.radii).expect("radii");
        assert!((radii.min - 2.0).abs() < 1e-12);
        assert!((radii.max - 4.0).abs() < 1e-12);
        assert!((radii.avg - 3.0).abs() < 1e-12);
        assert!((stats.line_lengths[0] - 5.0).abs() < 1e-12);
        assert!(Summary::of(&stats.polyline_widths).is_none());
    }
}
