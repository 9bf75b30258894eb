use panelcut_core::geometry::Bounds2D;
use panelcut_core::layer::LayerTag;
use tracing::debug;

use crate::errors::EngineError;
use crate::model::TaggedPrimitive;

/// 汇总图元范围。DELETED 图元与退化为原点的范围不参与计算；
/// `layers` 为 Some 时只统计所列图层。
pub fn aggregate_bounds<'a, I>(items: I, layers: Option<&[LayerTag]>) -> Result<Bounds2D, EngineError>
where
    I: IntoIterator<Item = &'a TaggedPrimitive>,
{
    let mut total = Bounds2D::empty();
    let mut contributing = 0usize;
    for item in items {
        if item.tag.is_deleted() {
            continue;
        }
        if let Some(filter) = layers {
            if !filter.contains(&item.tag) {
                continue;
            }
        }
        let Some(bounds) = item.bounds() else {
            continue;
        };
        if bounds.is_zero() {
            continue;
        }
        total.include_bounds(&bounds);
        contributing += 1;
    }

    debug!(contributing, layers = ?layers, "汇总范围");
    if contributing == 0 {
        return Err(EngineError::NoGeometry {
            layers: layers.map(<[LayerTag]>::to_vec),
        });
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelcut_core::document::EntityId;
    use panelcut_core::geometry::Point2;
    use panelcut_core::primitive::{Circle, Line, Primitive};

    fn item(id: u64, tag: LayerTag, primitive: Primitive) -> TaggedPrimitive {
        TaggedPrimitive {
            id: EntityId::new(id),
            tag,
            primitive,
            color: None,
        }
    }

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Primitive {
        Primitive::Line(Line::new(Point2::new(x0, y0), Point2::new(x1, y1)))
    }

    #[test]
    fn empty_set_has_no_geometry() {
        let items: Vec<TaggedPrimitive> = Vec::new();
        let err = aggregate_bounds(&items, None).unwrap_err();
        assert!(matches!(err, EngineError::NoGeometry { layers: None }));
    }

    #[test]
    fn deleted_only_set_has_no_geometry() {
        let items = vec![
            item(0, LayerTag::Deleted, line(0.0, 0.0, 10.0, 10.0)),
            item(1, LayerTag::Deleted, line(5.0, 5.0, 20.0, 0.0)),
        ];
        assert!(matches!(
            aggregate_bounds(&items, None),
            Err(EngineError::NoGeometry { .. })
        ));
    }

    #[test]
    fn zero_bounds_and_deleted_items_are_skipped() {
        let items = vec![
            item(0, LayerTag::Cut, line(0.0, 0.0, 0.0, 0.0)),
            item(1, LayerTag::Deleted, line(-50.0, -50.0, 0.0, 0.0)),
            item(
                2,
                LayerTag::Drill,
                Primitive::Circle(Circle::new(Point2::new(10.0, 10.0), 2.0)),
            ),
        ];
        let bounds = aggregate_bounds(&items, None).expect("bounds");
        assert!((bounds.min_x() - 8.0).abs() < 1e-12);
        assert!((bounds.max_y() - 12.0).abs() < 1e-12);
    }

    #[test]
    fn layer_filter_limits_contributors() {
        let items = vec![
            item(0, LayerTag::Cut, line(0.0, 0.0, 300.0, 200.0)),
            item(1, LayerTag::Annotation, line(-40.0, 0.0, 400.0, 260.0)),
        ];
        let cut = aggregate_bounds(&items, Some(&[LayerTag::Cut][..])).expect("cut bounds");
        assert!((cut.width() - 300.0).abs() < 1e-12);

        let all = aggregate_bounds(&items, None).expect("all bounds");
        assert!((all.width() - 440.0).abs() < 1e-12);

        let err = aggregate_bounds(&items, Some(&[LayerTag::Dimension][..])).unwrap_err();
        assert_eq!(err.to_string(), "no geometry available for bounds on DIMENSION");
    }
}
