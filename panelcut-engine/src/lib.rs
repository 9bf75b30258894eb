pub mod bounds;
pub mod classify;
pub mod layout;
pub mod pipeline;
pub mod reconstruct;
pub mod report;

pub use pipeline::{TransformOptions, TransformSummary, transform};

pub mod errors {
    use std::path::PathBuf;

    use panelcut_core::layer::LayerTag;
    use panelcut_io::IoError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("unsupported entity {kind} (id {id})")]
        UnsupportedEntity { kind: String, id: u64 },
        #[error("no geometry available for bounds on {}", describe_layers(.layers))]
        NoGeometry { layers: Option<Vec<LayerTag>> },
        #[error(transparent)]
        Load(#[from] IoError),
        #[error("failed to emit {path:?}: {reason}")]
        EmissionFailure { path: PathBuf, reason: String },
    }

    fn describe_layers(layers: &Option<Vec<LayerTag>>) -> String {
        match layers {
            None => "all layers".to_string(),
            Some(tags) => tags
                .iter()
                .map(|tag| tag.layer_name())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

pub mod model {
    use panelcut_core::document::EntityId;
    use panelcut_core::geometry::Bounds2D;
    use panelcut_core::layer::LayerTag;
    use panelcut_core::primitive::Primitive;

    /// 流水线中流转的单元：图元及其目标图层。
    #[derive(Debug, Clone, PartialEq)]
    pub struct TaggedPrimitive {
        pub id: EntityId,
        pub tag: LayerTag,
        pub primitive: Primitive,
        /// 实体颜色覆盖；None 表示随层。
        pub color: Option<i16>,
    }

    impl TaggedPrimitive {
        /// 以新的图层标签复制一份，原值保持不变。
        pub fn retagged(&self, tag: LayerTag) -> Self {
            Self {
                tag,
                ..self.clone()
            }
        }

        #[inline]
        pub fn bounds(&self) -> Option<Bounds2D> {
            self.primitive.bounds()
        }
    }

    /// 按输出顺序排列的带标签图元集合，负责为派生图元分配编号。
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct TaggedDrawing {
        items: Vec<TaggedPrimitive>,
        next_id: u64,
    }

    impl TaggedDrawing {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn from_items(items: Vec<TaggedPrimitive>) -> Self {
            let next_id = items
                .iter()
                .map(|item| item.id.get() + 1)
                .max()
                .unwrap_or(0);
            Self { items, next_id }
        }

        /// 追加一个派生图元并返回其编号。
        pub fn push(&mut self, tag: LayerTag, primitive: Primitive, color: Option<i16>) -> EntityId {
            let id = EntityId::new(self.next_id);
            self.next_id += 1;
            self.items.push(TaggedPrimitive {
                id,
                tag,
                primitive,
                color,
            });
            id
        }

        /// 保留原编号追加；用于重建阶段复制已有图元。
        pub fn push_item(&mut self, item: TaggedPrimitive) {
            self.next_id = self.next_id.max(item.id.get() + 1);
            self.items.push(item);
        }

        #[inline]
        pub fn items(&self) -> &[TaggedPrimitive] {
            &self.items
        }

        #[inline]
        pub fn iter(&self) -> std::slice::Iter<'_, TaggedPrimitive> {
            self.items.iter()
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.items.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }

        pub fn count_tag(&self, tag: LayerTag) -> usize {
            self.items.iter().filter(|item| item.tag == tag).count()
        }

        /// 复制一份空集合，沿用编号计数，供后续阶段构建新结果。
        pub(crate) fn empty_like(&self) -> Self {
            Self {
                items: Vec::with_capacity(self.items.len()),
                next_id: self.next_id,
            }
        }
    }

    impl<'a> IntoIterator for &'a TaggedDrawing {
        type Item = &'a TaggedPrimitive;
        type IntoIter = std::slice::Iter<'a, TaggedPrimitive>;

        fn into_iter(self) -> Self::IntoIter {
            self.items.iter()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use panelcut_core::geometry::Point2;
        use panelcut_core::primitive::Line;

        fn line() -> Primitive {
            Primitive::Line(Line::new(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)))
        }

        #[test]
        fn derived_ids_continue_after_inputs() {
            let input = TaggedPrimitive {
                id: EntityId::new(4),
                tag: LayerTag::Cut,
                primitive: line(),
                color: None,
            };
            let mut drawing = TaggedDrawing::from_items(vec![input]);
            let id = drawing.push(LayerTag::Annotation, line(), None);
            assert_eq!(id.get(), 5);
            assert_eq!(drawing.count_tag(LayerTag::Cut), 1);
        }

        #[test]
        fn retag_keeps_original() {
            let item = TaggedPrimitive {
                id: EntityId::new(0),
                tag: LayerTag::Cut,
                primitive: line(),
                color: Some(3),
            };
            let deleted = item.retagged(LayerTag::Deleted);
            assert_eq!(item.tag, LayerTag::Cut);
            assert_eq!(deleted.tag, LayerTag::Deleted);
            assert_eq!(deleted.color, Some(3));
            assert_eq!(deleted.id, item.id);
        }
    }
}
