pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，保持双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        /// 两点在绝对容差内视为重合。
        #[inline]
        pub fn is_close(self, other: Point2, tolerance: f64) -> bool {
            self.distance(other) <= tolerance
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        /// 点集的几何中心（算术平均），空集返回 None。
        pub fn centroid(points: &[Point2]) -> Option<Point2> {
            if points.is_empty() {
                return None;
            }
            let sum = points
                .iter()
                .fold(DVec2::ZERO, |acc, point| acc + point.as_vec2());
            Some(Self(sum / points.len() as f64))
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        /// 给定角度（弧度）的单位向量。
        #[inline]
        pub fn from_angle(angle: f64) -> Self {
            Self(DVec2::new(angle.cos(), angle.sin()))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维向量，孔位记录的法向量使用。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框。非空时保证 min <= max。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        /// 由任意两个角点构造，自动排序分量。
        pub fn from_corners(a: Point2, b: Point2) -> Self {
            Self {
                min: Point2::from_vec(a.as_vec2().min(b.as_vec2())),
                max: Point2::from_vec(a.as_vec2().max(b.as_vec2())),
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        /// 四个分量全部为 0 的退化范围，视为“没有几何”。
        #[inline]
        pub fn is_zero(&self) -> bool {
            self.min.x() == 0.0 && self.min.y() == 0.0 && self.max.x() == 0.0 && self.max.y() == 0.0
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn min_x(&self) -> f64 {
            self.min.x()
        }

        #[inline]
        pub fn min_y(&self) -> f64 {
            self.min.y()
        }

        #[inline]
        pub fn max_x(&self) -> f64 {
            self.max.x()
        }

        #[inline]
        pub fn max_y(&self) -> f64 {
            self.max.y()
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }

        /// 点是否落在范围内（含边界，带容差）。
        pub fn contains(&self, point: Point2, tolerance: f64) -> bool {
            !self.is_empty()
                && point.x() >= self.min.x() - tolerance
                && point.x() <= self.max.x() + tolerance
                && point.y() >= self.min.y() - tolerance
                && point.y() <= self.max.y() + tolerance
        }
    }
}

pub mod primitive {
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2};

    /// 文字宽度估算系数：平均字符宽度约为字高的 0.7 倍。
    pub const TEXT_WIDTH_FACTOR: f64 = 0.7;

    /// 流水线处理的几何图元。新增变体时，分类、包围盒与重建中的 `match` 都必须同步更新。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Primitive {
        Line(Line),
        Arc(Arc),
        Circle(Circle),
        Polyline(Polyline),
        Text(Text),
        /// 线性标注：由标注布局生成，也可能来自输入图纸中的线性 DIMENSION。
        Dimension(LinearDimension),
    }

    impl Primitive {
        /// DXF 风格的类型名，用于日志与统计。
        pub fn kind(&self) -> &'static str {
            match self {
                Primitive::Line(_) => "LINE",
                Primitive::Arc(_) => "ARC",
                Primitive::Circle(_) => "CIRCLE",
                Primitive::Polyline(_) => "LWPOLYLINE",
                Primitive::Text(text) => {
                    if text.is_multiline {
                        "MTEXT"
                    } else {
                        "TEXT"
                    }
                }
                Primitive::Dimension(_) => "DIMENSION",
            }
        }

        /// 计算图元的 2D 轴对齐范围。没有顶点的多段线返回 None。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Primitive::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                Primitive::Circle(circle) => {
                    let radius = circle.radius.abs();
                    let center = circle.center;
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Primitive::Arc(arc) => arc_bounds(arc, &mut bounds),
                Primitive::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(vertex.position);
                    }
                }
                Primitive::Text(text) => text_bounds(text, &mut bounds),
                Primitive::Dimension(dimension) => dimension_bounds(dimension, &mut bounds),
            }
            if bounds.is_empty() {
                None
            } else {
                Some(bounds)
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
    }

    impl Line {
        #[inline]
        pub fn new(start: Point2, end: Point2) -> Self {
            Self { start, end }
        }

        #[inline]
        pub fn length(&self) -> f64 {
            self.start.distance(self.end)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
    }

    impl Circle {
        #[inline]
        pub fn new(center: Point2, radius: f64) -> Self {
            Self { center, radius }
        }
    }

    /// 圆弧，角度以弧度储存，逆时针为正方向。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    impl Arc {
        #[inline]
        pub fn new(center: Point2, radius: f64, start_angle: f64, end_angle: f64) -> Self {
            Self {
                center,
                radius,
                start_angle,
                end_angle,
            }
        }

        #[inline]
        pub fn start_point(&self) -> Point2 {
            arc_point(self.center, self.radius, self.start_angle)
        }

        #[inline]
        pub fn end_point(&self) -> Point2 {
            arc_point(self.center, self.radius, self.end_angle)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
    }

    impl Polyline {
        pub fn new<I>(points: I, is_closed: bool) -> Self
        where
            I: IntoIterator<Item = Point2>,
        {
            Self {
                vertices: points.into_iter().map(PolylineVertex::new).collect(),
                is_closed,
            }
        }

        /// 顶点坐标（忽略 bulge）。
        pub fn points(&self) -> Vec<Point2> {
            self.vertices.iter().map(|vertex| vertex.position).collect()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum TextAlignment {
        /// 插入点为文字左下角（DXF 默认）。
        #[default]
        BaselineLeft,
        /// 插入点为文字中心。
        MiddleCenter,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        #[serde(default)]
        pub alignment: TextAlignment,
        /// 来源为 MTEXT 记录。
        #[serde(default)]
        pub is_multiline: bool,
        /// 文字样式名；None 表示 Standard。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style: Option<String>,
    }

    impl Text {
        pub fn new(insert: Point2, content: impl Into<String>, height: f64) -> Self {
            Self {
                insert,
                content: content.into(),
                height,
                rotation: 0.0,
                alignment: TextAlignment::BaselineLeft,
                is_multiline: false,
                style: None,
            }
        }

        #[inline]
        pub fn centered(mut self) -> Self {
            self.alignment = TextAlignment::MiddleCenter;
            self
        }

        #[inline]
        pub fn with_style(mut self, style: impl Into<String>) -> Self {
            self.style = Some(style.into());
            self
        }

        /// 估算宽度：字符数 × 字高 × 0.7，并非字形精确值。
        pub fn estimated_width(&self) -> f64 {
            self.content.chars().count() as f64 * self.height * TEXT_WIDTH_FACTOR
        }
    }

    /// 线性标注：测量 `first` 到 `second` 在 `rotation` 方向上的投影距离，
    /// 尺寸线经过 `location`。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LinearDimension {
        pub first: Point2,
        pub second: Point2,
        pub location: Point2,
        pub rotation: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text: Option<String>,
    }

    impl LinearDimension {
        pub fn horizontal(first: Point2, second: Point2, location: Point2) -> Self {
            Self {
                first,
                second,
                location,
                rotation: 0.0,
                text: None,
            }
        }

        pub fn vertical(first: Point2, second: Point2, location: Point2) -> Self {
            Self {
                first,
                second,
                location,
                rotation: FRAC_PI_2,
                text: None,
            }
        }

        /// 测量值：两测量点在尺寸线方向上的投影长度。
        pub fn measurement(&self) -> f64 {
            let direction = Vector2::from_angle(self.rotation);
            self.first.vector_to(self.second).dot(direction).abs()
        }

        /// 尺寸线两端点（测量点投影到尺寸线上）。
        pub fn dimension_line(&self) -> (Point2, Point2) {
            let direction = Vector2::from_angle(self.rotation);
            let project = |point: Point2| {
                let along = self.location.vector_to(point).dot(direction);
                self.location.translate(direction.scale(along))
            };
            (project(self.first), project(self.second))
        }

        /// 标注文字中点，位于尺寸线中点。
        pub fn text_midpoint(&self) -> Point2 {
            let (a, b) = self.dimension_line();
            Point2::from_vec((a.as_vec2() + b.as_vec2()) * 0.5)
        }
    }

    pub fn normalize_angle(angle: f64) -> f64 {
        let mut result = angle % TAU;
        if result < 0.0 {
            result += TAU;
        }
        result
    }

    /// 规范化圆弧扫掠区间：起点落在 [0, 2π)，终点不小于起点；起止相同视为整圆。
    pub fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if (end - start).abs() < 1e-9 {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        (start, end)
    }

    pub fn arc_point(center: Point2, radius: f64, angle: f64) -> Point2 {
        let offset = Vector2::new(radius * angle.cos(), radius * angle.sin());
        center.translate(offset)
    }

    fn arc_bounds(arc: &Arc, bounds: &mut Bounds2D) {
        let radius = arc.radius.abs();
        if radius <= f64::EPSILON {
            bounds.include_point(arc.center);
            return;
        }

        let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
        bounds.include_point(arc_point(arc.center, radius, start));
        bounds.include_point(arc_point(arc.center, radius, end));

        // 端点之外，扫掠经过的轴向极值点同样决定范围。
        const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
        for base in QUADRANTS {
            let mut candidate = base;
            while candidate < start {
                candidate += TAU;
            }
            if candidate <= end {
                bounds.include_point(arc_point(arc.center, radius, candidate));
            }
        }
    }

    fn text_bounds(text: &Text, bounds: &mut Bounds2D) {
        let width = text.estimated_width();
        let height = text.height;
        let insert = text.insert;
        match text.alignment {
            TextAlignment::BaselineLeft => {
                bounds.include_point(insert);
                bounds.include_point(Point2::new(insert.x() + width, insert.y() + height));
            }
            TextAlignment::MiddleCenter => {
                bounds.include_point(Point2::new(
                    insert.x() - width / 2.0,
                    insert.y() - height / 2.0,
                ));
                bounds.include_point(Point2::new(
                    insert.x() + width / 2.0,
                    insert.y() + height / 2.0,
                ));
            }
        }
    }

    fn dimension_bounds(dimension: &LinearDimension, bounds: &mut Bounds2D) {
        bounds.include_point(dimension.first);
        bounds.include_point(dimension.second);
        bounds.include_point(dimension.location);
        let (a, b) = dimension.dimension_line();
        bounds.include_point(a);
        bounds.include_point(b);
    }

}

pub mod layer {
    use serde::{Deserialize, Serialize};

    /// 输出图纸的语义图层。每个图元在任一阶段恰好属于其中一个。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum LayerTag {
        Cut,
        Drill,
        DrillMark,
        Annotation,
        Dimension,
        /// 被重建结果取代的原始几何，仅保留审计用途，不参与范围计算。
        Deleted,
    }

    /// 图层外观：ACI 颜色、线型、线宽（0.01mm）与可见性。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayerStyle {
        pub color: i16,
        pub linetype: &'static str,
        pub lineweight: i16,
        pub visible: bool,
    }

    impl LayerTag {
        pub const ALL: [LayerTag; 6] = [
            LayerTag::Cut,
            LayerTag::Drill,
            LayerTag::DrillMark,
            LayerTag::Annotation,
            LayerTag::Dimension,
            LayerTag::Deleted,
        ];

        /// 写入 DXF 的图层名。
        pub fn layer_name(self) -> &'static str {
            match self {
                LayerTag::Cut => "CUT",
                LayerTag::Drill => "DRILL",
                LayerTag::DrillMark => "DRILL_MARKS",
                LayerTag::Annotation => "ANNOTATION",
                LayerTag::Dimension => "DIMENSION",
                LayerTag::Deleted => "DELETED",
            }
        }

        pub fn from_layer_name(name: &str) -> Option<Self> {
            Self::ALL
                .into_iter()
                .find(|tag| tag.layer_name().eq_ignore_ascii_case(name))
        }

        pub fn style(self) -> LayerStyle {
            let (color, lineweight, visible) = match self {
                LayerTag::Cut => (1, 53, true),
                LayerTag::Drill => (5, 53, true),
                LayerTag::DrillMark => (7, 25, true),
                LayerTag::Annotation => (7, 25, true),
                LayerTag::Dimension => (8, 25, true),
                LayerTag::Deleted => (30, 53, false),
            };
            LayerStyle {
                color,
                linetype: "CONTINUOUS",
                lineweight,
                visible,
            }
        }

        #[inline]
        pub fn is_deleted(self) -> bool {
            matches!(self, LayerTag::Deleted)
        }
    }

    impl std::fmt::Display for LayerTag {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.layer_name())
        }
    }
}

pub mod hole {
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Vector3};

    /// 外部孔位表中的一行。`z != 0` 表示侧面钻孔。
    ///
    /// `z` 保留原始值，侧孔判定与说明文字都基于它；孔位表中显示 [`HoleRecord::table_z`]。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct HoleRecord {
        pub panel_name: String,
        pub name: String,
        pub x: f64,
        pub y: f64,
        pub z: f64,
        pub diameter: f64,
        pub depth: f64,
        pub normal: Vector3,
    }

    impl HoleRecord {
        #[inline]
        pub fn position(&self) -> Point2 {
            Point2::new(self.x, self.y)
        }

        #[inline]
        pub fn is_side_drilled(&self) -> bool {
            self.z != 0.0
        }

        /// 保留两位小数的 z，负零归一为零。
        pub fn table_z(&self) -> f64 {
            (self.z * 100.0).round() / 100.0 + 0.0
        }

        /// 孔位说明文字，例如 `d8 h12`，侧孔附带 z：`d8 h12 z9.5`。
        pub fn label(&self) -> String {
            if self.is_side_drilled() {
                format!("d{} h{} z{}", self.diameter, self.depth, self.z)
            } else {
                format!("d{} h{}", self.diameter, self.depth)
            }
        }
    }
}

pub mod document {
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2};
    use crate::layer::LayerTag;
    use crate::primitive::{Arc, Circle, Line, Polyline, Primitive, Text};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub color: i16,
        pub linetype: String,
        pub lineweight: Option<i16>,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                color: 7,
                linetype: "CONTINUOUS".to_string(),
                lineweight: None,
                is_visible: true,
            }
        }

        pub fn for_tag(tag: LayerTag) -> Self {
            let style = tag.style();
            Self {
                name: tag.layer_name().to_string(),
                color: style.color,
                linetype: style.linetype.to_string(),
                lineweight: Some(style.lineweight),
                is_visible: style.visible,
            }
        }
    }

    /// 文字样式：名称与字体文件。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TextStyle {
        pub name: String,
        pub font: String,
    }

    impl TextStyle {
        pub fn new(name: impl Into<String>, font: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                font: font.into(),
            }
        }
    }

    /// 读取到但不在支持范围内的实体，只记录类型名。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct UnsupportedEntity {
        pub kind: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Entity {
        Primitive(Primitive),
        Unsupported(UnsupportedEntity),
    }

    impl Entity {
        pub fn kind(&self) -> &str {
            match self {
                Entity::Primitive(primitive) => primitive.kind(),
                Entity::Unsupported(unsupported) => &unsupported.kind,
            }
        }

        #[inline]
        pub fn as_primitive(&self) -> Option<&Primitive> {
            match self {
                Entity::Primitive(primitive) => Some(primitive),
                Entity::Unsupported(_) => None,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct DocumentEntity {
        pub layer: String,
        /// 实体自身的 ACI 颜色；None 表示随层。
        pub color: Option<i16>,
        pub entity: Entity,
    }

    /// 输出视口：模型空间中心与可视高度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct ViewFit {
        pub center: Point2,
        pub height: f64,
        pub aspect_ratio: f64,
    }

    /// 图纸容器：版本、有序图层表、有序实体表。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        version: Option<String>,
        layers: Vec<Layer>,
        #[serde(default)]
        text_styles: Vec<TextStyle>,
        entities: Vec<(EntityId, DocumentEntity)>,
        next_entity_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extents: Option<Bounds2D>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        view: Option<ViewFit>,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        #[inline]
        pub fn version(&self) -> Option<&str> {
            self.version.as_deref()
        }

        #[inline]
        pub fn set_version(&mut self, version: impl Into<String>) {
            self.version = Some(version.into());
        }

        /// 确保图层存在，缺失时以默认样式创建。
        pub fn ensure_layer(&mut self, name: impl AsRef<str>) -> &mut Layer {
            let key = name.as_ref();
            let index = match self.layers.iter().position(|layer| layer.name == key) {
                Some(index) => index,
                None => {
                    self.layers.push(Layer::new(key));
                    self.layers.len() - 1
                }
            };
            &mut self.layers[index]
        }

        /// 定义图层样式；已存在的同名图层会被覆盖。
        pub fn define_layer(&mut self, layer: Layer) {
            match self.layers.iter_mut().find(|existing| existing.name == layer.name) {
                Some(existing) => *existing = layer,
                None => self.layers.push(layer),
            }
        }

        /// 定义文字样式；同名样式会被覆盖。
        pub fn define_text_style(&mut self, style: TextStyle) {
            match self
                .text_styles
                .iter_mut()
                .find(|existing| existing.name == style.name)
            {
                Some(existing) => *existing = style,
                None => self.text_styles.push(style),
            }
        }

        #[inline]
        pub fn text_styles(&self) -> impl Iterator<Item = &TextStyle> {
            self.text_styles.iter()
        }

        pub fn add_primitive(
            &mut self,
            primitive: Primitive,
            layer: impl Into<String>,
            color: Option<i16>,
        ) -> EntityId {
            self.add_entity(DocumentEntity {
                layer: layer.into(),
                color,
                entity: Entity::Primitive(primitive),
            })
        }

        pub fn add_unsupported(&mut self, kind: impl Into<String>, layer: impl Into<String>) -> EntityId {
            self.add_entity(DocumentEntity {
                layer: layer.into(),
                color: None,
                entity: Entity::Unsupported(UnsupportedEntity { kind: kind.into() }),
            })
        }

        pub fn add_entity(&mut self, entity: DocumentEntity) -> EntityId {
            self.ensure_layer(&entity.layer);
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn add_line(&mut self, start: Point2, end: Point2, layer: impl Into<String>) -> EntityId {
            self.add_primitive(Primitive::Line(Line::new(start, end)), layer, None)
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_primitive(Primitive::Circle(Circle::new(center, radius)), layer, None)
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_primitive(
                Primitive::Arc(Arc::new(center, radius, start_angle, end_angle)),
                layer,
                None,
            )
        }

        pub fn add_polyline<I>(&mut self, points: I, is_closed: bool, layer: impl Into<String>) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            self.add_primitive(
                Primitive::Polyline(Polyline::new(points, is_closed)),
                layer,
                None,
            )
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_primitive(Primitive::Text(Text::new(insert, content, height)), layer, None)
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.iter()
        }

        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.iter().find(|layer| layer.name == name)
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, DocumentEntity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        pub fn entity(&self, id: EntityId) -> Option<&DocumentEntity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        /// 全部受支持实体的范围，不区分图层。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.entity.as_primitive().and_then(Primitive::bounds) {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        #[inline]
        pub fn extents(&self) -> Option<Bounds2D> {
            self.extents
        }

        #[inline]
        pub fn set_extents(&mut self, extents: Bounds2D) {
            self.extents = Some(extents);
        }

        #[inline]
        pub fn view(&self) -> Option<ViewFit> {
            self.view
        }

        #[inline]
        pub fn set_view(&mut self, view: ViewFit) {
            self.view = Some(view);
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::f64::consts::FRAC_PI_2;

        #[test]
        fn document_stores_entities_in_order() {
            let mut doc = Document::new();
            let line = doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");
            let circle = doc.add_circle(Point2::new(5.0, 5.0), 2.0, "HOLES");
            let arc = doc.add_arc(Point2::new(5.0, 0.0), 3.5, 0.0, FRAC_PI_2, "GEOM");
            let unsupported = doc.add_unsupported("SPLINE", "GEOM");

            assert_eq!(line.get(), 0);
            assert_eq!(circle.get(), 1);
            assert_eq!(arc.get(), 2);
            assert_eq!(unsupported.get(), 3);

            let layers: Vec<_> = doc.layers().map(|l| l.name.clone()).collect();
            assert_eq!(layers, vec!["0", "HOLES", "GEOM"]);
            assert_eq!(doc.entity_count(), 4);

            match doc.entity(arc).map(|e| &e.entity) {
                Some(Entity::Primitive(Primitive::Arc(arc))) => {
                    assert!((arc.radius - 3.5).abs() < f64::EPSILON);
                }
                other => panic!("unexpected entity lookup result: {other:?}"),
            }
            assert_eq!(doc.entity(unsupported).unwrap().entity.kind(), "SPLINE");

            let bounds = doc.bounds().expect("document bounds should exist");
            assert!((bounds.min_x() - 0.0).abs() < 1e-9);
            assert!((bounds.max_x() - 10.0).abs() < 1e-9);
            assert!((bounds.max_y() - 7.0).abs() < 1e-9);
        }

        #[test]
        fn define_layer_overrides_existing_style() {
            let mut doc = Document::new();
            doc.ensure_layer("DELETED");
            doc.define_layer(Layer::for_tag(LayerTag::Deleted));
            let layer = doc.layer("DELETED").unwrap();
            assert_eq!(layer.color, 30);
            assert!(!layer.is_visible);
            assert_eq!(doc.layers().filter(|l| l.name == "DELETED").count(), 1);
        }

        #[test]
        fn layer_tags_round_trip_names() {
            for tag in LayerTag::ALL {
                assert_eq!(LayerTag::from_layer_name(tag.layer_name()), Some(tag));
            }
            assert_eq!(LayerTag::from_layer_name("drill_marks"), Some(LayerTag::DrillMark));
            assert_eq!(LayerTag::from_layer_name("0"), None);
        }
    }
}
