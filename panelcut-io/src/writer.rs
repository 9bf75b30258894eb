//! ASCII DXF (R2000) 写出。

use std::f64::consts::FRAC_PI_2;
use std::fmt::Display;

use panelcut_core::{
    document::{Document, Entity, Layer, TextStyle},
    geometry::{Point2, Vector2},
    primitive::{Line, LinearDimension, Primitive, Text, TextAlignment},
};

use crate::IoError;

/// 写出的 DXF 版本。LWPOLYLINE 需要 R2000 及以上。
pub const OUTPUT_VERSION: &str = "AC1015";

/// `$INSUNITS` 取值：毫米。
const UNITS_MILLIMETERS: i32 = 4;

/// 标注块内文字高度与间隙，取 Standard 标注样式的默认值。
const DIMENSION_TEXT_HEIGHT: f64 = 2.5;
const DIMENSION_TEXT_GAP: f64 = 0.625;
/// 延伸线：离开测量点的间隙与超出尺寸线的长度。
const EXTENSION_OFFSET: f64 = 0.625;
const EXTENSION_BEYOND: f64 = 1.25;

const LAYOUT_BLOCKS: [&str; 2] = ["*Model_Space", "*Paper_Space"];

/// 组码-值对缓冲区，句柄按十六进制顺序分配。
struct DxfWriter {
    output: Vec<String>,
    handle_counter: u64,
}

impl DxfWriter {
    fn new() -> Self {
        Self {
            output: Vec::new(),
            handle_counter: 100,
        }
    }

    fn new_handle(&mut self) -> String {
        let handle = format!("{:X}", self.handle_counter);
        self.handle_counter += 1;
        handle
    }

    fn write_pair(&mut self, code: i32, value: impl Display) {
        self.output.push(format!("{:>3}", code));
        self.output.push(value.to_string());
    }

    fn write_handle(&mut self) {
        let handle = self.new_handle();
        self.write_pair(5, handle);
    }

    fn write_point(&mut self, base_code: i32, point: Point2) {
        self.write_pair(base_code, point.x());
        self.write_pair(base_code + 10, point.y());
        self.write_pair(base_code + 20, 0.0);
    }

    fn begin_section(&mut self, name: &str) {
        self.write_pair(0, "SECTION");
        self.write_pair(2, name);
    }

    fn end_section(&mut self) {
        self.write_pair(0, "ENDSEC");
    }

    fn begin_table(&mut self, name: &str, count: usize) {
        self.write_pair(0, "TABLE");
        self.write_pair(2, name);
        self.write_handle();
        self.write_pair(100, "AcDbSymbolTable");
        self.write_pair(70, count);
    }

    fn end_table(&mut self) {
        self.write_pair(0, "ENDTAB");
    }

    fn append(&mut self, other: DxfWriter) {
        self.output.extend(other.output);
    }

    fn finish(mut self) -> String {
        self.write_pair(0, "EOF");
        let mut text = self.output.join("\n");
        text.push('\n');
        text
    }
}

/// 将文档完整渲染为 DXF 文本。遇到不支持的实体时整体失败，不产生部分输出。
///
/// 每个线性标注附带一个匿名块 `*D<n>`，内含尺寸线、延伸线与测量文字，
/// 不重新生成标注的读取端据此显示。
pub fn render_document(document: &Document) -> Result<String, IoError> {
    let dimensions: Vec<(&str, &LinearDimension)> = document
        .entities()
        .filter_map(|(_, entity)| match &entity.entity {
            Entity::Primitive(Primitive::Dimension(dimension)) => {
                Some((entity.layer.as_str(), dimension))
            }
            _ => None,
        })
        .collect();

    // 先写表、块与实体以确定句柄总数，再补写 HEADER 的 $HANDSEED。
    let mut body = DxfWriter::new();
    write_tables(&mut body, document, dimensions.len());
    write_blocks(&mut body, &dimensions);
    write_entities(&mut body, document)?;
    let handle_seed = format!("{:X}", body.handle_counter);

    let mut writer = DxfWriter::new();
    write_header(&mut writer, document, &handle_seed);
    writer.append(body);
    Ok(writer.finish())
}

fn write_header(writer: &mut DxfWriter, document: &Document, handle_seed: &str) {
    writer.begin_section("HEADER");
    writer.write_pair(9, "$ACADVER");
    writer.write_pair(1, OUTPUT_VERSION);
    writer.write_pair(9, "$HANDSEED");
    writer.write_pair(5, handle_seed);
    writer.write_pair(9, "$INSUNITS");
    writer.write_pair(70, UNITS_MILLIMETERS);
    if let Some(extents) = document.extents() {
        writer.write_pair(9, "$EXTMIN");
        writer.write_point(10, extents.min());
        writer.write_pair(9, "$EXTMAX");
        writer.write_point(10, extents.max());
    }
    writer.end_section();
}

fn dimension_block_name(index: usize) -> String {
    format!("*D{index}")
}

fn write_tables(writer: &mut DxfWriter, document: &Document, dimension_count: usize) {
    writer.begin_section("TABLES");

    writer.begin_table("VPORT", 1);
    writer.write_pair(0, "VPORT");
    writer.write_handle();
    writer.write_pair(100, "AcDbSymbolTableRecord");
    writer.write_pair(100, "AcDbViewportTableRecord");
    writer.write_pair(2, "*ACTIVE");
    writer.write_pair(70, 0);
    writer.write_pair(10, 0.0);
    writer.write_pair(20, 0.0);
    writer.write_pair(11, 1.0);
    writer.write_pair(21, 1.0);
    match document.view() {
        Some(view) => {
            writer.write_pair(12, view.center.x());
            writer.write_pair(22, view.center.y());
            writer.write_pair(40, view.height);
            writer.write_pair(41, view.aspect_ratio);
        }
        None => {
            writer.write_pair(12, 0.0);
            writer.write_pair(22, 0.0);
            writer.write_pair(40, 100.0);
            writer.write_pair(41, 1.0);
        }
    }
    writer.end_table();

    writer.begin_table("LTYPE", 1);
    writer.write_pair(0, "LTYPE");
    writer.write_handle();
    writer.write_pair(100, "AcDbSymbolTableRecord");
    writer.write_pair(100, "AcDbLinetypeTableRecord");
    writer.write_pair(2, "CONTINUOUS");
    writer.write_pair(70, 0);
    writer.write_pair(3, "Solid line");
    writer.write_pair(72, 65);
    writer.write_pair(73, 0);
    writer.write_pair(40, 0.0);
    writer.end_table();

    let layers: Vec<&Layer> = document.layers().collect();
    writer.begin_table("LAYER", layers.len());
    for layer in layers {
        write_layer(writer, layer);
    }
    writer.end_table();

    let mut styles = vec![TextStyle::new("Standard", "txt")];
    for style in document.text_styles() {
        match styles.iter_mut().find(|existing| existing.name == style.name) {
            Some(existing) => *existing = style.clone(),
            None => styles.push(style.clone()),
        }
    }
    writer.begin_table("STYLE", styles.len());
    for style in &styles {
        writer.write_pair(0, "STYLE");
        writer.write_handle();
        writer.write_pair(100, "AcDbSymbolTableRecord");
        writer.write_pair(100, "AcDbTextStyleTableRecord");
        writer.write_pair(2, &style.name);
        writer.write_pair(70, 0);
        writer.write_pair(40, 0.0);
        writer.write_pair(41, 1.0);
        writer.write_pair(3, &style.font);
    }
    writer.end_table();

    writer.begin_table("BLOCK_RECORD", LAYOUT_BLOCKS.len() + dimension_count);
    let block_names = LAYOUT_BLOCKS
        .iter()
        .map(|name| name.to_string())
        .chain((1..=dimension_count).map(dimension_block_name));
    for name in block_names {
        writer.write_pair(0, "BLOCK_RECORD");
        writer.write_handle();
        writer.write_pair(100, "AcDbSymbolTableRecord");
        writer.write_pair(100, "AcDbBlockTableRecord");
        writer.write_pair(2, name);
    }
    writer.end_table();

    writer.end_section();
}

fn write_blocks(writer: &mut DxfWriter, dimensions: &[(&str, &LinearDimension)]) {
    writer.begin_section("BLOCKS");
    for name in LAYOUT_BLOCKS {
        begin_block(writer, name, "0", 0);
        end_block(writer, "0");
    }
    for (index, (layer, dimension)) in dimensions.iter().enumerate() {
        // 匿名块标志 1。
        begin_block(writer, &dimension_block_name(index + 1), layer, 1);
        for primitive in dimension_block_content(dimension) {
            write_primitive(writer, layer, None, &primitive, None);
        }
        end_block(writer, layer);
    }
    writer.end_section();
}

fn begin_block(writer: &mut DxfWriter, name: &str, layer: &str, flags: i32) {
    writer.write_pair(0, "BLOCK");
    writer.write_handle();
    writer.write_pair(100, "AcDbEntity");
    writer.write_pair(8, layer);
    writer.write_pair(100, "AcDbBlockBegin");
    writer.write_pair(2, name);
    writer.write_pair(70, flags);
    writer.write_point(10, Point2::new(0.0, 0.0));
    writer.write_pair(3, name);
    writer.write_pair(1, "");
}

fn end_block(writer: &mut DxfWriter, layer: &str) {
    writer.write_pair(0, "ENDBLK");
    writer.write_handle();
    writer.write_pair(100, "AcDbEntity");
    writer.write_pair(8, layer);
    writer.write_pair(100, "AcDbBlockEnd");
}

/// 标注的可见几何：尺寸线、两条延伸线与尺寸线上方的测量文字。
fn dimension_block_content(dimension: &LinearDimension) -> Vec<Primitive> {
    let (start, end) = dimension.dimension_line();
    let mut content = vec![Primitive::Line(Line::new(start, end))];

    for (measured, projected) in [(dimension.first, start), (dimension.second, end)] {
        let span = measured.vector_to(projected);
        let length = span.length();
        // 测量点贴近尺寸线时不画延伸线。
        if length <= EXTENSION_OFFSET {
            continue;
        }
        let unit = span.scale(1.0 / length);
        content.push(Primitive::Line(Line::new(
            measured.translate(unit.scale(EXTENSION_OFFSET)),
            projected.translate(unit.scale(EXTENSION_BEYOND)),
        )));
    }

    let label = dimension
        .text
        .clone()
        .unwrap_or_else(|| format_measurement(dimension.measurement()));
    let above = Vector2::from_angle(dimension.rotation + FRAC_PI_2)
        .scale(DIMENSION_TEXT_GAP + DIMENSION_TEXT_HEIGHT / 2.0);
    let mut text = Text::new(
        dimension.text_midpoint().translate(above),
        label,
        DIMENSION_TEXT_HEIGHT,
    )
    .centered();
    text.rotation = dimension.rotation;
    content.push(Primitive::Text(text));
    content
}

/// 测量值最多两位小数，去掉末尾的零。
fn format_measurement(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn write_layer(writer: &mut DxfWriter, layer: &Layer) {
    writer.write_pair(0, "LAYER");
    writer.write_handle();
    writer.write_pair(100, "AcDbSymbolTableRecord");
    writer.write_pair(100, "AcDbLayerTableRecord");
    writer.write_pair(2, &layer.name);
    writer.write_pair(70, 0);
    // 关闭的图层以负颜色号表示。
    let color = if layer.is_visible {
        layer.color.abs()
    } else {
        -layer.color.abs()
    };
    writer.write_pair(62, color);
    writer.write_pair(6, &layer.linetype);
    if let Some(lineweight) = layer.lineweight {
        writer.write_pair(370, lineweight);
    }
}

fn write_entities(writer: &mut DxfWriter, document: &Document) -> Result<(), IoError> {
    writer.begin_section("ENTITIES");
    let mut dimension_index = 0usize;
    for (id, entity) in document.entities() {
        match &entity.entity {
            Entity::Primitive(primitive) => {
                let block = match primitive {
                    Primitive::Dimension(_) => {
                        dimension_index += 1;
                        Some(dimension_block_name(dimension_index))
                    }
                    _ => None,
                };
                write_primitive(writer, &entity.layer, entity.color, primitive, block.as_deref());
            }
            Entity::Unsupported(unsupported) => {
                return Err(IoError::UnsupportedFeature(format!(
                    "实体 {} 的类型 {} 无法写出",
                    id.get(),
                    unsupported.kind
                )));
            }
        }
    }
    writer.end_section();
    Ok(())
}

fn write_common(writer: &mut DxfWriter, kind: &str, layer: &str, color: Option<i16>) {
    writer.write_pair(0, kind);
    writer.write_handle();
    writer.write_pair(100, "AcDbEntity");
    writer.write_pair(8, layer);
    if let Some(color) = color {
        writer.write_pair(62, color);
    }
}

/// `dimension_block` 为标注引用的匿名块名，其余图元忽略。
fn write_primitive(
    writer: &mut DxfWriter,
    layer: &str,
    color: Option<i16>,
    primitive: &Primitive,
    dimension_block: Option<&str>,
) {
    write_common(writer, primitive.kind(), layer, color);
    match primitive {
        Primitive::Line(line) => {
            writer.write_pair(100, "AcDbLine");
            writer.write_point(10, line.start);
            writer.write_point(11, line.end);
        }
        Primitive::Circle(circle) => {
            writer.write_pair(100, "AcDbCircle");
            writer.write_point(10, circle.center);
            writer.write_pair(40, circle.radius);
        }
        Primitive::Arc(arc) => {
            writer.write_pair(100, "AcDbCircle");
            writer.write_point(10, arc.center);
            writer.write_pair(40, arc.radius);
            writer.write_pair(100, "AcDbArc");
            writer.write_pair(50, arc.start_angle.to_degrees());
            writer.write_pair(51, arc.end_angle.to_degrees());
        }
        Primitive::Polyline(polyline) => {
            writer.write_pair(100, "AcDbPolyline");
            writer.write_pair(90, polyline.vertices.len());
            writer.write_pair(70, if polyline.is_closed { 1 } else { 0 });
            for vertex in &polyline.vertices {
                writer.write_pair(10, vertex.position.x());
                writer.write_pair(20, vertex.position.y());
                if vertex.bulge != 0.0 {
                    writer.write_pair(42, vertex.bulge);
                }
            }
        }
        Primitive::Text(text) if text.is_multiline => write_mtext(writer, text),
        Primitive::Text(text) => write_text(writer, text),
        Primitive::Dimension(dimension) => write_dimension(writer, dimension, dimension_block),
    }
}

fn write_text(writer: &mut DxfWriter, text: &Text) {
    writer.write_pair(100, "AcDbText");
    writer.write_point(10, text.insert);
    writer.write_pair(40, text.height);
    writer.write_pair(1, &text.content);
    if text.rotation != 0.0 {
        writer.write_pair(50, text.rotation.to_degrees());
    }
    if let Some(style) = &text.style {
        writer.write_pair(7, style);
    }
    if text.alignment == TextAlignment::MiddleCenter {
        writer.write_pair(72, 1);
        writer.write_point(11, text.insert);
    }
    writer.write_pair(100, "AcDbText");
    if text.alignment == TextAlignment::MiddleCenter {
        writer.write_pair(73, 2);
    }
}

fn write_mtext(writer: &mut DxfWriter, text: &Text) {
    writer.write_pair(100, "AcDbMText");
    writer.write_point(10, text.insert);
    writer.write_pair(40, text.height);
    writer.write_pair(71, 7);
    writer.write_pair(1, text.content.replace('\n', "\\P"));
    if let Some(style) = &text.style {
        writer.write_pair(7, style);
    }
    if text.rotation != 0.0 {
        writer.write_pair(50, text.rotation.to_degrees());
    }
}

fn write_dimension(writer: &mut DxfWriter, dimension: &LinearDimension, block: Option<&str>) {
    writer.write_pair(100, "AcDbDimension");
    if let Some(block) = block {
        writer.write_pair(2, block);
    }
    writer.write_point(10, dimension.location);
    writer.write_point(11, dimension.text_midpoint());
    writer.write_pair(70, 0);
    if let Some(text) = &dimension.text {
        writer.write_pair(1, text);
    }
    writer.write_pair(3, "Standard");
    writer.write_pair(100, "AcDbAlignedDimension");
    writer.write_point(13, dimension.first);
    writer.write_point(14, dimension.second);
    writer.write_pair(50, dimension.rotation.to_degrees());
    writer.write_pair(100, "AcDbRotatedDimension");
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelcut_core::layer::LayerTag;

    #[test]
    fn writer_formats_group_codes_right_aligned() {
        let mut writer = DxfWriter::new();
        writer.begin_section("HEADER");
        writer.write_pair(9, "$ACADVER");
        writer.write_pair(1, OUTPUT_VERSION);
        writer.end_section();

        let output = writer.finish();
        assert!(output.starts_with("  0\nSECTION\n  2\nHEADER\n"));
        assert!(output.ends_with("  0\nEOF\n"));
    }

    #[test]
    fn handles_are_sequential_hex() {
        let mut writer = DxfWriter::new();
        assert_eq!(writer.new_handle(), "64");
        assert_eq!(writer.new_handle(), "65");
    }

    #[test]
    fn hidden_layer_is_written_with_negative_color() {
        let mut document = Document::new();
        document.define_layer(Layer::for_tag(LayerTag::Deleted));
        let output = render_document(&document).expect("渲染失败");
        assert!(output.contains("  2\nDELETED\n 70\n0\n 62\n-30\n  6\nCONTINUOUS\n370\n53\n"));
    }

    #[test]
    fn measurement_text_drops_trailing_zeros() {
        assert_eq!(format_measurement(300.0), "300");
        assert_eq!(format_measurement(60.333), "60.33");
        assert_eq!(format_measurement(12.5), "12.5");
    }

    #[test]
    fn dimension_block_draws_lines_and_label() {
        let dimension = LinearDimension::horizontal(
            Point2::new(0.0, 0.0),
            Point2::new(50.0, 0.0),
            Point2::new(50.0, -25.0),
        );
        let content = dimension_block_content(&dimension);
        assert_eq!(content.len(), 4);
        match &content[0] {
            Primitive::Line(line) => {
                assert!(line.start.is_close(Point2::new(0.0, -25.0), 1e-9));
                assert!(line.end.is_close(Point2::new(50.0, -25.0), 1e-9));
            }
            other => panic!("expected line, got {other:?}"),
        }
        match &content[1] {
            Primitive::Line(line) => {
                assert!(line.start.is_close(Point2::new(0.0, -0.625), 1e-9));
                assert!(line.end.is_close(Point2::new(0.0, -26.25), 1e-9));
            }
            other => panic!("expected line, got {other:?}"),
        }
        match &content[3] {
            Primitive::Text(text) => {
                assert_eq!(text.content, "50");
                assert_eq!(text.alignment, TextAlignment::MiddleCenter);
                assert!(text.insert.is_close(Point2::new(25.0, -23.125), 1e-9));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn dimensions_reference_their_anonymous_blocks() {
        let mut document = Document::new();
        for x in [50.0, 120.0] {
            document.add_primitive(
                Primitive::Dimension(LinearDimension::horizontal(
                    Point2::new(0.0, 0.0),
                    Point2::new(x, 0.0),
                    Point2::new(x, -25.0),
                )),
                "DIMENSION",
                None,
            );
        }
        let output = render_document(&document).expect("渲染失败");

        assert!(output.contains("  0\nTABLE\n  2\nBLOCK_RECORD\n"));
        assert!(output.contains("  2\n*Model_Space\n"));
        let blocks = output.find("  2\nBLOCKS\n").expect("缺少 BLOCKS 段");
        let entities = output.find("  2\nENTITIES\n").expect("缺少 ENTITIES 段");
        assert!(blocks < entities);
        assert!(output[blocks..entities].contains("  2\n*D1\n 70\n1\n"));
        assert!(output[blocks..entities].contains("  1\n120\n"));
        assert!(output[entities..].contains("AcDbDimension\n  2\n*D1\n"));
        assert!(output[entities..].contains("AcDbDimension\n  2\n*D2\n"));
    }

    #[test]
    fn unsupported_entities_fail_the_whole_render() {
        let mut document = Document::new();
        document.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "0");
        document.add_unsupported("SPLINE", "0");
        let err = render_document(&document).unwrap_err();
        assert!(matches!(err, IoError::UnsupportedFeature(message) if message.contains("SPLINE")));
    }
}
