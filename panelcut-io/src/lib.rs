use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;
use panelcut_core::{
    document::{Document, Layer, TextStyle},
    geometry::Point2,
    primitive::{
        Arc, Circle, LinearDimension, Line, Polyline, PolylineVertex, Primitive, Text,
        TextAlignment,
    },
};

mod holes;
mod writer;

pub use holes::{HoleRowError, HoleTable, read_hole_csv, sidecar_path};
pub use writer::render_document;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error("failed to read hole table {path:?}: {source}")]
    HoleTable {
        path: std::path::PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 从内存中的 DXF 文本解析文档。
    pub fn parse_str(&self, source: &str) -> Result<Document, IoError> {
        DxfParser::new(source).parse().map_err(IoError::from)
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let document = self.parse_str(&data)?;
        debug!(
            path = %path.display(),
            entities = document.entity_count(),
            version = document.version().unwrap_or("unknown"),
            "DXF 读取完成"
        );
        Ok(document)
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        // 先在内存中完整生成，失败时不会留下半截文件。
        let rendered = render_document(document)?;
        fs::write(path, rendered).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), entities = document.entity_count(), "DXF 写入完成");
        Ok(())
    }
}

#[derive(Debug)]
enum DxfError {
    Invalid { message: String },
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

impl From<DxfError> for IoError {
    fn from(err: DxfError) -> Self {
        match err {
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
        }
    }
}

/// 实体公共属性：图层、ACI 颜色与所属空间。
#[derive(Debug, Default)]
struct CommonAttributes {
    layer: Option<String>,
    color: Option<i16>,
    /// 组码 67 为 1 表示图纸空间实体。
    paper_space: bool,
}

impl CommonAttributes {
    /// 处理公共组码，返回 true 表示已消费。
    fn accept(&mut self, code: i32, value: &str, kind: &str) -> Result<bool, DxfError> {
        match code {
            8 => {
                self.layer = Some(value.trim().to_string());
                Ok(true)
            }
            62 => {
                let color = parse_i16(value, &format!("{kind} 颜色（组码 62）"))?;
                // 256 为随层，与未指定等价。
                self.color = if color == 256 { None } else { Some(color) };
                Ok(true)
            }
            67 => {
                self.paper_space = parse_i16(value, &format!("{kind} 空间标志（组码 67）"))? != 0;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn layer(&mut self) -> String {
        self.layer.take().unwrap_or_else(|| "0".to_string())
    }
}

struct ParsedEntity {
    attributes: CommonAttributes,
    primitive: Primitive,
}

/// 单条实体记录的解析结果。
enum ParsedRecord {
    Primitive(ParsedEntity),
    Unsupported { attributes: CommonAttributes },
}

impl ParsedRecord {
    fn in_paper_space(&self) -> bool {
        match self {
            ParsedRecord::Primitive(entity) => entity.attributes.paper_space,
            ParsedRecord::Unsupported { attributes } => attributes.paper_space,
        }
    }
}

impl From<ParsedEntity> for ParsedRecord {
    fn from(entity: ParsedEntity) -> Self {
        ParsedRecord::Primitive(entity)
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "HEADER" => self.parse_header(&mut document)?,
                        "TABLES" => self.parse_tables(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_header(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut current_variable: Option<String> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some((9, name)) => current_variable = Some(name.trim().to_string()),
                Some((1, value)) => {
                    if current_variable.as_deref() == Some("$ACADVER") {
                        document.set_version(value.trim());
                    }
                }
                Some(_) => continue,
                None => return Err(DxfError::invalid("HEADER 段提前结束")),
            }
        }
        Ok(())
    }

    fn parse_tables(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("TABLES 段提前结束")),
            };
            if code != 0 {
                continue;
            }
            match value.trim() {
                "ENDSEC" => break,
                "LAYER" => self.parse_layer_record(document)?,
                "STYLE" => self.parse_style_record(document)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// 解析 LAYER 表中的一条记录；颜色为负表示图层关闭。
    fn parse_layer_record(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut name: Option<String> = None;
        let mut color: Option<i16> = None;
        let mut linetype: Option<String> = None;
        let mut lineweight: Option<i16> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    2 => name = Some(value.trim().to_string()),
                    62 => color = Some(parse_i16(&value, "LAYER 颜色（组码 62）")?),
                    6 => linetype = Some(value.trim().to_string()),
                    370 => lineweight = Some(parse_i16(&value, "LAYER 线宽（组码 370）")?),
                    _ => {}
                },
                None => return Err(DxfError::invalid("LAYER 记录未正确结束")),
            }
        }

        let Some(name) = name else {
            return Ok(());
        };
        let mut layer = Layer::new(name);
        if let Some(color) = color {
            layer.color = color.abs();
            layer.is_visible = color >= 0;
        }
        if let Some(linetype) = linetype {
            layer.linetype = linetype;
        }
        layer.lineweight = lineweight;
        document.define_layer(layer);
        Ok(())
    }

    fn parse_style_record(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut name: Option<String> = None;
        let mut font: Option<String> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((2, value)) => name = Some(value.trim().to_string()),
                Some((3, value)) => font = Some(value.trim().to_string()),
                Some(_) => continue,
                None => return Err(DxfError::invalid("STYLE 记录未正确结束")),
            }
        }
        if let Some(name) = name {
            document.define_text_style(TextStyle::new(name, font.unwrap_or_default()));
        }
        Ok(())
    }

    /// 只保留模型空间实体；图纸空间（组码 67 = 1）的图框、视口等直接丢弃。
    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut paper_space = 0usize;
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            let kind = value.trim().to_string();
            let parsed = match kind.as_str() {
                "ENDSEC" => break,
                "SEQEND" => {
                    self.skip_entity_body()?;
                    continue;
                }
                "POLYLINE" => self.parse_polyline_entity()?,
                "LINE" => self.parse_line()?.into(),
                "CIRCLE" => self.parse_circle()?.into(),
                "ARC" => self.parse_arc()?.into(),
                "LWPOLYLINE" => self.parse_lwpolyline()?.into(),
                "TEXT" => self.parse_text()?.into(),
                "MTEXT" => self.parse_mtext()?.into(),
                "DIMENSION" => self.parse_dimension()?,
                _ => ParsedRecord::Unsupported {
                    attributes: self.skip_unsupported_entity()?,
                },
            };

            if parsed.in_paper_space() {
                paper_space += 1;
                continue;
            }
            match parsed {
                ParsedRecord::Primitive(mut entity) => {
                    let layer = entity.attributes.layer();
                    document.add_primitive(entity.primitive, layer, entity.attributes.color);
                }
                ParsedRecord::Unsupported { mut attributes } => {
                    let layer = attributes.layer();
                    debug!(kind = %kind, layer = %layer, "记录不支持的实体类型");
                    document.add_unsupported(kind, layer);
                }
            }
        }
        if paper_space > 0 {
            debug!(skipped = paper_space, "忽略图纸空间实体");
        }
        Ok(())
    }

    fn parse_line(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut attributes = CommonAttributes::default();
        let mut start_x = None;
        let mut start_y = None;
        let mut end_x = None;
        let mut end_y = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if attributes.accept(code, &value, "LINE")? {
                        continue;
                    }
                    match code {
                        10 => assign_coord(&mut start_x, &value, "LINE 起点 X（组码 10）")?,
                        20 => assign_coord(&mut start_y, &value, "LINE 起点 Y（组码 20）")?,
                        11 => assign_coord(&mut end_x, &value, "LINE 终点 X（组码 11）")?,
                        21 => assign_coord(&mut end_y, &value, "LINE 终点 Y（组码 21）")?,
                        _ => {} // Z 坐标与扩展数据忽略
                    }
                }
                None => return Err(DxfError::invalid("LINE 未正确结束")),
            }
        }

        let sx = start_x.ok_or_else(|| DxfError::invalid("LINE 缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::invalid("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::invalid("LINE 缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::invalid("LINE 缺少终点 Y（组码 21）"))?;

        Ok(ParsedEntity {
            attributes,
            primitive: Primitive::Line(Line::new(Point2::new(sx, sy), Point2::new(ex, ey))),
        })
    }

    fn parse_circle(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut attributes = CommonAttributes::default();
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if attributes.accept(code, &value, "CIRCLE")? {
                        continue;
                    }
                    match code {
                        10 => assign_coord(&mut center_x, &value, "CIRCLE 圆心 X（组码 10）")?,
                        20 => assign_coord(&mut center_y, &value, "CIRCLE 圆心 Y（组码 20）")?,
                        40 => assign_coord(&mut radius, &value, "CIRCLE 半径（组码 40）")?,
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("CIRCLE 未正确结束")),
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("CIRCLE 缺少半径（组码 40）"))?;

        Ok(ParsedEntity {
            attributes,
            primitive: Primitive::Circle(Circle::new(Point2::new(cx, cy), radius)),
        })
    }

    fn parse_arc(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut attributes = CommonAttributes::default();
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if attributes.accept(code, &value, "ARC")? {
                        continue;
                    }
                    match code {
                        10 => assign_coord(&mut center_x, &value, "ARC 圆心 X（组码 10）")?,
                        20 => assign_coord(&mut center_y, &value, "ARC 圆心 Y（组码 20）")?,
                        40 => assign_coord(&mut radius, &value, "ARC 半径（组码 40）")?,
                        50 => assign_coord(&mut start_angle, &value, "ARC 起始角（组码 50）")?,
                        51 => assign_coord(&mut end_angle, &value, "ARC 终止角（组码 51）")?,
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("ARC 未正确结束")),
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("ARC 缺少半径（组码 40）"))?;
        let start_angle =
            start_angle.ok_or_else(|| DxfError::invalid("ARC 缺少起始角（组码 50）"))?;
        let end_angle = end_angle.ok_or_else(|| DxfError::invalid("ARC 缺少终止角（组码 51）"))?;

        Ok(ParsedEntity {
            attributes,
            primitive: Primitive::Arc(Arc::new(
                Point2::new(cx, cy),
                radius,
                start_angle.to_radians(),
                end_angle.to_radians(),
            )),
        })
    }

    fn parse_lwpolyline(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut attributes = CommonAttributes::default();
        let mut is_closed = false;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if attributes.accept(code, &value, "LWPOLYLINE")? {
                        continue;
                    }
                    match code {
                        70 => {
                            let flag = parse_i32(&value, "LWPOLYLINE 标志")?;
                            is_closed = flag & 0x01 == 0x01;
                        }
                        10 => {
                            let x = parse_f64(&value, "LWPOLYLINE 顶点 X")?;
                            if let Some(y) = pending_y.take() {
                                vertices.push(PolylineVertex::new(Point2::new(x, y)));
                            } else if pending_x.replace(x).is_some() {
                                return Err(DxfError::invalid(
                                    "LWPOLYLINE 顶点缺少对应的 Y（组码 20）",
                                ));
                            }
                        }
                        20 => {
                            let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                            if let Some(x) = pending_x.take() {
                                vertices.push(PolylineVertex::new(Point2::new(x, y)));
                            } else if pending_y.replace(y).is_some() {
                                return Err(DxfError::invalid(
                                    "LWPOLYLINE 顶点缺少对应的 X（组码 10）",
                                ));
                            }
                        }
                        42 => {
                            let bulge = parse_f64(&value, "LWPOLYLINE 顶点 bulge")?;
                            match vertices.last_mut() {
                                Some(vertex) => vertex.bulge = bulge,
                                None => {
                                    return Err(DxfError::invalid(
                                        "LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）",
                                    ));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("LWPOLYLINE 未正确结束")),
            }
        }

        if pending_x.is_some() || pending_y.is_some() {
            return Err(DxfError::invalid(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }

        Ok(ParsedEntity {
            attributes,
            primitive: Primitive::Polyline(Polyline {
                vertices,
                is_closed,
            }),
        })
    }

    /// 经典 POLYLINE：头部 + VERTEX 序列 + SEQEND。仅支持二维折线，
    /// 网格与多面网格记录为不支持的实体。
    fn parse_polyline_entity(&mut self) -> Result<ParsedRecord, DxfError> {
        let mut attributes = CommonAttributes::default();
        let mut flags: i16 = 0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if attributes.accept(code, &value, "POLYLINE")? {
                        continue;
                    }
                    if code == 70 {
                        flags = parse_i16(&value, "POLYLINE 标志（组码 70）")?;
                    }
                }
                None => return Err(DxfError::invalid("POLYLINE 未正确结束")),
            }
        }

        let is_mesh = flags & (0x10 | 0x40) != 0;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => {
                        if let Some(vertex) = self.parse_vertex_record()? {
                            vertices.push(vertex);
                        }
                    }
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        // 缺少 SEQEND 时容忍，交由外层继续解析。
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => {
                    return Err(DxfError::invalid(
                        "POLYLINE 遇到无效的记录，期望 VERTEX/SEQEND",
                    ));
                }
                None => {
                    return Err(DxfError::invalid(
                        "POLYLINE 缺少 SEQEND（组码 0, 值为 SEQEND）",
                    ));
                }
            }
        }

        if is_mesh {
            debug!(flags, "POLYLINE 网格模式不参与处理");
            return Ok(ParsedRecord::Unsupported { attributes });
        }

        Ok(ParsedEntity {
            attributes,
            primitive: Primitive::Polyline(Polyline {
                vertices,
                is_closed: flags & 0x01 != 0,
            }),
        }
        .into())
    }

    fn parse_vertex_record(&mut self) -> Result<Option<PolylineVertex>, DxfError> {
        let mut x = None;
        let mut y = None;
        let mut bulge = 0.0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    10 => assign_coord(&mut x, &value, "VERTEX X（组码 10）")?,
                    20 => assign_coord(&mut y, &value, "VERTEX Y（组码 20）")?,
                    42 => bulge = parse_f64(&value, "VERTEX bulge（组码 42）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("VERTEX 未正确结束")),
            }
        }
        match (x, y) {
            (Some(x), Some(y)) => Ok(Some(PolylineVertex::with_bulge(Point2::new(x, y), bulge))),
            (None, None) => Ok(None),
            _ => Err(DxfError::invalid("VERTEX 缺少完整的 XY 坐标")),
        }
    }

    fn parse_text(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut attributes = CommonAttributes::default();
        let mut insert_x = None;
        let mut insert_y = None;
        let mut align_x = None;
        let mut align_y = None;
        let mut height = None;
        let mut rotation_deg = 0.0;
        let mut horizontal: i16 = 0;
        let mut vertical: i16 = 0;
        let mut style: Option<String> = None;
        let mut text: Option<String> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if attributes.accept(code, &value, "TEXT")? {
                        continue;
                    }
                    match code {
                        10 => assign_coord(&mut insert_x, &value, "TEXT 插入点 X（组码 10）")?,
                        20 => assign_coord(&mut insert_y, &value, "TEXT 插入点 Y（组码 20）")?,
                        11 => align_x = Some(parse_f64(&value, "TEXT 对齐点 X（组码 11）")?),
                        21 => align_y = Some(parse_f64(&value, "TEXT 对齐点 Y（组码 21）")?),
                        40 => assign_coord(&mut height, &value, "TEXT 高度（组码 40）")?,
                        50 => rotation_deg = parse_f64(&value, "TEXT 旋转角")?,
                        72 => horizontal = parse_i16(&value, "TEXT 水平对齐（组码 72）")?,
                        73 => vertical = parse_i16(&value, "TEXT 垂直对齐（组码 73）")?,
                        7 => style = Some(value.trim().to_string()),
                        1 => text = Some(decode_inline_text(&value)),
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("TEXT 未正确结束")),
            }
        }

        let ix = insert_x.ok_or_else(|| DxfError::invalid("TEXT 缺少插入点 X（组码 10）"))?;
        let iy = insert_y.ok_or_else(|| DxfError::invalid("TEXT 缺少插入点 Y（组码 20）"))?;
        let height = height.ok_or_else(|| DxfError::invalid("TEXT 缺少文字高度（组码 40）"))?;
        let content = text.ok_or_else(|| DxfError::invalid("TEXT 缺少文本内容（组码 1）"))?;

        // 居中对齐时 DXF 以对齐点（11/21）为准。
        let centered = horizontal == 1 && vertical == 2;
        let (insert, alignment) = match (centered, align_x, align_y) {
            (true, Some(ax), Some(ay)) => (Point2::new(ax, ay), TextAlignment::MiddleCenter),
            _ => (Point2::new(ix, iy), TextAlignment::BaselineLeft),
        };

        Ok(ParsedEntity {
            attributes,
            primitive: Primitive::Text(Text {
                insert,
                content,
                height,
                rotation: rotation_deg.to_radians(),
                alignment,
                is_multiline: false,
                style,
            }),
        })
    }

    fn parse_mtext(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut attributes = CommonAttributes::default();
        let mut insert_x = None;
        let mut insert_y = None;
        let mut height = None;
        let mut rotation_deg = 0.0;
        let mut style: Option<String> = None;
        let mut fragments: Vec<String> = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if attributes.accept(code, &value, "MTEXT")? {
                        continue;
                    }
                    match code {
                        10 => assign_coord(&mut insert_x, &value, "MTEXT 插入点 X（组码 10）")?,
                        20 => assign_coord(&mut insert_y, &value, "MTEXT 插入点 Y（组码 20）")?,
                        40 => assign_coord(&mut height, &value, "MTEXT 高度（组码 40）")?,
                        50 => rotation_deg = parse_f64(&value, "MTEXT 旋转角")?,
                        7 => style = Some(value.trim().to_string()),
                        // 组码 3 为超长文本的前置分段，组码 1 为末段。
                        1 | 3 => fragments.push(value),
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("MTEXT 未正确结束")),
            }
        }

        let ix = insert_x.ok_or_else(|| DxfError::invalid("MTEXT 缺少插入点 X（组码 10）"))?;
        let iy = insert_y.ok_or_else(|| DxfError::invalid("MTEXT 缺少插入点 Y（组码 20）"))?;
        let height = height.ok_or_else(|| DxfError::invalid("MTEXT 缺少文字高度（组码 40）"))?;
        if fragments.is_empty() {
            return Err(DxfError::invalid("MTEXT 缺少文本内容（组码 1/3）"));
        }

        Ok(ParsedEntity {
            attributes,
            primitive: Primitive::Text(Text {
                insert: Point2::new(ix, iy),
                content: decode_mtext_content(&fragments.concat()),
                height,
                rotation: rotation_deg.to_radians(),
                alignment: TextAlignment::BaselineLeft,
                is_multiline: true,
                style,
            }),
        })
    }

    /// 仅识别线性/对齐标注（类型 0/1），其余类型记录为不支持的实体。
    fn parse_dimension(&mut self) -> Result<ParsedRecord, DxfError> {
        let mut attributes = CommonAttributes::default();
        let mut flags: i16 = 0;
        let mut location_x = None;
        let mut location_y = None;
        let mut first_x = None;
        let mut first_y = None;
        let mut second_x = None;
        let mut second_y = None;
        let mut rotation_deg = 0.0;
        let mut text: Option<String> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if attributes.accept(code, &value, "DIMENSION")? {
                        continue;
                    }
                    match code {
                        70 => flags = parse_i16(&value, "DIMENSION 类型标志（组码 70）")?,
                        1 => {
                            let entry = value.trim().to_string();
                            text = if entry == "<>" || entry.is_empty() {
                                None
                            } else {
                                Some(entry)
                            };
                        }
                        10 => location_x = Some(parse_f64(&value, "DIMENSION 定义点 X（组码 10）")?),
                        20 => location_y = Some(parse_f64(&value, "DIMENSION 定义点 Y（组码 20）")?),
                        13 => first_x = Some(parse_f64(&value, "DIMENSION 延伸线起点 X（组码 13）")?),
                        23 => first_y = Some(parse_f64(&value, "DIMENSION 延伸线起点 Y（组码 23）")?),
                        14 => second_x = Some(parse_f64(&value, "DIMENSION 延伸线终点 X（组码 14）")?),
                        24 => second_y = Some(parse_f64(&value, "DIMENSION 延伸线终点 Y（组码 24）")?),
                        50 => rotation_deg = parse_f64(&value, "DIMENSION 旋转角（组码 50）")?,
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("DIMENSION 未正确结束")),
            }
        }

        let kind = flags & 0x0F;
        if kind != 0 && kind != 1 {
            debug!(kind, "DIMENSION 非线性类型不参与处理");
            return Ok(ParsedRecord::Unsupported { attributes });
        }

        let location = match (location_x, location_y) {
            (Some(x), Some(y)) => Point2::new(x, y),
            _ => return Err(DxfError::invalid("DIMENSION 缺少定义点（组码 10/20）")),
        };
        let first = match (first_x, first_y) {
            (Some(x), Some(y)) => Point2::new(x, y),
            _ => return Err(DxfError::invalid("DIMENSION 缺少第一测量点（组码 13/23）")),
        };
        let second = match (second_x, second_y) {
            (Some(x), Some(y)) => Point2::new(x, y),
            _ => return Err(DxfError::invalid("DIMENSION 缺少第二测量点（组码 14/24）")),
        };

        Ok(ParsedEntity {
            attributes,
            primitive: Primitive::Dimension(LinearDimension {
                first,
                second,
                location,
                rotation: rotation_deg.to_radians(),
                text,
            }),
        }
        .into())
    }

    /// 跳过不支持的实体体，只取出图层名与空间标志。
    fn skip_unsupported_entity(&mut self) -> Result<CommonAttributes, DxfError> {
        let mut attributes = CommonAttributes::default();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((8, value)) => attributes.layer = Some(value.trim().to_string()),
                Some((67, value)) => attributes.paper_space = value.trim() == "1",
                Some(_) => continue,
                None => break,
            }
        }
        Ok(attributes)
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    // 文件末尾的空行不视为组码。
                    if line.trim().is_empty() {
                        continue;
                    }
                    break line;
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只允许回退一次");
        self.buffer = Some(pair);
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}

fn decode_mtext_content(raw: &str) -> String {
    let mut result = String::new();
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('P') | Some('p') => result.push('\n'),
                Some('~') => result.push(' '),
                Some('\\') => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }
    result
}

fn decode_inline_text(raw: &str) -> String {
    raw.replace("%%d", "°")
        .replace("%%D", "°")
        .replace("%%c", "⌀")
        .replace("%%C", "⌀")
        .replace("%%p", "±")
        .replace("%%P", "±")
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelcut_core::document::Entity;

    fn pairs(items: &[(i32, &str)]) -> String {
        let mut out = String::new();
        for (code, value) in items {
            out.push_str(&format!("{code:>3}\n{value}\n"));
        }
        out
    }

    #[test]
    fn reader_skips_trailing_blank_lines() {
        let source = "  0\nEOF\n\n\n";
        let doc = DxfFacade::new().parse_str(source).expect("解析失败");
        assert_eq!(doc.entity_count(), 0);
    }

    #[test]
    fn odd_line_count_is_invalid() {
        let err = DxfFacade::new().parse_str("  0\n").unwrap_err();
        assert!(matches!(err, IoError::InvalidDocument(_)));
    }

    #[test]
    fn by_layer_color_is_not_recorded() {
        let source = pairs(&[
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "LINE"),
            (8, "GEOM"),
            (62, "256"),
            (10, "0"),
            (20, "0"),
            (11, "5"),
            (21, "0"),
            (0, "CIRCLE"),
            (62, "3"),
            (10, "1"),
            (20, "1"),
            (40, "2"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let doc = DxfFacade::new().parse_str(&source).expect("解析失败");
        let entities: Vec<_> = doc.entities().map(|(_, e)| e).collect();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].layer, "GEOM");
        assert_eq!(entities[0].color, None);
        assert_eq!(entities[1].layer, "0");
        assert_eq!(entities[1].color, Some(3));
    }

    #[test]
    fn classic_polyline_reads_vertex_sequence() {
        let source = pairs(&[
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "POLYLINE"),
            (8, "OUTLINE"),
            (66, "1"),
            (70, "1"),
            (0, "VERTEX"),
            (10, "0"),
            (20, "0"),
            (0, "VERTEX"),
            (10, "4"),
            (20, "0"),
            (42, "0.5"),
            (0, "VERTEX"),
            (10, "4"),
            (20, "3"),
            (0, "SEQEND"),
            (8, "OUTLINE"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let doc = DxfFacade::new().parse_str(&source).expect("解析失败");
        assert_eq!(doc.entity_count(), 1);
        let (_, entity) = doc.entities().next().unwrap();
        match &entity.entity {
            Entity::Primitive(Primitive::Polyline(polyline)) => {
                assert!(polyline.is_closed);
                assert_eq!(polyline.vertices.len(), 3);
                assert!((polyline.vertices[1].bulge - 0.5).abs() < 1e-12);
            }
            other => panic!("期望 POLYLINE，实际为 {other:?}"),
        }
    }

    #[test]
    fn paper_space_entities_are_dropped() {
        let source = pairs(&[
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "LINE"),
            (8, "OUTLINE"),
            (67, "0"),
            (10, "0"),
            (20, "0"),
            (11, "5"),
            (21, "0"),
            (0, "LINE"),
            (67, "1"),
            (8, "FRAME"),
            (10, "-500"),
            (20, "-500"),
            (11, "800"),
            (21, "-500"),
            (0, "VIEWPORT"),
            (8, "0"),
            (67, "1"),
            (69, "1"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let doc = DxfFacade::new().parse_str(&source).expect("解析失败");
        let layers: Vec<_> = doc.entities().map(|(_, e)| e.layer.as_str()).collect();
        assert_eq!(layers, vec!["OUTLINE"]);
    }

    #[test]
    fn mtext_paragraph_codes_are_decoded() {
        assert_eq!(decode_mtext_content("A\\PB\\~C"), "A\nB C");
        assert_eq!(decode_inline_text("%%c8"), "⌀8");
    }
}
