//! 标注布局：孔位标记、尺寸线、孔位表、图例与标题。
//!
//! 布局只追加图元，不修改已有几何。

use panelcut_config::LayoutConfig;
use panelcut_core::document::ViewFit;
use panelcut_core::geometry::{Bounds2D, Point2};
use panelcut_core::hole::HoleRecord;
use panelcut_core::layer::LayerTag;
use panelcut_core::primitive::{Line, LinearDimension, Primitive, Text};
use tracing::{debug, info};

use crate::bounds::aggregate_bounds;
use crate::errors::EngineError;
use crate::model::TaggedDrawing;

/// 标题文字使用的文字样式名。
pub const TITLE_STYLE: &str = "Title";

pub const TABLE_TITLE: &str = "Hole Schedule";
pub const TABLE_HEADERS: [&str; 6] = ["Hole Name", "X", "Y", "Z", "Dia", "Depth"];

pub const LEGEND_TITLE: &str = "Legend:";
pub const LEGEND_LINES: [&str; 8] = [
    "- CUT layer (red): Panel outline",
    "- DRILL layer (blue): Holes to be drilled",
    "- DRILL_MARKS layer (black): Crosshair marks for planar holes.",
    "- DIMENSION layer (grey): Panel and hole dimensions",
    "- ANNOTATION layer (black): Hole dimensions (d=diameter, h=depth).",
    "- For side-drilled holes, Z-coordinate is included (e.g., d10 h20 z9.5).",
    "- Side-drilled holes are marked with a blue cross on the DRILL layer.",
    "- Planar holes are marked with a black cross on the DRILL_MARKS layer.",
];

/// 侧孔十字标记的颜色（蓝）。
const SIDE_MARKER_COLOR: i16 = 5;

/// 布局产生的单个图元。
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub tag: LayerTag,
    pub primitive: Primitive,
    pub color: Option<i16>,
}

impl Placed {
    fn new(tag: LayerTag, primitive: Primitive) -> Self {
        Self {
            tag,
            primitive,
            color: None,
        }
    }

    fn annotation(text: Text) -> Self {
        Self::new(LayerTag::Annotation, Primitive::Text(text))
    }
}

fn cross(center: Point2, size: f64) -> [Line; 2] {
    let half = size / 2.0;
    [
        Line::new(
            Point2::new(center.x() - half, center.y()),
            Point2::new(center.x() + half, center.y()),
        ),
        Line::new(
            Point2::new(center.x(), center.y() - half),
            Point2::new(center.x(), center.y() + half),
        ),
    ]
}

/// 每个孔一个十字标记加两行文字：孔名与孔径/深度说明。
pub fn hole_markers(holes: &[HoleRecord], config: &LayoutConfig) -> Vec<Placed> {
    let mut placed = Vec::with_capacity(holes.len() * 4);
    for hole in holes {
        let position = hole.position();
        let (tag, size, color) = if hole.is_side_drilled() {
            (LayerTag::Drill, config.side_marker_size, Some(SIDE_MARKER_COLOR))
        } else {
            (LayerTag::DrillMark, config.planar_marker_size, None)
        };
        for line in cross(position, size) {
            placed.push(Placed {
                tag,
                primitive: Primitive::Line(line),
                color,
            });
        }
        placed.push(Placed::annotation(Text::new(
            Point2::new(position.x(), position.y() + config.name_label_offset),
            hole.name.clone(),
            config.label_height,
        )));
        placed.push(Placed::annotation(Text::new(
            Point2::new(position.x(), position.y() + config.size_label_offset),
            hole.label(),
            config.label_height,
        )));
    }
    placed
}

fn sorted_unique(mut values: Vec<f64>, descending: bool) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values.dedup();
    if descending {
        values.reverse();
    }
    values
}

/// 四个方向的尺寸线。切分点为孔坐标与板件远端边界，逐条向外排开。
pub fn dimension_lines(
    panel: &Bounds2D,
    holes: &[HoleRecord],
    config: &LayoutConfig,
) -> Vec<LinearDimension> {
    let mut xs: Vec<f64> = holes.iter().map(|hole| hole.x).collect();
    xs.push(panel.max_x());
    let mut ys: Vec<f64> = holes.iter().map(|hole| hole.y).collect();
    ys.push(panel.max_y());

    let offset = |index: usize| config.dimension_offset + index as f64 * config.dimension_spacing;
    let (min_x, min_y, max_x, max_y) = (panel.min_x(), panel.min_y(), panel.max_x(), panel.max_y());
    let mut dimensions = Vec::new();

    let bottom = sorted_unique(xs.iter().copied().filter(|x| *x != 0.0).collect(), false);
    for (i, x) in bottom.into_iter().enumerate() {
        dimensions.push(LinearDimension::horizontal(
            Point2::new(min_x, min_y),
            Point2::new(x, min_y),
            Point2::new(x, min_y - offset(i)),
        ));
    }

    let top = sorted_unique(xs.iter().copied().filter(|x| *x != max_x).collect(), true);
    for (i, x) in top.into_iter().enumerate() {
        dimensions.push(LinearDimension::horizontal(
            Point2::new(max_x, max_y),
            Point2::new(x, max_y),
            Point2::new(x, max_y + offset(i)),
        ));
    }

    let left = sorted_unique(ys.iter().copied().filter(|y| *y != 0.0).collect(), false);
    for (i, y) in left.into_iter().enumerate() {
        dimensions.push(LinearDimension::vertical(
            Point2::new(min_x, min_y),
            Point2::new(min_x, y),
            Point2::new(min_x - offset(i), y),
        ));
    }

    let right = sorted_unique(ys.iter().copied().filter(|y| *y != max_y).collect(), true);
    for (i, y) in right.into_iter().enumerate() {
        dimensions.push(LinearDimension::vertical(
            Point2::new(max_x, max_y),
            Point2::new(max_x, y),
            Point2::new(max_x + offset(i), y),
        ));
    }

    dimensions
}

/// 孔位表的图元及其底边位置。
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub placed: Vec<Placed>,
    pub bottom: f64,
}

/// 以 `anchor` 为左上角排布孔位表；没有孔时返回 None。
pub fn hole_table(anchor: Point2, holes: &[HoleRecord], config: &LayoutConfig) -> Option<TableLayout> {
    if holes.is_empty() {
        return None;
    }
    let text_height = config.table_text_height;
    let title_height = text_height * 1.5;
    let row_step = text_height * 1.5;
    let widths = config.table_column_widths;
    let x_start = anchor.x();
    let mut y = anchor.y();
    let mut placed = Vec::new();

    placed.push(Placed::annotation(Text::new(
        Point2::new(x_start, y),
        TABLE_TITLE,
        title_height,
    )));
    y -= text_height * 3.0;

    let row = |y: f64, cells: [String; 6], placed: &mut Vec<Placed>| {
        let mut x = x_start;
        for (cell, width) in cells.into_iter().zip(widths) {
            placed.push(Placed::annotation(Text::new(
                Point2::new(x, y),
                cell,
                text_height,
            )));
            x += width;
        }
    };

    row(y, TABLE_HEADERS.map(str::to_string), &mut placed);
    let underline_y = y - text_height * 0.5;
    let table_width: f64 = widths.iter().sum();
    placed.push(Placed::new(
        LayerTag::Annotation,
        Primitive::Line(Line::new(
            Point2::new(x_start, underline_y),
            Point2::new(x_start + table_width, underline_y),
        )),
    ));
    y -= text_height * 2.25;

    for hole in holes {
        let cells = [
            hole.name.clone(),
            hole.x.to_string(),
            hole.y.to_string(),
            hole.table_z().to_string(),
            hole.diameter.to_string(),
            hole.depth.to_string(),
        ];
        row(y, cells, &mut placed);
        y -= row_step;
    }

    Some(TableLayout { placed, bottom: y })
}

/// 图例文字块，`anchor` 为 "Legend:" 的插入点。
pub fn legend(anchor: Point2, config: &LayoutConfig) -> Vec<Placed> {
    let text_height = config.table_text_height;
    let mut placed = vec![Placed::annotation(Text::new(
        anchor,
        LEGEND_TITLE,
        text_height * 1.5,
    ))];
    for (i, line) in LEGEND_LINES.iter().enumerate() {
        let y = anchor.y() - text_height * 3.0 - i as f64 * text_height * 1.5;
        placed.push(Placed::annotation(Text::new(
            Point2::new(anchor.x(), y),
            *line,
            text_height,
        )));
    }
    placed
}

/// 图纸标题：水平居中于板件轮廓，位于已有几何上方。名称为空时不生成。
pub fn title(
    name: &str,
    panel: &Bounds2D,
    placed_so_far: &Bounds2D,
    config: &LayoutConfig,
) -> Option<Placed> {
    if name.is_empty() {
        return None;
    }
    let insert = Point2::new(panel.center().x(), placed_so_far.max_y() + config.title_gap);
    Some(Placed::annotation(
        Text::new(insert, name, config.title_height)
            .centered()
            .with_style(TITLE_STYLE),
    ))
}

/// 按图纸可用区域计算视口高度，并留出边距。
pub fn fit_view(extents: &Bounds2D, config: &LayoutConfig) -> ViewFit {
    let viewport_width = config.sheet_width - 2.0 * config.sheet_margin;
    let viewport_height = config.sheet_height - 2.0 * config.sheet_margin;
    let aspect_ratio = viewport_width / viewport_height;
    let (width, height) = (extents.width(), extents.height());

    let view_height = if width == 0.0 || height == 0.0 {
        100.0
    } else if width / height > aspect_ratio {
        width * viewport_height / viewport_width
    } else {
        height
    };

    ViewFit {
        center: extents.center(),
        height: view_height * config.view_margin,
        aspect_ratio,
    }
}

fn extend(drawing: &mut TaggedDrawing, placed: Vec<Placed>) {
    for item in placed {
        drawing.push(item.tag, item.primitive, item.color);
    }
}

/// 在重建结果之后追加全部标注，返回新的集合。
/// `template_mode` 时只生成孔位标记。
pub fn annotate(
    drawing: &TaggedDrawing,
    holes: &[HoleRecord],
    drawing_name: &str,
    template_mode: bool,
    config: &LayoutConfig,
) -> Result<TaggedDrawing, EngineError> {
    let mut result = drawing.clone();
    extend(&mut result, hole_markers(holes, config));
    if template_mode {
        debug!(holes = holes.len(), "模板模式，仅生成孔位标记");
        return Ok(result);
    }

    let panel = aggregate_bounds(&result, Some(&[LayerTag::Cut][..]))?;
    let dimensions = dimension_lines(&panel, holes, config);
    let dimension_count = dimensions.len();
    for dimension in dimensions {
        result.push(LayerTag::Dimension, Primitive::Dimension(dimension), None);
    }

    let all = aggregate_bounds(&result, None)?;
    let anchor = Point2::new(all.max_x() + config.table_gap, all.max_y());
    let table_bottom = match hole_table(anchor, holes, config) {
        Some(table) => {
            extend(&mut result, table.placed);
            table.bottom
        }
        None => anchor.y(),
    };
    extend(
        &mut result,
        legend(Point2::new(anchor.x(), table_bottom - config.legend_gap), config),
    );

    let placed_so_far = aggregate_bounds(&result, None)?;
    match title(drawing_name, &panel, &placed_so_far, config) {
        Some(heading) => {
            result.push(heading.tag, heading.primitive, heading.color);
        }
        None => debug!("图纸名称为空，跳过标题"),
    }

    info!(
        holes = holes.len(),
        dimensions = dimension_count,
        added = result.len() - drawing.len(),
        "标注布局完成"
    );
    Ok(result)
}
