//! 圆孔重建：把近似圆形的闭合多段线、以及由离散线段围成的环拟合为圆。
//!
//! 命中的原始图元改标为 DELETED，拟合出的圆以 DRILL 追加在所有分类图元之后，
//! 先多段线结果、后线段结果，各自按发现顺序排列。

use std::collections::{HashMap, VecDeque};

use panelcut_config::AppConfig;
use panelcut_core::geometry::Point2;
use panelcut_core::layer::LayerTag;
use panelcut_core::primitive::{Circle, Line, Primitive};
use tracing::{debug, info};

use crate::model::TaggedDrawing;

/// 圆拟合参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    /// 半径达到该值即拒绝。
    pub slot_max_size: f64,
    /// 相对半径容差。
    pub radius_tolerance: f64,
    /// 判定两点重合的距离。
    pub point_tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconstructionSettings {
    pub fit: FitSettings,
    /// CUT 直线数超过该值才进行线段重建。
    pub min_cut_lines: usize,
    pub radius_decimals: u32,
}

impl ReconstructionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            fit: FitSettings {
                slot_max_size: config.classifier.slot_max_size,
                radius_tolerance: config.reconstruction.radius_tolerance,
                point_tolerance: config.reconstruction.point_tolerance,
            },
            min_cut_lines: config.reconstruction.min_cut_lines,
            radius_decimals: config.reconstruction.radius_decimals,
        }
    }
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleFit {
    pub center: Point2,
    pub radius: f64,
}

/// 拟合失败的原因。属于正常结果，不是错误。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitRejection {
    TooFewPoints { distinct: usize },
    TooLarge { radius: f64 },
    OffRadius { index: usize, distance: f64, radius: f64 },
    Degenerate,
}

/// 以质心为圆心、首点到圆心的距离为半径，检查所有点是否落在相对容差内。
pub fn fit_circle(points: &[Point2], settings: &FitSettings) -> Result<CircleFit, FitRejection> {
    let distinct = count_distinct(points, settings.point_tolerance);
    if distinct < 3 {
        return Err(FitRejection::TooFewPoints { distinct });
    }
    let Some(center) = Point2::centroid(points) else {
        return Err(FitRejection::TooFewPoints { distinct: 0 });
    };
    let radius = points[0].distance(center);
    if !radius.is_finite() || radius <= 0.0 {
        return Err(FitRejection::Degenerate);
    }
    if radius >= settings.slot_max_size {
        return Err(FitRejection::TooLarge { radius });
    }
    for (index, point) in points.iter().enumerate() {
        let distance = point.distance(center);
        let allowed = settings.radius_tolerance * distance.abs().max(radius.abs());
        if (distance - radius).abs() > allowed {
            return Err(FitRejection::OffRadius {
                index,
                distance,
                radius,
            });
        }
    }
    Ok(CircleFit { center, radius })
}

fn count_distinct(points: &[Point2], tolerance: f64) -> usize {
    let mut seen: Vec<Point2> = Vec::new();
    for point in points {
        if !seen.iter().any(|other| other.is_close(*point, tolerance)) {
            seen.push(*point);
        }
    }
    seen.len()
}

/// 由线段端点组成的候选环。
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentLoop {
    /// 广度优先遍历的访问顺序。
    pub points: Vec<Point2>,
    pub is_closed: bool,
    /// 连通分量内的线段下标（对应输入切片）。
    pub lines: Vec<usize>,
}

/// 端点图：节点为量化后的端点，边为线段。
#[derive(Debug, Default)]
struct SegmentGraph {
    keys: HashMap<(i64, i64), usize>,
    nodes: Vec<Point2>,
    neighbors: Vec<Vec<usize>>,
    incident: Vec<Vec<usize>>,
}

impl SegmentGraph {
    fn build(lines: &[Line], tolerance: f64) -> Self {
        let mut graph = Self::default();
        for (index, line) in lines.iter().enumerate() {
            let start = graph.node(line.start, tolerance);
            let end = graph.node(line.end, tolerance);
            graph.neighbors[start].push(end);
            graph.neighbors[end].push(start);
            graph.incident[start].push(index);
            if end != start {
                graph.incident[end].push(index);
            }
        }
        graph
    }

    fn node(&mut self, point: Point2, tolerance: f64) -> usize {
        let key = quantize(point, tolerance);
        if let Some(&index) = self.keys.get(&key) {
            return index;
        }
        let index = self.nodes.len();
        self.keys.insert(key, index);
        self.nodes.push(point);
        self.neighbors.push(Vec::new());
        self.incident.push(Vec::new());
        index
    }
}

/// 以量化后的端点为节点、线段为边建图，按首次出现顺序广度优先遍历各连通分量。
pub fn build_segment_loops(lines: &[Line], point_tolerance: f64) -> Vec<SegmentLoop> {
    let graph = SegmentGraph::build(lines, point_tolerance);
    let mut visited = vec![false; graph.nodes.len()];
    let mut loops = Vec::new();
    for root in 0..graph.nodes.len() {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut queue = VecDeque::from([root]);
        let mut order = Vec::new();
        let mut component_lines = Vec::new();
        while let Some(node) = queue.pop_front() {
            order.push(graph.nodes[node]);
            component_lines.extend(graph.incident[node].iter().copied());
            for &next in &graph.neighbors[node] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        component_lines.sort_unstable();
        component_lines.dedup();

        let is_closed = match (order.first(), order.last()) {
            (Some(first), Some(last)) if order.len() > 1 => first.is_close(*last, point_tolerance),
            _ => false,
        };
        loops.push(SegmentLoop {
            points: order,
            is_closed,
            lines: component_lines,
        });
    }
    loops
}

fn quantize(point: Point2, tolerance: f64) -> (i64, i64) {
    (
        (point.x() / tolerance).round() as i64,
        (point.y() / tolerance).round() as i64,
    )
}

/// 线段环拟合结果。`lines` 为被取代的线段下标。
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFit {
    pub circle: CircleFit,
    pub lines: Vec<usize>,
    pub is_closed: bool,
}

/// 对每个连通分量尝试圆拟合，不检查 CUT 直线数量门槛。
pub fn fit_segment_loops(lines: &[Line], settings: &FitSettings) -> Vec<SegmentFit> {
    let mut fits = Vec::new();
    for candidate in build_segment_loops(lines, settings.point_tolerance) {
        debug!(
            points = candidate.points.len(),
            closed = candidate.is_closed,
            "候选线段环"
        );
        match fit_circle(&candidate.points, settings) {
            Ok(circle) => {
                let tolerance = settings.point_tolerance;
                let matched: Vec<usize> = candidate
                    .lines
                    .iter()
                    .copied()
                    .filter(|&index| {
                        let line = &lines[index];
                        let on_loop =
                            |p: Point2| candidate.points.iter().any(|q| q.is_close(p, tolerance));
                        on_loop(line.start) && on_loop(line.end)
                    })
                    .collect();
                fits.push(SegmentFit {
                    circle,
                    lines: matched,
                    is_closed: candidate.is_closed,
                });
            }
            Err(reason) => debug!(?reason, "线段环未能拟合为圆"),
        }
    }
    fits
}

/// 执行两轮重建，返回新的图元集合。
pub fn reconstruct(drawing: &TaggedDrawing, settings: &ReconstructionSettings) -> TaggedDrawing {
    let mut consumed = vec![false; drawing.len()];
    let mut circles: Vec<CircleFit> = Vec::new();

    for (index, item) in drawing.iter().enumerate() {
        let Primitive::Polyline(polyline) = &item.primitive else {
            continue;
        };
        if !polyline.is_closed || item.tag.is_deleted() {
            continue;
        }
        match fit_circle(&polyline.points(), &settings.fit) {
            Ok(fit) => {
                debug!(
                    id = item.id.get(),
                    x = fit.center.x(),
                    y = fit.center.y(),
                    radius = fit.radius,
                    "多段线拟合为圆"
                );
                consumed[index] = true;
                circles.push(fit);
            }
            Err(reason) => debug!(id = item.id.get(), ?reason, "多段线未能拟合为圆"),
        }
    }
    let polygon_fits = circles.len();

    let cut_lines: Vec<(usize, &Line)> = drawing
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match (&item.tag, &item.primitive) {
            (LayerTag::Cut, Primitive::Line(line)) => Some((index, line)),
            _ => None,
        })
        .collect();
    if cut_lines.len() > settings.min_cut_lines {
        let lines: Vec<Line> = cut_lines.iter().map(|(_, line)| (*line).clone()).collect();
        for fit in fit_segment_loops(&lines, &settings.fit) {
            for local in &fit.lines {
                consumed[cut_lines[*local].0] = true;
            }
            debug!(
                lines = fit.lines.len(),
                closed = fit.is_closed,
                radius = fit.circle.radius,
                "线段环拟合为圆"
            );
            circles.push(fit.circle);
        }
    } else {
        debug!(
            cut_lines = cut_lines.len(),
            threshold = settings.min_cut_lines,
            "CUT 直线数量不足，跳过线段重建"
        );
    }

    let mut result = drawing.empty_like();
    for (item, is_consumed) in drawing.iter().zip(&consumed) {
        if *is_consumed {
            result.push_item(item.retagged(LayerTag::Deleted));
        } else {
            result.push_item(item.clone());
        }
    }
    for fit in &circles {
        let radius = round_to(fit.radius, settings.radius_decimals);
        result.push(
            LayerTag::Drill,
            Primitive::Circle(Circle::new(fit.center, radius)),
            None,
        );
    }

    info!(
        polygon_fits,
        segment_fits = circles.len() - polygon_fits,
        deleted = consumed.iter().filter(|c| **c).count(),
        "圆孔重建完成"
    );
    result
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
