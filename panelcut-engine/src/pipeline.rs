//! 单张图纸的完整转换流程：读取 → 分类 → 重建 → 标注 → 输出 → 回读校验。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use panelcut_config::AppConfig;
use panelcut_core::document::{Document, Layer, TextStyle, ViewFit};
use panelcut_core::geometry::Bounds2D;
use panelcut_core::hole::HoleRecord;
use panelcut_core::layer::LayerTag;
use panelcut_io::{DocumentLoader, DocumentSaver, DxfFacade, read_hole_csv, sidecar_path};
use tracing::{debug, info};

use crate::bounds::aggregate_bounds;
use crate::classify::{InputStatistics, classify_document};
use crate::errors::EngineError;
use crate::layout::{TITLE_STYLE, annotate, fit_view};
use crate::model::TaggedDrawing;
use crate::reconstruct::{ReconstructionSettings, reconstruct};

/// 回读校验时必须存在的图层。
pub const REQUIRED_LAYERS: [LayerTag; 4] = [
    LayerTag::Cut,
    LayerTag::Drill,
    LayerTag::Annotation,
    LayerTag::Dimension,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// 只输出孔位标记，不生成尺寸线、孔位表、图例与标题。
    pub template_mode: bool,
    /// 孔位表路径；None 时使用与输入同名的 `.csv`。
    pub holes: Option<PathBuf>,
}

/// 各阶段处理后的结果，尚未写盘。
#[derive(Debug, Clone)]
pub struct ProcessedDrawing {
    pub drawing: TaggedDrawing,
    pub extents: Bounds2D,
    pub view: ViewFit,
}

impl ProcessedDrawing {
    /// 组装输出文档：固定的语义图层表、标题样式、按顺序排列的实体。
    pub fn to_document(&self, config: &AppConfig) -> Document {
        let mut document = Document::new();
        for tag in LayerTag::ALL {
            document.define_layer(Layer::for_tag(tag));
        }
        document.define_text_style(TextStyle::new(TITLE_STYLE, config.layout.title_font.clone()));
        for item in &self.drawing {
            document.add_primitive(item.primitive.clone(), item.tag.layer_name(), item.color);
        }
        document.set_extents(self.extents);
        document.set_view(self.view);
        document
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSummary {
    pub input_entities: usize,
    pub holes: usize,
    pub skipped_hole_rows: usize,
    pub output_entities: usize,
    pub per_layer: BTreeMap<LayerTag, usize>,
}

/// 内存中的纯处理流程，不访问文件系统。
pub fn process(
    document: &Document,
    holes: &[HoleRecord],
    drawing_name: &str,
    template_mode: bool,
    config: &AppConfig,
) -> Result<ProcessedDrawing, EngineError> {
    InputStatistics::collect(document).log();

    let classified = classify_document(document, &config.classifier)?;
    let reconstructed = reconstruct(&classified, &ReconstructionSettings::from_config(config));
    let annotated = annotate(
        &reconstructed,
        holes,
        drawing_name,
        template_mode,
        &config.layout,
    )?;

    let extents = aggregate_bounds(&annotated, None)?;
    let view = fit_view(&extents, &config.layout);
    debug!(
        min_x = extents.min_x(),
        min_y = extents.min_y(),
        max_x = extents.max_x(),
        max_y = extents.max_y(),
        view_height = view.height,
        "输出范围"
    );
    Ok(ProcessedDrawing {
        drawing: annotated,
        extents,
        view,
    })
}

/// 转换一张图纸并写出结果。失败时不会留下部分输出。
pub fn transform(
    input: &Path,
    output: &Path,
    options: &TransformOptions,
    config: &AppConfig,
) -> Result<TransformSummary, EngineError> {
    info!(input = %input.display(), output = %output.display(), "开始转换");
    let facade = DxfFacade::new();
    let document = facade.load(input)?;

    let holes_path = options
        .holes
        .clone()
        .unwrap_or_else(|| sidecar_path(input));
    let hole_table = read_hole_csv(&holes_path)?;

    let drawing_name = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let processed = process(
        &document,
        &hole_table.holes,
        &drawing_name,
        options.template_mode,
        config,
    )?;

    let out_document = processed.to_document(config);
    facade
        .save(&out_document, output)
        .map_err(|err| EngineError::EmissionFailure {
            path: output.to_path_buf(),
            reason: err.to_string(),
        })?;
    verify_output(&facade, output, out_document.entity_count())?;

    let mut per_layer = BTreeMap::new();
    for tag in LayerTag::ALL {
        per_layer.insert(tag, processed.drawing.count_tag(tag));
    }
    let summary = TransformSummary {
        input_entities: document.entity_count(),
        holes: hole_table.holes.len(),
        skipped_hole_rows: hole_table.skipped.len(),
        output_entities: out_document.entity_count(),
        per_layer,
    };
    info!(
        input_entities = summary.input_entities,
        output_entities = summary.output_entities,
        holes = summary.holes,
        "转换完成"
    );
    Ok(summary)
}

/// 回读输出文件，检查必需图层与实体数量。
fn verify_output(facade: &DxfFacade, path: &Path, expected: usize) -> Result<(), EngineError> {
    let failure = |reason: String| EngineError::EmissionFailure {
        path: path.to_path_buf(),
        reason,
    };
    let reread = facade
        .load(path)
        .map_err(|err| failure(format!("re-read failed: {err}")))?;

    for tag in REQUIRED_LAYERS {
        if reread.layer(tag.layer_name()).is_none() {
            return Err(failure(format!("missing layer {}", tag.layer_name())));
        }
    }
    let found = reread.entity_count();
    if found != expected {
        return Err(failure(format!(
            "entity count mismatch: expected {expected}, found {found}"
        )));
    }
    debug!(path = %path.display(), entities = found, "输出校验通过");
    Ok(())
}
