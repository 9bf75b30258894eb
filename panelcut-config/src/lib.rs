use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV_VAR: &str = "PANELCUT_CONFIG";

/// 应用配置的根结构。所有字段都有默认值，配置文件只需写出要覆盖的项。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub reconstruction: ReconstructionConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `PANELCUT_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 检查数值参数的取值范围。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.classifier.slot_max_size > 0.0) {
            return Err(ConfigError::invalid(format!(
                "classifier.slot_max_size 必须为正数，实际为 {}",
                self.classifier.slot_max_size
            )));
        }
        let tolerance = self.reconstruction.radius_tolerance;
        if !(tolerance > 0.0 && tolerance < 1.0) {
            return Err(ConfigError::invalid(format!(
                "reconstruction.radius_tolerance 必须位于 (0, 1)，实际为 {tolerance}"
            )));
        }
        if !(self.reconstruction.point_tolerance > 0.0) {
            return Err(ConfigError::invalid(format!(
                "reconstruction.point_tolerance 必须为正数，实际为 {}",
                self.reconstruction.point_tolerance
            )));
        }
        let sheet = &self.layout;
        if sheet.sheet_width <= 2.0 * sheet.sheet_margin
            || sheet.sheet_height <= 2.0 * sheet.sheet_margin
        {
            return Err(ConfigError::invalid(
                "layout.sheet_margin 超出图纸尺寸的一半".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 图层分类阈值。
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// 槽孔的最大外形尺寸；圆弧半径不超过其一半、闭合多段线宽高均不超过它时归入 DRILL。
    #[serde(default = "ClassifierConfig::default_slot_max_size")]
    pub slot_max_size: f64,
}

impl ClassifierConfig {
    fn default_slot_max_size() -> f64 {
        10.0
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            slot_max_size: Self::default_slot_max_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconstructionConfig {
    /// 各点到圆心距离与半径的相对容差。
    #[serde(default = "ReconstructionConfig::default_radius_tolerance")]
    pub radius_tolerance: f64,
    /// CUT 直线数超过该值时才尝试由线段重建圆孔。
    #[serde(default = "ReconstructionConfig::default_min_cut_lines")]
    pub min_cut_lines: usize,
    /// 端点视为重合的距离。
    #[serde(default = "ReconstructionConfig::default_point_tolerance")]
    pub point_tolerance: f64,
    /// 重建圆半径保留的小数位数。
    #[serde(default = "ReconstructionConfig::default_radius_decimals")]
    pub radius_decimals: u32,
}

impl ReconstructionConfig {
    fn default_radius_tolerance() -> f64 {
        0.1
    }

    fn default_min_cut_lines() -> usize {
        8
    }

    fn default_point_tolerance() -> f64 {
        1e-6
    }

    fn default_radius_decimals() -> u32 {
        1
    }
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            radius_tolerance: Self::default_radius_tolerance(),
            min_cut_lines: Self::default_min_cut_lines(),
            point_tolerance: Self::default_point_tolerance(),
            radius_decimals: Self::default_radius_decimals(),
        }
    }
}

/// 标注布局参数，长度单位均为毫米。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub dimension_offset: f64,
    pub dimension_spacing: f64,
    pub side_marker_size: f64,
    pub planar_marker_size: f64,
    pub label_height: f64,
    pub name_label_offset: f64,
    pub size_label_offset: f64,
    pub table_gap: f64,
    pub table_text_height: f64,
    pub table_column_widths: [f64; 6],
    pub legend_gap: f64,
    pub title_height: f64,
    pub title_gap: f64,
    pub title_font: String,
    pub sheet_width: f64,
    pub sheet_height: f64,
    pub sheet_margin: f64,
    pub view_margin: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            dimension_offset: 25.0,
            dimension_spacing: 8.0,
            side_marker_size: 6.0,
            planar_marker_size: 3.0,
            label_height: 2.5,
            name_label_offset: 10.0,
            size_label_offset: 5.0,
            table_gap: 20.0,
            table_text_height: 2.5,
            table_column_widths: [50.0, 20.0, 20.0, 20.0, 20.0, 20.0],
            legend_gap: 20.0,
            title_height: 10.0,
            title_gap: 20.0,
            title_font: "ISOCPEUR.ttf".to_string(),
            sheet_width: 297.0,
            sheet_height: 210.0,
            sheet_margin: 10.0,
            view_margin: 1.1,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置取值无效: {message}")]
    Invalid { message: String },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert!((cfg.classifier.slot_max_size - 10.0).abs() < f64::EPSILON);
        assert!((cfg.reconstruction.radius_tolerance - 0.1).abs() < f64::EPSILON);
        assert_eq!(cfg.reconstruction.min_cut_lines, 8);
        assert_eq!(cfg.reconstruction.radius_decimals, 1);
        assert!((cfg.layout.dimension_offset - 25.0).abs() < f64::EPSILON);
        assert_eq!(cfg.layout.title_font, "ISOCPEUR.ttf");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [classifier]
            slot_max_size = 12.5

            [reconstruction]
            radius_tolerance = 0.05
            min_cut_lines = 4

            [layout]
            dimension_spacing = 10.0
            title_font = "Arial.ttf"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert!((cfg.classifier.slot_max_size - 12.5).abs() < f64::EPSILON);
        assert!((cfg.reconstruction.radius_tolerance - 0.05).abs() < f64::EPSILON);
        assert_eq!(cfg.reconstruction.min_cut_lines, 4);
        assert!((cfg.reconstruction.point_tolerance - 1e-6).abs() < f64::EPSILON);
        assert!((cfg.layout.dimension_spacing - 10.0).abs() < f64::EPSILON);
        assert!((cfg.layout.dimension_offset - 25.0).abs() < f64::EPSILON);
        assert_eq!(cfg.layout.title_font, "Arial.ttf");
    }

    #[test]
    fn out_of_range_tolerance_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[reconstruction]\nradius_tolerance = 1.5").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[classifier\nslot_max_size = ").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
