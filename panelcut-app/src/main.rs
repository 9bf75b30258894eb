use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use panelcut_config::{AppConfig, ConfigError};
use panelcut_engine::report::report_file;
use panelcut_engine::{TransformOptions, transform};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

/// 板件 DXF 分层、圆孔重建与标注工具。
#[derive(Debug, Parser)]
#[command(name = "panelcut", version, about = "Reorganize panel DXF drawings into CNC layers")]
struct Cli {
    /// Configuration file; defaults to $PANELCUT_CONFIG or ./config/default.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify, rebuild holes and annotate one drawing
    Transform {
        input: PathBuf,
        output: PathBuf,
        /// Emit hole markers only (no dimensions, table, legend or title)
        #[arg(long)]
        template: bool,
        /// Hole table CSV; defaults to the input path with a .csv extension
        #[arg(long)]
        holes: Option<PathBuf>,
    },
    /// Count entities per layer in a DXF file or every DXF under a directory
    Report { path: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone());
    init_logging(&config);

    if let Err(err) = run(cli.command, &config) {
        error!(error = %err, "执行失败");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Transform {
            input,
            output,
            template,
            holes,
        } => {
            let options = TransformOptions {
                template_mode: template,
                holes,
            };
            let summary = transform(&input, &output, &options, config)
                .with_context(|| format!("failed to transform {}", input.display()))?;
            println!(
                "{} -> {}: {} entities in, {} entities out, {} holes",
                input.display(),
                output.display(),
                summary.input_entities,
                summary.output_entities,
                summary.holes
            );
            for (tag, count) in &summary.per_layer {
                println!("  {tag}: {count}");
            }
            Ok(())
        }
        Command::Report { path } => report(&path),
    }
}

fn report(path: &Path) -> anyhow::Result<()> {
    if path.is_file() {
        let report = report_file(path)?;
        println!("{report}");
        return Ok(());
    }
    if !path.is_dir() {
        bail!("invalid path '{}'", path.display());
    }

    let mut analyzed = 0usize;
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
        if !entry.file_type().is_file() || !is_dxf(entry.path()) {
            continue;
        }
        match report_file(entry.path()) {
            Ok(report) => {
                println!("{report}");
                analyzed += 1;
            }
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "跳过无法读取的文件");
                println!("Invalid or unreadable DXF file: {} ({err})", entry.path().display());
            }
        }
    }
    info!(files = analyzed, "统计完成");
    Ok(())
}

fn is_dxf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("dxf"))
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Invalid { .. } | ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn transform_flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "panelcut",
            "transform",
            "in.dxf",
            "out.dxf",
            "--template",
            "--holes",
            "h.csv",
        ])
        .expect("parse");
        match cli.command {
            Command::Transform {
                input,
                template,
                holes,
                ..
            } => {
                assert_eq!(input, PathBuf::from("in.dxf"));
                assert!(template);
                assert_eq!(holes, Some(PathBuf::from("h.csv")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn dxf_extension_is_case_insensitive() {
        assert!(is_dxf(Path::new("a/B.DXF")));
        assert!(is_dxf(Path::new("c.dxf")));
        assert!(!is_dxf(Path::new("c.csv")));
        assert!(!is_dxf(Path::new("dxf")));
    }
}
