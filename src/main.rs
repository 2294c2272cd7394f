//! DistImport - 命令行入口
//!
//! 把本地的 glTF 文件导入为资产包，写入存储目录。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件中的设置
//! cargo run -- models/chair/scene.gltf
//!
//! # FIT 到 50 个单位，自包含 prefab，输出到 build/
//! cargo run -- models/chair/scene.gltf --single --fit 50 --out build
//! ```
//!
//! # 流程
//!
//! ```text
//! ┌──────────────┐
//! │  config.toml │  配置 + 命令行覆盖
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ sniff + 解码  │  SchemaVersion → ImportResult（已缩放）
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │   持久化      │  separate / single → DirectoryStore
//! └──────────────┘
//! ```

use std::path::Path;

use anyhow::{bail, Context};

use dist_import::core::config::PersistStrategy;
use dist_import::core::{log, Config};
use dist_import::import::{self, SchemaVersion};
use dist_import::loader::FileLoader;
use dist_import::package::{self, PackageLayout, SourceInfo};
use dist_import::storage::DirectoryStore;
use dist_import::{app_error, app_info, app_warn};

/// 应用程序入口点
///
/// # 命令行参数
///
/// - `<path>`: 要导入的 `.gltf` / `.glb` 文件（第一个不以 `--` 开头的参数）
/// - `--single` / `--separate`: 持久化策略
/// - `--fit <size>` / `--scale <factor>` / `--no-scale`: 缩放策略
/// - `--no-center`: 不重新居中
/// - `--out <dir>`: 存储根目录
fn main() {
    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");

    // 2. 应用命令行参数
    let args: Vec<String> = std::env::args().skip(1).collect();
    config.apply_args(&args);

    // 3. 验证配置
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // 4. 初始化日志系统
    let log_file = if config.logging.file_output {
        Some(config.logging.log_file.as_str())
    } else {
        None
    };
    if let Err(e) = log::init_logger(config.logging.level, config.logging.file_output, log_file) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }
    app_info!(version = env!("CARGO_PKG_VERSION"), "DistImport starting...");

    if let Err(e) = run(&config, &args) {
        app_error!("Import failed: {:#}", e);
        eprintln!("Import failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let input = input_path(args).context("Usage: dist_import <scene.gltf|scene.glb> [options]")?;
    let input = Path::new(input);
    if !has_gltf_extension(input) {
        app_warn!(path = %input.display(), "Input is not .gltf or .glb, sniffing content");
    }

    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let Some(version) = SchemaVersion::sniff(&bytes) else {
        bail!("{} is not a glTF 1.0 or 2.0 document", input.display());
    };

    let base = input.parent().unwrap_or(Path::new("."));
    let loader = FileLoader::new(base);
    app_info!(
        path = %input.display(),
        ?version,
        mode = ?config.import.rescaling_mode,
        "Importing scene"
    );

    let result = import::decode(version, bytes.as_slice(), &loader, &config.import)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scene");
    let source = SourceInfo::new(stem, "unknown", stem);

    let mut store = DirectoryStore::open(&config.package.output_root)
        .with_context(|| format!("Failed to open store at {}", config.package.output_root))?;

    let asset = match config.package.strategy {
        PersistStrategy::Separate => package::persist_separate(
            &mut store,
            result,
            &source,
            &source.metadata_path(&config.package.assets_dir),
            &source.prefab_path(&config.package.prefabs_dir),
        ),
        PersistStrategy::Single => package::persist_single(
            &mut store,
            result,
            &source,
            &source.prefab_path(&config.package.prefabs_dir),
        ),
    }
    .context("Failed to persist package")?;

    match &asset.layout {
        PackageLayout::Separate { metadata } => app_info!(
            root = %asset.root_reference.path,
            metadata = %metadata.path,
            guid = %asset.root_reference.guid,
            "Package written"
        ),
        PackageLayout::Single { .. } => app_info!(
            root = %asset.root_reference.path,
            guid = %asset.root_reference.guid,
            "Package written"
        ),
    }
    Ok(())
}

fn has_gltf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("gltf") || e.eq_ignore_ascii_case("glb"))
        .unwrap_or(false)
}

/// 第一个不是选项、也不是选项值的参数
fn input_path(args: &[String]) -> Option<&str> {
    const WITH_VALUE: [&str; 3] = ["--fit", "--scale", "--out"];

    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if WITH_VALUE.contains(&arg.as_str()) {
            skip_next = true;
        } else if !arg.starts_with("--") {
            return Some(arg);
        }
    }
    None
}
