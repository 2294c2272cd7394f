//! 配置管理模块
//!
//! 提供导入工具配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [import]
//! rescaling_mode = "fit"   # none, convert, fit
//! scale_factor = 1.0
//! desired_size = 5.0
//! recenter = true
//!
//! [package]
//! output_root = "."
//! assets_dir = "Assets/Poly/Assets"
//! prefabs_dir = "Assets/Poly/Prefabs"
//! strategy = "separate"    # 或 "single"
//!
//! [logging]
//! level = "info"           # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};
use crate::import::{ImportOptions, RescalingMode};

/// 导入工具配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 导入选项（缩放策略）
    #[serde(default)]
    pub import: ImportOptions,

    /// 包输出配置
    #[serde(default)]
    pub package: PackageConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 包输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// 存储根目录（DirectoryStore 的根）
    #[serde(default = "default_output_root")]
    pub output_root: String,

    /// 元数据容器所在的目录（存储内的相对路径）
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// 根容器（prefab）所在的目录
    #[serde(default = "default_prefabs_dir")]
    pub prefabs_dir: String,

    /// 持久化策略
    #[serde(default = "default_strategy")]
    pub strategy: PersistStrategy,
}

/// 持久化策略选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistStrategy {
    /// 元数据容器 + 独立的根容器
    Separate,
    /// 单个自包含容器
    Single,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_output_root() -> String { ".".to_string() }
fn default_assets_dir() -> String { "Assets/Poly/Assets".to_string() }
fn default_prefabs_dir() -> String { "Assets/Poly/Prefabs".to_string() }
fn default_strategy() -> PersistStrategy { PersistStrategy::Separate }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "dist_import.log".to_string() }

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            assets_dir: default_assets_dir(),
            prefabs_dir: default_prefabs_dir(),
            strategy: default_strategy(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config {} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--single` / `--separate`: 选择持久化策略
    /// - `--fit <size>`: FIT 模式，目标尺寸
    /// - `--scale <factor>`: CONVERT 模式，缩放系数
    /// - `--no-scale`: 不缩放
    /// - `--no-center`: 不重新居中
    /// - `--out <dir>`: 存储根目录
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--single") {
            self.package.strategy = PersistStrategy::Single;
        }
        if args.iter().any(|a| a == "--separate") {
            self.package.strategy = PersistStrategy::Separate;
        }

        if let Some(size) = value_after(&args, "--fit").and_then(|v| v.parse().ok()) {
            self.import.rescaling_mode = RescalingMode::Fit;
            self.import.desired_size = size;
        }

        if let Some(factor) = value_after(&args, "--scale").and_then(|v| v.parse().ok()) {
            self.import.rescaling_mode = RescalingMode::Convert;
            self.import.scale_factor = factor;
        }

        if args.iter().any(|a| a == "--no-scale") {
            self.import.rescaling_mode = RescalingMode::None;
        }

        if args.iter().any(|a| a == "--no-center") {
            self.import.recenter = false;
        }

        if let Some(dir) = value_after(&args, "--out") {
            self.package.output_root = dir.to_string();
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        self.import.validate()?;

        if self.package.assets_dir.trim().is_empty() || self.package.prefabs_dir.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "package.assets_dir/prefabs_dir".to_string(),
                reason: "Package directories must not be empty".to_string(),
            }.into());
        }

        Ok(())
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1).map(|s| s.as_str())
}
