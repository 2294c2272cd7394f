//! 核心功能模块
//!
//! 本模块提供导入管线的基础功能：日志系统、配置管理和错误处理。
//! 这些模块与具体的场景格式和存储实现解耦。
//!
//! # 模块组织
//!
//! - `log`：日志系统，基于 tracing 的结构化日志
//! - `config`：配置管理，支持从 TOML 文件加载导入与打包设置
//! - `error`：错误处理，定义统一的错误类型

pub mod log;
pub mod config;
pub mod error;

// 重新导出常用类型，方便使用
pub use error::{Result, DistImportError, ImportError, PersistError, ConfigError};
pub use config::Config;
