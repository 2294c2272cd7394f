//! 日志系统模块
//!
//! 基于 `tracing` 提供结构化的日志记录功能。
//!
//! 管线内部只发出 `tracing` 事件，是否安装订阅者由调用方决定；
//! 命令行入口通过 [`init_logger`] 安装控制台（以及可选的文件）输出。
//!
//! # 使用示例
//!
//! ```no_run
//! use dist_import::core::log;
//! use dist_import::core::config::LogLevel;
//!
//! log::init_logger(LogLevel::Info, false, None).unwrap();
//!
//! tracing::info!(meshes = 3, "Import finished");
//! ```

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use std::path::Path;

use super::config::LogLevel;
use super::{DistImportError, Result};

/// 初始化日志系统
///
/// 必须在程序开始时调用一次；已有全局订阅者时返回 `DistImportError::Log`。
///
/// # 参数
///
/// * `level` - 日志级别
/// * `file_output` - 是否输出到文件
/// * `log_file_path` - 日志文件路径（可选，默认为 "dist_import.log"）
pub fn init_logger(level: LogLevel, file_output: bool, log_file_path: Option<&str>) -> Result<()> {
    let filter = EnvFilter::new(level.as_filter());

    if file_output {
        let log_path = log_file_path.unwrap_or("dist_import.log");
        let path = Path::new(log_path);
        let directory = path.parent().unwrap_or(Path::new("."));
        let filename = path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("dist_import.log");

        // 每天滚动
        let file_appender = RollingFileAppender::new(
            Rotation::DAILY,
            directory,
            filename
        );

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| DistImportError::Log(e.to_string()))
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| DistImportError::Log(e.to_string()))
    }
}

impl LogLevel {
    /// `EnvFilter` 使用的过滤字符串
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 管线日志 - Info 级别
#[macro_export]
macro_rules! import_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "dist_import::pipeline", $($arg)*)
    };
}

/// 管线日志 - Warn 级别
#[macro_export]
macro_rules! import_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "dist_import::pipeline", $($arg)*)
    };
}

/// 管线日志 - Error 级别
#[macro_export]
macro_rules! import_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "dist_import::pipeline", $($arg)*)
    };
}

/// 应用层日志 - Info 级别
#[macro_export]
macro_rules! app_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "dist_import::app", $($arg)*)
    };
}

/// 应用层日志 - Warn 级别
#[macro_export]
macro_rules! app_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "dist_import::app", $($arg)*)
    };
}

/// 应用层日志 - Error 级别
#[macro_export]
macro_rules! app_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "dist_import::app", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        // 测试进程里只有这里安装全局订阅者
        let _ = init_logger(LogLevel::Warn, false, None);
        let err = init_logger(LogLevel::Warn, false, None).unwrap_err();
        assert!(matches!(err, DistImportError::Log(_)));
    }

    #[test]
    fn test_filter_strings() {
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
    }
}
