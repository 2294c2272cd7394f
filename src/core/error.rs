//! 错误处理模块
//!
//! 定义了导入管线中使用的统一错误类型。
//!
//! # 错误分类
//!
//! - `ImportError::MissingResource`：加载器找不到被引用的缓冲区或图片（需要调用方介入）
//! - `ImportError::MalformedAsset`：场景描述或缓冲区内容不符合预期结构
//! - `PersistError::InconsistentState`：存储中已有的元数据形状不正确（需要人工处理）
//! - `PersistError::UnexpectedExistingArtifact`：持久化时的命名冲突（绝不自动覆盖）
//! - `Io` / `PersistError::Storage`：存储操作失败（调用方可重试）
//!
//! 管线内部从不重试，所有错误都带着路径或引用名直接返回给调用方。

use std::fmt;

/// 导入管线统一的 Result 类型
pub type Result<T> = std::result::Result<T, DistImportError>;

/// DistImport 的错误类型
#[derive(Debug)]
pub enum DistImportError {
    /// 配置错误
    Config(ConfigError),

    /// 解码错误
    Import(ImportError),

    /// 持久化错误
    Persist(PersistError),

    /// IO 错误
    Io(std::io::Error),

    /// 日志系统错误
    Log(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 解码相关的错误
#[derive(Debug)]
pub enum ImportError {
    /// 加载器报告引用的资源不存在
    MissingResource { reference: String },

    /// 描述或缓冲区内容无法按预期解析
    MalformedAsset { reference: String, reason: String },
}

/// 持久化相关的错误
#[derive(Debug)]
pub enum PersistError {
    /// 已存在的元数据形状不正确
    InconsistentState { path: String, reason: String },

    /// 目标路径上已经存在一个没有被任何元数据指向的容器
    UnexpectedExistingArtifact { path: String },

    /// 存储操作失败
    Storage { path: String, reason: String },
}

impl ImportError {
    pub fn missing(reference: impl Into<String>) -> Self {
        ImportError::MissingResource {
            reference: reference.into(),
        }
    }

    pub fn malformed(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        ImportError::MalformedAsset {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

impl PersistError {
    pub fn storage(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PersistError::Storage {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl DistImportError {
    /// 是否属于调用方可以直接重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DistImportError::Io(_) | DistImportError::Persist(PersistError::Storage { .. })
        )
    }
}

impl fmt::Display for DistImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistImportError::Config(e) => write!(f, "Configuration error: {}", e),
            DistImportError::Import(e) => write!(f, "Import error: {}", e),
            DistImportError::Persist(e) => write!(f, "Persist error: {}", e),
            DistImportError::Io(e) => write!(f, "IO error: {}", e),
            DistImportError::Log(msg) => write!(f, "Log error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::MissingResource { reference } => {
                write!(f, "Missing resource: '{}'", reference)
            }
            ImportError::MalformedAsset { reference, reason } => {
                write!(f, "Malformed asset '{}': {}", reference, reason)
            }
        }
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::InconsistentState { path, reason } => {
                write!(f, "Inconsistent package at '{}': {}", path, reason)
            }
            PersistError::UnexpectedExistingArtifact { path } => {
                write!(f, "Refusing to overwrite unexpected existing artifact '{}'", path)
            }
            PersistError::Storage { path, reason } => {
                write!(f, "Storage operation failed at '{}': {}", path, reason)
            }
        }
    }
}

impl std::error::Error for DistImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DistImportError::Config(e) => Some(e),
            DistImportError::Import(e) => Some(e),
            DistImportError::Persist(e) => Some(e),
            DistImportError::Io(e) => Some(e),
            DistImportError::Log(_) => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for ImportError {}
impl std::error::Error for PersistError {}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for DistImportError {
    fn from(err: std::io::Error) -> Self {
        DistImportError::Io(err)
    }
}

impl From<ConfigError> for DistImportError {
    fn from(err: ConfigError) -> Self {
        DistImportError::Config(err)
    }
}

impl From<ImportError> for DistImportError {
    fn from(err: ImportError) -> Self {
        DistImportError::Import(err)
    }
}

impl From<PersistError> for DistImportError {
    fn from(err: PersistError) -> Self {
        DistImportError::Persist(err)
    }
}
