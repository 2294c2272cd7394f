/// 本地文件加载器
///
/// 相对于构造时给定的基础目录解析引用。引用先做 URI 解码，
/// 反斜杠统一为正斜杠；绝对路径和 `..` 段被视为不存在，
/// 加载器不会读到基础目录之外。
use super::{LoadError, UriLoader};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// 基于文件系统的加载器
#[derive(Debug, Clone)]
pub struct FileLoader {
    base: PathBuf,
}

impl FileLoader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// 基础目录
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// 把引用映射到基础目录下的文件路径
    fn local_path(&self, reference: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(reference).ok()?;
        let normalized = decoded.trim().replace('\\', "/");

        if normalized.is_empty() || normalized.starts_with('/') || normalized.contains(':') {
            return None;
        }

        let mut path = self.base.clone();
        for segment in normalized.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return None,
                s => path.push(s),
            }
        }
        Some(path)
    }
}

impl UriLoader for FileLoader {
    fn resolve(&self, path: &str) -> Result<Box<dyn Read + '_>, LoadError> {
        let local = self
            .local_path(path)
            .ok_or_else(|| LoadError::NotFound(path.to_string()))?;

        match File::open(&local) {
            Ok(file) => {
                tracing::debug!(reference = path, file = %local.display(), "Resolved resource");
                Ok(Box::new(BufReader::new(file)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LoadError::NotFound(path.to_string()))
            }
            Err(source) => Err(LoadError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}
