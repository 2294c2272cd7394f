/// 资源加载器模块
///
/// 解码器通过 [`UriLoader`] 把场景描述中的相对引用（外部缓冲区、图片）
/// 解析为字节流，从而与实际的存储位置解耦。
///
/// # 实现
///
/// - [`FileLoader`]: 相对于一个固定的基础目录读取本地文件
/// - [`MemoryLoader`]: 从内存中的映射表读取（预取的远程数据、测试）
///
/// # 使用示例
///
/// ```rust,no_run
/// use dist_import::loader::{FileLoader, UriLoader, read_all};
///
/// let loader = FileLoader::new("assets/gltf");
/// let bytes = read_all(&loader, "model%20data.bin")?;
/// # Ok::<(), dist_import::loader::LoadError>(())
/// ```
use std::fmt;
use std::io::Read;

pub mod file_loader;
pub mod memory_loader;

pub use file_loader::FileLoader;
pub use memory_loader::MemoryLoader;

/// 加载器错误
#[derive(Debug)]
pub enum LoadError {
    /// 引用的资源不存在
    NotFound(String),

    /// 资源存在但读取失败
    Io { path: String, source: std::io::Error },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(path) => write!(f, "Resource not found: {}", path),
            LoadError::Io { path, source } => write!(f, "Failed to read '{}': {}", path, source),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::NotFound(_) => None,
        }
    }
}

/// 相对引用加载器 trait
///
/// # 实现要求
///
/// - 引用相对于构造时固定的基础位置解析，可能是 URI 编码的
/// - 找不到时返回 `LoadError::NotFound`
/// - 不要求缓存；多次解析同一引用不保证返回同一份字节
pub trait UriLoader {
    /// 把相对引用解析为可读的字节流
    fn resolve(&self, path: &str) -> Result<Box<dyn Read + '_>, LoadError>;
}

/// 解析引用并读出全部字节
pub fn read_all(loader: &dyn UriLoader, path: &str) -> Result<Vec<u8>, LoadError> {
    let mut reader = loader.resolve(path)?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|source| LoadError::Io {
        path: path.to_string(),
        source,
    })?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_all_through_trait_object() {
        let loader = MemoryLoader::new().with("a.bin", vec![1u8, 2, 3]);
        let dyn_loader: &dyn UriLoader = &loader;

        assert_eq!(read_all(dyn_loader, "a.bin").unwrap(), vec![1, 2, 3]);
        assert!(matches!(read_all(dyn_loader, "b.bin"), Err(LoadError::NotFound(_))));
    }
}
