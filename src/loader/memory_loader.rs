/// 内存加载器
///
/// 远程客户端把资产的外部文件预取到内存后，用它喂给解码器。
use super::{LoadError, UriLoader};
use std::collections::HashMap;
use std::io::{Cursor, Read};

#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 构建器风格的插入
    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl UriLoader for MemoryLoader {
    fn resolve(&self, path: &str) -> Result<Box<dyn Read + '_>, LoadError> {
        // 先按原样查找，再按 URI 解码后的形式查找
        let bytes = self.files.get(path).or_else(|| {
            urlencoding::decode(path)
                .ok()
                .and_then(|decoded| self.files.get(decoded.as_ref()))
        });

        match bytes {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
            None => Err(LoadError::NotFound(path.to_string())),
        }
    }
}
