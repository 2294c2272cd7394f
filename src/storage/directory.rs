//! 目录资产数据库
//!
//! 在 [`MemoryStore`] 之上，每次提交把容器写成根目录下对应包路径的
//! JSON 文件；[`DirectoryStore::open`] 读回所有容器和 guid 计数。

use std::fs;
use std::path::{Path, PathBuf};

use super::{
    AssetStore, Container, ContainerRef, Guid, MainObject, MemoryStore, ObjectRef, ReplaceMode,
    StoredNode, StoredObject,
};
use crate::core::{PersistError, Result};
use crate::package::PackageRecord;

#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    inner: MemoryStore,
}

impl DirectoryStore {
    /// 空的存储，目录在第一次提交时创建
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            inner: MemoryStore::new(),
        }
    }

    /// 打开已有的存储目录，读回其中所有容器
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(root);
        if !store.root.exists() {
            return Ok(store);
        }

        let mut files = Vec::new();
        collect_files(&store.root, &mut files)?;
        for file in files {
            let bytes = fs::read(&file)?;
            match serde_json::from_slice::<Container>(&bytes) {
                Ok(container) => store.inner.insert_loaded(container),
                Err(e) => {
                    tracing::warn!(
                        file = %file.display(),
                        error = %e,
                        "Skipping file that is not a container"
                    );
                }
            }
        }

        tracing::info!(
            root = %store.root.display(),
            containers = store.inner.len(),
            "Opened asset directory"
        );
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 包路径对应的文件路径
    pub fn file_path(&self, package_path: &str) -> PathBuf {
        package_path
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    fn write(&self, guid: Guid) -> Result<()> {
        let container = self
            .inner
            .container(guid)
            .ok_or_else(|| PersistError::storage(guid.to_string(), "no such container"))?;
        let file = self.file_path(&container.path);

        let json = serde_json::to_string_pretty(container)
            .map_err(|e| PersistError::storage(&container.path, e.to_string()))?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PersistError::storage(&container.path, e.to_string()))?;
        }
        fs::write(&file, json).map_err(|e| PersistError::storage(&container.path, e.to_string()))?;

        tracing::debug!(path = %container.path, file = %file.display(), "Wrote container");
        Ok(())
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

impl AssetStore for DirectoryStore {
    fn container(&self, guid: Guid) -> Option<&Container> {
        self.inner.container(guid)
    }

    fn find(&self, path: &str) -> Option<&Container> {
        self.inner.find(path)
    }

    fn create_container(&mut self, path: &str, main: MainObject) -> Result<ContainerRef> {
        self.inner.create_container(path, main)
    }

    fn add_sub_resource(&mut self, container: Guid, object: StoredObject) -> Result<ObjectRef> {
        self.inner.add_sub_resource(container, object)
    }

    fn remove_sub_resource(&mut self, object: ObjectRef) -> Result<()> {
        self.inner.remove_sub_resource(object)
    }

    fn set_record(&mut self, container: Guid, record: PackageRecord) -> Result<()> {
        self.inner.set_record(container, record)
    }

    fn replace_prefab(
        &mut self,
        container: Guid,
        root: StoredNode,
        mode: ReplaceMode,
    ) -> Result<()> {
        self.inner.replace_prefab(container, root, mode)
    }

    fn commit(&mut self, container: Guid) -> Result<()> {
        self.inner.commit(container)?;
        self.write(container)
    }
}
