//! 内存资产数据库
//!
//! 参考实现：按 guid 保存容器，维护路径索引，容器内分配本地 ID。

use std::collections::{BTreeMap, HashMap};

use super::prefab;
use super::{
    AssetStore, Container, ContainerRef, Guid, MainObject, ObjectRef, ReplaceMode, StoredNode,
    StoredObject,
};
use crate::core::{PersistError, Result};
use crate::package::PackageRecord;
use crate::scene::Transform;

#[derive(Debug, Clone)]
pub struct MemoryStore {
    containers: BTreeMap<Guid, Container>,
    paths: HashMap<String, Guid>,
    next_guid: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            containers: BTreeMap::new(),
            paths: HashMap::new(),
            next_guid: 1,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// 所有容器，按 guid 排序
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    /// 放入一个从持久化介质读回的容器
    pub(crate) fn insert_loaded(&mut self, container: Container) {
        self.next_guid = self.next_guid.max(container.guid.0 + 1);
        self.paths.insert(container.path.clone(), container.guid);
        self.containers.insert(container.guid, container);
    }

    fn container_mut(&mut self, guid: Guid) -> Result<&mut Container> {
        self.containers
            .get_mut(&guid)
            .ok_or_else(|| PersistError::storage(guid.to_string(), "no such container").into())
    }
}

impl AssetStore for MemoryStore {
    fn container(&self, guid: Guid) -> Option<&Container> {
        self.containers.get(&guid)
    }

    fn find(&self, path: &str) -> Option<&Container> {
        self.paths.get(path).and_then(|guid| self.containers.get(guid))
    }

    fn create_container(&mut self, path: &str, main: MainObject) -> Result<ContainerRef> {
        if path.trim().is_empty() {
            return Err(PersistError::storage(path, "container path must not be empty").into());
        }

        // 重建时保留 guid，本地 ID 继续递增以免旧引用指向新对象
        let existing = self.find(path).map(|c| (c.guid, c.next_local_id));
        let (guid, next_local_id) = match existing {
            Some(existing) => existing,
            None => {
                let guid = Guid(self.next_guid);
                self.next_guid += 1;
                (guid, 1)
            }
        };

        let mut next = next_local_id;
        let main = match main {
            MainObject::Prefab(root) => MainObject::Prefab(prefab::assign_ids(root, &mut || {
                let id = next;
                next += 1;
                id
            })),
            other => other,
        };

        let container = Container {
            guid,
            path: path.to_string(),
            main,
            sub_resources: BTreeMap::new(),
            next_local_id: next,
            committed: false,
        };

        let reference = container.reference();
        self.paths.insert(reference.path.clone(), guid);
        self.containers.insert(guid, container);
        tracing::debug!(path, guid = %guid, "Created container");
        Ok(reference)
    }

    fn add_sub_resource(&mut self, guid: Guid, object: StoredObject) -> Result<ObjectRef> {
        let container = self.container_mut(guid)?;
        if !container.committed {
            return Err(PersistError::storage(
                container.path.clone(),
                "cannot attach sub-resources to a container that has not been committed",
            )
            .into());
        }

        let local_id = container.allocate_id();
        container.sub_resources.insert(local_id, object);
        Ok(ObjectRef {
            container: guid,
            local_id,
        })
    }

    fn remove_sub_resource(&mut self, object: ObjectRef) -> Result<()> {
        let container = self.container_mut(object.container)?;
        match container.sub_resources.remove(&object.local_id) {
            Some(_) => Ok(()),
            None => Err(PersistError::storage(
                container.path.clone(),
                format!("no sub-resource with local id {}", object.local_id),
            )
            .into()),
        }
    }

    fn set_record(&mut self, guid: Guid, record: PackageRecord) -> Result<()> {
        let container = self.container_mut(guid)?;
        match &mut container.main {
            MainObject::Metadata(existing) => {
                *existing = record;
                Ok(())
            }
            MainObject::Prefab(_) => Err(PersistError::storage(
                container.path.clone(),
                "container does not hold a metadata record",
            )
            .into()),
        }
    }

    fn replace_prefab(&mut self, guid: Guid, root: StoredNode, mode: ReplaceMode) -> Result<()> {
        let container = self.container_mut(guid)?;
        let placeholder = MainObject::Prefab(StoredNode::new("", Transform::identity()));
        let old = match std::mem::replace(&mut container.main, placeholder) {
            MainObject::Prefab(old) => old,
            other => {
                container.main = other;
                return Err(PersistError::storage(
                    container.path.clone(),
                    "container does not hold a prefab",
                )
                .into());
            }
        };

        let mut next = container.next_local_id;
        let merged = prefab::merge(old, root, mode, &mut || {
            let id = next;
            next += 1;
            id
        });
        container.next_local_id = next;
        container.main = MainObject::Prefab(merged);
        Ok(())
    }

    fn commit(&mut self, guid: Guid) -> Result<()> {
        self.container_mut(guid)?.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::TextureResource;

    fn texture() -> StoredObject {
        StoredObject::Texture(TextureResource {
            name: "t".to_string(),
            source: "uri:t.png".to_string(),
            format: "png".to_string(),
            width: 1,
            height: 1,
            encoded: vec![1, 2, 3],
        })
    }

    fn prefab(children: &[&str]) -> MainObject {
        let mut root = StoredNode::new("root", Transform::identity());
        for name in children {
            root.children.push(StoredNode::new(*name, Transform::identity()));
        }
        MainObject::Prefab(root)
    }

    #[test]
    fn test_attach_requires_commit() {
        let mut store = MemoryStore::new();
        let container = store.create_container("a.prefab", prefab(&[])).unwrap();

        assert!(store.add_sub_resource(container.guid, texture()).is_err());
        store.commit(container.guid).unwrap();
        let object = store.add_sub_resource(container.guid, texture()).unwrap();

        assert_eq!(object.container, container.guid);
        assert!(store.container(container.guid).unwrap().sub_resource(object.local_id).is_some());
    }

    #[test]
    fn test_recreate_keeps_guid_and_drops_sub_resources() {
        let mut store = MemoryStore::new();
        let first = store.create_container("a.prefab", prefab(&["x"])).unwrap();
        store.commit(first.guid).unwrap();
        let old_object = store.add_sub_resource(first.guid, texture()).unwrap();

        let second = store.create_container("a.prefab", prefab(&["x"])).unwrap();
        let container = store.find("a.prefab").unwrap();

        assert_eq!(first.guid, second.guid);
        assert!(container.sub_resources.is_empty());
        assert!(!container.committed);
        assert!(container.next_local_id > old_object.local_id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_node_ids_assigned_on_create() {
        let mut store = MemoryStore::new();
        let c = store.create_container("a.prefab", prefab(&["x", "y"])).unwrap();
        let root = store.container(c.guid).unwrap().prefab().unwrap().clone();

        assert_ne!(root.file_id, 0);
        assert!(root.children.iter().all(|n| n.file_id != 0));
        assert_ne!(root.children[0].file_id, root.children[1].file_id);
    }

    #[test]
    fn test_replace_on_metadata_container_fails() {
        let mut store = MemoryStore::new();
        let record = PackageRecord::new("t", Default::default());
        let c = store.create_container("a.asset", MainObject::Metadata(record)).unwrap();

        let root = StoredNode::new("r", Transform::identity());
        let err = store
            .replace_prefab(c.guid, root, ReplaceMode::NameBased)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::core::DistImportError::Persist(PersistError::Storage { .. })
        ));
        assert!(store.container(c.guid).unwrap().record().is_some());
    }
}
