//! 策略 A：元数据容器 + 独立的 prefab 根容器
//!
//! 元数据容器每次重建（guid 不变），持有网格、材质、纹理；根节点树
//! 按名称替换已有的 prefab，未匹配的旧节点被丢弃。

use crate::core::{PersistError, Result};
use crate::scene::ImportResult;
use crate::storage::{AssetStore, MainObject, ReplaceMode};

use super::{
    attach_resources, inconsistent, stored_tree, PackageLayout, PackageRecord, PackagedAsset,
    SourceInfo,
};

/// 以元数据容器 + prefab 的形式持久化
///
/// 校验在任何修改之前完成：元数据形状不对返回 `InconsistentState`，
/// 没有元数据指向却已存在根容器返回 `UnexpectedExistingArtifact`，
/// 两种情况下存储都保持不变。
pub fn persist_separate<S: AssetStore + ?Sized>(
    store: &mut S,
    result: ImportResult,
    source: &SourceInfo,
    metadata_path: &str,
    root_path: &str,
) -> Result<PackagedAsset> {
    // 已有的根容器
    let prior_root = match store.find(metadata_path) {
        None => None,
        Some(container) => {
            let record = container.record().ok_or_else(|| {
                inconsistent(
                    metadata_path,
                    "existing container is not a package metadata container",
                )
            })?;
            let root = record
                .root
                .as_ref()
                .ok_or_else(|| inconsistent(metadata_path, "metadata has no root reference"))?;
            let target = store.container(root.guid).ok_or_else(|| {
                inconsistent(
                    metadata_path,
                    format!("root reference '{}' points at a missing container", root.path),
                )
            })?;
            if target.prefab().is_none() {
                return Err(inconsistent(
                    metadata_path,
                    format!("root reference '{}' is not a prefab", target.path),
                ));
            }
            Some(target.reference())
        }
    };

    if prior_root.is_none() && store.find(root_path).is_some() {
        return Err(PersistError::UnexpectedExistingArtifact {
            path: root_path.to_string(),
        }
        .into());
    }

    // 重建期间记录仍指向旧根，中途失败后可以重试
    let mut record = PackageRecord::new(source.title.clone(), source.clone());
    record.root = prior_root.clone();
    let metadata = store.create_container(metadata_path, MainObject::Metadata(record.clone()))?;
    store.commit(metadata.guid)?;

    let attached = attach_resources(store, metadata.guid, &result)?;

    let mut root = stored_tree(result.root(), &source.title, Some(&attached));
    root.package_link = Some(metadata.guid);

    let root_reference = match prior_root {
        Some(existing) => {
            store.replace_prefab(existing.guid, root, ReplaceMode::NameBased)?;
            store.commit(existing.guid)?;
            existing
        }
        None => {
            let created = store.create_container(root_path, MainObject::Prefab(root))?;
            store.commit(created.guid)?;
            created
        }
    };

    record.root = Some(root_reference.clone());
    record.persisted = true;
    store.set_record(metadata.guid, record)?;
    store.commit(metadata.guid)?;

    crate::import_info!(
        metadata = %metadata.path,
        root = %root_reference.path,
        guid = %root_reference.guid,
        "Persisted package (separate)"
    );

    Ok(PackagedAsset {
        title: source.title.clone(),
        source: source.clone(),
        root_reference,
        layout: PackageLayout::Separate { metadata },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DistImportError;
    use crate::import::{self, fixtures, ImportOptions, RescalingMode, SchemaVersion};
    use crate::scene::Transform;
    use crate::storage::{
        Container, ContainerRef, DirectoryStore, Guid, MemoryStore, ObjectRef, StoredNode,
        StoredObject,
    };

    const METADATA: &str = "Assets/Poly/Assets/Tri_Me_1.asset";
    const ROOT: &str = "Assets/Poly/Prefabs/Tri_Me_1.prefab";

    fn source() -> SourceInfo {
        SourceInfo::new("Tri", "Me", "assets_1")
    }

    fn triangle(options: &ImportOptions) -> ImportResult {
        let bytes = serde_json::to_vec(&fixtures::triangle_v1()).unwrap();
        let loader = fixtures::triangle_v1_loader();
        import::decode(SchemaVersion::V1, bytes.as_slice(), &loader, options).unwrap()
    }

    fn persist<S: AssetStore>(store: &mut S) -> Result<PackagedAsset> {
        persist_separate(store, triangle(&fit_50()), &source(), METADATA, ROOT)
    }

    fn prefab(name: &str) -> StoredNode {
        StoredNode::new(name, Transform::identity())
    }

    fn fit_50() -> ImportOptions {
        ImportOptions {
            rescaling_mode: RescalingMode::Fit,
            desired_size: 50.0,
            ..ImportOptions::default()
        }
    }

    #[test]
    fn test_triangle_fit_and_persist() {
        let result = triangle(&fit_50());
        assert!((result.world_bounds().max_extent() - 50.0).abs() < 1e-3);

        let mut store = MemoryStore::new();
        let asset = persist_separate(&mut store, result, &source(), METADATA, ROOT).unwrap();

        let root = store.find(ROOT).unwrap().prefab().unwrap().clone();
        let mut mesh_nodes = Vec::new();
        collect_mesh_nodes(&root, &mut mesh_nodes);
        assert_eq!(mesh_nodes.len(), 1);
        assert_eq!(mesh_nodes[0].mesh_instances.len(), 1);
        assert!((root.transform.scale.x - 50.0).abs() < 1e-3);

        let metadata = store.find(METADATA).unwrap();
        assert_eq!(root.package_link, Some(metadata.guid));
        assert_eq!(metadata.count_of("mesh"), 1);
        assert_eq!(metadata.count_of("material"), 1);
        assert_eq!(metadata.count_of("texture"), 1);

        let record = metadata.record().unwrap();
        assert!(record.persisted);
        assert_eq!(record.root.as_ref(), Some(&asset.root_reference));

        // 所有引用都指向元数据容器中存在的对象
        for object in root.referenced_objects() {
            let container = store.container(object.container).unwrap();
            assert!(container.sub_resource(object.local_id).is_some());
        }

        let reopened = PackagedAsset::open(&store, METADATA).unwrap();
        assert_eq!(reopened, asset);
    }

    fn collect_mesh_nodes<'a>(node: &'a StoredNode, out: &mut Vec<&'a StoredNode>) {
        if !node.mesh_instances.is_empty() {
            out.push(node);
        }
        for child in &node.children {
            collect_mesh_nodes(child, out);
        }
    }

    #[test]
    fn test_repeat_persist_is_idempotent() {
        let mut store = MemoryStore::new();
        let first = persist(&mut store).unwrap();
        let first_root = store.find(ROOT).unwrap().prefab().unwrap().clone();
        let first_count = store.find(METADATA).unwrap().sub_resources.len();

        let second = persist(&mut store).unwrap();
        let second_root = store.find(ROOT).unwrap().prefab().unwrap().clone();

        assert_eq!(first.root_reference.guid, second.root_reference.guid);
        assert_eq!(store.find(METADATA).unwrap().sub_resources.len(), first_count);
        assert_eq!(store.len(), 2);
        assert_eq!(first_root.children[0].file_id, second_root.children[0].file_id);
    }

    #[test]
    fn test_unexpected_root_artifact_leaves_store_unchanged() {
        let mut store = MemoryStore::new();
        store
            .create_container(ROOT, MainObject::Prefab(prefab("manual")))
            .unwrap();

        let err = persist(&mut store).unwrap_err();

        assert!(matches!(
            err,
            DistImportError::Persist(PersistError::UnexpectedExistingArtifact { .. })
        ));
        assert!(store.find(METADATA).is_none());
        assert_eq!(store.find(ROOT).unwrap().prefab().unwrap().name, "manual");
    }

    #[test]
    fn test_malformed_metadata_is_inconsistent() {
        let mut store = MemoryStore::new();
        // 元数据路径上是一个没有根引用的记录
        store
            .create_container(METADATA, MainObject::Metadata(PackageRecord::new("Tri", source())))
            .unwrap();

        let err = persist(&mut store).unwrap_err();
        assert!(matches!(
            err,
            DistImportError::Persist(PersistError::InconsistentState { .. })
        ));
        assert!(store.find(ROOT).is_none());

        // 元数据路径上是一个 prefab
        let mut store = MemoryStore::new();
        store
            .create_container(METADATA, MainObject::Prefab(prefab("x")))
            .unwrap();
        let err = persist(&mut store).unwrap_err();
        assert!(matches!(
            err,
            DistImportError::Persist(PersistError::InconsistentState { .. })
        ));
    }

    #[test]
    fn test_persist_into_directory_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let asset = {
            let mut store = DirectoryStore::new(dir.path());
            persist(&mut store).unwrap()
        };

        let store = DirectoryStore::open(dir.path()).unwrap();
        let reopened = PackagedAsset::open(&store, METADATA).unwrap();
        assert_eq!(reopened.root_reference, asset.root_reference);

        let metadata = store.find(METADATA).unwrap();
        let mesh = metadata
            .sub_resources
            .values()
            .find_map(|o| match o {
                crate::storage::StoredObject::Mesh(mesh) => Some(mesh),
                _ => None,
            })
            .unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 2, 1]);
    }

    /// 在内存存储外包一层，可以让 prefab 替换失败
    struct FlakyStore {
        inner: MemoryStore,
        fail_replace: bool,
    }

    impl AssetStore for FlakyStore {
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
            if self.fail_replace {
                return Err(PersistError::storage(container.to_string(), "disk full").into());
            }
            self.inner.replace_prefab(container, root, mode)
        }

        fn commit(&mut self, container: Guid) -> Result<()> {
            self.inner.commit(container)
        }
    }

    #[test]
    fn test_retry_after_failed_replace() {
        let mut store = FlakyStore {
            inner: MemoryStore::new(),
            fail_replace: false,
        };
        let first = persist(&mut store).unwrap();

        store.fail_replace = true;
        let err = persist(&mut store).unwrap_err();
        assert!(matches!(err, DistImportError::Persist(PersistError::Storage { .. })));

        // 中断后的记录仍指向旧根，只是未完成
        let record = store.find(METADATA).unwrap().record().unwrap();
        assert_eq!(record.root.as_ref(), Some(&first.root_reference));
        assert!(!record.persisted);

        store.fail_replace = false;
        let retried = persist(&mut store).unwrap();
        assert_eq!(retried.root_reference.guid, first.root_reference.guid);
        let record = store.find(METADATA).unwrap().record().unwrap();
        assert!(record.persisted);
        assert_eq!(store.inner.len(), 2);
    }
}
