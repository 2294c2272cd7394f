//! 策略 B：自包含的 prefab 容器
//!
//! 网格、材质、纹理和元数据记录都是根容器的子资源。新建时分两阶段：
//! 先以未绑定的引用创建并提交容器，再挂载子资源并替换为绑定后的节点树。
//! 已有容器按名称合并，未匹配的旧节点保留。

use crate::core::{PersistError, Result};
use crate::scene::ImportResult;
use crate::storage::{AssetStore, Guid, MainObject, ObjectRef, ReplaceMode, StoredObject};

use super::{
    attach_resources, naming, stored_tree, PackageLayout, PackageRecord, PackagedAsset, SourceInfo,
};

/// 再次持久化时如何处理上一次留下的子资源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleResources {
    /// 先删除旧的网格、材质、纹理和元数据
    #[default]
    Purge,
    /// 原样保留，子资源会随每次导入累积
    Keep,
}

/// 以自包含 prefab 的形式持久化，旧子资源会被清除
pub fn persist_single<S: AssetStore + ?Sized>(
    store: &mut S,
    result: ImportResult,
    source: &SourceInfo,
    root_path: &str,
) -> Result<PackagedAsset> {
    persist_single_with(store, result, source, root_path, StaleResources::Purge)
}

/// 以自包含 prefab 的形式持久化
///
/// 包标题取自 `root_path` 的文件名。路径上已有的容器不是 prefab 时
/// 返回 `UnexpectedExistingArtifact`，存储保持不变。
pub fn persist_single_with<S: AssetStore + ?Sized>(
    store: &mut S,
    result: ImportResult,
    source: &SourceInfo,
    root_path: &str,
    stale: StaleResources,
) -> Result<PackagedAsset> {
    let title = naming::file_stem(root_path).to_string();

    let existing = match store.find(root_path) {
        Some(container) if container.prefab().is_none() => {
            return Err(PersistError::UnexpectedExistingArtifact {
                path: root_path.to_string(),
            }
            .into());
        }
        Some(container) => Some(container.reference()),
        None => None,
    };

    let (root_reference, mode) = match existing {
        Some(reference) => {
            if stale == StaleResources::Purge {
                purge_stale_sub_resources(store, reference.guid)?;
            }
            (reference, ReplaceMode::MergeByName)
        }
        None => {
            // 第一阶段：引用未绑定
            let unbound = stored_tree(result.root(), &title, None);
            let created = store.create_container(root_path, MainObject::Prefab(unbound))?;
            store.commit(created.guid)?;
            (created, ReplaceMode::NameBased)
        }
    };

    let attached = attach_resources(store, root_reference.guid, &result)?;
    let mut root = stored_tree(result.root(), &title, Some(&attached));
    root.package_link = Some(root_reference.guid);
    store.replace_prefab(root_reference.guid, root, mode)?;

    let mut record = PackageRecord::new(title.clone(), source.clone());
    record.root = Some(root_reference.clone());
    record.persisted = true;
    let record_ref = store.add_sub_resource(root_reference.guid, StoredObject::Metadata(record))?;
    store.commit(root_reference.guid)?;

    crate::import_info!(
        root = %root_reference.path,
        guid = %root_reference.guid,
        ?stale,
        "Persisted package (single)"
    );

    Ok(PackagedAsset {
        title,
        source: source.clone(),
        root_reference,
        layout: PackageLayout::Single { record: record_ref },
    })
}

/// 删除容器中所有网格、材质、纹理和元数据子资源，返回删除的数量
pub fn purge_stale_sub_resources<S: AssetStore + ?Sized>(
    store: &mut S,
    guid: Guid,
) -> Result<usize> {
    let stale: Vec<ObjectRef> = match store.container(guid) {
        Some(container) => container
            .sub_resources
            .keys()
            .map(|&local_id| ObjectRef {
                container: guid,
                local_id,
            })
            .collect(),
        None => {
            return Err(PersistError::storage(guid.to_string(), "no such container").into());
        }
    };

    for object in &stale {
        store.remove_sub_resource(*object)?;
    }
    tracing::debug!(guid = %guid, removed = stale.len(), "Purged stale sub-resources");
    Ok(stale.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DistImportError;
    use crate::import::{self, fixtures, ImportOptions, SchemaVersion};
    use crate::loader::MemoryLoader;
    use crate::storage::{Container, MemoryStore, StoredObject};

    const ROOT: &str = "Assets/Prefabs/Tri_01.prefab";

    fn source() -> SourceInfo {
        SourceInfo::new("Tri", "Me", "1")
    }

    fn import_v1(document: serde_json::Value) -> ImportResult {
        import_v1_with(document, &fixtures::triangle_v1_loader())
    }

    fn import_v1_with(document: serde_json::Value, loader: &MemoryLoader) -> ImportResult {
        let bytes = serde_json::to_vec(&document).unwrap();
        import::decode(SchemaVersion::V1, bytes.as_slice(), loader, &ImportOptions::default())
            .unwrap()
    }

    /// 同一个节点，但网格、材质、纹理都换成了新的
    fn reworked_triangle() -> ImportResult {
        let mut document = fixtures::triangle_v1();
        document["meshes"]["mesh_tri"]["name"] = serde_json::json!("TriangleMeshV2");
        document["materials"]["mat_a"]["name"] = serde_json::json!("Blue");
        document["images"]["img"]["uri"] = serde_json::json!("tex2.png");
        let loader = MemoryLoader::new()
            .with("triangle.bin", fixtures::triangle_bin())
            .with("tex2.png", fixtures::png(8, 8));
        import_v1_with(document, &loader)
    }

    fn names_of(container: &Container, kind: &str) -> Vec<String> {
        let mut names: Vec<String> = container
            .sub_resources
            .values()
            .filter(|o| o.kind() == kind)
            .filter_map(|o| match o {
                StoredObject::Mesh(mesh) => Some(mesh.name.clone()),
                StoredObject::Material(material) => Some(material.name.clone()),
                StoredObject::Texture(texture) => Some(texture.name.clone()),
                StoredObject::Metadata(_) => None,
            })
            .collect();
        names.sort();
        names
    }

    /// 合并后的 `Triangle` 节点引用的网格名
    fn bound_mesh_name(container: &Container) -> String {
        let node = container.prefab().unwrap().find("Triangle").unwrap();
        let mesh = node.mesh_instances[0].mesh.unwrap();
        match container.sub_resource(mesh.local_id) {
            Some(StoredObject::Mesh(mesh)) => mesh.name.clone(),
            other => panic!("node bound to {other:?}"),
        }
    }

    fn triangle() -> ImportResult {
        import_v1(fixtures::triangle_v1())
    }

    #[test]
    fn test_first_persist_binds_everything() {
        let mut store = MemoryStore::new();
        let asset = persist_single(&mut store, triangle(), &source(), ROOT).unwrap();

        assert_eq!(asset.title, "Tri_01");
        let container = store.find(ROOT).unwrap();
        assert!(container.committed);
        assert_eq!(container.count_of("mesh"), 1);
        assert_eq!(container.count_of("material"), 1);
        assert_eq!(container.count_of("texture"), 1);
        assert_eq!(container.count_of("metadata"), 1);

        let root = container.prefab().unwrap();
        assert_eq!(root.name, "Tri_01");
        assert_eq!(root.package_link, Some(container.guid));
        let instance = &root.find("Triangle").unwrap().mesh_instances[0];
        assert!(instance.mesh.is_some());
        assert!(instance.materials.iter().all(Option::is_some));
        for object in root.referenced_objects() {
            assert!(container.sub_resource(object.local_id).is_some());
        }

        let reopened = PackagedAsset::open(&store, ROOT).unwrap();
        assert_eq!(reopened, asset);
    }

    #[test]
    fn test_repeat_persist_purges_old_resources() {
        let mut store = MemoryStore::new();
        let first = persist_single(&mut store, triangle(), &source(), ROOT).unwrap();
        let first_node = store.find(ROOT).unwrap().prefab().unwrap().find("Triangle").unwrap();
        let first_node = first_node.file_id;

        let second = persist_single(&mut store, triangle(), &source(), ROOT).unwrap();
        let container = store.find(ROOT).unwrap();

        assert_eq!(first.root_reference.guid, second.root_reference.guid);
        assert_eq!(container.count_of("mesh"), 1);
        assert_eq!(container.count_of("metadata"), 1);
        assert_eq!(container.prefab().unwrap().find("Triangle").unwrap().file_id, first_node);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_keep_accumulates_resources() {
        let mut store = MemoryStore::new();
        persist_single(&mut store, triangle(), &source(), ROOT).unwrap();
        persist_single_with(&mut store, triangle(), &source(), ROOT, StaleResources::Keep).unwrap();

        let container = store.find(ROOT).unwrap();
        assert_eq!(container.count_of("mesh"), 2);
        assert_eq!(container.count_of("metadata"), 2);

        // 打开时取最新的元数据记录
        let asset = PackagedAsset::open(&store, ROOT).unwrap();
        match asset.layout {
            PackageLayout::Single { record } => {
                assert_eq!(Some(&record.local_id), container.sub_resources.keys().max())
            }
            other => panic!("unexpected layout {other:?}"),
        }
    }

    #[test]
    fn test_changed_resources_replace_old_ones() {
        let mut store = MemoryStore::new();
        persist_single(&mut store, triangle(), &source(), ROOT).unwrap();
        persist_single(&mut store, reworked_triangle(), &source(), ROOT).unwrap();

        let container = store.find(ROOT).unwrap();
        assert_eq!(names_of(container, "mesh"), ["TriangleMeshV2"]);
        assert_eq!(names_of(container, "material"), ["Blue"]);
        assert_eq!(names_of(container, "texture"), ["tex2"]);
        assert_eq!(bound_mesh_name(container), "TriangleMeshV2");
    }

    #[test]
    fn test_keep_with_changed_resources() {
        let mut store = MemoryStore::new();
        persist_single(&mut store, triangle(), &source(), ROOT).unwrap();
        let reworked = reworked_triangle();
        persist_single_with(&mut store, reworked, &source(), ROOT, StaleResources::Keep).unwrap();

        let container = store.find(ROOT).unwrap();
        assert_eq!(bound_mesh_name(container), "TriangleMeshV2");

        // 第一次导入的资源不再被引用，但仍然留在容器中
        assert_eq!(names_of(container, "mesh"), ["TriangleMesh", "TriangleMeshV2"]);
        assert_eq!(names_of(container, "material"), ["Blue", "Red"]);
        assert_eq!(names_of(container, "texture"), ["tex", "tex2"]);
        let referenced = container.prefab().unwrap().referenced_objects();
        assert_eq!(referenced.len(), 2);
    }

    #[test]
    fn test_dropped_node_is_left_behind() {
        let mut store = MemoryStore::new();
        persist_single(&mut store, triangle(), &source(), ROOT).unwrap();

        let mut renamed = fixtures::triangle_v1();
        renamed["nodes"]["node_tri"]["name"] = serde_json::json!("Renamed");
        persist_single(&mut store, import_v1(renamed), &source(), ROOT).unwrap();

        let container = store.find(ROOT).unwrap();
        let root = container.prefab().unwrap();
        assert!(root.find("Renamed").is_some());

        // 旧节点保留，但其引用指向已清除的子资源
        let left_behind = root.find("Triangle").unwrap();
        let mesh = left_behind.mesh_instances[0].mesh.unwrap();
        assert!(container.sub_resource(mesh.local_id).is_none());
    }

    #[test]
    fn test_non_prefab_at_path_is_rejected() {
        let mut store = MemoryStore::new();
        store
            .create_container(ROOT, MainObject::Metadata(PackageRecord::new("x", source())))
            .unwrap();

        let err = persist_single(&mut store, triangle(), &source(), ROOT).unwrap_err();
        assert!(matches!(
            err,
            DistImportError::Persist(PersistError::UnexpectedExistingArtifact { .. })
        ));
        assert!(store.find(ROOT).unwrap().record().is_some());
    }

    #[test]
    fn test_purge_missing_container() {
        let mut store = MemoryStore::new();
        assert!(purge_stale_sub_resources(&mut store, Guid(42)).is_err());
    }
}
