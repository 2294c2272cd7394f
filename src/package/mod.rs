//! 资产打包模块
//!
//! 把 [`ImportResult`] 持久化为可复用、可原地替换的包。两种策略：
//!
//! - [`persist_separate`]：元数据容器持有网格、材质、纹理，根节点树
//!   单独存为 prefab 容器
//! - [`persist_single`]：所有内容放在一个自包含的 prefab 容器里
//!
//! 同一个资产再次持久化时替换内容，但保留根容器的 guid，外部对它的
//! 引用不会失效。
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use dist_import::package::{self, SourceInfo};
//! use dist_import::storage::MemoryStore;
//! # fn demo(result: dist_import::scene::ImportResult) -> dist_import::core::Result<()> {
//!
//! let source = SourceInfo::new("Chair", "Someone", "assets/abc123");
//! let mut store = MemoryStore::new();
//! let asset = package::persist_separate(
//!     &mut store,
//!     result,
//!     &source,
//!     &source.metadata_path("Assets/Poly/Assets"),
//!     &source.prefab_path("Assets/Poly/Prefabs"),
//! )?;
//! println!("root guid {}", asset.root_reference.guid);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::core::{PersistError, Result};
use crate::scene::{ImportResult, Node};
use crate::storage::{
    AssetStore, ContainerRef, Guid, MainObject, ObjectRef, StoredMaterial, StoredMesh,
    StoredMeshInstance, StoredNode, StoredObject,
};

pub mod naming;
mod separate;
mod single;

pub use naming::{normalize_local_path, package_base_name, sanitize_file_name};
pub use separate::persist_separate;
pub use single::{persist_single, persist_single_with, purge_stale_sub_resources, StaleResources};

/// 资产来源的标识
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub title: String,
    pub author: String,
    pub id: String,
}

impl SourceInfo {
    pub fn new(title: impl Into<String>, author: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            id: id.into(),
        }
    }

    pub fn base_name(&self) -> String {
        package_base_name(&self.title, &self.author, &self.id)
    }

    /// `<dir>/<base>.asset`
    pub fn metadata_path(&self, dir: &str) -> String {
        format!("{}/{}.asset", normalize_local_path(dir), self.base_name())
    }

    /// `<dir>/<base>.prefab`
    pub fn prefab_path(&self, dir: &str) -> String {
        format!("{}/{}.prefab", normalize_local_path(dir), self.base_name())
    }
}

/// 包的元数据记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub title: String,
    pub source: SourceInfo,
    /// 根容器引用，持久化完成后才有
    pub root: Option<ContainerRef>,
    pub persisted: bool,
}

impl PackageRecord {
    pub fn new(title: impl Into<String>, source: SourceInfo) -> Self {
        Self {
            title: title.into(),
            source,
            root: None,
            persisted: false,
        }
    }
}

/// 包的存放方式
#[derive(Debug, Clone, PartialEq)]
pub enum PackageLayout {
    /// 独立的元数据容器
    Separate { metadata: ContainerRef },
    /// 元数据记录是根容器的子资源
    Single { record: ObjectRef },
}

/// 一个已持久化的包
#[derive(Debug, Clone, PartialEq)]
pub struct PackagedAsset {
    pub title: String,
    pub source: SourceInfo,
    pub root_reference: ContainerRef,
    pub layout: PackageLayout,
}

impl PackagedAsset {
    /// 从存储中读回一个包，`path` 可以是元数据容器或自包含的 prefab
    pub fn open<S: AssetStore + ?Sized>(store: &S, path: &str) -> Result<Self> {
        let container = store
            .find(path)
            .ok_or_else(|| PersistError::storage(path, "no package at this path"))?;

        match &container.main {
            MainObject::Metadata(record) => {
                let root = record
                    .root
                    .clone()
                    .ok_or_else(|| inconsistent(path, "metadata has no root reference"))?;
                if store.container(root.guid).and_then(|c| c.prefab()).is_none() {
                    return Err(inconsistent(
                        path,
                        format!("root reference '{}' does not resolve to a prefab", root.path),
                    ));
                }
                Ok(Self {
                    title: record.title.clone(),
                    source: record.source.clone(),
                    root_reference: root,
                    layout: PackageLayout::Separate {
                        metadata: container.reference(),
                    },
                })
            }
            MainObject::Prefab(_) => {
                // 保留旧资源时可能有多条记录，取最新的
                let (local_id, record) = container
                    .sub_resources
                    .iter()
                    .rev()
                    .find_map(|(id, object)| match object {
                        StoredObject::Metadata(record) => Some((*id, record)),
                        _ => None,
                    })
                    .ok_or_else(|| inconsistent(path, "prefab carries no package metadata"))?;
                Ok(Self {
                    title: record.title.clone(),
                    source: record.source.clone(),
                    root_reference: container.reference(),
                    layout: PackageLayout::Single {
                        record: ObjectRef {
                            container: container.guid,
                            local_id,
                        },
                    },
                })
            }
        }
    }
}

pub(crate) fn inconsistent(path: &str, reason: impl Into<String>) -> crate::core::DistImportError {
    PersistError::InconsistentState {
        path: path.to_string(),
        reason: reason.into(),
    }
    .into()
}

/// 挂载到容器上的子资源引用，下标与 `ImportResult` 中的序列一致
pub(crate) struct AttachedResources {
    meshes: Vec<ObjectRef>,
    materials: Vec<ObjectRef>,
}

/// 依次挂载纹理、材质（绑定纹理引用）、网格
pub(crate) fn attach_resources<S: AssetStore + ?Sized>(
    store: &mut S,
    container: Guid,
    result: &ImportResult,
) -> Result<AttachedResources> {
    let mut textures = Vec::with_capacity(result.textures().len());
    for texture in result.textures() {
        textures.push(store.add_sub_resource(container, StoredObject::Texture(texture.clone()))?);
    }

    let mut materials = Vec::with_capacity(result.materials().len());
    for material in result.materials() {
        let stored = StoredMaterial {
            name: material.name.clone(),
            shading: material.shading.clone(),
            base_color_texture: material.base_color_texture.map(|t| textures[t.index()]),
        };
        materials.push(store.add_sub_resource(container, StoredObject::Material(stored))?);
    }

    let mut meshes = Vec::with_capacity(result.meshes().len());
    for mesh in result.meshes() {
        let stored = StoredMesh {
            name: mesh.name.clone(),
            vertices: mesh.data.vertices.clone(),
            indices: mesh.data.indices.clone(),
            subsets: mesh.data.subsets.clone(),
            bounds: (!mesh.bounds.is_empty()).then_some(mesh.bounds),
        };
        meshes.push(store.add_sub_resource(container, StoredObject::Mesh(stored))?);
    }

    tracing::debug!(
        textures = textures.len(),
        materials = materials.len(),
        meshes = meshes.len(),
        "Attached sub-resources"
    );
    Ok(AttachedResources { meshes, materials })
}

/// 把场景节点树转换为 prefab 节点树
///
/// `attached` 为 `None` 时网格引用保持未绑定。根节点以 `root_name` 命名。
pub(crate) fn stored_tree(
    root: &Node,
    root_name: &str,
    attached: Option<&AttachedResources>,
) -> StoredNode {
    let mut stored = stored_node(root, attached);
    stored.name = root_name.to_string();
    stored
}

fn stored_node(node: &Node, attached: Option<&AttachedResources>) -> StoredNode {
    let mut stored = StoredNode::new(node.name.clone(), node.transform);
    stored.mesh_instances = node
        .mesh_instances
        .iter()
        .map(|instance| StoredMeshInstance {
            mesh: attached.map(|a| a.meshes[instance.mesh.index()]),
            materials: instance
                .materials
                .iter()
                .map(|m| attached.map(|a| a.materials[m.index()]))
                .collect(),
        })
        .collect();
    stored.children = node
        .children
        .iter()
        .map(|child| stored_node(child, attached))
        .collect();
    stored
}
