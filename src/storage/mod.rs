//! 资产存储模块
//!
//! 持久化策略不直接接触文件系统，而是通过 [`AssetStore`] 操作宿主的
//! 资产数据库。数据库由容器（container）组成：每个容器有稳定的 guid 和
//! 一个包路径，持有一个主对象（元数据记录或 prefab 节点树）以及若干
//! 子资源（网格、纹理、材质、元数据）。
//!
//! # 实现
//!
//! - [`MemoryStore`]: 参考实现，全部数据在内存中
//! - [`DirectoryStore`]: 在 `MemoryStore` 之上把提交的容器写成 JSON 文件
//!
//! # 约定
//!
//! - 新建的容器在 `commit` 之前不能挂载子资源
//! - 在已有路径上重建容器保留 guid，丢弃旧的子资源
//! - 写操作都需要 `&mut self`，同一时刻只有一个写者

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::geometry::{Subset, Vertex};
use crate::math::Aabb;
use crate::package::PackageRecord;
use crate::scene::{Shading, TextureResource, Transform};

pub mod directory;
pub mod encoding;
pub mod memory;
mod prefab;

pub use directory::DirectoryStore;
pub use memory::MemoryStore;

/// 容器的全局唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(pub u64);

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// 指向某个容器的引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    pub guid: Guid,
    pub path: String,
}

/// 指向容器内某个子资源的引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub container: Guid,
    pub local_id: u64,
}

/// 持久化的网格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMesh {
    pub name: String,
    #[serde(with = "encoding::pod_vec")]
    pub vertices: Vec<Vertex>,
    #[serde(with = "encoding::pod_vec")]
    pub indices: Vec<u32>,
    pub subsets: Vec<Subset>,
    /// 空网格没有包围盒（JSON 无法表示无穷大）
    pub bounds: Option<Aabb>,
}

/// 持久化的材质，纹理引用已绑定到子资源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMaterial {
    pub name: String,
    pub shading: Shading,
    pub base_color_texture: Option<ObjectRef>,
}

/// 容器的子资源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredObject {
    Mesh(StoredMesh),
    Texture(TextureResource),
    Material(StoredMaterial),
    Metadata(PackageRecord),
}

impl StoredObject {
    pub fn kind(&self) -> &'static str {
        match self {
            StoredObject::Mesh(_) => "mesh",
            StoredObject::Texture(_) => "texture",
            StoredObject::Material(_) => "material",
            StoredObject::Metadata(_) => "metadata",
        }
    }
}

/// prefab 节点上的网格实例
///
/// 引用为 `None` 表示尚未绑定（两阶段提交的第一阶段）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeshInstance {
    pub mesh: Option<ObjectRef>,
    pub materials: Vec<Option<ObjectRef>>,
}

/// prefab 节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNode {
    /// 容器内的节点 ID，0 表示尚未分配
    pub file_id: u64,
    pub name: String,
    pub transform: Transform,
    pub mesh_instances: Vec<StoredMeshInstance>,
    /// 指回元数据容器的包链接标记
    pub package_link: Option<Guid>,
    pub children: Vec<StoredNode>,
}

impl StoredNode {
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            file_id: 0,
            name: name.into(),
            transform,
            mesh_instances: Vec::new(),
            package_link: None,
            children: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(StoredNode::node_count).sum::<usize>()
    }

    /// 按名称深度优先查找
    pub fn find(&self, name: &str) -> Option<&StoredNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// 子树中所有网格实例引用的对象
    pub fn referenced_objects(&self) -> Vec<ObjectRef> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs(&self, out: &mut Vec<ObjectRef>) {
        for instance in &self.mesh_instances {
            out.extend(instance.mesh);
            out.extend(instance.materials.iter().flatten());
        }
        for child in &self.children {
            child.collect_refs(out);
        }
    }
}

/// 容器的主对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MainObject {
    Metadata(PackageRecord),
    Prefab(StoredNode),
}

/// 一个容器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub guid: Guid,
    pub path: String,
    pub main: MainObject,
    /// 子资源，按本地 ID 排序
    pub sub_resources: std::collections::BTreeMap<u64, StoredObject>,
    /// 下一个可分配的本地 ID（子资源与节点共用）
    pub next_local_id: u64,
    /// 是否已经提交过
    pub committed: bool,
}

impl Container {
    pub fn reference(&self) -> ContainerRef {
        ContainerRef {
            guid: self.guid,
            path: self.path.clone(),
        }
    }

    pub fn prefab(&self) -> Option<&StoredNode> {
        match &self.main {
            MainObject::Prefab(root) => Some(root),
            MainObject::Metadata(_) => None,
        }
    }

    pub fn record(&self) -> Option<&PackageRecord> {
        match &self.main {
            MainObject::Metadata(record) => Some(record),
            MainObject::Prefab(_) => None,
        }
    }

    pub fn sub_resource(&self, local_id: u64) -> Option<&StoredObject> {
        self.sub_resources.get(&local_id)
    }

    /// 指定类型的子资源数量
    pub fn count_of(&self, kind: &str) -> usize {
        self.sub_resources.values().filter(|o| o.kind() == kind).count()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_local_id;
        self.next_local_id += 1;
        id
    }
}

/// prefab 替换模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// 按名称匹配，未匹配的旧节点被丢弃
    NameBased,
    /// 按名称合并，未匹配的旧节点原样保留
    MergeByName,
}

/// 宿主资产数据库
pub trait AssetStore {
    /// 按 guid 查找容器
    fn container(&self, guid: Guid) -> Option<&Container>;

    /// 按包路径查找容器
    fn find(&self, path: &str) -> Option<&Container>;

    /// 在路径上创建容器；路径上已有容器时保留其 guid 并丢弃旧子资源
    ///
    /// 新容器处于未提交状态。
    fn create_container(&mut self, path: &str, main: MainObject) -> Result<ContainerRef>;

    /// 把一个子资源挂到已提交的容器上
    fn add_sub_resource(&mut self, container: Guid, object: StoredObject) -> Result<ObjectRef>;

    /// 删除一个子资源
    fn remove_sub_resource(&mut self, object: ObjectRef) -> Result<()>;

    /// 替换容器的元数据记录
    fn set_record(&mut self, container: Guid, record: PackageRecord) -> Result<()>;

    /// 用新的节点树替换 prefab 容器的内容，匹配到的节点保留 ID
    fn replace_prefab(&mut self, container: Guid, root: StoredNode, mode: ReplaceMode)
        -> Result<()>;

    /// 提交容器，使其持久化
    fn commit(&mut self, container: Guid) -> Result<()>;
}
