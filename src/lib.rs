//! DistImport - glTF 资产导入管线
//!
//! 读取 glTF 1.0 / 2.0 场景描述，构建内存中的场景图（网格、材质、纹理），
//! 按缩放策略调整根变换，最后持久化为可原地替换的资产包。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理）
//! - `math`: 数学类型别名、包围盒、法线与切线计算
//! - `geometry`: 顶点与网格数据
//! - `loader`: 外部缓冲区与图片的加载器抽象
//! - `scene`: 导入结果（节点树与资源表）
//! - `import`: 版本分派、两个版本的解码器、缩放策略
//! - `storage`: 宿主资产数据库抽象与实现
//! - `package`: 两种持久化策略
//!
//! # 使用示例
//!
//! ```no_run
//! use dist_import::import::{self, ImportOptions, SchemaVersion};
//! use dist_import::loader::FileLoader;
//! use dist_import::package::{self, SourceInfo};
//! use dist_import::storage::DirectoryStore;
//!
//! # fn main() -> dist_import::core::Result<()> {
//! let bytes = std::fs::read("chair/scene.gltf")?;
//! let version = SchemaVersion::sniff(&bytes).unwrap_or(SchemaVersion::V2);
//! let loader = FileLoader::new("chair");
//! let result = import::decode(version, bytes.as_slice(), &loader, &ImportOptions::default())?;
//!
//! let mut store = DirectoryStore::open("out")?;
//! let source = SourceInfo::default();
//! package::persist_single(&mut store, result, &source, "Assets/Prefabs/chair.prefab")?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod math;
pub mod geometry;
pub mod loader;
pub mod scene;
pub mod import;
pub mod storage;
pub mod package;

pub use crate::core::{DistImportError, Result};
pub use import::{decode, ImportOptions, RescalingMode, SchemaVersion};
pub use package::{PackagedAsset, SourceInfo};
pub use scene::ImportResult;
