//! 场景导入模块
//!
//! 把 glTF 1.0 / 2.0 场景描述解码为 [`ImportResult`]，随后按
//! [`ImportOptions`] 调整根节点变换。
//!
//! # 模块组织
//!
//! - `gltf1`：1.0 解码器（serde_json 手动解析）
//! - `gltf2`：2.0 解码器（gltf crate，支持 GLB）
//! - `builder`：两个解码器共享的资源构建与坐标系转换
//! - `rescale`：缩放策略
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use dist_import::import::{self, ImportOptions, SchemaVersion};
//! use dist_import::loader::FileLoader;
//!
//! let file = std::fs::File::open("models/chair/scene.gltf")?;
//! let loader = FileLoader::new("models/chair");
//! let result = import::decode(SchemaVersion::V2, file, &loader, &ImportOptions::default())?;
//! println!("{} meshes", result.meshes().len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::core::{ConfigError, Result};
use crate::loader::UriLoader;
use crate::scene::ImportResult;

mod builder;
mod gltf1;
mod gltf2;
pub mod rescale;

/// 场景描述的 schema 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    V1,
    V2,
}

impl SchemaVersion {
    /// 从描述内容推断版本
    ///
    /// GLB 看头部的版本号，JSON 看 `asset.version` 的主版本号。
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 8 && &bytes[0..4] == b"glTF" {
            let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
            return match version {
                1 => Some(SchemaVersion::V1),
                2 => Some(SchemaVersion::V2),
                _ => None,
            };
        }

        let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
        let version = value.get("asset")?.get("version")?;
        // 1.0 的早期导出器把版本写成数字
        let version = match version {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        match version.split('.').next()? {
            "1" => Some(SchemaVersion::V1),
            "2" => Some(SchemaVersion::V2),
            _ => None,
        }
    }
}

/// 缩放模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RescalingMode {
    /// 不缩放
    None,
    /// 按固定系数缩放（单位换算）
    Convert,
    /// 缩放到最大尺寸等于目标尺寸
    Fit,
}

/// 导入选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub rescaling_mode: RescalingMode,
    /// CONVERT 模式的缩放系数
    pub scale_factor: f32,
    /// FIT 模式的目标尺寸
    pub desired_size: f32,
    /// 缩放后是否把包围盒中心移到原点
    pub recenter: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            rescaling_mode: RescalingMode::Convert,
            scale_factor: 1.0,
            desired_size: 5.0,
            recenter: true,
        }
    }
}

impl ImportOptions {
    /// 只校验当前模式用到的字段
    pub fn validate(&self) -> Result<()> {
        let checked = match self.rescaling_mode {
            RescalingMode::None => None,
            RescalingMode::Convert => Some(("import.scale_factor", self.scale_factor)),
            RescalingMode::Fit => Some(("import.desired_size", self.desired_size)),
        };
        if let Some((field, value)) = checked {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("must be a positive finite number, got {}", value),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// 解码场景描述并应用缩放策略
///
/// 外部缓冲区和图片通过 `loader` 获取。失败时不返回任何部分结果。
pub fn decode(
    version: SchemaVersion,
    mut description: impl Read,
    loader: &dyn UriLoader,
    options: &ImportOptions,
) -> Result<ImportResult> {
    options.validate()?;

    let mut bytes = Vec::new();
    description.read_to_end(&mut bytes)?;

    let decoded = match version {
        SchemaVersion::V1 => gltf1::decode(&bytes, loader),
        SchemaVersion::V2 => gltf2::decode(&bytes, loader),
    };
    let mut result = match decoded {
        Ok(result) => result,
        Err(e) => {
            crate::import_error!(version = ?version, error = %e, "Decoding failed");
            return Err(e);
        }
    };
    rescale::apply(&mut result, options);

    crate::import_info!(
        version = ?version,
        nodes = result.root().node_count(),
        meshes = result.meshes().len(),
        materials = result.materials().len(),
        textures = result.textures().len(),
        "Decoded scene"
    );
    Ok(result)
}
