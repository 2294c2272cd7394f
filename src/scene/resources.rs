//! 导入得到的资源：网格、纹理、材质
//!
//! 资源之间通过类型化的句柄（`ImportResult` 中对应序列的下标）引用。

use serde::{Deserialize, Serialize};

use crate::geometry::MeshData;
use crate::math::{Aabb, Color};

macro_rules! resource_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// 在 `ImportResult` 对应序列中的下标
            pub fn index(&self) -> usize {
                self.0
            }
        }
    };
}

resource_handle!(
    /// 指向 `ImportResult::meshes()` 的句柄
    MeshHandle
);
resource_handle!(
    /// 指向 `ImportResult::textures()` 的句柄
    TextureHandle
);
resource_handle!(
    /// 指向 `ImportResult::materials()` 的句柄
    MaterialHandle
);

/// 网格资源
#[derive(Debug, Clone)]
pub struct MeshResource {
    pub name: String,
    pub data: MeshData,
    /// 网格局部空间的包围盒
    pub bounds: Aabb,
}

impl MeshResource {
    pub fn new(name: impl Into<String>, data: MeshData) -> Self {
        let bounds = data.bounds();
        Self {
            name: name.into(),
            data,
            bounds,
        }
    }
}

/// 纹理资源
///
/// 保留原始编码字节，宽高在解码校验时得到。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureResource {
    pub name: String,
    /// 源引用，也是同一次导入内去重的键
    pub source: String,
    /// 编码格式（"png"、"jpeg" ...）
    pub format: String,
    pub width: u32,
    pub height: u32,
    #[serde(with = "crate::storage::encoding::base64_bytes")]
    pub encoded: Vec<u8>,
}

/// 透明模式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaMode {
    Opaque,
    Mask { cutoff: f32 },
    Blend,
}

/// 材质的着色参数（金属度/粗糙度模型）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shading {
    pub base_color: Color,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

impl Default for Shading {
    fn default() -> Self {
        Self {
            base_color: Color::WHITE,
            metallic: 0.0,
            roughness: 1.0,
            emissive: [0.0; 3],
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
        }
    }
}

/// 材质资源
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialResource {
    pub name: String,
    pub shading: Shading,
    pub base_color_texture: Option<TextureHandle>,
}
