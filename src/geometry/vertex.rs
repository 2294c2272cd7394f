/// 几何体顶点定义模块
///
/// 定义解码得到的顶点结构：位置、法线、UV坐标和切线向量。
/// 坐标约定为左手系、Y 轴向上，UV 原点在左下角。

use bytemuck::{Pod, Zeroable};

/// 完整的3D顶点结构
///
/// `#[repr(C)]` + `Pod`，持久化时可以直接按字节视图写出。
///
/// # 内存布局
///
/// - position: 12 bytes (3 * f32)
/// - normal: 12 bytes (3 * f32)
/// - texcoord: 8 bytes (2 * f32)
/// - tangent: 12 bytes (3 * f32)
/// - **总计**: 44 bytes
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 顶点位置 (x, y, z)
    pub position: [f32; 3],

    /// 单位法线 (nx, ny, nz)
    pub normal: [f32; 3],

    /// 纹理坐标 (u, v)
    pub texcoord: [f32; 2],

    /// 切线向量 (tx, ty, tz)，与法线正交
    pub tangent: [f32; 3],
}

impl Vertex {
    /// 创建一个新的顶点
    #[inline]
    pub fn new(
        position: [f32; 3],
        normal: [f32; 3],
        texcoord: [f32; 2],
        tangent: [f32; 3],
    ) -> Self {
        Self {
            position,
            normal,
            texcoord,
            tangent,
        }
    }

    /// 只有位置的顶点，其余属性在后处理中填充
    #[inline]
    pub fn from_position(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}
