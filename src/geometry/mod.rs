/// 几何体数据模块
///
/// 包含顶点定义与CPU侧网格数据结构。
///
/// # 模块结构
///
/// - `vertex`: 顶点数据结构定义
/// - `mesh`: 网格数据和子网格结构
///
/// 法线重建、切线空间等几何处理函数位于 `math::geometry`。

pub mod vertex;
pub mod mesh;

// 重新导出常用类型
pub use vertex::Vertex;
pub use mesh::{MeshData, Subset};
