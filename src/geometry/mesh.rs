/// 网格数据结构模块
///
/// 定义CPU侧的网格数据容器。一个源网格的每个图元（primitive）
/// 对应一个子网格，每个子网格在网格实例上绑定一个材质。

use serde::{Deserialize, Serialize};

use super::vertex::Vertex;
use crate::math::Aabb;

/// 子网格描述符
///
/// 描述网格的一个子集，对应网格实例上的一个材质槽。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subset {
    /// 子网格ID（材质槽下标）
    pub id: u32,

    /// 起始顶点索引
    pub vertex_start: u32,

    /// 顶点数量
    pub vertex_count: u32,

    /// 起始面索引（以三角形为单位）
    pub face_start: u32,

    /// 面数量（三角形数量）
    pub face_count: u32,
}

impl Subset {
    /// 创建一个新的子网格描述符
    #[inline]
    pub fn new(
        id: u32,
        vertex_start: u32,
        vertex_count: u32,
        face_start: u32,
        face_count: u32,
    ) -> Self {
        Self {
            id,
            vertex_start,
            vertex_count,
            face_start,
            face_count,
        }
    }
}

/// CPU侧网格数据
///
/// 子网格的索引是全局的（已加上 `vertex_start` 偏移）。
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// 顶点数组
    pub vertices: Vec<Vertex>,

    /// 三角形顶点索引，每3个索引定义一个三角形
    pub indices: Vec<u32>,

    /// 子网格列表
    pub subsets: Vec<Subset>,

    /// 网格名称
    pub name: Option<String>,
}

impl MeshData {
    /// 创建一个空的网格数据
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建一个指定名称的空网格数据
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// 获取顶点数量
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// 获取三角形数量
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// 追加一个子网格
    ///
    /// `local_indices` 相对于本次追加的第一个顶点，返回新子网格的ID。
    pub fn push_subset(&mut self, vertices: Vec<Vertex>, local_indices: &[u32]) -> u32 {
        let id = self.subsets.len() as u32;
        let vertex_start = self.vertices.len() as u32;
        let face_start = self.triangle_count() as u32;

        self.subsets.push(Subset::new(
            id,
            vertex_start,
            vertices.len() as u32,
            face_start,
            (local_indices.len() / 3) as u32,
        ));
        self.vertices.extend(vertices);
        self.indices.extend(local_indices.iter().map(|i| i + vertex_start));
        id
    }

    /// 顶点位置的包围盒
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// 验证网格数据的有效性
    ///
    /// 检查：
    /// - 索引数量是3的倍数
    /// - 所有索引都在有效范围内
    /// - 子网格描述符的范围有效
    /// - 顶点位置都是有限值
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err(format!(
                "index count must be a multiple of 3, got {}",
                self.indices.len()
            ));
        }

        let vertex_count = self.vertices.len() as u32;
        let out_of_range = self
            .indices
            .iter()
            .enumerate()
            .find(|&(_, &idx)| idx >= vertex_count);
        if let Some((i, &index)) = out_of_range {
            return Err(format!(
                "index {} at position {} is out of range (vertex count {})",
                index, i, vertex_count
            ));
        }

        let triangle_count = self.triangle_count() as u32;
        for (i, subset) in self.subsets.iter().enumerate() {
            if subset.vertex_start + subset.vertex_count > vertex_count {
                return Err(format!(
                    "subset {} vertex range out of bounds: start={}, count={}, total={}",
                    i, subset.vertex_start, subset.vertex_count, vertex_count
                ));
            }
            if subset.face_start + subset.face_count > triangle_count {
                return Err(format!(
                    "subset {} face range out of bounds: start={}, count={}, total={}",
                    i, subset.face_start, subset.face_count, triangle_count
                ));
            }
        }

        if self.vertices.iter().any(|v| v.position.iter().any(|c| !c.is_finite())) {
            return Err("vertex positions contain non-finite values".to_string());
        }

        Ok(())
    }
}
