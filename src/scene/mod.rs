//! 场景图模块
//!
//! 解码器的统一输出：一棵以合成根节点为入口的节点树，加上节点引用的
//! 网格、纹理、材质序列。
//!
//! # 不变量
//!
//! - 从根节点可达的每个资源在对应序列中恰好出现一次（无重复、无孤儿）
//! - 序列在解码期间只追加，返回后冻结；之后只有根节点变换可以修改

mod resources;
mod transform;

pub use resources::{
    AlphaMode, MaterialHandle, MaterialResource, MeshHandle, MeshResource, Shading,
    TextureHandle, TextureResource,
};
pub use transform::Transform;

use crate::math::{Aabb, Matrix4, Point3, Vector3};

/// 网格实例：一个网格加上每个子网格的材质
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    pub mesh: MeshHandle,
    pub materials: Vec<MaterialHandle>,
}

/// 场景节点
///
/// 节点拥有自己的子节点。
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub mesh_instances: Vec<MeshInstance>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            mesh_instances: Vec::new(),
            children: Vec::new(),
        }
    }

    /// 子树中的节点数（包括自身）
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    /// 深度优先遍历，回调参数为节点和它到 `parent` 空间的累积矩阵
    pub fn visit<F>(&self, parent: &Matrix4, f: &mut F)
    where
        F: FnMut(&Node, &Matrix4),
    {
        let world = parent * self.transform.matrix();
        f(self, &world);
        for child in &self.children {
            child.visit(&world, f);
        }
    }
}

/// 一次导入的结果
#[derive(Debug, Clone)]
pub struct ImportResult {
    root: Node,
    meshes: Vec<MeshResource>,
    textures: Vec<TextureResource>,
    materials: Vec<MaterialResource>,
    /// 根节点局部空间中的场景包围盒
    scene_bounds: Aabb,
}

impl ImportResult {
    pub(crate) fn new(
        root: Node,
        meshes: Vec<MeshResource>,
        textures: Vec<TextureResource>,
        materials: Vec<MaterialResource>,
        scene_bounds: Aabb,
    ) -> Self {
        Self {
            root,
            meshes,
            textures,
            materials,
            scene_bounds,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// 根节点变换，缩放策略唯一允许修改的地方
    pub fn root_transform_mut(&mut self) -> &mut Transform {
        &mut self.root.transform
    }

    pub fn meshes(&self) -> &[MeshResource] {
        &self.meshes
    }

    pub fn textures(&self) -> &[TextureResource] {
        &self.textures
    }

    pub fn materials(&self) -> &[MaterialResource] {
        &self.materials
    }

    pub fn mesh(&self, handle: MeshHandle) -> &MeshResource {
        &self.meshes[handle.0]
    }

    pub fn texture(&self, handle: TextureHandle) -> &TextureResource {
        &self.textures[handle.0]
    }

    pub fn material(&self, handle: MaterialHandle) -> &MaterialResource {
        &self.materials[handle.0]
    }

    pub fn scene_bounds(&self) -> &Aabb {
        &self.scene_bounds
    }

    /// 施加根节点变换后的场景包围盒
    pub fn world_bounds(&self) -> Aabb {
        self.scene_bounds.transformed(&self.root.transform.matrix())
    }

    /// 所有网格实例顶点的世界坐标
    pub fn world_positions(&self) -> Vec<Vector3> {
        let mut positions = Vec::new();
        self.root.visit(&Matrix4::identity(), &mut |node, world| {
            for instance in &node.mesh_instances {
                for vertex in &self.mesh(instance.mesh).data.vertices {
                    let p = world.transform_point(&Point3::from(vertex.position));
                    positions.push(p.coords);
                }
            }
        });
        positions
    }

    /// 根节点下带网格实例的节点数
    pub fn mesh_node_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&Matrix4::identity(), &mut |node, _| {
            if !node.mesh_instances.is_empty() {
                count += 1;
            }
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_accumulates_transforms() {
        let mut root = Node::new("root", Transform::identity());
        root.transform.scale = Vector3::repeat(2.0);
        let mut child = Node::new("child", Transform::identity());
        child.transform.translation = Vector3::new(1.0, 0.0, 0.0);
        root.children.push(child);

        let mut seen = Vec::new();
        root.visit(&Matrix4::identity(), &mut |node, world| {
            seen.push((node.name.clone(), world.transform_point(&Point3::origin()).coords));
        });

        assert_eq!(root.node_count(), 2);
        assert_eq!(seen[1].0, "child");
        assert!((seen[1].1 - Vector3::new(2.0, 0.0, 0.0)).norm() < 1e-6);
    }
}
