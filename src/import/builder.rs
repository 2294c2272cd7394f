//! 两个版本的解码器共享的构建逻辑
//!
//! 解码器只负责把各自的文档结构翻译成节点和图元数据；资源去重、
//! 坐标系转换、三角化、法线/切线补全和场景包围盒累积都在这里完成，
//! 保证两个版本产出同样形状的 [`ImportResult`]。

use std::collections::HashMap;

use base64::Engine;
use nalgebra::Quaternion as RawQuaternion;

use crate::core::{DistImportError, ImportError, Result};
use crate::geometry::Vertex;
use crate::loader::{read_all, LoadError, UriLoader};
use crate::math::geometry::{compute_tangent_space, reconstruct_normals};
use crate::math::{Aabb, Matrix4, Quaternion, Vector3};
use crate::scene::{
    ImportResult, MaterialHandle, MaterialResource, MeshHandle, MeshInstance, MeshResource, Node,
    Shading, TextureHandle, TextureResource, Transform,
};

/// 节点层级深度上限，超过视为循环引用
pub(crate) const MAX_NODE_DEPTH: usize = 256;

/// 累积一次导入的资源
///
/// 资源只在第一次被可达节点引用时构建，序列只追加。解码失败时
/// 整个构建器被丢弃，不会留下半成品。
#[derive(Default)]
pub(crate) struct SceneBuilder {
    meshes: Vec<MeshResource>,
    textures: Vec<TextureResource>,
    materials: Vec<MaterialResource>,
    mesh_instances: HashMap<String, MeshInstance>,
    material_keys: HashMap<String, MaterialHandle>,
    texture_keys: HashMap<String, TextureHandle>,
    default_material: Option<MaterialHandle>,
    scene_bounds: Aabb,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已经构建过的源网格
    pub fn mesh_instance(&self, key: &str) -> Option<MeshInstance> {
        self.mesh_instances.get(key).cloned()
    }

    pub fn add_mesh(
        &mut self,
        key: impl Into<String>,
        mesh: MeshResource,
        materials: Vec<MaterialHandle>,
    ) -> MeshInstance {
        let handle = MeshHandle(self.meshes.len());
        tracing::debug!(
            mesh = %mesh.name,
            vertices = mesh.data.vertex_count(),
            triangles = mesh.data.triangle_count(),
            "Built mesh"
        );
        self.meshes.push(mesh);

        let instance = MeshInstance {
            mesh: handle,
            materials,
        };
        self.mesh_instances.insert(key.into(), instance.clone());
        instance
    }

    pub fn mesh_bounds(&self, handle: MeshHandle) -> Aabb {
        self.meshes[handle.0].bounds
    }

    pub fn material(&self, key: &str) -> Option<MaterialHandle> {
        self.material_keys.get(key).copied()
    }

    pub fn add_material(
        &mut self,
        key: impl Into<String>,
        material: MaterialResource,
    ) -> MaterialHandle {
        let handle = MaterialHandle(self.materials.len());
        self.materials.push(material);
        self.material_keys.insert(key.into(), handle);
        handle
    }

    /// 没有指定材质的图元共用的默认材质
    pub fn default_material(&mut self) -> MaterialHandle {
        if let Some(handle) = self.default_material {
            return handle;
        }
        let handle = MaterialHandle(self.materials.len());
        self.materials.push(MaterialResource {
            name: "Default".to_string(),
            shading: Shading::default(),
            base_color_texture: None,
        });
        self.default_material = Some(handle);
        handle
    }

    pub fn texture(&self, key: &str) -> Option<TextureHandle> {
        self.texture_keys.get(key).copied()
    }

    pub fn add_texture(&mut self, texture: TextureResource) -> TextureHandle {
        let handle = TextureHandle(self.textures.len());
        self.texture_keys.insert(texture.source.clone(), handle);
        self.textures.push(texture);
        handle
    }

    /// 把网格包围盒按节点的累积矩阵并入场景包围盒
    pub fn include_bounds(&mut self, bounds: &Aabb, world: &Matrix4) {
        self.scene_bounds.encapsulate(&bounds.transformed(world));
    }

    pub fn finish(self, root: Node) -> ImportResult {
        ImportResult::new(
            root,
            self.meshes,
            self.textures,
            self.materials,
            self.scene_bounds,
        )
    }
}

/// 读取一个外部引用
///
/// `data:` URI 直接在本地解码，其余交给加载器。
pub(crate) fn fetch_bytes(loader: &dyn UriLoader, reference: &str) -> Result<Vec<u8>> {
    if let Some(rest) = reference.strip_prefix("data:") {
        let (_, payload) = rest.split_once(";base64,").ok_or_else(|| {
            ImportError::malformed(short_ref(reference), "only base64 data URIs are supported")
        })?;
        return base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ImportError::malformed(short_ref(reference), e.to_string()).into());
    }

    read_all(loader, reference).map_err(|e| match e {
        LoadError::NotFound(path) => ImportError::missing(path).into(),
        LoadError::Io { path, source } => DistImportError::Io(std::io::Error::new(
            source.kind(),
            format!("{}: {}", path, source),
        )),
    })
}

/// 错误信息里不带完整的 data URI
pub(crate) fn short_ref(reference: &str) -> &str {
    if reference.starts_with("data:") {
        reference.split(',').next().unwrap_or("data:")
    } else {
        reference
    }
}

/// 解码校验图片并得到纹理资源
pub(crate) fn decode_texture(
    name: impl Into<String>,
    source: impl Into<String>,
    reference: &str,
    encoded: Vec<u8>,
) -> Result<TextureResource> {
    let format = image::guess_format(&encoded)
        .map_err(|e| ImportError::malformed(short_ref(reference), e.to_string()))?;
    let image = image::load_from_memory_with_format(&encoded, format)
        .map_err(|e| ImportError::malformed(short_ref(reference), e.to_string()))?;

    Ok(TextureResource {
        name: name.into(),
        source: source.into(),
        format: format!("{:?}", format).to_lowercase(),
        width: image.width(),
        height: image.height(),
        encoded,
    })
}

/// 从 URI 推出一个可读的资源名
pub(crate) fn name_from_uri(uri: &str) -> String {
    if uri.starts_with("data:") {
        return "embedded".to_string();
    }
    let decoded = urlencoding::decode(uri)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| uri.to_string());
    let file = decoded.rsplit(['/', '\\']).next().unwrap_or(&decoded);
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file.to_string(),
    }
}

// ---- 坐标系转换：右手系 -> 左手系（X 取反） ----

pub(crate) fn mirror_vector(v: [f32; 3]) -> Vector3 {
    Vector3::new(-v[0], v[1], v[2])
}

/// `[x, y, z, w]` 旋转在 YZ 平面上的镜像
pub(crate) fn mirror_rotation(q: [f32; 4]) -> Quaternion {
    let raw = RawQuaternion::new(q[3], q[0], -q[1], -q[2]);
    if raw.norm() <= f32::EPSILON || !raw.norm().is_finite() {
        return Quaternion::identity();
    }
    Quaternion::new_normalize(raw)
}

/// 列主序 4x4 矩阵的镜像 S·M·S，分解为 TRS
pub(crate) fn mirror_matrix(columns: &[f32; 16]) -> Transform {
    let m = Matrix4::from_column_slice(columns);
    let s = Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, 1.0, 1.0));
    Transform::from_matrix(&(s * m * s))
}

pub(crate) fn mirror_trs(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Transform {
    Transform::from_trs(
        mirror_vector(translation),
        mirror_rotation(rotation),
        Vector3::from(scale),
    )
}

/// 图元拓扑
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrimitiveMode {
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    /// 按 GL 枚举值解析，点和线不支持
    pub fn from_gl(mode: u32) -> Option<Self> {
        match mode {
            4 => Some(PrimitiveMode::Triangles),
            5 => Some(PrimitiveMode::TriangleStrip),
            6 => Some(PrimitiveMode::TriangleFan),
            _ => None,
        }
    }
}

/// 把条带和扇形展开为三角形列表
pub(crate) fn triangulate(mode: PrimitiveMode, indices: &[u32]) -> Vec<u32> {
    match mode {
        PrimitiveMode::Triangles => {
            let whole = indices.len() - indices.len() % 3;
            indices[..whole].to_vec()
        }
        PrimitiveMode::TriangleStrip => {
            let mut out = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
            for i in 0..indices.len().saturating_sub(2) {
                // 奇数三角形交换前两个顶点保持朝向一致
                if i % 2 == 0 {
                    out.extend_from_slice(&[indices[i], indices[i + 1], indices[i + 2]]);
                } else {
                    out.extend_from_slice(&[indices[i + 1], indices[i], indices[i + 2]]);
                }
            }
            out
        }
        PrimitiveMode::TriangleFan => {
            let mut out = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
            for i in 1..indices.len().saturating_sub(1) {
                out.extend_from_slice(&[indices[0], indices[i], indices[i + 1]]);
            }
            out
        }
    }
}

/// 解码器从文档中读出的原始图元数据（源坐标系）
#[derive(Debug, Default)]
pub(crate) struct PrimitiveData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub texcoords: Option<Vec<[f32; 2]>>,
    pub indices: Option<Vec<u32>>,
}

/// 把原始图元转换为输出顶点和三角形索引
///
/// 做坐标系转换（X 取反、绕序反转，`flip_v` 时 v 翻转），
/// 缺失法线时重建，有纹理坐标时计算切线。
pub(crate) fn finish_primitive(
    data: PrimitiveData,
    mode: PrimitiveMode,
    flip_v: bool,
    reference: &str,
) -> Result<(Vec<Vertex>, Vec<u32>)> {
    let count = data.positions.len();

    if let Some(normals) = &data.normals {
        if normals.len() != count {
            return Err(ImportError::malformed(
                reference,
                format!("NORMAL count {} does not match POSITION count {}", normals.len(), count),
            )
            .into());
        }
    }
    if let Some(texcoords) = &data.texcoords {
        if texcoords.len() != count {
            return Err(ImportError::malformed(
                reference,
                format!(
                    "TEXCOORD_0 count {} does not match POSITION count {}",
                    texcoords.len(),
                    count
                ),
            )
            .into());
        }
    }

    let raw_indices = data
        .indices
        .unwrap_or_else(|| (0..count as u32).collect());
    if let Some(bad) = raw_indices.iter().find(|&&i| i as usize >= count) {
        return Err(ImportError::malformed(
            reference,
            format!("index {} out of range for {} vertices", bad, count),
        )
        .into());
    }

    let mut indices = triangulate(mode, &raw_indices);
    for triangle in indices.chunks_exact_mut(3) {
        triangle.swap(1, 2);
    }

    let has_normals = data.normals.is_some();
    let has_texcoords = data.texcoords.is_some();

    let mut vertices: Vec<Vertex> = data
        .positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let normal = data
                .normals
                .as_ref()
                .map(|n| mirror_vector(n[i]).into())
                .unwrap_or([0.0; 3]);
            let texcoord = data
                .texcoords
                .as_ref()
                .map(|t| if flip_v { [t[i][0], 1.0 - t[i][1]] } else { t[i] })
                .unwrap_or([0.0; 2]);
            Vertex::new(mirror_vector(*p).into(), normal, texcoord, [0.0; 3])
        })
        .collect();

    if vertices.iter().any(|v| v.position.iter().any(|c| !c.is_finite())) {
        return Err(ImportError::malformed(reference, "POSITION contains non-finite values").into());
    }

    if !has_normals {
        reconstruct_normals(&mut vertices, &indices);
    }
    if has_texcoords {
        compute_tangent_space(&mut vertices, &indices);
    }

    Ok((vertices, indices))
}
