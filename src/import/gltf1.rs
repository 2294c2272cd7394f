//! glTF 1.0 解码器
//!
//! 1.0 的顶层对象都是以字符串 ID 为键的字典，`gltf` crate 不支持，
//! 这里用 `serde_json` 直接反序列化并手动读取访问器。
//!
//! 技术（technique）和着色器只用来推断透明度，不做其它解释。

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;

use crate::core::{ImportError, Result};
use crate::geometry::MeshData;
use crate::loader::UriLoader;
use crate::math::{Color, Matrix4};
use crate::scene::{
    AlphaMode, ImportResult, MaterialHandle, MaterialResource, MeshInstance, MeshResource, Node,
    Shading, TextureHandle, Transform,
};

use super::builder::{
    decode_texture, fetch_bytes, finish_primitive, mirror_matrix, mirror_trs, name_from_uri,
    short_ref, PrimitiveData, PrimitiveMode, SceneBuilder, MAX_NODE_DEPTH,
};

const DESCRIPTION: &str = "<gltf 1.0 description>";

/// GL_BLEND
const GL_BLEND: u32 = 3042;

const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Document {
    scene: Option<String>,
    scenes: BTreeMap<String, SceneDef>,
    nodes: BTreeMap<String, NodeDef>,
    meshes: BTreeMap<String, MeshDef>,
    accessors: BTreeMap<String, AccessorDef>,
    #[serde(rename = "bufferViews")]
    buffer_views: BTreeMap<String, BufferViewDef>,
    buffers: BTreeMap<String, BufferDef>,
    materials: BTreeMap<String, MaterialDef>,
    techniques: BTreeMap<String, TechniqueDef>,
    textures: BTreeMap<String, TextureDef>,
    images: BTreeMap<String, ImageDef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SceneDef {
    name: Option<String>,
    nodes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NodeDef {
    name: Option<String>,
    children: Vec<String>,
    meshes: Vec<String>,
    matrix: [f32; 16],
    translation: [f32; 3],
    rotation: [f32; 4],
    scale: [f32; 3],
}

impl Default for NodeDef {
    fn default() -> Self {
        Self {
            name: None,
            children: Vec::new(),
            meshes: Vec::new(),
            matrix: IDENTITY_MATRIX,
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MeshDef {
    name: Option<String>,
    primitives: Vec<PrimitiveDef>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PrimitiveDef {
    attributes: HashMap<String, String>,
    indices: Option<String>,
    material: Option<String>,
    mode: u32,
}

impl Default for PrimitiveDef {
    fn default() -> Self {
        Self {
            attributes: HashMap::new(),
            indices: None,
            material: None,
            mode: 4,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessorDef {
    buffer_view: String,
    #[serde(default)]
    byte_offset: usize,
    #[serde(default)]
    byte_stride: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferViewDef {
    buffer: String,
    #[serde(default)]
    byte_offset: usize,
    #[serde(default)]
    byte_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferDef {
    uri: String,
    #[serde(default)]
    byte_length: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MaterialDef {
    name: Option<String>,
    technique: Option<String>,
    values: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TechniqueDef {
    states: TechniqueStates,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TechniqueStates {
    enable: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct TextureDef {
    source: String,
}

#[derive(Debug, Deserialize)]
struct ImageDef {
    #[serde(default)]
    name: Option<String>,
    uri: String,
}

/// 材质颜色参数的候选键，按优先级
const COLOR_KEYS: [&str; 5] = ["diffuse", "color", "u_color", "baseColorFactor", "u_MainColor"];

/// 解码 glTF 1.0 描述
pub(crate) fn decode(description: &[u8], loader: &dyn UriLoader) -> Result<ImportResult> {
    let document: Document = serde_json::from_slice(description)
        .map_err(|e| ImportError::malformed(DESCRIPTION, e.to_string()))?;

    // 场景选择：scene 指定的、字典序第一个、所有没有父节点的节点
    let scene = match &document.scene {
        Some(id) => Some(document.scenes.get(id).ok_or_else(|| {
            ImportError::malformed(DESCRIPTION, format!("scene '{}' does not exist", id))
        })?),
        None => document.scenes.values().next(),
    };
    let top_level: Vec<String> = match scene {
        Some(scene) => scene.nodes.clone(),
        None => {
            let children: HashSet<&String> =
                document.nodes.values().flat_map(|n| n.children.iter()).collect();
            let parentless: Vec<String> = document
                .nodes
                .keys()
                .filter(|id| !children.contains(id))
                .cloned()
                .collect();
            crate::import_warn!(
                nodes = parentless.len(),
                "No scene defined, using parentless nodes"
            );
            parentless
        }
    };

    let root_name = scene
        .and_then(|s| s.name.clone())
        .or_else(|| document.scene.clone())
        .unwrap_or_else(|| "Scene".to_string());

    let mut decoder = Decoder {
        document: &document,
        loader,
        buffers: HashMap::new(),
        builder: SceneBuilder::new(),
    };

    let mut root = Node::new(root_name, Transform::identity());
    let identity = Matrix4::identity();
    for id in &top_level {
        root.children.push(decoder.node(id, &identity, 0)?);
    }

    Ok(decoder.builder.finish(root))
}

struct Decoder<'a> {
    document: &'a Document,
    loader: &'a dyn UriLoader,
    /// 按需获取的缓冲区
    buffers: HashMap<String, Vec<u8>>,
    builder: SceneBuilder,
}

impl<'a> Decoder<'a> {
    fn node(&mut self, id: &str, parent_world: &Matrix4, depth: usize) -> Result<Node> {
        let reference = format!("nodes/{}", id);
        if depth > MAX_NODE_DEPTH {
            return Err(
                ImportError::malformed(reference, "node hierarchy too deep or cyclic").into(),
            );
        }
        let document = self.document;
        let def = document
            .nodes
            .get(id)
            .ok_or_else(|| ImportError::malformed(&reference, "node does not exist"))?;

        let transform = if def.matrix != IDENTITY_MATRIX {
            mirror_matrix(&def.matrix)
        } else {
            mirror_trs(def.translation, def.rotation, def.scale)
        };
        let world = parent_world * transform.matrix();

        let mut out = Node::new(def.name.clone().unwrap_or_else(|| id.to_string()), transform);

        for mesh_id in &def.meshes {
            let instance = self.mesh_instance(mesh_id)?;
            let bounds = self.builder.mesh_bounds(instance.mesh);
            self.builder.include_bounds(&bounds, &world);
            out.mesh_instances.push(instance);
        }

        for child in &def.children {
            out.children.push(self.node(child, &world, depth + 1)?);
        }

        Ok(out)
    }

    fn mesh_instance(&mut self, id: &str) -> Result<MeshInstance> {
        if let Some(instance) = self.builder.mesh_instance(id) {
            return Ok(instance);
        }
        let document = self.document;
        let def = document.meshes.get(id).ok_or_else(|| {
            ImportError::malformed(format!("meshes/{}", id), "mesh does not exist")
        })?;

        let name = def.name.clone().unwrap_or_else(|| id.to_string());
        let mut data = MeshData::with_name(name.clone());
        let mut materials = Vec::new();

        for (i, primitive) in def.primitives.iter().enumerate() {
            let reference = format!("meshes/{}/primitives[{}]", id, i);
            let mode = PrimitiveMode::from_gl(primitive.mode).ok_or_else(|| {
                ImportError::malformed(
                    &reference,
                    format!("unsupported primitive mode {}", primitive.mode),
                )
            })?;

            let position_id = primitive
                .attributes
                .get("POSITION")
                .ok_or_else(|| ImportError::malformed(&reference, "primitive has no POSITION"))?;
            let raw = PrimitiveData {
                positions: self.read_vec3(position_id)?,
                normals: match primitive.attributes.get("NORMAL") {
                    Some(accessor) => Some(self.read_vec3(accessor)?),
                    None => None,
                },
                texcoords: match primitive.attributes.get("TEXCOORD_0") {
                    Some(accessor) => Some(self.read_vec2(accessor)?),
                    None => None,
                },
                indices: match &primitive.indices {
                    Some(accessor) => Some(self.read_indices(accessor)?),
                    None => None,
                },
            };

            let (vertices, indices) = finish_primitive(raw, mode, false, &reference)?;
            data.push_subset(vertices, &indices);

            let material = match &primitive.material {
                Some(material_id) => self.material(material_id)?,
                None => self.builder.default_material(),
            };
            materials.push(material);
        }

        data.validate()
            .map_err(|reason| ImportError::malformed(format!("meshes/{}", id), reason))?;

        Ok(self
            .builder
            .add_mesh(id, MeshResource::new(name, data), materials))
    }

    // ---- 访问器读取 ----

    fn read_vec3(&mut self, id: &str) -> Result<Vec<[f32; 3]>> {
        let values = self.read_accessor(id, "VEC3", read_f32)?;
        Ok(values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
    }

    fn read_vec2(&mut self, id: &str) -> Result<Vec<[f32; 2]>> {
        let values = self.read_accessor(id, "VEC2", read_f32)?;
        Ok(values.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
    }

    fn read_indices(&mut self, id: &str) -> Result<Vec<u32>> {
        let accessor = self.accessor(id)?;
        if !matches!(accessor.component_type, 5121 | 5123 | 5125) {
            return Err(ImportError::malformed(
                format!("accessors/{}", id),
                format!("index component type {} is not unsigned", accessor.component_type),
            )
            .into());
        }
        self.read_accessor(id, "SCALAR", read_u32)
    }

    fn accessor(&self, id: &str) -> Result<&'a AccessorDef> {
        let document = self.document;
        document.accessors.get(id).ok_or_else(|| {
            ImportError::malformed(format!("accessors/{}", id), "accessor does not exist").into()
        })
    }

    /// 读取访问器的全部分量，返回扁平数组
    fn read_accessor<T>(
        &mut self,
        id: &str,
        expected: &str,
        convert: fn(&[u8], u32) -> T,
    ) -> Result<Vec<T>> {
        let reference = format!("accessors/{}", id);
        let accessor = self.accessor(id)?;

        if accessor.kind != expected {
            return Err(ImportError::malformed(
                reference,
                format!("expected {}, found {}", expected, accessor.kind),
            )
            .into());
        }
        let width = component_count(&accessor.kind).ok_or_else(|| {
            ImportError::malformed(&reference, format!("unknown type {}", accessor.kind))
        })?;
        let component_size = component_size(accessor.component_type).ok_or_else(|| {
            ImportError::malformed(
                &reference,
                format!("unknown component type {}", accessor.component_type),
            )
        })?;

        let document = self.document;
        let view = document.buffer_views.get(&accessor.buffer_view).ok_or_else(|| {
            ImportError::malformed(
                &reference,
                format!("bufferView '{}' does not exist", accessor.buffer_view),
            )
        })?;
        let buffer = self.buffer(&view.buffer)?;

        let view_end = match view.byte_length {
            Some(length) => view.byte_offset.checked_add(length),
            None => Some(buffer.len()),
        };
        let view_bytes = view_end
            .filter(|&end| end <= buffer.len() && view.byte_offset <= end)
            .map(|end| &buffer[view.byte_offset..end])
            .ok_or_else(|| {
                ImportError::malformed(
                    &reference,
                    format!(
                        "bufferView '{}' exceeds buffer '{}'",
                        accessor.buffer_view, view.buffer
                    ),
                )
            })?;

        let element_size = width * component_size;
        let stride = if accessor.byte_stride == 0 {
            element_size
        } else {
            accessor.byte_stride
        };
        if stride < element_size {
            return Err(ImportError::malformed(
                &reference,
                format!("byteStride {} smaller than element size {}", stride, element_size),
            )
            .into());
        }

        if accessor.count == 0 {
            return Ok(Vec::new());
        }
        let needed = stride.checked_mul(accessor.count - 1).and_then(|n| {
            accessor
                .byte_offset
                .checked_add(element_size)
                .and_then(|first| n.checked_add(first))
        });
        if !matches!(needed, Some(needed) if needed <= view_bytes.len()) {
            return Err(ImportError::malformed(
                &reference,
                format!(
                    "{} elements read past the end of bufferView '{}'",
                    accessor.count, accessor.buffer_view
                ),
            )
            .into());
        }

        let mut values = Vec::with_capacity(accessor.count * width);
        for i in 0..accessor.count {
            let start = accessor.byte_offset + i * stride;
            for c in 0..width {
                let offset = start + c * component_size;
                values.push(convert(
                    &view_bytes[offset..offset + component_size],
                    accessor.component_type,
                ));
            }
        }
        Ok(values)
    }

    fn buffer(&mut self, id: &str) -> Result<&[u8]> {
        if !self.buffers.contains_key(id) {
            let document = self.document;
            let def = document.buffers.get(id).ok_or_else(|| {
                ImportError::malformed(format!("buffers/{}", id), "buffer does not exist")
            })?;
            let bytes = fetch_bytes(self.loader, &def.uri)?;
            if let Some(length) = def.byte_length {
                if bytes.len() < length {
                    return Err(ImportError::malformed(
                        short_ref(&def.uri),
                        format!("buffer holds {} bytes, {} declared", bytes.len(), length),
                    )
                    .into());
                }
            }
            self.buffers.insert(id.to_string(), bytes);
        }
        Ok(self.buffers.get(id).map(Vec::as_slice).unwrap_or_default())
    }

    // ---- 材质与纹理 ----

    fn material(&mut self, id: &str) -> Result<MaterialHandle> {
        if let Some(handle) = self.builder.material(id) {
            return Ok(handle);
        }
        let document = self.document;
        let def = document.materials.get(id).ok_or_else(|| {
            ImportError::malformed(format!("materials/{}", id), "material does not exist")
        })?;

        let texture_id = ["diffuse", "u_diffuse", "baseColorTexture", "u_MainTex"]
            .iter()
            .filter_map(|key| def.values.get(*key))
            .chain(def.values.values())
            .find_map(|value| value.as_str());
        let base_color_texture = match texture_id {
            Some(texture_id) => Some(self.texture(texture_id)?),
            None => None,
        };

        let base_color = COLOR_KEYS
            .iter()
            .filter_map(|key| def.values.get(*key))
            .find_map(color_from_value)
            .unwrap_or(Color::WHITE);

        let transparent = def
            .technique
            .as_ref()
            .and_then(|t| document.techniques.get(t))
            .map(|t| t.states.enable.contains(&GL_BLEND))
            .unwrap_or(false);

        let resource = MaterialResource {
            name: def.name.clone().unwrap_or_else(|| id.to_string()),
            shading: Shading {
                base_color,
                alpha_mode: if transparent {
                    AlphaMode::Blend
                } else {
                    AlphaMode::Opaque
                },
                ..Shading::default()
            },
            base_color_texture,
        };
        Ok(self.builder.add_material(id, resource))
    }

    fn texture(&mut self, id: &str) -> Result<TextureHandle> {
        let document = self.document;
        let reference = format!("textures/{}", id);
        let texture = document
            .textures
            .get(id)
            .ok_or_else(|| ImportError::malformed(&reference, "texture does not exist"))?;
        let image = document.images.get(&texture.source).ok_or_else(|| {
            ImportError::malformed(&reference, format!("image '{}' does not exist", texture.source))
        })?;

        let key = format!("uri:{}", image.uri);
        if let Some(handle) = self.builder.texture(&key) {
            return Ok(handle);
        }

        let name = image.name.clone().unwrap_or_else(|| name_from_uri(&image.uri));
        let encoded = fetch_bytes(self.loader, &image.uri)?;
        let resource = decode_texture(name, key, &image.uri, encoded)?;
        Ok(self.builder.add_texture(resource))
    }
}

fn component_count(kind: &str) -> Option<usize> {
    match kind {
        "SCALAR" => Some(1),
        "VEC2" => Some(2),
        "VEC3" => Some(3),
        "VEC4" => Some(4),
        "MAT2" => Some(4),
        "MAT3" => Some(9),
        "MAT4" => Some(16),
        _ => None,
    }
}

fn component_size(component_type: u32) -> Option<usize> {
    match component_type {
        5120 | 5121 => Some(1),
        5122 | 5123 => Some(2),
        5125 | 5126 => Some(4),
        _ => None,
    }
}

/// 读取一个小端分量
fn read_f32(bytes: &[u8], component_type: u32) -> f32 {
    match component_type {
        5120 => bytes[0] as i8 as f32,
        5121 => bytes[0] as f32,
        5122 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
        5123 => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
        5125 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
        _ => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

/// 读取一个无符号整数分量（索引）
fn read_u32(bytes: &[u8], component_type: u32) -> u32 {
    match component_type {
        5121 => bytes[0] as u32,
        5123 => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
        _ => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

/// 3 或 4 个数字的数组解释为颜色
fn color_from_value(value: &serde_json::Value) -> Option<Color> {
    let array = value.as_array()?;
    let mut c = [1.0f32; 4];
    if array.len() < 3 {
        return None;
    }
    for (slot, v) in c.iter_mut().zip(array.iter()) {
        *slot = v.as_f64()? as f32;
    }
    Some(Color::from_array(c))
}
