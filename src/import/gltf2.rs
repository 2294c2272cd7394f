//! glTF 2.0 解码器
//!
//! 文档解析交给 `gltf` crate（同时支持 `.gltf` 文本和 `.glb` 二进制容器），
//! 这里负责缓冲区获取、范围校验以及向场景图的翻译。

use std::collections::HashSet;

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
    PrimitiveData, PrimitiveMode, SceneBuilder, MAX_NODE_DEPTH,
};

const DESCRIPTION: &str = "<gltf 2.0 description>";

/// 解码 glTF 2.0 描述
pub(crate) fn decode(description: &[u8], loader: &dyn UriLoader) -> Result<ImportResult> {
    let gltf = gltf::Gltf::from_slice(description)
        .map_err(|e| ImportError::malformed(DESCRIPTION, e.to_string()))?;

    // 缓冲区
    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let (reference, data) = match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf.blob.clone().ok_or_else(|| {
                    ImportError::malformed(
                        "<glb BIN chunk>",
                        "buffer refers to a missing BIN chunk",
                    )
                })?;
                ("<glb BIN chunk>".to_string(), blob)
            }
            gltf::buffer::Source::Uri(uri) => (uri.to_string(), fetch_bytes(loader, uri)?),
        };
        if data.len() < buffer.length() {
            return Err(ImportError::malformed(
                super::builder::short_ref(&reference),
                format!("buffer holds {} bytes, {} declared", data.len(), buffer.length()),
            )
            .into());
        }
        buffers.push(data);
    }

    let mut decoder = Decoder {
        buffers,
        loader,
        builder: SceneBuilder::new(),
    };

    let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
    let top_level: Vec<gltf::Node> = match &scene {
        Some(scene) => scene.nodes().collect(),
        None => {
            let children: HashSet<usize> = gltf
                .nodes()
                .flat_map(|n| n.children().map(|c| c.index()))
                .collect();
            let parentless: Vec<gltf::Node> =
                gltf.nodes().filter(|n| !children.contains(&n.index())).collect();
            crate::import_warn!(
                nodes = parentless.len(),
                "No scene defined, using parentless nodes"
            );
            parentless
        }
    };

    let root_name = scene
        .as_ref()
        .and_then(|s| s.name())
        .unwrap_or("Scene")
        .to_string();
    let mut root = Node::new(root_name, Transform::identity());
    let identity = Matrix4::identity();
    for node in top_level {
        root.children.push(decoder.node(node, &identity, 0)?);
    }

    Ok(decoder.builder.finish(root))
}

struct Decoder<'a> {
    buffers: Vec<Vec<u8>>,
    loader: &'a dyn UriLoader,
    builder: SceneBuilder,
}

impl<'a> Decoder<'a> {
    fn node(&mut self, node: gltf::Node, parent_world: &Matrix4, depth: usize) -> Result<Node> {
        if depth > MAX_NODE_DEPTH {
            return Err(ImportError::malformed(
                format!("nodes[{}]", node.index()),
                "node hierarchy too deep or cyclic",
            )
            .into());
        }

        let transform = match node.transform() {
            gltf::scene::Transform::Matrix { matrix } => {
                let mut columns = [0.0f32; 16];
                for (c, column) in matrix.iter().enumerate() {
                    columns[c * 4..c * 4 + 4].copy_from_slice(column);
                }
                mirror_matrix(&columns)
            }
            gltf::scene::Transform::Decomposed {
                translation,
                rotation,
                scale,
            } => mirror_trs(translation, rotation, scale),
        };
        let world = parent_world * transform.matrix();

        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let mut out = Node::new(name, transform);

        if let Some(mesh) = node.mesh() {
            let instance = self.mesh_instance(mesh)?;
            let bounds = self.builder.mesh_bounds(instance.mesh);
            self.builder.include_bounds(&bounds, &world);
            out.mesh_instances.push(instance);
        }

        for child in node.children() {
            out.children.push(self.node(child, &world, depth + 1)?);
        }

        Ok(out)
    }

    fn mesh_instance(&mut self, mesh: gltf::Mesh) -> Result<MeshInstance> {
        let key = mesh.index().to_string();
        if let Some(instance) = self.builder.mesh_instance(&key) {
            return Ok(instance);
        }

        let name = mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
        let mut data = MeshData::with_name(name.clone());
        let mut materials = Vec::new();

        for primitive in mesh.primitives() {
            let reference = format!("meshes[{}].primitives[{}]", mesh.index(), primitive.index());

            let mode = PrimitiveMode::from_gl(primitive.mode().as_gl_enum()).ok_or_else(|| {
                ImportError::malformed(
                    &reference,
                    format!("unsupported primitive mode {:?}", primitive.mode()),
                )
            })?;

            for (_, accessor) in primitive.attributes() {
                self.check_accessor(&accessor, &reference)?;
            }
            if let Some(accessor) = primitive.indices() {
                self.check_accessor(&accessor, &reference)?;
            }

            let raw = {
                let reader = primitive
                    .reader(|buffer| self.buffers.get(buffer.index()).map(Vec::as_slice));
                let positions = reader
                    .read_positions()
                    .ok_or_else(|| ImportError::malformed(&reference, "primitive has no POSITION"))?
                    .collect();
                PrimitiveData {
                    positions,
                    normals: reader.read_normals().map(|n| n.collect()),
                    texcoords: reader.read_tex_coords(0).map(|t| t.into_f32().collect()),
                    indices: reader.read_indices().map(|i| i.into_u32().collect()),
                }
            };

            let (vertices, indices) = finish_primitive(raw, mode, true, &reference)?;
            data.push_subset(vertices, &indices);
            materials.push(self.material(primitive.material())?);
        }

        data.validate()
            .map_err(|reason| ImportError::malformed(format!("meshes[{}]", mesh.index()), reason))?;

        Ok(self
            .builder
            .add_mesh(key, MeshResource::new(name, data), materials))
    }

    /// 访问器读取的字节范围必须落在缓冲视图和缓冲区之内
    fn check_accessor(&self, accessor: &gltf::Accessor, reference: &str) -> Result<()> {
        let Some(view) = accessor.view() else {
            return Ok(());
        };

        let buffer_len = self
            .buffers
            .get(view.buffer().index())
            .map(Vec::len)
            .unwrap_or(0);
        let view_end = view.offset().checked_add(view.length());
        if !matches!(view_end, Some(end) if end <= buffer_len) {
            return Err(ImportError::malformed(
                reference,
                format!("bufferViews[{}] exceeds its buffer", view.index()),
            )
            .into());
        }

        if accessor.count() == 0 {
            return Ok(());
        }
        let element = accessor.size();
        let stride = view.stride().unwrap_or(element);
        let needed = stride.checked_mul(accessor.count() - 1).and_then(|n| {
            accessor
                .offset()
                .checked_add(element)
                .and_then(|first| n.checked_add(first))
        });
        match needed {
            Some(needed) if needed <= view.length() => Ok(()),
            _ => Err(ImportError::malformed(
                reference,
                format!(
                    "accessors[{}] reads past bufferViews[{}]",
                    accessor.index(),
                    view.index()
                ),
            )
            .into()),
        }
    }

    fn material(&mut self, material: gltf::Material) -> Result<MaterialHandle> {
        let Some(index) = material.index() else {
            return Ok(self.builder.default_material());
        };
        let key = index.to_string();
        if let Some(handle) = self.builder.material(&key) {
            return Ok(handle);
        }

        let pbr = material.pbr_metallic_roughness();
        let base_color_texture = match pbr.base_color_texture() {
            Some(info) => Some(self.texture(info.texture())?),
            None => None,
        };

        let alpha_mode = match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask {
                cutoff: material.alpha_cutoff().unwrap_or(0.5),
            },
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        };

        let resource = MaterialResource {
            name: material
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material_{}", index)),
            shading: Shading {
                base_color: Color::from_array(pbr.base_color_factor()),
                metallic: pbr.metallic_factor(),
                roughness: pbr.roughness_factor(),
                emissive: material.emissive_factor(),
                alpha_mode,
                double_sided: material.double_sided(),
            },
            base_color_texture,
        };
        Ok(self.builder.add_material(key, resource))
    }

    fn texture(&mut self, texture: gltf::Texture) -> Result<TextureHandle> {
        let image = texture.source();
        match image.source() {
            gltf::image::Source::Uri { uri, .. } => {
                let key = format!("uri:{}", uri);
                if let Some(handle) = self.builder.texture(&key) {
                    return Ok(handle);
                }
                let name = image
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| name_from_uri(uri));
                let encoded = fetch_bytes(self.loader, uri)?;
                let resource = decode_texture(name, key, uri, encoded)?;
                Ok(self.builder.add_texture(resource))
            }
            gltf::image::Source::View { view, .. } => {
                let key = format!("view:{}", view.index());
                if let Some(handle) = self.builder.texture(&key) {
                    return Ok(handle);
                }
                let reference = format!("bufferViews[{}]", view.index());
                let start = view.offset();
                let encoded = self
                    .buffers
                    .get(view.buffer().index())
                    .zip(start.checked_add(view.length()))
                    .and_then(|(b, end)| b.get(start..end))
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| {
                        ImportError::malformed(&reference, "image view exceeds its buffer")
                    })?;
                let name = image
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("image_{}", image.index()));
                let resource = decode_texture(name, key, &reference, encoded)?;
                Ok(self.builder.add_texture(resource))
            }
        }
    }
}
