//! glTF/GLB importer
//!
//! Produces, per file:
//! - one [`Texture`](void_asset::Texture) per image, imported through the registry as an embedded
//!   resource (so PNG and KTX2 images go through their own importers)
//! - one [`Material`] per glTF material (PBR metallic-roughness)
//! - one [`Mesh`] per glTF mesh, one sub-mesh per primitive
//! - one [`SubScene`] holding the node hierarchy, which is the main asset
//!
//! Buffers may live in the GLB binary chunk, in base64 data URIs or in files
//! next to the source.

use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};
use void_asset::{
    AssetError, AssetId, AssetResult, FormatImporter, ImportContext, Material, Mesh, SubScene,
    UvTransform,
};

use crate::error::DecodeError;

/// GLB container magic
pub const GLB_MAGIC: [u8; 4] = *b"glTF";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GltfSettings {
    /// Uniform scale applied to positions and node translations
    pub scale: f32,
    /// Import referenced images as textures
    pub import_textures: bool,
}

impl Default for GltfSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            import_textures: true,
        }
    }
}

/// Importer for glTF 2.0 JSON and binary (GLB) files
#[derive(Debug, Default)]
pub struct GltfImporter;

fn invalid(message: impl Into<String>) -> AssetError {
    AssetError::import(GltfImporter::NAME, DecodeError::InvalidGltf(message.into()))
}

fn decode_error(e: impl Into<DecodeError>) -> AssetError {
    AssetError::import(GltfImporter::NAME, e.into())
}

/// Check if `bytes` look like a glTF JSON document
fn is_gltf_json(bytes: &[u8]) -> bool {
    let trimmed = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(&[][..], |start| &bytes[start..]);
    trimmed.starts_with(b"{") && trimmed.windows(7).any(|w| w == b"\"asset\"")
}

/// Bytes behind a URI: base64 data URI or a file relative to `base`
fn read_uri(uri: &str, base: &Path) -> Result<Vec<u8>, DecodeError> {
    if let Some(rest) = uri.strip_prefix("data:") {
        let Some((_, payload)) = rest.split_once(";base64,") else {
            return Err(DecodeError::InvalidGltf(format!("unsupported data URI '{}'", uri)));
        };
        return Ok(base64::engine::general_purpose::STANDARD.decode(payload)?);
    }

    let path = base.join(uri.replace("%20", " "));
    std::fs::read(&path).map_err(|source| DecodeError::External { path, source })
}

impl GltfImporter {
    fn import_images(
        ctx: &mut ImportContext<'_>,
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
    ) -> AssetResult<Vec<Option<AssetId>>> {
        let base = ctx.base_dir().to_path_buf();
        let mut ids = Vec::with_capacity(document.images().len());

        for image in document.images() {
            let bytes = match image.source() {
                gltf::image::Source::View { view, .. } => {
                    let range = view.offset()..view.offset() + view.length();
                    buffers
                        .get(view.buffer().index())
                        .and_then(|b| b.0.get(range))
                        .ok_or_else(|| invalid(format!("image {} view out of bounds", image.index())))?
                        .to_vec()
                }
                gltf::image::Source::Uri { uri, .. } => read_uri(uri, &base).map_err(decode_error)?,
            };

            let name = format!("image{}", image.index());
            match ctx.import_embedded(&name, &bytes) {
                Ok(id) => ids.push(Some(id)),
                Err(AssetError::NoImporterFound { path }) => {
                    log::warn!("No importer for {}, texture dropped", path.display());
                    ids.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ids)
    }

    fn import_materials(
        ctx: &mut ImportContext<'_>,
        document: &gltf::Document,
        images: &[Option<AssetId>],
    ) -> Vec<AssetId> {
        let texture_id = |info: Option<gltf::texture::Texture<'_>>| -> AssetId {
            info.and_then(|t| images.get(t.source().index()).cloned().flatten())
                .unwrap_or_default()
        };

        let mut ids = Vec::new();
        for mat in document.materials() {
            let Some(index) = mat.index() else {
                continue;
            };
            let pbr = mat.pbr_metallic_roughness();
            let name = mat.name().map_or_else(|| format!("material{}", index), str::to_string);

            let mut material = Material::new(ctx.sub_asset_id::<Material>(&format!("material{}", index)), name);
            material.base_color_factor = pbr.base_color_factor();
            let [r, g, b] = mat.emissive_factor();
            material.emissive_factor = [r, g, b, 1.0];
            material.metallic_factor = pbr.metallic_factor();
            material.roughness_factor = pbr.roughness_factor();

            material.base_color_texture = texture_id(pbr.base_color_texture().map(|t| t.texture()));
            material.metallic_roughness_texture =
                texture_id(pbr.metallic_roughness_texture().map(|t| t.texture()));
            material.normal_texture = texture_id(mat.normal_texture().map(|t| t.texture()));

            if let Some(transform) = pbr.base_color_texture().and_then(|t| t.texture_transform()) {
                material.uv_transform = UvTransform {
                    offset: transform.offset(),
                    scale: transform.scale(),
                    rotation: transform.rotation(),
                };
            }

            material.link_textures();
            ids.push(ctx.add_asset(material));
        }
        ids
    }

    fn import_meshes(
        ctx: &mut ImportContext<'_>,
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        materials: &[AssetId],
        scale: f32,
    ) -> AssetResult<Vec<AssetId>> {
        let mut default_material: Option<AssetId> = None;
        let mut ids = Vec::new();

        for mesh in document.meshes() {
            let name = mesh.name().map_or_else(|| format!("mesh{}", mesh.index()), str::to_string);
            let mut asset = Mesh::new(ctx.sub_asset_id::<Mesh>(&format!("mesh{}", mesh.index())), name);

            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::warn!("Skipping non-triangle primitive in mesh {}", mesh.index());
                    continue;
                }
                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));

                let positions: Vec<[f32; 4]> = reader
                    .read_positions()
                    .ok_or_else(|| invalid(format!("mesh {} primitive without positions", mesh.index())))?
                    .map(|[x, y, z]| [x * scale, y * scale, z * scale, 1.0])
                    .collect();

                let uvs: Vec<[f32; 2]> = reader
                    .read_tex_coords(0)
                    .map(|t| t.into_f32().collect())
                    .unwrap_or_default();

                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|i| i.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());

                let material = match primitive.material().index() {
                    Some(i) => materials
                        .get(i)
                        .cloned()
                        .ok_or_else(|| invalid(format!("material {} out of range", i)))?,
                    None => default_material
                        .get_or_insert_with(|| {
                            let id = ctx.sub_asset_id::<Material>("material_default");
                            ctx.add_asset(Material::new(id, "default"))
                        })
                        .clone(),
                };

                asset.push_submesh(&indices, &positions, &uvs, material);
            }

            ids.push(ctx.add_asset(asset));
        }
        Ok(ids)
    }

    fn import_scene(
        ctx: &mut ImportContext<'_>,
        document: &gltf::Document,
        meshes: &[AssetId],
        scale: f32,
    ) -> AssetId {
        let mut scene = SubScene::new(ctx.sub_asset_id::<SubScene>("scene"), ctx.resource_name());

        for node in document.nodes() {
            let mut transform = node.transform().matrix();
            for component in &mut transform[3][..3] {
                *component *= scale;
            }
            let mesh = node
                .mesh()
                .and_then(|m| meshes.get(m.index()).cloned())
                .unwrap_or_default();
            let name = node.name().map_or_else(|| format!("node{}", node.index()), str::to_string);
            scene.add_node(name, transform, mesh);
        }
        for node in document.nodes() {
            scene.children[node.index()] = node.children().map(|c| c.index() as u32).collect();
        }

        scene.roots = match document.default_scene().or_else(|| document.scenes().next()) {
            Some(s) => s.nodes().map(|n| n.index() as u32).collect(),
            None => {
                // No scene: every node nobody points at is a root
                let mut has_parent = vec![false; scene.node_count()];
                for children in &scene.children {
                    for &c in children {
                        has_parent[c as usize] = true;
                    }
                }
                (0..scene.node_count() as u32)
                    .filter(|&i| !has_parent[i as usize])
                    .collect()
            }
        };

        ctx.add_asset(scene)
    }
}

impl FormatImporter for GltfImporter {
    type Settings = GltfSettings;
    const NAME: &'static str = "gltf";

    fn can_import(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(&GLB_MAGIC) || is_gltf_json(bytes)
    }

    fn import(&self, ctx: &mut ImportContext<'_>, bytes: &[u8], settings: &GltfSettings) -> AssetResult<AssetId> {
        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes).map_err(decode_error)?;
        let buffers =
            gltf::import_buffers(&document, Some(ctx.base_dir()), blob).map_err(decode_error)?;

        let images = if settings.import_textures {
            Self::import_images(ctx, &document, &buffers)?
        } else {
            vec![None; document.images().len()]
        };
        let materials = Self::import_materials(ctx, &document, &images);
        let meshes = Self::import_meshes(ctx, &document, &buffers, &materials, settings.scale)?;
        let scene = Self::import_scene(ctx, &document, &meshes, settings.scale);

        log::debug!(
            "glTF: {} textures, {} materials, {} meshes, {} nodes",
            images.iter().flatten().count(),
            materials.len(),
            meshes.len(),
            document.nodes().len()
        );
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature() {
        let importer = GltfImporter;
        assert!(FormatImporter::can_import(&importer, b"glTF\x02\x00\x00\x00"));
        assert!(FormatImporter::can_import(&importer, b"  {\"asset\": {\"version\": \"2.0\"}}"));
        assert!(!FormatImporter::can_import(&importer, b"{\"name\": 1}"));
        assert!(!FormatImporter::can_import(&importer, &[0u8; 12]));
    }

    #[test]
    fn test_data_uri() {
        let bytes = read_uri("data:application/octet-stream;base64,AAEC", Path::new(".")).unwrap();
        assert_eq!(bytes, vec![0, 1, 2]);
        assert!(read_uri("data:text/plain,hello", Path::new(".")).is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = GltfSettings::default();
        assert_eq!(settings.scale, 1.0);
        assert!(settings.import_textures);
    }
}
