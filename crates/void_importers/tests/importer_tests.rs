//! Integration tests for the built-in importers

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use void_asset::*;
use void_importers::default_importers;

fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| Rgba([(x * 30) as u8, (y * 30) as u8, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img).write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Single level, uncompressed RGBA8 sRGB KTX2
fn encode_ktx2(width: u32, height: u32) -> Vec<u8> {
    let pixels = vec![0x7fu8; (width * height * 4) as usize];
    let mut out = void_importers::ktx2::KTX2_IDENTIFIER.to_vec();
    for value in [43u32, 1, width, height, 0, 0, 1, 1, 0] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&[0u8; 32]);
    let data_start = 80 + 24;
    out.extend_from_slice(&(data_start as u64).to_le_bytes());
    out.extend_from_slice(&(pixels.len() as u64).to_le_bytes());
    out.extend_from_slice(&(pixels.len() as u64).to_le_bytes());
    out.extend_from_slice(&pixels);
    out
}

fn manager(root: &Path) -> AssetManager {
    AssetManager::new(
        AssetManagerConfig::with_root(root),
        AssetConstructors::with_builtin(),
        Arc::new(default_importers().unwrap()),
    )
    .unwrap()
}

fn main_asset(manager: &AssetManager, path: &Path) -> AssetId {
    let handle = manager.database().find_resource(path).unwrap();
    manager.database().resource(handle).asset_id.clone()
}

#[test]
fn test_signature_selects_importer() {
    let registry = default_importers().unwrap();
    let png = registry.find_importer(&encode_png(1, 1)).unwrap();
    let ktx2 = registry.find_importer(&encode_ktx2(1, 1)).unwrap();

    assert_eq!(registry.get(png).unwrap().name(), "png");
    assert_eq!(registry.get(ktx2).unwrap().name(), "ktx2");
    assert_eq!(registry.find_importer(&[0u8; 64]), None);
}

#[test]
fn test_png_and_ktx2_side_by_side() {
    let dir = tempfile::tempdir().unwrap();
    let png_path = dir.path().join("albedo.png");
    let ktx_path = dir.path().join("albedo.ktx2");
    fs::write(&png_path, encode_png(4, 4)).unwrap();
    fs::write(&ktx_path, encode_ktx2(4, 4)).unwrap();

    let mut manager = manager(dir.path());
    let report = manager.refresh().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.imported.len(), 2);

    let png = manager.get_asset_as::<Texture>(&main_asset(&manager, &png_path)).unwrap();
    assert_eq!(png.extension, TextureExtension::Png);
    assert_eq!(png.format, TextureFormat::Rgba8Srgb);
    assert_eq!((png.width, png.height), (4, 4));
    assert_eq!(png.pixels.len(), 64);

    let ktx = manager.get_asset_as::<Texture>(&main_asset(&manager, &ktx_path)).unwrap();
    assert_eq!(ktx.extension, TextureExtension::Ktx2);
    assert_eq!(ktx.format, TextureFormat::Rgba8Srgb);
    assert_eq!(ktx.pixels, vec![0x7f; 64]);

    let meta = ResourceMeta::read(&meta_path_for(&ktx_path, "meta")).unwrap();
    assert_eq!(meta.importer, "ktx2");
}

#[test]
fn test_unrecognized_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zeros.dat");
    fs::write(&path, [0u8; 128]).unwrap();

    let manager = manager(dir.path());
    let err = manager.find_importer(&[0u8; 128], &path).unwrap_err();
    assert!(matches!(err, AssetError::NoImporterFound { .. }));
}

#[test]
fn test_png_import_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wall.png");
    fs::write(&path, encode_png(8, 8)).unwrap();

    let mut manager = manager(dir.path());
    manager.refresh().unwrap();
    let id = main_asset(&manager, &path);
    let compiled = fs::read(manager.compiled_path(&id)).unwrap();

    assert!(manager.refresh().unwrap().imported.is_empty());

    // Forced re-import of the same bytes
    let handle = manager.database().find_resource(&path).unwrap();
    let uuid = manager.database().resource(handle).uuid.unwrap();
    let settings = void_importers::PngSettings::default();
    let png = manager.importers().index_of("png").unwrap();
    let again = manager
        .import_resource(handle, uuid, &fs::read(&path).unwrap(), &settings, png)
        .unwrap();

    assert_eq!(again, id);
    assert_eq!(fs::read(manager.compiled_path(&id)).unwrap(), compiled);
}

#[test]
fn test_png_settings_from_meta() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mips.png");
    fs::write(&path, encode_png(4, 4)).unwrap();

    let mut manager = manager(dir.path());
    manager.refresh().unwrap();

    // Turn on mips in the side-car and touch the source
    let meta_path = meta_path_for(&path, "meta");
    let mut meta = ResourceMeta::read(&meta_path).unwrap();
    meta.settings = serde_json::json!({ "srgb": false, "generate_mips": true });
    meta.write(&meta_path).unwrap();
    fs::write(&path, encode_png(4, 2)).unwrap();

    manager.refresh().unwrap();
    let texture = manager.get_asset_as::<Texture>(&main_asset(&manager, &path)).unwrap();
    assert_eq!(texture.format, TextureFormat::Rgba8Unorm);
    assert_eq!(texture.levels, 3);
}

#[test]
fn test_gltf_scene_with_embedded_image() {
    let b64 = base64::engine::general_purpose::STANDARD;

    let mut positions = Vec::new();
    for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for c in v {
            positions.extend_from_slice(&c.to_le_bytes());
        }
    }

    let document = serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "triangle", "mesh": 0, "translation": [0.0, 2.0, 0.0] }],
        "meshes": [{ "name": "tri", "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] }],
        "materials": [{
            "name": "painted",
            "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 }, "metallicFactor": 0.25 }
        }],
        "textures": [{ "source": 0 }],
        "images": [{ "uri": format!("data:image/png;base64,{}", b64.encode(encode_png(2, 2))) }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
        "buffers": [{
            "byteLength": 36,
            "uri": format!("data:application/octet-stream;base64,{}", b64.encode(&positions))
        }]
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triangle.gltf");
    fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();

    let mut manager = manager(dir.path());
    let report = manager.refresh().unwrap();
    assert!(report.is_clean(), "{:?}", report.failed);

    let scene_id = main_asset(&manager, &path);
    let scene = manager.get_asset_as::<SubScene>(&scene_id).unwrap().clone();
    assert_eq!(scene.node_count(), 1);
    assert_eq!(scene.roots, vec![0]);
    assert_eq!(scene.transforms[0][3][1], 2.0);

    let mesh = manager.get_asset_as::<Mesh>(&scene.meshes[0]).unwrap().clone();
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.indices, vec![0, 1, 2]);

    let material_id = mesh.submeshes[0].material.clone();
    let material = manager.get_asset_as::<Material>(&material_id).unwrap().clone();
    assert_eq!(material.base.name, "painted");
    assert_eq!(material.metallic_factor, 0.25);
    assert!(material.base_color_texture.is_valid());

    // Drop everything and pull the whole graph back from the compiled store
    for meta in manager.get_assets_metadata() {
        manager.unload_asset(&meta.id);
    }
    manager.load_asset(&scene_id).unwrap();
    for id in [&scene_id, &scene.meshes[0], &material_id, &material.base_color_texture] {
        assert_eq!(manager.asset_state(id), AssetState::Loaded, "{}", id);
    }
    let texture = manager.get_asset_as::<Texture>(&material.base_color_texture).unwrap();
    assert_eq!((texture.width, texture.height), (2, 2));
}
