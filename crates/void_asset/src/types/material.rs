//! PBR metallic-roughness material

use serde::{Deserialize, Serialize};

use crate::archive::Archive;
use crate::asset::{Asset, AssetBase};
use crate::error::AssetResult;
use crate::id::{AssetId, AssetType, TypeTag};

/// Texture coordinate transform applied to every texture of the material
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UvTransform {
    pub offset: [f32; 2],
    pub scale: [f32; 2],
    pub rotation: f32,
}

impl Default for UvTransform {
    fn default() -> Self {
        Self {
            offset: [0.0, 0.0],
            scale: [1.0, 1.0],
            rotation: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub base: AssetBase,
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub base_color_texture: AssetId,
    pub normal_texture: AssetId,
    pub metallic_roughness_texture: AssetId,
    pub uv_transform: UvTransform,
}

impl AssetType for Material {
    const TYPE_TAG: TypeTag = TypeTag::new(*b"MTRL");
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base: AssetBase::default(),
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            emissive_factor: [0.0, 0.0, 0.0, 0.0],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            base_color_texture: AssetId::invalid(),
            normal_texture: AssetId::invalid(),
            metallic_roughness_texture: AssetId::invalid(),
            uv_transform: UvTransform::default(),
        }
    }
}

impl Material {
    pub fn new(id: AssetId, name: impl Into<String>) -> Self {
        Self {
            base: AssetBase::new(id, name),
            ..Default::default()
        }
    }

    /// Record the texture slots as dependencies
    pub fn link_textures(&mut self) {
        for texture in [
            self.base_color_texture.clone(),
            self.normal_texture.clone(),
            self.metallic_roughness_texture.clone(),
        ] {
            self.base.add_dependency(texture);
        }
    }
}

impl Asset for Material {
    crate::impl_asset_common!(Material, "Material");

    fn serialize(&mut self, ar: &mut Archive<'_>) -> AssetResult<()> {
        ar.value(&mut self.base_color_factor)?;
        ar.value(&mut self.emissive_factor)?;
        ar.value(&mut self.metallic_factor)?;
        ar.value(&mut self.roughness_factor)?;
        ar.value(&mut self.base_color_texture)?;
        ar.value(&mut self.normal_texture)?;
        ar.value(&mut self.metallic_roughness_texture)?;
        ar.value(&mut self.uv_transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Texture;

    #[test]
    fn test_link_textures_skips_empty_slots() {
        let mut material = Material::new(AssetId::create::<Material>("m"), "m");
        material.base_color_texture = AssetId::create::<Texture>("albedo");
        material.link_textures();

        assert_eq!(material.base.dependencies().len(), 1);
        assert_eq!(material.metallic_factor, 1.0);
    }
}
