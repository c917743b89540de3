//! Texture asset: pixel payload plus the layout needed to upload it

use serde::{Deserialize, Serialize};
use void_core::Hash128;

use crate::archive::Archive;
use crate::asset::{Asset, AssetBase};
use crate::error::AssetResult;
use crate::id::{AssetId, AssetType, TypeTag};

/// Pixel format of the payload
#[repr(u16)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    #[default]
    Unknown = 0,
    Rgba8Unorm = 1,
    Rgba8Srgb = 2,
    Bc1RgbaUnorm = 3,
    Bc1RgbaSrgb = 4,
    Bc3Unorm = 5,
    Bc3Srgb = 6,
    Bc5Unorm = 7,
    Bc7Unorm = 8,
    Bc7Srgb = 9,
}

impl TextureFormat {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::Rgba8Unorm,
            2 => Self::Rgba8Srgb,
            3 => Self::Bc1RgbaUnorm,
            4 => Self::Bc1RgbaSrgb,
            5 => Self::Bc3Unorm,
            6 => Self::Bc3Srgb,
            7 => Self::Bc5Unorm,
            8 => Self::Bc7Unorm,
            9 => Self::Bc7Srgb,
            _ => Self::Unknown,
        }
    }

    /// Check if the format uses 4x4 block compression
    pub fn is_block_compressed(self) -> bool {
        !matches!(self, Self::Unknown | Self::Rgba8Unorm | Self::Rgba8Srgb)
    }
}

/// Container the pixels were imported from
#[repr(u16)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureExtension {
    #[default]
    Raw = 0,
    Png = 1,
    Ktx2 = 2,
}

impl TextureExtension {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::Png,
            2 => Self::Ktx2,
            _ => Self::Raw,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub base: AssetBase,
    pub format: TextureFormat,
    pub extension: TextureExtension,
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    pub levels: i32,
    /// Byte offset of each mip level inside `pixels`
    pub mip_offsets: Vec<usize>,
    pub pixels_hash: Hash128,
    pub pixels: Vec<u8>,
}

impl AssetType for Texture {
    const TYPE_TAG: TypeTag = TypeTag::new(*b"TXTR");
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            base: AssetBase::default(),
            format: TextureFormat::Unknown,
            extension: TextureExtension::Raw,
            width: 0,
            height: 0,
            depth: 1,
            levels: 1,
            mip_offsets: vec![0],
            pixels_hash: Hash128::default(),
            pixels: Vec::new(),
        }
    }
}

impl Texture {
    pub fn new(id: AssetId, name: impl Into<String>) -> Self {
        Self {
            base: AssetBase::new(id, name),
            ..Default::default()
        }
    }

    /// Replace the pixel payload and refresh its hash
    pub fn set_pixels(&mut self, pixels: Vec<u8>, mip_offsets: Vec<usize>) {
        self.pixels_hash = Hash128::of_bytes(&pixels);
        self.levels = mip_offsets.len().max(1) as i32;
        self.mip_offsets = mip_offsets;
        self.pixels = pixels;
    }

    /// Bytes of one mip level
    pub fn level(&self, level: usize) -> Option<&[u8]> {
        let start = *self.mip_offsets.get(level)?;
        let end = self
            .mip_offsets
            .get(level + 1)
            .copied()
            .unwrap_or(self.pixels.len());
        self.pixels.get(start..end)
    }
}

impl Asset for Texture {
    crate::impl_asset_common!(Texture, "Texture");

    fn serialize(&mut self, ar: &mut Archive<'_>) -> AssetResult<()> {
        let mut format = self.format as u16;
        let mut extension = self.extension as u16;
        ar.value(&mut format)?;
        ar.value(&mut extension)?;
        self.format = TextureFormat::from_u16(format);
        self.extension = TextureExtension::from_u16(extension);

        ar.value(&mut self.width)?;
        ar.value(&mut self.height)?;
        ar.value(&mut self.depth)?;
        ar.value(&mut self.levels)?;

        let mut offsets: Vec<u64> = self.mip_offsets.iter().map(|&o| o as u64).collect();
        ar.value(&mut offsets)?;
        self.mip_offsets = offsets.into_iter().map(|o| o as usize).collect();

        ar.value(&mut self.pixels_hash)?;
        let mut size = self.pixels.len() as u64;
        ar.value(&mut size)?;
        ar.raw(&mut self.pixels, size as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_follow_offsets() {
        let mut texture = Texture::new(AssetId::create::<Texture>("t"), "t");
        texture.set_pixels(vec![0u8; 16 + 4], vec![0, 16]);

        assert_eq!(texture.levels, 2);
        assert_eq!(texture.level(0).map(<[u8]>::len), Some(16));
        assert_eq!(texture.level(1).map(<[u8]>::len), Some(4));
        assert!(texture.level(2).is_none());
        assert_eq!(texture.pixels_hash, Hash128::of_bytes(&[0u8; 20]));
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(TextureFormat::from_u16(TextureFormat::Bc7Srgb as u16), TextureFormat::Bc7Srgb);
        assert_eq!(TextureFormat::from_u16(999), TextureFormat::Unknown);
        assert!(TextureFormat::Bc1RgbaUnorm.is_block_compressed());
        assert!(!TextureFormat::Rgba8Srgb.is_block_compressed());
    }
}
