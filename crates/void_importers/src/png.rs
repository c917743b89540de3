//! PNG importer

use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use void_asset::{
    AssetError, AssetId, AssetResult, FormatImporter, ImportContext, Texture, TextureExtension,
    TextureFormat,
};

use crate::error::DecodeError;

/// PNG file signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PngSettings {
    /// Interpret color as sRGB
    pub srgb: bool,
    /// Store a full mip chain
    pub generate_mips: bool,
}

impl Default for PngSettings {
    fn default() -> Self {
        Self {
            srgb: true,
            generate_mips: false,
        }
    }
}

/// Decodes PNG images into RGBA8 textures
#[derive(Debug, Default)]
pub struct PngImporter;

impl PngImporter {
    fn decode(bytes: &[u8], settings: &PngSettings) -> Result<(u32, u32, Vec<u8>, Vec<usize>), DecodeError> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
        let (width, height) = img.dimensions();

        let mut pixels = img.to_rgba8().into_raw();
        let mut offsets = vec![0];
        if settings.generate_mips {
            for level in generate_mip_chain(&img) {
                offsets.push(pixels.len());
                pixels.extend_from_slice(&level);
            }
        }
        Ok((width, height, pixels, offsets))
    }
}

/// Successively halved RGBA8 levels, excluding the base level
pub fn generate_mip_chain(img: &DynamicImage) -> Vec<Vec<u8>> {
    let mut mips = Vec::new();
    let (mut w, mut h) = img.dimensions();
    let mut current = img.clone();

    while w > 1 || h > 1 {
        w = (w / 2).max(1);
        h = (h / 2).max(1);

        current = current.resize_exact(w, h, image::imageops::FilterType::Lanczos3);
        mips.push(current.to_rgba8().into_raw());
    }

    mips
}

impl FormatImporter for PngImporter {
    type Settings = PngSettings;
    const NAME: &'static str = "png";

    fn can_import(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(&PNG_SIGNATURE)
    }

    fn import(&self, ctx: &mut ImportContext<'_>, bytes: &[u8], settings: &PngSettings) -> AssetResult<AssetId> {
        let (width, height, pixels, offsets) =
            Self::decode(bytes, settings).map_err(|e| AssetError::import(Self::NAME, e))?;

        let mut texture = Texture::new(ctx.sub_asset_id::<Texture>("texture"), ctx.resource_name());
        texture.format = if settings.srgb {
            TextureFormat::Rgba8Srgb
        } else {
            TextureFormat::Rgba8Unorm
        };
        texture.extension = TextureExtension::Png;
        texture.width = width as i32;
        texture.height = height as i32;
        texture.set_pixels(pixels, offsets);

        log::debug!("PNG {}x{}, {} levels", width, height, texture.levels);
        Ok(ctx.add_asset(texture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_signature() {
        let importer = PngImporter;
        assert!(FormatImporter::can_import(&importer, &encode_png(2, 2)));
        assert!(!FormatImporter::can_import(&importer, b"\x89PN"));
        assert!(!FormatImporter::can_import(&importer, &[0u8; 16]));
    }

    #[test]
    fn test_decode_with_mips() {
        let settings = PngSettings {
            srgb: false,
            generate_mips: true,
        };
        let (w, h, pixels, offsets) = PngImporter::decode(&encode_png(4, 2), &settings).unwrap();
        assert_eq!((w, h), (4, 2));
        // 4x2, 2x1, 1x1
        assert_eq!(offsets, vec![0, 32, 40]);
        assert_eq!(pixels.len(), 44);
    }

    #[test]
    fn test_corrupt_png() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        assert!(PngImporter::decode(&bytes, &PngSettings::default()).is_err());
    }
}
