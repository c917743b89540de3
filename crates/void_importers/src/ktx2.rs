//! KTX2 importer
//!
//! Reads the fixed header and the level index directly; the payload is kept
//! as-is (already GPU ready). Supercompressed files are rejected.

use serde::{Deserialize, Serialize};
use void_asset::{
    AssetError, AssetId, AssetResult, FormatImporter, ImportContext, Texture, TextureExtension,
    TextureFormat,
};

use crate::error::DecodeError;

/// KTX2 file identifier
pub const KTX2_IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

/// Identifier + header + index
const HEADER_SIZE: usize = 80;
const LEVEL_ENTRY_SIZE: usize = 24;

/// Parsed header fields this importer cares about
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ktx2Header {
    pub vk_format: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub layers: u32,
    pub faces: u32,
    pub levels: u32,
    pub supercompression: u32,
}

/// Map a Vulkan format code to a texture format
pub fn texture_format(vk_format: u32) -> Option<TextureFormat> {
    Some(match vk_format {
        37 => TextureFormat::Rgba8Unorm,
        43 => TextureFormat::Rgba8Srgb,
        133 => TextureFormat::Bc1RgbaUnorm,
        134 => TextureFormat::Bc1RgbaSrgb,
        137 => TextureFormat::Bc3Unorm,
        138 => TextureFormat::Bc3Srgb,
        141 => TextureFormat::Bc5Unorm,
        145 => TextureFormat::Bc7Unorm,
        146 => TextureFormat::Bc7Srgb,
        _ => return None,
    })
}

struct Reader<'a> {
    data: &'a [u8],
}

impl Reader<'_> {
    fn bytes(&self, offset: usize, len: usize) -> Result<&[u8], DecodeError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(DecodeError::Truncated {
                needed: offset.saturating_add(len),
                available: self.data.len(),
            })
    }

    fn u32(&self, offset: usize) -> Result<u32, DecodeError> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.bytes(offset, 4)?);
        Ok(u32::from_le_bytes(b))
    }

    fn u64(&self, offset: usize) -> Result<u64, DecodeError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.bytes(offset, 8)?);
        Ok(u64::from_le_bytes(b))
    }
}

pub fn parse_header(data: &[u8]) -> Result<Ktx2Header, DecodeError> {
    let r = Reader { data };
    r.bytes(0, HEADER_SIZE)?;
    Ok(Ktx2Header {
        vk_format: r.u32(12)?,
        width: r.u32(20)?,
        height: r.u32(24)?,
        depth: r.u32(28)?,
        layers: r.u32(32)?,
        faces: r.u32(36)?,
        levels: r.u32(40)?,
        supercompression: r.u32(44)?,
    })
}

/// Decoded texture payload: base level first, one offset per level
#[derive(Debug)]
pub struct Ktx2Image {
    pub header: Ktx2Header,
    pub format: TextureFormat,
    pub pixels: Vec<u8>,
    pub mip_offsets: Vec<usize>,
}

pub fn decode(data: &[u8]) -> Result<Ktx2Image, DecodeError> {
    let header = parse_header(data)?;

    if header.supercompression != 0 {
        return Err(DecodeError::Supercompressed(header.supercompression));
    }
    let format = texture_format(header.vk_format).ok_or(DecodeError::UnsupportedFormat(header.vk_format))?;
    if header.faces > 1 || header.layers > 1 {
        return Err(DecodeError::UnsupportedLayout(format!(
            "{} faces, {} layers",
            header.faces, header.layers
        )));
    }
    if header.width == 0 {
        return Err(DecodeError::UnsupportedLayout("zero width".into()));
    }

    let r = Reader { data };
    let levels = header.levels.max(1) as usize;
    // The level index must fit before anything is sized from it
    let index_end = levels
        .checked_mul(LEVEL_ENTRY_SIZE)
        .and_then(|len| len.checked_add(HEADER_SIZE))
        .unwrap_or(usize::MAX);
    r.bytes(0, index_end)?;

    let mut pixels = Vec::new();
    let mut mip_offsets = Vec::with_capacity(levels);
    for level in 0..levels {
        let entry = HEADER_SIZE + level * LEVEL_ENTRY_SIZE;
        let offset = usize::try_from(r.u64(entry)?).unwrap_or(usize::MAX);
        let length = usize::try_from(r.u64(entry + 8)?).unwrap_or(usize::MAX);

        mip_offsets.push(pixels.len());
        pixels.extend_from_slice(r.bytes(offset, length)?);
    }

    Ok(Ktx2Image {
        header,
        format,
        pixels,
        mip_offsets,
    })
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ktx2Settings {
    /// Keep only the base level
    pub strip_mips: bool,
}

/// Imports KTX2 containers without transcoding
#[derive(Debug, Default)]
pub struct Ktx2Importer;

impl FormatImporter for Ktx2Importer {
    type Settings = Ktx2Settings;
    const NAME: &'static str = "ktx2";

    fn can_import(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(&KTX2_IDENTIFIER)
    }

    fn import(&self, ctx: &mut ImportContext<'_>, bytes: &[u8], settings: &Ktx2Settings) -> AssetResult<AssetId> {
        let mut image = decode(bytes).map_err(|e| AssetError::import(Self::NAME, e))?;

        if settings.strip_mips && image.mip_offsets.len() > 1 {
            let end = image.mip_offsets[1];
            image.pixels.truncate(end);
            image.mip_offsets.truncate(1);
        }

        let mut texture = Texture::new(ctx.sub_asset_id::<Texture>("texture"), ctx.resource_name());
        texture.format = image.format;
        texture.extension = TextureExtension::Ktx2;
        texture.width = image.header.width as i32;
        texture.height = image.header.height.max(1) as i32;
        texture.depth = image.header.depth.max(1) as i32;
        texture.set_pixels(image.pixels, image.mip_offsets);

        log::debug!(
            "KTX2 {}x{} {:?}, {} levels",
            texture.width,
            texture.height,
            texture.format,
            texture.levels
        );
        Ok(ctx.add_asset(texture))
    }
}

/// Build a minimal uncompressed KTX2 file, levels given base first
#[cfg(test)]
pub(crate) fn build_ktx2(vk_format: u32, width: u32, height: u32, levels: &[Vec<u8>]) -> Vec<u8> {
    let mut out = KTX2_IDENTIFIER.to_vec();
    for value in [vk_format, 1, width, height, 0, 0, 1, levels.len() as u32, 0] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    // dfd / kvd / sgd ranges, all empty
    out.extend_from_slice(&[0u8; 32]);

    let data_start = HEADER_SIZE + levels.len() * LEVEL_ENTRY_SIZE;
    // Level data is stored smallest first
    let mut offsets = vec![0usize; levels.len()];
    let mut cursor = data_start;
    for (i, level) in levels.iter().enumerate().rev() {
        offsets[i] = cursor;
        cursor += level.len();
    }
    for (i, level) in levels.iter().enumerate() {
        out.extend_from_slice(&(offsets[i] as u64).to_le_bytes());
        out.extend_from_slice(&(level.len() as u64).to_le_bytes());
        out.extend_from_slice(&(level.len() as u64).to_le_bytes());
    }
    for level in levels.iter().rev() {
        out.extend_from_slice(level);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_levels_base_first() {
        let base = vec![1u8; 16];
        let small = vec![2u8; 4];
        let file = build_ktx2(43, 2, 2, &[base.clone(), small.clone()]);

        let image = decode(&file).unwrap();
        assert_eq!(image.format, TextureFormat::Rgba8Srgb);
        assert_eq!(image.mip_offsets, vec![0, 16]);
        assert_eq!(&image.pixels[..16], &base[..]);
        assert_eq!(&image.pixels[16..], &small[..]);
    }

    #[test]
    fn test_format_mapping() {
        assert_eq!(texture_format(145), Some(TextureFormat::Bc7Unorm));
        assert_eq!(texture_format(134), Some(TextureFormat::Bc1RgbaSrgb));
        assert_eq!(texture_format(1), None);

        let file = build_ktx2(1, 1, 1, &[vec![0u8; 4]]);
        assert!(matches!(decode(&file), Err(DecodeError::UnsupportedFormat(1))));
    }

    #[test]
    fn test_truncated() {
        let file = build_ktx2(37, 1, 1, &[vec![0u8; 4]]);
        let err = decode(&file[..file.len() - 2]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
        assert!(matches!(decode(&KTX2_IDENTIFIER), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_huge_level_count_is_truncated() {
        let mut file = build_ktx2(37, 1, 1, &[vec![0u8; 4]]);
        file[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&file), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_supercompressed_rejected() {
        let mut file = build_ktx2(37, 1, 1, &[vec![0u8; 4]]);
        file[44..48].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(decode(&file), Err(DecodeError::Supercompressed(2))));
    }
}
