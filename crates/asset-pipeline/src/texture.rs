// Copyright (C) 2023 gigablaster

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Imports PNG/JPG/BMP/TGA via the raster decoder and DDS via the block
//! container reader. Mipmap generation and re-compression are forward
//! declared (`SPEC_FULL.md`) - the pipeline packages exactly one mip, always
//! decoded down to RGBA8.

use std::path::Path;

use ddsfile::{D3DFormat, Dds, DxgiFormat, PixelFormatFlags};
use dess_assets::{AssetId, AssetName, CompressionType, TexelFormat, TextureAsset, TextureData, TextureType};
use image::{DynamicImage, GenericImageView};

use crate::{
    context::BuilderContext,
    error::{Error, Result},
    package_store::{PackageDefaults, PackageStore, ORIGIN_USER},
};

pub const DEFAULT_TEXTURE_NAME: &str = "ps_default_texture";

impl PackageDefaults for TextureAsset {
    fn default_assets() -> Vec<Self> {
        vec![TextureAsset {
            name: AssetName::new(DEFAULT_TEXTURE_NAME).unwrap(),
            id: dess_assets::hash_name(DEFAULT_TEXTURE_NAME),
            data: TextureData {
                width: 1,
                height: 1,
                depth: 1,
                texture_type: TextureType::Tex2D,
                format: TexelFormat::Rgba8,
                compression: CompressionType::None,
                mips: vec![vec![255, 0, 255, 255]],
            },
        }]
    }
}

pub struct TexturePipeline {
    store: PackageStore<TextureAsset>,
}

impl TexturePipeline {
    pub fn new(ctx: &BuilderContext) -> Self {
        let mut store = PackageStore::new(ctx.output_root(), ctx.package_subdir().join("textures"));
        store.initialize().ok();
        Self { store }
    }

    pub fn asset_exists(&self, id: AssetId) -> bool {
        self.store.asset_exists(id)
    }

    pub fn load_asset(&self, id: AssetId) -> Option<TextureAsset> {
        self.store.load_asset(id)
    }

    pub fn refresh_cache(&mut self) {
        self.store.refresh_cache();
    }

    pub fn set_output_location(&mut self, output_root: impl Into<std::path::PathBuf>) -> std::io::Result<()> {
        self.store.set_output_location(output_root)
    }

    /// Decodes the file at `relative` and registers it under `name`.
    pub fn convert(
        &mut self,
        ctx: &BuilderContext,
        relative: &Path,
        name: &str,
    ) -> Result<AssetId> {
        let bytes = ctx
            .filesystem()
            .read_to_end(relative)
            .map_err(|err| Error::InputIo(relative.display().to_string(), err))?;

        let data = if let Ok(dds) = Dds::read(&mut std::io::Cursor::new(&bytes)) {
            decode_dds(&dds).map_err(|err| Error::Decode(relative.display().to_string(), err))?
        } else {
            decode_raster(&bytes).map_err(|err| Error::Decode(relative.display().to_string(), err))?
        };

        let origin = relative.display().to_string();
        self.package(&origin, name, data)
    }

    pub fn clear_output(&mut self) -> std::io::Result<()> {
        self.store.clear()?;
        self.store.initialize()
    }

    /// Registers an already-decoded texture, for callers (the Model
    /// Pipeline's texture-cache prepass) that never see a standalone file on
    /// disk - glTF embeds or externally references its own images.
    pub fn package(&mut self, asset_origin: &str, name: &str, data: TextureData) -> Result<AssetId> {
        self.store
            .save_asset(asset_origin, name, true, |resolved_name, id| TextureAsset {
                name: resolved_name,
                id,
                data,
            })
            .ok_or_else(|| Error::Collision(name.to_owned()))
    }
}

fn decode_raster(bytes: &[u8]) -> std::result::Result<TextureData, String> {
    let image = image::load_from_memory(bytes).map_err(|err| err.to_string())?;
    let (width, height) = image.dimensions();
    // STBI-equivalent loads bottom-origin; `image` decodes top-origin, so flip.
    let flipped = DynamicImage::ImageRgba8(image.to_rgba8()).flipv();
    let rgba = flipped.into_rgba8().into_raw();

    Ok(TextureData {
        width,
        height,
        depth: 1,
        texture_type: TextureType::Tex2D,
        format: TexelFormat::Rgba8,
        compression: CompressionType::None,
        mips: vec![rgba],
    })
}

fn decode_dds(dds: &Dds) -> std::result::Result<TextureData, String> {
    let width = dds.get_width();
    let height = dds.get_height();
    let depth = dds.get_depth().max(1);
    let texture_type = dds_texture_type(dds);

    let raw = dds.get_data(0).map_err(|err| err.to_string())?;

    let rgba = if let Some(block) = dds_block_format(dds) {
        decode_block_compressed(raw, width, height, block)
    } else if let Some(masked) = dds_pixel_masks(dds) {
        decode_masked(raw, width, height, masked)
    } else {
        return Err("unsupported DDS pixel format".to_owned());
    };

    Ok(TextureData {
        width,
        height,
        depth,
        texture_type,
        format: TexelFormat::Rgba8,
        compression: CompressionType::None,
        mips: vec![rgba],
    })
}

fn dds_texture_type(dds: &Dds) -> TextureType {
    if dds.header.caps2.contains(ddsfile::Caps2::CUBEMAP) {
        TextureType::TexCube
    } else if dds.get_depth() > 1 {
        TextureType::Tex3D
    } else if dds.get_num_array_layers() > 1 {
        TextureType::Tex2DArray
    } else {
        TextureType::Tex2D
    }
}

#[derive(Clone, Copy)]
enum BlockFormat {
    Bc1,
    Bc3,
    Bc5,
}

fn dds_block_format(dds: &Dds) -> Option<BlockFormat> {
    if let Some(format) = dds.get_dxgi_format() {
        return match format {
            DxgiFormat::BC1_UNorm | DxgiFormat::BC1_UNorm_sRGB => Some(BlockFormat::Bc1),
            DxgiFormat::BC3_UNorm | DxgiFormat::BC3_UNorm_sRGB => Some(BlockFormat::Bc3),
            DxgiFormat::BC5_UNorm | DxgiFormat::BC5_SNorm => Some(BlockFormat::Bc5),
            _ => None,
        };
    }
    if let Some(format) = dds.get_format() {
        return match format {
            D3DFormat::DXT1 => Some(BlockFormat::Bc1),
            D3DFormat::DXT5 => Some(BlockFormat::Bc3),
            _ => None,
        };
    }
    None
}

struct PixelMasks {
    rgb_bits: u32,
    r_mask: u32,
    g_mask: u32,
    b_mask: u32,
    a_mask: u32,
    has_alpha: bool,
}

fn dds_pixel_masks(dds: &Dds) -> Option<PixelMasks> {
    let format = dds.header.spf.clone();
    if !format.flags.contains(PixelFormatFlags::RGB) {
        return None;
    }
    Some(PixelMasks {
        rgb_bits: format.rgb_bit_count.unwrap_or(32),
        r_mask: format.r_bit_mask.unwrap_or(0),
        g_mask: format.g_bit_mask.unwrap_or(0),
        b_mask: format.b_bit_mask.unwrap_or(0),
        a_mask: format.a_bit_mask.unwrap_or(0),
        has_alpha: format.flags.contains(PixelFormatFlags::ALPHA_PIXELS),
    })
}

fn channel_from_mask(pixel: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let width = (32 - mask.leading_zeros()) - shift;
    let value = (pixel & mask) >> shift;
    if width >= 8 {
        (value >> (width - 8)) as u8
    } else {
        ((value << (8 - width)) | (value >> (2 * width - 8).min(width))) as u8
    }
}

fn decode_masked(raw: &[u8], width: u32, height: u32, masks: PixelMasks) -> Vec<u8> {
    let bytes_per_pixel = (masks.rgb_bits / 8).max(1) as usize;
    let mut out = vec![0u8; (width * height * 4) as usize];
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * bytes_per_pixel;
            if offset + bytes_per_pixel > raw.len() {
                continue;
            }
            let mut pixel = 0u32;
            for (i, byte) in raw[offset..offset + bytes_per_pixel].iter().enumerate() {
                pixel |= (*byte as u32) << (8 * i);
            }
            let r = channel_from_mask(pixel, masks.r_mask);
            let g = channel_from_mask(pixel, masks.g_mask);
            let b = channel_from_mask(pixel, masks.b_mask);
            let a = if masks.has_alpha {
                channel_from_mask(pixel, masks.a_mask)
            } else {
                255
            };
            let out_offset = (y * width as usize + x) * 4;
            out[out_offset..out_offset + 4].copy_from_slice(&[r, g, b, a]);
        }
    }
    out
}

/// Decodes BC1/BC3/BC5 4x4 blocks into a tightly-packed RGBA8 buffer.
/// Partial edge blocks (width/height not a multiple of 4) are cropped.
fn decode_block_compressed(raw: &[u8], width: u32, height: u32, format: BlockFormat) -> Vec<u8> {
    let blocks_x = (width as usize + 3) / 4;
    let blocks_y = (height as usize + 3) / 4;
    let block_bytes = match format {
        BlockFormat::Bc1 => 8,
        BlockFormat::Bc3 | BlockFormat::Bc5 => 16,
    };
    let mut out = vec![0u8; width as usize * height as usize * 4];

    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let index = by * blocks_x + bx;
            let offset = index * block_bytes;
            if offset + block_bytes > raw.len() {
                continue;
            }
            let block = &raw[offset..offset + block_bytes];
            let texels = match format {
                BlockFormat::Bc1 => decode_bc1_block(block),
                BlockFormat::Bc3 => decode_bc3_block(block),
                BlockFormat::Bc5 => decode_bc5_block(block),
            };
            for row in 0..4 {
                let py = by * 4 + row;
                if py >= height as usize {
                    continue;
                }
                for col in 0..4 {
                    let px = bx * 4 + col;
                    if px >= width as usize {
                        continue;
                    }
                    let src = (row * 4 + col) * 4;
                    let dst = (py * width as usize + px) * 4;
                    out[dst..dst + 4].copy_from_slice(&texels[src..src + 4]);
                }
            }
        }
    }
    out
}

fn rgb565_to_rgb888(value: u16) -> (u8, u8, u8) {
    let r5 = ((value >> 11) & 0x1f) as u32;
    let g6 = ((value >> 5) & 0x3f) as u32;
    let b5 = (value & 0x1f) as u32;
    let r = ((r5 * 527 + 23) >> 6) as u8;
    let g = ((g6 * 259 + 33) >> 6) as u8;
    let b = ((b5 * 527 + 23) >> 6) as u8;
    (r, g, b)
}

fn decode_bc1_block(block: &[u8]) -> [u8; 64] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let (r0, g0, b0) = rgb565_to_rgb888(c0);
    let (r1, g1, b1) = rgb565_to_rgb888(c1);

    let mut palette = [[0u8; 4]; 4];
    palette[0] = [r0, g0, b0, 255];
    palette[1] = [r1, g1, b1, 255];
    if c0 > c1 {
        palette[2] = [
            ((2 * r0 as u16 + r1 as u16) / 3) as u8,
            ((2 * g0 as u16 + g1 as u16) / 3) as u8,
            ((2 * b0 as u16 + b1 as u16) / 3) as u8,
            255,
        ];
        palette[3] = [
            ((r0 as u16 + 2 * r1 as u16) / 3) as u8,
            ((g0 as u16 + 2 * g1 as u16) / 3) as u8,
            ((b0 as u16 + 2 * b1 as u16) / 3) as u8,
            255,
        ];
    } else {
        palette[2] = [
            ((r0 as u16 + r1 as u16) / 2) as u8,
            ((g0 as u16 + g1 as u16) / 2) as u8,
            ((b0 as u16 + b1 as u16) / 2) as u8,
            255,
        ];
        palette[3] = [0, 0, 0, 0];
    }

    let mut out = [0u8; 64];
    for texel in 0..16 {
        let code = (indices >> (texel * 2)) & 0x3;
        out[texel * 4..texel * 4 + 4].copy_from_slice(&palette[code as usize]);
    }
    out
}

fn decode_bc3_block(block: &[u8]) -> [u8; 64] {
    let alpha = decode_bc_alpha_channel(&block[0..8]);
    let rgb_block = decode_bc1_rgb_only(&block[8..16]);

    let mut out = [0u8; 64];
    for texel in 0..16 {
        out[texel * 4] = rgb_block[texel * 3];
        out[texel * 4 + 1] = rgb_block[texel * 3 + 1];
        out[texel * 4 + 2] = rgb_block[texel * 3 + 2];
        out[texel * 4 + 3] = alpha[texel];
    }
    out
}

fn decode_bc1_rgb_only(block: &[u8]) -> [u8; 48] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let (r0, g0, b0) = rgb565_to_rgb888(c0);
    let (r1, g1, b1) = rgb565_to_rgb888(c1);

    // BC3's RGB block always interpolates as the 4-color case, regardless of c0 vs c1.
    let palette = [
        [r0, g0, b0],
        [r1, g1, b1],
        [
            ((2 * r0 as u16 + r1 as u16) / 3) as u8,
            ((2 * g0 as u16 + g1 as u16) / 3) as u8,
            ((2 * b0 as u16 + b1 as u16) / 3) as u8,
        ],
        [
            ((r0 as u16 + 2 * r1 as u16) / 3) as u8,
            ((g0 as u16 + 2 * g1 as u16) / 3) as u8,
            ((b0 as u16 + 2 * b1 as u16) / 3) as u8,
        ],
    ];

    let mut out = [0u8; 48];
    for texel in 0..16 {
        let code = (indices >> (texel * 2)) & 0x3;
        out[texel * 3..texel * 3 + 3].copy_from_slice(&palette[code as usize]);
    }
    out
}

/// Shared by BC3's alpha channel and each of BC5's two channels: 8 bytes,
/// 2 endpoint values followed by a 48-bit, 3-bit-per-texel index stream.
fn decode_bc_alpha_channel(block: &[u8]) -> [u8; 16] {
    let a0 = block[0];
    let a1 = block[1];
    let mut palette = [0u8; 8];
    palette[0] = a0;
    palette[1] = a1;
    if a0 > a1 {
        for i in 1..7 {
            palette[1 + i] = (((7 - i) as u16 * a0 as u16 + i as u16 * a1 as u16) / 7) as u8;
        }
    } else {
        for i in 1..5 {
            palette[1 + i] = (((5 - i) as u16 * a0 as u16 + i as u16 * a1 as u16) / 5) as u8;
        }
        palette[6] = 0;
        palette[7] = 255;
    }

    let mut indices: u64 = 0;
    for (i, byte) in block[2..8].iter().enumerate() {
        indices |= (*byte as u64) << (8 * i);
    }

    let mut out = [0u8; 16];
    for (texel, slot) in out.iter_mut().enumerate() {
        let code = (indices >> (texel * 3)) & 0x7;
        *slot = palette[code as usize];
    }
    out
}

fn decode_bc5_block(block: &[u8]) -> [u8; 64] {
    let red = decode_bc_alpha_channel(&block[0..8]);
    let green = decode_bc_alpha_channel(&block[8..16]);

    let mut out = [0u8; 64];
    for texel in 0..16 {
        out[texel * 4] = red[texel];
        out[texel * 4 + 1] = green[texel];
        out[texel * 4 + 2] = 0;
        out[texel * 4 + 3] = 255;
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bc1_opaque_block_decodes_to_single_color() {
        // c0 == c1 encodes a flat-color block with no alpha punch-through.
        let block = [0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00];
        let texels = decode_bc1_block(&block);
        assert_eq!(&texels[0..4], &[255, 255, 255, 255]);
        assert_eq!(&texels[60..64], &[255, 255, 255, 255]);
    }

    #[test]
    fn bc_alpha_channel_endpoints_survive_flat_block() {
        let block = [200, 200, 0, 0, 0, 0, 0, 0];
        let out = decode_bc_alpha_channel(&block);
        assert!(out.iter().all(|&v| v == 200));
    }

    #[test]
    fn rgb565_roundtrips_pure_channels() {
        let (r, g, b) = rgb565_to_rgb888(0b11111_000000_00000);
        assert_eq!((r, g, b), (255, 0, 0));
    }
}
