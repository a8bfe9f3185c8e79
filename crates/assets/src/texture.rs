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

use std::io::{self, Read, Write};

use dess_common::{BinaryDeserialization, BinarySerialization};

use crate::id::{AssetId, AssetName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TexelFormat {
    Rgba8 = 0,
    Rgba16F = 1,
    Rgba32F = 2,
    R32F = 3,
}

impl BinarySerialization for TexelFormat {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for TexelFormat {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => TexelFormat::Rgba8,
            1 => TexelFormat::Rgba16F,
            2 => TexelFormat::Rgba32F,
            3 => TexelFormat::R32F,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown texel format {other}"),
                ))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TextureType {
    Tex2D = 0,
    TexCube = 1,
    Tex3D = 2,
    Tex2DArray = 3,
}

impl BinarySerialization for TextureType {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for TextureType {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => TextureType::Tex2D,
            1 => TextureType::TexCube,
            2 => TextureType::Tex3D,
            3 => TextureType::Tex2DArray,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown texture type {other}"),
                ))
            }
        })
    }
}

/// Block-compression format a texture's mip chain is stored in. `Bc5`
/// intentionally shares `Bc4`'s discriminant - the on-disk format distinguishes
/// them by channel count read from the surrounding `TextureData`, not by this
/// tag, and changing that now would break every package already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    Bc1 = 1,
    Bc2 = 2,
    Bc3 = 3,
    Bc4 = 4,
    Bc5 = 4,
    Bc6 = 5,
    Bc7 = 6,
    Bc3Rgbm = 7,
}

impl BinarySerialization for CompressionType {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for CompressionType {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => CompressionType::None,
            1 => CompressionType::Bc1,
            2 => CompressionType::Bc2,
            3 => CompressionType::Bc3,
            4 => CompressionType::Bc4,
            5 => CompressionType::Bc6,
            6 => CompressionType::Bc7,
            7 => CompressionType::Bc3Rgbm,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown compression type {other}"),
                ))
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub texture_type: TextureType,
    pub format: TexelFormat,
    pub compression: CompressionType,
    /// Mip chain, largest first. A freshly-imported texture that has not
    /// gone through mip generation yet holds a single entry.
    pub mips: Vec<Vec<u8>>,
}

impl TextureData {
    /// Number of mips currently present. The pipeline emits exactly one
    /// until mip generation (still forward-declared, see `SPEC_FULL.md`) is
    /// implemented.
    pub fn mip_count(&self) -> u32 {
        self.mips.len() as u32
    }
}

impl BinarySerialization for TextureData {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.width.serialize(w)?;
        self.height.serialize(w)?;
        self.depth.serialize(w)?;
        self.texture_type.serialize(w)?;
        self.format.serialize(w)?;
        self.compression.serialize(w)?;
        self.mips.serialize(w)
    }
}

impl BinaryDeserialization for TextureData {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(TextureData {
            width: u32::deserialize(r)?,
            height: u32::deserialize(r)?,
            depth: u32::deserialize(r)?,
            texture_type: TextureType::deserialize(r)?,
            format: TexelFormat::deserialize(r)?,
            compression: CompressionType::deserialize(r)?,
            mips: Vec::deserialize(r)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TextureAsset {
    pub name: AssetName,
    pub id: AssetId,
    pub data: TextureData,
}

impl BinarySerialization for TextureAsset {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.name.serialize(w)?;
        self.id.serialize(w)?;
        self.data.serialize(w)
    }
}

impl BinaryDeserialization for TextureAsset {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(TextureAsset {
            name: AssetName::deserialize(r)?,
            id: AssetId::deserialize(r)?,
            data: TextureData::deserialize(r)?,
        })
    }
}
