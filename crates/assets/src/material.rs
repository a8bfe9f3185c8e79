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
pub enum FilterMode {
    Point = 0,
    Linear = 1,
    Anisotropic = 2,
}

impl BinarySerialization for FilterMode {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for FilterMode {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => FilterMode::Point,
            1 => FilterMode::Linear,
            2 => FilterMode::Anisotropic,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown filter mode {other}"),
                ))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AddressMode {
    Wrap = 0,
    Clamp = 1,
    Mirror = 2,
    Border = 3,
}

impl BinarySerialization for AddressMode {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for AddressMode {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => AddressMode::Wrap,
            1 => AddressMode::Clamp,
            2 => AddressMode::Mirror,
            3 => AddressMode::Border,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown address mode {other}"),
                ))
            }
        })
    }
}

/// Whole-pipeline blend state. `Additive` and `Default` are both non-opaque;
/// the distinction matters to the renderer's sort order, not to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlendFunction {
    None = 0,
    Default = 1,
    Additive = 2,
}

impl BinarySerialization for BlendFunction {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for BlendFunction {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => BlendFunction::None,
            1 => BlendFunction::Default,
            2 => BlendFunction::Additive,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown blend function {other}"),
                ))
            }
        })
    }
}

/// Kept around for call sites and tests that only care about a binary
/// opaque/blended split; `MaterialData::blend_function` is what's persisted.
pub type BlendMode = BlendFunction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerData {
    pub filter: FilterMode,
    /// Clamped to `[1, 16]` by the material pipeline before it reaches here.
    pub max_anisotropy: u8,
    pub address: AddressMode,
}

impl BinarySerialization for SamplerData {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.filter.serialize(w)?;
        self.max_anisotropy.serialize(w)?;
        self.address.serialize(w)
    }
}

impl BinaryDeserialization for SamplerData {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(SamplerData {
            filter: FilterMode::deserialize(r)?,
            max_anisotropy: u8::deserialize(r)?,
            address: AddressMode::deserialize(r)?,
        })
    }
}

/// Raw bytes for one reflected uniform buffer, sized to that buffer's
/// declared layout. Order matches the material's shaders' combined
/// `uniform_buffers` resource list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformBufferData(pub Vec<u8>);

impl BinarySerialization for UniformBufferData {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.0.serialize(w)
    }
}

impl BinaryDeserialization for UniformBufferData {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(UniformBufferData(Vec::deserialize(r)?))
    }
}

/// A material binds up to three compiled shader stages to the uniform bytes,
/// textures and samplers their combined reflection expects. The material
/// pipeline is what checks the stages agree on layout; this type just stores
/// the result.
#[derive(Debug, Clone)]
pub struct MaterialData {
    pub vertex_shader: AssetId,
    /// 0 means absent, matching the source format's sentinel for an optional
    /// geometry stage.
    pub geometry_shader: AssetId,
    pub pixel_shader: AssetId,
    pub uniform_buffers: Vec<UniformBufferData>,
    pub separate_images: Vec<AssetId>,
    pub separate_samplers: Vec<SamplerData>,
    pub wireframe: bool,
    pub backface_culling: bool,
    pub blend_function: BlendFunction,
}

impl BinarySerialization for MaterialData {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.vertex_shader.serialize(w)?;
        self.geometry_shader.serialize(w)?;
        self.pixel_shader.serialize(w)?;
        self.uniform_buffers.serialize(w)?;
        self.separate_images.serialize(w)?;
        self.separate_samplers.serialize(w)?;
        self.wireframe.serialize(w)?;
        self.backface_culling.serialize(w)?;
        self.blend_function.serialize(w)
    }
}

impl BinaryDeserialization for MaterialData {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(MaterialData {
            vertex_shader: AssetId::deserialize(r)?,
            geometry_shader: AssetId::deserialize(r)?,
            pixel_shader: AssetId::deserialize(r)?,
            uniform_buffers: Vec::deserialize(r)?,
            separate_images: Vec::deserialize(r)?,
            separate_samplers: Vec::deserialize(r)?,
            wireframe: bool::deserialize(r)?,
            backface_culling: bool::deserialize(r)?,
            blend_function: BlendFunction::deserialize(r)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MaterialAsset {
    pub name: AssetName,
    pub id: AssetId,
    pub data: MaterialData,
}

impl BinarySerialization for MaterialAsset {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.name.serialize(w)?;
        self.id.serialize(w)?;
        self.data.serialize(w)
    }
}

impl BinaryDeserialization for MaterialAsset {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(MaterialAsset {
            name: AssetName::deserialize(r)?,
            id: AssetId::deserialize(r)?,
            data: MaterialData::deserialize(r)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn material_roundtrips() {
        let material = MaterialAsset {
            name: AssetName::new("wood_mat").unwrap(),
            id: 11,
            data: MaterialData {
                vertex_shader: 1,
                geometry_shader: 0,
                pixel_shader: 2,
                uniform_buffers: vec![UniformBufferData(vec![0u8; 64])],
                separate_images: vec![5, 6],
                separate_samplers: vec![SamplerData {
                    filter: FilterMode::Anisotropic,
                    max_anisotropy: 16,
                    address: AddressMode::Wrap,
                }],
                wireframe: false,
                backface_culling: true,
                blend_function: BlendFunction::Default,
            },
        };
        let mut buf = Vec::new();
        material.serialize(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let back = MaterialAsset::deserialize(&mut cursor).unwrap();
        assert_eq!(material.data.pixel_shader, back.data.pixel_shader);
        assert_eq!(material.data.separate_images, back.data.separate_images);
        assert_eq!(
            material.data.uniform_buffers[0].0.len(),
            back.data.uniform_buffers[0].0.len()
        );
    }
}
