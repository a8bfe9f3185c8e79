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
pub enum ShaderStage {
    Vertex = 0,
    Domain = 1,
    Hull = 2,
    Geometry = 3,
    Pixel = 4,
    Compute = 5,
}

impl BinarySerialization for ShaderStage {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for ShaderStage {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => ShaderStage::Vertex,
            1 => ShaderStage::Domain,
            2 => ShaderStage::Hull,
            3 => ShaderStage::Geometry,
            4 => ShaderStage::Pixel,
            5 => ShaderStage::Compute,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown shader stage {other}"),
                ))
            }
        })
    }
}

/// Category of resource binding a shader reflects, mirroring the SPIR-V
/// storage classes a reflection pass walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResourceKind {
    UniformBuffer = 0,
    Input = 1,
    Output = 2,
    StorageImage = 3,
    SampledImage = 4,
    AtomicCounter = 5,
    PushConstantBuffer = 6,
    SeparateImage = 7,
    SeparateSampler = 8,
}

impl BinarySerialization for ResourceKind {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for ResourceKind {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => ResourceKind::UniformBuffer,
            1 => ResourceKind::Input,
            2 => ResourceKind::Output,
            3 => ResourceKind::StorageImage,
            4 => ResourceKind::SampledImage,
            5 => ResourceKind::AtomicCounter,
            6 => ResourceKind::PushConstantBuffer,
            7 => ResourceKind::SeparateImage,
            8 => ResourceKind::SeparateSampler,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown resource kind {other}"),
                ))
            }
        })
    }
}

/// Concrete scalar/vector/matrix shape of a reflected resource or struct
/// member, enough to tell two stages' bindings apart when checking link
/// compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConcreteType {
    Struct = 0,
    Bool = 1,
    Float = 2,
    Int = 3,
    UInt = 4,
    Double = 5,
    Char = 6,
    Vec2 = 7,
    Vec3 = 8,
    Vec4 = 9,
    Mat3x3 = 10,
    Mat4x3 = 11,
    Mat4x4 = 12,
    Unknown = 13,
}

impl BinarySerialization for ConcreteType {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for ConcreteType {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => ConcreteType::Struct,
            1 => ConcreteType::Bool,
            2 => ConcreteType::Float,
            3 => ConcreteType::Int,
            4 => ConcreteType::UInt,
            5 => ConcreteType::Double,
            6 => ConcreteType::Char,
            7 => ConcreteType::Vec2,
            8 => ConcreteType::Vec3,
            9 => ConcreteType::Vec4,
            10 => ConcreteType::Mat3x3,
            11 => ConcreteType::Mat4x3,
            12 => ConcreteType::Mat4x4,
            13 => ConcreteType::Unknown,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown concrete type {other}"),
                ))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDimension {
    D1,
    D2,
    D3,
    Cube,
}

impl BinarySerialization for ImageDimension {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        let tag: u8 = match self {
            ImageDimension::D1 => 0,
            ImageDimension::D2 => 1,
            ImageDimension::D3 => 2,
            ImageDimension::Cube => 3,
        };
        tag.serialize(w)
    }
}

impl BinaryDeserialization for ImageDimension {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => ImageDimension::D1,
            1 => ImageDimension::D2,
            2 => ImageDimension::D3,
            3 => ImageDimension::Cube,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown image dimension {other}"),
                ))
            }
        })
    }
}

/// A single reflected resource: a binding, an input/output variable, or a
/// struct member nested inside one. Struct members reuse this same shape
/// recursively, following the original reflection walk.
#[derive(Debug, Clone)]
pub struct ShaderResource {
    pub name: String,
    pub kind: ResourceKind,
    pub concrete_type: ConcreteType,
    pub is_array: bool,
    pub array_size: Vec<u32>,
    pub binding: u32,
    pub desc_set: u32,
    pub image_dimension: Option<ImageDimension>,
    pub image_arrayed: bool,
    pub cols: u32,
    pub vec_size: u32,
    pub offset: u32,
    pub size: u32,
    pub members: Vec<ShaderResource>,
}

impl ShaderResource {
    /// Two resources are link-compatible if, sharing a binding point or
    /// name across stages, they agree on everything an ABI cares about.
    /// Shaders that disagree here would read garbage at the shared slot.
    pub fn link_compatible(&self, other: &ShaderResource) -> bool {
        self.binding == other.binding
            && self.desc_set == other.desc_set
            && self.name == other.name
            && self.array_size == other.array_size
            && self.kind == other.kind
            && self.concrete_type == other.concrete_type
            && self.size == other.size
    }
}

impl BinarySerialization for ShaderResource {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.name.serialize(w)?;
        self.kind.serialize(w)?;
        self.concrete_type.serialize(w)?;
        self.is_array.serialize(w)?;
        self.array_size.serialize(w)?;
        self.binding.serialize(w)?;
        self.desc_set.serialize(w)?;
        self.image_dimension.is_some().serialize(w)?;
        if let Some(dim) = &self.image_dimension {
            dim.serialize(w)?;
        }
        self.image_arrayed.serialize(w)?;
        self.cols.serialize(w)?;
        self.vec_size.serialize(w)?;
        self.offset.serialize(w)?;
        self.size.serialize(w)?;
        self.members.serialize(w)
    }
}

impl BinaryDeserialization for ShaderResource {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let name = String::deserialize(r)?;
        let kind = ResourceKind::deserialize(r)?;
        let concrete_type = ConcreteType::deserialize(r)?;
        let is_array = bool::deserialize(r)?;
        let array_size = Vec::deserialize(r)?;
        let binding = u32::deserialize(r)?;
        let desc_set = u32::deserialize(r)?;
        let has_image = bool::deserialize(r)?;
        let image_dimension = if has_image {
            Some(ImageDimension::deserialize(r)?)
        } else {
            None
        };
        let image_arrayed = bool::deserialize(r)?;
        let cols = u32::deserialize(r)?;
        let vec_size = u32::deserialize(r)?;
        let offset = u32::deserialize(r)?;
        let size = u32::deserialize(r)?;
        let members = Vec::deserialize(r)?;
        Ok(ShaderResource {
            name,
            kind,
            concrete_type,
            is_array,
            array_size,
            binding,
            desc_set,
            image_dimension,
            image_arrayed,
            cols,
            vec_size,
            offset,
            size,
            members,
        })
    }
}

/// One real backend a shader's bytecode was compiled for. `hlsl_source` is
/// kept for recompiles and is never loaded by a runtime.
#[derive(Debug, Clone)]
pub enum ShaderBackend {
    Spirv(Vec<u8>),
    Dxbc(Vec<u8>),
    Pssl(Vec<u8>),
}

impl BinarySerialization for ShaderBackend {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        match self {
            ShaderBackend::Spirv(bytes) => {
                0u8.serialize(w)?;
                bytes.serialize(w)
            }
            ShaderBackend::Dxbc(bytes) => {
                1u8.serialize(w)?;
                bytes.serialize(w)
            }
            ShaderBackend::Pssl(bytes) => {
                2u8.serialize(w)?;
                bytes.serialize(w)
            }
        }
    }
}

impl BinaryDeserialization for ShaderBackend {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => ShaderBackend::Spirv(Vec::deserialize(r)?),
            1 => ShaderBackend::Dxbc(Vec::deserialize(r)?),
            2 => ShaderBackend::Pssl(Vec::deserialize(r)?),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown shader backend tag {other}"),
                ))
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct ShaderData {
    pub stage: ShaderStage,
    pub workgroup_size: [u32; 3],
    pub uniform_buffers: Vec<ShaderResource>,
    pub inputs: Vec<ShaderResource>,
    pub outputs: Vec<ShaderResource>,
    pub storage_images: Vec<ShaderResource>,
    pub sampled_images: Vec<ShaderResource>,
    pub atomic_counters: Vec<ShaderResource>,
    pub push_constant_buffers: Vec<ShaderResource>,
    pub separate_images: Vec<ShaderResource>,
    pub separate_samplers: Vec<ShaderResource>,
    pub backends: Vec<ShaderBackend>,
}

impl ShaderData {
    /// All reflected resource lists, in the order the original reflection
    /// walk visits SPIR-V storage classes.
    pub fn resource_lists(&self) -> [&Vec<ShaderResource>; 9] {
        [
            &self.uniform_buffers,
            &self.inputs,
            &self.outputs,
            &self.storage_images,
            &self.sampled_images,
            &self.atomic_counters,
            &self.push_constant_buffers,
            &self.separate_images,
            &self.separate_samplers,
        ]
    }
}

impl BinarySerialization for ShaderData {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.stage.serialize(w)?;
        self.workgroup_size.serialize(w)?;
        self.uniform_buffers.serialize(w)?;
        self.inputs.serialize(w)?;
        self.outputs.serialize(w)?;
        self.storage_images.serialize(w)?;
        self.sampled_images.serialize(w)?;
        self.atomic_counters.serialize(w)?;
        self.push_constant_buffers.serialize(w)?;
        self.separate_images.serialize(w)?;
        self.separate_samplers.serialize(w)?;
        self.backends.serialize(w)
    }
}

impl BinaryDeserialization for ShaderData {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(ShaderData {
            stage: ShaderStage::deserialize(r)?,
            workgroup_size: <[u32; 3]>::deserialize(r)?,
            uniform_buffers: Vec::deserialize(r)?,
            inputs: Vec::deserialize(r)?,
            outputs: Vec::deserialize(r)?,
            storage_images: Vec::deserialize(r)?,
            sampled_images: Vec::deserialize(r)?,
            atomic_counters: Vec::deserialize(r)?,
            push_constant_buffers: Vec::deserialize(r)?,
            separate_images: Vec::deserialize(r)?,
            separate_samplers: Vec::deserialize(r)?,
            backends: Vec::deserialize(r)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ShaderAsset {
    pub name: AssetName,
    pub id: AssetId,
    pub data: ShaderData,
}

impl BinarySerialization for ShaderAsset {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.name.serialize(w)?;
        self.id.serialize(w)?;
        self.data.serialize(w)
    }
}

impl BinaryDeserialization for ShaderAsset {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(ShaderAsset {
            name: AssetName::deserialize(r)?,
            id: AssetId::deserialize(r)?,
            data: ShaderData::deserialize(r)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_resource(name: &str, binding: u32) -> ShaderResource {
        ShaderResource {
            name: name.to_owned(),
            kind: ResourceKind::UniformBuffer,
            concrete_type: ConcreteType::Struct,
            is_array: false,
            array_size: Vec::new(),
            binding,
            desc_set: 0,
            image_dimension: None,
            image_arrayed: false,
            cols: 0,
            vec_size: 0,
            offset: 0,
            size: 64,
            members: Vec::new(),
        }
    }

    #[test]
    fn matching_bindings_are_link_compatible() {
        let a = sample_resource("PerFrame", 0);
        let b = sample_resource("PerFrame", 0);
        assert!(a.link_compatible(&b));
    }

    #[test]
    fn size_mismatch_breaks_link_compatibility() {
        let a = sample_resource("PerFrame", 0);
        let mut b = sample_resource("PerFrame", 0);
        b.size = 128;
        assert!(!a.link_compatible(&b));
    }

    #[test]
    fn resource_roundtrips() {
        let resource = sample_resource("PerFrame", 3);
        let mut buf = Vec::new();
        resource.serialize(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let back = ShaderResource::deserialize(&mut cursor).unwrap();
        assert_eq!(resource.name, back.name);
        assert_eq!(resource.binding, back.binding);
        assert_eq!(resource.size, back.size);
    }
}
