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

use bitflags::bitflags;
use dess_common::{Aabb, BinaryDeserialization, BinarySerialization, Sphere};
use glam::{Vec2, Vec3};

use crate::id::{AssetId, AssetName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrimitiveType {
    Points = 0,
    Lines = 1,
    Triangles = 2,
    TriangleStrip = 3,
}

impl BinarySerialization for PrimitiveType {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        (*self as u8).serialize(w)
    }
}

impl BinaryDeserialization for PrimitiveType {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(match u8::deserialize(r)? {
            0 => PrimitiveType::Points,
            1 => PrimitiveType::Lines,
            2 => PrimitiveType::Triangles,
            3 => PrimitiveType::TriangleStrip,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown primitive type {other}"),
                ))
            }
        })
    }
}

bitflags! {
    /// Which vertex streams a `MeshData` actually carries. Streams absent
    /// here are still stored as empty vectors rather than omitted from the
    /// struct, so readers never special-case a missing stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VertexConfig: u32 {
        const POSITION = 1 << 0;
        const NORMAL = 1 << 1;
        const TANGENT = 1 << 2;
        const COLOR = 1 << 3;
        const UV0 = 1 << 4;
        const UV1 = 1 << 5;
        const BONES = 1 << 6;
    }
}

impl BinarySerialization for VertexConfig {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.bits().serialize(w)
    }
}

impl BinaryDeserialization for VertexConfig {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let bits = u32::deserialize(r)?;
        VertexConfig::from_bits(bits)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown vertex config bit"))
    }
}

/// A contiguous run of indices drawn with one material. Bounds are always
/// recomputed from the vertices a submesh covers, never carried over from an
/// import source.
#[derive(Debug, Clone)]
pub struct SubMesh {
    pub primitive_type: PrimitiveType,
    pub first_index: u32,
    pub index_count: u32,
    pub material: AssetId,
    pub bounds_aabb: Aabb,
    pub bounds_sphere: Sphere,
}

impl BinarySerialization for SubMesh {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.primitive_type.serialize(w)?;
        self.first_index.serialize(w)?;
        self.index_count.serialize(w)?;
        self.material.serialize(w)?;
        self.bounds_aabb.serialize(w)?;
        self.bounds_sphere.center.serialize(w)?;
        self.bounds_sphere.radius.serialize(w)
    }
}

impl BinaryDeserialization for SubMesh {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(SubMesh {
            primitive_type: PrimitiveType::deserialize(r)?,
            first_index: u32::deserialize(r)?,
            index_count: u32::deserialize(r)?,
            material: AssetId::deserialize(r)?,
            bounds_aabb: Aabb::deserialize(r)?,
            bounds_sphere: Sphere::new(Vec3::deserialize(r)?, f32::deserialize(r)?),
        })
    }
}

/// All vertex streams and the index buffer for one imported mesh. `submeshes`
/// slices `indices` into per-material draw ranges.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertex_config: VertexConfig,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub colors: Vec<[u8; 4]>,
    pub uv0: Vec<Vec2>,
    pub uv1: Vec<Vec2>,
    pub bone_indices: Vec<[u8; 4]>,
    pub bone_weights: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<SubMesh>,
    /// Union of every submesh's bounds. `None` only for a mesh with no
    /// submeshes, which the mesh pipeline never emits.
    pub bounds_aabb: Option<Aabb>,
    pub bounds_sphere: Option<Sphere>,
}

impl MeshData {
    /// Recomputes the aggregate bounds from `submeshes`, per the
    /// bounds-monotonicity invariant: the aggregate must enclose every
    /// submesh's own box and sphere.
    pub fn recompute_aggregate_bounds(&mut self) {
        let mut aabb: Option<Aabb> = None;
        let mut sphere: Option<Sphere> = None;
        for sub in &self.submeshes {
            aabb = Some(match aabb {
                Some(existing) => existing.union(&sub.bounds_aabb),
                None => sub.bounds_aabb,
            });
            sphere = Some(match sphere {
                Some(existing) => existing.union(&sub.bounds_sphere),
                None => sub.bounds_sphere,
            });
        }
        self.bounds_aabb = aabb;
        self.bounds_sphere = sphere;
    }
}

impl Default for VertexConfig {
    fn default() -> Self {
        VertexConfig::empty()
    }
}

impl BinarySerialization for MeshData {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.vertex_config.serialize(w)?;
        self.positions.serialize(w)?;
        self.normals.serialize(w)?;
        self.tangents.serialize(w)?;
        self.colors.serialize(w)?;
        self.uv0.serialize(w)?;
        self.uv1.serialize(w)?;
        self.bone_indices.serialize(w)?;
        self.bone_weights.serialize(w)?;
        self.indices.serialize(w)?;
        self.submeshes.serialize(w)?;
        self.bounds_aabb.is_some().serialize(w)?;
        if let Some(aabb) = &self.bounds_aabb {
            aabb.serialize(w)?;
        }
        self.bounds_sphere.is_some().serialize(w)?;
        if let Some(sphere) = &self.bounds_sphere {
            sphere.center.serialize(w)?;
            sphere.radius.serialize(w)?;
        }
        Ok(())
    }
}

impl BinaryDeserialization for MeshData {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let vertex_config = VertexConfig::deserialize(r)?;
        let positions = Vec::deserialize(r)?;
        let normals = Vec::deserialize(r)?;
        let tangents = Vec::deserialize(r)?;
        let colors = Vec::deserialize(r)?;
        let uv0 = Vec::deserialize(r)?;
        let uv1 = Vec::deserialize(r)?;
        let bone_indices = Vec::deserialize(r)?;
        let bone_weights = Vec::deserialize(r)?;
        let indices = Vec::deserialize(r)?;
        let submeshes = Vec::deserialize(r)?;
        let bounds_aabb = if bool::deserialize(r)? {
            Some(Aabb::deserialize(r)?)
        } else {
            None
        };
        let bounds_sphere = if bool::deserialize(r)? {
            Some(Sphere::new(Vec3::deserialize(r)?, f32::deserialize(r)?))
        } else {
            None
        };
        Ok(MeshData {
            vertex_config,
            positions,
            normals,
            tangents,
            colors,
            uv0,
            uv1,
            bone_indices,
            bone_weights,
            indices,
            submeshes,
            bounds_aabb,
            bounds_sphere,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub name: AssetName,
    pub id: AssetId,
    pub data: MeshData,
}

impl BinarySerialization for MeshAsset {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.name.serialize(w)?;
        self.id.serialize(w)?;
        self.data.serialize(w)
    }
}

impl BinaryDeserialization for MeshAsset {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(MeshAsset {
            name: AssetName::deserialize(r)?,
            id: AssetId::deserialize(r)?,
            data: MeshData::deserialize(r)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vertex_config_roundtrips() {
        let config = VertexConfig::POSITION | VertexConfig::NORMAL | VertexConfig::UV0;
        let mut buf = Vec::new();
        config.serialize(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let back = VertexConfig::deserialize(&mut cursor).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn submesh_bounds_roundtrip() {
        let submesh = SubMesh {
            primitive_type: PrimitiveType::Triangles,
            first_index: 0,
            index_count: 36,
            material: 42,
            bounds_aabb: Aabb::from_min_max(Vec3::ZERO, Vec3::ONE),
            bounds_sphere: Sphere::new(Vec3::splat(0.5), 0.86),
        };
        let mut buf = Vec::new();
        submesh.serialize(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let back = SubMesh::deserialize(&mut cursor).unwrap();
        assert_eq!(submesh.material, back.material);
        assert_eq!(submesh.index_count, back.index_count);
    }

    fn submesh_at(center: Vec3, extent: Vec3) -> SubMesh {
        let aabb = Aabb::from_min_max(center - extent, center + extent);
        SubMesh {
            primitive_type: PrimitiveType::Triangles,
            first_index: 0,
            index_count: 3,
            material: 0,
            bounds_aabb: aabb,
            bounds_sphere: Sphere::new(center, extent.length()),
        }
    }

    #[test]
    fn aggregate_bounds_enclose_every_submesh() {
        let mut mesh = MeshData {
            submeshes: vec![
                submesh_at(Vec3::ZERO, Vec3::splat(1.0)),
                submesh_at(Vec3::new(5.0, 0.0, 0.0), Vec3::splat(1.0)),
            ],
            ..Default::default()
        };
        mesh.recompute_aggregate_bounds();
        let aabb = mesh.bounds_aabb.unwrap();
        let sphere = mesh.bounds_sphere.unwrap();
        for sub in &mesh.submeshes {
            assert!(aabb.min().cmple(sub.bounds_aabb.min()).all());
            assert!(aabb.max().cmpge(sub.bounds_aabb.max()).all());
            let reach = (sub.bounds_sphere.center - sphere.center).length() + sub.bounds_sphere.radius;
            assert!(reach <= sphere.radius + 1e-4);
        }
    }
}
