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

use std::{
    collections::HashMap,
    io::{self, Read, Write},
};

use dess_common::{BinaryDeserialization, BinarySerialization};
use glam::Mat4;

use crate::id::{AssetId, AssetName};

/// One joint in a skeleton. Hierarchy is stored both ways - `parent` for
/// upward walks when applying a pose, `children` for downward walks when
/// building one - rather than as a tree of pointers, so a skeleton serializes
/// as flat arrays.
#[derive(Debug, Clone)]
pub struct Bone {
    pub parent: Option<u32>,
    pub local_transform: Mat4,
    pub children: Vec<u32>,
}

impl BinarySerialization for Bone {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.parent.map(|p| p + 1).unwrap_or(0).serialize(w)?;
        self.local_transform.serialize(w)?;
        self.children.serialize(w)
    }
}

impl BinaryDeserialization for Bone {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let raw_parent = u32::deserialize(r)?;
        Ok(Bone {
            parent: if raw_parent == 0 { None } else { Some(raw_parent - 1) },
            local_transform: Mat4::deserialize(r)?,
            children: Vec::deserialize(r)?,
        })
    }
}

/// A skeleton with no bones is discarded by the pipeline rather than stored
/// empty - an empty `bones` vector here should never reach disk.
#[derive(Debug, Clone, Default)]
pub struct SkeletonData {
    pub bone_names: HashMap<String, u32>,
    pub bones: Vec<Bone>,
}

impl BinarySerialization for SkeletonData {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.bone_names.serialize(w)?;
        self.bones.serialize(w)
    }
}

impl BinaryDeserialization for SkeletonData {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(SkeletonData {
            bone_names: HashMap::deserialize(r)?,
            bones: Vec::deserialize(r)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SkeletonAsset {
    pub name: AssetName,
    pub id: AssetId,
    pub data: SkeletonData,
}

impl BinarySerialization for SkeletonAsset {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.name.serialize(w)?;
        self.id.serialize(w)?;
        self.data.serialize(w)
    }
}

impl BinaryDeserialization for SkeletonAsset {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(SkeletonAsset {
            name: AssetName::deserialize(r)?,
            id: AssetId::deserialize(r)?,
            data: SkeletonData::deserialize(r)?,
        })
    }
}
