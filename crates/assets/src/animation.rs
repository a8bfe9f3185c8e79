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
use glam::{Quat, Vec3};

use crate::id::{AssetId, AssetName};

/// One sampled key in a channel's position/rotation/scale track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorKey {
    pub time: f32,
    pub value: Vec3,
}

impl BinarySerialization for VectorKey {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.time.serialize(w)?;
        self.value.serialize(w)
    }
}

impl BinaryDeserialization for VectorKey {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(VectorKey {
            time: f32::deserialize(r)?,
            value: Vec3::deserialize(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationKey {
    pub time: f32,
    pub value: Quat,
}

impl BinarySerialization for RotationKey {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.time.serialize(w)?;
        self.value.serialize(w)
    }
}

impl BinaryDeserialization for RotationKey {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(RotationKey {
            time: f32::deserialize(r)?,
            value: Quat::deserialize(r)?,
        })
    }
}

/// Independently-sampled position/rotation/scale tracks for one bone. A
/// channel whose `bone_name` is empty is rejected by the animation pipeline
/// before it ever reaches this type.
#[derive(Debug, Clone)]
pub struct AnimationChannel {
    pub bone_name: String,
    pub positions: Vec<VectorKey>,
    pub rotations: Vec<RotationKey>,
    pub scales: Vec<VectorKey>,
}

impl BinarySerialization for AnimationChannel {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.bone_name.serialize(w)?;
        self.positions.serialize(w)?;
        self.rotations.serialize(w)?;
        self.scales.serialize(w)
    }
}

impl BinaryDeserialization for AnimationChannel {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(AnimationChannel {
            bone_name: String::deserialize(r)?,
            positions: Vec::deserialize(r)?,
            rotations: Vec::deserialize(r)?,
            scales: Vec::deserialize(r)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AnimationData {
    pub duration: f32,
    pub ticks_per_second: f32,
    pub channels: Vec<AnimationChannel>,
}

impl BinarySerialization for AnimationData {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.duration.serialize(w)?;
        self.ticks_per_second.serialize(w)?;
        self.channels.serialize(w)
    }
}

impl BinaryDeserialization for AnimationData {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(AnimationData {
            duration: f32::deserialize(r)?,
            ticks_per_second: f32::deserialize(r)?,
            channels: Vec::deserialize(r)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AnimationAsset {
    pub name: AssetName,
    pub id: AssetId,
    pub data: AnimationData,
}

impl BinarySerialization for AnimationAsset {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.name.serialize(w)?;
        self.id.serialize(w)?;
        self.data.serialize(w)
    }
}

impl BinaryDeserialization for AnimationAsset {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(AnimationAsset {
            name: AssetName::deserialize(r)?,
            id: AssetId::deserialize(r)?,
            data: AnimationData::deserialize(r)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_roundtrips() {
        let channel = AnimationChannel {
            bone_name: "spine".to_owned(),
            positions: vec![VectorKey { time: 0.0, value: Vec3::ZERO }],
            rotations: vec![RotationKey { time: 0.0, value: Quat::IDENTITY }],
            scales: vec![VectorKey { time: 0.0, value: Vec3::ONE }],
        };
        let mut buf = Vec::new();
        channel.serialize(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let back = AnimationChannel::deserialize(&mut cursor).unwrap();
        assert_eq!(channel.bone_name, back.bone_name);
        assert_eq!(channel.positions.len(), back.positions.len());
    }
}
