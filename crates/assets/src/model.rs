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

/// Top-level asset the model pipeline emits: just the ids of the parts that
/// were packaged before it, stitched together. Resolving an id back to its
/// `MeshAsset`/`SkeletonAsset`/`MaterialAsset` goes through the owning
/// package store - nothing here holds a live reference across stores.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub mesh: AssetId,
    pub skeletons: Vec<AssetId>,
    pub materials: Vec<AssetId>,
}

impl BinarySerialization for ModelData {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.mesh.serialize(w)?;
        self.skeletons.serialize(w)?;
        self.materials.serialize(w)
    }
}

impl BinaryDeserialization for ModelData {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(ModelData {
            mesh: AssetId::deserialize(r)?,
            skeletons: Vec::deserialize(r)?,
            materials: Vec::deserialize(r)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub name: AssetName,
    pub id: AssetId,
    pub data: ModelData,
}

impl BinarySerialization for ModelAsset {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.name.serialize(w)?;
        self.id.serialize(w)?;
        self.data.serialize(w)
    }
}

impl BinaryDeserialization for ModelAsset {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(ModelAsset {
            name: AssetName::deserialize(r)?,
            id: AssetId::deserialize(r)?,
            data: ModelData::deserialize(r)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn model_roundtrips() {
        let model = ModelAsset {
            name: AssetName::new("hero").unwrap(),
            id: 7,
            data: ModelData {
                mesh: 1,
                skeletons: vec![2],
                materials: vec![3, 4],
            },
        };
        let mut buf = Vec::new();
        model.serialize(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let back = ModelAsset::deserialize(&mut cursor).unwrap();
        assert_eq!(model.data.mesh, back.data.mesh);
        assert_eq!(model.data.materials, back.data.materials);
    }
}
