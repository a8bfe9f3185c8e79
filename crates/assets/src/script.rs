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

/// Lua bytecode produced by shelling out to an external compiler. Stored
/// verbatim - nothing in this crate interprets it.
#[derive(Debug, Clone)]
pub struct ScriptAsset {
    pub name: AssetName,
    pub id: AssetId,
    pub bytecode: Vec<u8>,
}

impl BinarySerialization for ScriptAsset {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.name.serialize(w)?;
        self.id.serialize(w)?;
        self.bytecode.serialize(w)
    }
}

impl BinaryDeserialization for ScriptAsset {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(ScriptAsset {
            name: AssetName::deserialize(r)?,
            id: AssetId::deserialize(r)?,
            bytecode: Vec::deserialize(r)?,
        })
    }
}
