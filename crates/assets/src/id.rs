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
    fmt,
    hash::{Hash, Hasher},
    io::{self, Read, Write},
};

use dess_common::{BinaryDeserialization, BinarySerialization};
use siphasher::sip::SipHasher13;

/// Longest name a registered asset may have. Names past this are rejected at
/// the call site rather than silently truncated.
pub const ASSET_NAME_MAX_LEN: usize = 63;

/// Stable, human-authored name an asset is imported under. Two assets that
/// share a name are a collision, not an overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetName(String);

impl AssetName {
    pub fn new(name: impl Into<String>) -> Result<Self, AssetNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AssetNameError::Empty);
        }
        if name.len() > ASSET_NAME_MAX_LEN {
            return Err(AssetNameError::TooLong(name.len()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetNameError {
    #[error("asset name is empty")]
    Empty,
    #[error("asset name is {0} bytes, exceeds the {ASSET_NAME_MAX_LEN}-byte limit")]
    TooLong(usize),
}

impl BinarySerialization for AssetName {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.0.serialize(w)
    }
}

impl BinaryDeserialization for AssetName {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let name = String::deserialize(r)?;
        AssetName::new(name).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

/// Stable 64-bit identity of a registered asset, derived from its name.
/// Never recomputed from content - renaming an asset changes its id, editing
/// its content does not.
pub type AssetId = u64;

/// Hashes a bare name into an [`AssetId`]. On collision, the package store
/// resolves by appending a decimal suffix to the *display name itself*
/// (`"mat_A"` -> `"mat_A1"`, `"mat_A2"`, ...) and re-hashing that string with
/// this same function until a free id turns up - there is no separate
/// suffix-aware hash path.
pub fn hash_name(name: &str) -> AssetId {
    let mut hasher = SipHasher13::new();
    name.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_overlong_names() {
        let name = "x".repeat(ASSET_NAME_MAX_LEN + 1);
        assert!(matches!(AssetName::new(name), Err(AssetNameError::TooLong(_))));
    }

    #[test]
    fn accepts_boundary_length() {
        let name = "x".repeat(ASSET_NAME_MAX_LEN);
        assert!(AssetName::new(name).is_ok());
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash_name("wall.png"), hash_name("wall.png"));
    }

    #[test]
    fn suffixed_display_name_changes_hash() {
        assert_ne!(hash_name("wall.png"), hash_name("wall.png1"));
    }
}
