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
    collections::{HashMap, HashSet},
    hash::Hash,
    io::{self, Read, Write},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::traits::{BinaryDeserialization, BinarySerialization};

impl BinarySerialization for String {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        let bytes = self.as_bytes();
        w.write_u16::<LittleEndian>(bytes.len() as u16)?;
        w.write_all(bytes)
    }
}

impl BinaryDeserialization for String {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let len = r.read_u16::<LittleEndian>()? as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

const NONE_STRING_SENTINEL: u16 = u16::MAX;

impl BinarySerialization for Option<String> {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        match self {
            Some(value) => value.serialize(w),
            None => w.write_u16::<LittleEndian>(NONE_STRING_SENTINEL),
        }
    }
}

impl BinaryDeserialization for Option<String> {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let len = r.read_u16::<LittleEndian>()? as usize;
        if len as u16 == NONE_STRING_SENTINEL {
            return Ok(None);
        }
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        String::from_utf8(buf)
            .map(Some)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

impl BinarySerialization for bool {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_u8(*self as u8)
    }
}

impl BinaryDeserialization for bool {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(r.read_u8()? != 0)
    }
}

impl BinarySerialization for u8 {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_u8(*self)
    }
}

impl BinaryDeserialization for u8 {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        r.read_u8()
    }
}

macro_rules! impl_primitive {
    ($ty:ty, $write:ident, $read:ident) => {
        impl BinarySerialization for $ty {
            fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
                w.$write::<LittleEndian>(*self)
            }
        }

        impl BinaryDeserialization for $ty {
            fn deserialize(r: &mut impl Read) -> io::Result<Self> {
                r.$read::<LittleEndian>()
            }
        }
    };
}

impl_primitive!(u16, write_u16, read_u16);
impl_primitive!(u32, write_u32, read_u32);
impl_primitive!(u64, write_u64, read_u64);
impl_primitive!(i16, write_i16, read_i16);
impl_primitive!(i32, write_i32, read_i32);
impl_primitive!(i64, write_i64, read_i64);
impl_primitive!(f32, write_f32, read_f32);
impl_primitive!(f64, write_f64, read_f64);

impl<T: BinarySerialization> BinarySerialization for Vec<T> {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.len() as u32)?;
        for item in self {
            item.serialize(w)?;
        }
        Ok(())
    }
}

impl<T: BinaryDeserialization> BinaryDeserialization for Vec<T> {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let count = r.read_u32::<LittleEndian>()? as usize;
        let mut result = Vec::with_capacity(count);
        for _ in 0..count {
            result.push(T::deserialize(r)?);
        }
        Ok(result)
    }
}

impl<K, V> BinarySerialization for HashMap<K, V>
where
    K: BinarySerialization,
    V: BinarySerialization,
{
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.len() as u32)?;
        for (key, value) in self {
            key.serialize(w)?;
            value.serialize(w)?;
        }
        Ok(())
    }
}

impl<K, V> BinaryDeserialization for HashMap<K, V>
where
    K: BinaryDeserialization + Eq + Hash,
    V: BinaryDeserialization,
{
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let count = r.read_u32::<LittleEndian>()? as usize;
        let mut result = HashMap::with_capacity(count);
        for _ in 0..count {
            let key = K::deserialize(r)?;
            let value = V::deserialize(r)?;
            result.insert(key, value);
        }
        Ok(result)
    }
}

impl<T: BinarySerialization> BinarySerialization for HashSet<T> {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.len() as u32)?;
        for item in self {
            item.serialize(w)?;
        }
        Ok(())
    }
}

impl<T: BinaryDeserialization + Eq + Hash> BinaryDeserialization for HashSet<T> {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let count = r.read_u32::<LittleEndian>()? as usize;
        let mut result = HashSet::with_capacity(count);
        for _ in 0..count {
            result.insert(T::deserialize(r)?);
        }
        Ok(result)
    }
}

impl<T: BinarySerialization, const N: usize> BinarySerialization for [T; N] {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        for item in self {
            item.serialize(w)?;
        }
        Ok(())
    }
}

impl<T: BinaryDeserialization, const N: usize> BinaryDeserialization for [T; N] {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::deserialize(r)?);
        }
        match items.try_into() {
            Ok(array) => Ok(array),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "array length mismatch during deserialization",
            )),
        }
    }
}

impl BinarySerialization for glam::Vec2 {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.x.serialize(w)?;
        self.y.serialize(w)
    }
}

impl BinaryDeserialization for glam::Vec2 {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(glam::Vec2::new(f32::deserialize(r)?, f32::deserialize(r)?))
    }
}

impl BinarySerialization for glam::Vec3 {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.x.serialize(w)?;
        self.y.serialize(w)?;
        self.z.serialize(w)
    }
}

impl BinaryDeserialization for glam::Vec3 {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(glam::Vec3::new(
            f32::deserialize(r)?,
            f32::deserialize(r)?,
            f32::deserialize(r)?,
        ))
    }
}

impl BinarySerialization for glam::Vec4 {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.x.serialize(w)?;
        self.y.serialize(w)?;
        self.z.serialize(w)?;
        self.w.serialize(w)
    }
}

impl BinaryDeserialization for glam::Vec4 {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(glam::Vec4::new(
            f32::deserialize(r)?,
            f32::deserialize(r)?,
            f32::deserialize(r)?,
            f32::deserialize(r)?,
        ))
    }
}

impl BinarySerialization for glam::Quat {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        self.x.serialize(w)?;
        self.y.serialize(w)?;
        self.z.serialize(w)?;
        self.w.serialize(w)
    }
}

impl BinaryDeserialization for glam::Quat {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        Ok(glam::Quat::from_xyzw(
            f32::deserialize(r)?,
            f32::deserialize(r)?,
            f32::deserialize(r)?,
            f32::deserialize(r)?,
        ))
    }
}

impl BinarySerialization for glam::Mat4 {
    fn serialize(&self, w: &mut impl Write) -> io::Result<()> {
        for value in self.to_cols_array() {
            value.serialize(w)?;
        }
        Ok(())
    }
}

impl BinaryDeserialization for glam::Mat4 {
    fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let mut values = [0f32; 16];
        for value in values.iter_mut() {
            *value = f32::deserialize(r)?;
        }
        Ok(glam::Mat4::from_cols_array(&values))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip<T: BinarySerialization + BinaryDeserialization + PartialEq + std::fmt::Debug>(
        value: T,
    ) {
        let mut buf = Vec::new();
        value.serialize(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let read_back = T::deserialize(&mut cursor).unwrap();
        assert_eq!(value, read_back);
    }

    #[test]
    fn string_roundtrip() {
        roundtrip("hello asset pipeline".to_owned());
    }

    #[test]
    fn option_string_none_roundtrip() {
        roundtrip::<Option<String>>(None);
        roundtrip(Some("texture.png".to_owned()));
    }

    #[test]
    fn vec_roundtrip() {
        roundtrip(vec![1u32, 2, 3, 4]);
    }

    #[test]
    fn map_roundtrip() {
        let mut map = HashMap::new();
        map.insert("a".to_owned(), 1u32);
        map.insert("b".to_owned(), 2u32);
        let mut buf = Vec::new();
        map.serialize(&mut buf).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let read_back: HashMap<String, u32> = HashMap::deserialize(&mut cursor).unwrap();
        assert_eq!(map, read_back);
    }

    #[test]
    fn vec3_roundtrip() {
        roundtrip(glam::Vec3::new(1.0, 2.0, 3.0));
    }
}
