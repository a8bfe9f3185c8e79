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
    fs::File,
    io::{self, Read, Write},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::traits::{BinaryDeserialization, BinarySerialization};

/// Sentinel written ahead of an LZ4-compressed payload. Files without this
/// prefix are read back as raw, uncompressed wire data.
const COMPRESSED_MAGIC: [u8; 4] = *b"PKLZ";

/// Serializes `value` and writes it to `path`, optionally compressing the
/// whole payload with LZ4 behind a magic header and an original-size prefix.
pub fn write_to_file<T: BinarySerialization>(
    path: &Path,
    value: &T,
    compress: bool,
) -> io::Result<()> {
    let mut raw = Vec::new();
    value.serialize(&mut raw)?;

    let mut file = File::create(path)?;
    if compress {
        let compressed = lz4_flex::compress(&raw);
        file.write_all(&COMPRESSED_MAGIC)?;
        file.write_u32::<LittleEndian>(raw.len() as u32)?;
        file.write_all(&compressed)?;
    } else {
        file.write_all(&raw)?;
    }
    Ok(())
}

/// Reads back a value written by [`write_to_file`], transparently decoding
/// the compressed form when the magic header is present.
pub fn read_from_file<T: BinaryDeserialization>(path: &Path) -> io::Result<T> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    let mut cursor = decode_buffer(buf)?;
    T::deserialize(&mut cursor)
}

/// Like [`read_from_file`] but reads from an already-open stream.
pub fn read_from(r: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    decode_buffer(buf).map(io::Cursor::into_inner)
}

fn decode_buffer(buf: Vec<u8>) -> io::Result<io::Cursor<Vec<u8>>> {
    if buf.len() >= 8 && buf[0..4] == COMPRESSED_MAGIC {
        let original_len = (&buf[4..8]).read_u32::<LittleEndian>()? as usize;
        let decompressed = lz4_flex::decompress(&buf[8..], original_len)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
        Ok(io::Cursor::new(decompressed))
    } else {
        Ok(io::Cursor::new(buf))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uncompressed_roundtrip() {
        let dir = std::env::temp_dir().join("forge-codec-test-plain");
        let value = "hello".to_owned();
        write_to_file(&dir, &value, false).unwrap();
        let read_back: String = read_from_file(&dir).unwrap();
        assert_eq!(value, read_back);
        std::fs::remove_file(&dir).unwrap();
    }

    #[test]
    fn compressed_roundtrip() {
        let dir = std::env::temp_dir().join("forge-codec-test-compressed");
        let value = "x".repeat(4096);
        write_to_file(&dir, &value, true).unwrap();
        let read_back: String = read_from_file(&dir).unwrap();
        assert_eq!(value, read_back);
        std::fs::remove_file(&dir).unwrap();
    }
}
