// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The lump directory.
//!
//! An IBSP file opens with a 4-byte magic number, a version and 17 `(offset, length)` pairs, all
//! little-endian. Each pair locates one lump, an array of fixed-size records.

use std::io::Read;

use crate::bsp::error::{BspError, BspErrorKind};

use byteorder::{LittleEndian, ReadBytesExt};
use failure::ResultExt;
use num_traits::FromPrimitive;

pub const MAGIC: [u8; 4] = *b"IBSP";
pub const VERSION: i32 = 46;
pub const LUMP_COUNT: usize = 17;
pub const HEADER_SIZE: usize = 8 + LUMP_COUNT * 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, FromPrimitive)]
pub enum LumpId {
    Entities = 0,
    Shaders = 1,
    Planes = 2,
    Nodes = 3,
    Leaves = 4,
    LeafSurfaces = 5,
    LeafBrushes = 6,
    Models = 7,
    Brushes = 8,
    BrushSides = 9,
    Vertices = 10,
    Elements = 11,
    Fogs = 12,
    Faces = 13,
    Lightmaps = 14,
    LightGrid = 15,
    Visibility = 16,
}

impl LumpId {
    /// Returns every lump in directory order.
    pub fn all() -> impl Iterator<Item = LumpId> {
        (0..LUMP_COUNT).filter_map(LumpId::from_usize)
    }

    /// Returns the size in bytes of one record of this lump.
    ///
    /// Lumps of raw bytes (entity text, lightmap texels, visibility data) have a record size of
    /// 1.
    pub fn record_size(self) -> usize {
        match self {
            LumpId::Entities => 1,
            LumpId::Shaders => 72,
            LumpId::Planes => 16,
            LumpId::Nodes => 36,
            LumpId::Leaves => 48,
            LumpId::LeafSurfaces => 4,
            LumpId::LeafBrushes => 4,
            LumpId::Models => 40,
            LumpId::Brushes => 12,
            LumpId::BrushSides => 8,
            LumpId::Vertices => 44,
            LumpId::Elements => 4,
            LumpId::Fogs => 72,
            LumpId::Faces => 104,
            LumpId::Lightmaps => 1,
            LumpId::LightGrid => 8,
            LumpId::Visibility => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Lump {
    pub offset: usize,
    pub length: usize,
}

/// A validated file header.
#[derive(Clone, Debug)]
pub struct Header {
    version: i32,
    lumps: [Lump; LUMP_COUNT],
}

impl Header {
    /// Reads and validates the header at the start of `data`.
    ///
    /// Only the header itself is checked here; lump ranges are checked by `view`.
    pub fn parse(data: &[u8]) -> Result<Header, BspError> {
        if data.len() < HEADER_SIZE {
            return Err(BspErrorKind::corrupt_header(format!(
                "file is {} bytes, header needs {}",
                data.len(),
                HEADER_SIZE
            )).into());
        }

        let mut reader = data;

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .context(BspErrorKind::corrupt_header("truncated magic"))?;
        if magic != MAGIC {
            return Err(BspErrorKind::corrupt_header(format!(
                "bad magic {:?} (should be {:?})",
                String::from_utf8_lossy(&magic),
                String::from_utf8_lossy(&MAGIC),
            )).into());
        }

        let version = reader
            .read_i32::<LittleEndian>()
            .context(BspErrorKind::corrupt_header("truncated version"))?;
        if version != VERSION {
            return Err(BspErrorKind::corrupt_header(format!(
                "bad version {} (should be {})",
                version, VERSION
            )).into());
        }

        let mut lumps = [Lump::default(); LUMP_COUNT];
        for id in LumpId::all() {
            let offset = reader
                .read_i32::<LittleEndian>()
                .context(BspErrorKind::corrupt_header("truncated lump directory"))?;
            let length = reader
                .read_i32::<LittleEndian>()
                .context(BspErrorKind::corrupt_header("truncated lump directory"))?;

            if offset < 0 || length < 0 {
                return Err(BspErrorKind::malformed_lump(
                    id,
                    format!("negative offset or length ({}, {})", offset, length),
                ).into());
            }

            debug!("{:?}: offset {}, length {}", id, offset, length);
            lumps[id as usize] = Lump {
                offset: offset as usize,
                length: length as usize,
            };
        }

        Ok(Header { version, lumps })
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn lump(&self, id: LumpId) -> Lump {
        self.lumps[id as usize]
    }

    /// Returns a bounds-checked view of the records of lump `id` within `data`.
    pub fn view<'a>(&self, id: LumpId, data: &'a [u8]) -> Result<LumpView<'a>, BspError> {
        let lump = self.lump(id);
        let record_size = id.record_size();

        if lump.length % record_size != 0 {
            return Err(BspErrorKind::malformed_lump(
                id,
                format!(
                    "length {} is not a multiple of the record size {}",
                    lump.length, record_size
                ),
            ).into());
        }

        let end = lump.offset.checked_add(lump.length);
        match end {
            Some(end) if end <= data.len() => Ok(LumpView {
                id,
                data: &data[lump.offset..end],
                record_size,
                count: lump.length / record_size,
            }),

            _ => Err(BspErrorKind::LumpOutOfBounds {
                lump: id,
                end: end.unwrap_or(std::usize::MAX),
                len: data.len(),
            }
            .into()),
        }
    }
}

/// The records of one lump.
#[derive(Copy, Clone, Debug)]
pub struct LumpView<'a> {
    pub id: LumpId,
    pub data: &'a [u8],
    pub record_size: usize,
    pub count: usize,
}

impl<'a> LumpView<'a> {
    pub fn record(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.count {
            return None;
        }

        let start = index * self.record_size;
        Some(&self.data[start..start + self.record_size])
    }

    pub fn records(&self) -> impl Iterator<Item = &'a [u8]> {
        let data = self.data;
        data.chunks(self.record_size)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::bsp::testutil::BspBuilder;

    #[test]
    fn test_record_sizes() {
        assert_eq!(LumpId::all().count(), LUMP_COUNT);
        assert_eq!(LumpId::Faces.record_size(), 26 * 4);
        assert_eq!(LumpId::Vertices.record_size(), 11 * 4);
        assert_eq!(LumpId::Nodes.record_size(), 9 * 4);
        assert_eq!(LumpId::Leaves.record_size(), 12 * 4);
        assert_eq!(LumpId::Shaders.record_size(), 64 + 2 * 4);
    }

    #[test]
    fn test_parse_header() {
        let data = BspBuilder::new().build();
        let header = Header::parse(&data).unwrap();
        assert_eq!(header.version(), VERSION);

        for id in LumpId::all() {
            let view = header.view(id, &data).unwrap();
            assert_eq!(view.count * view.record_size, header.lump(id).length);
        }
    }

    #[test]
    fn test_bad_magic() {
        let mut data = BspBuilder::new().build();
        data[0] = b'P';
        match Header::parse(&data).unwrap_err().kind() {
            BspErrorKind::CorruptHeader { .. } => (),
            k => panic!("unexpected error {:?}", k),
        }
    }

    #[test]
    fn test_bad_version() {
        let mut data = BspBuilder::new().build();
        data[4] = 47;
        match Header::parse(&data).unwrap_err().kind() {
            BspErrorKind::CorruptHeader { reason } => assert!(reason.contains("47")),
            k => panic!("unexpected error {:?}", k),
        }
    }

    #[test]
    fn test_truncated_header() {
        let data = BspBuilder::new().build();
        match Header::parse(&data[..HEADER_SIZE - 1]).unwrap_err().kind() {
            BspErrorKind::CorruptHeader { .. } => (),
            k => panic!("unexpected error {:?}", k),
        }
    }

    #[test]
    fn test_indivisible_lump() {
        let data = BspBuilder::new().raw_lump(LumpId::Planes, vec![0; 17]).build();
        let header = Header::parse(&data).unwrap();
        match header.view(LumpId::Planes, &data).unwrap_err().kind() {
            BspErrorKind::MalformedLump { lump, .. } => assert_eq!(*lump, LumpId::Planes),
            k => panic!("unexpected error {:?}", k),
        }
    }

    #[test]
    fn test_lump_out_of_bounds() {
        let mut data = BspBuilder::new().raw_lump(LumpId::Planes, vec![0; 16]).build();
        let len = data.len();
        data.truncate(len - 8);

        let header = Header::parse(&data).unwrap();
        match header.view(LumpId::Planes, &data).unwrap_err().kind() {
            BspErrorKind::LumpOutOfBounds { lump, .. } => assert_eq!(*lump, LumpId::Planes),
            k => panic!("unexpected error {:?}", k),
        }
    }

    #[test]
    fn test_view_records() {
        let data = BspBuilder::new()
            .raw_lump(LumpId::Elements, vec![1, 0, 0, 0, 2, 0, 0, 0])
            .build();
        let header = Header::parse(&data).unwrap();
        let view = header.view(LumpId::Elements, &data).unwrap();
        assert_eq!(view.count, 2);
        assert_eq!(view.record(1), Some(&[2u8, 0, 0, 0][..]));
        assert_eq!(view.record(2), None);
        assert_eq!(view.records().count(), 2);
    }
}
