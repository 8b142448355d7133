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

//! Lightmap atlases.
//!
//! The lightmaps lump is a sequence of 128×128 RGB images. Faces refer to an atlas by index and
//! meshes refer to it by name.

pub const LIGHTMAP_WIDTH: usize = 128;
pub const LIGHTMAP_HEIGHT: usize = 128;
pub const LIGHTMAP_SIZE: usize = LIGHTMAP_WIDTH * LIGHTMAP_HEIGHT * 3;

/// Controls how lightmap atlases are named.
///
/// Atlas `n` is named `<prefix>lm<code><n>`, with `n` zero-padded to two digits.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LightmapNaming {
    pub prefix: String,
    pub code: String,
}

impl LightmapNaming {
    pub fn new<S, T>(prefix: S, code: T) -> LightmapNaming
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        LightmapNaming {
            prefix: prefix.as_ref().to_owned(),
            code: code.as_ref().to_owned(),
        }
    }

    pub fn name(&self, index: usize) -> String {
        format!("{}lm{}{:02}", self.prefix, self.code, index)
    }
}

/// One lightmap atlas.
#[derive(Copy, Clone, Debug)]
pub struct Lightmap<'a> {
    index: usize,
    data: &'a [u8],
}

impl<'a> Lightmap<'a> {
    /// Cuts the lightmaps lump into atlases. A trailing partial atlas is ignored.
    pub fn slice_atlases(data: &'a [u8]) -> Vec<Lightmap<'a>> {
        let count = data.len() / LIGHTMAP_SIZE;
        if data.len() % LIGHTMAP_SIZE != 0 {
            warn!(
                "Ignoring {} trailing bytes of lightmap data",
                data.len() % LIGHTMAP_SIZE
            );
        }

        data.chunks(LIGHTMAP_SIZE)
            .take(count)
            .enumerate()
            .map(|(index, data)| Lightmap { index, data })
            .collect()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> usize {
        LIGHTMAP_WIDTH
    }

    pub fn height(&self) -> usize {
        LIGHTMAP_HEIGHT
    }

    /// Returns the raw RGB texels, row by row.
    pub fn rgb(&self) -> &'a [u8] {
        self.data
    }

    pub fn texel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= LIGHTMAP_WIDTH || y >= LIGHTMAP_HEIGHT {
            return None;
        }

        let ofs = (y * LIGHTMAP_WIDTH + x) * 3;
        Some([self.data[ofs], self.data[ofs + 1], self.data[ofs + 2]])
    }

    pub fn name(&self, naming: &LightmapNaming) -> String {
        naming.name(self.index)
    }
}
