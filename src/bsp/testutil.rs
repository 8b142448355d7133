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

//! Assembly of synthetic IBSP files for tests.

use std::io::Write;

use crate::bsp::{
    lump::{HEADER_SIZE, LUMP_COUNT, MAGIC, VERSION},
    FaceKind, LumpId,
};

use byteorder::{LittleEndian, WriteBytesExt};

/// The 26 fields of a face record.
#[derive(Clone, Debug, Default)]
pub struct FaceRecord {
    pub shader: i32,
    pub fog: i32,
    pub kind: i32,
    pub first_vertex: i32,
    pub vertex_count: i32,
    pub first_element: i32,
    pub element_count: i32,
    pub lightmap: i32,
    pub lightmap_rect: [i32; 4],
    pub lightmap_origin: [f32; 3],
    pub bounds: [f32; 6],
    pub normal: [f32; 3],
    pub patch_width: i32,
    pub patch_height: i32,
}

impl FaceRecord {
    pub fn planar(
        shader: usize,
        first_vertex: usize,
        vertex_count: usize,
        first_element: usize,
        element_count: usize,
    ) -> FaceRecord {
        FaceRecord {
            shader: shader as i32,
            fog: -1,
            kind: FaceKind::Planar as i32,
            first_vertex: first_vertex as i32,
            vertex_count: vertex_count as i32,
            first_element: first_element as i32,
            element_count: element_count as i32,
            lightmap: -1,
            normal: [0.0, 0.0, 1.0],
            ..Default::default()
        }
    }

    pub fn patch(
        shader: usize,
        first_vertex: usize,
        vertex_count: usize,
        width: usize,
        height: usize,
    ) -> FaceRecord {
        FaceRecord {
            kind: FaceKind::Patch as i32,
            patch_width: width as i32,
            patch_height: height as i32,
            ..FaceRecord::planar(shader, first_vertex, vertex_count, 0, 0)
        }
    }

    fn write<W>(&self, w: &mut W)
    where
        W: WriteBytesExt,
    {
        let ints = [
            self.shader,
            self.fog,
            self.kind,
            self.first_vertex,
            self.vertex_count,
            self.first_element,
            self.element_count,
            self.lightmap,
        ];
        for &i in ints.iter().chain(self.lightmap_rect.iter()) {
            w.write_i32::<LittleEndian>(i).unwrap();
        }

        let floats = self
            .lightmap_origin
            .iter()
            .chain(self.bounds.iter())
            .chain(self.normal.iter());
        for &f in floats {
            w.write_f32::<LittleEndian>(f).unwrap();
        }

        w.write_i32::<LittleEndian>(self.patch_width).unwrap();
        w.write_i32::<LittleEndian>(self.patch_height).unwrap();
    }
}

/// Builds an IBSP file lump by lump. Every lump starts out empty.
pub struct BspBuilder {
    lumps: Vec<Vec<u8>>,
}

impl BspBuilder {
    pub fn new() -> BspBuilder {
        BspBuilder {
            lumps: vec![Vec::new(); LUMP_COUNT],
        }
    }

    fn lump(&mut self, id: LumpId) -> &mut Vec<u8> {
        &mut self.lumps[id as usize]
    }

    /// Replaces the contents of a lump verbatim.
    pub fn raw_lump(&mut self, id: LumpId, data: Vec<u8>) -> &mut BspBuilder {
        *self.lump(id) = data;
        self
    }

    pub fn entities(&mut self, text: &str) -> &mut BspBuilder {
        self.lump(LumpId::Entities).write_all(text.as_bytes()).unwrap();
        self
    }

    pub fn shader(&mut self, name: &str) -> &mut BspBuilder {
        let mut bytes = [0u8; 64];
        bytes[..name.len()].copy_from_slice(name.as_bytes());

        let lump = self.lump(LumpId::Shaders);
        lump.write_all(&bytes).unwrap();
        lump.write_i32::<LittleEndian>(0).unwrap();
        lump.write_i32::<LittleEndian>(1).unwrap();
        self
    }

    pub fn plane(&mut self, normal: [f32; 3], dist: f32) -> &mut BspBuilder {
        let lump = self.lump(LumpId::Planes);
        for &f in normal.iter() {
            lump.write_f32::<LittleEndian>(f).unwrap();
        }
        lump.write_f32::<LittleEndian>(dist).unwrap();
        self
    }

    pub fn node(&mut self, plane: i32, front: i32, back: i32) -> &mut BspBuilder {
        let lump = self.lump(LumpId::Nodes);
        for &i in [plane, front, back, -64, -64, -64, 64, 64, 64].iter() {
            lump.write_i32::<LittleEndian>(i).unwrap();
        }
        self
    }

    pub fn leaf(&mut self, first_surface: i32, surface_count: i32) -> &mut BspBuilder {
        let lump = self.lump(LumpId::Leaves);
        let fields = [
            0,
            0,
            -64,
            -64,
            -64,
            64,
            64,
            64,
            first_surface,
            surface_count,
            0,
            0,
        ];
        for &i in fields.iter() {
            lump.write_i32::<LittleEndian>(i).unwrap();
        }
        self
    }

    pub fn leaf_surface(&mut self, face: i32) -> &mut BspBuilder {
        self.lump(LumpId::LeafSurfaces)
            .write_i32::<LittleEndian>(face)
            .unwrap();
        self
    }

    pub fn model(
        &mut self,
        min: [f32; 3],
        max: [f32; 3],
        first_face: i32,
        face_count: i32,
    ) -> &mut BspBuilder {
        let lump = self.lump(LumpId::Models);
        for &f in min.iter().chain(max.iter()) {
            lump.write_f32::<LittleEndian>(f).unwrap();
        }
        for &i in [first_face, face_count, 0, 0].iter() {
            lump.write_i32::<LittleEndian>(i).unwrap();
        }
        self
    }

    /// Adds a white vertex with a +Z normal. Coordinates are in world units.
    pub fn vertex(&mut self, pos: [f32; 3], st: [f32; 2], lm: [f32; 2]) -> &mut BspBuilder {
        let normal = [0.0f32, 0.0, 1.0];
        let lump = self.lump(LumpId::Vertices);
        let floats = pos
            .iter()
            .chain(st.iter())
            .chain(lm.iter())
            .chain(normal.iter());
        for &f in floats {
            lump.write_f32::<LittleEndian>(f).unwrap();
        }
        lump.write_all(&[255, 255, 255, 255]).unwrap();
        self
    }

    pub fn elements(&mut self, elements: &[i32]) -> &mut BspBuilder {
        let lump = self.lump(LumpId::Elements);
        for &e in elements {
            lump.write_i32::<LittleEndian>(e).unwrap();
        }
        self
    }

    pub fn face(&mut self, face: FaceRecord) -> &mut BspBuilder {
        face.write(self.lump(LumpId::Faces));
        self
    }

    pub fn lightmaps(&mut self, data: Vec<u8>) -> &mut BspBuilder {
        self.raw_lump(LumpId::Lightmaps, data)
    }

    /// Lays out the header followed by every lump, in directory order.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_all(&MAGIC).unwrap();
        out.write_i32::<LittleEndian>(VERSION).unwrap();

        let mut offset = HEADER_SIZE;
        for lump in self.lumps.iter() {
            out.write_i32::<LittleEndian>(offset as i32).unwrap();
            out.write_i32::<LittleEndian>(lump.len() as i32).unwrap();
            offset += lump.len();
        }

        for lump in self.lumps.iter() {
            out.write_all(lump).unwrap();
        }

        out
    }
}
