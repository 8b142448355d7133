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

//! Vertex welding.
//!
//! A `VertexPool` hands out dense `u16` indices for vertices, returning the same index for every
//! vertex whose position and both texture coordinate pairs are bit-identical. Normals and colors
//! are deliberately left out of the key, so two vertices differing only in shading collapse onto
//! whichever of them was seen first.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::mesh::Vertex;

/// The largest number of vertices a single pool may hold.
///
/// Indices are 16 bits wide, so the pool holds at most `u16::MAX` entries.
pub const MAX_POOL_VERTICES: usize = std::u16::MAX as usize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Fail)]
#[fail(display = "Vertex pool is full ({} vertices)", _0)]
pub struct PoolFull(pub usize);

// x, y, z, u1, v1, u2, v2
#[derive(Clone, Copy, Debug)]
struct WeldKey([f32; 7]);

impl WeldKey {
    fn of(vertex: &Vertex) -> WeldKey {
        WeldKey([
            vertex.position.x,
            vertex.position.y,
            vertex.position.z,
            vertex.texcoord.x,
            vertex.texcoord.y,
            vertex.lightmap_texcoord.x,
            vertex.lightmap_texcoord.y,
        ])
    }
}

impl Ord for WeldKey {
    fn cmp(&self, other: &WeldKey) -> Ordering {
        // total_cmp orders every bit pattern, so keys are equal exactly when all seven fields are
        // bit-identical.
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.total_cmp(b) {
                Ordering::Equal => continue,
                o => return o,
            }
        }

        Ordering::Equal
    }
}

impl PartialOrd for WeldKey {
    fn partial_cmp(&self, other: &WeldKey) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for WeldKey {
    fn eq(&self, other: &WeldKey) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WeldKey {}

/// An append-only set of welded vertices.
///
/// A vertex's position in the pool is its final index; entries are never removed or renumbered.
#[derive(Clone, Debug, Default)]
pub struct VertexPool {
    vertices: Vec<Vertex>,
    lookup: BTreeMap<WeldKey, u16>,
}

impl VertexPool {
    pub fn new() -> VertexPool {
        VertexPool {
            vertices: Vec::new(),
            lookup: BTreeMap::new(),
        }
    }

    /// Returns the index of a vertex equal to `vertex`, inserting it if none exists.
    ///
    /// Fails without modifying the pool if `vertex` is new and the pool already holds
    /// `MAX_POOL_VERTICES` entries.
    pub fn get_or_insert(&mut self, vertex: &Vertex) -> Result<u16, PoolFull> {
        let key = WeldKey::of(vertex);
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(index);
        }

        let index = self.vertices.len();
        if index >= MAX_POOL_VERTICES {
            return Err(PoolFull(MAX_POOL_VERTICES));
        }

        self.vertices.push(*vertex);
        self.lookup.insert(key, index as u16);
        Ok(index as u16)
    }

    /// Returns the index of a vertex equal to `vertex` without inserting it.
    pub fn find(&self, vertex: &Vertex) -> Option<u16> {
        self.lookup.get(&WeldKey::of(vertex)).cloned()
    }

    /// Returns the number of distinct entries `vertices` would add to the pool.
    pub fn count_new<'a, I>(&self, vertices: I) -> usize
    where
        I: IntoIterator<Item = &'a Vertex>,
    {
        let mut pending = BTreeSet::new();
        for vertex in vertices {
            let key = WeldKey::of(vertex);
            if !self.lookup.contains_key(&key) {
                pending.insert(key);
            }
        }

        pending.len()
    }

    /// Returns `true` if `count` more distinct vertices fit in the pool.
    pub fn has_room_for(&self, count: usize) -> bool {
        self.vertices.len() + count <= MAX_POOL_VERTICES
    }

    pub fn get(&self, index: u16) -> Option<&Vertex> {
        self.vertices.get(index as usize)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
