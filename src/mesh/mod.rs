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

//! Material-grouped indexed triangle meshes.
//!
//! # Structure
//!
//! A `Mesh` is a collection of `MeshSection`s, one per material key, kept in the order in which
//! each key was first seen. Every section owns a `VertexPool` and a flat list of `u16` indices,
//! three per triangle, into that pool.
//!
//! Triangles are added one face at a time through `Mesh::add_triangles`, which either emits every
//! triangle of the batch or none of them. A section that has to reject a batch for lack of vertex
//! room is closed: it keeps what it holds and refuses every later batch.

mod pool;

use std::{collections::HashMap, rc::Rc};

use crate::{math::Bounds, shader::MaterialMetadata};

use cgmath::{InnerSpace, Vector2, Vector3, Zero};

pub use self::pool::{PoolFull, VertexPool, MAX_POOL_VERTICES};

/// A vertex with two texture coordinate channels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vector3<f32>,

    /// Base texture coordinates.
    pub texcoord: Vector2<f32>,

    /// Lightmap atlas coordinates.
    pub lightmap_texcoord: Vector2<f32>,

    pub normal: Vector3<f32>,

    /// Packed RGBA color.
    pub color: [u8; 4],
}

impl Vertex {
    /// Returns the color as normalized RGB components.
    pub fn color_rgb(&self) -> [f32; 3] {
        [
            self.color[0] as f32 / 255.0,
            self.color[1] as f32 / 255.0,
            self.color[2] as f32 / 255.0,
        ]
    }

    /// Computes a weighted sum of vertices.
    ///
    /// Every attribute is blended with the same weights. The normal is renormalized if it is not
    /// zero and the color is rounded and clamped back into bytes.
    pub fn blend(vertices: &[Vertex], weights: &[f32]) -> Vertex {
        let mut position = Vector3::zero();
        let mut texcoord = Vector2::zero();
        let mut lightmap_texcoord = Vector2::zero();
        let mut normal = Vector3::zero();
        let mut color = [0.0f32; 4];

        for (v, &w) in vertices.iter().zip(weights.iter()) {
            position += v.position * w;
            texcoord += v.texcoord * w;
            lightmap_texcoord += v.lightmap_texcoord * w;
            normal += v.normal * w;
            for c in 0..4 {
                color[c] += v.color[c] as f32 * w;
            }
        }

        if normal.magnitude2() > 0.0 {
            normal = normal.normalize();
        }

        let mut packed = [0u8; 4];
        for c in 0..4 {
            packed[c] = color[c].round().max(0.0).min(255.0) as u8;
        }

        Vertex {
            position,
            texcoord,
            lightmap_texcoord,
            normal,
            color: packed,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum MeshError {
    #[fail(
        display = "Section {} would exceed the vertex limit of {}",
        section, limit
    )]
    CapacityExceeded { section: String, limit: usize },
}

/// The triangles of a mesh that share one material.
#[derive(Debug)]
pub struct MeshSection {
    key: String,
    texture: String,
    lightmap: Option<String>,
    bounds: Bounds,
    pool: VertexPool,
    indices: Vec<u16>,
    material: Option<Rc<MaterialMetadata>>,
}

impl MeshSection {
    fn new<S>(key: S) -> MeshSection
    where
        S: Into<String>,
    {
        let key: String = key.into();
        MeshSection {
            texture: key.clone(),
            key,
            lightmap: None,
            bounds: Bounds::empty(),
            pool: VertexPool::new(),
            indices: Vec::new(),
            material: None,
        }
    }

    /// Returns the material key shared by every triangle in this section.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the texture name the section is drawn with. Defaults to the key.
    pub fn texture(&self) -> &str {
        &self.texture
    }

    /// Returns the lightmap atlas name of the section, if its faces are lit.
    pub fn lightmap(&self) -> Option<&str> {
        self.lightmap.as_ref().map(|s| s.as_str())
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Returns the welded vertices of this section, in index order.
    pub fn vertices(&self) -> &[Vertex] {
        self.pool.vertices()
    }

    /// Returns the triangle index list, three indices per triangle.
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u16; 3]> + '_ {
        self.indices.chunks(3).map(|t| [t[0], t[1], t[2]])
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns the material metadata attached to this section, if the material was resolved.
    pub fn material(&self) -> Option<&MaterialMetadata> {
        self.material.as_ref().map(|m| m.as_ref())
    }

    pub fn set_material(&mut self, material: Rc<MaterialMetadata>) {
        self.material = Some(material);
    }

    /// Returns the number of distinct vertices the given triangles would add to this section.
    fn count_new(&self, triangles: &[[Vertex; 3]]) -> usize {
        self.pool.count_new(triangles.iter().flat_map(|t| t.iter()))
    }

    fn add_triangle(&mut self, triangle: &[Vertex; 3]) -> Result<(), MeshError> {
        let mut indices = [0u16; 3];
        for (i, vertex) in triangle.iter().enumerate() {
            indices[i] = self
                .pool
                .get_or_insert(vertex)
                .map_err(|PoolFull(limit)| MeshError::CapacityExceeded {
                    section: self.key.clone(),
                    limit,
                })?;
            self.bounds.extend(vertex.position);
        }

        self.indices.extend_from_slice(&indices);
        Ok(())
    }
}

/// A triangle mesh grouped by material key.
#[derive(Debug, Default)]
pub struct Mesh {
    sections: Vec<MeshSection>,
    section_ids: HashMap<String, usize>,

    // most recently used section, checked before the map
    last: Option<usize>,

    // keys of sections that ran out of vertex room, in the order they did
    full: Vec<String>,

    bounds: Bounds,
}

impl Mesh {
    pub fn new() -> Mesh {
        Mesh {
            sections: Vec::new(),
            section_ids: HashMap::new(),
            last: None,
            full: Vec::new(),
            bounds: Bounds::empty(),
        }
    }

    fn find_section_id(&self, key: &str) -> Option<usize> {
        if let Some(last) = self.last {
            if self.sections[last].key == key {
                return Some(last);
            }
        }

        self.section_ids.get(key).cloned()
    }

    fn section_id_or_insert(&mut self, key: &str) -> usize {
        let id = match self.find_section_id(key) {
            Some(id) => id,
            None => {
                let id = self.sections.len();
                debug!("New mesh section {}: {}", id, key);
                self.sections.push(MeshSection::new(key));
                self.section_ids.insert(key.to_owned(), id);
                id
            }
        };

        self.last = Some(id);
        id
    }

    /// Adds a single triangle to the section for `key`, creating the section if necessary.
    pub fn add_triangle(
        &mut self,
        key: &str,
        v1: &Vertex,
        v2: &Vertex,
        v3: &Vertex,
    ) -> Result<(), MeshError> {
        self.add_triangles(key, &[[*v1, *v2, *v3]])
    }

    /// Adds a batch of triangles to the section for `key`.
    ///
    /// The batch is checked against the section's vertex limit before anything is emitted: either
    /// every triangle is added or the mesh is left untouched. An empty batch does not create a
    /// section.
    ///
    /// Once a batch has been rejected for lack of room, the section refuses every later batch.
    pub fn add_triangles(&mut self, key: &str, triangles: &[[Vertex; 3]]) -> Result<(), MeshError> {
        if triangles.is_empty() {
            return Ok(());
        }

        if self.is_full(key) {
            return Err(MeshError::CapacityExceeded {
                section: key.to_owned(),
                limit: MAX_POOL_VERTICES,
            });
        }

        let (new_count, room) = match self.find_section_id(key) {
            Some(id) => {
                let section = &self.sections[id];
                let new_count = section.count_new(triangles);
                (new_count, section.pool.has_room_for(new_count))
            }

            None => {
                let new_count = VertexPool::new().count_new(triangles.iter().flat_map(|t| t.iter()));
                (new_count, new_count <= MAX_POOL_VERTICES)
            }
        };

        if !room {
            debug!(
                "Rejecting {} triangles ({} new vertices) for section {}",
                triangles.len(),
                new_count,
                key
            );
            self.full.push(key.to_owned());
            return Err(MeshError::CapacityExceeded {
                section: key.to_owned(),
                limit: MAX_POOL_VERTICES,
            });
        }

        let id = self.section_id_or_insert(key);
        for triangle in triangles {
            self.sections[id].add_triangle(triangle)?;
            for vertex in triangle.iter() {
                self.bounds.extend(vertex.position);
            }
        }

        Ok(())
    }

    /// Records the texture and lightmap names of the section for `key`, if that section exists.
    pub fn set_textures(&mut self, key: &str, texture: &str, lightmap: Option<&str>) {
        if let Some(id) = self.find_section_id(key) {
            let section = &mut self.sections[id];
            section.texture = texture.to_owned();
            section.lightmap = lightmap.map(|l| l.to_owned());
        }
    }

    /// Attaches material metadata to the section for `key`, if that section exists.
    pub fn set_material(&mut self, key: &str, material: Rc<MaterialMetadata>) {
        if let Some(id) = self.find_section_id(key) {
            self.sections[id].set_material(material);
        }
    }

    pub fn section(&self, key: &str) -> Option<&MeshSection> {
        self.find_section_id(key).map(|id| &self.sections[id])
    }

    /// Returns the sections of this mesh in order of first insertion.
    pub fn sections(&self) -> impl Iterator<Item = &MeshSection> {
        self.sections.iter()
    }

    /// Returns the number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Returns `true` if the section for `key` has been closed for lack of vertex room.
    pub fn is_full(&self, key: &str) -> bool {
        self.full.iter().any(|k| k == key)
    }

    /// Returns the keys of the sections closed for lack of vertex room.
    pub fn full_sections(&self) -> &[String] {
        &self.full
    }

    /// Returns the bounding box of every vertex added to the mesh.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.sections.iter().map(|s| s.triangle_count()).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.sections.iter().map(|s| s.vertices().len()).sum()
    }

    /// Welds every triangle of `other` into this mesh.
    ///
    /// Vertex indices of `other` are renumbered against this mesh's pools, so merging meshes built
    /// from disjoint sets of faces gives the same sections (up to index order) as building one mesh
    /// from all of them.
    pub fn merge(&mut self, other: Mesh) -> Result<(), MeshError> {
        for section in other.sections {
            let vertices = section.pool.vertices();
            let triangles: Vec<[Vertex; 3]> = section
                .triangles()
                .map(|t| {
                    [
                        vertices[t[0] as usize],
                        vertices[t[1] as usize],
                        vertices[t[2] as usize],
                    ]
                })
                .collect();

            self.add_triangles(&section.key, &triangles)?;

            if let Some(id) = self.find_section_id(&section.key) {
                let target = &mut self.sections[id];
                target.texture = section.texture;
                target.lightmap = section.lightmap;
                if target.material.is_none() {
                    target.material = section.material;
                }
            }
        }

        for key in other.full {
            if !self.is_full(&key) {
                self.full.push(key);
            }
        }

        Ok(())
    }
}
