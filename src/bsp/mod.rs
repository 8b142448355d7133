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

//! Quake III BSP file and data structure handling.
//!
//! # Data Structure
//!
//! The binary space partitioning tree, or BSP, is a space-partitioning data structure that lets a
//! level be split into convex regions. Each interior node holds a plane and two children, a front
//! child and a back child. Each child is either another node or a leaf.
//!
//! ## Nodes
//!
//! Both children of a node are stored as one signed integer. A non-negative child is the index of
//! another node; a negative child `c` is the leaf `-(c + 1)`. `resolve_child` is the only place
//! this encoding is interpreted.
//!
//! ## Leaves
//!
//! A leaf lists the faces visible inside it through a double indirection: its leaf-surface range
//! selects entries of the leaf-surface array, and those entries are face indices.
//!
//! ## Faces
//!
//! Faces come in four kinds. Planar faces and triangle soups index into the shared element
//! buffer, relative to the face's first vertex. Patches describe a grid of Bézier control
//! vertices that is tessellated on demand. Flares carry no geometry.
//!
//! # Mesh building
//!
//! `BspData::build_mesh` turns every face of the level into triangles grouped by material key.
//! `BspData::build_leaf_mesh` does the same for the faces of a single leaf.

pub mod error;
mod face;
mod load;
pub mod lump;
#[cfg(test)]
pub(crate) mod testutil;

use std::collections::HashSet;

use crate::{
    lightmap::{Lightmap, LightmapNaming},
    math::Bounds,
    mesh::{Mesh, Vertex},
    parse,
    shader::MaterialResolver,
};

use cgmath::Vector3;

pub use self::{
    error::{BspError, BspErrorKind},
    lump::{Header, LumpId, LumpView},
};

/// The bound on the number of vertices a single face may reference. Faces must stay below it.
pub const MAX_FACE_VERTICES: usize = 1024;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BspPlane {
    pub normal: Vector3<f32>,
    pub dist: f32,
}

/// A child of a BSP node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeRef {
    Node(usize),
    Leaf(usize),
}

/// Decodes a node child as stored in the file.
///
/// Non-negative values are node indices. A negative value `c` refers to leaf `-(c + 1)`.
pub fn resolve_child(child: i32) -> NodeRef {
    if child < 0 {
        // -(c + 1) == !c, and cannot overflow for i32::MIN
        NodeRef::Leaf((!child) as usize)
    } else {
        NodeRef::Node(child as usize)
    }
}

#[derive(Clone, Debug)]
pub struct BspNode {
    pub plane_id: usize,
    /// Front and back children, in that order.
    pub children: [NodeRef; 2],
    pub min: [i32; 3],
    pub max: [i32; 3],
}

impl BspNode {
    pub fn front(&self) -> NodeRef {
        self.children[0]
    }

    pub fn back(&self) -> NodeRef {
        self.children[1]
    }
}

#[derive(Clone, Debug)]
pub struct BspLeaf {
    pub cluster: i32,
    pub area: i32,
    pub min: [i32; 3],
    pub max: [i32; 3],
    pub leaf_surface_id: usize,
    pub leaf_surface_count: usize,
    pub leaf_brush_id: usize,
    pub leaf_brush_count: usize,
}

/// A model: the world (model 0) or one of the level's movable brush entities.
#[derive(Clone, Debug)]
pub struct BspModel {
    pub bounds: Bounds,
    pub face_id: usize,
    pub face_count: usize,
    pub brush_id: usize,
    pub brush_count: usize,
}

/// A shader reference: the material name of a set of faces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BspShader {
    pub name: String,
    pub surface_flags: i32,
    pub content_flags: i32,
}

impl BspShader {
    /// Returns the last path segment of the shader name, or `"null"` if it has none.
    pub fn texture_name(&self) -> &str {
        match self.name.rsplit('/').next() {
            Some(n) if !n.is_empty() => n,
            _ => "null",
        }
    }

    /// Returns the name of the script file expected to define this shader.
    pub fn script_file_name(&self) -> Option<String> {
        crate::shader::script_file_name(&self.name)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum FaceKind {
    Bad = 0,
    Planar = 1,
    Patch = 2,
    TriangleSoup = 3,
    Flare = 4,
}

#[derive(Clone, Debug)]
pub struct BspFace {
    pub shader_id: usize,
    pub fog_id: i32,
    pub kind: FaceKind,
    pub vertex_id: usize,
    pub vertex_count: usize,
    pub element_id: usize,
    pub element_count: usize,
    pub lightmap_id: Option<usize>,
    pub lightmap_offset: [i32; 2],
    pub lightmap_size: [i32; 2],
    pub lightmap_origin: Vector3<f32>,
    pub bounds: Bounds,
    pub normal: Vector3<f32>,
    /// Control grid width and height. Only meaningful for patches.
    pub patch_size: [usize; 2],
}

/// The raw text of one entity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entity {
    body: String,
}

impl Entity {
    pub fn new<S>(body: S) -> Entity
    where
        S: AsRef<str>,
    {
        Entity {
            body: body.as_ref().to_owned(),
        }
    }

    /// Returns the text between the entity's braces.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn pairs(&self) -> Vec<(&str, &str)> {
        parse::entity_pairs(&self.body)
    }

    /// Returns the value of the first occurrence of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs()
            .into_iter()
            .find(|&(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn classname(&self) -> Option<&str> {
        self.get("classname")
    }
}

/// A decoded level.
#[derive(Debug)]
pub struct BspData {
    pub(crate) entities: Vec<Entity>,
    pub(crate) shaders: Vec<BspShader>,
    pub(crate) planes: Vec<BspPlane>,
    pub(crate) nodes: Vec<BspNode>,
    pub(crate) leaves: Vec<BspLeaf>,
    pub(crate) leaf_surfaces: Vec<usize>,
    pub(crate) models: Vec<BspModel>,
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) elements: Vec<i32>,
    pub(crate) faces: Vec<BspFace>,
    pub(crate) lightmap_data: Vec<u8>,
}

impl BspData {
    /// Decodes a complete IBSP file.
    pub fn load(data: &[u8]) -> Result<BspData, BspError> {
        load::load(data)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn shaders(&self) -> &[BspShader] {
        &self.shaders
    }

    pub fn planes(&self) -> &[BspPlane] {
        &self.planes
    }

    pub fn nodes(&self) -> &[BspNode] {
        &self.nodes
    }

    pub fn leaves(&self) -> &[BspLeaf] {
        &self.leaves
    }

    pub fn leaf_surfaces(&self) -> &[usize] {
        &self.leaf_surfaces
    }

    pub fn models(&self) -> &[BspModel] {
        &self.models
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn elements(&self) -> &[i32] {
        &self.elements
    }

    pub fn faces(&self) -> &[BspFace] {
        &self.faces
    }

    /// Returns the root of the tree: node 0, or leaf 0 for a level with no nodes.
    pub fn root(&self) -> Option<NodeRef> {
        if !self.nodes.is_empty() {
            Some(NodeRef::Node(0))
        } else if !self.leaves.is_empty() {
            Some(NodeRef::Leaf(0))
        } else {
            None
        }
    }

    /// Returns the lightmap atlases stored in the level.
    pub fn lightmaps(&self) -> Vec<Lightmap> {
        Lightmap::slice_atlases(&self.lightmap_data)
    }

    /// Returns the face indices of leaf `leaf_id`.
    pub fn leaf_faces(&self, leaf_id: usize) -> Result<&[usize], BspError> {
        let leaf = match self.leaves.get(leaf_id) {
            Some(l) => l,
            None => return Err(BspErrorKind::NoSuchLeaf { leaf: leaf_id }.into()),
        };

        // ranges were validated on load
        let start = leaf.leaf_surface_id;
        Ok(&self.leaf_surfaces[start..start + leaf.leaf_surface_count])
    }

    /// Returns the leaves reachable from the root, front children first.
    ///
    /// Fails if any node is reachable along more than one path.
    pub fn leaves_in_tree(&self) -> Result<Vec<usize>, BspError> {
        let mut leaves = Vec::new();
        let mut visited = HashSet::new();

        let mut stack = Vec::new();
        stack.extend(self.root());

        while let Some(r) = stack.pop() {
            match r {
                NodeRef::Leaf(l) => leaves.push(l),
                NodeRef::Node(n) => {
                    if !visited.insert(n) {
                        return Err(BspErrorKind::CyclicTree { node: n }.into());
                    }

                    let node = &self.nodes[n];
                    stack.push(node.back());
                    stack.push(node.front());
                }
            }
        }

        Ok(leaves)
    }

    /// Builds a mesh from every face of the level.
    pub fn build_mesh(
        &self,
        resolver: &mut dyn MaterialResolver,
        naming: &LightmapNaming,
    ) -> Result<Mesh, BspError> {
        self.build_faces(0..self.faces.len(), resolver, naming)
    }

    /// Builds a mesh from the faces of one leaf, bypassing the tree.
    pub fn build_leaf_mesh(
        &self,
        leaf_id: usize,
        resolver: &mut dyn MaterialResolver,
        naming: &LightmapNaming,
    ) -> Result<Mesh, BspError> {
        let faces = self.leaf_faces(leaf_id)?;
        self.build_faces(faces.iter().cloned(), resolver, naming)
    }

    /// Builds a mesh from the given faces, in order.
    ///
    /// A section that runs out of vertex room is closed and the faces it would have received are
    /// dropped with a warning. The mesh lists such sections in `Mesh::full_sections`. Every other
    /// error aborts the build.
    pub fn build_faces<I>(
        &self,
        face_ids: I,
        resolver: &mut dyn MaterialResolver,
        naming: &LightmapNaming,
    ) -> Result<Mesh, BspError>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut mesh = Mesh::new();
        for face_id in face_ids {
            if let Err(e) = self.build_face(face_id, resolver, naming, &mut mesh) {
                match e.kind() {
                    BspErrorKind::CapacityExceeded { section } => {
                        warn!("Dropping face {}: section {} is full", face_id, section)
                    }
                    _ => return Err(e),
                }
            }
        }

        debug!(
            "Built mesh: {} sections, {} triangles, {} vertices",
            mesh.len(),
            mesh.triangle_count(),
            mesh.vertex_count()
        );

        Ok(mesh)
    }

    /// Adds the triangles of one face to `mesh`, returning how many were added.
    ///
    /// Either every triangle of the face is added or, on error, none is.
    pub fn build_face(
        &self,
        face_id: usize,
        resolver: &mut dyn MaterialResolver,
        naming: &LightmapNaming,
        mesh: &mut Mesh,
    ) -> Result<usize, BspError> {
        match self.faces.get(face_id) {
            Some(face) => face::build(self, face_id, face, resolver, naming, mesh),
            None => Err(BspErrorKind::NoSuchFace { face: face_id }.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        bsp::testutil::{BspBuilder, FaceRecord},
        shader::ShaderLibrary,
    };

    // one plane, one leaf holding one planar face made of one triangle
    fn single_triangle() -> BspBuilder {
        let mut b = BspBuilder::new();
        b.plane([0.0, 1.0, 0.0], 0.0)
            .leaf(0, 1)
            .leaf_surface(0)
            .shader("textures/base_wall/concrete")
            .vertex([0.0, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0])
            .vertex([45.0, 0.0, 0.0], [1.0, 0.0], [0.5, 0.0])
            .vertex([0.0, 45.0, 0.0], [0.0, 1.0], [0.0, 0.5])
            .elements(&[0, 1, 2])
            .face(FaceRecord::planar(0, 0, 3, 0, 3));
        b
    }

    #[test]
    fn test_resolve_child() {
        assert_eq!(resolve_child(0), NodeRef::Node(0));
        assert_eq!(resolve_child(7), NodeRef::Node(7));
        assert_eq!(resolve_child(-1), NodeRef::Leaf(0));
        assert_eq!(resolve_child(-8), NodeRef::Leaf(7));
        assert_eq!(
            resolve_child(std::i32::MIN),
            NodeRef::Leaf(std::i32::MAX as usize)
        );

        for c in -100..100 {
            match resolve_child(c) {
                NodeRef::Leaf(l) => {
                    assert!(c < 0);
                    assert_eq!(l as i32, -(c + 1));
                }
                NodeRef::Node(n) => {
                    assert!(c >= 0);
                    assert_eq!(n as i32, c);
                }
            }
        }
    }

    #[test]
    fn test_single_triangle_round_trip() {
        let data = single_triangle().build();
        let bsp = BspData::load(&data).unwrap();
        assert_eq!(bsp.planes().len(), 1);
        assert_eq!(bsp.leaves().len(), 1);
        assert_eq!(bsp.leaf_faces(0).unwrap(), &[0]);

        let mut lib = ShaderLibrary::new();
        let mesh = bsp.build_mesh(&mut lib, &LightmapNaming::default()).unwrap();
        assert_eq!(mesh.len(), 1);
        assert_eq!(mesh.triangle_count(), 1);

        let section = mesh.section("textures/base_wall/concrete").unwrap();
        assert_eq!(section.vertices().len(), 3);
        assert_eq!(section.indices(), &[0, 1, 2]);
        assert!(section.material().is_none());

        // positions are scaled and have their Y axis inverted
        assert_eq!(section.vertices()[1].position, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(section.vertices()[2].position, Vector3::new(0.0, -1.0, 0.0));
        assert_eq!(mesh.bounds().min, Vector3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_leaf_mesh_matches_level_mesh() {
        let data = single_triangle().build();
        let bsp = BspData::load(&data).unwrap();
        let mut lib = ShaderLibrary::new();

        assert_eq!(bsp.leaves_in_tree().unwrap(), vec![0]);
        let mesh = bsp
            .build_leaf_mesh(0, &mut lib, &LightmapNaming::default())
            .unwrap();
        assert_eq!(mesh.triangle_count(), 1);

        match bsp
            .build_leaf_mesh(1, &mut lib, &LightmapNaming::default())
            .unwrap_err()
            .kind()
        {
            BspErrorKind::NoSuchLeaf { leaf } => assert_eq!(*leaf, 1),
            k => panic!("unexpected error {:?}", k),
        }
    }

    #[test]
    fn test_shared_vertices_are_welded() {
        let mut b = single_triangle();
        // a second face over the same three vertices
        b.elements(&[2, 1, 0]).face(FaceRecord::planar(0, 0, 3, 3, 3));

        let bsp = BspData::load(&b.build()).unwrap();
        let mesh = bsp
            .build_mesh(&mut ShaderLibrary::new(), &LightmapNaming::default())
            .unwrap();
        assert_eq!(mesh.len(), 1);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn test_lightmapped_faces_get_their_own_section() {
        let mut b = single_triangle();
        let mut lit = FaceRecord::planar(0, 0, 3, 0, 3);
        lit.lightmap = 2;
        b.face(lit);

        let bsp = BspData::load(&b.build()).unwrap();
        let naming = LightmapNaming::new("", "dm1");
        let mesh = bsp.build_mesh(&mut ShaderLibrary::new(), &naming).unwrap();

        let keys: Vec<_> = mesh.sections().map(|s| s.key()).collect();
        assert_eq!(
            keys,
            vec![
                "textures/base_wall/concrete",
                "textures/base_wall/concrete+lmdm102"
            ]
        );
    }

    #[test]
    fn test_bad_element_count_emits_nothing() {
        let mut b = BspBuilder::new();
        b.shader("textures/a/b")
            .vertex([0.0, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0])
            .vertex([1.0, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0])
            .vertex([0.0, 1.0, 0.0], [0.0, 0.0], [0.0, 0.0])
            .elements(&[0, 1, 2, 0])
            .face(FaceRecord::planar(0, 0, 3, 0, 4));

        let bsp = BspData::load(&b.build()).unwrap();
        let mut mesh = Mesh::new();
        let err = bsp
            .build_face(
                0,
                &mut ShaderLibrary::new(),
                &LightmapNaming::default(),
                &mut mesh,
            )
            .unwrap_err();

        match err.kind() {
            BspErrorKind::MalformedFace { face, .. } => assert_eq!(*face, 0),
            k => panic!("unexpected error {:?}", k),
        }
        assert!(mesh.is_empty());
        assert_eq!(mesh.triangle_count(), 0);
    }

    // builds face 0 of `b`, expecting it to be rejected without touching the mesh
    fn assert_malformed(b: &BspBuilder, reason: &str) {
        let bsp = BspData::load(&b.build()).unwrap();
        let mut mesh = Mesh::new();
        let err = bsp
            .build_face(
                0,
                &mut ShaderLibrary::new(),
                &LightmapNaming::default(),
                &mut mesh,
            )
            .unwrap_err();

        match err.kind() {
            BspErrorKind::MalformedFace { face, reason: r } => {
                assert_eq!(*face, 0);
                assert!(r.contains(reason), "{:?} does not mention {:?}", r, reason);
            }
            k => panic!("unexpected error {:?}", k),
        }
        assert!(mesh.is_empty());
        assert_eq!(mesh.triangle_count(), 0);
    }

    fn vertices(b: &mut BspBuilder, count: usize) {
        for i in 0..count {
            b.vertex([i as f32, (i % 2) as f32, 0.0], [0.0, 0.0], [0.0, 0.0]);
        }
    }

    #[test]
    fn test_face_vertex_limit() {
        let mut b = BspBuilder::new();
        b.shader("textures/a/b").elements(&[0, 1, 2]);
        vertices(&mut b, MAX_FACE_VERTICES);
        b.face(FaceRecord::planar(0, 0, MAX_FACE_VERTICES, 0, 3));
        assert_malformed(&b, "limit");

        // one below the limit is accepted
        let mut b = BspBuilder::new();
        b.shader("textures/a/b").elements(&[0, 1, 2]);
        vertices(&mut b, MAX_FACE_VERTICES - 1);
        b.face(FaceRecord::planar(0, 0, MAX_FACE_VERTICES - 1, 0, 3));
        let bsp = BspData::load(&b.build()).unwrap();
        let mesh = bsp
            .build_mesh(&mut ShaderLibrary::new(), &LightmapNaming::default())
            .unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_face_vertices_out_of_range() {
        let mut b = BspBuilder::new();
        b.shader("textures/a/b").elements(&[0, 1, 2]);
        vertices(&mut b, 3);
        b.face(FaceRecord::planar(0, 1, 3, 0, 3));
        assert_malformed(&b, "vertices 1..4");
    }

    #[test]
    fn test_face_elements_out_of_range() {
        let mut b = BspBuilder::new();
        b.shader("textures/a/b").elements(&[0, 1, 2]);
        vertices(&mut b, 3);
        b.face(FaceRecord::planar(0, 0, 3, 0, 6));
        assert_malformed(&b, "elements 0..6");
    }

    #[test]
    fn test_negative_element() {
        let mut b = BspBuilder::new();
        b.shader("textures/a/b").elements(&[0, 1, 2, 0, -1, 2]);
        vertices(&mut b, 3);
        b.face(FaceRecord::planar(0, 0, 3, 0, 6));
        assert_malformed(&b, "element -1");
    }

    #[test]
    fn test_element_outside_face() {
        // index 3 exists in the vertex lump but lies past this face's three vertices
        let mut b = BspBuilder::new();
        b.shader("textures/a/b").elements(&[0, 1, 3]);
        vertices(&mut b, 4);
        b.face(FaceRecord::planar(0, 0, 3, 0, 3));
        assert_malformed(&b, "element 3");
    }

    #[test]
    fn test_patch_grid_too_large() {
        let mut b = BspBuilder::new();
        b.shader("textures/a/curve");
        vertices(&mut b, 9);
        b.face(FaceRecord::patch(0, 0, 9, 3, 5));
        assert_malformed(&b, "3x5");
    }

    #[test]
    fn test_plus_in_texture_name() {
        let mut b = BspBuilder::new();
        b.shader("textures/sfx/+0fire")
            .vertex([0.0, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0])
            .vertex([45.0, 0.0, 0.0], [1.0, 0.0], [0.0, 0.0])
            .vertex([0.0, 45.0, 0.0], [0.0, 1.0], [0.0, 0.0])
            .elements(&[0, 1, 2])
            .face(FaceRecord::planar(0, 0, 3, 0, 3));
        let mut lit = FaceRecord::planar(0, 0, 3, 0, 3);
        lit.lightmap = 1;
        b.face(lit);

        let bsp = BspData::load(&b.build()).unwrap();
        let mesh = bsp
            .build_mesh(&mut ShaderLibrary::new(), &LightmapNaming::new("", "x"))
            .unwrap();

        let unlit = mesh.section("textures/sfx/+0fire").unwrap();
        assert_eq!(unlit.texture(), "textures/sfx/+0fire");
        assert_eq!(unlit.lightmap(), None);

        let lit = mesh.section("textures/sfx/+0fire+lmx01").unwrap();
        assert_eq!(lit.texture(), "textures/sfx/+0fire");
        assert_eq!(lit.lightmap(), Some("lmx01"));
    }

    #[test]
    fn test_zero_sized_patch_is_empty() {
        for &(w, h) in [(0, 3), (3, 0), (0, 0)].iter() {
            let mut b = BspBuilder::new();
            b.shader("textures/a/curve")
                .vertex([0.0, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0])
                .face(FaceRecord::patch(0, 0, 1, w, h));

            let bsp = BspData::load(&b.build()).unwrap();
            let mesh = bsp
                .build_mesh(&mut ShaderLibrary::new(), &LightmapNaming::default())
                .unwrap();
            assert_eq!(mesh.triangle_count(), 0);
            assert!(mesh.is_empty());
        }
    }

    #[test]
    fn test_patch_face() {
        let mut b = BspBuilder::new();
        b.shader("textures/a/curve");
        for y in 0..3 {
            for x in 0..3 {
                let p = [x as f32 * 45.0, y as f32 * 45.0, 0.0];
                b.vertex(p, [x as f32 / 2.0, y as f32 / 2.0], [0.0, 0.0]);
            }
        }
        b.face(FaceRecord::patch(0, 0, 9, 3, 3));

        let bsp = BspData::load(&b.build()).unwrap();
        let mesh = bsp
            .build_mesh(&mut ShaderLibrary::new(), &LightmapNaming::default())
            .unwrap();

        let n = crate::patch::PATCH_SUBDIVISIONS;
        assert_eq!(mesh.triangle_count(), 2 * n * n);
        assert_eq!(mesh.vertex_count(), (n + 1) * (n + 1));
    }

    #[test]
    fn test_flare_is_skipped() {
        let mut b = single_triangle();
        let mut flare = FaceRecord::planar(0, 0, 3, 0, 3);
        flare.kind = FaceKind::Flare as i32;
        b.face(flare);

        let bsp = BspData::load(&b.build()).unwrap();
        let mut mesh = Mesh::new();
        let added = bsp
            .build_face(
                1,
                &mut ShaderLibrary::new(),
                &LightmapNaming::default(),
                &mut mesh,
            )
            .unwrap();
        assert_eq!(added, 0);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_section_capacity() {
        // 21846 triangles with no shared corners need 65538 vertices
        let triangles = crate::mesh::MAX_POOL_VERTICES / 3 + 1;

        let mut b = BspBuilder::new();
        b.shader("textures/a/big").shader("textures/a/small");
        for i in 0..triangles * 3 {
            b.vertex([i as f32, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0]);
        }

        // one face per triangle, each indexing its own three vertices
        b.elements(&[0, 1, 2]);
        for t in 0..triangles {
            b.face(FaceRecord::planar(0, t * 3, 3, 0, 3));
        }

        // faces of another material after the overflow, and one more for the full section
        b.face(FaceRecord::planar(1, 0, 3, 0, 3));
        b.face(FaceRecord::planar(0, 0, 3, 0, 3));

        let bsp = BspData::load(&b.build()).unwrap();
        let mut lib = ShaderLibrary::new();
        let naming = LightmapNaming::default();
        let mut mesh = bsp.build_mesh(&mut lib, &naming).unwrap();

        assert_eq!(mesh.full_sections(), &["textures/a/big".to_owned()]);
        assert_eq!(
            mesh.section("textures/a/big").unwrap().triangle_count(),
            triangles - 1
        );
        assert_eq!(mesh.section("textures/a/small").unwrap().triangle_count(), 1);

        // the face that did not fit still reports the section
        let err = bsp
            .build_face(triangles - 1, &mut lib, &naming, &mut mesh)
            .unwrap_err();
        match err.kind() {
            BspErrorKind::CapacityExceeded { section } => assert_eq!(section, "textures/a/big"),
            k => panic!("unexpected error {:?}", k),
        }
    }

    #[test]
    fn test_malformed_face_aborts_mesh() {
        let mut b = single_triangle();
        b.face(FaceRecord::planar(0, 0, 3, 0, 4));

        let bsp = BspData::load(&b.build()).unwrap();
        let err = bsp
            .build_mesh(&mut ShaderLibrary::new(), &LightmapNaming::default())
            .unwrap_err();
        match err.kind() {
            BspErrorKind::MalformedFace { face, .. } => assert_eq!(*face, 1),
            k => panic!("unexpected error {:?}", k),
        }
    }

    #[test]
    fn test_tree_traversal() {
        // node 0 splits into node 1 (front) and leaf 2 (back); node 1 holds leaves 0 and 1
        let mut b = BspBuilder::new();
        b.plane([1.0, 0.0, 0.0], 0.0)
            .plane([0.0, 1.0, 0.0], 0.0)
            .node(0, 1, -3)
            .node(1, -1, -2)
            .leaf(0, 0)
            .leaf(0, 0)
            .leaf(0, 0);

        let bsp = BspData::load(&b.build()).unwrap();
        assert_eq!(bsp.root(), Some(NodeRef::Node(0)));
        assert_eq!(bsp.leaves_in_tree().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_cyclic_tree() {
        let mut b = BspBuilder::new();
        b.plane([1.0, 0.0, 0.0], 0.0)
            .node(0, 1, -1)
            .node(0, 0, -1)
            .leaf(0, 0);

        let bsp = BspData::load(&b.build()).unwrap();
        match bsp.leaves_in_tree().unwrap_err().kind() {
            BspErrorKind::CyclicTree { node } => assert_eq!(*node, 0),
            k => panic!("unexpected error {:?}", k),
        }
    }

    #[test]
    fn test_shader_names() {
        let shader = BspShader {
            name: "textures/base_wall/concrete".to_owned(),
            surface_flags: 0,
            content_flags: 1,
        };
        assert_eq!(shader.texture_name(), "concrete");
        assert_eq!(
            shader.script_file_name(),
            Some("base_wall.shader".to_owned())
        );

        let bare = BspShader {
            name: "textures/".to_owned(),
            surface_flags: 0,
            content_flags: 0,
        };
        assert_eq!(bare.texture_name(), "null");
    }

    #[test]
    fn test_entity_get() {
        let e = Entity::new("\n\"classname\" \"light\"\n\"light\" \"300\"\n");
        assert_eq!(e.classname(), Some("light"));
        assert_eq!(e.get("light"), Some("300"));
        assert_eq!(e.get("origin"), None);
    }
}
