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

use std::io::Read;

use crate::{
    bsp::{
        resolve_child, BspData, BspError, BspErrorKind, BspFace, BspLeaf, BspModel, BspNode,
        BspPlane, BspShader, Entity, FaceKind, Header, LumpId, LumpView, NodeRef,
    },
    math::{self, Bounds},
    mesh::Vertex,
    parse::entity::entity_bodies,
};

use byteorder::{LittleEndian, ReadBytesExt};
use cgmath::{Vector2, Vector3};
use failure::Error;
use num_traits::FromPrimitive;

const SHADER_NAME_MAX: usize = 64;

fn read_vector3<R>(reader: &mut R) -> Result<Vector3<f32>, Error>
where
    R: ReadBytesExt,
{
    Ok(Vector3::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ))
}

fn read_i32x3<R>(reader: &mut R) -> Result<[i32; 3], Error>
where
    R: ReadBytesExt,
{
    Ok([
        reader.read_i32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
    ])
}

// reads an index or count, which must not be negative
fn read_usize<R>(reader: &mut R, what: &str) -> Result<usize, Error>
where
    R: ReadBytesExt,
{
    let value = reader.read_i32::<LittleEndian>()?;
    ensure!(value >= 0, "Invalid {} ({})", what, value);
    Ok(value as usize)
}

// checks that [first, first + count) lies within a list of `len` items
fn check_range(what: &str, first: usize, count: usize, len: usize) -> Result<(), Error> {
    ensure!(
        first + count <= len,
        "{} range {}..{} out of bounds (have {})",
        what,
        first,
        first + count,
        len
    );

    Ok(())
}

fn load_shader<R>(reader: &mut R) -> Result<BspShader, Error>
where
    R: ReadBytesExt,
{
    let mut name_bytes = [0u8; SHADER_NAME_MAX];
    reader.read_exact(&mut name_bytes)?;
    let len = name_bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(SHADER_NAME_MAX);
    let name = String::from_utf8(name_bytes[..len].to_vec())?;

    let surface_flags = reader.read_i32::<LittleEndian>()?;
    let content_flags = reader.read_i32::<LittleEndian>()?;

    Ok(BspShader {
        name,
        surface_flags,
        content_flags,
    })
}

fn load_plane<R>(reader: &mut R) -> Result<BspPlane, Error>
where
    R: ReadBytesExt,
{
    let normal = read_vector3(reader)?;
    let dist = reader.read_f32::<LittleEndian>()?;
    Ok(BspPlane { normal, dist })
}

fn load_node<R>(
    reader: &mut R,
    plane_count: usize,
    node_count: usize,
    leaf_count: usize,
) -> Result<BspNode, Error>
where
    R: ReadBytesExt,
{
    let plane_id = read_usize(reader, "plane id")?;
    ensure!(plane_id < plane_count, "Invalid plane id {}", plane_id);

    let mut children = [NodeRef::Node(0); 2];
    for child in children.iter_mut() {
        *child = resolve_child(reader.read_i32::<LittleEndian>()?);
        match *child {
            NodeRef::Node(n) => {
                ensure!(n < node_count, "Invalid child node {}", n);
            }
            NodeRef::Leaf(l) => {
                ensure!(l < leaf_count, "Invalid child leaf {}", l);
            }
        }
    }

    let min = read_i32x3(reader)?;
    let max = read_i32x3(reader)?;

    Ok(BspNode {
        plane_id,
        children,
        min,
        max,
    })
}

fn load_leaf<R>(
    reader: &mut R,
    leaf_surface_total: usize,
    leaf_brush_total: usize,
) -> Result<BspLeaf, Error>
where
    R: ReadBytesExt,
{
    let cluster = reader.read_i32::<LittleEndian>()?;
    let area = reader.read_i32::<LittleEndian>()?;
    let min = read_i32x3(reader)?;
    let max = read_i32x3(reader)?;

    let leaf_surface_id = read_usize(reader, "leaf surface id")?;
    let leaf_surface_count = read_usize(reader, "leaf surface count")?;
    check_range(
        "Leaf surface",
        leaf_surface_id,
        leaf_surface_count,
        leaf_surface_total,
    )?;

    let leaf_brush_id = read_usize(reader, "leaf brush id")?;
    let leaf_brush_count = read_usize(reader, "leaf brush count")?;
    check_range("Leaf brush", leaf_brush_id, leaf_brush_count, leaf_brush_total)?;

    Ok(BspLeaf {
        cluster,
        area,
        min,
        max,
        leaf_surface_id,
        leaf_surface_count,
        leaf_brush_id,
        leaf_brush_count,
    })
}

fn load_leaf_surface<R>(reader: &mut R, face_count: usize) -> Result<usize, Error>
where
    R: ReadBytesExt,
{
    let face_id = read_usize(reader, "face id")?;
    ensure!(face_id < face_count, "Invalid face id {}", face_id);
    Ok(face_id)
}

fn load_model<R>(reader: &mut R) -> Result<BspModel, Error>
where
    R: ReadBytesExt,
{
    let min = read_vector3(reader)?;
    let max = read_vector3(reader)?;
    let face_id = read_usize(reader, "face id")?;
    let face_count = read_usize(reader, "face count")?;
    let brush_id = read_usize(reader, "brush id")?;
    let brush_count = read_usize(reader, "brush count")?;

    Ok(BspModel {
        bounds: Bounds::new(min, max),
        face_id,
        face_count,
        brush_id,
        brush_count,
    })
}

fn load_vertex<R>(reader: &mut R) -> Result<Vertex, Error>
where
    R: ReadBytesExt,
{
    let position = math::map_position(read_vector3(reader)?);
    let texcoord = Vector2::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    );
    let lightmap_texcoord = Vector2::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    );
    let normal = read_vector3(reader)?;

    let mut color = [0u8; 4];
    reader.read_exact(&mut color)?;

    Ok(Vertex {
        position,
        texcoord,
        lightmap_texcoord,
        normal,
        color,
    })
}

fn load_face<R>(reader: &mut R, shader_count: usize) -> Result<BspFace, Error>
where
    R: ReadBytesExt,
{
    let shader_id = read_usize(reader, "shader id")?;
    ensure!(shader_id < shader_count, "Invalid shader id {}", shader_id);

    let fog_id = reader.read_i32::<LittleEndian>()?;

    let kind_id = reader.read_i32::<LittleEndian>()?;
    let kind = match FaceKind::from_i32(kind_id) {
        Some(k) => k,
        None => bail!("Unknown face type {}", kind_id),
    };

    let vertex_id = read_usize(reader, "vertex id")?;
    let vertex_count = read_usize(reader, "vertex count")?;
    let element_id = read_usize(reader, "element id")?;
    let element_count = read_usize(reader, "element count")?;

    let lightmap_id = match reader.read_i32::<LittleEndian>()? {
        l if l < 0 => None,
        l => Some(l as usize),
    };

    let lightmap_offset = [
        reader.read_i32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
    ];
    let lightmap_size = [
        reader.read_i32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
    ];
    let lightmap_origin = read_vector3(reader)?;

    let min = read_vector3(reader)?;
    let max = read_vector3(reader)?;
    let normal = read_vector3(reader)?;

    let patch_size = [
        read_usize(reader, "patch width")?,
        read_usize(reader, "patch height")?,
    ];

    Ok(BspFace {
        shader_id,
        fog_id,
        kind,
        vertex_id,
        vertex_count,
        element_id,
        element_count,
        lightmap_id,
        lightmap_offset,
        lightmap_size,
        lightmap_origin,
        bounds: Bounds::new(min, max),
        normal,
        patch_size,
    })
}

fn load_entities(view: LumpView) -> Vec<Entity> {
    let text = String::from_utf8_lossy(view.data);
    entity_bodies(text.trim_end_matches('\0'))
        .into_iter()
        .map(Entity::new)
        .collect()
}

// decodes every record of a lump, attributing any failure to the lump
fn load_records<T, F>(view: LumpView, mut load_fn: F) -> Result<Vec<T>, BspError>
where
    F: FnMut(&mut &[u8]) -> Result<T, Error>,
{
    let mut records = Vec::with_capacity(view.count);
    for (i, mut record) in view.records().enumerate() {
        match load_fn(&mut record) {
            Ok(r) => records.push(r),
            Err(e) => {
                let reason = format!("record {}: {}", i, e);
                return Err(e
                    .context(BspErrorKind::malformed_lump(view.id, reason))
                    .into());
            }
        }
    }

    debug!("{:?}: {} records", view.id, records.len());
    Ok(records)
}

/// Load a BSP file, returning its decoded contents.
///
/// Every lump is validated against the file size and its record size before any record is
/// decoded.
pub fn load(data: &[u8]) -> Result<BspData, BspError> {
    let header = Header::parse(data)?;

    let mut views = Vec::new();
    for id in LumpId::all() {
        views.push(header.view(id, data)?);
    }
    let view = |id: LumpId| views[id as usize];

    let plane_count = view(LumpId::Planes).count;
    let node_count = view(LumpId::Nodes).count;
    let leaf_count = view(LumpId::Leaves).count;
    let leaf_surface_total = view(LumpId::LeafSurfaces).count;
    let leaf_brush_total = view(LumpId::LeafBrushes).count;
    let face_count = view(LumpId::Faces).count;
    let shader_count = view(LumpId::Shaders).count;

    let entities = load_entities(view(LumpId::Entities));
    let shaders = load_records(view(LumpId::Shaders), |r| load_shader(r))?;
    let planes = load_records(view(LumpId::Planes), |r| load_plane(r))?;
    let nodes = load_records(view(LumpId::Nodes), |r| {
        load_node(r, plane_count, node_count, leaf_count)
    })?;
    let leaves = load_records(view(LumpId::Leaves), |r| {
        load_leaf(r, leaf_surface_total, leaf_brush_total)
    })?;
    let leaf_surfaces = load_records(view(LumpId::LeafSurfaces), |r| {
        load_leaf_surface(r, face_count)
    })?;
    let models = load_records(view(LumpId::Models), |r| load_model(r))?;
    let vertices = load_records(view(LumpId::Vertices), |r| load_vertex(r))?;
    let elements = load_records(view(LumpId::Elements), |r| {
        Ok(r.read_i32::<LittleEndian>()?)
    })?;
    let faces = load_records(view(LumpId::Faces), |r| load_face(r, shader_count))?;
    let lightmap_data = view(LumpId::Lightmaps).data.to_vec();

    info!(
        "Loaded BSP: {} entities, {} shaders, {} nodes, {} leaves, {} faces, {} vertices",
        entities.len(),
        shaders.len(),
        nodes.len(),
        leaves.len(),
        faces.len(),
        vertices.len()
    );

    Ok(BspData {
        entities,
        shaders,
        planes,
        nodes,
        leaves,
        leaf_surfaces,
        models,
        vertices,
        elements,
        faces,
        lightmap_data,
    })
}
