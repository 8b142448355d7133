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

use crate::{
    bsp::{BspData, BspError, BspErrorKind, BspFace, FaceKind, MAX_FACE_VERTICES},
    lightmap::LightmapNaming,
    mesh::{Mesh, Vertex},
    patch::PatchSurface,
    shader::MaterialResolver,
};

/// Triangles of one face, collected before any of them reach the mesh.
enum FaceGeometry {
    Empty,
    Direct(Vec<[Vertex; 3]>),
    Patch(PatchSurface),
}

impl FaceGeometry {
    fn triangles(self) -> Vec<[Vertex; 3]> {
        match self {
            FaceGeometry::Empty => Vec::new(),
            FaceGeometry::Direct(t) => t,
            FaceGeometry::Patch(p) => p.triangles(),
        }
    }
}

pub fn build(
    bsp: &BspData,
    face_id: usize,
    face: &BspFace,
    resolver: &mut dyn MaterialResolver,
    naming: &LightmapNaming,
    mesh: &mut Mesh,
) -> Result<usize, BspError> {
    match face.kind {
        FaceKind::Planar | FaceKind::TriangleSoup | FaceKind::Patch => (),
        FaceKind::Flare | FaceKind::Bad => {
            debug!("Skipping {:?} face {}", face.kind, face_id);
            return Ok(0);
        }
    }

    let vertices = face_vertices(bsp, face_id, face)?;

    // shader ids were validated on load
    let texture = &bsp.shaders[face.shader_id].name;
    let lightmap = face.lightmap_id.map(|l| naming.name(l));
    let resolution = resolver.resolve(texture, lightmap.as_ref().map(|s| s.as_str()));

    let geometry = match face.kind {
        FaceKind::Patch => tessellate(face_id, face, vertices)?,
        _ => direct_triangles(bsp, face_id, face, vertices)?,
    };

    let triangles = geometry.triangles();
    if triangles.is_empty() {
        return Ok(0);
    }

    mesh.add_triangles(&resolution.key, &triangles)?;
    mesh.set_textures(
        &resolution.key,
        &resolution.texture,
        resolution.lightmap.as_ref().map(|s| s.as_str()),
    );
    if let Some(material) = resolution.metadata {
        mesh.set_material(&resolution.key, material);
    }

    Ok(triangles.len())
}

fn malformed<S>(face_id: usize, reason: S) -> BspError
where
    S: AsRef<str>,
{
    BspErrorKind::malformed_face(face_id, reason).into()
}

fn face_vertices<'a>(
    bsp: &'a BspData,
    face_id: usize,
    face: &BspFace,
) -> Result<&'a [Vertex], BspError> {
    if face.vertex_count >= MAX_FACE_VERTICES {
        return Err(malformed(
            face_id,
            format!(
                "{} vertices reaches the limit of {}",
                face.vertex_count, MAX_FACE_VERTICES
            ),
        ));
    }

    let start = face.vertex_id;
    let end = start + face.vertex_count;
    if end > bsp.vertices.len() {
        return Err(malformed(
            face_id,
            format!(
                "vertices {}..{} out of range (have {})",
                start,
                end,
                bsp.vertices.len()
            ),
        ));
    }

    Ok(&bsp.vertices[start..end])
}

fn direct_triangles(
    bsp: &BspData,
    face_id: usize,
    face: &BspFace,
    vertices: &[Vertex],
) -> Result<FaceGeometry, BspError> {
    if face.element_count % 3 != 0 {
        return Err(malformed(
            face_id,
            format!(
                "element count {} is not a multiple of 3",
                face.element_count
            ),
        ));
    }

    let start = face.element_id;
    let end = start + face.element_count;
    if end > bsp.elements.len() {
        return Err(malformed(
            face_id,
            format!(
                "elements {}..{} out of range (have {})",
                start,
                end,
                bsp.elements.len()
            ),
        ));
    }

    let mut triangles = Vec::with_capacity(face.element_count / 3);
    for tri in bsp.elements[start..end].chunks(3) {
        let mut corners = [0usize; 3];
        for (corner, &e) in corners.iter_mut().zip(tri.iter()) {
            if e < 0 || e as usize >= vertices.len() {
                return Err(malformed(
                    face_id,
                    format!("element {} outside the face's {} vertices", e, vertices.len()),
                ));
            }

            *corner = e as usize;
        }

        triangles.push([
            vertices[corners[0]],
            vertices[corners[1]],
            vertices[corners[2]],
        ]);
    }

    Ok(FaceGeometry::Direct(triangles))
}

fn tessellate(
    face_id: usize,
    face: &BspFace,
    vertices: &[Vertex],
) -> Result<FaceGeometry, BspError> {
    let [width, height] = face.patch_size;

    if width == 0 || height == 0 {
        debug!("Patch face {} has an empty {}x{} grid", face_id, width, height);
        return Ok(FaceGeometry::Empty);
    }

    if width.saturating_mul(height) > vertices.len() {
        return Err(malformed(
            face_id,
            format!(
                "{}x{} control grid needs more than its {} vertices",
                width,
                height,
                vertices.len()
            ),
        ));
    }

    Ok(FaceGeometry::Patch(PatchSurface::new(vertices, width, height)))
}
