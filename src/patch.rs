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

//! Curved surface tessellation.
//!
//! A patch face stores a `width × height` grid of control vertices, row by row. Both dimensions
//! are odd and at least 3. The grid is a mesh of biquadratic Bézier patches that share their edge
//! rows and columns: patch `(px, py)` uses the 3×3 controls starting at column `2·px`, row `2·py`.

use crate::mesh::Vertex;

use cgmath::InnerSpace;

/// The number of segments each sub-patch is cut into along each axis.
pub const PATCH_SUBDIVISIONS: usize = 5;

/// A triangulated patch.
#[derive(Clone, Debug, Default)]
pub struct PatchSurface {
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
}

impl PatchSurface {
    /// Tessellates a control grid at the default subdivision level.
    pub fn new(controls: &[Vertex], width: usize, height: usize) -> PatchSurface {
        PatchSurface::with_subdivisions(controls, width, height, PATCH_SUBDIVISIONS)
    }

    /// Tessellates a control grid, cutting each sub-patch into `level × level` quads.
    ///
    /// Grids that cannot describe a patch (a dimension below 3 or even, fewer controls than
    /// `width × height`, or a zero level) produce an empty surface. Triangles that collapse to a
    /// line or point are left out.
    pub fn with_subdivisions(
        controls: &[Vertex],
        width: usize,
        height: usize,
        level: usize,
    ) -> PatchSurface {
        if !is_tessellatable(width, height)
            || level == 0
            || controls.len() < width * height
        {
            debug!("Degenerate {}x{} patch, skipping", width, height);
            return PatchSurface::default();
        }

        let patches_x = (width - 1) / 2;
        let patches_y = (height - 1) / 2;
        let cols = patches_x * level + 1;
        let rows = patches_y * level + 1;

        if cols * rows > std::u16::MAX as usize {
            warn!("{}x{} patch is too large to tessellate", width, height);
            return PatchSurface::default();
        }

        let mut vertices = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            let (py, v) = locate(row, level, patches_y);
            for col in 0..cols {
                let (px, u) = locate(col, level, patches_x);
                vertices.push(evaluate(controls, width, px, py, u, v));
            }
        }

        let mut indices = Vec::with_capacity((cols - 1) * (rows - 1) * 6);
        for row in 0..rows - 1 {
            for col in 0..cols - 1 {
                let v1 = (row * cols + col + 1) as u16;
                let v2 = v1 - 1;
                let v3 = v2 + cols as u16;
                let v4 = v3 + 1;

                for &tri in [[v2, v3, v1], [v1, v3, v4]].iter() {
                    if !is_collapsed(&vertices, tri) {
                        indices.extend_from_slice(&tri);
                    }
                }
            }
        }

        PatchSurface { vertices, indices }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns every triangle of the surface with its vertices resolved.
    pub fn triangles(&self) -> Vec<[Vertex; 3]> {
        self.indices
            .chunks(3)
            .map(|t| {
                [
                    self.vertices[t[0] as usize],
                    self.vertices[t[1] as usize],
                    self.vertices[t[2] as usize],
                ]
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Returns `true` if a `width × height` grid describes at least one biquadratic patch.
pub fn is_tessellatable(width: usize, height: usize) -> bool {
    width >= 3 && height >= 3 && width % 2 == 1 && height % 2 == 1
}

// maps a sample index along one axis to (sub-patch, parameter)
fn locate(sample: usize, level: usize, patches: usize) -> (usize, f32) {
    let patch = (sample / level).min(patches - 1);
    let t = (sample - patch * level) as f32 / level as f32;
    (patch, t)
}

fn bernstein(t: f32) -> [f32; 3] {
    let s = 1.0 - t;
    [s * s, 2.0 * s * t, t * t]
}

fn evaluate(controls: &[Vertex], width: usize, px: usize, py: usize, u: f32, v: f32) -> Vertex {
    let bu = bernstein(u);
    let bv = bernstein(v);

    let mut points = Vec::with_capacity(9);
    let mut weights = Vec::with_capacity(9);
    for j in 0..3 {
        for i in 0..3 {
            points.push(controls[(2 * py + j) * width + 2 * px + i]);
            weights.push(bu[i] * bv[j]);
        }
    }

    Vertex::blend(&points, &weights)
}

/// Twice-area squared below which a tessellated triangle counts as collapsed.
///
/// Blending nine controls leaves rounding noise of a few ulps, so coincident controls do not
/// produce bit-identical samples.
const COLLAPSE_EPSILON: f32 = 1e-12;

fn is_collapsed(vertices: &[Vertex], tri: [u16; 3]) -> bool {
    let a = vertices[tri[0] as usize].position;
    let b = vertices[tri[1] as usize].position;
    let c = vertices[tri[2] as usize].position;
    (b - a).cross(c - a).magnitude2() <= COLLAPSE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    use cgmath::{Vector2, Vector3};

    fn grid(width: usize, height: usize) -> Vec<Vertex> {
        let mut controls = Vec::new();
        for y in 0..height {
            for x in 0..width {
                controls.push(Vertex {
                    position: Vector3::new(x as f32, y as f32, 0.0),
                    texcoord: Vector2::new(x as f32 / (width - 1) as f32, y as f32 / (height - 1) as f32),
                    lightmap_texcoord: Vector2::new(0.0, 0.0),
                    normal: Vector3::new(0.0, 0.0, 1.0),
                    color: [255, 255, 255, 255],
                });
            }
        }
        controls
    }

    #[test]
    fn test_single_patch() {
        let surface = PatchSurface::new(&grid(3, 3), 3, 3);
        let n = PATCH_SUBDIVISIONS;
        assert_eq!(surface.vertices().len(), (n + 1) * (n + 1));
        assert_eq!(surface.triangle_count(), 2 * n * n);

        // corners interpolate the corner controls
        assert_eq!(surface.vertices()[0].position, Vector3::new(0.0, 0.0, 0.0));
        let last = surface.vertices()[(n + 1) * (n + 1) - 1];
        assert_eq!(last.position, Vector3::new(2.0, 2.0, 0.0));
        assert_eq!(last.texcoord, Vector2::new(1.0, 1.0));
    }

    #[test]
    fn test_shared_edges() {
        let surface = PatchSurface::with_subdivisions(&grid(5, 3), 5, 3, 2);

        // two patches side by side share a column of samples
        assert_eq!(surface.vertices().len(), 5 * 3);
        assert_eq!(surface.triangle_count(), 2 * 4 * 2);
        assert_eq!(surface.vertices()[2].position, Vector3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_indices_in_range() {
        let surface = PatchSurface::new(&grid(7, 5), 7, 5);
        let count = surface.vertices().len() as u16;
        assert!(surface.indices().iter().all(|&i| i < count));
        assert_eq!(surface.indices().len() % 3, 0);
    }

    #[test]
    fn test_degenerate_dimensions() {
        let controls = grid(3, 3);
        assert!(PatchSurface::new(&controls, 0, 3).is_empty());
        assert!(PatchSurface::new(&controls, 3, 0).is_empty());
        assert!(PatchSurface::new(&controls, 2, 2).is_empty());
        assert!(PatchSurface::new(&grid(4, 3), 4, 3).is_empty());

        // too few controls for the claimed grid
        assert!(PatchSurface::new(&controls, 3, 5).is_empty());
    }

    #[test]
    fn test_collapsed_controls() {
        let mut controls = grid(3, 3);
        for c in controls.iter_mut() {
            c.position = Vector3::new(1.0, 1.0, 1.0);
        }

        let surface = PatchSurface::new(&controls, 3, 3);
        assert!(surface.is_empty());
        assert!(surface.triangles().is_empty());
    }

    #[test]
    fn test_collapsed_row() {
        // the top row of controls meets at one point, so the triangles touching it vanish
        let mut controls = grid(3, 3);
        for c in controls[6..9].iter_mut() {
            c.position = Vector3::new(1.0, 2.0, 0.0);
        }

        let n = PATCH_SUBDIVISIONS;
        let surface = PatchSurface::new(&controls, 3, 3);
        assert_eq!(surface.triangle_count(), 2 * n * n - n);
        for [a, b, c] in surface.triangles() {
            let area2 = (b.position - a.position)
                .cross(c.position - a.position)
                .magnitude2();
            assert!(area2 > COLLAPSE_EPSILON);
        }
    }

    #[test]
    fn test_small_patch_keeps_triangles() {
        // one world unit across, after scaling
        let mut controls = grid(3, 3);
        for c in controls.iter_mut() {
            c.position /= 90.0;
        }

        let n = PATCH_SUBDIVISIONS;
        assert_eq!(PatchSurface::new(&controls, 3, 3).triangle_count(), 2 * n * n);
    }
}
