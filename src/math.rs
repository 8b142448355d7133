// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Coordinate conventions and bounding volumes.
//!
//! Quake III stores positions in world units with Z up. Positions are scaled down by a factor of
//! 45 and have their Y axis inverted as they are read from the file (see `map_position`). The
//! exporters additionally swap Y and Z when writing scene files, which is what `map_vertex` and
//! `map_vector` do for values that did not pass through the loader.

use cgmath::Vector3;

/// The number of world units per target unit.
pub const WORLD_UNITS_PER_UNIT: f32 = 45.0;

/// The scale factor applied to world-space positions on ingestion.
pub const WORLD_SCALE: f32 = 1.0 / WORLD_UNITS_PER_UNIT;

/// Converts a world-space position into target units: `(x·s, -y·s, z·s)`.
pub fn map_position(pos: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(pos.x * WORLD_SCALE, -pos.y * WORLD_SCALE, pos.z * WORLD_SCALE)
}

/// Converts a raw world-space point (e.g. an entity origin) into Y-up scene coordinates.
pub fn map_vertex(v: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(v.x * WORLD_SCALE, v.z * WORLD_SCALE, -v.y * WORLD_SCALE)
}

/// Converts a raw plane normal into Y-up scene coordinates.
///
/// This is the scale-inverse of `map_vertex`: the components are multiplied by the world scale
/// rather than divided, which is how plane normals are written in exported scenes.
pub fn map_vector(v: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(
        v.x * WORLD_UNITS_PER_UNIT,
        v.z * WORLD_UNITS_PER_UNIT,
        -v.y * WORLD_UNITS_PER_UNIT,
    )
}

/// An axis-aligned bounding box.
///
/// A freshly constructed `Bounds` is empty (its minimum is +∞ and its maximum is -∞), so the first
/// call to `extend` collapses it onto that point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Bounds {
    pub fn empty() -> Bounds {
        Bounds {
            min: Vector3::new(std::f32::INFINITY, std::f32::INFINITY, std::f32::INFINITY),
            max: Vector3::new(
                std::f32::NEG_INFINITY,
                std::f32::NEG_INFINITY,
                std::f32::NEG_INFINITY,
            ),
        }
    }

    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Bounds {
        Bounds { min, max }
    }

    /// Returns `true` if no point has been added to these bounds.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grows the bounds to include `point`.
    pub fn extend(&mut self, point: Vector3<f32>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    /// Grows the bounds to include another box.
    pub fn union(&mut self, other: &Bounds) {
        if other.is_empty() {
            return;
        }

        self.extend(other.min);
        self.extend(other.max);
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn contains(&self, point: Vector3<f32>) -> bool {
        point.x >= self.min.x
            && point.y >= self.min.y
            && point.z >= self.min.z
            && point.x <= self.max.x
            && point.y <= self.max.y
            && point.z <= self.max.z
    }
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds::empty()
    }
}
