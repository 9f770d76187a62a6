// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use crate::bounds::Bounds2;
use crate::error::{Error, Result};
use nalgebra::{Point2, Point3};

/// Indexed triangle mesh in world coordinates (f64 for LV95 magnitudes)
#[derive(Debug, Clone, Default)]
pub struct TerrainMesh {
    /// Vertex positions
    pub vertices: Vec<Point3<f64>>,
    /// Triangle vertex indices
    pub triangles: Vec<[u32; 3]>,
}

impl TerrainMesh {
    /// Create a mesh, checking that every index refers to a vertex
    pub fn new(vertices: Vec<Point3<f64>>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        let count = vertices.len();
        if let Some(bad) = triangles
            .iter()
            .flatten()
            .find(|&&i| i as usize >= count)
        {
            return Err(Error::InvalidMesh(format!(
                "triangle index {} out of range for {} vertices",
                bad, count
            )));
        }
        Ok(Self {
            vertices,
            triangles,
        })
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Shift every vertex vertically
    pub fn translate_z(&mut self, dz: f64) {
        for v in &mut self.vertices {
            v.z += dz;
        }
    }

    /// Triangle corners
    #[inline]
    pub fn triangle(&self, index: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// 2D extent of the vertices
    pub fn bounds(&self) -> Option<Bounds2> {
        Bounds2::from_points(self.vertices.iter().map(|v| Point2::new(v.x, v.y)))
    }
}
