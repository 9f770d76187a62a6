// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Terrain surfaces that lines can be draped onto

use crate::bounds::Bounds2;
use crate::error::{Error, Result};
use crate::mesh::TerrainMesh;
use crate::raster::ElevationGrid;
use nalgebra::Point2;
use rustc_hash::{FxHashMap, FxHashSet};

/// Vertical offset applied once to every terrain before draping (metres)
pub const VERTEX_VERTICAL_OFFSET: f64 = -0.8;

const EPS: f64 = 1e-9;

/// A 2.5D surface queried by vertical rays
pub trait Terrain: Send + Sync {
    /// Height where a vertical ray through `(x, y)` first hits the surface
    fn elevation_at(&self, x: f64, y: f64) -> Option<f64>;

    /// Sorted parameters in (0, 1) where segment `a`-`b` crosses surface edges
    fn edge_crossings(&self, a: Point2<f64>, b: Point2<f64>) -> Vec<f64>;

    fn bounds(&self) -> Option<Bounds2>;
}

impl Terrain for ElevationGrid {
    fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        self.interpolate(x, y)
    }

    fn edge_crossings(&self, a: Point2<f64>, b: Point2<f64>) -> Vec<f64> {
        self.crossings(a, b)
    }

    fn bounds(&self) -> Option<Bounds2> {
        self.sample_bounds()
    }
}

/// Triangle mesh with a 2D grid hash over triangle footprints
#[derive(Debug)]
pub struct MeshTerrain {
    mesh: TerrainMesh,
    bounds: Bounds2,
    cell_size: f64,
    grid: FxHashMap<(i64, i64), Vec<u32>>,
}

impl MeshTerrain {
    pub fn new(mesh: TerrainMesh) -> Result<Self> {
        let bounds = match (mesh.is_empty(), mesh.bounds()) {
            (false, Some(b)) => b,
            _ => return Err(Error::InvalidMesh("mesh has no triangles".into())),
        };

        // Roughly one triangle per cell
        let extent = bounds.width().max(bounds.height());
        let cell_size = (extent / (mesh.triangle_count() as f64).sqrt()).max(1e-3);

        let mut terrain = Self {
            mesh,
            bounds,
            cell_size,
            grid: FxHashMap::default(),
        };
        for index in 0..terrain.mesh.triangle_count() {
            let [a, b, c] = terrain.mesh.triangle(index);
            let footprint = Bounds2::new(
                a.x.min(b.x).min(c.x),
                a.y.min(b.y).min(c.y),
                a.x.max(b.x).max(c.x),
                a.y.max(b.y).max(c.y),
            );
            for cell in terrain.cells(&footprint) {
                terrain.grid.entry(cell).or_default().push(index as u32);
            }
        }
        Ok(terrain)
    }

    pub fn mesh(&self) -> &TerrainMesh {
        &self.mesh
    }

    #[inline]
    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    fn cells(&self, area: &Bounds2) -> impl Iterator<Item = (i64, i64)> {
        let (x0, y0) = self.cell_of(area.min_x, area.min_y);
        let (x1, y1) = self.cell_of(area.max_x, area.max_y);
        (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
    }

    fn candidates(&self, area: &Bounds2) -> FxHashSet<u32> {
        let mut out = FxHashSet::default();
        for cell in self.cells(area) {
            if let Some(list) = self.grid.get(&cell) {
                out.extend(list.iter().copied());
            }
        }
        out
    }
}

/// Barycentric weights of `(x, y)` in a 2D triangle, `None` if degenerate
#[inline]
fn barycentric(x: f64, y: f64, p: [Point2<f64>; 3]) -> Option<[f64; 3]> {
    let d = (p[1].y - p[2].y) * (p[0].x - p[2].x) + (p[2].x - p[1].x) * (p[0].y - p[2].y);
    if d.abs() < 1e-12 {
        return None;
    }
    let l0 = ((p[1].y - p[2].y) * (x - p[2].x) + (p[2].x - p[1].x) * (y - p[2].y)) / d;
    let l1 = ((p[2].y - p[0].y) * (x - p[2].x) + (p[0].x - p[2].x) * (y - p[2].y)) / d;
    Some([l0, l1, 1.0 - l0 - l1])
}

#[inline]
fn cross(a: Point2<f64>, b: Point2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

impl Terrain for MeshTerrain {
    fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        let cell = self.cell_of(x, y);
        let list = self.grid.get(&cell)?;
        list.iter()
            .filter_map(|&index| {
                let [a, b, c] = self.mesh.triangle(index as usize);
                let w = barycentric(
                    x,
                    y,
                    [a.xy(), b.xy(), c.xy()],
                )?;
                if w.iter().all(|&l| l >= -EPS) {
                    Some(w[0] * a.z + w[1] * b.z + w[2] * c.z)
                } else {
                    None
                }
            })
            // The ray comes from below, so the lowest hit is the first one
            .min_by(|p, q| p.total_cmp(q))
    }

    fn edge_crossings(&self, a: Point2<f64>, b: Point2<f64>) -> Vec<f64> {
        let Some(area) = Bounds2::from_points([a, b])
            .and_then(|area| area.intersection(&self.bounds))
        else {
            return Vec::new();
        };
        let r = Point2::new(b.x - a.x, b.y - a.y);
        let mut ts = Vec::new();

        for index in self.candidates(&area) {
            let tri = self.mesh.triangle(index as usize);
            for k in 0..3 {
                let p = tri[k].xy();
                let q = tri[(k + 1) % 3].xy();
                let s = Point2::new(q.x - p.x, q.y - p.y);
                let denom = cross(r, s);
                if denom.abs() < 1e-12 {
                    continue;
                }
                let ap = Point2::new(p.x - a.x, p.y - a.y);
                let t = cross(ap, s) / denom;
                let u = cross(ap, r) / denom;
                if t > EPS && t < 1.0 - EPS && (-EPS..=1.0 + EPS).contains(&u) {
                    ts.push(t);
                }
            }
        }

        ts.sort_by(|x, y| x.total_cmp(y));
        ts.dedup_by(|x, y| (*x - *y).abs() < EPS);
        ts
    }

    fn bounds(&self) -> Option<Bounds2> {
        Some(self.bounds)
    }
}
