// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Draping polylines onto a terrain
//!
//! Every segment is first densified at the points where it crosses a
//! terrain edge, so the draped line follows each facet. Each vertex is then
//! projected vertically onto the surface. Vertices that miss the terrain are
//! dropped; a line left with fewer than two vertices keeps its original
//! geometry.

use crate::terrain::Terrain;
use crate::trace::Trace;
use nalgebra::{Point2, Point3};

/// Result of draping one line
#[derive(Debug, Clone, PartialEq)]
pub struct DrapedLine {
    pub points: Vec<Point3<f64>>,
    /// False when the line kept its original geometry
    pub draped: bool,
    /// Densified vertices that found no terrain below or above them
    pub missed: usize,
}

/// Insert a vertex at every terrain edge crossing
pub fn densify(terrain: &dyn Terrain, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut out = Vec::with_capacity(points.len());
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        out.push(a);
        for t in terrain.edge_crossings(a, b) {
            out.push(Point2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t));
        }
    }
    if let Some(last) = points.last() {
        out.push(*last);
    }
    out
}

/// Drape a single polyline
pub fn drape_line(terrain: &dyn Terrain, points: &[Point3<f64>]) -> DrapedLine {
    let plan: Vec<Point2<f64>> = points.iter().map(|p| p.xy()).collect();
    let dense = densify(terrain, &plan);

    let draped: Vec<Point3<f64>> = dense
        .iter()
        .filter_map(|p| terrain.elevation_at(p.x, p.y).map(|z| Point3::new(p.x, p.y, z)))
        .collect();
    let missed = dense.len() - draped.len();

    if draped.len() >= 2 {
        DrapedLine {
            points: draped,
            draped: true,
            missed,
        }
    } else {
        DrapedLine {
            points: points.to_vec(),
            draped: false,
            missed,
        }
    }
}

/// Outcome counts for a whole trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrapeStats {
    pub draped_lines: usize,
    /// Lines kept as-is because fewer than two vertices hit the terrain
    pub undraped_lines: usize,
    pub missed_vertices: usize,
}

/// Drape every line of a trace in place
pub fn drape_trace(terrain: &dyn Terrain, trace: &mut Trace) -> DrapeStats {
    let mut stats = DrapeStats::default();
    for line in &mut trace.lines {
        let result = drape_line(terrain, &line.points);
        stats.missed_vertices += result.missed;
        if result.draped {
            stats.draped_lines += 1;
            line.has_z = true;
        } else {
            stats.undraped_lines += 1;
        }
        line.points = result.points;
    }
    stats
}
