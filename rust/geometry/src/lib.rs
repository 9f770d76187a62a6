// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! geo2ifc Geometry
//!
//! Pipe traces from GeoJSON, terrain surfaces from PLY meshes or GeoTIFF
//! elevation tiles, and vertical draping of traces onto terrain, with
//! nalgebra for coordinates.

pub mod bounds;
pub mod drape;
pub mod error;
pub mod mesh;
pub mod ply;
pub mod raster;
pub mod terrain;
pub mod trace;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3};

pub use bounds::Bounds2;
pub use drape::{densify, drape_line, drape_trace, DrapeStats, DrapedLine};
pub use error::{Error, Result};
pub use mesh::TerrainMesh;
pub use ply::{parse_ply, read_ply};
pub use raster::ElevationGrid;
pub use terrain::{MeshTerrain, Terrain, VERTEX_VERTICAL_OFFSET};
pub use trace::{normalize_property_key, Trace, TraceLine};
