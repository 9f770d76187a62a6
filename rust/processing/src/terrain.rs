// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Terrain selection and loading for a site.
//!
//! Precedence: custom mesh, then a fresh tile download, then tiles already
//! cached in `TEMP/`, then no terrain at all.

use crate::config::RunConfig;
use crate::error::SiteError;
use crate::site::Site;
use crate::tiles::TileService;
use geo2ifc_geometry::{
    read_ply, Bounds2, ElevationGrid, MeshTerrain, Terrain, VERTEX_VERTICAL_OFFSET,
};
use std::path::PathBuf;

/// Where the terrain of a site comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerrainPlan {
    Mesh(PathBuf),
    Download,
    CachedTiles(Vec<PathBuf>),
    None,
}

/// Terrain inputs resolved to local files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerrainInput {
    Mesh(PathBuf),
    Tiles(Vec<PathBuf>),
    None,
}

impl TerrainInput {
    pub fn describe(&self) -> &'static str {
        match self {
            TerrainInput::Mesh(_) => "custom mesh",
            TerrainInput::Tiles(_) => "elevation tiles",
            TerrainInput::None => "none",
        }
    }
}

pub fn plan_terrain(site: &Site, config: &RunConfig) -> TerrainPlan {
    if config.custom_mesh {
        if let Some(mesh) = &site.mesh_path {
            return TerrainPlan::Mesh(mesh.clone());
        }
    }
    if config.download_tile {
        return TerrainPlan::Download;
    }
    if !site.cached_tiles.is_empty() {
        return TerrainPlan::CachedTiles(site.cached_tiles.clone());
    }
    TerrainPlan::None
}

/// Turn a plan into local files, downloading tiles when asked to.
pub async fn acquire_terrain(
    site: &Site,
    plan: TerrainPlan,
    bounds: Option<Bounds2>,
    tiles: &dyn TileService,
) -> Result<TerrainInput, SiteError> {
    match plan {
        TerrainPlan::Mesh(path) => Ok(TerrainInput::Mesh(path)),
        TerrainPlan::CachedTiles(paths) => Ok(TerrainInput::Tiles(paths)),
        TerrainPlan::None => Ok(TerrainInput::None),
        TerrainPlan::Download => {
            let bounds = bounds.ok_or(SiteError::EmptyTrace)?;
            let paths = tiles.fetch_tiles(&bounds, &site.temp_dir).await?;
            tracing::info!(site = %site.name, count = paths.len(), "Tiles downloaded");
            Ok(TerrainInput::Tiles(paths))
        }
    }
}

/// Load and lower the terrain. Blocking.
pub fn load_terrain(input: &TerrainInput) -> Result<Option<Box<dyn Terrain>>, SiteError> {
    match input {
        TerrainInput::None => Ok(None),
        TerrainInput::Mesh(path) => {
            let terrain_err = |source| SiteError::Terrain {
                path: path.clone(),
                source,
            };
            let mut mesh = read_ply(path).map_err(terrain_err)?;
            mesh.translate_z(VERTEX_VERTICAL_OFFSET);
            tracing::debug!(
                path = %path.display(),
                vertices = mesh.vertex_count(),
                triangles = mesh.triangle_count(),
                "Loaded mesh"
            );
            let terrain = MeshTerrain::new(mesh).map_err(terrain_err)?;
            Ok(Some(Box::new(terrain)))
        }
        TerrainInput::Tiles(paths) => {
            let mut grids = Vec::with_capacity(paths.len());
            for path in paths {
                let grid = ElevationGrid::from_geotiff(path).map_err(|source| SiteError::Terrain {
                    path: path.clone(),
                    source,
                })?;
                grids.push(grid);
            }
            let mut grid = ElevationGrid::mosaic(&grids).map_err(|source| SiteError::Terrain {
                path: paths.first().cloned().unwrap_or_default(),
                source,
            })?;
            grid.translate_z(VERTEX_VERTICAL_OFFSET);
            tracing::debug!(
                tiles = paths.len(),
                width = grid.width,
                height = grid.height,
                "Merged elevation tiles"
            );
            Ok(Some(Box::new(grid)))
        }
    }
}
