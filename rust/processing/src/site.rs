// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Site discovery.
//!
//! Every immediate subdirectory of the data root is a site:
//!
//! ```text
//! <site>/INPUT/TRACE/<TRACE_FILENAME>
//! <site>/INPUT/MESH/*.ply        (optional)
//! <site>/TEMP/                   (tiles and intermediate files)
//! <site>/OUTPUT/IFC/             (results)
//! ```

use crate::config::RunConfig;
use crate::error::RunError;
use geo2ifc_core::IfcSchemaVersion;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of swissALTI3D tile file names.
pub const TILE_PREFIX: &str = "swissalti3d";

/// A site ready to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    /// Directory name
    pub name: String,
    pub root: PathBuf,
    pub trace_path: PathBuf,
    /// First `INPUT/MESH/*.ply`, only looked up with `CUSTOM_MESH`
    pub mesh_path: Option<PathBuf>,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    /// swissALTI3D tiles already present in `TEMP/`
    pub cached_tiles: Vec<PathBuf>,
}

impl Site {
    fn stem_and_ext(&self) -> (String, String) {
        let stem = self
            .trace_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .trace_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (stem, ext)
    }

    /// `TEMP/<stem>_3D<ext>`
    pub fn draped_trace_path(&self) -> PathBuf {
        let (stem, ext) = self.stem_and_ext();
        self.temp_dir.join(format!("{}_3D{}", stem, ext))
    }

    /// `OUTPUT/IFC/<stem>_3D<SCHEMA>.ifc`
    pub fn ifc_output_path(&self, schema: IfcSchemaVersion) -> PathBuf {
        let (stem, _) = self.stem_and_ext();
        self.output_dir
            .join(format!("{}_3D{}.ifc", stem, schema.identifier()))
    }

    /// Create `TEMP/` and `OUTPUT/IFC/`.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await
    }
}

/// A site that was left out, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSite {
    pub name: String,
    pub reason: String,
}

/// Outcome of scanning the data root.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub sites: Vec<Site>,
    pub skipped: Vec<SkippedSite>,
    /// Non-fatal findings such as unexpected files in `INPUT/MESH/`
    pub warnings: Vec<String>,
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Cached swissALTI3D tiles in a directory, excluding clipped derivatives.
pub fn cached_tiles(temp_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = sorted_entries(temp_dir) else {
        return Vec::new();
    };
    entries
        .into_iter()
        .filter(|p| p.is_file() && has_extension(p, "tif"))
        .filter(|p| {
            p.file_name()
                .map(|n| {
                    let n = n.to_string_lossy();
                    n.starts_with(TILE_PREFIX) && !n.contains("clipped")
                })
                .unwrap_or(false)
        })
        .collect()
}

fn find_mesh(mesh_dir: &Path, site: &str, warnings: &mut Vec<String>) -> Option<PathBuf> {
    let Ok(entries) = sorted_entries(mesh_dir) else {
        warnings.push(format!(
            "site {}: CUSTOM_MESH is set but {} is missing or unreadable",
            site,
            mesh_dir.display()
        ));
        return None;
    };
    let mut found = None;
    for path in entries.into_iter().filter(|p| p.is_file()) {
        if has_extension(&path, "ply") {
            if found.is_none() {
                found = Some(path);
            }
        } else {
            warnings.push(format!(
                "site {}: ignoring non-PLY mesh file {}",
                site,
                path.display()
            ));
        }
    }
    if found.is_none() {
        warnings.push(format!(
            "site {}: CUSTOM_MESH is set but no .ply file was found in {}",
            site,
            mesh_dir.display()
        ));
    }
    found
}

/// Scan the data root. Only an unreadable root is an error.
pub fn discover_sites(config: &RunConfig) -> Result<Discovery, RunError> {
    let root = &config.data_root;
    let entries = sorted_entries(root).map_err(|source| RunError::DataRoot {
        path: root.clone(),
        source,
    })?;

    let mut discovery = Discovery::default();
    for dir in entries.into_iter().filter(|p| p.is_dir()) {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let trace_path = dir
            .join("INPUT")
            .join("TRACE")
            .join(&config.trace_filename);
        if !trace_path.is_file() {
            discovery.skipped.push(SkippedSite {
                reason: format!("trace file {} not found", trace_path.display()),
                name,
            });
            continue;
        }

        let mesh_path = if config.custom_mesh {
            find_mesh(&dir.join("INPUT").join("MESH"), &name, &mut discovery.warnings)
        } else {
            None
        };

        let temp_dir = dir.join("TEMP");
        discovery.sites.push(Site {
            cached_tiles: cached_tiles(&temp_dir),
            output_dir: dir.join("OUTPUT").join("IFC"),
            temp_dir,
            mesh_path,
            trace_path,
            root: dir,
            name,
        });
    }
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(trace: &str) -> Site {
        let root = PathBuf::from("/data/a");
        Site {
            name: "a".into(),
            trace_path: root.join("INPUT/TRACE").join(trace),
            mesh_path: None,
            temp_dir: root.join("TEMP"),
            output_dir: root.join("OUTPUT/IFC"),
            cached_tiles: Vec::new(),
            root,
        }
    }

    #[test]
    fn derived_paths() {
        let s = site("net.geojson");
        assert_eq!(s.draped_trace_path(), PathBuf::from("/data/a/TEMP/net_3D.geojson"));
        assert_eq!(
            s.ifc_output_path(IfcSchemaVersion::Ifc4x3Add2),
            PathBuf::from("/data/a/OUTPUT/IFC/net_3DIFC4X3_ADD2.ifc")
        );
        assert_eq!(
            site("net").ifc_output_path(IfcSchemaVersion::Ifc4),
            PathBuf::from("/data/a/OUTPUT/IFC/net_3DIFC4.ifc")
        );
    }

    #[test]
    fn cached_tiles_skip_clipped_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "swissalti3d_2021_2600-1200_0.5_2056_5728.tif",
            "swissalti3d_clipped.tif",
            "other.tif",
            "swissalti3d_notes.txt",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let tiles = cached_tiles(dir.path());
        assert_eq!(tiles.len(), 1);
        assert!(tiles[0].ends_with("swissalti3d_2021_2600-1200_0.5_2056_5728.tif"));
        assert!(cached_tiles(&dir.path().join("missing")).is_empty());
    }
}
