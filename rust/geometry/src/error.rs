// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading traces and terrain
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("GeoJSON must be a FeatureCollection or Feature, found {0}")]
    UnsupportedGeoJson(&'static str),

    #[error("Invalid PLY: {0}")]
    Ply(String),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("Invalid GeoTIFF: {0}")]
    GeoTiff(String),

    #[error("Incompatible rasters: {0}")]
    RasterMismatch(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tiff::TiffError> for Error {
    fn from(err: tiff::TiffError) -> Self {
        Error::GeoTiff(err.to_string())
    }
}
