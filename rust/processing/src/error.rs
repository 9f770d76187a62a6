// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the conversion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that stop the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Cannot list data root {path}: {source}")]
    DataRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tile search and download failures.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),

    #[error("No elevation tiles cover the trace")]
    NoTiles,

    #[error("Cannot derive a file name from {0}")]
    InvalidHref(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-site failures. The run continues with the next site.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot load trace {path}: {source}")]
    Trace {
        path: PathBuf,
        #[source]
        source: geo2ifc_geometry::Error,
    },

    #[error("Trace has no usable line features")]
    EmptyTrace,

    #[error("Cannot load terrain {path}: {source}")]
    Terrain {
        path: PathBuf,
        #[source]
        source: geo2ifc_geometry::Error,
    },

    #[error("Tile download failed: {0}")]
    Tiles(#[from] TileError),

    #[error("No feature carries the '{0}' property")]
    MissingObjectName(String),

    #[error("Cannot write draped trace: {0}")]
    DrapedTrace(#[source] geo2ifc_geometry::Error),

    #[error("IFC error: {0}")]
    Ifc(#[from] geo2ifc_core::Error),

    #[error("Written file failed validation: {0}")]
    Validation(String),

    #[error("Join error")]
    Join(#[from] tokio::task::JoinError),
}
