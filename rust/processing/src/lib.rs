// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion pipeline shared by the `geo2ifc` binary and its tests.
//!
//! [`RunConfig`] is loaded once, [`discover_sites`] lists the work and
//! [`run`] converts each site: trace loading, terrain acquisition
//! ([`TileService`] for swissALTI3D downloads), draping, IFC authoring and a
//! read-back check.

pub mod config;
pub mod convert;
pub mod error;
pub mod runner;
pub mod site;
pub mod terrain;
pub mod tiles;

pub use config::{ConfigError, Environment, LogLevel, RunConfig, CONFIG_KEYS};
pub use convert::{convert_site, SiteOutcome, PROJECT_NAME};
pub use error::{RunError, SiteError, TileError};
pub use runner::{current_timestamp, run, FailedSite, RunReport};
pub use site::{discover_sites, Discovery, Site, SkippedSite};
pub use terrain::{plan_terrain, TerrainInput, TerrainPlan};
pub use tiles::{SwissAlti3dClient, TileService, SWISSALTI3D_SEARCH_URL};
