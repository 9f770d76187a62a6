// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Batch runner: discovers sites and converts them one after another.

use crate::config::RunConfig;
use crate::convert::{convert_site, SiteOutcome};
use crate::error::{RunError, SiteError};
use crate::site::{discover_sites, Site, SkippedSite};
use crate::terrain::{acquire_terrain, plan_terrain};
use crate::tiles::TileService;
use geo2ifc_geometry::Trace;
use std::sync::Arc;

/// A site whose conversion failed.
#[derive(Debug)]
pub struct FailedSite {
    pub name: String,
    pub error: SiteError,
}

/// Summary of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub converted: Vec<SiteOutcome>,
    pub skipped: Vec<SkippedSite>,
    pub failed: Vec<FailedSite>,
}

impl RunReport {
    /// 0 unless a site failed. Skipped sites do not count as failures.
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() {
            0
        } else {
            1
        }
    }
}

/// IFC header time stamp for the current time.
pub fn current_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

async fn process_site(
    site: Site,
    config: Arc<RunConfig>,
    tiles: &dyn TileService,
    time_stamp: &str,
) -> Result<SiteOutcome, SiteError> {
    site.ensure_dirs().await?;

    let trace_path = site.trace_path.clone();
    let trace = tokio::task::spawn_blocking(move || Trace::load(&trace_path))
        .await?
        .map_err(|source| SiteError::Trace {
            path: site.trace_path.clone(),
            source,
        })?;
    if trace.skipped_features > 0 {
        tracing::warn!(
            site = %site.name,
            count = trace.skipped_features,
            "Ignored features without line geometry"
        );
    }
    if trace.is_empty() {
        return Err(SiteError::EmptyTrace);
    }
    tracing::debug!(
        site = %site.name,
        lines = trace.lines.len(),
        vertices = trace.vertex_count(),
        "Trace loaded"
    );

    let plan = plan_terrain(&site, &config);
    let input = acquire_terrain(&site, plan, trace.bounds(), tiles).await?;

    let time_stamp = time_stamp.to_string();
    tokio::task::spawn_blocking(move || convert_site(&site, &config, trace, &input, &time_stamp))
        .await?
}

/// Convert every site under the data root.
///
/// Only an unreadable data root is an error; site failures are collected in
/// the report.
pub async fn run(
    config: Arc<RunConfig>,
    tiles: Arc<dyn TileService>,
    time_stamp: &str,
) -> Result<RunReport, RunError> {
    let discovery = discover_sites(&config)?;
    tracing::info!(
        root = %config.data_root.display(),
        sites = discovery.sites.len(),
        skipped = discovery.skipped.len(),
        "Discovered sites"
    );
    for warning in &discovery.warnings {
        tracing::warn!("{}", warning);
    }
    for skipped in &discovery.skipped {
        tracing::warn!(site = %skipped.name, reason = %skipped.reason, "Skipping site");
    }

    let mut report = RunReport {
        skipped: discovery.skipped,
        ..Default::default()
    };

    for site in discovery.sites {
        let name = site.name.clone();
        tracing::info!(site = %name, "Processing site");
        match process_site(site, Arc::clone(&config), tiles.as_ref(), time_stamp).await {
            Ok(outcome) => report.converted.push(outcome),
            Err(error) => {
                tracing::error!(site = %name, error = %error, "Site failed");
                report.failed.push(FailedSite { name, error });
            }
        }
    }

    tracing::info!(
        converted = report.converted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Run finished"
    );
    Ok(report)
}
