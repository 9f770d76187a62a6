// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! geo2ifc - converts GeoJSON pipe traces into IFC models.
//!
//! A one-shot job configured entirely through environment variables. Each
//! subdirectory of the data root is a site:
//!
//! - `INPUT/TRACE/<TRACE_FILENAME>` - the trace (LV95 GeoJSON)
//! - `INPUT/MESH/*.ply` - optional custom terrain (`CUSTOM_MESH=true`)
//! - `TEMP/` - swissALTI3D tiles and the draped trace
//! - `OUTPUT/IFC/` - the generated model
//!
//! Exits with 0 when no site failed, 1 otherwise or on invalid configuration.

use anyhow::Context;
use geo2ifc_processing::{current_timestamp, run, RunConfig, SwissAlti3dClient};
use std::process::ExitCode;
use std::sync::Arc;

mod logging;

async fn run_job(config: RunConfig) -> anyhow::Result<u8> {
    let tiles = SwissAlti3dClient::new().context("Failed to create tile client")?;
    let report = run(Arc::new(config), Arc::new(tiles), &current_timestamp())
        .await
        .context("Conversion run aborted")?;

    for failed in &report.failed {
        tracing::error!(site = %failed.name, error = %failed.error, "Failed");
    }
    Ok(report.exit_code() as u8)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            logging::init("info", false);
            tracing::error!(error = %err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.log_level.as_filter(), config.environment.is_production());

    tracing::info!(
        env = ?config.environment,
        data_root = %config.data_root.display(),
        schema = %config.schema,
        shift_lv95_origin = config.shift_lv95_origin,
        download_tile = config.download_tile,
        custom_mesh = config.custom_mesh,
        "Starting geo2ifc"
    );

    match run_job(config).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Run failed");
            ExitCode::FAILURE
        }
    }
}
