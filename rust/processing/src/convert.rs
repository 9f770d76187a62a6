// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Site conversion: drape the trace, author the IFC model, write it and
//! read it back.

use crate::config::RunConfig;
use crate::error::SiteError;
use crate::site::Site;
use crate::terrain::{load_terrain, TerrainInput};
use geo2ifc_core::{
    build_pipe_network, read_step, GeoReference, OriginShift, PipeNetworkSpec, PipeSegmentSpec,
    ProjectedCrs, PropertyValue,
};
use geo2ifc_geometry::{drape_trace, normalize_property_key, Trace, TraceLine};
use serde_json::Value as JsonValue;
use std::path::PathBuf;

/// IfcProject name.
pub const PROJECT_NAME: &str = "SEPM";

/// Result of a converted site.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteOutcome {
    pub site: String,
    pub output_path: PathBuf,
    pub draped_trace_path: PathBuf,
    pub segments: usize,
    pub entity_count: usize,
    /// Whether a terrain was used
    pub draped: bool,
    pub shift: OriginShift,
}

/// Map a GeoJSON property value; nulls are dropped.
pub fn property_value(value: &JsonValue) -> Option<PropertyValue> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(b) => Some(PropertyValue::Boolean(*b)),
        JsonValue::String(s) => Some(PropertyValue::Label(s.clone())),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Some(PropertyValue::Integer(i)),
            None => n.as_f64().map(PropertyValue::Real),
        },
        JsonValue::Array(_) | JsonValue::Object(_) => {
            Some(PropertyValue::Label(value.to_string()))
        }
    }
}

/// Text form of the naming property.
fn name_of(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

/// Segment for one trace line, `None` if it has no usable geometry.
pub fn segment_for(line: &TraceLine, object_key: &str, shift: Option<&OriginShift>) -> Option<PipeSegmentSpec> {
    if line.points.len() < 2 {
        return None;
    }
    let points = line
        .points
        .iter()
        .map(|p| {
            let raw = [p.x, p.y, p.z];
            match shift {
                Some(s) => s.apply(raw),
                None => raw,
            }
        })
        .collect();

    let name = line.properties.get(object_key).and_then(name_of);
    let properties = line
        .properties
        .iter()
        .filter_map(|(key, value)| property_value(value).map(|v| (key.clone(), v)))
        .collect();

    Some(PipeSegmentSpec {
        name,
        points,
        properties,
    })
}

/// Convert one site. Blocking: run it on a blocking thread.
pub fn convert_site(
    site: &Site,
    config: &RunConfig,
    mut trace: Trace,
    terrain_input: &TerrainInput,
    time_stamp: &str,
) -> Result<SiteOutcome, SiteError> {
    let terrain = load_terrain(terrain_input)?;
    let draped = match &terrain {
        Some(terrain) => {
            let stats = drape_trace(terrain.as_ref(), &mut trace);
            tracing::info!(
                site = %site.name,
                source = terrain_input.describe(),
                draped = stats.draped_lines,
                undraped = stats.undraped_lines,
                dropped_vertices = stats.missed_vertices,
                "Draped trace"
            );
            if stats.undraped_lines > 0 {
                tracing::warn!(
                    site = %site.name,
                    count = stats.undraped_lines,
                    "Lines outside the terrain kept their original geometry"
                );
            }
            true
        }
        None => {
            tracing::warn!(site = %site.name, "No terrain available, trace is not draped");
            false
        }
    };

    let draped_trace_path = site.draped_trace_path();
    trace
        .write(&draped_trace_path)
        .map_err(SiteError::DrapedTrace)?;

    let usable: Vec<&TraceLine> = trace.lines.iter().filter(|l| l.points.len() >= 2).collect();
    if usable.len() < trace.lines.len() {
        tracing::warn!(
            site = %site.name,
            count = trace.lines.len() - usable.len(),
            "Skipped lines with fewer than two vertices"
        );
    }
    if usable.is_empty() {
        return Err(SiteError::EmptyTrace);
    }

    let shift = if config.shift_lv95_origin {
        OriginShift::centroid_of(
            usable
                .iter()
                .flat_map(|l| l.points.iter().map(|p| [p.x, p.y, p.z])),
        )
        .unwrap_or_default()
    } else {
        OriginShift::default()
    };

    let object_key = normalize_property_key(&config.object_name);
    let segments: Vec<PipeSegmentSpec> = usable
        .iter()
        .filter_map(|line| {
            segment_for(
                line,
                &object_key,
                config.shift_lv95_origin.then_some(&shift),
            )
        })
        .collect();

    let unnamed = segments.iter().filter(|s| s.name.is_none()).count();
    if unnamed == segments.len() {
        return Err(SiteError::MissingObjectName(config.object_name.clone()));
    }
    if unnamed > 0 {
        tracing::warn!(
            site = %site.name,
            property = %config.object_name,
            count = unnamed,
            "Segments without a name"
        );
    }

    let output_path = site.ifc_output_path(config.schema);
    let file_name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let spec = PipeNetworkSpec {
        schema: config.schema,
        file_name,
        time_stamp: time_stamp.to_string(),
        metadata: config.header_metadata(),
        project_name: PROJECT_NAME.to_string(),
        site_name: site.name.clone(),
        georef: GeoReference::with_offset(ProjectedCrs::lv95(), shift),
        segments,
    };
    let file = build_pipe_network(&spec)?;
    file.write_to(&output_path)?;

    // Read back what was written
    let content = std::fs::read_to_string(&output_path)?;
    let summary = read_step(&content)?;
    summary.require_schema(config.schema)?;
    let written = summary.count_of("IFCPIPESEGMENT");
    if written != spec.segments.len() {
        return Err(SiteError::Validation(format!(
            "expected {} pipe segments, found {}",
            spec.segments.len(),
            written
        )));
    }

    tracing::info!(
        site = %site.name,
        path = %output_path.display(),
        segments = written,
        entities = summary.entity_count,
        "IFC written"
    );

    Ok(SiteOutcome {
        site: site.name.clone(),
        output_path,
        draped_trace_path,
        segments: written,
        entity_count: summary.entity_count,
        draped,
        shift,
    })
}
