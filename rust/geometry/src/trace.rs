// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipe traces read from GeoJSON
//!
//! A trace is a collection of line features in LV95. MultiLineStrings are
//! exploded into one line per part, each carrying a copy of the feature
//! properties. Property keys are normalized so they are valid IFC property
//! names (`-` becomes `_`).

use crate::bounds::Bounds2;
use crate::error::{Error, Result};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use nalgebra::{Point2, Point3};
use std::path::Path;

/// One polyline of a trace with the attributes of its feature
#[derive(Debug, Clone, PartialEq)]
pub struct TraceLine {
    /// Index of the source feature in the collection
    pub feature_index: usize,
    /// Part number within a MultiLineString, 0 for plain LineStrings
    pub part: usize,
    pub points: Vec<Point3<f64>>,
    /// Whether the source coordinates carried elevations
    pub has_z: bool,
    pub properties: JsonObject,
}

impl TraceLine {
    pub fn points_2d(&self) -> impl Iterator<Item = Point2<f64>> + '_ {
        self.points.iter().map(|p| Point2::new(p.x, p.y))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub lines: Vec<TraceLine>,
    /// Features whose geometry is missing or not linear
    pub skipped_features: usize,
    /// Top-level foreign members (e.g. `crs`) carried over on write
    pub foreign_members: Option<JsonObject>,
}

/// Replace characters IFC does not accept in property names
pub fn normalize_property_key(key: &str) -> String {
    key.replace('-', "_")
}

fn normalize_properties(properties: Option<&JsonObject>) -> JsonObject {
    let mut out = JsonObject::new();
    if let Some(props) = properties {
        for (key, value) in props {
            out.insert(normalize_property_key(key), value.clone());
        }
    }
    out
}

fn to_points(coords: &[Vec<f64>]) -> (Vec<Point3<f64>>, bool) {
    let has_z = !coords.is_empty() && coords.iter().all(|c| c.len() >= 3);
    let points = coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| Point3::new(c[0], c[1], if has_z { c[2] } else { 0.0 }))
        .collect();
    (points, has_z)
}

impl Trace {
    pub fn from_geojson_str(content: &str) -> Result<Self> {
        let geojson: GeoJson = content.parse()?;
        let (features, foreign_members) = match geojson {
            GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
            GeoJson::Feature(f) => (vec![f], None),
            GeoJson::Geometry(_) => return Err(Error::UnsupportedGeoJson("Geometry")),
        };

        let mut trace = Trace {
            foreign_members,
            ..Default::default()
        };

        for (feature_index, feature) in features.iter().enumerate() {
            let properties = normalize_properties(feature.properties.as_ref());
            let parts: Vec<&Vec<Vec<f64>>> = match feature.geometry.as_ref().map(|g| &g.value) {
                Some(Value::LineString(coords)) => vec![coords],
                Some(Value::MultiLineString(lines)) => lines.iter().collect(),
                _ => {
                    trace.skipped_features += 1;
                    continue;
                }
            };

            for (part, coords) in parts.into_iter().enumerate() {
                let (points, has_z) = to_points(coords);
                trace.lines.push(TraceLine {
                    feature_index,
                    part,
                    points,
                    has_z,
                    properties: properties.clone(),
                });
            }
        }

        Ok(trace)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&content)
    }

    /// 2D extent of all vertices
    pub fn bounds(&self) -> Option<Bounds2> {
        Bounds2::from_points(self.lines.iter().flat_map(|l| l.points_2d()))
    }

    pub fn vertex_count(&self) -> usize {
        self.lines.iter().map(|l| l.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Serialize as a FeatureCollection of 3D LineStrings, one feature per line
    pub fn to_geojson_string(&self) -> Result<String> {
        let features = self
            .lines
            .iter()
            .map(|line| {
                let coords = line.points.iter().map(|p| vec![p.x, p.y, p.z]).collect();
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::LineString(coords))),
                    id: None,
                    properties: Some(line.properties.clone()),
                    foreign_members: None,
                }
            })
            .collect();

        let collection = GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features,
            foreign_members: self.foreign_members.clone(),
        });
        Ok(serde_json::to_string(&collection)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }
}
