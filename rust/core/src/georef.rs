// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC Georeferencing Support
//!
//! IfcProjectedCRS / IfcMapConversion values written into each model, the
//! centroid-based origin shift, and reading both back from STEP content.

use crate::error::Result;
use crate::parser::{parse_entity, EntityScanner, Token};

/// Projected CRS description written as IfcProjectedCRS
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedCrs {
    /// EPSG-qualified name, e.g. "EPSG:2056"
    pub name: String,
    pub description: Option<String>,
    pub geodetic_datum: Option<String>,
    pub vertical_datum: Option<String>,
}

impl ProjectedCrs {
    /// CH1903+ / LV95 with LHN95 heights
    pub fn lv95() -> Self {
        Self {
            name: "EPSG:2056".to_string(),
            description: Some("CH1903+/LV95".to_string()),
            geodetic_datum: Some("CH1903+".to_string()),
            vertical_datum: Some("LHN95 height".to_string()),
        }
    }
}

/// Georeferencing of a model: local engineering coordinates plus the map
/// conversion offset give projected coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    pub crs: ProjectedCrs,
    /// False easting (X offset to map CRS)
    pub eastings: f64,
    /// False northing (Y offset to map CRS)
    pub northings: f64,
    /// Orthogonal height (Z offset)
    pub orthogonal_height: f64,
    /// X-axis abscissa (cos of rotation angle)
    pub x_axis_abscissa: f64,
    /// X-axis ordinate (sin of rotation angle)
    pub x_axis_ordinate: f64,
    /// Scale factor (default 1.0)
    pub scale: f64,
}

impl GeoReference {
    /// Unrotated, unscaled georeference with the given offset
    pub fn with_offset(crs: ProjectedCrs, offset: OriginShift) -> Self {
        Self {
            crs,
            eastings: offset.x,
            northings: offset.y,
            orthogonal_height: offset.z,
            x_axis_abscissa: 1.0,
            x_axis_ordinate: 0.0,
            scale: 1.0,
        }
    }

    /// Transform local coordinates to map coordinates
    #[inline]
    pub fn local_to_map(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let cos_r = self.x_axis_abscissa;
        let sin_r = self.x_axis_ordinate;
        let s = self.scale;

        let e = s * (cos_r * x - sin_r * y) + self.eastings;
        let n = s * (sin_r * x + cos_r * y) + self.northings;
        let h = z + self.orthogonal_height;

        (e, n, h)
    }

    /// Read IfcMapConversion and IfcProjectedCRS back from STEP content.
    /// Returns `None` when the content carries no map conversion.
    pub fn from_step(content: &str) -> Result<Option<Self>> {
        let mut scanner = EntityScanner::new(content);
        let mut conversion: Option<(usize, usize)> = None;
        let mut crs: Option<(usize, usize)> = None;

        while let Some((_, type_name, start, end)) = scanner.next_entity() {
            match type_name {
                "IFCMAPCONVERSION" => conversion = Some((start, end)),
                "IFCPROJECTEDCRS" => crs = Some((start, end)),
                _ => {}
            }
        }

        let Some((start, end)) = conversion else {
            return Ok(None);
        };

        let mut georef = Self::with_offset(
            ProjectedCrs {
                name: String::new(),
                description: None,
                geodetic_datum: None,
                vertical_datum: None,
            },
            OriginShift::default(),
        );

        // SourceCRS, TargetCRS, Eastings, Northings, OrthogonalHeight,
        // XAxisAbscissa, XAxisOrdinate, Scale[, ScaleY, ScaleZ]
        let (_, _, args) = parse_entity(&content[start..end])?;
        let float_at = |i: usize| args.get(i).and_then(Token::as_float);
        if let Some(v) = float_at(2) {
            georef.eastings = v;
        }
        if let Some(v) = float_at(3) {
            georef.northings = v;
        }
        if let Some(v) = float_at(4) {
            georef.orthogonal_height = v;
        }
        if let Some(v) = float_at(5) {
            georef.x_axis_abscissa = v;
        }
        if let Some(v) = float_at(6) {
            georef.x_axis_ordinate = v;
        }
        if let Some(v) = float_at(7) {
            georef.scale = v;
        }

        // Name, Description, GeodeticDatum, VerticalDatum, ...
        if let Some((start, end)) = crs {
            let (_, _, args) = parse_entity(&content[start..end])?;
            let string_at = |i: usize| args.get(i).and_then(Token::as_string);
            georef.crs.name = string_at(0).unwrap_or_default();
            georef.crs.description = string_at(1);
            georef.crs.geodetic_datum = string_at(2);
            georef.crs.vertical_datum = string_at(3);
        }

        Ok(Some(georef))
    }
}

/// Translation subtracted from every coordinate of a model
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OriginShift {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl OriginShift {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Mean of all points, rounded to whole metres. `None` for no points.
    pub fn centroid_of<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut count = 0usize;
        let mut sum = (0.0f64, 0.0f64, 0.0f64);
        for [x, y, z] in points {
            sum.0 += x;
            sum.1 += y;
            sum.2 += z;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(Self {
            x: (sum.0 / n).round(),
            y: (sum.1 / n).round(),
            z: (sum.2 / n).round(),
        })
    }

    /// Subtract the shift and round to micrometres
    #[inline]
    pub fn apply(&self, point: [f64; 3]) -> [f64; 3] {
        [
            round6(point[0] - self.x),
            round6(point[1] - self.y),
            round6(point[2] - self.z),
        ]
    }
}

#[inline]
fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_georef_local_to_map() {
        let georef = GeoReference::with_offset(
            ProjectedCrs::lv95(),
            OriginShift::new(2600000.0, 1200000.0, 400.0),
        );

        let (e, n, h) = georef.local_to_map(10.0, 20.0, 5.0);
        assert!((e - 2600010.0).abs() < 1e-10);
        assert!((n - 1200020.0).abs() < 1e-10);
        assert!((h - 405.0).abs() < 1e-10);
    }

    #[test]
    fn test_georef_with_rotation() {
        let mut georef = GeoReference::with_offset(ProjectedCrs::lv95(), OriginShift::default());
        // 90 degree rotation
        georef.x_axis_abscissa = 0.0;
        georef.x_axis_ordinate = 1.0;

        let (e, n, _) = georef.local_to_map(10.0, 0.0, 0.0);
        assert!(e.abs() < 1e-10);
        assert!((n - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_centroid_rounds_to_metres() {
        let shift = OriginShift::centroid_of([
            [2600000.2, 1200000.0, 400.0],
            [2600010.2, 1200010.0, 410.0],
            [2600020.2, 1200020.0, 421.0],
        ])
        .unwrap();
        assert_eq!(shift, OriginShift::new(2600010.0, 1200010.0, 410.0));
        assert!(OriginShift::centroid_of(std::iter::empty()).is_none());
    }

    #[test]
    fn test_apply_shift() {
        let shift = OriginShift::new(2600000.0, 1200000.0, 400.0);
        assert_eq!(shift.apply([2600012.5, 1199990.25, 398.0]), [12.5, -9.75, -2.0]);
    }

    #[test]
    fn test_from_step() {
        let content = "DATA;\n\
#5=IFCPROJECTEDCRS('EPSG:2056','CH1903+/LV95','CH1903+','LHN95 height',$,$,$);\n\
#6=IFCMAPCONVERSION(#3,#5,2600010.,1200010.,410.,1.,0.,1.,$,$);\nENDSEC;\n";
        let georef = GeoReference::from_step(content).unwrap().unwrap();
        assert_eq!(georef.crs, ProjectedCrs::lv95());
        assert_eq!(georef.eastings, 2600010.0);
        assert_eq!(georef.northings, 1200010.0);
        assert_eq!(georef.orthogonal_height, 410.0);
        assert_eq!(georef.scale, 1.0);
    }

    #[test]
    fn test_from_step_without_conversion() {
        assert!(GeoReference::from_step("DATA;\nENDSEC;\n").unwrap().is_none());
    }
}
