// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Elevation rasters from GeoTIFF tiles
//!
//! A grid is georeferenced by its upper-left corner and cell size, as given
//! by the `ModelTiepointTag` and `ModelPixelScaleTag` GeoTIFF tags. Samples
//! are taken at pixel centres. Between centres the surface is the regular
//! triangulation that splits every cell along its `(c, r)`-`(c+1, r+1)`
//! diagonal, so elevations are piecewise linear and exact at the samples.

use crate::bounds::Bounds2;
use crate::error::{Error, Result};
use nalgebra::Point2;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GDAL_NODATA: u16 = 42113;

const EPS: f64 = 1e-9;

/// Regular elevation grid, row-major from the top (north) row
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    /// X of the left edge of column 0
    pub origin_x: f64,
    /// Y of the top edge of row 0
    pub origin_y: f64,
    pub cell_x: f64,
    pub cell_y: f64,
    pub width: usize,
    pub height: usize,
    /// Samples, `NaN` where there is no data
    values: Vec<f32>,
}

impl ElevationGrid {
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        cell_x: f64,
        cell_y: f64,
        width: usize,
        height: usize,
        values: Vec<f32>,
    ) -> Result<Self> {
        if values.len() != width * height {
            return Err(Error::GeoTiff(format!(
                "expected {} samples for {}x{}, found {}",
                width * height,
                width,
                height,
                values.len()
            )));
        }
        if !(cell_x > 0.0 && cell_y > 0.0) {
            return Err(Error::GeoTiff(format!(
                "invalid cell size {} x {}",
                cell_x, cell_y
            )));
        }
        Ok(Self {
            origin_x,
            origin_y,
            cell_x,
            cell_y,
            width,
            height,
            values,
        })
    }

    /// Read a single-band GeoTIFF
    pub fn from_geotiff(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;
        let (width, height) = decoder.dimensions()?;

        let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))?;
        let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))?;
        if scale.len() < 2 || tiepoint.len() < 6 {
            return Err(Error::GeoTiff("incomplete georeferencing tags".into()));
        }

        let no_data = match decoder.find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))? {
            Some(value) => value
                .into_string()
                .ok()
                .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok()),
            None => None,
        };

        let samples: Vec<f64> = match decoder.read_image()? {
            DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::F64(v) => v,
            DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
            _ => return Err(Error::GeoTiff("unsupported sample format".into())),
        };

        let values = samples
            .into_iter()
            .map(|z| match no_data {
                Some(nd) if z == nd => f32::NAN,
                _ => z as f32,
            })
            .collect();

        // Tiepoint maps raster (i, j) to model (x, y)
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        let origin_x = x - i * scale[0];
        let origin_y = y + j * scale[1];

        Self::new(
            origin_x,
            origin_y,
            scale[0],
            scale[1],
            width as usize,
            height as usize,
            values,
        )
    }

    /// Merge aligned grids of equal resolution; the first valid sample wins
    pub fn mosaic(grids: &[ElevationGrid]) -> Result<Self> {
        let first = grids
            .first()
            .ok_or_else(|| Error::RasterMismatch("no grids to merge".into()))?;
        if grids.len() == 1 {
            return Ok(first.clone());
        }

        let (cx, cy) = (first.cell_x, first.cell_y);
        let mut bounds = first.extent();
        for g in &grids[1..] {
            if (g.cell_x - cx).abs() > EPS || (g.cell_y - cy).abs() > EPS {
                return Err(Error::RasterMismatch(format!(
                    "cell size {}x{} differs from {}x{}",
                    g.cell_x, g.cell_y, cx, cy
                )));
            }
            bounds = bounds.union(&g.extent());
        }

        let width = (bounds.width() / cx).round() as usize;
        let height = (bounds.height() / cy).round() as usize;
        let mut values = vec![f32::NAN; width * height];

        for g in grids {
            let col_off = (g.origin_x - bounds.min_x) / cx;
            let row_off = (bounds.max_y - g.origin_y) / cy;
            if (col_off - col_off.round()).abs() > 1e-6 || (row_off - row_off.round()).abs() > 1e-6
            {
                return Err(Error::RasterMismatch(
                    "tiles are not aligned to a common grid".into(),
                ));
            }
            let (col_off, row_off) = (col_off.round() as usize, row_off.round() as usize);
            for r in 0..g.height {
                for c in 0..g.width {
                    let src = g.values[r * g.width + c];
                    let dst = &mut values[(r + row_off) * width + c + col_off];
                    if dst.is_nan() && !src.is_nan() {
                        *dst = src;
                    }
                }
            }
        }

        Self::new(bounds.min_x, bounds.max_y, cx, cy, width, height, values)
    }

    /// Shift every sample vertically
    pub fn translate_z(&mut self, dz: f64) {
        for v in &mut self.values {
            *v = (*v as f64 + dz) as f32;
        }
    }

    /// Outer edges of the raster
    pub fn extent(&self) -> Bounds2 {
        Bounds2::new(
            self.origin_x,
            self.origin_y - self.height as f64 * self.cell_y,
            self.origin_x + self.width as f64 * self.cell_x,
            self.origin_y,
        )
    }

    /// Area covered by pixel centres, where elevations are defined
    pub fn sample_bounds(&self) -> Option<Bounds2> {
        if self.width < 2 || self.height < 2 {
            return None;
        }
        let e = self.extent();
        let (hx, hy) = (self.cell_x / 2.0, self.cell_y / 2.0);
        Some(Bounds2::new(
            e.min_x + hx,
            e.min_y + hy,
            e.max_x - hx,
            e.max_y - hy,
        ))
    }

    /// Sample at a pixel, `None` outside the grid or on no-data
    #[inline]
    pub fn value(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let v = self.values[row * self.width + col];
        (!v.is_nan()).then_some(v as f64)
    }

    /// Continuous pixel-centre coordinates of a model point
    #[inline]
    fn to_node_space(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.cell_x - 0.5,
            (self.origin_y - y) / self.cell_y - 0.5,
        )
    }

    /// Elevation on the triangulated surface
    pub fn interpolate(&self, x: f64, y: f64) -> Option<f64> {
        if self.width < 2 || self.height < 2 {
            return None;
        }
        let (fx, fy) = self.to_node_space(x, y);
        let (max_c, max_r) = ((self.width - 1) as f64, (self.height - 1) as f64);
        if !(-EPS..=max_c + EPS).contains(&fx) || !(-EPS..=max_r + EPS).contains(&fy) {
            return None;
        }
        let fx = fx.clamp(0.0, max_c);
        let fy = fy.clamp(0.0, max_r);
        let c = (fx.floor() as usize).min(self.width - 2);
        let r = (fy.floor() as usize).min(self.height - 2);
        let (u, v) = (fx - c as f64, fy - r as f64);

        let z00 = self.value(c, r)?;
        let z11 = self.value(c + 1, r + 1)?;
        if u >= v {
            let z10 = self.value(c + 1, r)?;
            Some(z00 + u * (z10 - z00) + v * (z11 - z10))
        } else {
            let z01 = self.value(c, r + 1)?;
            Some(z00 + v * (z01 - z00) + u * (z11 - z01))
        }
    }

    /// Parameters in (0, 1) where segment `a`-`b` crosses a triangle edge
    pub fn crossings(&self, a: Point2<f64>, b: Point2<f64>) -> Vec<f64> {
        if self.width < 2 || self.height < 2 {
            return Vec::new();
        }
        let (ax, ay) = self.to_node_space(a.x, a.y);
        let (bx, by) = self.to_node_space(b.x, b.y);
        let (max_c, max_r) = ((self.width - 1) as f64, (self.height - 1) as f64);

        let mut ts = Vec::new();
        // Columns, rows, then diagonals u - v = k
        line_family(ax, bx, 0.0, max_c, &mut ts);
        line_family(ay, by, 0.0, max_r, &mut ts);
        line_family(ax - ay, bx - by, -max_r, max_c, &mut ts);

        // Keep crossings that lie on the triangulated area
        ts.retain(|&t| {
            let fx = ax + (bx - ax) * t;
            let fy = ay + (by - ay) * t;
            (-EPS..=max_c + EPS).contains(&fx) && (-EPS..=max_r + EPS).contains(&fy)
        });
        ts.sort_by(|x, y| x.total_cmp(y));
        ts.dedup_by(|x, y| (*x - *y).abs() < EPS);
        ts
    }
}

/// Crossings of a 1D coordinate going from `a` to `b` with integers in `[lo, hi]`
fn line_family(a: f64, b: f64, lo: f64, hi: f64, out: &mut Vec<f64>) {
    let d = b - a;
    if d.abs() < EPS {
        return;
    }
    let start = a.min(b).ceil().max(lo);
    let end = a.max(b).floor().min(hi);
    let mut k = start;
    while k <= end {
        let t = (k - a) / d;
        if t > EPS && t < 1.0 - EPS {
            out.push(t);
        }
        k += 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 3x3 grid at 1 m, centres at x 0.5..2.5, y 2.5..0.5, z = x + 10 y
    fn plane() -> ElevationGrid {
        let mut values = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                let x = c as f64 + 0.5;
                let y = 2.5 - r as f64;
                values.push((x + 10.0 * y) as f32);
            }
        }
        ElevationGrid::new(0.0, 3.0, 1.0, 1.0, 3, 3, values).unwrap()
    }

    #[test]
    fn interpolation_reproduces_planes() {
        let g = plane();
        for (x, y) in [(0.5, 0.5), (1.2, 1.7), (2.5, 2.5), (1.9, 0.6)] {
            assert_relative_eq!(g.interpolate(x, y).unwrap(), x + 10.0 * y, epsilon = 1e-4);
        }
    }

    #[test]
    fn outside_centres_is_none() {
        let g = plane();
        assert!(g.interpolate(0.2, 1.0).is_none());
        assert!(g.interpolate(1.0, 2.9).is_none());
        assert_eq!(g.sample_bounds().unwrap(), Bounds2::new(0.5, 0.5, 2.5, 2.5));
    }

    #[test]
    fn no_data_holes() {
        let mut values = vec![1.0f32; 9];
        values[4] = f32::NAN;
        let g = ElevationGrid::new(0.0, 3.0, 1.0, 1.0, 3, 3, values).unwrap();
        assert!(g.interpolate(1.5, 1.5).is_none());
        assert!(g.value(1, 1).is_none());
        assert_eq!(g.value(0, 0), Some(1.0));
    }

    #[test]
    fn crossings_cover_rows_columns_and_diagonals() {
        let g = plane();
        // Horizontal line through the middle row of centres
        let ts = g.crossings(Point2::new(0.5, 1.2), Point2::new(2.5, 1.2));
        // column x = 1.5, plus two diagonals
        assert_eq!(ts.len(), 3);
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
        assert!(ts.iter().any(|t| (t - 0.5).abs() < 1e-9));
    }

    #[test]
    fn mosaic_joins_neighbours() {
        let left = ElevationGrid::new(0.0, 2.0, 1.0, 1.0, 2, 2, vec![1.0; 4]).unwrap();
        let right = ElevationGrid::new(2.0, 2.0, 1.0, 1.0, 2, 2, vec![2.0; 4]).unwrap();
        let m = ElevationGrid::mosaic(&[left, right]).unwrap();
        assert_eq!((m.width, m.height), (4, 2));
        assert_eq!(m.value(0, 0), Some(1.0));
        assert_eq!(m.value(3, 1), Some(2.0));
        assert_relative_eq!(m.interpolate(2.0, 1.5).unwrap(), 1.5, epsilon = 1e-9);
    }

    #[test]
    fn mosaic_rejects_mixed_resolution() {
        let a = ElevationGrid::new(0.0, 2.0, 1.0, 1.0, 2, 2, vec![1.0; 4]).unwrap();
        let b = ElevationGrid::new(2.0, 2.0, 0.5, 0.5, 2, 2, vec![2.0; 4]).unwrap();
        assert!(matches!(
            ElevationGrid::mosaic(&[a, b]),
            Err(Error::RasterMismatch(_))
        ));
    }
}
