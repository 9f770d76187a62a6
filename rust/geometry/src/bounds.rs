// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned 2D bounds in projected coordinates

use nalgebra::Point2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2 {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds2 {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounds of a point set; `None` when empty
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point2<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::new(first.x, first.y, first.x, first.y);
        for p in iter {
            bounds.include(p);
        }
        Some(bounds)
    }

    #[inline]
    pub fn include(&mut self, p: Point2<f64>) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn union(&self, other: &Bounds2) -> Bounds2 {
        Bounds2::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Overlap of two boxes, `None` when they are disjoint
    pub fn intersection(&self, other: &Bounds2) -> Option<Bounds2> {
        let b = Bounds2::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        (b.min_x <= b.max_x && b.min_y <= b.max_y).then_some(b)
    }

    #[inline]
    pub fn contains(&self, p: Point2<f64>) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_of_points() {
        let b = Bounds2::from_points([
            Point2::new(3.0, -1.0),
            Point2::new(-2.0, 4.0),
            Point2::new(0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(b, Bounds2::new(-2.0, -1.0, 3.0, 4.0));
        assert!(b.contains(Point2::new(3.0, 4.0)));
        assert!(!b.contains(Point2::new(3.1, 0.0)));
        assert_eq!(b.width(), 5.0);
        assert!(Bounds2::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn intersection_clips_or_rejects() {
        let a = Bounds2::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(
            a.intersection(&Bounds2::new(5.0, -5.0, 50.0, 5.0)),
            Some(Bounds2::new(5.0, 0.0, 10.0, 5.0))
        );
        assert!(a.intersection(&Bounds2::new(11.0, 0.0, 20.0, 10.0)).is_none());
    }
}
