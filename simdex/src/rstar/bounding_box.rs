/*
* Licensed to Elasticsearch B.V. under one or more contributor
* license agreements. See the NOTICE file distributed with
* this work for additional information regarding copyright
* ownership. Elasticsearch B.V. licenses this file to you under
* the Apache License, Version 2.0 (the "License"); you may
* not use this file except in compliance with the License.
* You may obtain a copy of the License at
*
*  http://www.apache.org/licenses/LICENSE-2.0
*
* Unless required by applicable law or agreed to in writing,
* software distributed under the License is distributed on an
* "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
* KIND, either express or implied.  See the License for the
* specific language governing permissions and limitations
* under the License.
*/

//! Axis aligned boxes and the geometry the tree strategies are built from.
//!
//! The helpers are generic over [`Spatial`] so that raw points, leaf entries and directory boxes
//! can be compared without first materializing a box for each of them. Volumes and margins are
//! accumulated in `f64`, products of many small extents underflow quickly in `f32`.

use serde::{Deserialize, Serialize};

/// Anything with an axis aligned extent.
pub trait Spatial {
    /// Dimension of the space the object lives in
    fn dim(&self) -> usize;
    /// Lower end of the extent along axis `d`
    fn min_coord(&self, d: usize) -> f32;
    /// Upper end of the extent along axis `d`
    fn max_coord(&self, d: usize) -> f32;
}

impl Spatial for [f32] {
    fn dim(&self) -> usize {
        self.len()
    }
    fn min_coord(&self, d: usize) -> f32 {
        self[d]
    }
    fn max_coord(&self, d: usize) -> f32 {
        self[d]
    }
}

/// The minimal bounding rectangle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    min: Vec<f32>,
    max: Vec<f32>,
}

impl Spatial for BoundingBox {
    fn dim(&self) -> usize {
        self.min.len()
    }
    fn min_coord(&self, d: usize) -> f32 {
        self.min[d]
    }
    fn max_coord(&self, d: usize) -> f32 {
        self.max[d]
    }
}

impl BoundingBox {
    /// Box from its corners. The corners need the same length and `min <= max` on every axis.
    pub fn new(min: Vec<f32>, max: Vec<f32>) -> BoundingBox {
        debug_assert_eq!(min.len(), max.len());
        BoundingBox { min, max }
    }

    /// The degenerate box around a single point
    pub fn from_point(point: &[f32]) -> BoundingBox {
        BoundingBox {
            min: point.to_vec(),
            max: point.to_vec(),
        }
    }

    /// Copies the extent of anything spatial
    pub fn from_spatial<S: Spatial + ?Sized>(s: &S) -> BoundingBox {
        let dim = s.dim();
        BoundingBox {
            min: (0..dim).map(|d| s.min_coord(d)).collect(),
            max: (0..dim).map(|d| s.max_coord(d)).collect(),
        }
    }

    /// The union of everything in the iterator, `None` if it is empty.
    pub fn union_all<'a, S, I>(items: I) -> Option<BoundingBox>
    where
        S: Spatial + ?Sized + 'a,
        I: IntoIterator<Item = &'a S>,
    {
        let mut iter = items.into_iter();
        let mut bbox = BoundingBox::from_spatial(iter.next()?);
        for s in iter {
            bbox.extend(s);
        }
        Some(bbox)
    }

    ///
    pub fn min(&self) -> &[f32] {
        &self.min
    }

    ///
    pub fn max(&self) -> &[f32] {
        &self.max
    }

    /// Grows this box to cover `other`. Returns true if anything changed.
    pub fn extend<S: Spatial + ?Sized>(&mut self, other: &S) -> bool {
        let mut changed = false;
        for d in 0..self.min.len() {
            let lo = other.min_coord(d);
            let hi = other.max_coord(d);
            if lo < self.min[d] {
                self.min[d] = lo;
                changed = true;
            }
            if hi > self.max[d] {
                self.max[d] = hi;
                changed = true;
            }
        }
        changed
    }

    /// Center of the box
    pub fn center(&self) -> Vec<f32> {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(lo, hi)| 0.5 * (lo + hi))
            .collect()
    }
}

/// Center coordinate along one axis
#[inline]
pub fn center_coord<S: Spatial + ?Sized>(s: &S, d: usize) -> f32 {
    0.5 * (s.min_coord(d) + s.max_coord(d))
}

/// Product of the extents
pub fn volume<S: Spatial + ?Sized>(s: &S) -> f64 {
    (0..s.dim())
        .map(|d| (s.max_coord(d) - s.min_coord(d)) as f64)
        .product()
}

/// Sum of the extents. Proportional to the perimeter of the box.
pub fn margin<S: Spatial + ?Sized>(s: &S) -> f64 {
    (0..s.dim())
        .map(|d| (s.max_coord(d) - s.min_coord(d)) as f64)
        .sum()
}

/// Volume of the smallest box covering both
pub fn union_volume<A: Spatial + ?Sized, B: Spatial + ?Sized>(a: &A, b: &B) -> f64 {
    (0..a.dim())
        .map(|d| {
            let lo = a.min_coord(d).min(b.min_coord(d));
            let hi = a.max_coord(d).max(b.max_coord(d));
            (hi - lo) as f64
        })
        .product()
}

/// How much `a` has to grow in volume to cover `b`
pub fn enlargement<A: Spatial + ?Sized, B: Spatial + ?Sized>(a: &A, b: &B) -> f64 {
    union_volume(a, b) - volume(a)
}

/// Volume of the intersection, zero when the boxes are disjoint
pub fn overlap<A: Spatial + ?Sized, B: Spatial + ?Sized>(a: &A, b: &B) -> f64 {
    let mut acc = 1.0f64;
    for d in 0..a.dim() {
        let lo = a.min_coord(d).max(b.min_coord(d));
        let hi = a.max_coord(d).min(b.max_coord(d));
        if hi < lo {
            return 0.0;
        }
        acc *= (hi - lo) as f64;
    }
    acc
}

/// True when the boxes share at least one point
pub fn intersects<A: Spatial + ?Sized, B: Spatial + ?Sized>(a: &A, b: &B) -> bool {
    (0..a.dim()).all(|d| a.min_coord(d) <= b.max_coord(d) && b.min_coord(d) <= a.max_coord(d))
}

/// True when `outer` covers all of `inner`
pub fn contains<A: Spatial + ?Sized, B: Spatial + ?Sized>(outer: &A, inner: &B) -> bool {
    (0..outer.dim())
        .all(|d| outer.min_coord(d) <= inner.min_coord(d) && inner.max_coord(d) <= outer.max_coord(d))
}

/// Squared euclidean distance between the centers
pub fn center_distance_sq<A: Spatial + ?Sized, B: Spatial + ?Sized>(a: &A, b: &B) -> f64 {
    (0..a.dim())
        .map(|d| {
            let diff = (center_coord(a, d) - center_coord(b, d)) as f64;
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> BoundingBox {
        BoundingBox::new(vec![0.0, 0.0], vec![1.0, 1.0])
    }

    #[test]
    fn measures() {
        let b = BoundingBox::new(vec![0.0, 0.0], vec![2.0, 3.0]);
        assert_approx_eq!(volume(&b), 6.0);
        assert_approx_eq!(margin(&b), 5.0);
        assert_eq!(b.center(), vec![1.0, 1.5]);
        let p: &[f32] = &[1.0, 2.0];
        assert_approx_eq!(volume(p), 0.0);
    }

    #[test]
    fn overlap_and_enlargement() {
        let a = unit();
        let b = BoundingBox::new(vec![0.5, 0.5], vec![2.0, 2.0]);
        assert_approx_eq!(overlap(&a, &b), 0.25);
        assert_approx_eq!(union_volume(&a, &b), 4.0);
        assert_approx_eq!(enlargement(&a, &b), 3.0);
        let far = BoundingBox::new(vec![3.0, 3.0], vec![4.0, 4.0]);
        assert_approx_eq!(overlap(&a, &far), 0.0);
        assert!(!intersects(&a, &far));
        assert!(intersects(&a, &b));
    }

    #[test]
    fn containment_and_extension() {
        let mut a = unit();
        let p: &[f32] = &[0.5, 0.25];
        assert!(contains(&a, p));
        assert!(!a.extend(p));
        let q: &[f32] = &[-1.0, 0.5];
        assert!(!contains(&a, q));
        assert!(a.extend(q));
        assert_eq!(a.min(), &[-1.0, 0.0]);
        assert_eq!(a.max(), &[1.0, 1.0]);
    }

    #[test]
    fn union_of_points() {
        let points: Vec<Vec<f32>> = vec![vec![0.0, 5.0], vec![3.0, -1.0], vec![1.0, 1.0]];
        let bbox = BoundingBox::union_all(points.iter().map(|p| p.as_slice())).unwrap();
        assert_eq!(bbox.min(), &[0.0, -1.0]);
        assert_eq!(bbox.max(), &[3.0, 5.0]);
        let empty: Vec<&[f32]> = Vec::new();
        assert!(BoundingBox::union_all(empty).is_none());
    }
}
