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

//! Distance functions over dense vectors and point indexes.
//!
//! The engine never assumes a particular function. It asks a [`Distance`] whether it is a true
//! metric (some index structures prune with the triangle inequality), what input it consumes, and
//! whether it can lower-bound the distance to an axis aligned box (a [`SpatialDistance`]).

use crate::PointIndex;
use fxhash::FxHasher;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hasher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What a distance function consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    /// Dense `f32` vectors of a fixed dimension.
    DenseVector,
    /// Point indexes of a relation. The vectors are never looked at.
    PointIndex,
}

/// A distance function, object safe so that indexes and the planner can hold any of them.
pub trait Distance: Debug + Send + Sync + 'static {
    /// Identifies the function. Two functions with the same name must agree on every input.
    fn name(&self) -> &str;
    /// Dense evaluation. Functions with an [`InputType::PointIndex`] input return `NAN` here.
    fn dist(&self, x: &[f32], y: &[f32]) -> f32;
    /// Evaluation by point index, only implemented by index based functions.
    fn dist_by_index(&self, _i: PointIndex, _j: PointIndex) -> Option<f32> {
        None
    }
    /// True when the function satisfies the triangle inequality.
    fn is_metric(&self) -> bool {
        false
    }
    /// The input restriction of this function.
    fn input_type(&self) -> InputType {
        InputType::DenseVector
    }
    /// Used to match an attached index with a requested function.
    fn same_as(&self, other: &dyn Distance) -> bool {
        self.name() == other.name()
    }
    /// A view of this function that can bound distances to boxes.
    fn as_spatial(&self) -> Option<&dyn SpatialDistance> {
        None
    }
}

/// A distance that can give a lower bound on the distance between a point and an axis aligned box.
pub trait SpatialDistance: Distance {
    /// Smallest distance between `point` and any point of the box spanned by `min` and `max`.
    fn min_dist(&self, min: &[f32], max: &[f32], point: &[f32]) -> f32;
}

/// A similarity function, larger values mean closer objects.
pub trait Similarity: Debug + Send + Sync + 'static {
    /// Identifies the function.
    fn name(&self) -> &str;
    /// Dense evaluation
    fn similarity(&self, x: &[f32], y: &[f32]) -> f32;
    /// Used to match an attached index with a requested function.
    fn same_as(&self, other: &dyn Similarity) -> bool {
        self.name() == other.name()
    }
}

#[inline]
fn box_gap(min: f32, max: f32, p: f32) -> f32 {
    if p < min {
        min - p
    } else if p > max {
        p - max
    } else {
        0.0
    }
}

/// Squared L2 of the difference, accumulated in 8 lanes.
#[inline]
pub fn sq_l2_dense_f32(x: &[f32], y: &[f32]) -> f32 {
    let mut acc = [0.0f32; 8];
    let x_chunks = x.chunks_exact(8);
    let y_chunks = y.chunks_exact(8);
    let leftover: f32 = x_chunks
        .remainder()
        .iter()
        .zip(y_chunks.remainder())
        .map(|(xi, yi)| (xi - yi) * (xi - yi))
        .sum();
    for (xc, yc) in x_chunks.zip(y_chunks) {
        for i in 0..8 {
            let diff = xc[i] - yc[i];
            acc[i] += diff * diff;
        }
    }
    leftover + acc.iter().sum::<f32>()
}

/// Dot product, accumulated in 8 lanes.
#[inline]
pub fn dot_dense_f32(x: &[f32], y: &[f32]) -> f32 {
    let mut acc = [0.0f32; 8];
    let x_chunks = x.chunks_exact(8);
    let y_chunks = y.chunks_exact(8);
    let leftover: f32 = x_chunks
        .remainder()
        .iter()
        .zip(y_chunks.remainder())
        .map(|(xi, yi)| xi * yi)
        .sum();
    for (xc, yc) in x_chunks.zip(y_chunks) {
        for i in 0..8 {
            acc[i] += xc[i] * yc[i];
        }
    }
    leftover + acc.iter().sum::<f32>()
}

///
#[inline]
pub fn sq_l2_norm_f32(x: &[f32]) -> f32 {
    dot_dense_f32(x, x)
}

/// L2 norm, the square root of the sum of squares
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct L2;

impl L2 {
    /// Name shared by every euclidean implementation.
    pub const NAME: &'static str = "euclidean";
}

impl Distance for L2 {
    fn name(&self) -> &str {
        L2::NAME
    }
    #[inline]
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        sq_l2_dense_f32(x, y).sqrt()
    }
    fn is_metric(&self) -> bool {
        true
    }
    fn as_spatial(&self) -> Option<&dyn SpatialDistance> {
        Some(self)
    }
}

impl SpatialDistance for L2 {
    fn min_dist(&self, min: &[f32], max: &[f32], point: &[f32]) -> f32 {
        SquaredL2.min_dist(min, max, point).sqrt()
    }
}

/// The square of L2. Not a metric, but cheaper and order preserving.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SquaredL2;

impl Distance for SquaredL2 {
    fn name(&self) -> &str {
        "squared_euclidean"
    }
    #[inline]
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        sq_l2_dense_f32(x, y)
    }
    fn as_spatial(&self) -> Option<&dyn SpatialDistance> {
        Some(self)
    }
}

impl SpatialDistance for SquaredL2 {
    fn min_dist(&self, min: &[f32], max: &[f32], point: &[f32]) -> f32 {
        min.iter()
            .zip(max)
            .zip(point)
            .map(|((lo, hi), p)| {
                let gap = box_gap(*lo, *hi, *p);
                gap * gap
            })
            .sum()
    }
}

/// L1 norm, the sum of absolute differences
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct L1;

impl Distance for L1 {
    fn name(&self) -> &str {
        "manhattan"
    }
    #[inline]
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        x.iter().zip(y).map(|(xi, yi)| (xi - yi).abs()).sum()
    }
    fn is_metric(&self) -> bool {
        true
    }
    fn as_spatial(&self) -> Option<&dyn SpatialDistance> {
        Some(self)
    }
}

impl SpatialDistance for L1 {
    fn min_dist(&self, min: &[f32], max: &[f32], point: &[f32]) -> f32 {
        min.iter()
            .zip(max)
            .zip(point)
            .map(|((lo, hi), p)| box_gap(*lo, *hi, *p))
            .sum()
    }
}

/// L infinity norm, the largest absolute difference
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LInf;

impl Distance for LInf {
    fn name(&self) -> &str {
        "maximum"
    }
    #[inline]
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        x.iter()
            .zip(y)
            .map(|(xi, yi)| (xi - yi).abs())
            .fold(0.0, f32::max)
    }
    fn is_metric(&self) -> bool {
        true
    }
    fn as_spatial(&self) -> Option<&dyn SpatialDistance> {
        Some(self)
    }
}

impl SpatialDistance for LInf {
    fn min_dist(&self, min: &[f32], max: &[f32], point: &[f32]) -> f32 {
        min.iter()
            .zip(max)
            .zip(point)
            .map(|((lo, hi), p)| box_gap(*lo, *hi, *p))
            .fold(0.0, f32::max)
    }
}

/// One minus the cosine of the angle between the vectors. Not a metric.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CosineDistance;

impl Distance for CosineDistance {
    fn name(&self) -> &str {
        "cosine"
    }
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        1.0 - CosineSimilarity.similarity(x, y)
    }
}

/// A pseudo random distance derived from hashing the pair of point indexes.
///
/// It is symmetric, zero on the diagonal and stable for a given seed. It never looks at the
/// vectors, so it only answers [`Distance::dist_by_index`].
#[derive(Debug, Clone)]
pub struct RandomStableDistance {
    seed: u64,
    name: String,
}

impl RandomStableDistance {
    ///
    pub fn new(seed: u64) -> RandomStableDistance {
        RandomStableDistance {
            seed,
            name: format!("random_stable_{}", seed),
        }
    }
}

impl Distance for RandomStableDistance {
    fn name(&self) -> &str {
        &self.name
    }
    fn dist(&self, _x: &[f32], _y: &[f32]) -> f32 {
        f32::NAN
    }
    fn dist_by_index(&self, i: PointIndex, j: PointIndex) -> Option<f32> {
        if i == j {
            return Some(0.0);
        }
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        let mut hasher = FxHasher::default();
        hasher.write_u64(self.seed);
        hasher.write_usize(a);
        hasher.write_usize(b);
        let bits = hasher.finish() >> 40;
        Some(bits as f32 / (1u64 << 24) as f32)
    }
    fn input_type(&self) -> InputType {
        InputType::PointIndex
    }
}

/// Wraps another distance and counts how often it is evaluated.
#[derive(Debug)]
pub struct CountingDistance {
    inner: Arc<dyn Distance>,
    count: AtomicUsize,
}

impl CountingDistance {
    ///
    pub fn new(inner: Arc<dyn Distance>) -> CountingDistance {
        CountingDistance {
            inner,
            count: AtomicUsize::new(0),
        }
    }

    /// Number of evaluations since creation or the last reset
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    ///
    pub fn reset(&self) -> usize {
        self.count.swap(0, Ordering::Relaxed)
    }
}

impl Distance for CountingDistance {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.dist(x, y)
    }
    fn dist_by_index(&self, i: PointIndex, j: PointIndex) -> Option<f32> {
        let d = self.inner.dist_by_index(i, j);
        if d.is_some() {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
        d
    }
    fn is_metric(&self) -> bool {
        self.inner.is_metric()
    }
    fn input_type(&self) -> InputType {
        self.inner.input_type()
    }
    fn as_spatial(&self) -> Option<&dyn SpatialDistance> {
        self.inner.as_spatial().map(|_| self as &dyn SpatialDistance)
    }
}

impl SpatialDistance for CountingDistance {
    fn min_dist(&self, min: &[f32], max: &[f32], point: &[f32]) -> f32 {
        // Zero is a valid bound for anything.
        self.inner
            .as_spatial()
            .map(|s| s.min_dist(min, max, point))
            .unwrap_or(0.0)
    }
}

/// The plain dot product
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearKernel;

impl Similarity for LinearKernel {
    fn name(&self) -> &str {
        "linear_kernel"
    }
    fn similarity(&self, x: &[f32], y: &[f32]) -> f32 {
        dot_dense_f32(x, y)
    }
}

/// Cosine of the angle between two vectors. Zero vectors are orthogonal to everything but themselves.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CosineSimilarity;

impl Similarity for CosineSimilarity {
    fn name(&self) -> &str {
        "cosine_similarity"
    }
    fn similarity(&self, x: &[f32], y: &[f32]) -> f32 {
        let xx = sq_l2_norm_f32(x);
        let yy = sq_l2_norm_f32(y);
        if xx == 0.0 || yy == 0.0 {
            if xx == yy {
                return 1.0;
            }
            return 0.0;
        }
        (dot_dense_f32(x, y) / (xx * yy).sqrt()).min(1.0).max(-1.0)
    }
}
