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

//! Brute force answers for every query category. These always work, for every function the
//! relation can evaluate, and are what the planner falls back to.

use super::queries::*;
use crate::errors::*;
use crate::query_tools::*;
use pointcloud::distances::sq_l2_dense_f32;
use pointcloud::{PointCloud, PointIndex};
use rayon::prelude::*;
use std::sync::Arc;

fn by_distance(a: &(f32, PointIndex), b: &(f32, PointIndex)) -> std::cmp::Ordering {
    a.0.partial_cmp(&b.0)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a.1.cmp(&b.1))
}

/// Every object of the relation with its distance to the query.
fn all_distances(dq: &dyn DistanceQuery, query: QueryPoint) -> SimdexResult<Vec<(f32, PointIndex)>> {
    dq.relation()
        .reference_indexes()
        .into_par_iter()
        .map(|i| -> SimdexResult<(f32, PointIndex)> {
            Ok((dq.dist(query, QueryPoint::Index(i))?, i))
        })
        .collect()
}

/// Squared euclidean distances computed on the raw vectors.
fn all_sq_l2(relation: &dyn PointCloud, query: QueryPoint) -> SimdexResult<Vec<(f32, PointIndex)>> {
    let point = query.vector(relation)?;
    relation
        .reference_indexes()
        .into_par_iter()
        .map(|i| -> SimdexResult<(f32, PointIndex)> {
            Ok((sq_l2_dense_f32(point, relation.point(i)?), i))
        })
        .collect()
}

fn knn_of(all: Vec<(f32, PointIndex)>, k: usize) -> Vec<(f32, PointIndex)> {
    let mut heap = KnnQueryHeap::new(k);
    for (d, i) in all {
        heap.push_outlier(i, d);
    }
    heap.unpack()
}

fn range_of(all: Vec<(f32, PointIndex)>, radius: f32) -> Vec<(f32, PointIndex)> {
    let mut found: Vec<(f32, PointIndex)> = all.into_iter().filter(|(d, _)| *d <= radius).collect();
    found.sort_by(by_distance);
    found
}

/// Brute force kNN through a distance query.
#[derive(Debug)]
pub struct LinearScanKnn {
    dq: Arc<dyn DistanceQuery>,
}

impl LinearScanKnn {
    ///
    pub fn new(dq: Arc<dyn DistanceQuery>) -> LinearScanKnn {
        LinearScanKnn { dq }
    }
}

impl KnnSearcher for LinearScanKnn {
    fn knn(&self, query: QueryPoint, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        Ok(knn_of(all_distances(self.dq.as_ref(), query)?, k))
    }
}

/// Brute force kNN for the euclidean distance. Ranks by squared distance and only takes the root
/// of the survivors.
#[derive(Debug)]
pub struct EuclideanLinearScanKnn {
    relation: Arc<dyn PointCloud>,
}

impl EuclideanLinearScanKnn {
    ///
    pub fn new(relation: Arc<dyn PointCloud>) -> EuclideanLinearScanKnn {
        EuclideanLinearScanKnn { relation }
    }
}

impl KnnSearcher for EuclideanLinearScanKnn {
    fn knn(&self, query: QueryPoint, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let found = knn_of(all_sq_l2(self.relation.as_ref(), query)?, k);
        Ok(found.into_iter().map(|(d, i)| (d.sqrt(), i)).collect())
    }
}

/// Brute force range search through a distance query.
#[derive(Debug)]
pub struct LinearScanRange {
    dq: Arc<dyn DistanceQuery>,
}

impl LinearScanRange {
    ///
    pub fn new(dq: Arc<dyn DistanceQuery>) -> LinearScanRange {
        LinearScanRange { dq }
    }
}

impl RangeSearcher for LinearScanRange {
    fn range(&self, query: QueryPoint, radius: f32) -> SimdexResult<Vec<(f32, PointIndex)>> {
        Ok(range_of(all_distances(self.dq.as_ref(), query)?, radius))
    }
}

/// Brute force range search for the euclidean distance, compares squared distances.
#[derive(Debug)]
pub struct EuclideanLinearScanRange {
    relation: Arc<dyn PointCloud>,
}

impl EuclideanLinearScanRange {
    ///
    pub fn new(relation: Arc<dyn PointCloud>) -> EuclideanLinearScanRange {
        EuclideanLinearScanRange { relation }
    }
}

impl RangeSearcher for EuclideanLinearScanRange {
    fn range(&self, query: QueryPoint, radius: f32) -> SimdexResult<Vec<(f32, PointIndex)>> {
        if radius < 0.0 {
            return Ok(Vec::new());
        }
        let found = range_of(all_sq_l2(self.relation.as_ref(), query)?, radius * radius);
        Ok(found.into_iter().map(|(d, i)| (d.sqrt(), i)).collect())
    }
}

/// Reverse kNN by asking every object for its own `k` nearest neighbors.
#[derive(Debug)]
pub struct LinearScanRknn {
    dq: Arc<dyn DistanceQuery>,
    knn: Arc<dyn KnnSearcher>,
}

impl LinearScanRknn {
    /// `knn` answers the per object lookups, it has to use the same distance as `dq`.
    pub fn new(dq: Arc<dyn DistanceQuery>, knn: Arc<dyn KnnSearcher>) -> LinearScanRknn {
        LinearScanRknn { dq, knn }
    }
}

impl RknnSearcher for LinearScanRknn {
    fn rknn(&self, query: QueryPoint, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let dq = self.dq.as_ref();
        let found: Vec<Option<(f32, PointIndex)>> = dq
            .relation()
            .reference_indexes()
            .into_par_iter()
            .map(|o| -> SimdexResult<Option<(f32, PointIndex)>> {
                let neighbors = self.knn.knn(QueryPoint::Index(o), k)?;
                let k_dist = if neighbors.len() < k {
                    f32::INFINITY
                } else {
                    neighbors[k - 1].0
                };
                let d = dq.dist(query, QueryPoint::Index(o))?;
                Ok(if d <= k_dist { Some((d, o)) } else { None })
            })
            .collect::<SimdexResult<_>>()?;
        let mut found: Vec<(f32, PointIndex)> = found.into_iter().flatten().collect();
        found.sort_by(by_distance);
        Ok(found)
    }
}

/// Incremental search that computes every distance up front and hands them out in order.
#[derive(Debug)]
pub struct LinearScanPriority {
    dq: Arc<dyn DistanceQuery>,
}

impl LinearScanPriority {
    ///
    pub fn new(dq: Arc<dyn DistanceQuery>) -> LinearScanPriority {
        LinearScanPriority { dq }
    }
}

impl PrioritySearch for LinearScanPriority {
    fn search<'a>(&'a self, query: QueryPoint) -> SimdexResult<Box<dyn PrioritySearcher + 'a>> {
        let mut remaining = all_distances(self.dq.as_ref(), query)?;
        remaining.sort_by(|a, b| by_distance(b, a));
        Ok(Box::new(SortedSearcher {
            remaining,
            cutoff: f32::INFINITY,
        }))
    }
}

/// Hands out a sorted list back to front.
#[derive(Debug)]
struct SortedSearcher {
    remaining: Vec<(f32, PointIndex)>,
    cutoff: f32,
}

impl PrioritySearcher for SortedSearcher {
    fn next_candidate(&mut self) -> SimdexResult<Option<PriorityCandidate>> {
        match self.remaining.pop() {
            Some((d, index)) if d <= self.cutoff => Ok(Some(PriorityCandidate {
                index,
                lower_bound: d,
                upper_bound: d,
            })),
            _ => {
                self.remaining.clear();
                Ok(None)
            }
        }
    }

    fn all_lower_bound(&self) -> f32 {
        self.remaining.last().map(|x| x.0).unwrap_or(f32::INFINITY)
    }

    fn cutoff(&self) -> f32 {
        self.cutoff
    }

    fn decrease_cutoff(&mut self, cutoff: f32) {
        if cutoff < self.cutoff {
            self.cutoff = cutoff;
        }
    }
}

/// Brute force similarity range search.
#[derive(Debug)]
pub struct LinearScanSimilarityRange {
    sq: Arc<dyn SimilarityQuery>,
}

impl LinearScanSimilarityRange {
    ///
    pub fn new(sq: Arc<dyn SimilarityQuery>) -> LinearScanSimilarityRange {
        LinearScanSimilarityRange { sq }
    }
}

impl SimilarityRangeSearcher for LinearScanSimilarityRange {
    fn similarity_range(
        &self,
        query: QueryPoint,
        min_similarity: f32,
    ) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let sq = self.sq.as_ref();
        let all: Vec<(f32, PointIndex)> = sq
            .relation()
            .reference_indexes()
            .into_par_iter()
            .map(|i| -> SimdexResult<(f32, PointIndex)> {
                Ok((sq.similarity(query, QueryPoint::Index(i))?, i))
            })
            .collect::<SimdexResult<_>>()?;
        let mut found: Vec<(f32, PointIndex)> =
            all.into_iter().filter(|(s, _)| *s >= min_similarity).collect();
        found.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        Ok(found)
    }
}
