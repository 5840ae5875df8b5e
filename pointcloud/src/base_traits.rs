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

use crate::distances::*;
use crate::errors::*;
use crate::PointIndex;
use rayon::prelude::*;
use std::cmp::min;
use std::fmt::Debug;
use std::sync::Mutex;

fn chunk(data_dim: usize) -> usize {
    min(15000 / data_dim.max(1), 20)
}

/// Base trait for a point cloud, the relation every index is built over.
///
/// Only read access is needed. Implementors must be safe to read from many threads at once.
pub trait PointCloud: Debug + Send + Sync + 'static {
    /// The number of samples this cloud covers
    fn len(&self) -> usize;
    /// If this is empty
    fn is_empty(&self) -> bool;
    /// The dimension of the underlying data
    fn dim(&self) -> usize;
    /// Indexes used for access
    fn reference_indexes(&self) -> Vec<PointIndex>;
    /// Gets a point from this dataset
    fn point(&self, pi: PointIndex) -> PointCloudResult<&[f32]>;

    /// True when the reference indexes are exactly `0..len`.
    fn is_contiguous(&self) -> bool {
        self.reference_indexes()
            .iter()
            .enumerate()
            .all(|(i, pi)| i == *pi)
    }

    /// Distance between two points of this cloud, going through the index based evaluation
    /// when the function offers one.
    fn distance(&self, distance: &dyn Distance, i: PointIndex, j: PointIndex) -> PointCloudResult<f32> {
        match distance.dist_by_index(i, j) {
            Some(d) => Ok(d),
            None => match distance.input_type() {
                InputType::DenseVector => Ok(distance.dist(self.point(i)?, self.point(j)?)),
                InputType::PointIndex => Err(PointCloudError::IndexOnlyDistance("dense evaluation")),
            },
        }
    }

    /// Distances from the point at index `i` to a list of indexes.
    fn distances_to_point_index(
        &self,
        distance: &dyn Distance,
        i: PointIndex,
        indexes: &[PointIndex],
    ) -> PointCloudResult<Vec<f32>> {
        match distance.input_type() {
            InputType::DenseVector => self.distances_to_point(distance, self.point(i)?, indexes),
            InputType::PointIndex => indexes.iter().map(|j| self.distance(distance, i, *j)).collect(),
        }
    }

    /// The main distance function. This paralizes if there are more than a few chunks of points.
    fn distances_to_point(
        &self,
        distance: &dyn Distance,
        point: &[f32],
        indexes: &[PointIndex],
    ) -> PointCloudResult<Vec<f32>> {
        if distance.input_type() == InputType::PointIndex {
            return Err(PointCloudError::IndexOnlyDistance("dense query"));
        }
        if point.len() != self.dim() {
            return Err(PointCloudError::dimension_mismatch(self.dim(), point.len()));
        }
        let chunk = chunk(self.dim());
        let len = indexes.len();
        if len > chunk * 3 {
            let mut dists: Vec<f32> = vec![0.0; len];
            let dist_iter = dists.par_chunks_mut(chunk);
            let indexes_iter = indexes.par_chunks(chunk);
            let error: Mutex<Result<(), PointCloudError>> = Mutex::new(Ok(()));
            dist_iter
                .zip(indexes_iter)
                .for_each(|(chunk_dists, chunk_indexes)| {
                    for (d, i) in chunk_dists.iter_mut().zip(chunk_indexes) {
                        match self.point(*i) {
                            Ok(y) => *d = distance.dist(point, y),
                            Err(e) => {
                                if let Ok(mut slot) = error.lock() {
                                    *slot = Err(e);
                                }
                            }
                        }
                    }
                });
            match error.into_inner() {
                Ok(res) => res?,
                Err(poisoned) => poisoned.into_inner()?,
            }
            Ok(dists)
        } else {
            indexes
                .iter()
                .map(|i| Ok(distance.dist(point, self.point(*i)?)))
                .collect()
        }
    }
}
