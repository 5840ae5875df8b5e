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

//! Interfaces that simplify bulk queries

use crate::errors::*;
use crate::planner::{KnnSearcher, QueryPoint, RangeSearcher};
use pointcloud::PointIndex;
use rayon::prelude::*;
use std::sync::Arc;

const CHUNK_SIZE: usize = 100;

/// Interface for bulk queries. Runs them in parallel over one shared searcher and hands the
/// results back in the order of the queries.
#[derive(Debug)]
pub struct BulkInterface<S: ?Sized> {
    searcher: Arc<S>,
}

impl<S: ?Sized> Clone for BulkInterface<S> {
    fn clone(&self) -> Self {
        BulkInterface {
            searcher: Arc::clone(&self.searcher),
        }
    }
}

impl<S: ?Sized + Send + Sync> BulkInterface<S> {
    /// Creates a new one.
    pub fn new(searcher: Arc<S>) -> Self {
        BulkInterface { searcher }
    }

    ///
    pub fn searcher(&self) -> &Arc<S> {
        &self.searcher
    }

    fn bulk<'a, T, F>(&self, points: &[QueryPoint<'a>], query: F) -> Vec<SimdexResult<T>>
    where
        T: Send,
        F: Fn(&S, QueryPoint<'a>) -> SimdexResult<T> + Sync,
    {
        let chunked_results: Vec<Vec<SimdexResult<T>>> = points
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| chunk.iter().map(|p| query(self.searcher.as_ref(), *p)).collect())
            .collect();
        chunked_results.into_iter().flatten().collect()
    }
}

impl<S: KnnSearcher + ?Sized> BulkInterface<S> {
    /// Bulk knn
    pub fn knn(&self, points: &[QueryPoint], k: usize) -> Vec<SimdexResult<Vec<(f32, PointIndex)>>> {
        self.bulk(points, |searcher, p| searcher.knn(p, k))
    }

    /// Bulk knn of objects of the relation
    pub fn knn_by_index(
        &self,
        point_indexes: &[PointIndex],
        k: usize,
    ) -> Vec<SimdexResult<Vec<(f32, PointIndex)>>> {
        let points: Vec<QueryPoint> = point_indexes.iter().map(|i| QueryPoint::Index(*i)).collect();
        self.knn(&points, k)
    }
}

impl<S: RangeSearcher + ?Sized> BulkInterface<S> {
    /// Bulk range
    pub fn range(&self, points: &[QueryPoint], radius: f32) -> Vec<SimdexResult<Vec<(f32, PointIndex)>>> {
        self.bulk(points, |searcher, p| searcher.range(p, radius))
    }
}
