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

//! Indexes the planner knows how to use. Each one says, per request, whether it can serve it.

use super::linear::*;
use super::queries::*;
use super::relation::same_cloud;
use super::QueryFlags;
use crate::covertree::{CoverTree, CoverTreeBuilder, CoverTreeVariant};
use crate::errors::*;
use crate::query_tools::PrioritySearcher;
use crate::rstar::{RStarSettings, RStarTree};
use fxhash::FxHashMap;
use log::debug;
use pointcloud::distances::{Distance, InputType, Similarity};
use pointcloud::{PointCloud, PointIndex};
use rayon::prelude::*;
use std::fmt::Debug;
use std::sync::Arc;

/// An index that can be attached to a [`Relation`](super::Relation).
///
/// Every method is a capability check: it returns a query object when the index can answer that
/// request for that function, and `None` otherwise. The defaults serve nothing.
pub trait QueryIndex: Debug + Send + Sync {
    /// Short name for log messages
    fn name(&self) -> &str;

    ///
    fn distance_query(
        self: Arc<Self>,
        _distance: &Arc<dyn Distance>,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn DistanceQuery>> {
        None
    }

    ///
    fn similarity_query(
        self: Arc<Self>,
        _similarity: &Arc<dyn Similarity>,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn SimilarityQuery>> {
        None
    }

    /// `max_k` is the largest `k` the caller is going to ask for.
    fn knn_searcher(
        self: Arc<Self>,
        _dq: &Arc<dyn DistanceQuery>,
        _max_k: usize,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn KnnSearcher>> {
        None
    }

    /// `max_radius` is the largest radius the caller is going to ask for.
    fn range_searcher(
        self: Arc<Self>,
        _dq: &Arc<dyn DistanceQuery>,
        _max_radius: f32,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn RangeSearcher>> {
        None
    }

    ///
    fn rknn_searcher(
        self: Arc<Self>,
        _dq: &Arc<dyn DistanceQuery>,
        _max_k: usize,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn RknnSearcher>> {
        None
    }

    ///
    fn priority_search(
        self: Arc<Self>,
        _dq: &Arc<dyn DistanceQuery>,
        _max_radius: f32,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn PrioritySearch>> {
        None
    }

    ///
    fn similarity_range_searcher(
        self: Arc<Self>,
        _sq: &Arc<dyn SimilarityQuery>,
        _max_range: f32,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn SimilarityRangeSearcher>> {
        None
    }
}

/// Bytes a cover tree over `len` objects is expected to take.
pub fn cover_tree_bytes(len: usize, variant: CoverTreeVariant) -> usize {
    match variant {
        CoverTreeVariant::Full => len * 40,
        CoverTreeVariant::Simplified => len * 16,
    }
}

/// Bytes an R*-tree over `len` objects of dimension `dim` is expected to take.
pub fn rstar_tree_bytes(len: usize, dim: usize) -> usize {
    // Leaves are about two thirds full, directories add a few percent on top.
    len * (dim * 4 + 8) * 8 / 5
}

/// Bytes of a kNN table with `k` neighbors per object.
pub fn materialized_knn_bytes(len: usize, k: usize) -> usize {
    len * k * (std::mem::size_of::<PointIndex>() + 4)
}

/// Bytes of a triangular distance matrix.
pub fn distance_matrix_bytes(len: usize) -> usize {
    len * len.saturating_sub(1) / 2 * 4
}

/// A cover tree registered with the planner.
#[derive(Debug)]
pub struct CoverTreeIndex {
    tree: CoverTree<dyn PointCloud>,
}

impl CoverTreeIndex {
    /// Builds a cover tree over the relation.
    pub fn build(
        relation: Arc<dyn PointCloud>,
        distance: Arc<dyn Distance>,
        builder: &CoverTreeBuilder,
    ) -> SimdexResult<CoverTreeIndex> {
        Ok(CoverTreeIndex {
            tree: builder.build(relation, distance)?,
        })
    }

    ///
    pub fn tree(&self) -> &CoverTree<dyn PointCloud> {
        &self.tree
    }

    fn serves(&self, dq: &Arc<dyn DistanceQuery>, flags: QueryFlags) -> bool {
        !flags.contains(QueryFlags::PRECOMPUTE)
            && same_cloud(dq.relation(), self.tree.point_cloud())
            && dq.distance().same_as(self.tree.distance().as_ref())
    }
}

impl QueryIndex for CoverTreeIndex {
    fn name(&self) -> &str {
        "cover tree"
    }

    fn knn_searcher(
        self: Arc<Self>,
        dq: &Arc<dyn DistanceQuery>,
        _max_k: usize,
        flags: QueryFlags,
    ) -> Option<Arc<dyn KnnSearcher>> {
        if self.serves(dq, flags) {
            Some(Arc::new(CoverTreeSearcher { index: self }))
        } else {
            None
        }
    }

    fn range_searcher(
        self: Arc<Self>,
        dq: &Arc<dyn DistanceQuery>,
        _max_radius: f32,
        flags: QueryFlags,
    ) -> Option<Arc<dyn RangeSearcher>> {
        if self.serves(dq, flags) {
            Some(Arc::new(CoverTreeSearcher { index: self }))
        } else {
            None
        }
    }

    fn priority_search(
        self: Arc<Self>,
        dq: &Arc<dyn DistanceQuery>,
        _max_radius: f32,
        flags: QueryFlags,
    ) -> Option<Arc<dyn PrioritySearch>> {
        if self.serves(dq, flags) {
            Some(Arc::new(CoverTreeSearcher { index: self }))
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct CoverTreeSearcher {
    index: Arc<CoverTreeIndex>,
}

impl KnnSearcher for CoverTreeSearcher {
    fn knn(&self, query: QueryPoint, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        match query {
            QueryPoint::Vector(v) => self.index.tree.knn(v, k),
            QueryPoint::Index(i) => self.index.tree.knn_by_index(i, k),
        }
    }
}

impl RangeSearcher for CoverTreeSearcher {
    fn range(&self, query: QueryPoint, radius: f32) -> SimdexResult<Vec<(f32, PointIndex)>> {
        match query {
            QueryPoint::Vector(v) => self.index.tree.range(v, radius),
            QueryPoint::Index(i) => self.index.tree.range_by_index(i, radius),
        }
    }
}

impl PrioritySearch for CoverTreeSearcher {
    fn search<'a>(&'a self, query: QueryPoint) -> SimdexResult<Box<dyn PrioritySearcher + 'a>> {
        Ok(match query {
            QueryPoint::Vector(v) => Box::new(self.index.tree.priority(v)?),
            QueryPoint::Index(i) => Box::new(self.index.tree.priority_by_index(i)?),
        })
    }
}

/// An R*-tree registered with the planner. It only serves dense vectors and distances that can
/// bound the distance to a box.
#[derive(Debug)]
pub struct RStarTreeIndex {
    relation: Arc<dyn PointCloud>,
    distance: Arc<dyn Distance>,
    tree: RStarTree,
}

impl RStarTreeIndex {
    /// Bulk loads an R*-tree with every object of the relation.
    pub fn build(
        relation: Arc<dyn PointCloud>,
        distance: Arc<dyn Distance>,
        settings: RStarSettings,
    ) -> SimdexResult<RStarTreeIndex> {
        if distance.as_spatial().is_none() || distance.input_type() != InputType::DenseVector {
            return Err(SimdexError::UnsupportedDistance(distance.name().to_string()));
        }
        let mut tree = RStarTree::new(settings)?;
        let objects = relation
            .reference_indexes()
            .into_iter()
            .map(|i| -> SimdexResult<(PointIndex, Vec<f32>)> { Ok((i, relation.point(i)?.to_vec())) })
            .collect::<SimdexResult<Vec<_>>>()?;
        tree.bulk_load(objects)?;
        debug!("bulk loaded an R*-tree of height {} for {}", tree.height(), distance.name());
        Ok(RStarTreeIndex {
            relation,
            distance,
            tree,
        })
    }

    ///
    pub fn tree(&self) -> &RStarTree {
        &self.tree
    }

    fn serves(&self, dq: &Arc<dyn DistanceQuery>, flags: QueryFlags) -> bool {
        !flags.contains(QueryFlags::PRECOMPUTE)
            && same_cloud(dq.relation(), &self.relation)
            && dq.distance().as_spatial().is_some()
            && dq.distance().input_type() == InputType::DenseVector
    }
}

impl QueryIndex for RStarTreeIndex {
    fn name(&self) -> &str {
        "R*-tree"
    }

    fn knn_searcher(
        self: Arc<Self>,
        dq: &Arc<dyn DistanceQuery>,
        _max_k: usize,
        flags: QueryFlags,
    ) -> Option<Arc<dyn KnnSearcher>> {
        if self.serves(dq, flags) {
            Some(Arc::new(RStarSearcher {
                index: self,
                distance: Arc::clone(dq.distance()),
            }))
        } else {
            None
        }
    }

    fn range_searcher(
        self: Arc<Self>,
        dq: &Arc<dyn DistanceQuery>,
        _max_radius: f32,
        flags: QueryFlags,
    ) -> Option<Arc<dyn RangeSearcher>> {
        if self.serves(dq, flags) {
            Some(Arc::new(RStarSearcher {
                index: self,
                distance: Arc::clone(dq.distance()),
            }))
        } else {
            None
        }
    }

    fn priority_search(
        self: Arc<Self>,
        dq: &Arc<dyn DistanceQuery>,
        _max_radius: f32,
        flags: QueryFlags,
    ) -> Option<Arc<dyn PrioritySearch>> {
        if self.serves(dq, flags) {
            Some(Arc::new(RStarSearcher {
                index: self,
                distance: Arc::clone(dq.distance()),
            }))
        } else {
            None
        }
    }
}

/// The tree is the same for every spatial distance, the searcher carries the one asked for.
#[derive(Debug)]
struct RStarSearcher {
    index: Arc<RStarTreeIndex>,
    distance: Arc<dyn Distance>,
}

impl RStarSearcher {
    fn spatial(&self) -> SimdexResult<&dyn pointcloud::distances::SpatialDistance> {
        self.distance
            .as_spatial()
            .ok_or_else(|| SimdexError::UnsupportedDistance(self.distance.name().to_string()))
    }
}

impl KnnSearcher for RStarSearcher {
    fn knn(&self, query: QueryPoint, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let point = query.vector(self.index.relation.as_ref())?;
        self.index.tree.knn(self.spatial()?, point, k)
    }
}

impl RangeSearcher for RStarSearcher {
    fn range(&self, query: QueryPoint, radius: f32) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let point = query.vector(self.index.relation.as_ref())?;
        self.index.tree.range(self.spatial()?, point, radius)
    }
}

impl PrioritySearch for RStarSearcher {
    fn search<'a>(&'a self, query: QueryPoint) -> SimdexResult<Box<dyn PrioritySearcher + 'a>> {
        let point = query.vector(self.index.relation.as_ref())?;
        Ok(Box::new(self.index.tree.priority(self.spatial()?, point)?))
    }
}

/// Every object's `k` nearest neighbors, computed once.
///
/// Answers kNN for objects of the relation up to `k` from the table and reverse kNN for any
/// query. kNN of a free vector falls back to scanning.
#[derive(Debug)]
pub struct MaterializedKnnIndex {
    dq: Arc<dyn DistanceQuery>,
    k: usize,
    rows: FxHashMap<PointIndex, usize>,
    table: Vec<Vec<(f32, PointIndex)>>,
}

impl MaterializedKnnIndex {
    /// Fills the table with `knn`, which has to use the same distance as `dq`.
    pub fn build(
        dq: Arc<dyn DistanceQuery>,
        knn: &dyn KnnSearcher,
        k: usize,
    ) -> SimdexResult<MaterializedKnnIndex> {
        if k == 0 {
            return Err(SimdexError::invalid_parameter("k", "the table needs at least one neighbor"));
        }
        let indexes = dq.relation().reference_indexes();
        let table = indexes
            .par_iter()
            .map(|i| knn.knn(QueryPoint::Index(*i), k))
            .collect::<SimdexResult<Vec<_>>>()?;
        let rows = indexes.iter().enumerate().map(|(row, i)| (*i, row)).collect();
        debug!("materialized the {} nearest neighbors of {} objects", k, indexes.len());
        Ok(MaterializedKnnIndex { dq, k, rows, table })
    }

    /// Neighbors per object
    pub fn k(&self) -> usize {
        self.k
    }

    /// The stored neighbors of an object, closest first.
    pub fn neighbors(&self, index: PointIndex) -> Option<&[(f32, PointIndex)]> {
        self.rows.get(&index).map(|row| self.table[*row].as_slice())
    }

    fn serves(&self, dq: &Arc<dyn DistanceQuery>, max_k: usize) -> bool {
        max_k <= self.k
            && same_cloud(dq.relation(), self.dq.relation())
            && dq.distance().same_as(self.dq.distance().as_ref())
    }
}

impl QueryIndex for MaterializedKnnIndex {
    fn name(&self) -> &str {
        "materialized kNN"
    }

    fn knn_searcher(
        self: Arc<Self>,
        dq: &Arc<dyn DistanceQuery>,
        max_k: usize,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn KnnSearcher>> {
        if self.serves(dq, max_k) {
            Some(Arc::new(MaterializedSearcher { index: self }))
        } else {
            None
        }
    }

    fn rknn_searcher(
        self: Arc<Self>,
        dq: &Arc<dyn DistanceQuery>,
        max_k: usize,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn RknnSearcher>> {
        if self.serves(dq, max_k) {
            Some(Arc::new(MaterializedSearcher { index: self }))
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct MaterializedSearcher {
    index: Arc<MaterializedKnnIndex>,
}

impl KnnSearcher for MaterializedSearcher {
    fn knn(&self, query: QueryPoint, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        if let QueryPoint::Index(i) = query {
            if k <= self.index.k {
                if let Some(row) = self.index.neighbors(i) {
                    return Ok(row.iter().take(k).cloned().collect());
                }
            }
        }
        LinearScanKnn::new(Arc::clone(&self.index.dq)).knn(query, k)
    }
}

impl RknnSearcher for MaterializedSearcher {
    fn rknn(&self, query: QueryPoint, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if k > self.index.k {
            let dq = Arc::clone(&self.index.dq);
            return LinearScanRknn::new(Arc::clone(&dq), Arc::new(LinearScanKnn::new(dq))).rknn(query, k);
        }
        let dq = self.index.dq.as_ref();
        let mut found = Vec::new();
        for (o, row) in &self.index.rows {
            let neighbors = &self.index.table[*row];
            let k_dist = if neighbors.len() < k {
                f32::INFINITY
            } else {
                neighbors[k - 1].0
            };
            let d = dq.dist(query, QueryPoint::Index(*o))?;
            if d <= k_dist {
                found.push((d, *o));
            }
        }
        found.sort_by(|a: &(f32, PointIndex), b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        Ok(found)
    }
}

/// The full pairwise distance matrix of a relation whose indexes are `0..len`.
#[derive(Debug)]
pub struct DistanceMatrixIndex {
    relation: Arc<dyn PointCloud>,
    distance: Arc<dyn Distance>,
    len: usize,
    matrix: Vec<f32>,
}

fn triangle(i: usize, j: usize) -> usize {
    let (a, b) = if i < j { (i, j) } else { (j, i) };
    b * (b - 1) / 2 + a
}

impl DistanceMatrixIndex {
    /// Computes every pairwise distance.
    pub fn build(relation: Arc<dyn PointCloud>, distance: Arc<dyn Distance>) -> SimdexResult<DistanceMatrixIndex> {
        if !relation.is_contiguous() {
            return Err(SimdexError::invalid_parameter(
                "relation",
                "a distance matrix needs the indexes 0..len",
            ));
        }
        let len = relation.len();
        let rows = (1..len)
            .into_par_iter()
            .map(|b| {
                (0..b)
                    .map(|a| relation.distance(distance.as_ref(), a, b).map_err(SimdexError::from))
                    .collect::<SimdexResult<Vec<f32>>>()
            })
            .collect::<SimdexResult<Vec<Vec<f32>>>>()?;
        let matrix: Vec<f32> = rows.into_iter().flatten().collect();
        debug!("precomputed {} distances", matrix.len());
        Ok(DistanceMatrixIndex {
            relation,
            distance,
            len,
            matrix,
        })
    }

    fn lookup(&self, i: PointIndex, j: PointIndex) -> Option<f32> {
        if i >= self.len || j >= self.len {
            None
        } else if i == j {
            Some(0.0)
        } else {
            self.matrix.get(triangle(i, j)).copied()
        }
    }
}

impl QueryIndex for DistanceMatrixIndex {
    fn name(&self) -> &str {
        "distance matrix"
    }

    fn distance_query(
        self: Arc<Self>,
        distance: &Arc<dyn Distance>,
        flags: QueryFlags,
    ) -> Option<Arc<dyn DistanceQuery>> {
        if distance.same_as(self.distance.as_ref()) {
            Some(Arc::new(MatrixDistanceQuery { index: self, flags }))
        } else {
            None
        }
    }
}

/// Looks pairs of objects up in the matrix, free vectors are still evaluated.
#[derive(Debug)]
struct MatrixDistanceQuery {
    index: Arc<DistanceMatrixIndex>,
    flags: QueryFlags,
}

impl DistanceQuery for MatrixDistanceQuery {
    fn relation(&self) -> &Arc<dyn PointCloud> {
        &self.index.relation
    }
    fn distance(&self) -> &Arc<dyn Distance> {
        &self.index.distance
    }
    fn flags(&self) -> QueryFlags {
        self.flags
    }
    fn dist(&self, a: QueryPoint, b: QueryPoint) -> SimdexResult<f32> {
        if let (QueryPoint::Index(i), QueryPoint::Index(j)) = (a, b) {
            if let Some(d) = self.index.lookup(i, j) {
                return Ok(d);
            }
        }
        primitive_dist(self.index.relation.as_ref(), self.index.distance.as_ref(), a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Relation;
    use pointcloud::data_sources::DataRam;
    use pointcloud::distances::{CountingDistance, L1, L2};

    fn grid() -> Arc<dyn PointCloud> {
        let data = (0..10).flat_map(|x| (0..10).flat_map(move |y| vec![x as f32, y as f32 * 1.5])).collect();
        Arc::new(DataRam::new(data, 2).unwrap())
    }

    fn dq(relation: &Arc<dyn PointCloud>, distance: Arc<dyn Distance>) -> Arc<dyn DistanceQuery> {
        Arc::new(PrimitiveDistanceQuery::new(Arc::clone(relation), distance, QueryFlags::NONE))
    }

    #[test]
    fn tree_indexes_only_serve_their_relation_and_function() {
        let relation = grid();
        let other = grid();
        let cover: Arc<CoverTreeIndex> =
            Arc::new(CoverTreeIndex::build(Arc::clone(&relation), Arc::new(L2), &CoverTreeBuilder::new()).unwrap());
        let rstar: Arc<RStarTreeIndex> =
            Arc::new(RStarTreeIndex::build(Arc::clone(&relation), Arc::new(L2), RStarSettings::new()).unwrap());

        let l2 = dq(&relation, Arc::new(L2));
        assert!(Arc::clone(&cover).knn_searcher(&l2, 10, QueryFlags::NONE).is_some());
        assert!(Arc::clone(&cover).knn_searcher(&l2, 10, QueryFlags::PRECOMPUTE).is_none());
        assert!(Arc::clone(&cover).knn_searcher(&dq(&relation, Arc::new(L1)), 10, QueryFlags::NONE).is_none());
        assert!(Arc::clone(&cover).knn_searcher(&dq(&other, Arc::new(L2)), 10, QueryFlags::NONE).is_none());
        // The tree works with any box bounding distance.
        let l1 = dq(&relation, Arc::new(L1));
        let searcher = Arc::clone(&rstar).knn_searcher(&l1, 10, QueryFlags::NONE).unwrap();
        let expected = LinearScanKnn::new(Arc::clone(&l1)).knn(QueryPoint::Index(55), 5).unwrap();
        assert_eq!(searcher.knn(QueryPoint::Index(55), 5).unwrap(), expected);
        let kernel: Arc<dyn Similarity> = Arc::new(pointcloud::distances::LinearKernel);
        assert!(cover.similarity_query(&kernel, QueryFlags::NONE).is_none());
    }

    #[test]
    fn materialized_table_answers_knn_and_rknn() {
        let relation = grid();
        let l2 = dq(&relation, Arc::new(L2));
        let linear = LinearScanKnn::new(Arc::clone(&l2));
        let index = Arc::new(MaterializedKnnIndex::build(Arc::clone(&l2), &linear, 4).unwrap());
        assert_eq!(index.neighbors(0).unwrap().len(), 4);
        assert!(Arc::clone(&index).knn_searcher(&l2, 5, QueryFlags::NONE).is_none());

        let knn = Arc::clone(&index).knn_searcher(&l2, 4, QueryFlags::PRECOMPUTE).unwrap();
        assert_eq!(knn.knn(QueryPoint::Index(23), 3).unwrap(), linear.knn(QueryPoint::Index(23), 3).unwrap());
        let v = [3.3f32, 2.0];
        assert_eq!(knn.knn(QueryPoint::Vector(&v), 2).unwrap(), linear.knn(QueryPoint::Vector(&v), 2).unwrap());

        let rknn = Arc::clone(&index).rknn_searcher(&l2, 4, QueryFlags::NONE).unwrap();
        let scan = LinearScanRknn::new(Arc::clone(&l2), Arc::new(LinearScanKnn::new(Arc::clone(&l2))));
        for q in [0, 44, 99].iter() {
            assert_eq!(
                rknn.rknn(QueryPoint::Index(*q), 3).unwrap(),
                scan.rknn(QueryPoint::Index(*q), 3).unwrap()
            );
        }
    }

    #[test]
    fn distance_matrix_saves_evaluations() {
        let relation = grid();
        let counter = Arc::new(CountingDistance::new(Arc::new(L1)));
        let index = Arc::new(DistanceMatrixIndex::build(Arc::clone(&relation), counter.clone()).unwrap());
        assert_eq!(counter.reset(), 100 * 99 / 2);
        let as_dyn: Arc<dyn Distance> = counter.clone();
        let matrix_dq = Arc::clone(&index).distance_query(&as_dyn, QueryFlags::NONE).unwrap();
        assert!(!matrix_dq.is_primitive());
        assert_approx_eq!(matrix_dq.dist(QueryPoint::Index(0), QueryPoint::Index(99)).unwrap(), 9.0 + 13.5);
        assert_approx_eq!(matrix_dq.dist(QueryPoint::Index(99), QueryPoint::Index(0)).unwrap(), 9.0 + 13.5);
        assert_approx_eq!(matrix_dq.dist(QueryPoint::Index(7), QueryPoint::Index(7)).unwrap(), 0.0);
        assert_eq!(counter.count(), 0);
        assert!(Arc::clone(&index).distance_query(&(Arc::new(L2) as Arc<dyn Distance>), QueryFlags::NONE).is_none());
    }

    #[test]
    fn relations_forget_dropped_indexes() {
        let relation = Relation::new(grid());
        let first: Arc<dyn QueryIndex> =
            Arc::new(DistanceMatrixIndex::build(Arc::clone(relation.point_cloud()), Arc::new(L1)).unwrap());
        let second: Arc<dyn QueryIndex> =
            Arc::new(DistanceMatrixIndex::build(Arc::clone(relation.point_cloud()), Arc::new(L2)).unwrap());
        relation.attach(&first);
        relation.attach(&second);
        let order: Vec<usize> = relation.indexes().iter().map(|i| Arc::as_ptr(i) as *const () as usize).collect();
        assert_eq!(order[0], Arc::as_ptr(&second) as *const () as usize);
        relation.attach(&first);
        assert_eq!(
            Arc::as_ptr(&relation.indexes()[0]) as *const () as usize,
            Arc::as_ptr(&first) as *const () as usize
        );
        assert_eq!(relation.indexes().len(), 2);
        drop(second);
        assert_eq!(relation.indexes().len(), 1);
        assert!(relation.detach(&first));
        assert!(!relation.detach(&first));
        assert!(relation.indexes().is_empty());
    }
}
