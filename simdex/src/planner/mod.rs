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

//! # Query planning
//!
//! Given a [`Relation`] and a distance or similarity function, the planner hands back a ready query
//! object for one category of query. It resolves every request the same way:
//!
//! 1. An index already attached to the relation, most recently attached first.
//! 2. An index the [`QueryOptimizer`] builds on the spot, attached to the relation unless the
//!    request says [`QueryFlags::NO_CACHE`].
//! 3. A linear scan.
//!
//! ```
//! use simdex::planner::*;
//! use pointcloud::{PointCloud, L2};
//! use pointcloud::data_sources::DataRam;
//! use std::sync::Arc;
//!
//! let cloud: Arc<dyn PointCloud> = Arc::new(DataRam::new((0..20).map(|i| i as f32).collect(), 1).unwrap());
//! let relation = Relation::new(cloud);
//! let planner = Planner::new(Arc::new(DisabledOptimizer));
//! let knn = planner.distance(&relation, Arc::new(L2)).knn(3).unwrap().unwrap();
//! let found = knn.knn(QueryPoint::Vector(&[4.2]), 2).unwrap();
//! assert_eq!(found[0].1, 4);
//! assert_eq!(found[1].1, 5);
//! ```

mod flags;
mod index;
mod linear;
mod optimizer;
mod queries;
mod relation;

pub use flags::QueryFlags;
pub use index::*;
pub use linear::*;
pub use optimizer::*;
pub use queries::*;
pub use relation::Relation;

pub use crate::query_tools::{PriorityCandidate, PrioritySearcher};

use crate::errors::*;
use log::{debug, info};
use pointcloud::distances::{Distance, InputType, Similarity, L2};
use std::env;
use std::sync::Arc;

/// The environment variable [`Planner::from_env`] reads.
pub const OPTIMIZER_ENV: &str = "SIMDEX_OPTIMIZER";

/// Hands out [`QueryBuilder`]s that all share one optimizer.
#[derive(Debug, Clone)]
pub struct Planner {
    optimizer: Arc<dyn QueryOptimizer>,
}

impl Default for Planner {
    fn default() -> Planner {
        Planner::new(Arc::new(EmpiricalOptimizer::default()))
    }
}

impl Planner {
    ///
    pub fn new(optimizer: Arc<dyn QueryOptimizer>) -> Planner {
        Planner { optimizer }
    }

    /// Picks the optimizer named by `SIMDEX_OPTIMIZER`. Unset means the empirical optimizer, an
    /// empty value disables it.
    pub fn from_env() -> SimdexResult<Planner> {
        match env::var(OPTIMIZER_ENV) {
            Ok(name) => Planner::from_name(&name),
            Err(_) => Ok(Planner::default()),
        }
    }

    /// Picks an optimizer by name, `""` and `"disabled"` turn it off.
    pub fn from_name(name: &str) -> SimdexResult<Planner> {
        match name.trim() {
            "" | "disabled" => {
                info!("query optimizer disabled");
                Ok(Planner::new(Arc::new(DisabledOptimizer)))
            }
            "empirical" => Ok(Planner::default()),
            other => Err(SimdexError::UnknownOptimizer(other.to_string())),
        }
    }

    ///
    pub fn optimizer(&self) -> &Arc<dyn QueryOptimizer> {
        &self.optimizer
    }

    /// A request on the relation with no function bound yet.
    pub fn query<'p>(&'p self, relation: &'p Relation) -> QueryBuilder<'p> {
        QueryBuilder {
            planner: self,
            relation,
            distance: None,
            similarity: None,
            flags: QueryFlags::NONE,
        }
    }

    /// A request on the relation under a distance.
    pub fn distance<'p>(&'p self, relation: &'p Relation, distance: Arc<dyn Distance>) -> QueryBuilder<'p> {
        self.query(relation).with_distance(distance)
    }

    /// A request on the relation under a similarity.
    pub fn similarity<'p>(&'p self, relation: &'p Relation, similarity: Arc<dyn Similarity>) -> QueryBuilder<'p> {
        self.query(relation).with_similarity(similarity)
    }
}

/// One query request. Set the flags, then ask for a category of query.
///
/// Every category returns `Ok(None)` when no query satisfies the flags, which only happens with
/// [`QueryFlags::OPTIMIZED_ONLY`]. Asking for a category without binding the function it needs is
/// an error.
#[derive(Debug, Clone)]
pub struct QueryBuilder<'p> {
    planner: &'p Planner,
    relation: &'p Relation,
    distance: Option<Arc<dyn Distance>>,
    similarity: Option<Arc<dyn Similarity>>,
    flags: QueryFlags,
}

impl<'p> QueryBuilder<'p> {
    ///
    pub fn with_distance(mut self, distance: Arc<dyn Distance>) -> Self {
        self.distance = Some(distance);
        self
    }

    ///
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Panics if the request is already optimized only.
    pub fn linear_only(mut self) -> Self {
        assert!(
            !self.flags.contains(QueryFlags::OPTIMIZED_ONLY),
            "a query can't be both linear only and optimized only"
        );
        self.flags |= QueryFlags::LINEAR_ONLY;
        self
    }

    /// Panics if the request is already linear only.
    pub fn optimized_only(mut self) -> Self {
        assert!(
            !self.flags.contains(QueryFlags::LINEAR_ONLY),
            "a query can't be both linear only and optimized only"
        );
        self.flags |= QueryFlags::OPTIMIZED_ONLY;
        self
    }

    ///
    pub fn exact_only(mut self) -> Self {
        self.flags |= QueryFlags::EXACT_ONLY;
        self
    }

    ///
    pub fn cheap_only(mut self) -> Self {
        self.flags |= QueryFlags::CHEAP_ONLY;
        self
    }

    ///
    pub fn no_cache(mut self) -> Self {
        self.flags |= QueryFlags::NO_CACHE;
        self
    }

    ///
    pub fn precompute(mut self) -> Self {
        self.flags |= QueryFlags::PRECOMPUTE;
        self
    }

    ///
    pub fn flags(&self) -> QueryFlags {
        self.flags
    }

    /// First attached index that serves the request.
    fn reuse<T: ?Sized>(
        &self,
        kind: &str,
        flags: QueryFlags,
        serve: impl Fn(Arc<dyn QueryIndex>) -> Option<Arc<T>>,
    ) -> Option<Arc<T>> {
        if flags.contains(QueryFlags::LINEAR_ONLY) {
            return None;
        }
        for index in self.relation.indexes() {
            let name = index.name().to_string();
            if let Some(query) = serve(index) {
                debug!("using the {} for {} queries", name, kind);
                return Some(query);
            }
        }
        None
    }

    fn optimize(&self, flags: QueryFlags) -> bool {
        !flags.intersects(QueryFlags::NO_OPTIMIZER)
    }

    fn distance_function(&self) -> SimdexResult<&Arc<dyn Distance>> {
        self.distance.as_ref().ok_or(SimdexError::MissingFunction)
    }

    fn similarity_function(&self) -> SimdexResult<&Arc<dyn Similarity>> {
        self.similarity.as_ref().ok_or(SimdexError::MissingFunction)
    }

    /// A distance query answering object to object distances.
    pub fn distance_query(&self) -> SimdexResult<Option<Arc<dyn DistanceQuery>>> {
        self.distance_query_with(self.flags)
    }

    /// The distance query a search derives for itself. It does not precompute anything, and it
    /// may be primitive even when the search itself has to be optimized.
    fn derived_distance_query(&self) -> SimdexResult<Option<Arc<dyn DistanceQuery>>> {
        self.distance_query_with(
            self.flags
                .without(QueryFlags::PRECOMPUTE)
                .without(QueryFlags::OPTIMIZED_ONLY),
        )
    }

    fn distance_query_with(&self, flags: QueryFlags) -> SimdexResult<Option<Arc<dyn DistanceQuery>>> {
        let distance = self.distance_function()?;
        if let Some(q) = self.reuse("distance", flags, |index| index.distance_query(distance, flags)) {
            return Ok(Some(q));
        }
        if self.optimize(flags) {
            if let Some(q) = self.planner.optimizer.distance_query(self.relation, distance, flags) {
                return Ok(Some(q));
            }
        }
        // Index only distances are lookups already, nothing to optimize.
        if flags.contains(QueryFlags::OPTIMIZED_ONLY) && distance.input_type() != InputType::PointIndex {
            return Ok(None);
        }
        Ok(Some(Arc::new(PrimitiveDistanceQuery::new(
            Arc::clone(self.relation.point_cloud()),
            Arc::clone(distance),
            flags,
        ))))
    }

    /// A similarity query answering object to object similarities.
    pub fn similarity_query(&self) -> SimdexResult<Option<Arc<dyn SimilarityQuery>>> {
        self.similarity_query_with(self.flags)
    }

    fn similarity_query_with(&self, flags: QueryFlags) -> SimdexResult<Option<Arc<dyn SimilarityQuery>>> {
        let similarity = self.similarity_function()?;
        if let Some(q) = self.reuse("similarity", flags, |index| index.similarity_query(similarity, flags)) {
            return Ok(Some(q));
        }
        if self.optimize(flags) {
            if let Some(q) = self.planner.optimizer.similarity_query(self.relation, similarity, flags) {
                return Ok(Some(q));
            }
        }
        if flags.contains(QueryFlags::OPTIMIZED_ONLY) {
            return Ok(None);
        }
        Ok(Some(Arc::new(PrimitiveSimilarityQuery::new(
            Arc::clone(self.relation.point_cloud()),
            Arc::clone(similarity),
            flags,
        ))))
    }

    fn is_euclidean(dq: &Arc<dyn DistanceQuery>) -> bool {
        dq.is_primitive() && dq.distance().name() == L2::NAME
    }

    /// A k nearest neighbor searcher for `k` up to `max_k`.
    pub fn knn(&self, max_k: usize) -> SimdexResult<Option<Arc<dyn KnnSearcher>>> {
        let dq = match self.derived_distance_query()? {
            Some(dq) => dq,
            None => return Ok(None),
        };
        let flags = self.flags;
        if let Some(q) = self.reuse("kNN", flags, |index| index.knn_searcher(&dq, max_k, flags)) {
            return Ok(Some(q));
        }
        if self.optimize(flags) {
            if let Some(q) = self.planner.optimizer.knn_searcher(self.relation, &dq, max_k, flags) {
                return Ok(Some(q));
            }
        }
        if flags.contains(QueryFlags::OPTIMIZED_ONLY) {
            return Ok(None);
        }
        debug!("no index for kNN queries under {}, scanning", dq.distance().name());
        if Self::is_euclidean(&dq) {
            Ok(Some(Arc::new(EuclideanLinearScanKnn::new(Arc::clone(dq.relation())))))
        } else {
            Ok(Some(Arc::new(LinearScanKnn::new(dq))))
        }
    }

    /// A range searcher for radii up to `max_radius`.
    pub fn range(&self, max_radius: f32) -> SimdexResult<Option<Arc<dyn RangeSearcher>>> {
        let dq = match self.derived_distance_query()? {
            Some(dq) => dq,
            None => return Ok(None),
        };
        let flags = self.flags;
        if let Some(q) = self.reuse("range", flags, |index| index.range_searcher(&dq, max_radius, flags)) {
            return Ok(Some(q));
        }
        if self.optimize(flags) {
            if let Some(q) = self.planner.optimizer.range_searcher(self.relation, &dq, max_radius, flags) {
                return Ok(Some(q));
            }
        }
        if flags.contains(QueryFlags::OPTIMIZED_ONLY) {
            return Ok(None);
        }
        debug!("no index for range queries under {}, scanning", dq.distance().name());
        if Self::is_euclidean(&dq) {
            Ok(Some(Arc::new(EuclideanLinearScanRange::new(Arc::clone(dq.relation())))))
        } else {
            Ok(Some(Arc::new(LinearScanRange::new(dq))))
        }
    }

    /// A reverse k nearest neighbor searcher for `k` up to `max_k`.
    pub fn rknn(&self, max_k: usize) -> SimdexResult<Option<Arc<dyn RknnSearcher>>> {
        let dq = match self.derived_distance_query()? {
            Some(dq) => dq,
            None => return Ok(None),
        };
        let flags = self.flags;
        if let Some(q) = self.reuse("reverse kNN", flags, |index| index.rknn_searcher(&dq, max_k, flags)) {
            return Ok(Some(q));
        }
        if self.optimize(flags) {
            if let Some(q) = self.planner.optimizer.rknn_searcher(self.relation, &dq, max_k, flags) {
                return Ok(Some(q));
            }
        }
        if flags.contains(QueryFlags::OPTIMIZED_ONLY) {
            return Ok(None);
        }
        debug!("no index for reverse kNN queries under {}, scanning", dq.distance().name());
        let knn = match self.knn(max_k)? {
            Some(knn) => knn,
            None => Arc::new(LinearScanKnn::new(Arc::clone(&dq))),
        };
        Ok(Some(Arc::new(LinearScanRknn::new(dq, knn))))
    }

    /// A priority search that visits objects up to `max_radius` away, nearest first.
    pub fn priority(&self, max_radius: f32) -> SimdexResult<Option<Arc<dyn PrioritySearch>>> {
        let dq = match self.derived_distance_query()? {
            Some(dq) => dq,
            None => return Ok(None),
        };
        let flags = self.flags;
        if let Some(q) = self.reuse("priority", flags, |index| index.priority_search(&dq, max_radius, flags)) {
            return Ok(Some(q));
        }
        if self.optimize(flags) {
            if let Some(q) = self.planner.optimizer.priority_search(self.relation, &dq, max_radius, flags) {
                return Ok(Some(q));
            }
        }
        if flags.contains(QueryFlags::OPTIMIZED_ONLY) {
            return Ok(None);
        }
        debug!("no index for priority searches under {}, scanning", dq.distance().name());
        Ok(Some(Arc::new(LinearScanPriority::new(dq))))
    }

    /// A similarity range searcher for thresholds down to `max_range`.
    pub fn similarity_range(&self, max_range: f32) -> SimdexResult<Option<Arc<dyn SimilarityRangeSearcher>>> {
        let derived = self
            .flags
            .without(QueryFlags::PRECOMPUTE)
            .without(QueryFlags::OPTIMIZED_ONLY);
        let sq = match self.similarity_query_with(derived)? {
            Some(sq) => sq,
            None => return Ok(None),
        };
        let flags = self.flags;
        if let Some(q) = self.reuse("similarity range", flags, |index| {
            index.similarity_range_searcher(&sq, max_range, flags)
        }) {
            return Ok(Some(q));
        }
        if self.optimize(flags) {
            if let Some(q) = self
                .planner
                .optimizer
                .similarity_range_searcher(self.relation, &sq, max_range, flags)
            {
                return Ok(Some(q));
            }
        }
        if flags.contains(QueryFlags::OPTIMIZED_ONLY) {
            return Ok(None);
        }
        debug!("no index for similarity range queries under {}, scanning", sq.similarity_function().name());
        Ok(Some(Arc::new(LinearScanSimilarityRange::new(sq))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covertree::CoverTreeBuilder;
    use pointcloud::data_sources::DataRam;
    use pointcloud::distances::{LinearKernel, RandomStableDistance, L1};
    use pointcloud::PointCloud;
    use std::sync::Mutex;

    /// Declines everything, remembering what it was asked.
    #[derive(Debug, Default)]
    struct SpyOptimizer {
        seen: Mutex<Vec<(&'static str, QueryFlags)>>,
    }

    impl SpyOptimizer {
        fn saw(&self, kind: &'static str, flags: QueryFlags) {
            self.seen.lock().unwrap().push((kind, flags));
        }
        fn seen(&self) -> Vec<(&'static str, QueryFlags)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl QueryOptimizer for SpyOptimizer {
        fn name(&self) -> &str {
            "spy"
        }
        fn distance_query(
            &self,
            _relation: &Relation,
            _distance: &Arc<dyn Distance>,
            flags: QueryFlags,
        ) -> Option<Arc<dyn DistanceQuery>> {
            self.saw("distance", flags);
            None
        }
        fn knn_searcher(
            &self,
            _relation: &Relation,
            dq: &Arc<dyn DistanceQuery>,
            _max_k: usize,
            flags: QueryFlags,
        ) -> Option<Arc<dyn KnnSearcher>> {
            self.saw("derived", dq.flags());
            self.saw("knn", flags);
            None
        }
    }

    fn relation() -> Relation {
        let data = (0..50).flat_map(|i| vec![i as f32, (i % 5) as f32]).collect();
        let cloud: Arc<dyn PointCloud> = Arc::new(DataRam::new(data, 2).unwrap());
        Relation::new(cloud)
    }

    #[test]
    fn precompute_stays_with_the_request() {
        let spy = Arc::new(SpyOptimizer::default());
        let planner = Planner::new(spy.clone());
        let relation = relation();
        let knn = planner.distance(&relation, Arc::new(L2)).precompute().knn(5).unwrap();
        assert!(knn.is_some());
        assert_eq!(
            spy.seen(),
            vec![
                ("distance", QueryFlags::NONE),
                ("derived", QueryFlags::NONE),
                ("knn", QueryFlags::PRECOMPUTE)
            ]
        );

        let dq = planner
            .distance(&relation, Arc::new(L2))
            .precompute()
            .no_cache()
            .distance_query()
            .unwrap()
            .unwrap();
        assert_eq!(dq.flags(), QueryFlags::PRECOMPUTE | QueryFlags::NO_CACHE);
    }

    #[test]
    fn cheap_and_linear_requests_skip_the_optimizer() {
        let spy = Arc::new(SpyOptimizer::default());
        let planner = Planner::new(spy.clone());
        let relation = relation();
        planner.distance(&relation, Arc::new(L2)).cheap_only().knn(5).unwrap().unwrap();
        planner.distance(&relation, Arc::new(L2)).linear_only().knn(5).unwrap().unwrap();
        assert!(spy.seen().is_empty());
    }

    #[test]
    fn optimized_only_needs_an_index() {
        let planner = Planner::new(Arc::new(DisabledOptimizer));
        let relation = relation();
        let l1: Arc<dyn Distance> = Arc::new(L1);
        assert!(planner.distance(&relation, Arc::clone(&l1)).optimized_only().knn(3).unwrap().is_none());
        assert!(planner
            .distance(&relation, Arc::clone(&l1))
            .optimized_only()
            .distance_query()
            .unwrap()
            .is_none());
        // Index only distances need no index for their distance query.
        let stable: Arc<dyn Distance> = Arc::new(RandomStableDistance::new(3));
        let dq = planner.distance(&relation, stable).optimized_only().distance_query().unwrap();
        assert!(dq.is_some());

        let index: Arc<dyn QueryIndex> = Arc::new(
            CoverTreeIndex::build(Arc::clone(relation.point_cloud()), Arc::clone(&l1), &CoverTreeBuilder::new())
                .unwrap(),
        );
        relation.attach(&index);
        let knn = planner
            .distance(&relation, Arc::clone(&l1))
            .optimized_only()
            .knn(3)
            .unwrap()
            .unwrap();
        let expected = LinearScanKnn::new(Arc::new(PrimitiveDistanceQuery::new(
            Arc::clone(relation.point_cloud()),
            l1,
            QueryFlags::NONE,
        )))
        .knn(QueryPoint::Index(12), 3)
        .unwrap();
        assert_eq!(knn.knn(QueryPoint::Index(12), 3).unwrap(), expected);
    }

    #[test]
    fn the_empirical_optimizer_attaches_what_it_builds() {
        let planner = Planner::default();
        let relation = relation();
        let range = planner.distance(&relation, Arc::new(L2)).range(2.0).unwrap().unwrap();
        assert_eq!(relation.indexes().len(), 1);
        let found = range.range(QueryPoint::Vector(&[10.0, 0.0]), 1.0).unwrap();
        assert_eq!(found, vec![(0.0, 10)]);

        let again = planner.distance(&relation, Arc::new(L2)).cheap_only().range(2.0).unwrap().unwrap();
        assert_eq!(again.range(QueryPoint::Index(10), 1.0).unwrap(), found);
        drop(range);
        drop(again);
        assert!(relation.indexes().is_empty());
    }

    #[test]
    fn missing_functions_are_errors() {
        let planner = Planner::new(Arc::new(DisabledOptimizer));
        let relation = relation();
        assert!(planner.query(&relation).knn(2).is_err());
        assert!(planner.distance(&relation, Arc::new(L2)).similarity_range(0.0).is_err());
        let kernel: Arc<dyn Similarity> = Arc::new(LinearKernel);
        assert!(planner.similarity(&relation, kernel).similarity_range(0.0).unwrap().is_some());
    }

    #[test]
    #[should_panic]
    fn linear_and_optimized_only_conflict() {
        let planner = Planner::new(Arc::new(DisabledOptimizer));
        let relation = relation();
        let _ = planner.distance(&relation, Arc::new(L2)).linear_only().optimized_only();
    }

    #[test]
    fn optimizers_by_name() {
        assert_eq!(Planner::from_name("").unwrap().optimizer().name(), "disabled");
        assert_eq!(Planner::from_name("disabled").unwrap().optimizer().name(), "disabled");
        assert_eq!(Planner::from_name("empirical").unwrap().optimizer().name(), "empirical");
        match Planner::from_name("genetic") {
            Err(SimdexError::UnknownOptimizer(name)) => assert_eq!(name, "genetic"),
            other => panic!("expected an unknown optimizer, got {:?}", other.map(|p| p.optimizer().name().to_string())),
        }
    }
}
