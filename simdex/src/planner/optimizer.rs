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

//! Deciding which index to build for a query that no attached index can serve.

use super::index::*;
use super::linear::LinearScanKnn;
use super::queries::*;
use super::{QueryFlags, Relation};
use crate::covertree::{CoverTreeBuilder, CoverTreeVariant};
use crate::errors::*;
use crate::rstar::RStarSettings;
use crate::utils::{read_yaml, yaml_enum};
use log::{debug, info, warn};
use pointcloud::distances::{Distance, InputType, Similarity};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use sysinfo::{MemoryRefreshKind, System};

/// Builds indexes on demand. Every method may decline by returning `None`, the planner then falls
/// back to a linear scan.
pub trait QueryOptimizer: Debug + Send + Sync {
    /// Name for log messages
    fn name(&self) -> &str;

    ///
    fn distance_query(
        &self,
        _relation: &Relation,
        _distance: &Arc<dyn Distance>,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn DistanceQuery>> {
        None
    }

    ///
    fn similarity_query(
        &self,
        _relation: &Relation,
        _similarity: &Arc<dyn Similarity>,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn SimilarityQuery>> {
        None
    }

    ///
    fn knn_searcher(
        &self,
        _relation: &Relation,
        _dq: &Arc<dyn DistanceQuery>,
        _max_k: usize,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn KnnSearcher>> {
        None
    }

    ///
    fn range_searcher(
        &self,
        _relation: &Relation,
        _dq: &Arc<dyn DistanceQuery>,
        _max_radius: f32,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn RangeSearcher>> {
        None
    }

    ///
    fn rknn_searcher(
        &self,
        _relation: &Relation,
        _dq: &Arc<dyn DistanceQuery>,
        _max_k: usize,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn RknnSearcher>> {
        None
    }

    ///
    fn priority_search(
        &self,
        _relation: &Relation,
        _dq: &Arc<dyn DistanceQuery>,
        _max_radius: f32,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn PrioritySearch>> {
        None
    }

    ///
    fn similarity_range_searcher(
        &self,
        _relation: &Relation,
        _sq: &Arc<dyn SimilarityQuery>,
        _max_range: f32,
        _flags: QueryFlags,
    ) -> Option<Arc<dyn SimilarityRangeSearcher>> {
        None
    }
}

/// Never builds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOptimizer;

impl QueryOptimizer for DisabledOptimizer {
    fn name(&self) -> &str {
        "disabled"
    }
}

/// Limits of the [`EmpiricalOptimizer`].
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Share of the available memory a new index may take
    pub memory_fraction: f32,
    /// Use this many bytes as the available memory instead of asking the system
    pub memory_limit: Option<usize>,
    /// R*-trees are only built up to this dimension
    pub max_spatial_dim: usize,
    /// Distance matrices are only built up to this many objects
    pub max_matrix_size: usize,
    /// Materialized kNN tables are only built up to this `k`
    pub max_materialized_k: usize,
    /// The cover trees it builds
    pub cover_tree_variant: CoverTreeVariant,
}

impl Default for OptimizerConfig {
    fn default() -> OptimizerConfig {
        OptimizerConfig {
            memory_fraction: 0.25,
            memory_limit: None,
            max_spatial_dim: 16,
            max_matrix_size: 10_000,
            max_materialized_k: 100,
            cover_tree_variant: CoverTreeVariant::Simplified,
        }
    }
}

impl OptimizerConfig {
    /// Reads the limits from a yaml file. Missing keys keep their defaults.
    /// ```yaml
    /// ---
    /// memory_fraction: 0.25
    /// memory_limit: 1000000000
    /// max_spatial_dim: 16
    /// max_matrix_size: 10000
    /// max_materialized_k: 100
    /// cover_tree_variant: simplified
    /// ```
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> SimdexResult<OptimizerConfig> {
        let (params, file_name) = read_yaml(&path)?;
        let mut config = OptimizerConfig::default();
        if let Some(x) = params["memory_fraction"].as_f64() {
            config.memory_fraction = x as f32;
        }
        if let Some(x) = params["memory_limit"].as_i64() {
            config.memory_limit = Some(x.max(0) as usize);
        }
        if let Some(x) = params["max_spatial_dim"].as_i64() {
            config.max_spatial_dim = x.max(0) as usize;
        }
        if let Some(x) = params["max_matrix_size"].as_i64() {
            config.max_matrix_size = x.max(0) as usize;
        }
        if let Some(x) = params["max_materialized_k"].as_i64() {
            config.max_materialized_k = x.max(0) as usize;
        }
        if let Some(variant) = yaml_enum(&params, "cover_tree_variant", &file_name)? {
            config.cover_tree_variant = variant;
        }
        if !(config.memory_fraction > 0.0 && config.memory_fraction <= 1.0) {
            return Err(SimdexError::invalid_parameter(
                "memory_fraction",
                format!("{} is not in (0, 1]", config.memory_fraction),
            ));
        }
        Ok(config)
    }
}

/// Builds the index that usually pays off, in this order:
///
/// 1. With [`QueryFlags::PRECOMPUTE`], a materialized kNN table for kNN and reverse kNN, and a
///    distance matrix for distance queries over small relations.
/// 2. An R*-tree for low dimensional vectors under a distance that can bound boxes.
/// 3. A cover tree for any other metric.
///
/// Anything that does not fit the memory budget is skipped with a warning.
#[derive(Debug, Clone, Default)]
pub struct EmpiricalOptimizer {
    config: OptimizerConfig,
}

impl EmpiricalOptimizer {
    ///
    pub fn new(config: OptimizerConfig) -> EmpiricalOptimizer {
        EmpiricalOptimizer { config }
    }

    ///
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn available_memory(&self) -> usize {
        if let Some(limit) = self.config.memory_limit {
            return limit;
        }
        let mut sys = System::new();
        sys.refresh_memory_specifics(MemoryRefreshKind::everything());
        let available = sys.available_memory();
        if available == 0 {
            warn!("could not detect the available memory, assuming 1 GB");
            1 << 30
        } else {
            available as usize
        }
    }

    fn fits(&self, what: &str, bytes: usize) -> bool {
        let budget = (self.available_memory() as f64 * self.config.memory_fraction as f64) as usize;
        if bytes > budget {
            warn!(
                "not building a {}, it needs about {} bytes and the budget is {}",
                what, bytes, budget
            );
            false
        } else {
            true
        }
    }

    fn publish(&self, relation: &Relation, index: Arc<dyn QueryIndex>, flags: QueryFlags) {
        if !flags.contains(QueryFlags::NO_CACHE) {
            relation.attach(&index);
        }
    }

    fn build_materialized(
        &self,
        relation: &Relation,
        dq: &Arc<dyn DistanceQuery>,
        max_k: usize,
        flags: QueryFlags,
    ) -> Option<Arc<MaterializedKnnIndex>> {
        if !flags.contains(QueryFlags::PRECOMPUTE) || max_k == 0 || max_k > self.config.max_materialized_k {
            return None;
        }
        let k = max_k.min(relation.len());
        if k == 0 || !self.fits("materialized kNN table", materialized_knn_bytes(relation.len(), k)) {
            return None;
        }
        let linear = LinearScanKnn::new(Arc::clone(dq));
        match MaterializedKnnIndex::build(Arc::clone(dq), &linear, k) {
            Ok(index) => {
                info!("materialized the {} nearest neighbors of {} objects", k, relation.len());
                let index = Arc::new(index);
                self.publish(relation, index.clone(), flags);
                Some(index)
            }
            Err(e) => {
                warn!("failed to materialize the kNN table: {}", e);
                None
            }
        }
    }

    fn build_rstar(&self, relation: &Relation, distance: &Arc<dyn Distance>, flags: QueryFlags) -> Option<Arc<RStarTreeIndex>> {
        if distance.as_spatial().is_none()
            || distance.input_type() != InputType::DenseVector
            || relation.dim() > self.config.max_spatial_dim
            || !self.fits("R*-tree", rstar_tree_bytes(relation.len(), relation.dim()))
        {
            return None;
        }
        match RStarTreeIndex::build(Arc::clone(relation.point_cloud()), Arc::clone(distance), RStarSettings::new()) {
            Ok(index) => {
                info!("built an R*-tree over {} objects for {}", relation.len(), distance.name());
                let index = Arc::new(index);
                self.publish(relation, index.clone(), flags);
                Some(index)
            }
            Err(e) => {
                warn!("failed to build an R*-tree: {}", e);
                None
            }
        }
    }

    fn build_cover_tree(
        &self,
        relation: &Relation,
        distance: &Arc<dyn Distance>,
        flags: QueryFlags,
    ) -> Option<Arc<CoverTreeIndex>> {
        let variant = self.config.cover_tree_variant;
        if !distance.is_metric()
            || distance.input_type() != InputType::DenseVector
            || !self.fits("cover tree", cover_tree_bytes(relation.len(), variant))
        {
            return None;
        }
        let mut builder = CoverTreeBuilder::new();
        builder.set_variant(variant);
        match CoverTreeIndex::build(Arc::clone(relation.point_cloud()), Arc::clone(distance), &builder) {
            Ok(index) => {
                info!("built a cover tree over {} objects for {}", relation.len(), distance.name());
                let index = Arc::new(index);
                self.publish(relation, index.clone(), flags);
                Some(index)
            }
            Err(e) => {
                warn!("failed to build a cover tree: {}", e);
                None
            }
        }
    }

    /// R*-tree first, cover tree second. The trees do not serve precompute requests.
    fn build_tree<T: ?Sized>(
        &self,
        relation: &Relation,
        dq: &Arc<dyn DistanceQuery>,
        flags: QueryFlags,
        serve: impl Fn(Arc<dyn QueryIndex>) -> Option<Arc<T>>,
    ) -> Option<Arc<T>> {
        if flags.contains(QueryFlags::PRECOMPUTE) || relation.is_empty() {
            return None;
        }
        if let Some(index) = self.build_rstar(relation, dq.distance(), flags) {
            let index: Arc<dyn QueryIndex> = index;
            return serve(index);
        }
        if let Some(index) = self.build_cover_tree(relation, dq.distance(), flags) {
            let index: Arc<dyn QueryIndex> = index;
            return serve(index);
        }
        None
    }
}

impl QueryOptimizer for EmpiricalOptimizer {
    fn name(&self) -> &str {
        "empirical"
    }

    fn distance_query(
        &self,
        relation: &Relation,
        distance: &Arc<dyn Distance>,
        flags: QueryFlags,
    ) -> Option<Arc<dyn DistanceQuery>> {
        if !flags.contains(QueryFlags::PRECOMPUTE)
            || relation.len() < 2
            || relation.len() > self.config.max_matrix_size
            || !relation.point_cloud().is_contiguous()
            || !self.fits("distance matrix", distance_matrix_bytes(relation.len()))
        {
            return None;
        }
        match DistanceMatrixIndex::build(Arc::clone(relation.point_cloud()), Arc::clone(distance)) {
            Ok(index) => {
                info!("precomputed the distance matrix of {} objects", relation.len());
                let index: Arc<dyn QueryIndex> = Arc::new(index);
                self.publish(relation, index.clone(), flags);
                index.distance_query(distance, flags)
            }
            Err(e) => {
                warn!("failed to precompute the distance matrix: {}", e);
                None
            }
        }
    }

    fn knn_searcher(
        &self,
        relation: &Relation,
        dq: &Arc<dyn DistanceQuery>,
        max_k: usize,
        flags: QueryFlags,
    ) -> Option<Arc<dyn KnnSearcher>> {
        if let Some(index) = self.build_materialized(relation, dq, max_k, flags) {
            return index.knn_searcher(dq, max_k, flags);
        }
        debug!("looking for a tree to serve kNN queries with {:?}", flags);
        self.build_tree(relation, dq, flags, |index| index.knn_searcher(dq, max_k, flags))
    }

    fn range_searcher(
        &self,
        relation: &Relation,
        dq: &Arc<dyn DistanceQuery>,
        max_radius: f32,
        flags: QueryFlags,
    ) -> Option<Arc<dyn RangeSearcher>> {
        self.build_tree(relation, dq, flags, |index| index.range_searcher(dq, max_radius, flags))
    }

    fn rknn_searcher(
        &self,
        relation: &Relation,
        dq: &Arc<dyn DistanceQuery>,
        max_k: usize,
        flags: QueryFlags,
    ) -> Option<Arc<dyn RknnSearcher>> {
        self.build_materialized(relation, dq, max_k, flags)
            .and_then(|index| index.rknn_searcher(dq, max_k, flags))
    }

    fn priority_search(
        &self,
        relation: &Relation,
        dq: &Arc<dyn DistanceQuery>,
        max_radius: f32,
        flags: QueryFlags,
    ) -> Option<Arc<dyn PrioritySearch>> {
        self.build_tree(relation, dq, flags, |index| index.priority_search(dq, max_radius, flags))
    }
}
