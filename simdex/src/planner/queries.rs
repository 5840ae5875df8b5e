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

//! The query objects the planner hands out. Each is bound to one relation and one function.

use super::QueryFlags;
use crate::errors::*;
use crate::query_tools::PrioritySearcher;
use pointcloud::distances::{Distance, Similarity};
use pointcloud::{PointCloud, PointIndex};
use std::fmt::Debug;
use std::sync::Arc;

/// What a query is about: a free vector, or an object of the relation.
///
/// Index based distances can only answer queries about objects of the relation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryPoint<'a> {
    /// A vector of the relation's dimension
    Vector(&'a [f32]),
    /// An object of the relation
    Index(PointIndex),
}

impl<'a> From<&'a [f32]> for QueryPoint<'a> {
    fn from(v: &'a [f32]) -> QueryPoint<'a> {
        QueryPoint::Vector(v)
    }
}

impl<'a> From<PointIndex> for QueryPoint<'a> {
    fn from(i: PointIndex) -> QueryPoint<'a> {
        QueryPoint::Index(i)
    }
}

impl<'a> QueryPoint<'a> {
    /// The vector behind the query, looked up in the relation for an index.
    pub fn vector<'b>(&'b self, relation: &'b dyn PointCloud) -> SimdexResult<&'b [f32]> {
        match self {
            QueryPoint::Vector(v) => {
                if v.len() != relation.dim() {
                    return Err(SimdexError::DimensionMismatch {
                        expected: relation.dim(),
                        found: v.len(),
                    });
                }
                Ok(*v)
            }
            QueryPoint::Index(i) => Ok(relation.point(*i)?),
        }
    }
}

/// Evaluates a distance between objects of a relation.
pub trait DistanceQuery: Debug + Send + Sync {
    /// The relation the objects come from
    fn relation(&self) -> &Arc<dyn PointCloud>;
    /// The function being evaluated
    fn distance(&self) -> &Arc<dyn Distance>;
    /// The flags this query was requested with
    fn flags(&self) -> QueryFlags;
    /// True if this evaluates the function directly on the relation's vectors, with no index in between
    fn is_primitive(&self) -> bool {
        false
    }
    ///
    fn dist(&self, a: QueryPoint, b: QueryPoint) -> SimdexResult<f32>;
}

/// Evaluates a similarity between objects of a relation.
pub trait SimilarityQuery: Debug + Send + Sync {
    /// The relation the objects come from
    fn relation(&self) -> &Arc<dyn PointCloud>;
    /// The function being evaluated
    fn similarity_function(&self) -> &Arc<dyn Similarity>;
    /// The flags this query was requested with
    fn flags(&self) -> QueryFlags;
    ///
    fn similarity(&self, a: QueryPoint, b: QueryPoint) -> SimdexResult<f32>;
}

/// k nearest neighbor search.
pub trait KnnSearcher: Debug + Send + Sync {
    /// The `k` closest objects, closest first, as `(distance, index)`.
    fn knn(&self, query: QueryPoint, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>>;
}

/// Range search.
pub trait RangeSearcher: Debug + Send + Sync {
    /// Every object within `radius`, closest first, as `(distance, index)`.
    fn range(&self, query: QueryPoint, radius: f32) -> SimdexResult<Vec<(f32, PointIndex)>>;
}

/// Reverse k nearest neighbor search.
pub trait RknnSearcher: Debug + Send + Sync {
    /// Every object that has the query among its `k` nearest neighbors, closest first. An object
    /// counts as its own nearest neighbor.
    fn rknn(&self, query: QueryPoint, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>>;
}

/// Range search with a similarity, larger is closer.
pub trait SimilarityRangeSearcher: Debug + Send + Sync {
    /// Every object at least `min_similarity` similar, most similar first, as `(similarity, index)`.
    fn similarity_range(
        &self,
        query: QueryPoint,
        min_similarity: f32,
    ) -> SimdexResult<Vec<(f32, PointIndex)>>;
}

/// Starts incremental nearest neighbor searches.
pub trait PrioritySearch: Debug + Send + Sync {
    /// A new search around `query`, see [`PrioritySearcher`].
    fn search<'a>(&'a self, query: QueryPoint) -> SimdexResult<Box<dyn PrioritySearcher + 'a>>;
}

/// A distance evaluated straight on the relation.
#[derive(Debug)]
pub struct PrimitiveDistanceQuery {
    relation: Arc<dyn PointCloud>,
    distance: Arc<dyn Distance>,
    flags: QueryFlags,
}

impl PrimitiveDistanceQuery {
    ///
    pub fn new(
        relation: Arc<dyn PointCloud>,
        distance: Arc<dyn Distance>,
        flags: QueryFlags,
    ) -> PrimitiveDistanceQuery {
        PrimitiveDistanceQuery {
            relation,
            distance,
            flags,
        }
    }
}

impl DistanceQuery for PrimitiveDistanceQuery {
    fn relation(&self) -> &Arc<dyn PointCloud> {
        &self.relation
    }
    fn distance(&self) -> &Arc<dyn Distance> {
        &self.distance
    }
    fn flags(&self) -> QueryFlags {
        self.flags
    }
    fn is_primitive(&self) -> bool {
        true
    }
    fn dist(&self, a: QueryPoint, b: QueryPoint) -> SimdexResult<f32> {
        primitive_dist(self.relation.as_ref(), self.distance.as_ref(), a, b)
    }
}

pub(crate) fn primitive_dist(
    relation: &dyn PointCloud,
    distance: &dyn Distance,
    a: QueryPoint,
    b: QueryPoint,
) -> SimdexResult<f32> {
    match (a, b) {
        (QueryPoint::Index(i), QueryPoint::Index(j)) => Ok(relation.distance(distance, i, j)?),
        _ => {
            if distance.input_type() == pointcloud::InputType::PointIndex {
                return Err(pointcloud::errors::PointCloudError::IndexOnlyDistance("dense query").into());
            }
            Ok(distance.dist(a.vector(relation)?, b.vector(relation)?))
        }
    }
}

/// A similarity evaluated straight on the relation.
#[derive(Debug)]
pub struct PrimitiveSimilarityQuery {
    relation: Arc<dyn PointCloud>,
    similarity: Arc<dyn Similarity>,
    flags: QueryFlags,
}

impl PrimitiveSimilarityQuery {
    ///
    pub fn new(
        relation: Arc<dyn PointCloud>,
        similarity: Arc<dyn Similarity>,
        flags: QueryFlags,
    ) -> PrimitiveSimilarityQuery {
        PrimitiveSimilarityQuery {
            relation,
            similarity,
            flags,
        }
    }
}

impl SimilarityQuery for PrimitiveSimilarityQuery {
    fn relation(&self) -> &Arc<dyn PointCloud> {
        &self.relation
    }
    fn similarity_function(&self) -> &Arc<dyn Similarity> {
        &self.similarity
    }
    fn flags(&self) -> QueryFlags {
        self.flags
    }
    fn similarity(&self, a: QueryPoint, b: QueryPoint) -> SimdexResult<f32> {
        let relation = self.relation.as_ref();
        Ok(self
            .similarity
            .similarity(a.vector(relation)?, b.vector(relation)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointcloud::data_sources::DataRam;
    use pointcloud::distances::{LinearKernel, RandomStableDistance, L1};

    #[test]
    fn primitive_queries_resolve_both_kinds_of_points() {
        let relation: Arc<dyn PointCloud> =
            Arc::new(DataRam::new(vec![0.0, 0.0, 1.0, 2.0], 2).unwrap());
        let dq = PrimitiveDistanceQuery::new(Arc::clone(&relation), Arc::new(L1), QueryFlags::NONE);
        assert!(dq.is_primitive());
        assert_approx_eq!(dq.dist(QueryPoint::Index(0), QueryPoint::Index(1)).unwrap(), 3.0);
        let v = [1.0f32, 1.0];
        assert_approx_eq!(dq.dist(QueryPoint::Vector(&v), QueryPoint::Index(1)).unwrap(), 1.0);
        assert!(dq.dist(QueryPoint::Vector(&[1.0]), QueryPoint::Index(1)).is_err());

        let sq = PrimitiveSimilarityQuery::new(Arc::clone(&relation), Arc::new(LinearKernel), QueryFlags::NONE);
        assert_approx_eq!(sq.similarity(QueryPoint::Index(1), QueryPoint::Index(1)).unwrap(), 5.0);
    }

    #[test]
    fn index_distances_refuse_vectors() {
        let relation: Arc<dyn PointCloud> = Arc::new(DataRam::new(vec![0.0, 1.0, 2.0], 1).unwrap());
        let dq = PrimitiveDistanceQuery::new(relation, Arc::new(RandomStableDistance::new(3)), QueryFlags::NONE);
        assert_approx_eq!(dq.dist(QueryPoint::Index(2), QueryPoint::Index(2)).unwrap(), 0.0);
        assert!(dq.dist(QueryPoint::Vector(&[0.0]), QueryPoint::Index(1)).is_err());
    }
}
