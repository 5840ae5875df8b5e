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

//! # The Cover Tree
//! The tree is an arena of [`CoverNode`]s addressed by [`NodeId`]. It is built once by the
//! [`CoverTreeBuilder`](super::CoverTreeBuilder) and only read afterwards, so any number of
//! searches can run on it at the same time.
//!
//! All searches share one branch and bound pattern. A node is bounded from below by the distance
//! from the query to its routing object minus its covering radius. Children whose routing object
//! is the parent's reuse the parent's distance. The full variant also skips children and singletons
//! whose stored distance to the parent proves they are out of reach, without evaluating them.

use super::builders::CoverTreeBuilder;
use super::node::*;
use crate::errors::*;
use crate::query_tools::*;
use crate::NodeId;
use pointcloud::distances::Distance;
use pointcloud::{PointCloud, PointIndex};
use std::sync::Arc;

/// What a search is measured against: a free vector or an object of the tree's point cloud.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Query<'q> {
    Point(&'q [f32]),
    Index(PointIndex),
}

/// Shape of a cover tree, see [`CoverTree::stats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverTreeStats {
    /// Number of nodes
    pub nodes: usize,
    /// Average depth of a node, the root is at depth 0
    pub avg_depth: f32,
    /// Depth of the deepest node
    pub max_depth: usize,
    /// Objects stored as singletons besides the routing objects
    pub singletons: usize,
    /// Objects a search can hand out from the nodes, every object exactly once
    pub entries: usize,
}

/// A metric tree over a point cloud.
#[derive(Debug)]
pub struct CoverTree<D: PointCloud + ?Sized> {
    point_cloud: Arc<D>,
    distance: Arc<dyn Distance>,
    nodes: Vec<CoverNode>,
    root: Option<NodeId>,
    expansion: f32,
    truncate: usize,
    variant: CoverTreeVariant,
}

impl<D: PointCloud + ?Sized> CoverTree<D> {
    pub(crate) fn from_parts(
        point_cloud: Arc<D>,
        distance: Arc<dyn Distance>,
        nodes: Vec<CoverNode>,
        root: Option<NodeId>,
        builder: &CoverTreeBuilder,
    ) -> CoverTree<D> {
        CoverTree {
            point_cloud,
            distance,
            nodes,
            root,
            expansion: builder.expansion,
            truncate: builder.truncate,
            variant: builder.variant,
        }
    }

    /// The data the tree is built on
    pub fn point_cloud(&self) -> &Arc<D> {
        &self.point_cloud
    }

    /// The distance the tree is built with
    pub fn distance(&self) -> &Arc<dyn Distance> {
        &self.distance
    }

    /// `None` for a tree over an empty point cloud
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    ///
    pub fn node(&self, id: NodeId) -> Option<&CoverNode> {
        self.nodes.get(id)
    }

    ///
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    ///
    pub fn variant(&self) -> CoverTreeVariant {
        self.variant
    }

    ///
    pub fn expansion(&self) -> f32 {
        self.expansion
    }

    ///
    pub fn truncate(&self) -> usize {
        self.truncate
    }

    fn get(&self, id: NodeId) -> SimdexResult<&CoverNode> {
        self.nodes.get(id).ok_or(SimdexError::NodeNotFound(id))
    }

    pub(crate) fn query_distance(&self, query: Query, index: PointIndex) -> SimdexResult<f32> {
        match query {
            Query::Point(point) => Ok(self.distance.dist(point, self.point_cloud.point(index)?)),
            Query::Index(qi) => Ok(self.point_cloud.distance(self.distance.as_ref(), qi, index)?),
        }
    }

    fn check_query(&self, query: Query) -> SimdexResult<()> {
        if let Query::Point(point) = query {
            if point.len() != self.point_cloud.dim() {
                return Err(SimdexError::DimensionMismatch {
                    expected: self.point_cloud.dim(),
                    found: point.len(),
                });
            }
        }
        Ok(())
    }

    /// Drives a query heap over the tree.
    fn search<H: RoutingQueryHeap + SingletonQueryHeap>(&self, query: Query, heap: &mut H) -> SimdexResult<()> {
        self.check_query(query)?;
        let root = match self.root {
            Some(root) => root,
            None => return Ok(()),
        };
        let root_dist = self.query_distance(query, self.get(root)?.routing_object())?;
        heap.push_node(root, root_dist - self.get(root)?.max_dist(), root_dist);

        while let Some((_, d, id)) = heap.pop_node() {
            let node = self.get(id)?;
            for child_id in node.children() {
                let child = self.get(*child_id)?;
                if let Some(parent_dist) = child.parent_dist() {
                    if d - child.max_dist() - parent_dist > heap.threshold() {
                        continue;
                    }
                }
                let child_dist = if child.routing_object() == node.routing_object() {
                    d
                } else {
                    self.query_distance(query, child.routing_object())?
                };
                heap.push_node(*child_id, child_dist - child.max_dist(), child_dist);
            }
            if node.is_leaf() {
                heap.push_outlier(node.routing_object(), d);
            }
            for i in 1..node.singletons().len() {
                if let Some(s_dist) = node.singleton_dist(i) {
                    if d - s_dist > heap.threshold() {
                        continue;
                    }
                }
                let index = node.singletons()[i];
                heap.push_outlier(index, self.query_distance(query, index)?);
            }
        }
        Ok(())
    }

    /// The `k` nearest neighbors of a vector, closest first.
    pub fn knn(&self, point: &[f32], k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let mut heap = KnnQueryHeap::new(k);
        self.search(Query::Point(point), &mut heap)?;
        Ok(heap.unpack())
    }

    /// The `k` nearest neighbors of an object of the point cloud, itself included.
    pub fn knn_by_index(&self, index: PointIndex, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let mut heap = KnnQueryHeap::new(k);
        self.search(Query::Index(index), &mut heap)?;
        Ok(heap.unpack())
    }

    /// Everything within `radius` of a vector, closest first.
    pub fn range(&self, point: &[f32], radius: f32) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let mut heap = RangeQueryHeap::new(radius);
        self.search(Query::Point(point), &mut heap)?;
        Ok(heap.unpack())
    }

    /// Everything within `radius` of an object of the point cloud, itself included.
    pub fn range_by_index(&self, index: PointIndex, radius: f32) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let mut heap = RangeQueryHeap::new(radius);
        self.search(Query::Index(index), &mut heap)?;
        Ok(heap.unpack())
    }

    /// Checks that every object below a node is within its covering radius.
    pub fn check_covering(&self) -> SimdexResult<()> {
        let root = match self.root {
            Some(root) => root,
            None => return Ok(()),
        };
        self.check_node(root)?;
        Ok(())
    }

    /// Returns every object below the node.
    fn check_node(&self, id: NodeId) -> SimdexResult<Vec<PointIndex>> {
        let node = self.get(id)?;
        let mut below: Vec<PointIndex> = node.singletons().to_vec();
        for child in node.children() {
            below.extend(self.check_node(*child)?);
        }
        let routing = node.routing_object();
        let tolerance = node.max_dist() * 1e-6 + 1e-6;
        for index in &below {
            let dist = self.point_cloud.distance(self.distance.as_ref(), routing, *index)?;
            if dist > node.max_dist() + tolerance {
                return Err(SimdexError::IntegrityError(format!(
                    "object {} is {} away from the routing object {} of node {}, the radius is {}",
                    index,
                    dist,
                    routing,
                    id,
                    node.max_dist()
                )));
            }
        }
        Ok(below)
    }

    /// Counts nodes, depths and singletons.
    pub fn stats(&self) -> CoverTreeStats {
        let mut stats = CoverTreeStats {
            nodes: 0,
            avg_depth: 0.0,
            max_depth: 0,
            singletons: 0,
            entries: 0,
        };
        let mut depth_sum = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.iter().map(|r| (*r, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            let node = match self.nodes.get(id) {
                Some(node) => node,
                None => continue,
            };
            stats.nodes += 1;
            depth_sum += depth;
            stats.max_depth = stats.max_depth.max(depth);
            stats.singletons += node.singletons().len() - 1;
            stats.entries += node.candidate_range().len();
            stack.extend(node.children().iter().map(|c| (*c, depth + 1)));
        }
        if stats.nodes > 0 {
            stats.avg_depth = depth_sum as f32 / stats.nodes as f32;
        }
        stats
    }

    /// An incremental nearest neighbor search around a vector.
    pub fn priority(&self, point: &[f32]) -> SimdexResult<CoverTreePrioritySearcher<'_, D>> {
        CoverTreePrioritySearcher::new(self, OwnedQuery::Point(point.to_vec()))
    }

    /// An incremental nearest neighbor search around an object of the point cloud.
    pub fn priority_by_index(&self, index: PointIndex) -> SimdexResult<CoverTreePrioritySearcher<'_, D>> {
        CoverTreePrioritySearcher::new(self, OwnedQuery::Index(index))
    }
}

#[derive(Debug)]
enum OwnedQuery {
    Point(Vec<f32>),
    Index(PointIndex),
}

impl OwnedQuery {
    fn as_query(&self) -> Query<'_> {
        match self {
            OwnedQuery::Point(p) => Query::Point(p),
            OwnedQuery::Index(i) => Query::Index(*i),
        }
    }
}

#[derive(Debug)]
enum PriorityItem {
    Node(NodeId, f32),
    Object(PointIndex, f32),
}

/// Best first search over a cover tree that hands out one object at a time.
///
/// Nodes and objects share one heap. A node's key is its lower bound, an object's key is its
/// exact distance, and no key is ever smaller than the one popped before it.
#[derive(Debug)]
pub struct CoverTreePrioritySearcher<'a, D: PointCloud + ?Sized> {
    tree: &'a CoverTree<D>,
    query: OwnedQuery,
    heap: MonotoneHeap<PriorityItem>,
    cutoff: f32,
}

impl<'a, D: PointCloud + ?Sized> CoverTreePrioritySearcher<'a, D> {
    fn new(tree: &'a CoverTree<D>, query: OwnedQuery) -> SimdexResult<Self> {
        tree.check_query(query.as_query())?;
        let mut heap = MonotoneHeap::new();
        if let Some(root) = tree.root {
            let node = tree.get(root)?;
            let d = tree.query_distance(query.as_query(), node.routing_object())?;
            heap.push(d - node.max_dist(), PriorityItem::Node(root, d));
        }
        Ok(CoverTreePrioritySearcher {
            tree,
            query,
            heap,
            cutoff: f32::INFINITY,
        })
    }

    fn expand(&mut self, id: NodeId, d: f32) -> SimdexResult<()> {
        let tree = self.tree;
        let query = self.query.as_query();
        let node = tree.get(id)?;
        for child_id in node.children() {
            let child = tree.get(*child_id)?;
            if let Some(parent_dist) = child.parent_dist() {
                if d - child.max_dist() - parent_dist > self.cutoff {
                    continue;
                }
            }
            let child_dist = if child.routing_object() == node.routing_object() {
                d
            } else {
                tree.query_distance(query, child.routing_object())?
            };
            let bound = child_dist - child.max_dist();
            if bound <= self.cutoff {
                self.heap.push(bound, PriorityItem::Node(*child_id, child_dist));
            }
        }
        for i in node.candidate_range() {
            let index = node.singletons()[i];
            let dist = if i == 0 {
                d
            } else {
                if let Some(s_dist) = node.singleton_dist(i) {
                    if d - s_dist > self.cutoff {
                        continue;
                    }
                }
                tree.query_distance(query, index)?
            };
            if dist <= self.cutoff {
                self.heap.push(dist, PriorityItem::Object(index, dist));
            }
        }
        Ok(())
    }
}

impl<'a, D: PointCloud + ?Sized> PrioritySearcher for CoverTreePrioritySearcher<'a, D> {
    fn next_candidate(&mut self) -> SimdexResult<Option<PriorityCandidate>> {
        while let Some((key, item)) = self.heap.pop() {
            if key > self.cutoff {
                self.heap.clear();
                return Ok(None);
            }
            match item {
                PriorityItem::Object(index, dist) => {
                    return Ok(Some(PriorityCandidate {
                        index,
                        lower_bound: key,
                        upper_bound: dist.max(key),
                    }))
                }
                PriorityItem::Node(id, d) => self.expand(id, d)?,
            }
        }
        Ok(None)
    }

    fn all_lower_bound(&self) -> f32 {
        self.heap.peek_key().unwrap_or(f32::INFINITY)
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
