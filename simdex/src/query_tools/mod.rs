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

//! Tools and data structures shared by the tree queries.
//!
//! Both trees walk their nodes the same way: a heap hands out the next node worth visiting, the
//! tree evaluates that node's children and points and pushes them back. The heap decides what
//! "worth visiting" means, so one traversal serves range and k nearest neighbor queries.

use crate::NodeId;
use pointcloud::PointIndex;

pub(crate) mod query_items;

mod priority;
pub(crate) use priority::MonotoneHeap;
pub use priority::{PriorityCandidate, PrioritySearcher};

mod knn_query_heap;
pub use knn_query_heap::KnnQueryHeap;
mod range_query_heap;
pub use range_query_heap::RangeQueryHeap;

/// The node half of a query heap.
pub trait RoutingQueryHeap {
    /// Queues a node, all of whose points are at least `min_dist` away from the query.
    /// `dist_to_center` is the exact distance to the node's routing object, if the tree has one.
    fn push_node(&mut self, address: NodeId, min_dist: f32, dist_to_center: f32);
    /// The next node worth visiting, as `(min_dist, dist_to_center, address)`. Returns `None`
    /// once every remaining node can be pruned.
    fn pop_node(&mut self) -> Option<(f32, f32, NodeId)>;
}

/// The point half of a query heap.
pub trait SingletonQueryHeap {
    /// Current acceptance threshold. Points and nodes farther than this can't make it into the result.
    fn threshold(&self) -> f32;
    /// Offers a point at a known distance.
    fn push_outlier(&mut self, index: PointIndex, dist: f32);
}
