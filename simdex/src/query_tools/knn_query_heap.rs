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

use super::query_items::{QueryAddress, QuerySingleton};
use super::*;
use fxhash::FxHashSet;
use std::collections::BinaryHeap;

/// The heaps for a best first k nearest neighbor query. There are 2 heaps, the node min-heap and
/// the distance max-heap. The distance heap holds the output; once it grows past `k` the farthest
/// point is popped off, so its top is the current `k`-th distance.
///
/// Routing objects can show up more than once while walking a tree, so the heap also remembers the
/// indexes it has seen and rejects repeats.
#[derive(Debug)]
pub struct KnnQueryHeap {
    node_heap: BinaryHeap<QueryAddress>,
    dist_heap: BinaryHeap<QuerySingleton>,
    known_indexes: FxHashSet<PointIndex>,
    k: usize,
}

impl RoutingQueryHeap for KnnQueryHeap {
    fn push_node(&mut self, address: NodeId, min_dist: f32, dist_to_center: f32) {
        if min_dist <= self.max_dist() {
            self.node_heap.push(QueryAddress {
                min_dist,
                dist_to_center,
                address,
            });
        }
    }

    fn pop_node(&mut self) -> Option<(f32, f32, NodeId)> {
        let next = self.node_heap.pop()?;
        if next.min_dist > self.max_dist() {
            // Everything left is at least as far.
            self.node_heap.clear();
            return None;
        }
        Some((next.min_dist, next.dist_to_center, next.address))
    }
}

impl SingletonQueryHeap for KnnQueryHeap {
    fn threshold(&self) -> f32 {
        self.max_dist()
    }

    fn push_outlier(&mut self, index: PointIndex, dist: f32) {
        if self.k == 0 || !self.known_indexes.insert(index) {
            return;
        }
        let candidate = QuerySingleton::new(index, dist);
        let better = match self.dist_heap.peek() {
            Some(worst) => self.dist_heap.len() < self.k || candidate < *worst,
            None => true,
        };
        if better {
            self.dist_heap.push(candidate);
            while self.dist_heap.len() > self.k {
                self.dist_heap.pop();
            }
        }
    }
}

impl KnnQueryHeap {
    /// Creates a new KNN heap.
    pub fn new(k: usize) -> KnnQueryHeap {
        KnnQueryHeap {
            node_heap: BinaryHeap::new(),
            dist_heap: BinaryHeap::with_capacity(k + 1),
            known_indexes: FxHashSet::default(),
            k,
        }
    }

    /// The current number of points on the distance heap
    pub fn len(&self) -> usize {
        self.dist_heap.len()
    }

    /// If there are no points on the distance heap
    pub fn is_empty(&self) -> bool {
        self.dist_heap.is_empty()
    }

    /// Nodes still waiting to be visited
    pub fn node_len(&self) -> usize {
        self.node_heap.len()
    }

    /// The current `k`-th distance. If the distance heap isn't full it returns infinity.
    pub fn max_dist(&self) -> f32 {
        if self.len() < self.k {
            f32::INFINITY
        } else {
            self.dist_heap.peek().map(|x| x.dist).unwrap_or(f32::INFINITY)
        }
    }

    /// Unpacks the distance heap, closest first. This consumes the query heap.
    pub fn unpack(self) -> Vec<(f32, PointIndex)> {
        self.dist_heap
            .into_sorted_vec()
            .iter()
            .map(|s| (s.dist, s.index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacking_has_correct_order() {
        let mut heap = KnnQueryHeap::new(4);
        for (i, d) in [(2, 0.2), (8, 0.8), (4, 0.4), (6, 0.6), (1, 0.1), (3, 0.3)].iter() {
            heap.push_outlier(*i, *d);
        }
        let unpack = heap.unpack();
        assert_eq!(
            unpack.iter().map(|(_, i)| *i).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn ties_go_to_the_smaller_index() {
        let mut heap = KnnQueryHeap::new(2);
        for i in [7, 3, 9, 1].iter() {
            heap.push_outlier(*i, 1.0);
        }
        assert_eq!(heap.unpack(), vec![(1.0, 1), (1.0, 3)]);
    }

    #[test]
    fn repeats_are_ignored() {
        let mut heap = KnnQueryHeap::new(2);
        heap.push_outlier(5, 1.0);
        heap.push_outlier(5, 1.0);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.max_dist(), f32::INFINITY);
        heap.push_outlier(6, 2.0);
        assert_approx_eq!(heap.max_dist(), 2.0);
    }

    #[test]
    fn nodes_are_pruned_by_kth_distance() {
        let mut heap = KnnQueryHeap::new(1);
        heap.push_node(0, 0.5, 1.0);
        heap.push_node(1, 3.0, 4.0);
        heap.push_outlier(9, 1.0);
        assert_eq!(heap.pop_node(), Some((0.5, 1.0, 0)));
        assert_eq!(heap.pop_node(), None);
        assert_eq!(heap.node_len(), 0);
    }
}
