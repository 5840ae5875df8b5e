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

//! Queries against an [`RStarTree`]. Directory entries are bounded by the distance from the query
//! to their box, so any distance that can bound a box (a `SpatialDistance`) works here.

use super::bounding_box::*;
use super::node::Entry;
use super::storage::NodeStorage;
use super::tree::RStarTree;
use crate::errors::*;
use crate::query_tools::*;
use crate::NodeId;
use pointcloud::distances::SpatialDistance;
use pointcloud::PointIndex;

impl<S: NodeStorage> RStarTree<S> {
    fn check_query(&self, point: &[f32]) -> SimdexResult<()> {
        match self.dim() {
            Some(expected) if expected != point.len() => Err(SimdexError::DimensionMismatch {
                expected,
                found: point.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Drives a query heap to completion.
    fn search<H: RoutingQueryHeap + SingletonQueryHeap>(
        &self,
        distance: &dyn SpatialDistance,
        point: &[f32],
        heap: &mut H,
    ) -> SimdexResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        self.check_query(point)?;
        heap.push_node(self.root(), 0.0, 0.0);
        while let Some((_, _, id)) = heap.pop_node() {
            let node = self.storage().read(id)?;
            for entry in node.entries() {
                match entry {
                    Entry::Leaf { id, point: p } => heap.push_outlier(*id, distance.dist(point, p)),
                    Entry::Directory { child, bbox } => {
                        let min_dist = distance.min_dist(bbox.min(), bbox.max(), point);
                        heap.push_node(*child, min_dist, 0.0);
                    }
                }
            }
        }
        Ok(())
    }

    /// All objects within `radius` of `point`, closest first.
    pub fn range(
        &self,
        distance: &dyn SpatialDistance,
        point: &[f32],
        radius: f32,
    ) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let mut heap = RangeQueryHeap::new(radius);
        self.search(distance, point, &mut heap)?;
        Ok(heap.unpack())
    }

    /// The `k` objects closest to `point`, closest first.
    pub fn knn(
        &self,
        distance: &dyn SpatialDistance,
        point: &[f32],
        k: usize,
    ) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let mut heap = KnnQueryHeap::new(k);
        self.search(distance, point, &mut heap)?;
        Ok(heap.unpack())
    }

    /// Every object inside the window, in no particular order.
    pub fn window(&self, window: &BoundingBox) -> SimdexResult<Vec<PointIndex>> {
        let mut found = Vec::new();
        if self.is_empty() {
            return Ok(found);
        }
        self.check_query(window.min())?;
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let node = self.storage().read(id)?;
            for entry in node.entries() {
                if !intersects(entry, window) {
                    continue;
                }
                match entry {
                    Entry::Leaf { id, .. } => found.push(*id),
                    Entry::Directory { child, .. } => stack.push(*child),
                }
            }
        }
        Ok(found)
    }

    /// An incremental nearest neighbor search around `point`.
    pub fn priority<'a>(
        &'a self,
        distance: &'a dyn SpatialDistance,
        point: &[f32],
    ) -> SimdexResult<RStarPrioritySearcher<'a, S>> {
        self.check_query(point)?;
        let mut heap = MonotoneHeap::new();
        if !self.is_empty() {
            heap.push(0.0, PriorityItem::Node(self.root()));
        }
        Ok(RStarPrioritySearcher {
            tree: self,
            distance,
            query: point.to_vec(),
            heap,
            cutoff: f32::INFINITY,
        })
    }
}

#[derive(Debug)]
enum PriorityItem {
    Node(NodeId),
    Object(PointIndex, f32),
}

/// Best first search over a tree, see [`RStarTree::priority`]. Object distances are exact, so a
/// candidate's bounds only differ when the distance fails to be bounded by the boxes.
#[derive(Debug)]
pub struct RStarPrioritySearcher<'a, S: NodeStorage> {
    tree: &'a RStarTree<S>,
    distance: &'a dyn SpatialDistance,
    query: Vec<f32>,
    heap: MonotoneHeap<PriorityItem>,
    cutoff: f32,
}

impl<'a, S: NodeStorage> PrioritySearcher for RStarPrioritySearcher<'a, S> {
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
                    }));
                }
                PriorityItem::Node(id) => {
                    let node = self.tree.storage().read(id)?;
                    for entry in node.entries() {
                        match entry {
                            Entry::Leaf { id, point } => {
                                let dist = self.distance.dist(&self.query, point);
                                if dist <= self.cutoff {
                                    self.heap.push(dist, PriorityItem::Object(*id, dist));
                                }
                            }
                            Entry::Directory { child, bbox } => {
                                let min_dist = self.distance.min_dist(bbox.min(), bbox.max(), &self.query);
                                if min_dist <= self.cutoff {
                                    self.heap.push(min_dist, PriorityItem::Node(*child));
                                }
                            }
                        }
                    }
                }
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

#[cfg(test)]
mod tests {
    use super::super::settings::RStarSettings;
    use super::*;
    use pointcloud::distances::{L1, L2};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn tree_with(points: &[Vec<f32>]) -> RStarTree {
        let mut settings = RStarSettings::new();
        settings.set_capacities(6, 6);
        let mut tree = RStarTree::new(settings).unwrap();
        for (i, p) in points.iter().enumerate() {
            tree.insert(i, p).unwrap();
        }
        tree
    }

    fn random_points(count: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..count)
            .map(|_| vec![rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)])
            .collect()
    }

    fn brute_force(points: &[Vec<f32>], query: &[f32], distance: &dyn SpatialDistance) -> Vec<(f32, PointIndex)> {
        let mut all: Vec<(f32, PointIndex)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (distance.dist(query, p), i))
            .collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        all
    }

    #[test]
    fn range_finds_exactly_the_point() {
        let tree = tree_with(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![5.0, 5.0]]);
        let found = tree.range(&L2, &[1.0, 1.0], 0.1).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, 1);
        assert_approx_eq!(found[0].0, 0.0);
    }

    #[test]
    fn knn_matches_brute_force() {
        let points = random_points(400, 11);
        let tree = tree_with(&points);
        for query in random_points(20, 12) {
            let expected = brute_force(&points, &query, &L1);
            let found = tree.knn(&L1, &query, 5).unwrap();
            assert_eq!(found, expected[..5].to_vec());
        }
    }

    #[test]
    fn range_matches_brute_force() {
        let points = random_points(400, 13);
        let tree = tree_with(&points);
        for query in random_points(20, 14) {
            let expected: Vec<(f32, PointIndex)> = brute_force(&points, &query, &L2)
                .into_iter()
                .filter(|(d, _)| *d <= 0.15)
                .collect();
            assert_eq!(tree.range(&L2, &query, 0.15).unwrap(), expected);
        }
    }

    #[test]
    fn window_queries() {
        let points = random_points(300, 15);
        let tree = tree_with(&points);
        let window = BoundingBox::new(vec![0.2, 0.3], vec![0.5, 0.9]);
        let mut found = tree.window(&window).unwrap();
        found.sort_unstable();
        let expected: Vec<PointIndex> = (0..points.len())
            .filter(|i| contains(&window, &points[*i][..]))
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn priority_search_is_monotone_and_complete() {
        let points = random_points(250, 16);
        let tree = tree_with(&points);
        let query = [0.4, 0.6];
        let mut searcher = tree.priority(&L2, &query).unwrap();
        let mut last = 0.0;
        let mut seen = 0;
        while let Some(c) = searcher.next_candidate().unwrap() {
            assert!(c.lower_bound >= last);
            assert!(c.lower_bound <= c.upper_bound);
            last = c.lower_bound;
            seen += 1;
        }
        assert_eq!(seen, points.len());

        let mut searcher = tree.priority(&L2, &query).unwrap();
        let knn = searcher.collect_knn(7).unwrap();
        assert_eq!(knn, brute_force(&points, &query, &L2)[..7].to_vec());
    }

    #[test]
    fn empty_and_mismatched_queries() {
        let tree = tree_with(&[]);
        assert!(tree.knn(&L2, &[0.0], 3).unwrap().is_empty());
        let tree = tree_with(&[vec![0.0, 0.0]]);
        assert!(tree.knn(&L2, &[0.0], 3).is_err());
    }
}
