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

use super::*;

/// A fixed radius query. Nodes are visited depth first, points within the radius are kept.
#[derive(Debug)]
pub struct RangeQueryHeap {
    node_stack: Vec<(f32, f32, NodeId)>,
    results: Vec<(f32, PointIndex)>,
    radius: f32,
}

impl RoutingQueryHeap for RangeQueryHeap {
    fn push_node(&mut self, address: NodeId, min_dist: f32, dist_to_center: f32) {
        if min_dist <= self.radius {
            self.node_stack.push((min_dist, dist_to_center, address));
        }
    }

    fn pop_node(&mut self) -> Option<(f32, f32, NodeId)> {
        self.node_stack.pop()
    }
}

impl SingletonQueryHeap for RangeQueryHeap {
    fn threshold(&self) -> f32 {
        self.radius
    }

    fn push_outlier(&mut self, index: PointIndex, dist: f32) {
        if dist <= self.radius {
            self.results.push((dist, index));
        }
    }
}

impl RangeQueryHeap {
    ///
    pub fn new(radius: f32) -> RangeQueryHeap {
        RangeQueryHeap {
            node_stack: Vec::new(),
            results: Vec::new(),
            radius,
        }
    }

    /// The points found, closest first. Ties are broken by index.
    pub fn unpack(mut self) -> Vec<(f32, PointIndex)> {
        self.results.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        self.results.dedup_by_key(|r| r.1);
        self.results
    }
}
