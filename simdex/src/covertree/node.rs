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

//! The node type of the cover tree.

use crate::NodeId;
use pointcloud::PointIndex;
use serde::{Deserialize, Serialize};

/// How much a node remembers about distances it saw during construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverTreeVariant {
    /// Keeps the distance of each node to its parent and of each singleton to the routing object.
    /// Searches use these to skip distance evaluations.
    Full,
    /// Only the routing object, the covering radius and the members.
    Simplified,
}

impl std::str::FromStr for CoverTreeVariant {
    type Err = crate::errors::ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(CoverTreeVariant::Full),
            "simplified" => Ok(CoverTreeVariant::Simplified),
            _ => Err(crate::errors::ParsingError::RegularParsingError(
                "unknown cover tree variant",
            )),
        }
    }
}

/// A node of a cover tree. Everything below it lies within `max_dist` of the routing object.
///
/// The first singleton is always the routing object. On a node with children the routing object
/// is covered again by the first child, so searches skip it there.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoverNode {
    max_dist: f32,
    parent_dist: Option<f32>,
    singletons: Vec<PointIndex>,
    singleton_dists: Option<Vec<f32>>,
    children: Vec<NodeId>,
}

impl CoverNode {
    pub(crate) fn new(
        routing: PointIndex,
        max_dist: f32,
        parent_dist: f32,
        variant: CoverTreeVariant,
    ) -> CoverNode {
        match variant {
            CoverTreeVariant::Full => CoverNode {
                max_dist,
                parent_dist: Some(parent_dist),
                singletons: vec![routing],
                singleton_dists: Some(vec![0.0]),
                children: Vec::new(),
            },
            CoverTreeVariant::Simplified => CoverNode {
                max_dist,
                parent_dist: None,
                singletons: vec![routing],
                singleton_dists: None,
                children: Vec::new(),
            },
        }
    }

    /// Adds an object with its distance to the routing object.
    pub(crate) fn push_singleton(&mut self, index: PointIndex, dist: f32) {
        self.singletons.push(index);
        if let Some(dists) = self.singleton_dists.as_mut() {
            dists.push(dist);
        }
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    /// The center of this node
    pub fn routing_object(&self) -> PointIndex {
        self.singletons[0]
    }

    /// The covering radius
    pub fn max_dist(&self) -> f32 {
        self.max_dist
    }

    /// Distance to the parent's routing object, if the variant keeps it
    pub fn parent_dist(&self) -> Option<f32> {
        self.parent_dist
    }

    /// The routing object followed by the objects stored directly in this node
    pub fn singletons(&self) -> &[PointIndex] {
        &self.singletons
    }

    /// Distance of the `i`-th singleton to the routing object, if the variant keeps it
    pub fn singleton_dist(&self, i: usize) -> Option<f32> {
        self.singleton_dists.as_ref().and_then(|d| d.get(i).copied())
    }

    ///
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    ///
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The singletons a search has to look at: all of them on a leaf, all but the routing object
    /// on an inner node.
    pub(crate) fn candidate_range(&self) -> std::ops::Range<usize> {
        if self.is_leaf() {
            0..self.singletons.len()
        } else {
            1..self.singletons.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_differ_in_what_they_keep() {
        let mut full = CoverNode::new(3, 2.0, 1.5, CoverTreeVariant::Full);
        full.push_singleton(7, 0.5);
        let mut simple = CoverNode::new(3, 2.0, 1.5, CoverTreeVariant::Simplified);
        simple.push_singleton(7, 0.5);

        assert_eq!(full.singletons(), &[3, 7]);
        assert_eq!(simple.singletons(), &[3, 7]);
        assert_eq!(full.parent_dist(), Some(1.5));
        assert_eq!(simple.parent_dist(), None);
        assert_eq!(full.singleton_dist(1), Some(0.5));
        assert_eq!(simple.singleton_dist(1), None);
    }

    #[test]
    fn routing_object_is_skipped_below_children() {
        let mut node = CoverNode::new(0, 1.0, 0.0, CoverTreeVariant::Full);
        node.push_singleton(1, 1.0);
        assert_eq!(node.candidate_range(), 0..2);
        node.push_child(4);
        assert_eq!(node.candidate_range(), 1..2);
        assert_eq!(node.routing_object(), 0);
    }
}
