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

use super::bounding_box::*;
use crate::NodeId;
use pointcloud::PointIndex;
use serde::{Deserialize, Serialize};

/// One slot of a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    /// An object, stored in a leaf node
    Leaf {
        /// The object's index in the point cloud
        id: PointIndex,
        /// Its coordinates
        point: Vec<f32>,
    },
    /// A reference to a child node together with the box covering that child
    Directory {
        /// Storage id of the child
        child: NodeId,
        /// Union of the child's entries
        bbox: BoundingBox,
    },
}

impl Spatial for Entry {
    fn dim(&self) -> usize {
        match self {
            Entry::Leaf { point, .. } => point.len(),
            Entry::Directory { bbox, .. } => bbox.dim(),
        }
    }
    fn min_coord(&self, d: usize) -> f32 {
        match self {
            Entry::Leaf { point, .. } => point[d],
            Entry::Directory { bbox, .. } => bbox.min_coord(d),
        }
    }
    fn max_coord(&self, d: usize) -> f32 {
        match self {
            Entry::Leaf { point, .. } => point[d],
            Entry::Directory { bbox, .. } => bbox.max_coord(d),
        }
    }
}

impl Entry {
    /// The box of this entry, degenerate for leaf entries
    pub fn bbox(&self) -> BoundingBox {
        match self {
            Entry::Leaf { point, .. } => BoundingBox::from_point(point),
            Entry::Directory { bbox, .. } => bbox.clone(),
        }
    }

    /// The child this entry points to, if it is a directory entry
    pub fn child(&self) -> Option<NodeId> {
        match self {
            Entry::Leaf { .. } => None,
            Entry::Directory { child, .. } => Some(*child),
        }
    }

    /// The object id, if it is a leaf entry
    pub fn id(&self) -> Option<PointIndex> {
        match self {
            Entry::Leaf { id, .. } => Some(*id),
            Entry::Directory { .. } => None,
        }
    }
}

/// A page of the tree. Leaves hold only leaf entries, directory nodes only directory entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    leaf: bool,
    entries: Vec<Entry>,
}

impl Node {
    /// Empty leaf with room for `capacity` entries plus the one that overflows it
    pub fn new_leaf(capacity: usize) -> Node {
        Node {
            leaf: true,
            entries: Vec::with_capacity(capacity + 1),
        }
    }

    /// Empty directory node with room for `capacity` entries plus the one that overflows it
    pub fn new_directory(capacity: usize) -> Node {
        Node {
            leaf: false,
            entries: Vec::with_capacity(capacity + 1),
        }
    }

    pub(crate) fn from_entries(leaf: bool, entries: Vec<Entry>) -> Node {
        Node { leaf, entries }
    }

    ///
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    ///
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    ///
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub(crate) fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    pub(crate) fn push(&mut self, entry: Entry) {
        debug_assert_eq!(self.leaf, entry.id().is_some());
        self.entries.push(entry);
    }

    pub(crate) fn remove(&mut self, slot: usize) -> Entry {
        self.entries.remove(slot)
    }

    /// The union of all entries, `None` for an empty node
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::union_all(self.entries.iter())
    }

    /// Replaces the box of a directory entry. Returns true if it differed.
    pub(crate) fn set_entry_bbox(&mut self, slot: usize, new_bbox: BoundingBox) -> bool {
        if let Some(Entry::Directory { bbox, .. }) = self.entries.get_mut(slot) {
            if *bbox != new_bbox {
                *bbox = new_bbox;
                return true;
            }
        }
        false
    }

    /// Grows the box of a directory entry to cover `other`. Returns true if it changed.
    pub(crate) fn extend_entry_bbox<S: Spatial + ?Sized>(&mut self, slot: usize, other: &S) -> bool {
        match self.entries.get_mut(slot) {
            Some(Entry::Directory { bbox, .. }) => bbox.extend(other),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_box_tracks_entries() {
        let mut node = Node::new_leaf(4);
        assert!(node.bbox().is_none());
        node.push(Entry::Leaf {
            id: 0,
            point: vec![0.0, 1.0],
        });
        node.push(Entry::Leaf {
            id: 1,
            point: vec![2.0, -1.0],
        });
        let bbox = node.bbox().unwrap();
        assert_eq!(bbox.min(), &[0.0, -1.0]);
        assert_eq!(bbox.max(), &[2.0, 1.0]);
        assert_eq!(node.remove(0).id(), Some(0));
        assert_eq!(node.bbox().unwrap(), BoundingBox::from_point(&[2.0, -1.0]));
    }

    #[test]
    fn directory_entry_updates() {
        let mut node = Node::new_directory(4);
        node.push(Entry::Directory {
            child: 7,
            bbox: BoundingBox::from_point(&[0.0, 0.0]),
        });
        assert!(!node.extend_entry_bbox(0, &[0.0f32, 0.0][..]));
        assert!(node.extend_entry_bbox(0, &[1.0f32, 1.0][..]));
        assert!(!node.set_entry_bbox(0, BoundingBox::new(vec![0.0, 0.0], vec![1.0, 1.0])));
        assert_eq!(node.entries()[0].child(), Some(7));
    }

    #[test]
    fn nodes_encode_for_a_page_store() {
        let mut node = Node::new_leaf(2);
        node.push(Entry::Leaf {
            id: 3,
            point: vec![0.5, 2.0],
        });
        let page = serde_json::to_string(&node).unwrap();
        let decoded: Node = serde_json::from_str(&page).unwrap();
        assert_eq!(decoded, node);
        assert!(decoded.is_leaf());
    }
}
