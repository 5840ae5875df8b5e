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

//! # The R*-tree
//! A height balanced tree of bounding boxes. Nodes live in a [`NodeStorage`] and refer to their
//! children by id, so every mutation is a sequence of read, modify, write steps along an explicit
//! path from the root. Nothing points upwards.
//!
//! Levels are counted from the leaves: leaves are level 0 and the root is level `height - 1`.
//! Forced reinsertion remembers the levels it has already been used on during the current
//! top-level operation, and those level numbers stay valid when the root splits.

use super::bounding_box::*;
use super::insertion::smallest_containing;
use super::node::*;
use super::settings::*;
use super::storage::*;
use crate::errors::*;
use crate::NodeId;
use log::{debug, info};
use pointcloud::PointIndex;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::path::Path;

/// The nodes from the root down to some node, with the slot that leads from each to the next.
#[derive(Debug, Clone)]
pub(crate) struct TreePath {
    pub(crate) nodes: SmallVec<[NodeId; 8]>,
    pub(crate) slots: SmallVec<[usize; 8]>,
}

impl TreePath {
    fn new(root: NodeId) -> TreePath {
        let mut nodes = SmallVec::new();
        nodes.push(root);
        TreePath {
            nodes,
            slots: SmallVec::new(),
        }
    }

    fn push(&mut self, slot: usize, child: NodeId) {
        self.slots.push(slot);
        self.nodes.push(child);
    }

    fn pop(&mut self) {
        self.slots.pop();
        self.nodes.pop();
    }

    fn last(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }
}

/// Shape of a tree, see [`RStarTree::stats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeStats {
    /// Levels, a lone leaf root is height 1
    pub height: usize,
    /// Objects stored
    pub objects: usize,
    /// Leaf nodes
    pub leaves: usize,
    /// Directory nodes
    pub directories: usize,
    /// Average share of the leaf capacity in use
    pub leaf_fill: f32,
    /// Average share of the directory capacity in use
    pub directory_fill: f32,
}

/// A balanced bounding box tree over points of one fixed dimension.
#[derive(Debug)]
pub struct RStarTree<S: NodeStorage = MemoryStorage> {
    settings: RStarSettings,
    storage: S,
    root: NodeId,
    height: usize,
    dim: Option<usize>,
    capacities: Option<Capacities>,
    len: usize,
    populated: bool,
    reinserted_levels: SmallVec<[usize; 8]>,
}

impl RStarTree<MemoryStorage> {
    /// An empty tree kept in memory.
    pub fn new(settings: RStarSettings) -> SimdexResult<RStarTree<MemoryStorage>> {
        RStarTree::with_storage(settings, MemoryStorage::new())
    }

    /// An empty in memory tree with the settings read from a yaml file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> SimdexResult<RStarTree<MemoryStorage>> {
        RStarTree::new(RStarSettings::from_yaml(path)?)
    }
}

impl<S: NodeStorage> RStarTree<S> {
    /// An empty tree on the given storage. The storage is expected to be empty.
    pub fn with_storage(settings: RStarSettings, mut storage: S) -> SimdexResult<RStarTree<S>> {
        settings.validate()?;
        let root = storage.allocate();
        storage.write(root, Node::new_leaf(0))?;
        Ok(RStarTree {
            settings,
            storage,
            root,
            height: 1,
            dim: None,
            capacities: None,
            len: 0,
            populated: false,
            reinserted_levels: SmallVec::new(),
        })
    }

    /// An empty tree with the capacities already fixed for `dim`. Fails if the page size
    /// can't hold enough entries of that dimension.
    pub fn with_dim(settings: RStarSettings, storage: S, dim: usize) -> SimdexResult<RStarTree<S>> {
        let mut tree = RStarTree::with_storage(settings, storage)?;
        tree.initialize(dim)?;
        Ok(tree)
    }

    /// Fixes the dimension and node sizes on first use.
    fn initialize(&mut self, dim: usize) -> SimdexResult<Capacities> {
        match (self.dim, self.capacities) {
            (Some(expected), Some(caps)) => {
                if expected != dim {
                    return Err(SimdexError::DimensionMismatch {
                        expected,
                        found: dim,
                    });
                }
                Ok(caps)
            }
            _ => {
                let caps = self.settings.capacities(dim)?;
                debug!(
                    "Initialized tree for dimension {}: leaf capacity {} (min {}), directory capacity {} (min {})",
                    dim, caps.leaf_capacity, caps.leaf_minimum, caps.dir_capacity, caps.dir_minimum
                );
                self.dim = Some(dim);
                self.capacities = Some(caps);
                Ok(caps)
            }
        }
    }

    fn caps(&self) -> SimdexResult<Capacities> {
        self.capacities
            .ok_or_else(|| SimdexError::IntegrityError("the tree was never initialized".to_string()))
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.len
    }

    /// If there are no objects
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels
    pub fn height(&self) -> usize {
        self.height
    }

    /// The dimension, once known
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    /// The node sizes, once known
    pub fn capacities(&self) -> Option<Capacities> {
        self.capacities
    }

    ///
    pub fn settings(&self) -> &RStarSettings {
        &self.settings
    }

    ///
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Storage id of the root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Inserts one object.
    pub fn insert(&mut self, id: PointIndex, point: &[f32]) -> SimdexResult<()> {
        self.initialize(point.len())?;
        self.reinserted_levels.clear();
        self.insert_entry(
            Entry::Leaf {
                id,
                point: point.to_vec(),
            },
            0,
        )?;
        self.len += 1;
        self.populated = true;
        Ok(())
    }

    /// Walks down from the root to a node on `target_level`, picking the child at every step.
    fn choose_path<T: Spatial + ?Sized>(&self, obj: &T, target_level: usize) -> SimdexResult<TreePath> {
        let mut path = TreePath::new(self.root);
        let mut level = self.height - 1;
        while level > target_level {
            let node = self.storage.read(path.last())?;
            if node.is_empty() {
                return Err(SimdexError::IntegrityError(format!(
                    "empty directory node {} on the insertion path",
                    path.last()
                )));
            }
            let slot = match smallest_containing(node.entries(), obj) {
                Some(slot) => slot,
                None => self.settings.insertion.choose(node.entries(), obj, level == 1),
            };
            let child = node.entries()[slot].child().ok_or_else(|| {
                SimdexError::IntegrityError(format!("leaf entry above the leaves in node {}", path.last()))
            })?;
            path.push(slot, child);
            level -= 1;
        }
        Ok(path)
    }

    /// Puts an entry into a node on `level`: a leaf entry at level 0, a directory entry one
    /// level above the subtree it points to.
    fn insert_entry(&mut self, entry: Entry, level: usize) -> SimdexResult<()> {
        let caps = self.caps()?;
        let path = self.choose_path(&entry, level)?;
        let target = path.last();
        let bbox = entry.bbox();
        let mut node = self.storage.read(target)?.into_owned();
        node.push(entry);
        self.storage.write(target, node)?;
        self.adjust_tree(path, bbox, caps)
    }

    fn should_reinsert(&self, level: usize) -> bool {
        match self.settings.overflow {
            OverflowTreatment::SplitOnly => false,
            OverflowTreatment::LimitedReinsert { .. } => !self.reinserted_levels.contains(&level),
        }
    }

    /// Fixes overflows and boxes bottom up after `inserted` was added to the last node of `path`.
    fn adjust_tree(&mut self, path: TreePath, inserted: BoundingBox, caps: Capacities) -> SimdexResult<()> {
        let mut depth = path.nodes.len() - 1;
        loop {
            let id = path.nodes[depth];
            let level = self.height - 1 - depth;
            let (len, is_leaf) = {
                let node = self.storage.read(id)?;
                (node.len(), node.is_leaf())
            };

            if len > caps.capacity(is_leaf) {
                if depth > 0 && self.should_reinsert(level) {
                    self.reinserted_levels.push(level);
                    return self.reinsert(&path, depth, level, caps);
                }
                let node = self.storage.read(id)?.into_owned();
                let (keep, moved) = self
                    .settings
                    .split
                    .split(node.into_entries(), caps.minimum(is_leaf));
                debug!(
                    "Split node {} on level {} into {} and {} entries",
                    id,
                    level,
                    keep.len(),
                    moved.len()
                );
                let keep = Node::from_entries(is_leaf, keep);
                let moved = Node::from_entries(is_leaf, moved);
                let keep_box = node_box(&keep, id)?;
                let new_id = self.storage.allocate();
                let moved_box = node_box(&moved, new_id)?;
                self.storage.write(id, keep)?;
                self.storage.write(new_id, moved)?;

                if depth == 0 {
                    let mut root = Node::new_directory(caps.dir_capacity);
                    root.push(Entry::Directory {
                        child: id,
                        bbox: keep_box,
                    });
                    root.push(Entry::Directory {
                        child: new_id,
                        bbox: moved_box,
                    });
                    let root_id = self.storage.allocate();
                    self.storage.write(root_id, root)?;
                    self.root = root_id;
                    self.height += 1;
                    debug!("Root split, the tree now has height {}", self.height);
                    return Ok(());
                }
                let parent_id = path.nodes[depth - 1];
                let mut parent = self.storage.read(parent_id)?.into_owned();
                parent.set_entry_bbox(path.slots[depth - 1], keep_box);
                parent.push(Entry::Directory {
                    child: new_id,
                    bbox: moved_box,
                });
                self.storage.write(parent_id, parent)?;
                depth -= 1;
                continue;
            }

            if depth == 0 {
                return Ok(());
            }
            let parent_id = path.nodes[depth - 1];
            let mut parent = self.storage.read(parent_id)?.into_owned();
            if !parent.extend_entry_bbox(path.slots[depth - 1], &inserted) {
                return Ok(());
            }
            self.storage.write(parent_id, parent)?;
            depth -= 1;
        }
    }

    /// Forced reinsertion: takes the entries farthest from the center out of the overflowing node
    /// at `path.nodes[depth]` and inserts them again from the top.
    fn reinsert(&mut self, path: &TreePath, depth: usize, level: usize, caps: Capacities) -> SimdexResult<()> {
        let (amount, order) = match self.settings.overflow {
            OverflowTreatment::LimitedReinsert { amount, order } => (amount, order),
            OverflowTreatment::SplitOnly => return Ok(()),
        };
        let id = path.nodes[depth];
        let node = self.storage.read(id)?.into_owned();
        let is_leaf = node.is_leaf();
        let center = node_box(&node, id)?.center();
        let mut entries = node.into_entries();
        let len = entries.len();
        let count = ((amount * len as f32).floor() as usize)
            .max(1)
            .min(len.saturating_sub(caps.minimum(is_leaf)));
        if count == 0 {
            return Ok(());
        }

        entries.sort_by(|a, b| {
            center_distance_sq(b, &center[..])
                .partial_cmp(&center_distance_sq(a, &center[..]))
                .unwrap_or(Ordering::Equal)
        });
        let mut removed: Vec<Entry> = entries.drain(..count).collect();
        if order == ReinsertOrder::ClosestFirst {
            removed.reverse();
        }
        debug!("Reinserting {} of {} entries on level {}", count, len, level);
        self.storage.write(id, Node::from_entries(is_leaf, entries))?;
        self.tighten_ancestors(path, depth)?;

        for entry in removed {
            self.insert_entry(entry, level)?;
        }
        Ok(())
    }

    /// Recomputes the boxes above `path.nodes[depth]` until one comes out unchanged.
    fn tighten_ancestors(&mut self, path: &TreePath, mut depth: usize) -> SimdexResult<()> {
        while depth > 0 {
            let id = path.nodes[depth];
            let bbox = match self.storage.read(id)?.bbox() {
                Some(bbox) => bbox,
                None => return Ok(()),
            };
            let parent_id = path.nodes[depth - 1];
            let mut parent = self.storage.read(parent_id)?.into_owned();
            if !parent.set_entry_bbox(path.slots[depth - 1], bbox) {
                return Ok(());
            }
            self.storage.write(parent_id, parent)?;
            depth -= 1;
        }
        Ok(())
    }

    /// Removes the object with this id stored at `point`. Returns `false` if there is no such
    /// object.
    pub fn delete(&mut self, id: PointIndex, point: &[f32]) -> SimdexResult<bool> {
        if self.len == 0 {
            return Ok(false);
        }
        if let Some(expected) = self.dim {
            if expected != point.len() {
                return Err(SimdexError::DimensionMismatch {
                    expected,
                    found: point.len(),
                });
            }
        }
        let mut path = TreePath::new(self.root);
        let slot = match self.find_path(id, point, &mut path)? {
            Some(slot) => slot,
            None => return Ok(false),
        };
        let leaf_id = path.last();
        let mut leaf = self.storage.read(leaf_id)?.into_owned();
        leaf.remove(slot);
        self.storage.write(leaf_id, leaf)?;
        self.len -= 1;
        self.condense_tree(path)?;
        Ok(true)
    }

    /// Extends `path` down to the leaf holding the object and returns its slot there.
    fn find_path(&self, id: PointIndex, point: &[f32], path: &mut TreePath) -> SimdexResult<Option<usize>> {
        let node = self.storage.read(path.last())?;
        if node.is_leaf() {
            return Ok(node.entries().iter().position(|e| match e {
                Entry::Leaf { id: other, point: p } => *other == id && p.as_slice() == point,
                Entry::Directory { .. } => false,
            }));
        }
        let candidates: SmallVec<[(usize, NodeId); 16]> = node
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, e)| intersects(*e, point))
            .filter_map(|(slot, e)| e.child().map(|c| (slot, c)))
            .collect();
        for (slot, child) in candidates {
            path.push(slot, child);
            if let Some(found) = self.find_path(id, point, path)? {
                return Ok(Some(found));
            }
            path.pop();
        }
        Ok(None)
    }

    /// Dissolves underfull nodes on the path after a removal and reinserts what they held.
    fn condense_tree(&mut self, path: TreePath) -> SimdexResult<()> {
        let caps = self.caps()?;
        let mut orphans: Vec<(Entry, usize)> = Vec::new();
        let mut depth = path.nodes.len() - 1;
        while depth > 0 {
            let id = path.nodes[depth];
            let level = self.height - 1 - depth;
            let node = self.storage.read(id)?.into_owned();
            let parent_id = path.nodes[depth - 1];
            let slot = path.slots[depth - 1];
            let mut parent = self.storage.read(parent_id)?.into_owned();
            if node.len() < caps.minimum(node.is_leaf()) {
                parent.remove(slot);
                orphans.extend(node.into_entries().into_iter().map(|e| (e, level)));
                self.storage.delete(id)?;
            } else if let Some(bbox) = node.bbox() {
                parent.set_entry_bbox(slot, bbox);
            }
            self.storage.write(parent_id, parent)?;
            depth -= 1;
        }

        loop {
            let (is_leaf, len, only_child) = {
                let root = self.storage.read(self.root)?;
                (root.is_leaf(), root.len(), root.entries().first().and_then(|e| e.child()))
            };
            if is_leaf || len > 1 {
                break;
            }
            self.storage.delete(self.root)?;
            match only_child {
                Some(child) if len == 1 => {
                    self.root = child;
                    self.height -= 1;
                }
                _ => {
                    self.root = self.storage.allocate();
                    self.storage.write(self.root, Node::new_leaf(caps.leaf_capacity))?;
                    self.height = 1;
                    break;
                }
            }
        }

        if !orphans.is_empty() {
            debug!("Reinserting {} orphaned entries", orphans.len());
        }
        orphans.sort_by(|a, b| b.1.cmp(&a.1));
        for (entry, level) in orphans {
            self.reinserted_levels.clear();
            self.reinsert_orphan(entry, level)?;
        }
        Ok(())
    }

    /// A directory entry whose level is at or above the root can't be placed anymore, its
    /// subtree is taken apart one level at a time instead.
    fn reinsert_orphan(&mut self, entry: Entry, level: usize) -> SimdexResult<()> {
        if level < self.height {
            return self.insert_entry(entry, level);
        }
        let child = entry.child().ok_or_else(|| {
            SimdexError::IntegrityError("a leaf entry was orphaned above the leaves".to_string())
        })?;
        let node = self.storage.read(child)?.into_owned();
        self.storage.delete(child)?;
        for e in node.into_entries() {
            self.reinsert_orphan(e, level - 1)?;
        }
        Ok(())
    }

    /// Builds the tree from scratch out of `objects`. Only possible while the tree has never held
    /// anything.
    pub fn bulk_load(&mut self, objects: Vec<(PointIndex, Vec<f32>)>) -> SimdexResult<()> {
        if self.populated || self.len > 0 {
            return Err(SimdexError::BulkLoadAfterInsert);
        }
        let dim = match objects.first() {
            Some((_, point)) => point.len(),
            None => return Ok(()),
        };
        let caps = self.initialize(dim)?;
        if let Some((_, point)) = objects.iter().find(|(_, p)| p.len() != dim) {
            return Err(SimdexError::DimensionMismatch {
                expected: dim,
                found: point.len(),
            });
        }
        let len = objects.len();
        let mut entries: Vec<Entry> = objects
            .into_iter()
            .map(|(id, point)| Entry::Leaf { id, point })
            .collect();

        self.storage.delete(self.root)?;
        let mut leaf = true;
        let mut height = 1;
        let mut nodes = 0;
        loop {
            let groups = self.settings.bulk_split.partition(
                entries,
                caps.minimum(leaf),
                caps.capacity(leaf),
            );
            let mut next = Vec::with_capacity(groups.len());
            for group in groups {
                let node = Node::from_entries(leaf, group);
                let id = self.storage.allocate();
                let bbox = node_box(&node, id)?;
                self.storage.write(id, node)?;
                next.push(Entry::Directory { child: id, bbox });
                nodes += 1;
            }
            if next.len() == 1 {
                self.root = next[0].child().unwrap_or(self.root);
                break;
            }
            entries = next;
            leaf = false;
            height += 1;
        }
        self.height = height;
        self.len = len;
        self.populated = true;
        info!(
            "Bulk loaded {} objects into {} nodes, height {}",
            len, nodes, height
        );
        Ok(())
    }

    /// Verifies that every box is exactly the union of its entries, that every node except the
    /// root is filled within its limits, that all leaves sit at the same depth, and that the leaves
    /// hold exactly `len` objects.
    pub fn check_integrity(&self) -> SimdexResult<()> {
        let caps = match self.capacities {
            Some(caps) => caps,
            None => {
                let root = self.storage.read(self.root)?;
                if root.is_leaf() && root.is_empty() && self.height == 1 {
                    return Ok(());
                }
                return Err(SimdexError::IntegrityError(
                    "uninitialized tree with content".to_string(),
                ));
            }
        };
        let objects = self.check_node(self.root, 0, None, &caps)?;
        if objects != self.len {
            return Err(SimdexError::IntegrityError(format!(
                "{} objects in the leaves, {} counted",
                objects, self.len
            )));
        }
        Ok(())
    }

    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        expected_box: Option<&BoundingBox>,
        caps: &Capacities,
    ) -> SimdexResult<usize> {
        let node = self.storage.read(id)?;
        let is_root = depth == 0;
        if node.is_leaf() != (depth == self.height - 1) {
            return Err(SimdexError::IntegrityError(format!(
                "node {} at depth {} in a tree of height {} is a {}",
                id,
                depth,
                self.height,
                if node.is_leaf() { "leaf" } else { "directory" }
            )));
        }
        let len = node.len();
        let min = if is_root { 0 } else { caps.minimum(node.is_leaf()) };
        if len < min || len > caps.capacity(node.is_leaf()) {
            return Err(SimdexError::IntegrityError(format!(
                "node {} holds {} entries, allowed are {} to {}",
                id,
                len,
                min,
                caps.capacity(node.is_leaf())
            )));
        }
        if let Some(expected) = expected_box {
            if node.bbox().as_ref() != Some(expected) {
                return Err(SimdexError::IntegrityError(format!(
                    "the parent's box of node {} is {:?}, the node covers {:?}",
                    id,
                    expected,
                    node.bbox()
                )));
            }
        }
        if node.is_leaf() {
            return Ok(len);
        }
        let mut objects = 0;
        for entry in node.entries() {
            match entry {
                Entry::Directory { child, bbox } => {
                    objects += self.check_node(*child, depth + 1, Some(bbox), caps)?;
                }
                Entry::Leaf { id: pi, .. } => {
                    return Err(SimdexError::IntegrityError(format!(
                        "directory node {} holds the object {}",
                        id, pi
                    )))
                }
            }
        }
        Ok(objects)
    }

    /// Counts nodes and their fill.
    pub fn stats(&self) -> SimdexResult<TreeStats> {
        let mut stats = TreeStats {
            height: self.height,
            objects: self.len,
            leaves: 0,
            directories: 0,
            leaf_fill: 0.0,
            directory_fill: 0.0,
        };
        let caps = match self.capacities {
            Some(caps) => caps,
            None => {
                stats.leaves = 1;
                return Ok(stats);
            }
        };
        let mut leaf_entries = 0;
        let mut dir_entries = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.storage.read(id)?;
            if node.is_leaf() {
                stats.leaves += 1;
                leaf_entries += node.len();
            } else {
                stats.directories += 1;
                dir_entries += node.len();
                stack.extend(node.entries().iter().filter_map(|e| e.child()));
            }
        }
        stats.leaf_fill = leaf_entries as f32 / (stats.leaves * caps.leaf_capacity) as f32;
        if stats.directories > 0 {
            stats.directory_fill = dir_entries as f32 / (stats.directories * caps.dir_capacity) as f32;
        }
        Ok(stats)
    }
}

fn node_box(node: &Node, id: NodeId) -> SimdexResult<BoundingBox> {
    node.bbox()
        .ok_or_else(|| SimdexError::IntegrityError(format!("node {} has no entries", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn small_settings() -> RStarSettings {
        let mut settings = RStarSettings::new();
        settings.set_capacities(8, 6);
        settings
    }

    fn random_points(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..count)
            .map(|_| (0..dim).map(|_| rng.gen_range(-10.0..10.0)).collect())
            .collect()
    }

    #[test]
    fn empty_tree_is_valid() {
        let tree = RStarTree::new(small_settings()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.dim(), None);
        tree.check_integrity().unwrap();
    }

    #[test]
    fn inserts_keep_the_invariants() {
        let mut tree = RStarTree::new(small_settings()).unwrap();
        for (i, p) in random_points(300, 2, 1).iter().enumerate() {
            tree.insert(i, p).unwrap();
        }
        tree.check_integrity().unwrap();
        assert_eq!(tree.len(), 300);
        assert!(tree.height() >= 3);
    }

    #[test]
    fn split_only_keeps_the_invariants() {
        let mut settings = small_settings();
        settings
            .set_overflow(OverflowTreatment::SplitOnly)
            .set_split(SplitStrategy::Quadratic)
            .set_insertion(InsertionStrategy::LeastEnlargement);
        let mut tree = RStarTree::new(settings).unwrap();
        for (i, p) in random_points(200, 3, 2).iter().enumerate() {
            tree.insert(i, p).unwrap();
        }
        tree.check_integrity().unwrap();
    }

    #[test]
    fn closest_first_reinsertion_keeps_the_invariants() {
        let mut settings = small_settings();
        settings
            .set_overflow(OverflowTreatment::LimitedReinsert {
                amount: 0.4,
                order: ReinsertOrder::ClosestFirst,
            })
            .set_split(SplitStrategy::Linear);
        let mut tree = RStarTree::new(settings).unwrap();
        for (i, p) in random_points(200, 2, 3).iter().enumerate() {
            tree.insert(i, p).unwrap();
        }
        tree.check_integrity().unwrap();
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let mut tree = RStarTree::new(small_settings()).unwrap();
        tree.insert(0, &[0.0, 0.0]).unwrap();
        match tree.insert(1, &[0.0, 0.0, 0.0]) {
            Err(SimdexError::DimensionMismatch { expected, found }) => {
                assert_eq!((expected, found), (2, 3));
            }
            other => panic!("expected a dimension mismatch, got {:?}", other),
        }
    }

    #[test]
    fn deleting_everything_leaves_one_empty_leaf() {
        let points = random_points(150, 2, 4);
        let mut tree = RStarTree::new(small_settings()).unwrap();
        for (i, p) in points.iter().enumerate() {
            tree.insert(i, p).unwrap();
        }
        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut rng = SmallRng::seed_from_u64(5);
        for i in (1..order.len()).rev() {
            order.swap(i, rng.gen_range(0..=i));
        }
        for (n, i) in order.iter().enumerate() {
            assert!(tree.delete(*i, &points[*i]).unwrap());
            if n % 10 == 0 {
                tree.check_integrity().unwrap();
            }
        }
        tree.check_integrity().unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.storage().len(), 1);
    }

    #[test]
    fn deleting_a_missing_object_is_not_an_error() {
        let mut tree = RStarTree::new(small_settings()).unwrap();
        assert!(!tree.delete(3, &[1.0, 1.0]).unwrap());
        tree.insert(3, &[1.0, 1.0]).unwrap();
        assert!(!tree.delete(4, &[1.0, 1.0]).unwrap());
        assert!(!tree.delete(3, &[2.0, 2.0]).unwrap());
        assert!(tree.delete(3, &[1.0, 1.0]).unwrap());
        assert!(!tree.delete(3, &[1.0, 1.0]).unwrap());
    }

    #[test]
    fn bulk_load_builds_a_full_tree() {
        for strategy in [
            BulkSplitStrategy::SortTileRecursive,
            BulkSplitStrategy::ZCurve,
            BulkSplitStrategy::MaxExtension,
            BulkSplitStrategy::OneDimSort,
        ]
        .iter()
        {
            let mut settings = small_settings();
            settings.set_bulk_split(*strategy);
            let mut tree = RStarTree::new(settings).unwrap();
            let objects: Vec<(PointIndex, Vec<f32>)> =
                random_points(500, 2, 6).into_iter().enumerate().collect();
            tree.bulk_load(objects).unwrap();
            tree.check_integrity().unwrap();
            assert_eq!(tree.len(), 500);
            let stats = tree.stats().unwrap();
            assert_eq!(stats.height, tree.height());
            assert!(stats.leaf_fill > 0.5, "{:?}: {}", strategy, stats.leaf_fill);
        }
    }

    #[test]
    fn bulk_load_then_mutate() {
        let points = random_points(100, 2, 7);
        let mut tree = RStarTree::new(small_settings()).unwrap();
        tree.bulk_load(points.iter().cloned().enumerate().collect()).unwrap();
        tree.insert(100, &[0.5, 0.5]).unwrap();
        for i in 0..50 {
            assert!(tree.delete(i, &points[i]).unwrap());
        }
        tree.check_integrity().unwrap();
        assert_eq!(tree.len(), 51);
        match tree.bulk_load(vec![(200, vec![0.0, 0.0])]) {
            Err(SimdexError::BulkLoadAfterInsert) => {}
            other => panic!("expected a refusal, got {:?}", other),
        }
    }

    #[test]
    fn tiny_capacities_are_rejected() {
        let mut settings = RStarSettings::new();
        settings.set_capacities(2, 8);
        let mut tree = RStarTree::new(settings).unwrap();
        match tree.insert(0, &[0.0]) {
            Err(SimdexError::CapacityTooSmall { node_kind, capacity }) => {
                assert_eq!((node_kind, capacity), ("leaf", 2));
            }
            other => panic!("expected a capacity error, got {:?}", other),
        }
    }
}
