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

//! Bulk construction of a cover tree.
//!
//! Each node is built from its routing object and the candidates assigned to it. Candidates within
//! the node's cover radius stay with the routing object and form its first child one scale lower.
//! The rest are grouped around new routing objects picked in order, each group becoming another
//! child. Children are independent, so every one of them is handed to the rayon pool as soon as its
//! parent is done and the finished nodes are collected over a channel.

use super::data_caches::*;
use super::node::*;
use super::tree::CoverTree;
use crate::errors::*;
use crate::utils::{read_yaml, yaml_enum};
use crate::NodeId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use hashbrown::HashMap;
use log::{debug, info, warn};
use pbr::ProgressBar;
use pointcloud::distances::{Distance, InputType};
use pointcloud::{PointCloud, PointIndex};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// The scale an object at distance `dist` from the routing object lives on.
pub(crate) fn dist_to_scale(dist: f32, expansion: f32) -> i32 {
    ((dist as f64).ln() / (expansion as f64).ln()).ceil() as i32
}

/// The radius of a scale.
pub(crate) fn scale_to_dist(scale: i32, expansion: f32) -> f32 {
    (expansion as f64).powi(scale) as f32
}

/// Scales below this one have radii that can't be told apart from 0 anymore.
pub(crate) fn scale_bottom(expansion: f32) -> i32 {
    ((f32::MIN_POSITIVE as f64).ln() / (expansion as f64).ln()).ceil() as i32
}

pub(crate) struct BuildParameters<D: PointCloud + ?Sized> {
    pub(crate) point_cloud: Arc<D>,
    pub(crate) distance: Arc<dyn Distance>,
    pub(crate) expansion: f32,
    pub(crate) truncate: usize,
    pub(crate) variant: CoverTreeVariant,
    pub(crate) scale_bottom: i32,
    total_nodes: AtomicUsize,
}

impl<D: PointCloud + ?Sized> BuildParameters<D> {
    fn allocate(&self) -> NodeId {
        self.total_nodes.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct BuilderNode {
    id: NodeId,
    routing: PointIndex,
    max_scale: i32,
    parent_dist: f32,
    candidates: CandidateList,
}

type NodeSplitResult = SimdexResult<(NodeId, CoverNode)>;

impl BuilderNode {
    fn split_parallel<D: PointCloud + ?Sized>(
        self,
        parameters: &Arc<BuildParameters<D>>,
        node_sender: &Sender<NodeSplitResult>,
    ) {
        let parameters = Arc::clone(parameters);
        let node_sender = node_sender.clone();
        rayon::spawn(move || {
            let id = self.id;
            match self.split(&parameters) {
                Ok((node, new_nodes)) => {
                    // A closed channel means the build was abandoned.
                    if node_sender.send(Ok((id, node))).is_ok() {
                        for new_node in new_nodes {
                            new_node.split_parallel(&parameters, &node_sender);
                        }
                    }
                }
                Err(e) => {
                    let _ = node_sender.send(Err(e));
                }
            }
        });
    }

    fn split<D: PointCloud + ?Sized>(
        self,
        parameters: &BuildParameters<D>,
    ) -> SimdexResult<(CoverNode, Vec<BuilderNode>)> {
        let BuilderNode {
            routing,
            mut max_scale,
            parent_dist,
            mut candidates,
            ..
        } = self;
        loop {
            let max = candidates.max_distance();
            if max <= 0.0 || candidates.len() < parameters.truncate {
                return Ok((leaf(routing, max, parent_dist, candidates, parameters.variant), Vec::new()));
            }
            let scale = (dist_to_scale(max, parameters.expansion) - 1).min(max_scale);
            if scale <= parameters.scale_bottom {
                return Ok((leaf(routing, max, parent_dist, candidates, parameters.variant), Vec::new()));
            }
            let mut far = candidates.exclude_not_covered(scale_to_dist(scale, parameters.expansion));
            if far.is_empty() {
                debug!(
                    "Scale {} leaves nothing uncovered around {} (max distance {}), going one lower",
                    scale, routing, max
                );
                max_scale = scale - 1;
                continue;
            }

            let next_scale = scale - 1;
            let mut node = CoverNode::new(routing, max, parent_dist, parameters.variant);
            let mut new_nodes = Vec::new();
            let routing_is_singleton = candidates.is_empty();
            if !routing_is_singleton {
                let id = parameters.allocate();
                node.push_child(id);
                new_nodes.push(BuilderNode {
                    id,
                    routing,
                    max_scale: next_scale,
                    parent_dist: 0.0,
                    candidates,
                });
            }
            let radius = scale_to_dist(next_scale, parameters.expansion);
            while let Some((center, center_dist, covered)) = far.collect_by_cover(
                parameters.point_cloud.as_ref(),
                parameters.distance.as_ref(),
                radius,
            )? {
                if covered.is_empty() {
                    node.push_singleton(center, center_dist);
                } else {
                    let id = parameters.allocate();
                    node.push_child(id);
                    new_nodes.push(BuilderNode {
                        id,
                        routing: center,
                        max_scale: next_scale,
                        parent_dist: center_dist,
                        candidates: covered,
                    });
                }
            }
            if routing_is_singleton && !node.is_leaf() {
                node.push_singleton(routing, 0.0);
            }
            return Ok((node, new_nodes));
        }
    }
}

fn leaf(
    routing: PointIndex,
    max: f32,
    parent_dist: f32,
    candidates: CandidateList,
    variant: CoverTreeVariant,
) -> CoverNode {
    let mut node = CoverNode::new(routing, max, parent_dist, variant);
    for (index, dist) in candidates.iter() {
        node.push_singleton(index, dist);
    }
    node
}

/// A construction object for a cover tree.
#[derive(Debug, Clone)]
pub struct CoverTreeBuilder {
    pub(crate) expansion: f32,
    pub(crate) truncate: usize,
    pub(crate) variant: CoverTreeVariant,
    pub(crate) verbosity: u32,
    pub(crate) rng_seed: Option<u64>,
}

impl Default for CoverTreeBuilder {
    fn default() -> CoverTreeBuilder {
        CoverTreeBuilder {
            expansion: 1.3,
            truncate: 10,
            variant: CoverTreeVariant::Full,
            verbosity: 0,
            rng_seed: None,
        }
    }
}

impl CoverTreeBuilder {
    /// Creates a new builder with the default expansion rate of 1.3 and truncation at 10 objects.
    pub fn new() -> CoverTreeBuilder {
        CoverTreeBuilder::default()
    }

    /// Reads the builder parameters from a yaml file. Missing keys keep their defaults.
    /// ```yaml
    /// ---
    /// expansion: 1.3
    /// truncate: 10
    /// variant: full
    /// verbosity: 0
    /// rng_seed: 42
    /// ```
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> SimdexResult<CoverTreeBuilder> {
        let (params, file_name) = read_yaml(&path)?;
        let mut builder = CoverTreeBuilder::default();
        if let Some(expansion) = params["expansion"].as_f64() {
            builder.expansion = expansion as f32;
        }
        if let Some(truncate) = params["truncate"].as_i64() {
            builder.truncate = truncate.max(0) as usize;
        }
        if let Some(variant) = yaml_enum(&params, "variant", &file_name)? {
            builder.variant = variant;
        }
        builder.verbosity = params["verbosity"].as_i64().unwrap_or(0).max(0) as u32;
        builder.rng_seed = params["rng_seed"].as_i64().map(|i| i as u64);
        builder.validate()?;
        Ok(builder)
    }

    /// The zoom factor between two scales. Has to be larger than 1.
    pub fn set_expansion(&mut self, x: f32) -> &mut Self {
        self.expansion = x;
        self
    }
    /// Nodes with fewer candidates than this become leaves.
    pub fn set_truncate(&mut self, x: usize) -> &mut Self {
        self.truncate = x;
        self
    }
    /// Which node layout to build.
    pub fn set_variant(&mut self, x: CoverTreeVariant) -> &mut Self {
        self.variant = x;
        self
    }
    /// Above 1 a progress bar is printed.
    pub fn set_verbosity(&mut self, x: u32) -> &mut Self {
        self.verbosity = x;
        self
    }
    /// With a seed the first routing object is drawn at random, otherwise it is the first object.
    pub fn set_rng_seed(&mut self, x: u64) -> &mut Self {
        self.rng_seed = Some(x);
        self
    }

    ///
    pub fn expansion(&self) -> f32 {
        self.expansion
    }

    ///
    pub fn truncate(&self) -> usize {
        self.truncate
    }

    ///
    pub fn variant(&self) -> CoverTreeVariant {
        self.variant
    }

    fn validate(&self) -> SimdexResult<()> {
        if !(self.expansion > 1.0) || !self.expansion.is_finite() {
            return Err(SimdexError::invalid_parameter(
                "expansion",
                format!("{} is not larger than 1", self.expansion),
            ));
        }
        if self.truncate == 0 {
            return Err(SimdexError::invalid_parameter("truncate", "has to be at least 1"));
        }
        Ok(())
    }

    /// Builds the tree over every object of the point cloud.
    pub fn build<D: PointCloud + ?Sized>(
        &self,
        point_cloud: Arc<D>,
        distance: Arc<dyn Distance>,
    ) -> SimdexResult<CoverTree<D>> {
        self.validate()?;
        if distance.input_type() == InputType::PointIndex {
            return Err(SimdexError::UnsupportedDistance(distance.name().to_string()));
        }
        if !distance.is_metric() {
            warn!(
                "{} is not a metric, cover tree results will be approximate",
                distance.name()
            );
        }
        let parameters = Arc::new(BuildParameters {
            point_cloud: Arc::clone(&point_cloud),
            distance: Arc::clone(&distance),
            expansion: self.expansion,
            truncate: self.truncate,
            variant: self.variant,
            scale_bottom: scale_bottom(self.expansion),
            total_nodes: AtomicUsize::new(0),
        });

        let mut indexes = point_cloud.reference_indexes();
        if indexes.is_empty() {
            return Ok(CoverTree::from_parts(point_cloud, distance, Vec::new(), None, self));
        }
        let first = match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed).gen_range(0..indexes.len()),
            None => 0,
        };
        let routing = indexes.swap_remove(first);
        let candidates =
            CandidateList::from_center(point_cloud.as_ref(), distance.as_ref(), routing, indexes)?;
        let root = BuilderNode {
            id: parameters.allocate(),
            routing,
            max_scale: i32::MAX,
            parent_dist: 0.0,
            candidates,
        };
        let root_id = root.id;

        let (node_sender, node_receiver): (Sender<NodeSplitResult>, Receiver<NodeSplitResult>) =
            unbounded();
        root.split_parallel(&parameters, &node_sender);
        drop(node_sender);

        let mut pb = ProgressBar::new(1u64);
        if self.verbosity > 1 {
            pb.format("╢▌▌░╟");
        }
        let now = Instant::now();
        let mut finished: HashMap<NodeId, CoverNode> = HashMap::new();
        while finished.len() < parameters.total_nodes.load(Ordering::SeqCst) {
            let (id, node) = match node_receiver.recv() {
                Ok(res) => res?,
                Err(_) => {
                    return Err(SimdexError::IntegrityError(
                        "the build workers stopped early".to_string(),
                    ))
                }
            };
            finished.insert(id, node);
            if self.verbosity > 1 {
                pb.total = parameters.total_nodes.load(Ordering::SeqCst) as u64;
                pb.inc();
            }
        }
        if self.verbosity > 1 {
            pb.finish();
        }

        let mut nodes = Vec::with_capacity(finished.len());
        for id in 0..finished.len() {
            let node = finished
                .remove(&id)
                .ok_or_else(|| SimdexError::IntegrityError(format!("node {} was never built", id)))?;
            nodes.push(node);
        }
        info!(
            "Built a cover tree over {} objects with {} nodes in {:?}",
            point_cloud.len(),
            nodes.len(),
            now.elapsed()
        );
        Ok(CoverTree::from_parts(point_cloud, distance, nodes, Some(root_id), self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointcloud::data_sources::DataRam;
    use pointcloud::distances::{RandomStableDistance, L2};
    use std::io::Write;
    use tempdir::TempDir;

    #[test]
    fn scales() {
        assert_eq!(dist_to_scale(1.0, 2.0), 0);
        assert_eq!(dist_to_scale(3.0, 2.0), 2);
        assert_eq!(dist_to_scale(4.0, 2.0), 2);
        assert_approx_eq!(scale_to_dist(-2, 2.0), 0.25);
        assert!(scale_bottom(1.3) < -300);
    }

    #[test]
    fn bad_parameters_are_rejected() {
        let cloud = Arc::new(DataRam::new(vec![0.0, 1.0], 1).unwrap());
        let mut builder = CoverTreeBuilder::new();
        builder.set_expansion(1.0);
        assert!(builder.build(Arc::clone(&cloud), Arc::new(L2)).is_err());
        let mut builder = CoverTreeBuilder::new();
        builder.set_truncate(0);
        assert!(builder.build(Arc::clone(&cloud), Arc::new(L2)).is_err());
        match CoverTreeBuilder::new().build(cloud, Arc::new(RandomStableDistance::new(1))) {
            Err(SimdexError::UnsupportedDistance(_)) => {}
            other => panic!("expected an unsupported distance, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn small_clouds_are_one_leaf() {
        let cloud = Arc::new(DataRam::new((0..5).map(|i| i as f32).collect(), 1).unwrap());
        let tree = CoverTreeBuilder::new().build(cloud, Arc::new(L2)).unwrap();
        assert_eq!(tree.node_count(), 1);
        let root = tree.node(tree.root().unwrap()).unwrap();
        assert!(root.is_leaf());
        assert_eq!(root.singletons().len(), 5);
        assert_approx_eq!(root.max_dist(), 4.0);
    }

    #[test]
    fn seeded_builds_are_repeatable() {
        let data: Vec<f32> = (0..400).map(|i| ((i * 37) % 101) as f32 / 7.0).collect();
        let cloud = Arc::new(DataRam::new(data, 2).unwrap());
        let mut builder = CoverTreeBuilder::new();
        builder.set_rng_seed(7).set_truncate(3);
        let a = builder.build(Arc::clone(&cloud), Arc::new(L2)).unwrap();
        let b = builder.build(cloud, Arc::new(L2)).unwrap();
        assert_eq!(a.node_count(), b.node_count());
        assert_eq!(
            a.node(a.root().unwrap()).unwrap().routing_object(),
            b.node(b.root().unwrap()).unwrap().routing_object()
        );
    }

    #[test]
    fn yaml_builder() {
        let dir = TempDir::new("simdex").unwrap();
        let path = dir.path().join("cover_tree.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "---\nexpansion: 1.5\ntruncate: 4\nvariant: simplified").unwrap();
        let builder = CoverTreeBuilder::from_yaml(&path).unwrap();
        assert_approx_eq!(builder.expansion(), 1.5);
        assert_eq!(builder.truncate(), 4);
        assert_eq!(builder.variant(), CoverTreeVariant::Simplified);
    }
}
