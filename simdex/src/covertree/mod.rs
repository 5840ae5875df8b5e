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

//! # Cover Tree
//!
//! A metric tree built in one go over a point cloud. Each node has a routing object and a covering
//! radius, everything below the node lies within that radius of the routing object. Children cover
//! their share of the parent at the next smaller scale, one factor of the expansion rate down.
//! Small groups and isolated objects are kept as singletons in the node instead of becoming nodes.
//!
//! The distance has to be a metric, the searches prune with the triangle inequality.
//!
//! ```rust
//! use simdex::covertree::CoverTreeBuilder;
//! use pointcloud::data_sources::DataRam;
//! use pointcloud::distances::L2;
//! use std::sync::Arc;
//!
//! let cloud = Arc::new(DataRam::new((0..100).map(|i| i as f32).collect(), 1).unwrap());
//! let tree = CoverTreeBuilder::new().build(cloud, Arc::new(L2)).unwrap();
//! let knn = tree.knn(&[41.2], 2).unwrap();
//! assert_eq!(knn[0].1, 41);
//! assert_eq!(knn[1].1, 42);
//! ```

pub(crate) mod builders;
pub(crate) mod data_caches;
mod node;
mod tree;

pub use builders::CoverTreeBuilder;
pub use node::{CoverNode, CoverTreeVariant};
pub use tree::{CoverTree, CoverTreePrioritySearcher, CoverTreeStats};
