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

//! # R*-tree
//!
//! A balanced tree of axis aligned bounding boxes for low dimensional vector data. It can be
//! filled one object at a time, with forced reinsertion on the first overflow of each level, or
//! bulk loaded in one go from a sorted partition of the data.
//!
//! ```rust
//! use simdex::rstar::{RStarSettings, RStarTree};
//! use pointcloud::distances::L2;
//!
//! let mut tree = RStarTree::new(RStarSettings::new()).unwrap();
//! tree.insert(0, &[0.0, 0.0]).unwrap();
//! tree.insert(1, &[1.0, 1.0]).unwrap();
//! tree.insert(2, &[5.0, 5.0]).unwrap();
//! let found = tree.range(&L2, &[1.0, 1.0], 0.1).unwrap();
//! assert_eq!(found[0].1, 1);
//! ```

mod bounding_box;
mod bulk_split;
mod insertion;
mod node;
mod search;
mod settings;
mod split;
mod storage;
mod tree;

pub use bounding_box::*;
pub use node::{Entry, Node};
pub use search::RStarPrioritySearcher;
pub use settings::*;
pub use storage::{MemoryStorage, NodeStorage};
pub use tree::{RStarTree, TreeStats};
