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

#![allow(dead_code)]
#![warn(missing_docs)]
#![doc(test(attr(allow(unused_variables))))]

//! # Simdex
//! Similarity search indexes over a [`pointcloud`], and a planner that decides which one answers
//! a query.
//!
//! * [`rstar`]: an R*-tree of bounding boxes for low dimensional vectors, dynamic or bulk loaded.
//! * [`covertree`]: a metric tree for any metric distance, built in one go.
//! * [`planner`]: picks an attached index, builds a new one, or scans.
//!
//! ## Parameter Guide
//! The R*-tree's nodes are sized from a page size in bytes and the data's dimension. Small pages
//! give deep trees with tight boxes, large ones shallow trees that scan more per node. The fill
//! ratio bounds how empty a node may get before it is dissolved and its entries reinserted.
//!
//! The cover tree is controlled by its expansion rate and its truncation size. The expansion rate
//! is the factor by which the covering radius shrinks per level. Values around 1.3 give deep
//! narrow trees, values around 2 shallow wide ones. Nodes covering no more than the truncation
//! size become leaves, which trades memory for distance evaluations at the bottom of a search.
//!
//! Both trees answer range, k nearest neighbor and incremental priority searches. See the planner
//! for the query objects that abstract over them.

#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

pub mod errors;
pub use errors::{SimdexError, SimdexResult};

pub mod covertree;
pub mod planner;
pub mod query_interface;
pub mod query_tools;
pub mod rstar;
pub mod utils;

/// Nodes of both trees live in arenas and are addressed by their slot.
pub type NodeId = usize;
