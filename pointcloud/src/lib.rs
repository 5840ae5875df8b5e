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

//! # Point Cloud
//! The accessor layer under simdex. It abstracts read access to a set of vectors addressed by
//! point index, and carries the distance and similarity functions the indexes are built with.
//!
//! ```
//! use pointcloud::*;
//! use pointcloud::data_sources::DataRam;
//!
//! let cloud = DataRam::new(vec![0.0, 0.0, 3.0, 4.0], 2).unwrap();
//! assert_eq!(cloud.distance(&L2, 0, 1).unwrap(), 5.0);
//! ```

#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

pub mod distances;
pub use distances::*;
pub mod errors;

pub mod data_sources;
pub mod loaders;

mod base_traits;
#[doc(inline)]
pub use base_traits::*;

/// To make things more obvious, we type the point index.
pub type PointIndex = usize;
