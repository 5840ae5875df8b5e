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

use super::index::QueryIndex;
use pointcloud::PointCloud;
use std::sync::{Arc, RwLock, Weak};

/// A point cloud together with the indexes attached to it.
///
/// The relation does not own its indexes. Whoever built an index keeps it alive, the relation only
/// remembers where to find it while it exists.
#[derive(Debug)]
pub struct Relation {
    point_cloud: Arc<dyn PointCloud>,
    indexes: RwLock<Vec<Weak<dyn QueryIndex>>>,
}

impl Relation {
    ///
    pub fn new(point_cloud: Arc<dyn PointCloud>) -> Relation {
        Relation {
            point_cloud,
            indexes: RwLock::new(Vec::new()),
        }
    }

    ///
    pub fn point_cloud(&self) -> &Arc<dyn PointCloud> {
        &self.point_cloud
    }

    ///
    pub fn len(&self) -> usize {
        self.point_cloud.len()
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.point_cloud.is_empty()
    }

    ///
    pub fn dim(&self) -> usize {
        self.point_cloud.dim()
    }

    /// Attaches an index. Attaching the same index twice only moves it to the front.
    pub fn attach(&self, index: &Arc<dyn QueryIndex>) {
        let mut indexes = self.indexes.write().unwrap_or_else(|e| e.into_inner());
        indexes.retain(|w| match w.upgrade() {
            Some(live) => !same_index(&live, index),
            None => false,
        });
        indexes.push(Arc::downgrade(index));
    }

    /// Detaches an index, returns false if it was not attached.
    pub fn detach(&self, index: &Arc<dyn QueryIndex>) -> bool {
        let mut indexes = self.indexes.write().unwrap_or_else(|e| e.into_inner());
        let before = indexes.len();
        indexes.retain(|w| match w.upgrade() {
            Some(live) => !same_index(&live, index),
            None => true,
        });
        before != indexes.len()
    }

    /// The live attached indexes, most recently attached first.
    pub fn indexes(&self) -> Vec<Arc<dyn QueryIndex>> {
        let indexes = self.indexes.read().unwrap_or_else(|e| e.into_inner());
        indexes.iter().rev().filter_map(|w| w.upgrade()).collect()
    }
}

fn same_index(a: &Arc<dyn QueryIndex>, b: &Arc<dyn QueryIndex>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

pub(crate) fn same_cloud(a: &Arc<dyn PointCloud>, b: &Arc<dyn PointCloud>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
