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

//! Where the nodes live.
//!
//! The tree only ever talks to a [`NodeStorage`]: it allocates ids, writes whole nodes, reads them
//! back and deletes them. A page file can sit behind the trait as easily as the in-memory arena
//! used by default, since nodes are serde serializable.

use super::node::Node;
use crate::errors::{SimdexError, SimdexResult};
use crate::NodeId;
use std::borrow::Cow;
use std::fmt::Debug;

/// Node store used by the R*-tree.
pub trait NodeStorage: Debug + Send + Sync {
    /// Reserves a fresh id. Nothing is stored under it until it is written.
    fn allocate(&mut self) -> NodeId;
    /// Stores a node under an allocated id, replacing what was there.
    fn write(&mut self, id: NodeId, node: Node) -> SimdexResult<()>;
    /// Reads a node back. In memory stores can lend it out, page stores hand out a decoded copy.
    fn read(&self, id: NodeId) -> SimdexResult<Cow<'_, Node>>;
    /// Frees the id. It may be handed out again by `allocate`.
    fn delete(&mut self, id: NodeId) -> SimdexResult<()>;
    /// Number of nodes currently stored
    fn len(&self) -> usize;
    /// If nothing is stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An arena of nodes with a free list.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    live: usize,
}

impl MemoryStorage {
    ///
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }
}

impl NodeStorage for MemoryStorage {
    fn allocate(&mut self) -> NodeId {
        match self.free.pop() {
            Some(id) => id,
            None => {
                self.nodes.push(None);
                self.nodes.len() - 1
            }
        }
    }

    fn write(&mut self, id: NodeId, node: Node) -> SimdexResult<()> {
        let slot = self
            .nodes
            .get_mut(id)
            .ok_or(SimdexError::NodeNotFound(id))?;
        if slot.is_none() {
            self.live += 1;
        }
        *slot = Some(node);
        Ok(())
    }

    fn read(&self, id: NodeId) -> SimdexResult<Cow<'_, Node>> {
        self.nodes
            .get(id)
            .and_then(|n| n.as_ref())
            .map(Cow::Borrowed)
            .ok_or(SimdexError::NodeNotFound(id))
    }

    fn delete(&mut self, id: NodeId) -> SimdexResult<()> {
        match self.nodes.get_mut(id).and_then(|n| n.take()) {
            Some(_) => {
                self.live -= 1;
                self.free.push(id);
                Ok(())
            }
            None => Err(SimdexError::NodeNotFound(id)),
        }
    }

    fn len(&self) -> usize {
        self.live
    }
}
