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

//! The shared shape of an incremental, interruptible nearest neighbor search.

use crate::errors::SimdexResult;
use pointcloud::PointIndex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One object handed out by a [`PrioritySearcher`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriorityCandidate {
    /// The object
    pub index: PointIndex,
    /// No closer than this
    pub lower_bound: f32,
    /// No farther than this
    pub upper_bound: f32,
}

/// A best first search that is driven one step at a time.
///
/// Candidates come out with non-decreasing lower bounds. Once a caller has `k` objects no farther
/// than `all_lower_bound` it has the exact `k` nearest neighbors and can stop.
pub trait PrioritySearcher {
    /// Advances the search. `Ok(None)` once nothing within the cutoff is left.
    fn next_candidate(&mut self) -> SimdexResult<Option<PriorityCandidate>>;
    /// Everything not yet returned is at least this far from the query.
    fn all_lower_bound(&self) -> f32;
    /// The current cutoff, objects beyond it are never returned.
    fn cutoff(&self) -> f32;
    /// Tightens the cutoff without restarting. Larger values are ignored.
    fn decrease_cutoff(&mut self, cutoff: f32);

    /// Drains the searcher into the `k` nearest candidates, tightening the cutoff along the way.
    fn collect_knn(&mut self, k: usize) -> SimdexResult<Vec<(f32, PointIndex)>> {
        let mut found: Vec<(f32, PointIndex)> = Vec::with_capacity(k + 1);
        if k == 0 {
            return Ok(found);
        }
        while let Some(c) = self.next_candidate()? {
            let pos = found
                .iter()
                .position(|(d, i)| (*d, *i) > (c.upper_bound, c.index))
                .unwrap_or(found.len());
            found.insert(pos, (c.upper_bound, c.index));
            found.truncate(k);
            if found.len() == k {
                self.decrease_cutoff(found[k - 1].0);
                if found[k - 1].0 <= self.all_lower_bound() {
                    break;
                }
            }
        }
        Ok(found)
    }
}

/// What a priority heap holds: a key, and an insertion counter so equal keys pop in order.
#[derive(Debug)]
pub(crate) struct Prioritized<T> {
    pub(crate) key: f32,
    seq: usize,
    pub(crate) item: T,
}

impl<T> PartialEq for Prioritized<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Prioritized<T> {}

impl<T> Ord for Prioritized<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Backwards to make it a min heap.
        other
            .key
            .partial_cmp(&self.key)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Prioritized<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap whose keys never go below the last popped key.
#[derive(Debug)]
pub(crate) struct MonotoneHeap<T> {
    heap: BinaryHeap<Prioritized<T>>,
    seq: usize,
    last_key: f32,
}

impl<T> MonotoneHeap<T> {
    pub(crate) fn new() -> MonotoneHeap<T> {
        MonotoneHeap {
            heap: BinaryHeap::new(),
            seq: 0,
            last_key: 0.0,
        }
    }

    /// Pushes with the key raised to the last popped one.
    pub(crate) fn push(&mut self, key: f32, item: T) {
        self.seq += 1;
        self.heap.push(Prioritized {
            key: key.max(self.last_key),
            seq: self.seq,
            item,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<(f32, T)> {
        let next = self.heap.pop()?;
        self.last_key = next.key;
        Some((next.key, next.item))
    }

    pub(crate) fn peek_key(&self) -> Option<f32> {
        self.heap.peek().map(|p| p.key)
    }

    pub(crate) fn last_key(&self) -> f32 {
        self.last_key
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_never_decrease() {
        let mut heap = MonotoneHeap::new();
        heap.push(2.0, 'a');
        heap.push(1.0, 'b');
        assert_eq!(heap.pop(), Some((1.0, 'b')));
        heap.push(0.5, 'c');
        assert_eq!(heap.peek_key(), Some(1.0));
        assert_eq!(heap.pop(), Some((1.0, 'c')));
        assert_eq!(heap.pop(), Some((2.0, 'a')));
        assert_eq!(heap.last_key(), 2.0);
        assert_eq!(heap.pop(), None);
    }

    struct Sorted {
        items: Vec<(f32, PointIndex)>,
        pos: usize,
        cutoff: f32,
    }

    impl PrioritySearcher for Sorted {
        fn next_candidate(&mut self) -> SimdexResult<Option<PriorityCandidate>> {
            let next = self.items.get(self.pos).filter(|(d, _)| *d <= self.cutoff);
            self.pos += 1;
            Ok(next.map(|(d, i)| PriorityCandidate {
                index: *i,
                lower_bound: *d,
                upper_bound: *d,
            }))
        }
        fn all_lower_bound(&self) -> f32 {
            self.items.get(self.pos).map(|x| x.0).unwrap_or(f32::INFINITY)
        }
        fn cutoff(&self) -> f32 {
            self.cutoff
        }
        fn decrease_cutoff(&mut self, cutoff: f32) {
            self.cutoff = self.cutoff.min(cutoff);
        }
    }

    #[test]
    fn collecting_stops_at_the_cutoff() {
        let mut searcher = Sorted {
            items: vec![(0.1, 4), (0.2, 2), (0.3, 9), (0.7, 1)],
            pos: 0,
            cutoff: f32::INFINITY,
        };
        let knn = searcher.collect_knn(2).unwrap();
        assert_eq!(knn, vec![(0.1, 4), (0.2, 2)]);
        assert_approx_eq!(searcher.cutoff(), 0.2);
    }
}
