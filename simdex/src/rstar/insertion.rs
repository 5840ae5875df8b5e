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
use super::node::Entry;
use super::settings::InsertionStrategy;
use std::cmp::Ordering;

/// Candidates looked at by the overlap criterion, the ones with least volume enlargement.
const OVERLAP_CANDIDATES: usize = 32;

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

impl InsertionStrategy {
    /// Picks the slot of `entries` an object with box `obj` descends into.
    /// `children_are_leaves` is true on the level right above the leaves.
    pub(crate) fn choose<S: Spatial + ?Sized>(
        &self,
        entries: &[Entry],
        obj: &S,
        children_are_leaves: bool,
    ) -> usize {
        match self {
            InsertionStrategy::LeastEnlargement => least_enlargement(entries, obj),
            InsertionStrategy::LeastOverlap => least_overlap(entries, obj),
            InsertionStrategy::Combined => {
                if children_are_leaves {
                    least_overlap(entries, obj)
                } else {
                    least_enlargement(entries, obj)
                }
            }
        }
    }
}

/// Among the entries that already cover `obj`, the one of smallest volume.
pub(crate) fn smallest_containing<S: Spatial + ?Sized>(entries: &[Entry], obj: &S) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| contains(*e, obj))
        .map(|(i, e)| (i, volume(e)))
        .min_by(|a, b| cmp_f64(a.1, b.1))
        .map(|(i, _)| i)
}

fn least_enlargement<S: Spatial + ?Sized>(entries: &[Entry], obj: &S) -> usize {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| (i, enlargement(e, obj), volume(e)))
        .min_by(|a, b| cmp_f64(a.1, b.1).then_with(|| cmp_f64(a.2, b.2)))
        .map(|(i, _, _)| i)
        .unwrap_or(0)
}

fn least_overlap<S: Spatial + ?Sized>(entries: &[Entry], obj: &S) -> usize {
    let mut candidates: Vec<(usize, f64, f64)> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (i, enlargement(e, obj), volume(e)))
        .collect();
    candidates.sort_by(|a, b| cmp_f64(a.1, b.1).then_with(|| cmp_f64(a.2, b.2)));
    candidates.truncate(OVERLAP_CANDIDATES);

    let mut best = 0;
    let mut best_key = (f64::INFINITY, f64::INFINITY, f64::INFINITY);
    for (i, enl, vol) in candidates {
        let mut grown = BoundingBox::from_spatial(&entries[i]);
        grown.extend(obj);
        let overlap_enlargement: f64 = entries
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, other)| overlap(&grown, other) - overlap(&entries[i], other))
            .sum();
        let key = (overlap_enlargement, enl, vol);
        if key < best_key {
            best_key = key;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(child: usize, min: [f32; 2], max: [f32; 2]) -> Entry {
        Entry::Directory {
            child,
            bbox: BoundingBox::new(min.to_vec(), max.to_vec()),
        }
    }

    #[test]
    fn containment_prefers_small_boxes() {
        let entries = vec![
            dir(0, [0.0, 0.0], [10.0, 10.0]),
            dir(1, [0.0, 0.0], [2.0, 2.0]),
            dir(2, [5.0, 5.0], [6.0, 6.0]),
        ];
        let p: &[f32] = &[1.0, 1.0];
        assert_eq!(smallest_containing(&entries, p), Some(1));
        let q: &[f32] = &[20.0, 1.0];
        assert_eq!(smallest_containing(&entries, q), None);
    }

    #[test]
    fn enlargement_picks_the_nearest_box() {
        let entries = vec![dir(0, [0.0, 0.0], [1.0, 1.0]), dir(1, [5.0, 5.0], [6.0, 6.0])];
        let p: &[f32] = &[6.5, 6.0];
        assert_eq!(InsertionStrategy::LeastEnlargement.choose(&entries, p, false), 1);
        assert_eq!(InsertionStrategy::LeastOverlap.choose(&entries, p, true), 1);
    }

    #[test]
    fn overlap_avoids_growing_into_siblings() {
        // Growing entry 0 to the right would cut into entry 1, growing entry 2 down does not.
        let entries = vec![
            dir(0, [0.0, 0.0], [1.0, 1.0]),
            dir(1, [1.5, 0.0], [3.0, 1.0]),
            dir(2, [0.0, 2.0], [3.0, 3.0]),
        ];
        let p: &[f32] = &[2.0, 1.8];
        assert_eq!(InsertionStrategy::LeastOverlap.choose(&entries, p, true), 2);
    }
}
