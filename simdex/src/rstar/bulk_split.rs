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
use super::settings::BulkSplitStrategy;
use std::cmp::Ordering;

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Sizes of `pages` groups that together hold `n` entries, as even as possible.
fn even_sizes(n: usize, pages: usize) -> Vec<usize> {
    let base = n / pages;
    let extra = n % pages;
    (0..pages).map(|i| if i < extra { base + 1 } else { base }).collect()
}

/// Cuts a sorted list into consecutive groups of the given sizes.
fn cut(entries: Vec<Entry>, sizes: &[usize]) -> Vec<Vec<Entry>> {
    let mut groups = Vec::with_capacity(sizes.len());
    let mut iter = entries.into_iter();
    for size in sizes {
        groups.push(iter.by_ref().take(*size).collect());
    }
    groups
}

fn sort_by_center(entries: &mut [Entry], d: usize) {
    entries.sort_by(|a, b| cmp_f32(center_coord(a, d), center_coord(b, d)));
}

impl BulkSplitStrategy {
    /// Partitions entries into groups that each fit one node. Every group has between `minimum`
    /// and `capacity` entries, unless there are fewer than `minimum` entries in total.
    pub(crate) fn partition(
        &self,
        entries: Vec<Entry>,
        minimum: usize,
        capacity: usize,
    ) -> Vec<Vec<Entry>> {
        let n = entries.len();
        if n == 0 {
            return Vec::new();
        }
        let pages = ((n + capacity - 1) / capacity).max(1);
        let sizes = even_sizes(n, pages);
        debug_assert!(pages == 1 || sizes.iter().all(|s| *s >= minimum && *s <= capacity));
        if pages == 1 {
            return vec![entries];
        }
        match self {
            BulkSplitStrategy::SortTileRecursive => {
                let dim = entries[0].dim();
                sort_tile_recursive(entries, &sizes, 0, dim)
            }
            BulkSplitStrategy::ZCurve => z_curve(entries, &sizes),
            BulkSplitStrategy::MaxExtension => max_extension(entries, &sizes),
            BulkSplitStrategy::OneDimSort => {
                let mut entries = entries;
                sort_by_center(&mut entries, 0);
                cut(entries, &sizes)
            }
        }
    }
}

/// Slabs along axis `d`, each slab tiled recursively along the remaining axes. The last axis
/// is cut directly into pages.
fn sort_tile_recursive(
    mut entries: Vec<Entry>,
    sizes: &[usize],
    d: usize,
    dim: usize,
) -> Vec<Vec<Entry>> {
    sort_by_center(&mut entries, d);
    let pages = sizes.len();
    let remaining_axes = dim.saturating_sub(d).max(1);
    if remaining_axes == 1 || pages == 1 {
        return cut(entries, sizes);
    }
    let slabs = ((pages as f64).powf(1.0 / remaining_axes as f64).ceil() as usize).clamp(1, pages);
    let pages_per_slab = even_sizes(pages, slabs);

    let mut groups = Vec::with_capacity(pages);
    let mut iter = entries.into_iter();
    let mut page = 0;
    for slab_pages in pages_per_slab {
        let slab_sizes = &sizes[page..page + slab_pages];
        let slab_len: usize = slab_sizes.iter().sum();
        let slab: Vec<Entry> = iter.by_ref().take(slab_len).collect();
        groups.extend(sort_tile_recursive(slab, slab_sizes, d + 1, dim));
        page += slab_pages;
    }
    groups
}

/// Interleaves the quantized center coordinates into a Morton key.
fn morton_key(center: &[f32], lo: &[f32], hi: &[f32], bits: u32) -> u64 {
    let max_cell = ((1u64 << bits) - 1) as f32;
    let cells: Vec<u64> = center
        .iter()
        .zip(lo.iter().zip(hi))
        .map(|(c, (l, h))| {
            let width = h - l;
            if width > 0.0 {
                (((c - l) / width) * max_cell).round().clamp(0.0, max_cell) as u64
            } else {
                0
            }
        })
        .collect();
    let mut key = 0u64;
    for bit in (0..bits).rev() {
        for cell in &cells {
            key = (key << 1) | ((cell >> bit) & 1);
        }
    }
    key
}

fn z_curve(entries: Vec<Entry>, sizes: &[usize]) -> Vec<Vec<Entry>> {
    let dim = entries[0].dim();
    let centers: Vec<Vec<f32>> = entries
        .iter()
        .map(|e| (0..dim).map(|d| center_coord(e, d)).collect())
        .collect();
    let mut lo = vec![f32::INFINITY; dim];
    let mut hi = vec![f32::NEG_INFINITY; dim];
    for c in &centers {
        for d in 0..dim {
            lo[d] = lo[d].min(c[d]);
            hi[d] = hi[d].max(c[d]);
        }
    }
    let bits = ((64 / dim) as u32).clamp(1, 32);
    let mut keyed: Vec<(u64, Entry)> = centers
        .iter()
        .map(|c| morton_key(c, &lo, &hi, bits))
        .zip(entries)
        .collect();
    keyed.sort_by_key(|(k, _)| *k);
    cut(keyed.into_iter().map(|(_, e)| e).collect(), sizes)
}

/// Recursively splits the page list in half, cutting the entries along the axis where their
/// centers spread the furthest.
fn max_extension(mut entries: Vec<Entry>, sizes: &[usize]) -> Vec<Vec<Entry>> {
    if sizes.len() == 1 {
        return vec![entries];
    }
    let dim = entries[0].dim();
    let mut axis = 0;
    let mut widest = f32::NEG_INFINITY;
    for d in 0..dim {
        let (lo, hi) = entries.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), e| {
            let c = center_coord(e, d);
            (lo.min(c), hi.max(c))
        });
        if hi - lo > widest {
            widest = hi - lo;
            axis = d;
        }
    }
    let half = sizes.len() / 2;
    let left_len: usize = sizes[..half].iter().sum();
    entries.select_nth_unstable_by(left_len, |a, b| {
        cmp_f32(center_coord(a, axis), center_coord(b, axis))
    });
    let right = entries.split_off(left_len);
    let mut groups = max_extension(entries, &sizes[..half]);
    groups.extend(max_extension(right, &sizes[half..]));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(side: usize) -> Vec<Entry> {
        let mut entries = Vec::new();
        for x in 0..side {
            for y in 0..side {
                entries.push(Entry::Leaf {
                    id: x * side + y,
                    point: vec![x as f32, y as f32],
                });
            }
        }
        entries
    }

    #[test]
    fn groups_fit_the_node_sizes() {
        for strategy in [
            BulkSplitStrategy::SortTileRecursive,
            BulkSplitStrategy::ZCurve,
            BulkSplitStrategy::MaxExtension,
            BulkSplitStrategy::OneDimSort,
        ]
        .iter()
        {
            let groups = strategy.partition(grid(13), 4, 10);
            assert_eq!(groups.len(), 17, "{:?}", strategy);
            let mut ids: Vec<usize> = groups.iter().flatten().filter_map(|e| e.id()).collect();
            ids.sort_unstable();
            assert_eq!(ids, (0..169).collect::<Vec<_>>());
            for g in &groups {
                assert!(g.len() >= 4 && g.len() <= 10, "{:?}: {}", strategy, g.len());
            }
        }
    }

    #[test]
    fn tiles_are_compact() {
        // 16 pages of 4 on an 8x8 grid should be 2x2 tiles.
        let groups = BulkSplitStrategy::SortTileRecursive.partition(grid(8), 2, 4);
        assert_eq!(groups.len(), 16);
        for g in &groups {
            let bbox = BoundingBox::union_all(g.iter()).unwrap();
            assert_approx_eq!(volume(&bbox), 1.0);
        }
    }

    #[test]
    fn small_inputs_stay_together() {
        let groups = BulkSplitStrategy::ZCurve.partition(grid(2), 3, 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 4);
        assert!(BulkSplitStrategy::OneDimSort.partition(Vec::new(), 3, 10).is_empty());
    }

    #[test]
    fn morton_keys_follow_the_z() {
        let lo = [0.0, 0.0];
        let hi = [1.0, 1.0];
        let keys: Vec<u64> = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]
            .iter()
            .map(|c| morton_key(c, &lo, &hi, 1))
            .collect();
        assert_eq!(keys, vec![0, 1, 2, 3]);
    }
}
