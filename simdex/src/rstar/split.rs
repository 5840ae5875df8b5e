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
use super::settings::SplitStrategy;
use std::cmp::Ordering;

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

impl SplitStrategy {
    /// Splits an overflowing list of entries into two groups with at least `minimum` entries each.
    /// The first group stays in the old node, the second moves to a new one.
    pub(crate) fn split(&self, entries: Vec<Entry>, minimum: usize) -> (Vec<Entry>, Vec<Entry>) {
        let minimum = minimum.max(1).min(entries.len() / 2);
        let assignment = match self {
            SplitStrategy::Topological => topological_split(&entries, minimum),
            SplitStrategy::Quadratic => quadratic_split(&entries, minimum),
            SplitStrategy::Linear => linear_split(&entries, minimum),
        };
        let mut first = Vec::with_capacity(entries.len());
        let mut second = Vec::with_capacity(entries.len());
        for (entry, goes_second) in entries.into_iter().zip(assignment) {
            if goes_second {
                second.push(entry);
            } else {
                first.push(entry);
            }
        }
        (first, second)
    }
}

/// Sorted order of the entries along axis `d`, by lower or by upper coordinate.
fn sorted_order(entries: &[Entry], d: usize, by_upper: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    if by_upper {
        order.sort_by(|a, b| {
            cmp_f32(entries[*a].max_coord(d), entries[*b].max_coord(d))
                .then_with(|| cmp_f32(entries[*a].min_coord(d), entries[*b].min_coord(d)))
        });
    } else {
        order.sort_by(|a, b| {
            cmp_f32(entries[*a].min_coord(d), entries[*b].min_coord(d))
                .then_with(|| cmp_f32(entries[*a].max_coord(d), entries[*b].max_coord(d)))
        });
    }
    order
}

/// `prefix[k]` covers the first `k + 1` entries of the order, `suffix[k]` covers entry `k` onwards.
fn running_boxes(entries: &[Entry], order: &[usize]) -> (Vec<BoundingBox>, Vec<BoundingBox>) {
    let n = order.len();
    let mut prefix = Vec::with_capacity(n);
    let mut acc = BoundingBox::from_spatial(&entries[order[0]]);
    prefix.push(acc.clone());
    for i in &order[1..] {
        acc.extend(&entries[*i]);
        prefix.push(acc.clone());
    }
    let mut suffix = vec![acc; n];
    let mut acc = BoundingBox::from_spatial(&entries[order[n - 1]]);
    suffix[n - 1] = acc.clone();
    for k in (0..n - 1).rev() {
        acc.extend(&entries[order[k]]);
        suffix[k] = acc.clone();
    }
    (prefix, suffix)
}

fn assignment_from_order(n: usize, order: &[usize], split_at: usize) -> Vec<bool> {
    let mut goes_second = vec![false; n];
    for i in &order[split_at..] {
        goes_second[*i] = true;
    }
    goes_second
}

/// R* split. The axis is chosen by the least sum of margins over all legal distributions, then the
/// distribution on that axis with least overlap wins, ties going to the least total volume.
fn topological_split(entries: &[Entry], minimum: usize) -> Vec<bool> {
    let n = entries.len();
    let dim = entries[0].dim();

    let mut best_axis = 0;
    let mut best_margin = f64::INFINITY;
    for d in 0..dim {
        let mut margin_sum = 0.0;
        for by_upper in [false, true].iter() {
            let order = sorted_order(entries, d, *by_upper);
            let (prefix, suffix) = running_boxes(entries, &order);
            for k in minimum..=(n - minimum) {
                margin_sum += margin(&prefix[k - 1]) + margin(&suffix[k]);
            }
        }
        if margin_sum < best_margin {
            best_margin = margin_sum;
            best_axis = d;
        }
    }

    let mut best: Option<(f64, f64, Vec<usize>, usize)> = None;
    for by_upper in [false, true].iter() {
        let order = sorted_order(entries, best_axis, *by_upper);
        let (prefix, suffix) = running_boxes(entries, &order);
        for k in minimum..=(n - minimum) {
            let ov = overlap(&prefix[k - 1], &suffix[k]);
            let vol = volume(&prefix[k - 1]) + volume(&suffix[k]);
            let better = match &best {
                None => true,
                Some((best_ov, best_vol, _, _)) => {
                    cmp_f64(ov, *best_ov).then_with(|| cmp_f64(vol, *best_vol)) == Ordering::Less
                }
            };
            if better {
                best = Some((ov, vol, order.clone(), k));
            }
        }
    }
    match best {
        Some((_, _, order, k)) => assignment_from_order(n, &order, k),
        None => assignment_from_order(n, &(0..n).collect::<Vec<_>>(), n / 2),
    }
}

/// Distributes what is left after the seeds were placed. `pick` chooses the next entry among the
/// unassigned ones given the two current group boxes.
fn distribute<F>(entries: &[Entry], minimum: usize, seeds: (usize, usize), mut pick: F) -> Vec<bool>
where
    F: FnMut(&[usize], &BoundingBox, &BoundingBox) -> usize,
{
    let n = entries.len();
    let mut goes_second = vec![false; n];
    goes_second[seeds.1] = true;
    let mut box_a = BoundingBox::from_spatial(&entries[seeds.0]);
    let mut box_b = BoundingBox::from_spatial(&entries[seeds.1]);
    let mut count_a = 1;
    let mut count_b = 1;
    let mut remaining: Vec<usize> = (0..n).filter(|i| *i != seeds.0 && *i != seeds.1).collect();

    while !remaining.is_empty() {
        if count_a + remaining.len() <= minimum {
            break;
        }
        if count_b + remaining.len() <= minimum {
            for i in remaining.drain(..) {
                goes_second[i] = true;
            }
            break;
        }
        let pos = pick(&remaining, &box_a, &box_b);
        let i = remaining.swap_remove(pos);
        let enl_a = enlargement(&box_a, &entries[i]);
        let enl_b = enlargement(&box_b, &entries[i]);
        let to_b = cmp_f64(enl_b, enl_a)
            .then_with(|| cmp_f64(volume(&box_b), volume(&box_a)))
            .then_with(|| count_b.cmp(&count_a))
            == Ordering::Less;
        if to_b {
            goes_second[i] = true;
            box_b.extend(&entries[i]);
            count_b += 1;
        } else {
            box_a.extend(&entries[i]);
            count_a += 1;
        }
    }
    // Anything left over fills up the first group.
    goes_second
}

/// Guttman's quadratic split: the seeds waste the most volume when put together, then the entry
/// with the strongest preference for one group goes next.
fn quadratic_split(entries: &[Entry], minimum: usize) -> Vec<bool> {
    let n = entries.len();
    let mut seeds = (0, 1);
    let mut worst = f64::NEG_INFINITY;
    for i in 0..n {
        for j in (i + 1)..n {
            let waste = union_volume(&entries[i], &entries[j]) - volume(&entries[i]) - volume(&entries[j]);
            if waste > worst {
                worst = waste;
                seeds = (i, j);
            }
        }
    }
    distribute(entries, minimum, seeds, |remaining, box_a, box_b| {
        let mut best = 0;
        let mut best_pref = f64::NEG_INFINITY;
        for (pos, i) in remaining.iter().enumerate() {
            let pref = (enlargement(box_a, &entries[*i]) - enlargement(box_b, &entries[*i])).abs();
            if pref > best_pref {
                best_pref = pref;
                best = pos;
            }
        }
        best
    })
}

/// Guttman's linear split: the seeds are the pair with the greatest normalized separation along
/// any axis, the rest follow in input order.
fn linear_split(entries: &[Entry], minimum: usize) -> Vec<bool> {
    let n = entries.len();
    let dim = entries[0].dim();
    let mut seeds = (0, n - 1);
    let mut best_sep = f32::NEG_INFINITY;
    for d in 0..dim {
        let mut highest_low = 0;
        let mut lowest_high = 0;
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for i in 0..n {
            if entries[i].min_coord(d) > entries[highest_low].min_coord(d) {
                highest_low = i;
            }
            if entries[i].max_coord(d) < entries[lowest_high].max_coord(d) {
                lowest_high = i;
            }
            lo = lo.min(entries[i].min_coord(d));
            hi = hi.max(entries[i].max_coord(d));
        }
        if highest_low == lowest_high {
            continue;
        }
        let width = hi - lo;
        let sep = entries[highest_low].min_coord(d) - entries[lowest_high].max_coord(d);
        let sep = if width > 0.0 { sep / width } else { sep };
        if sep > best_sep {
            best_sep = sep;
            seeds = (lowest_high, highest_low);
        }
    }
    distribute(entries, minimum, seeds, |_, _, _| 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: usize, x: f32, y: f32) -> Entry {
        Entry::Leaf {
            id,
            point: vec![x, y],
        }
    }

    fn two_clusters() -> Vec<Entry> {
        vec![
            leaf(0, 0.0, 0.0),
            leaf(1, 10.0, 10.0),
            leaf(2, 0.5, 0.2),
            leaf(3, 10.2, 9.5),
            leaf(4, 0.1, 0.9),
            leaf(5, 9.7, 10.1),
        ]
    }

    fn ids(entries: &[Entry]) -> Vec<usize> {
        let mut ids: Vec<usize> = entries.iter().filter_map(|e| e.id()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn every_strategy_separates_clusters() {
        for strategy in [
            SplitStrategy::Topological,
            SplitStrategy::Quadratic,
            SplitStrategy::Linear,
        ]
        .iter()
        {
            let (a, b) = strategy.split(two_clusters(), 2);
            let mut groups = vec![ids(&a), ids(&b)];
            groups.sort();
            assert_eq!(groups, vec![vec![0, 2, 4], vec![1, 3, 5]], "{:?}", strategy);
        }
    }

    #[test]
    fn minimum_fill_is_respected() {
        // One far outlier would end up alone without the minimum.
        let mut entries: Vec<Entry> = (0..9).map(|i| leaf(i, i as f32 * 0.01, 0.0)).collect();
        entries.push(leaf(9, 100.0, 100.0));
        for strategy in [
            SplitStrategy::Topological,
            SplitStrategy::Quadratic,
            SplitStrategy::Linear,
        ]
        .iter()
        {
            let (a, b) = strategy.split(entries.clone(), 4);
            assert!(a.len() >= 4 && b.len() >= 4, "{:?}: {} {}", strategy, a.len(), b.len());
            assert_eq!(a.len() + b.len(), 10);
        }
    }
}
