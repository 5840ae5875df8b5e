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

use pointcloud::data_sources::DataRam;
use pointcloud::distances::{CountingDistance, Distance, L1, L2};
use pointcloud::PointCloud;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use simdex::covertree::*;
use simdex::query_tools::PrioritySearcher;
use std::sync::Arc;

fn random_cloud(count: usize, dim: usize, seed: u64) -> Arc<DataRam> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..count * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Arc::new(DataRam::new(data, dim).unwrap())
}

fn build(cloud: &Arc<DataRam>, distance: Arc<dyn Distance>, variant: CoverTreeVariant) -> CoverTree<DataRam> {
    let mut builder = CoverTreeBuilder::new();
    builder.set_variant(variant).set_truncate(4);
    builder.build(Arc::clone(cloud), distance).unwrap()
}

fn brute_knn(cloud: &DataRam, distance: &dyn Distance, query: &[f32], k: usize) -> Vec<(f32, usize)> {
    let mut all: Vec<(f32, usize)> = cloud
        .reference_indexes()
        .into_iter()
        .map(|i| (distance.dist(query, cloud.point(i).unwrap()), i))
        .collect();
    all.sort_by(|a, b| a.partial_cmp(b).unwrap());
    all.truncate(k);
    all
}

#[test]
fn every_descendant_is_covered() {
    for variant in &[CoverTreeVariant::Full, CoverTreeVariant::Simplified] {
        let cloud = random_cloud(1000, 5, 3);
        let tree = build(&cloud, Arc::new(L2), *variant);
        tree.check_covering().unwrap();
        let tree = build(&cloud, Arc::new(L1), *variant);
        tree.check_covering().unwrap();
        assert_eq!(tree.stats().entries, 1000);
    }
}

#[test]
fn nearest_pairs_on_a_line() {
    let cloud = Arc::new(DataRam::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 1).unwrap());
    for variant in &[CoverTreeVariant::Full, CoverTreeVariant::Simplified] {
        let mut builder = CoverTreeBuilder::new();
        builder.set_variant(*variant).set_truncate(1);
        let tree = builder.build(Arc::clone(&cloud), Arc::new(L2)).unwrap();
        for step in -4..=24 {
            let query = [step as f32 * 0.25];
            let found = tree.knn(&query, 2).unwrap();
            assert_eq!(found, brute_knn(&cloud, &L2, &query, 2), "query {}", query[0]);
        }
    }
}

#[test]
fn random_queries_match_brute_force() {
    let cloud = random_cloud(800, 3, 8);
    let queries = random_cloud(30, 3, 9);
    for variant in &[CoverTreeVariant::Full, CoverTreeVariant::Simplified] {
        let tree = build(&cloud, Arc::new(L2), *variant);
        for q in 0..queries.len() {
            let query = queries.point(q).unwrap();
            let found = tree.knn(query, 7).unwrap();
            let expected = brute_knn(&cloud, &L2, query, 7);
            for ((d1, i1), (d2, i2)) in found.iter().zip(expected.iter()) {
                assert_eq!(i1, i2);
                assert_approx_eq::assert_approx_eq!(*d1, *d2);
            }
            let in_range = tree.range(query, 0.3).unwrap();
            let expected = brute_knn(&cloud, &L2, query, 800)
                .into_iter()
                .filter(|(d, _)| *d <= 0.3)
                .count();
            assert_eq!(in_range.len(), expected);
        }
    }
}

#[test]
fn priority_search_can_stop_early() {
    let cloud = random_cloud(600, 4, 12);
    let tree = build(&cloud, Arc::new(L2), CoverTreeVariant::Full);
    let query = [0.1, 0.2, -0.3, 0.0];

    let mut searcher = tree.priority(&query).unwrap();
    let mut last = 0.0;
    while let Some(c) = searcher.next_candidate().unwrap() {
        assert!(c.lower_bound >= last);
        last = c.lower_bound;
    }

    let mut searcher = tree.priority(&query).unwrap();
    let found = searcher.collect_knn(10).unwrap();
    let expected = brute_knn(&cloud, &L2, &query, 10);
    let found: Vec<usize> = found.iter().map(|x| x.1).collect();
    let expected: Vec<usize> = expected.iter().map(|x| x.1).collect();
    assert_eq!(found, expected);
}

#[test]
fn stored_parent_distances_pay_off() {
    let cloud = random_cloud(2000, 6, 15);
    let queries = random_cloud(50, 6, 16);
    let mut counts = Vec::new();
    for variant in &[CoverTreeVariant::Full, CoverTreeVariant::Simplified] {
        let counting = Arc::new(CountingDistance::new(Arc::new(L2)));
        let tree = build(&cloud, counting.clone(), *variant);
        counting.reset();
        for q in 0..queries.len() {
            tree.knn(queries.point(q).unwrap(), 5).unwrap();
        }
        counts.push(counting.count());
    }
    assert!(counts[0] <= counts[1], "full {} simplified {}", counts[0], counts[1]);
}

#[test]
fn degenerate_inputs() {
    let empty = Arc::new(DataRam::new(Vec::new(), 2).unwrap());
    let tree = CoverTreeBuilder::new().build(empty, Arc::new(L2)).unwrap();
    assert!(tree.root().is_none());
    assert!(tree.knn(&[0.0, 0.0], 3).unwrap().is_empty());

    let same = Arc::new(DataRam::new(vec![1.0; 40], 2).unwrap());
    let tree = CoverTreeBuilder::new().build(same, Arc::new(L2)).unwrap();
    tree.check_covering().unwrap();
    assert_eq!(tree.range(&[1.0, 1.0], 0.0).unwrap().len(), 20);
    assert!(tree.knn(&[1.0], 1).is_err());
}
