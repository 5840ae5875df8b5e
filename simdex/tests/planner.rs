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
use pointcloud::distances::*;
use pointcloud::{PointCloud, PointIndex};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use simdex::planner::*;
use std::sync::{Arc, Mutex};

fn relation() -> Relation {
    let mut rng = SmallRng::seed_from_u64(42);
    let data: Vec<f32> = (0..120 * 3).map(|_| rng.gen_range(0.0..1.0)).collect();
    let cloud: Arc<dyn PointCloud> = Arc::new(DataRam::new(data, 3).unwrap());
    Relation::new(cloud)
}

fn sorted(mut v: Vec<(f32, PointIndex)>) -> Vec<(f32, PointIndex)> {
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    v
}

fn brute_distances(relation: &Relation, distance: &dyn Distance, q: PointIndex) -> Vec<(f32, PointIndex)> {
    let cloud = relation.point_cloud();
    sorted(
        cloud
            .reference_indexes()
            .into_iter()
            .map(|o| (cloud.distance(distance, q, o).unwrap(), o))
            .collect(),
    )
}

fn brute_rknn(relation: &Relation, distance: &dyn Distance, q: PointIndex, k: usize) -> Vec<(f32, PointIndex)> {
    let cloud = relation.point_cloud();
    let mut found = Vec::new();
    for o in cloud.reference_indexes() {
        let k_dist = brute_distances(relation, distance, o)[k - 1].0;
        let d = cloud.distance(distance, q, o).unwrap();
        if d <= k_dist {
            found.push((d, o));
        }
    }
    sorted(found)
}

#[test]
fn linear_queries_match_brute_force_for_any_distance() {
    let relation = relation();
    let planner = Planner::default();
    let distances: Vec<Arc<dyn Distance>> = vec![
        Arc::new(L2),
        Arc::new(L1),
        Arc::new(CosineDistance),
        Arc::new(RandomStableDistance::new(17)),
    ];
    for distance in distances {
        let request = planner.distance(&relation, Arc::clone(&distance)).linear_only();
        let dq = request.distance_query().unwrap().unwrap();
        let knn = request.knn(5).unwrap().unwrap();
        let range = request.range(0.5).unwrap().unwrap();
        let rknn = request.rknn(3).unwrap().unwrap();
        let priority = request.priority(f32::INFINITY).unwrap().unwrap();

        for q in &[0, 17, 119] {
            let all = brute_distances(&relation, distance.as_ref(), *q);
            assert_eq!(
                dq.dist(QueryPoint::Index(*q), QueryPoint::Index(3)).unwrap(),
                relation.point_cloud().distance(distance.as_ref(), *q, 3).unwrap()
            );
            assert_eq!(knn.knn(QueryPoint::Index(*q), 5).unwrap(), all[..5].to_vec(), "{}", distance.name());

            let radius = (all[10].0 + all[11].0) / 2.0;
            let expected: Vec<(f32, PointIndex)> = all.iter().cloned().filter(|(d, _)| *d <= radius).collect();
            assert_eq!(range.range(QueryPoint::Index(*q), radius).unwrap(), expected);

            assert_eq!(
                rknn.rknn(QueryPoint::Index(*q), 3).unwrap(),
                brute_rknn(&relation, distance.as_ref(), *q, 3)
            );

            let mut searcher = priority.search(QueryPoint::Index(*q)).unwrap();
            let mut visited = Vec::new();
            while let Some(c) = searcher.next_candidate().unwrap() {
                visited.push((c.upper_bound, c.index));
            }
            assert_eq!(visited, all);
        }
    }
    assert!(relation.indexes().is_empty());
}

#[test]
fn linear_similarity_queries() {
    let relation = relation();
    let planner = Planner::default();
    let kernel: Arc<dyn Similarity> = Arc::new(LinearKernel);
    let request = planner.similarity(&relation, Arc::clone(&kernel)).linear_only();
    let sq = request.similarity_query().unwrap().unwrap();
    let searcher = request.similarity_range(0.0).unwrap().unwrap();

    let cloud = relation.point_cloud();
    let q = cloud.point(5).unwrap();
    let threshold = 0.8;
    let found = searcher.similarity_range(QueryPoint::Vector(q), threshold).unwrap();
    for pair in found.windows(2) {
        assert!(pair[0].0 >= pair[1].0);
    }
    let expected = cloud
        .reference_indexes()
        .into_iter()
        .filter(|o| kernel.similarity(q, cloud.point(*o).unwrap()) >= threshold)
        .count();
    assert_eq!(found.len(), expected);
    assert_eq!(
        sq.similarity(QueryPoint::Index(5), QueryPoint::Index(6)).unwrap(),
        kernel.similarity(q, cloud.point(6).unwrap())
    );
}

/// Declines every request and writes down the flags it saw.
#[derive(Debug, Default)]
struct FlagSpy {
    seen: Mutex<Vec<(&'static str, QueryFlags)>>,
}

impl QueryOptimizer for FlagSpy {
    fn name(&self) -> &str {
        "flag spy"
    }

    fn distance_query(
        &self,
        _relation: &Relation,
        _distance: &Arc<dyn Distance>,
        flags: QueryFlags,
    ) -> Option<Arc<dyn DistanceQuery>> {
        self.seen.lock().unwrap().push(("distance", flags));
        None
    }

    fn knn_searcher(
        &self,
        _relation: &Relation,
        _dq: &Arc<dyn DistanceQuery>,
        _max_k: usize,
        flags: QueryFlags,
    ) -> Option<Arc<dyn KnnSearcher>> {
        self.seen.lock().unwrap().push(("knn", flags));
        None
    }

    fn rknn_searcher(
        &self,
        _relation: &Relation,
        _dq: &Arc<dyn DistanceQuery>,
        _max_k: usize,
        flags: QueryFlags,
    ) -> Option<Arc<dyn RknnSearcher>> {
        self.seen.lock().unwrap().push(("rknn", flags));
        None
    }
}

#[test]
fn derived_distance_queries_drop_the_precompute_hint() {
    let spy = Arc::new(FlagSpy::default());
    let planner = Planner::new(spy.clone());
    let relation = relation();
    let request = planner.distance(&relation, Arc::new(L1)).precompute();
    assert!(request.knn(4).unwrap().is_some());
    assert!(request.rknn(4).unwrap().is_some());

    let seen = spy.seen.lock().unwrap().clone();
    for (kind, flags) in &seen {
        match *kind {
            "distance" => assert!(!flags.contains(QueryFlags::PRECOMPUTE)),
            _ => assert!(flags.contains(QueryFlags::PRECOMPUTE)),
        }
    }
    assert!(seen.iter().any(|(kind, _)| *kind == "distance"));
    assert!(seen.iter().any(|(kind, _)| *kind == "rknn"));
}

#[test]
fn built_indexes_are_reused_until_dropped() {
    let relation = relation();
    let planner = Planner::default();
    let distance: Arc<dyn Distance> = Arc::new(L2);

    let knn = planner.distance(&relation, Arc::clone(&distance)).knn(10).unwrap().unwrap();
    assert_eq!(relation.indexes().len(), 1);
    let first = knn.knn(QueryPoint::Index(7), 10).unwrap();
    assert_eq!(first, brute_distances(&relation, distance.as_ref(), 7)[..10].to_vec());

    let reused = planner
        .distance(&relation, Arc::clone(&distance))
        .optimized_only()
        .knn(10)
        .unwrap()
        .unwrap();
    assert_eq!(reused.knn(QueryPoint::Index(7), 10).unwrap(), first);

    drop(knn);
    drop(reused);
    assert!(planner
        .distance(&relation, distance)
        .cheap_only()
        .optimized_only()
        .knn(10)
        .unwrap()
        .is_none());
}
