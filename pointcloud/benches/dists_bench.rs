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

use pointcloud::data_sources::*;
use pointcloud::*;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_ram_random_test(count: usize, data_dim: usize) -> DataRam {
    DataRam::new(
        (0..count * data_dim)
            .map(|_i| rand::random::<f32>())
            .collect(),
        data_dim,
    )
    .unwrap()
}

fn distance_benchmarks(c: &mut Criterion) {
    let count = 100;
    let dim = 303;
    let pc = build_ram_random_test(count, dim);

    let indexes_small: [PointIndex; 9] = [1, 3, 5, 7, 9, 11, 13, 15, 17];
    let indexes_large: Vec<PointIndex> = (0..count).collect();
    let point = vec![0.0; dim];

    let distances: Vec<Box<dyn Distance>> = vec![Box::new(L2), Box::new(L1), Box::new(CosineDistance)];
    for distance in distances.iter() {
        c.bench_function(&format!("{}_distances_to_point_small", distance.name()), |b| {
            b.iter(|| {
                pc.distances_to_point(distance.as_ref(), black_box(&point), black_box(&indexes_small))
                    .unwrap()
            })
        });
        c.bench_function(&format!("{}_distances_to_point_large", distance.name()), |b| {
            b.iter(|| {
                pc.distances_to_point(distance.as_ref(), black_box(&point), black_box(&indexes_large))
                    .unwrap()
            })
        });
    }
}

criterion_group!(benches, distance_benchmarks);
criterion_main!(benches);
