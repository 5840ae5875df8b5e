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

//! The working lists of the bulk construction: objects together with their distance to the
//! routing object they are currently assigned to.

use crate::errors::SimdexResult;
use pointcloud::distances::Distance;
use pointcloud::{PointCloud, PointIndex};

#[derive(Debug, Clone, Default)]
pub(crate) struct CandidateList {
    indexes: Vec<PointIndex>,
    dists: Vec<f32>,
}

impl CandidateList {
    pub(crate) fn new() -> CandidateList {
        CandidateList::default()
    }

    /// The distances from `center` to every index in `indexes`.
    pub(crate) fn from_center<D: PointCloud + ?Sized>(
        point_cloud: &D,
        distance: &dyn Distance,
        center: PointIndex,
        indexes: Vec<PointIndex>,
    ) -> SimdexResult<CandidateList> {
        let dists = point_cloud.distances_to_point_index(distance, center, &indexes)?;
        Ok(CandidateList { indexes, dists })
    }

    pub(crate) fn push(&mut self, index: PointIndex, dist: f32) {
        self.indexes.push(index);
        self.dists.push(dist);
    }

    pub(crate) fn len(&self) -> usize {
        self.indexes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (PointIndex, f32)> + '_ {
        self.indexes.iter().copied().zip(self.dists.iter().copied())
    }

    /// The largest distance, 0 for an empty list.
    pub(crate) fn max_distance(&self) -> f32 {
        self.dists.iter().fold(0.0, |a, b| a.max(*b))
    }

    /// Moves every candidate farther than `radius` into a new list.
    pub(crate) fn exclude_not_covered(&mut self, radius: f32) -> CandidateList {
        let mut far = CandidateList::new();
        let mut i = 0;
        while i < self.len() {
            if self.dists[i] > radius {
                far.push(self.indexes.swap_remove(i), self.dists.swap_remove(i));
            } else {
                i += 1;
            }
        }
        far
    }

    /// Takes the first candidate out together with every remaining candidate within `radius` of
    /// it. The first element of the result is the taken candidate and its old distance, the list
    /// holds the collected ones with their distance to it.
    pub(crate) fn collect_by_cover<D: PointCloud + ?Sized>(
        &mut self,
        point_cloud: &D,
        distance: &dyn Distance,
        radius: f32,
    ) -> SimdexResult<Option<(PointIndex, f32, CandidateList)>> {
        if self.is_empty() {
            return Ok(None);
        }
        let center = self.indexes.swap_remove(0);
        let center_dist = self.dists.swap_remove(0);
        let to_center = point_cloud.distances_to_point_index(distance, center, &self.indexes)?;

        let mut collected = CandidateList::new();
        let mut kept = CandidateList {
            indexes: Vec::with_capacity(self.len()),
            dists: Vec::with_capacity(self.len()),
        };
        for ((index, old_dist), new_dist) in self.iter().zip(to_center) {
            if new_dist <= radius {
                collected.push(index, new_dist);
            } else {
                kept.push(index, old_dist);
            }
        }
        *self = kept;
        Ok(Some((center, center_dist, collected)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointcloud::data_sources::DataRam;
    use pointcloud::distances::L1;

    fn line() -> DataRam {
        DataRam::new((0..8).map(|i| i as f32).collect(), 1).unwrap()
    }

    #[test]
    fn covering_splits_the_list() {
        let cloud = line();
        let mut list = CandidateList::from_center(&cloud, &L1, 0, (1..8).collect()).unwrap();
        assert_approx_eq!(list.max_distance(), 7.0);
        let far = list.exclude_not_covered(3.0);
        let mut near: Vec<PointIndex> = list.iter().map(|(i, _)| i).collect();
        near.sort_unstable();
        assert_eq!(near, vec![1, 2, 3]);
        assert_eq!(far.len(), 4);
        assert!(far.iter().all(|(i, d)| d > 3.0 && i as f32 == d));
    }

    #[test]
    fn collecting_takes_the_first_and_its_neighbors() {
        let cloud = line();
        let mut list = CandidateList::from_center(&cloud, &L1, 0, vec![4, 5, 6, 7]).unwrap();
        let (center, center_dist, collected) =
            list.collect_by_cover(&cloud, &L1, 1.0).unwrap().unwrap();
        assert_eq!(center, 4);
        assert_approx_eq!(center_dist, 4.0);
        let collected: Vec<(PointIndex, f32)> = collected.iter().collect();
        assert_eq!(collected, vec![(5, 1.0)]);
        let mut rest: Vec<(PointIndex, f32)> = list.iter().collect();
        rest.sort_by_key(|x| x.0);
        assert_eq!(rest, vec![(6, 6.0), (7, 7.0)]);

        let mut empty = CandidateList::new();
        assert!(empty.collect_by_cover(&cloud, &L1, 1.0).unwrap().is_none());
    }
}
