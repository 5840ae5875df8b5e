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

//! Ram allocated data.

use crate::base_traits::*;
use crate::errors::{PointCloudError, PointCloudResult};
use crate::PointIndex;
use serde::{Deserialize, Serialize};

/// The data stored in ram, row major, one row per point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRam {
    name: String,
    data: Vec<f32>,
    dim: usize,
}

impl DataRam {
    /// Consumes your vector and dimension and gives a dimensioned cloud.
    pub fn new(data: Vec<f32>, dim: usize) -> PointCloudResult<DataRam> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(PointCloudError::dimension_mismatch(dim, data.len()));
        }
        Ok(DataRam {
            name: "RAM".to_string(),
            data,
            dim,
        })
    }

    /// Builds a cloud out of a list of rows. Every row must have the same length.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> PointCloudResult<DataRam> {
        let dim = rows.first().map(|r| r.as_ref().len()).unwrap_or(1);
        let mut data = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(PointCloudError::dimension_mismatch(dim, row.len()));
            }
            data.extend_from_slice(row);
        }
        DataRam::new(data, dim)
    }

    /// Renames this source, the name shows up in access errors.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> DataRam {
        self.name = name.into();
        self
    }

    /// Merges two ram sets together.
    pub fn merge(&mut self, other: DataRam) -> PointCloudResult<()> {
        if self.dim != other.dim {
            return Err(PointCloudError::dimension_mismatch(self.dim, other.dim));
        }
        self.data.extend(other.data);
        Ok(())
    }
}

impl PointCloud for DataRam {
    fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn reference_indexes(&self) -> Vec<PointIndex> {
        (0..self.len()).collect()
    }

    fn point(&self, pi: PointIndex) -> PointCloudResult<&[f32]> {
        self.data
            .get(pi * self.dim..(pi + 1) * self.dim)
            .ok_or_else(|| PointCloudError::data_access(pi, self.name.clone()))
    }

    fn is_contiguous(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distances::*;

    #[test]
    fn ram_access() {
        let cloud = DataRam::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.point(1).unwrap(), &[2.0, 3.0]);
        assert!(cloud.point(3).is_err());
        assert!(DataRam::new(vec![0.0; 5], 2).is_err());
    }

    #[test]
    fn distances_small_and_parallel() {
        let count = 1000;
        let cloud = DataRam::new((0..count).map(|i| i as f32).collect(), 1).unwrap();
        let indexes = cloud.reference_indexes();
        let dists = cloud.distances_to_point(&L1, &[0.0], &indexes).unwrap();
        for (i, d) in dists.iter().enumerate() {
            assert_approx_eq!(*d, i as f32);
        }
        let few = cloud.distances_to_point_index(&L2, 3, &[0, 1, 5]).unwrap();
        assert_eq!(few, vec![3.0, 2.0, 2.0]);
        assert!(cloud.distances_to_point(&L2, &[0.0, 0.0], &[0]).is_err());
    }

    #[test]
    fn index_distances_route_through_indexes() {
        let cloud = DataRam::new(vec![0.0, 1.0, 2.0], 1).unwrap();
        let d = RandomStableDistance::new(3);
        let expected = d.dist_by_index(0, 2).unwrap();
        assert_approx_eq!(cloud.distance(&d, 0, 2).unwrap(), expected);
        assert!(cloud.distances_to_point(&d, &[0.0], &[1]).is_err());
    }
}
