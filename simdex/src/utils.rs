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

//! Utility functions for i/o

use crate::covertree::{CoverTree, CoverTreeBuilder};
use crate::errors::*;
use crate::rstar::{RStarSettings, RStarTree};
use pointcloud::data_sources::DataRam;
use pointcloud::distances::*;
use pointcloud::loaders::ram_from_yaml;
use pointcloud::{PointCloud, PointIndex};
use std::fs::read_to_string;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use yaml_rust::{Yaml, YamlLoader};

/// Reads the first document of a yaml file. Also hands back the file name for error messages.
pub(crate) fn read_yaml<P: AsRef<Path>>(path: P) -> SimdexResult<(Yaml, String)> {
    let file_name = path.as_ref().to_string_lossy().to_string();
    let config = read_to_string(&path)?;
    let mut docs = YamlLoader::load_from_str(&config).map_err(|_| ParsingError::MalformedYamlError {
        file_name: file_name.clone(),
        field: "document".to_string(),
    })?;
    if docs.is_empty() {
        return Err(ParsingError::MissingYamlError {
            file_name,
            field: "document".to_string(),
        }
        .into());
    }
    Ok((docs.swap_remove(0), file_name))
}

/// Parses a string entry. Missing keys give `None`, unknown values are an error.
pub(crate) fn yaml_enum<T: FromStr<Err = ParsingError>>(
    params: &Yaml,
    key: &str,
    file_name: &str,
) -> SimdexResult<Option<T>> {
    match &params[key] {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::String(s) => s.parse().map(Some).map_err(|_| {
            ParsingError::MalformedYamlError {
                file_name: file_name.to_string(),
                field: key.to_string(),
            }
            .into()
        }),
        _ => Err(ParsingError::MalformedYamlError {
            file_name: file_name.to_string(),
            field: key.to_string(),
        }
        .into()),
    }
}

/// Looks up one of the vector distances by the name it reports.
pub fn distance_by_name(name: &str) -> Option<Arc<dyn Distance>> {
    match name {
        L2::NAME => Some(Arc::new(L2)),
        "squared_euclidean" => Some(Arc::new(SquaredL2)),
        "manhattan" => Some(Arc::new(L1)),
        "maximum" => Some(Arc::new(LInf)),
        "cosine" => Some(Arc::new(CosineDistance)),
        _ => None,
    }
}

fn yaml_distance(params: &Yaml, file_name: &str) -> SimdexResult<Arc<dyn Distance>> {
    match params["distance"].as_str() {
        None => Ok(Arc::new(L2)),
        Some(name) => distance_by_name(name).ok_or_else(|| {
            ParsingError::MalformedYamlError {
                file_name: file_name.to_string(),
                field: "distance".to_string(),
            }
            .into()
        }),
    }
}

/// Given a yaml file on disk, it loads the data and builds a cover tree on it.
///
/// ```yaml
/// ---
/// data_path: DATA_CSV_GLOB
/// data_dim: 784
/// distance: euclidean
/// expansion: 1.3
/// truncate: 10
/// variant: simplified
/// ```
pub fn cover_tree_from_yaml<P: AsRef<Path>>(path: P) -> SimdexResult<CoverTree<DataRam>> {
    let (params, file_name) = read_yaml(&path)?;
    let distance = yaml_distance(&params, &file_name)?;
    let point_cloud = ram_from_yaml(&path)?;
    check_count(&params, &file_name, &point_cloud)?;
    let builder = CoverTreeBuilder::from_yaml(&path)?;
    builder.build(Arc::new(point_cloud), distance)
}

/// Given a yaml file on disk, it loads the data and bulk loads an R*-tree with it. The tree's
/// settings come from the same file, see [`RStarSettings::from_yaml`].
pub fn rstar_tree_from_yaml<P: AsRef<Path>>(path: P) -> SimdexResult<RStarTree> {
    let (params, file_name) = read_yaml(&path)?;
    let point_cloud = ram_from_yaml(&path)?;
    check_count(&params, &file_name, &point_cloud)?;
    let mut tree = RStarTree::new(RStarSettings::from_yaml(&path)?)?;
    let objects = point_cloud
        .reference_indexes()
        .into_iter()
        .map(|i| -> SimdexResult<(PointIndex, Vec<f32>)> { Ok((i, point_cloud.point(i)?.to_vec())) })
        .collect::<SimdexResult<Vec<_>>>()?;
    tree.bulk_load(objects)?;
    Ok(tree)
}

fn check_count(params: &Yaml, file_name: &str, point_cloud: &DataRam) -> SimdexResult<()> {
    if let Some(count) = params["count"].as_i64() {
        if count as usize != point_cloud.len() {
            return Err(ParsingError::MalformedYamlError {
                file_name: file_name.to_string(),
                field: "count".to_string(),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covertree::CoverTreeVariant;
    use std::fs::File;
    use std::io::Write;
    use tempdir::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn enums_are_parsed_or_rejected() {
        let dir = TempDir::new("yaml_enum").unwrap();
        let path = write(&dir, "params.yml", "---\nvariant: simplified\nother: nope\nnumber: 3\n");
        let (params, file_name) = read_yaml(&path).unwrap();
        let variant: Option<CoverTreeVariant> = yaml_enum(&params, "variant", &file_name).unwrap();
        assert_eq!(variant, Some(CoverTreeVariant::Simplified));
        let missing: Option<CoverTreeVariant> = yaml_enum(&params, "missing", &file_name).unwrap();
        assert_eq!(missing, None);
        assert!(yaml_enum::<CoverTreeVariant>(&params, "other", &file_name).is_err());
        assert!(yaml_enum::<CoverTreeVariant>(&params, "number", &file_name).is_err());
    }

    #[test]
    fn trees_from_yaml() {
        let dir = TempDir::new("trees_from_yaml").unwrap();
        let rows: String = (0..40).map(|i| format!("{},{}\n", i, i % 7)).collect();
        write(&dir, "data.csv", &rows);
        let path = write(
            &dir,
            "tree.yml",
            "---\ndata_path: data.csv\ndata_dim: 2\ncount: 40\ndistance: manhattan\ntruncate: 3\nsplit_strategy: quadratic\n",
        );

        let cover_tree = cover_tree_from_yaml(&path).unwrap();
        assert_eq!(cover_tree.distance().name(), "manhattan");
        assert_eq!(cover_tree.stats().entries, 40);
        let rstar = rstar_tree_from_yaml(&path).unwrap();
        assert_eq!(rstar.len(), 40);
        rstar.check_integrity().unwrap();

        let bad = write(&dir, "bad.yml", "---\ndata_path: data.csv\ndata_dim: 2\ncount: 41\n");
        assert!(cover_tree_from_yaml(&bad).is_err());
        assert!(distance_by_name("hamming").is_none());
    }
}
