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

use crate::data_sources::DataRam;
use crate::errors::*;
use crate::loaders::ram_from_csv;
use glob::{glob_with, MatchOptions};
use std::fs;
use std::path::{Path, PathBuf};
use yaml_rust::YamlLoader;

/// Given a yaml file on disk, it builds a point cloud. Minimal example below.
/// ```yaml
/// ---
/// data_path: DATA_CSV_GLOB
/// data_dim: 784
/// ```
/// Relative paths are resolved against the directory of the yaml file. Every matching file is
/// loaded and the results are concatenated in path order.
pub fn ram_from_yaml<P: AsRef<Path>>(path: P) -> PointCloudResult<DataRam> {
    let file_name = path.as_ref().to_string_lossy().to_string();
    let config = fs::read_to_string(&path)?;
    let docs = YamlLoader::load_from_str(&config).map_err(|_| {
        PointCloudError::ParsingError(ParsingError::MalformedYamlError {
            file_name: file_name.clone(),
            field: "document".to_string(),
        })
    })?;
    let params = docs.get(0).ok_or_else(|| {
        PointCloudError::ParsingError(ParsingError::MissingYamlError {
            file_name: file_name.clone(),
            field: "document".to_string(),
        })
    })?;

    let data_glob = params["data_path"].as_str().ok_or_else(|| {
        PointCloudError::ParsingError(ParsingError::MissingYamlError {
            file_name: file_name.clone(),
            field: "data_path".to_string(),
        })
    })?;
    let data_dim = params["data_dim"].as_i64().ok_or_else(|| {
        PointCloudError::ParsingError(ParsingError::MissingYamlError {
            file_name: file_name.clone(),
            field: "data_dim".to_string(),
        })
    })? as usize;

    let mut paths = get_file_list(data_glob, path.as_ref())?.into_iter();
    let first = paths.next().ok_or_else(|| {
        PointCloudError::ParsingError(ParsingError::MalformedYamlError {
            file_name: file_name.clone(),
            field: "data_path".to_string(),
        })
    })?;
    let mut data = ram_from_csv(first, data_dim)?;
    for p in paths {
        data.merge(ram_from_csv(p, data_dim)?)?;
    }
    Ok(data)
}

fn get_file_list(files_reg: &str, yaml_path: &Path) -> PointCloudResult<Vec<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };
    let files_reg_path = Path::new(files_reg);
    let full_path = if files_reg_path.is_absolute() {
        files_reg_path.to_path_buf()
    } else {
        yaml_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(files_reg_path)
    };
    let glob_paths = glob_with(&full_path.to_string_lossy(), options)
        .map_err(|_| ParsingError::RegularParsingError("Pattern reading error"))?;
    let mut paths = Vec::new();
    for entry in glob_paths {
        match entry {
            Ok(p) => paths.push(p),
            Err(e) => log::warn!("Skipping unreadable path: {:?}", e),
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PointCloud;
    use std::fs::File;
    use std::io::Write;
    use tempdir::TempDir;

    #[test]
    fn loads_glob_of_csvs() {
        let dir = TempDir::new("pointcloud_yaml").unwrap();
        for (i, rows) in ["0,0\n1,1\n", "5,5\n"].iter().enumerate() {
            let mut file = File::create(dir.path().join(format!("part_{}.csv", i))).unwrap();
            write!(file, "{}", rows).unwrap();
        }
        let yaml_path = dir.path().join("data.yml");
        let mut file = File::create(&yaml_path).unwrap();
        writeln!(file, "---\ndata_path: part_*.csv\ndata_dim: 2").unwrap();
        drop(file);

        let cloud = ram_from_yaml(&yaml_path).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.point(2).unwrap(), &[5.0, 5.0]);
    }

    #[test]
    fn missing_field() {
        let dir = TempDir::new("pointcloud_yaml").unwrap();
        let yaml_path = dir.path().join("data.yml");
        let mut file = File::create(&yaml_path).unwrap();
        writeln!(file, "---\ndata_dim: 2").unwrap();
        drop(file);
        assert!(ram_from_yaml(&yaml_path).is_err());
    }
}
