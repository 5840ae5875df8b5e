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
use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads a headerless CSV of floats into ram. Files ending in `gz` are decompressed on the fly.
///
/// Every record must have exactly `dim` fields.
pub fn ram_from_csv<P: AsRef<Path>>(path: P, dim: usize) -> PointCloudResult<DataRam> {
    let file = File::open(&path)?;
    let is_gz = path
        .as_ref()
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);
    let data = if is_gz {
        read_csv(path.as_ref(), dim, GzDecoder::new(file))?
    } else {
        read_csv(path.as_ref(), dim, file)?
    };
    Ok(DataRam::new(data, dim)?.with_name(path.as_ref().to_string_lossy()))
}

fn read_csv<R: Read>(path: &Path, dim: usize, reader: R) -> PointCloudResult<Vec<f32>> {
    let mut rdr = ReaderBuilder::new().has_headers(false).from_reader(reader);
    let mut data = Vec::new();
    let mut record = StringRecord::new();
    let mut line_number = 0;
    loop {
        let more = rdr.read_record(&mut record).map_err(|e| {
            PointCloudError::ParsingError(ParsingError::CSVReadError {
                file_name: path.to_string_lossy().to_string(),
                line_number,
                key: e.to_string(),
            })
        })?;
        if !more {
            break;
        }
        line_number += 1;
        if record.len() != dim {
            return Err(PointCloudError::dimension_mismatch(dim, record.len()));
        }
        for field in record.iter() {
            let val = field.trim().parse::<f32>().map_err(|_| {
                PointCloudError::ParsingError(ParsingError::CSVReadError {
                    file_name: path.to_string_lossy().to_string(),
                    line_number,
                    key: format!("Unable to read f32 from {:?}", field),
                })
            })?;
            data.push(val);
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PointCloud;
    use std::io::Write;
    use tempdir::TempDir;

    #[test]
    fn reads_plain_csv() {
        let dir = TempDir::new("pointcloud_csv").unwrap();
        let path = dir.path().join("data.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "0.0,1.0\n2.0, 3.5\n-1,4").unwrap();
        drop(file);
        let cloud = ram_from_csv(&path, 2).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.point(1).unwrap(), &[2.0, 3.5]);
        assert!(ram_from_csv(&path, 3).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let dir = TempDir::new("pointcloud_csv").unwrap();
        let path = dir.path().join("bad.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "0.0,one").unwrap();
        drop(file);
        match ram_from_csv(&path, 2) {
            Err(PointCloudError::ParsingError(ParsingError::CSVReadError { line_number, .. })) => {
                assert_eq!(line_number, 1)
            }
            other => panic!("expected a parsing error, got {:?}", other),
        }
    }
}
