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

//! The errors that can occur when a point cloud is loading or being read
use std::error::Error;
use std::fmt;
use std::io;

///
pub type PointCloudResult<T> = Result<T, PointCloudError>;

/// Error type for the Point cloud
#[derive(Debug)]
pub enum PointCloudError {
    /// Unable to retrieve some data point (given by index) in a data source (given by name)
    DataAccessError {
        /// Index of access error
        index: usize,
        /// Source that had the access error
        slice_name: String,
    },
    /// The data handed to a constructor or a distance does not have the expected dimension
    DimensionMismatch {
        /// The dimension that was expected
        expected: usize,
        /// The dimension that was found
        found: usize,
    },
    /// A distance that only works on point indexes was asked to compare raw vectors.
    /// Carries the kind of evaluation that was attempted.
    IndexOnlyDistance(&'static str),
    /// IO error when opening files
    IoError(io::Error),
    /// Parsing error when loading a CSV or yaml file
    ParsingError(ParsingError),
}

impl fmt::Display for PointCloudError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PointCloudError::IoError(e) => write!(f, "{}", e),
            PointCloudError::ParsingError(e) => write!(f, "{}", e),
            PointCloudError::DataAccessError { index, slice_name } => write!(
                f,
                "there was an issue grabbing point {} from {}",
                index, slice_name
            ),
            PointCloudError::DimensionMismatch { expected, found } => write!(
                f,
                "expected data of dimension {}, found {}",
                expected, found
            ),
            PointCloudError::IndexOnlyDistance(context) => write!(
                f,
                "an index based distance can not be used for a {}",
                context
            ),
        }
    }
}

#[allow(deprecated)]
impl Error for PointCloudError {
    fn description(&self) -> &str {
        match self {
            PointCloudError::IoError(e) => e.description(),
            PointCloudError::ParsingError(e) => e.description(),
            PointCloudError::DataAccessError { .. } => {
                "there was an issue grabbing a data point"
            }
            PointCloudError::DimensionMismatch { .. } => "the data has the wrong dimension",
            PointCloudError::IndexOnlyDistance(..) => {
                "the distance is only defined on point indexes"
            }
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        match self {
            PointCloudError::IoError(e) => Some(e),
            PointCloudError::ParsingError(e) => Some(e),
            PointCloudError::DataAccessError { .. } => None,
            PointCloudError::DimensionMismatch { .. } => None,
            PointCloudError::IndexOnlyDistance(..) => None,
        }
    }
}

impl From<io::Error> for PointCloudError {
    fn from(err: io::Error) -> Self {
        PointCloudError::IoError(err)
    }
}

impl From<ParsingError> for PointCloudError {
    fn from(err: ParsingError) -> Self {
        PointCloudError::ParsingError(err)
    }
}

impl From<PointCloudError> for io::Error {
    fn from(err: PointCloudError) -> Self {
        match err {
            PointCloudError::IoError(e) => e,
            e => io::Error::new(io::ErrorKind::Other, Box::new(e)),
        }
    }
}

impl PointCloudError {
    /// If we can't get an element from a loaded data source, gives the index and source name
    pub fn data_access(index: usize, slice_name: String) -> PointCloudError {
        PointCloudError::DataAccessError { index, slice_name }
    }

    /// The dimension of some data was wrong
    pub fn dimension_mismatch(expected: usize, found: usize) -> PointCloudError {
        PointCloudError::DimensionMismatch { expected, found }
    }
}

/// A parsing error occored while doing something with text
#[derive(Debug)]
pub enum ParsingError {
    /// Yaml was messed up
    MalformedYamlError {
        /// The file that was messed up
        file_name: String,
        /// The value that was messed up
        field: String,
    },
    /// A needed field was missing from the file.
    MissingYamlError {
        /// The file
        file_name: String,
        /// The missing field
        field: String,
    },
    /// An error reading the CSV
    CSVReadError {
        /// The file that the error occored in
        file_name: String,
        /// The line that was messed up
        line_number: usize,
        /// What went wrong
        key: String,
    },
    /// Something else happened parsing a string
    RegularParsingError(&'static str),
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Error for ParsingError {
    fn description(&self) -> &str {
        match self {
            ParsingError::MalformedYamlError { .. } => "there is a error reading a yaml entry",
            ParsingError::MissingYamlError { .. } => "not all message fields set",
            ParsingError::CSVReadError { .. } => "issue reading a CSV entry",
            ParsingError::RegularParsingError(..) => "Error parsing a string",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        None
    }
}
