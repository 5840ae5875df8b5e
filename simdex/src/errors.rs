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

//! The errors that can occor when an index is configured, built or queried.
//! Many errors are floated up from `PointCloud` as that's the i/o layer.

use pointcloud::errors::PointCloudError;
use std::error::Error;
use std::fmt;
use std::io;

/// Helper type for a call that could go wrong.
pub type SimdexResult<T> = Result<T, SimdexError>;

/// Error type for simdex. Mostly this is a wrapper around `PointCloudError` and configuration mistakes.
#[derive(Debug)]
pub enum SimdexError {
    /// Unable to retrieve some data point (given by index) from the point cloud
    PointCloudError(PointCloudError),
    /// IO error when opening files
    IoError(io::Error),
    /// Parsing error when loading a yaml file
    ParsingError(ParsingError),
    /// A node capacity came out too small for the page size and dimension
    CapacityTooSmall {
        /// Which kind of node
        node_kind: &'static str,
        /// The computed capacity
        capacity: usize,
    },
    /// A parameter is outside of the range it is defined on
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        message: String,
    },
    /// The object does not have the dimension the index was built for
    DimensionMismatch {
        /// The index's dimension
        expected: usize,
        /// The object's dimension
        found: usize,
    },
    /// Bulk loading is only possible into an empty, never used tree
    BulkLoadAfterInsert,
    /// The node storage has nothing under this id
    NodeNotFound(usize),
    /// A query was requested without a distance or similarity function
    MissingFunction,
    /// The index can't be used with this distance function
    UnsupportedDistance(String),
    /// The optimizer name from the environment is not known
    UnknownOptimizer(String),
    /// An integrity check found a broken invariant
    IntegrityError(String),
}

impl fmt::Display for SimdexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimdexError::IoError(e) => write!(f, "{}", e),
            SimdexError::ParsingError(e) => write!(f, "{}", e),
            SimdexError::PointCloudError(e) => write!(f, "{}", e),
            SimdexError::CapacityTooSmall {
                node_kind,
                capacity,
            } => write!(
                f,
                "{} capacity {} is too small, the page size does not fit the dimension",
                node_kind, capacity
            ),
            SimdexError::InvalidParameter { name, message } => {
                write!(f, "invalid value for {}: {}", name, message)
            }
            SimdexError::DimensionMismatch { expected, found } => write!(
                f,
                "the index holds objects of dimension {}, got {}",
                expected, found
            ),
            SimdexError::BulkLoadAfterInsert => {
                write!(f, "bulk loading is only possible into an empty tree")
            }
            SimdexError::NodeNotFound(id) => write!(f, "there is no node with id {}", id),
            SimdexError::MissingFunction => {
                write!(f, "no distance or similarity function was given")
            }
            SimdexError::UnsupportedDistance(name) => {
                write!(f, "the distance {} is not supported by this index", name)
            }
            SimdexError::UnknownOptimizer(name) => write!(f, "unknown optimizer {:?}", name),
            SimdexError::IntegrityError(message) => write!(f, "broken index: {}", message),
        }
    }
}

#[allow(deprecated)]
impl Error for SimdexError {
    fn description(&self) -> &str {
        match self {
            SimdexError::IoError(e) => e.description(),
            SimdexError::ParsingError(e) => e.description(),
            SimdexError::PointCloudError(e) => e.description(),
            SimdexError::CapacityTooSmall { .. } => "a node capacity is too small",
            SimdexError::InvalidParameter { .. } => "a parameter is out of range",
            SimdexError::DimensionMismatch { .. } => "the object has the wrong dimension",
            SimdexError::BulkLoadAfterInsert => "bulk loading is only possible into an empty tree",
            SimdexError::NodeNotFound(..) => "there is no node under this id",
            SimdexError::MissingFunction => "no distance or similarity function was given",
            SimdexError::UnsupportedDistance(..) => "the distance is not supported by this index",
            SimdexError::UnknownOptimizer(..) => "unknown optimizer",
            SimdexError::IntegrityError(..) => "an index invariant is broken",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        match self {
            SimdexError::IoError(e) => Some(e),
            SimdexError::ParsingError(e) => Some(e),
            SimdexError::PointCloudError(e) => Some(e),
            _ => None,
        }
    }
}

impl SimdexError {
    pub(crate) fn invalid_parameter<S: Into<String>>(name: &'static str, message: S) -> SimdexError {
        SimdexError::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

impl From<PointCloudError> for SimdexError {
    fn from(err: PointCloudError) -> Self {
        SimdexError::PointCloudError(err)
    }
}

impl From<io::Error> for SimdexError {
    fn from(err: io::Error) -> Self {
        SimdexError::IoError(err)
    }
}

impl From<ParsingError> for SimdexError {
    fn from(err: ParsingError) -> Self {
        SimdexError::ParsingError(err)
    }
}

impl From<SimdexError> for io::Error {
    fn from(err: SimdexError) -> Self {
        match err {
            SimdexError::IoError(e) => e,
            e => io::Error::new(io::ErrorKind::Other, Box::new(e)),
        }
    }
}

/// A parsing error occored while reading a configuration file
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
    /// Something else happened parsing a string
    RegularParsingError(&'static str),
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParsingError::MalformedYamlError { file_name, field } => write!(
                f,
                "there is a error reading the yaml entry {} in {}",
                field, file_name
            ),
            ParsingError::MissingYamlError { file_name, field } => {
                write!(f, "the field {} is missing from {}", field, file_name)
            }
            ParsingError::RegularParsingError(..) => write!(f, "Error parsing a string"),
        }
    }
}

#[allow(deprecated)]
impl Error for ParsingError {
    fn description(&self) -> &str {
        match self {
            ParsingError::MalformedYamlError { .. } => "there is a error reading a yaml entry",
            ParsingError::MissingYamlError { .. } => "not all message fields set",
            ParsingError::RegularParsingError(..) => "Error parsing a string",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        None
    }
}
