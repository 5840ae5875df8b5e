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

//! The fixed configuration of an R*-tree.

use crate::errors::*;
use crate::utils::{read_yaml, yaml_enum};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Bytes of bookkeeping at the start of every page
pub const NODE_HEADER_BYTES: usize = 16;
/// Bytes used to store an object id or a child node id
pub const ENTRY_ID_BYTES: usize = 8;
/// Bytes per stored coordinate
pub const COORD_BYTES: usize = 4;

/// How to pick the subtree an entry descends into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertionStrategy {
    /// Least volume enlargement, ties go to the smallest volume.
    LeastEnlargement,
    /// Least enlargement of the overlap with the siblings, ties go to least volume enlargement.
    LeastOverlap,
    /// `LeastOverlap` when the children are leaves, `LeastEnlargement` higher up.
    Combined,
}

/// How to split an overflowing node in two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitStrategy {
    /// The R* split: choose the axis of least total margin, then the distribution of least overlap.
    Topological,
    /// Guttman's quadratic split
    Quadratic,
    /// Guttman's linear split
    Linear,
}

/// Which of the entries picked for a forced reinsertion go back in first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReinsertOrder {
    /// Farthest from the node center first
    FarthestFirst,
    /// Closest of the removed entries first
    ClosestFirst,
}

/// What happens to a node that overflows.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum OverflowTreatment {
    /// Always split
    SplitOnly,
    /// The first overflow on each level of an insertion reinserts the `amount` share of the entries
    /// farthest from the node's center. Later overflows on that level split.
    LimitedReinsert {
        /// Share of the node's entries to reinsert
        amount: f32,
        /// Order of the reinsertions
        order: ReinsertOrder,
    },
}

/// How bulk loading cuts the objects into pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkSplitStrategy {
    /// Sort-tile-recursive: slabs along the first axis, tiles along the next, and so on.
    SortTileRecursive,
    /// Sort along a Z-order space filling curve and cut into pages.
    ZCurve,
    /// Recursively halve along the axis of largest extension.
    MaxExtension,
    /// Sort along the first axis and cut into pages.
    OneDimSort,
}

impl FromStr for InsertionStrategy {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "least_enlargement" => Ok(InsertionStrategy::LeastEnlargement),
            "least_overlap" => Ok(InsertionStrategy::LeastOverlap),
            "combined" => Ok(InsertionStrategy::Combined),
            _ => Err(ParsingError::RegularParsingError("unknown insertion strategy")),
        }
    }
}

impl FromStr for SplitStrategy {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topological" => Ok(SplitStrategy::Topological),
            "quadratic" => Ok(SplitStrategy::Quadratic),
            "linear" => Ok(SplitStrategy::Linear),
            _ => Err(ParsingError::RegularParsingError("unknown split strategy")),
        }
    }
}

impl FromStr for ReinsertOrder {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "far" => Ok(ReinsertOrder::FarthestFirst),
            "close" => Ok(ReinsertOrder::ClosestFirst),
            _ => Err(ParsingError::RegularParsingError("unknown reinsert order")),
        }
    }
}

impl FromStr for BulkSplitStrategy {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sort_tile_recursive" | "str" => Ok(BulkSplitStrategy::SortTileRecursive),
            "z_curve" => Ok(BulkSplitStrategy::ZCurve),
            "max_extension" => Ok(BulkSplitStrategy::MaxExtension),
            "one_dim_sort" => Ok(BulkSplitStrategy::OneDimSort),
            _ => Err(ParsingError::RegularParsingError("unknown bulk split strategy")),
        }
    }
}

/// Node sizes of a tree, fixed once the dimension is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capacities {
    /// Maximum entries of a leaf
    pub leaf_capacity: usize,
    /// Minimum entries of a non root leaf
    pub leaf_minimum: usize,
    /// Maximum entries of a directory node
    pub dir_capacity: usize,
    /// Minimum entries of a non root directory node
    pub dir_minimum: usize,
}

impl Capacities {
    pub(crate) fn capacity(&self, leaf: bool) -> usize {
        if leaf {
            self.leaf_capacity
        } else {
            self.dir_capacity
        }
    }

    pub(crate) fn minimum(&self, leaf: bool) -> usize {
        if leaf {
            self.leaf_minimum
        } else {
            self.dir_minimum
        }
    }
}

/// The strategies and sizes of a tree. Owned by the tree and never changed once it holds data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RStarSettings {
    pub(crate) insertion: InsertionStrategy,
    pub(crate) split: SplitStrategy,
    pub(crate) overflow: OverflowTreatment,
    pub(crate) bulk_split: BulkSplitStrategy,
    pub(crate) relative_min_fill: f32,
    pub(crate) page_size: usize,
    pub(crate) leaf_capacity: Option<usize>,
    pub(crate) directory_capacity: Option<usize>,
}

impl Default for RStarSettings {
    fn default() -> RStarSettings {
        RStarSettings {
            insertion: InsertionStrategy::Combined,
            split: SplitStrategy::Topological,
            overflow: OverflowTreatment::LimitedReinsert {
                amount: 0.3,
                order: ReinsertOrder::FarthestFirst,
            },
            bulk_split: BulkSplitStrategy::SortTileRecursive,
            relative_min_fill: 0.4,
            page_size: 4096,
            leaf_capacity: None,
            directory_capacity: None,
        }
    }
}

impl RStarSettings {
    /// Creates a settings object with the R* defaults
    pub fn new() -> RStarSettings {
        RStarSettings::default()
    }

    /// Reads the settings from a yaml file. Every key is optional.
    /// ```yaml
    /// ---
    /// insertion_strategy: combined
    /// split_strategy: topological
    /// overflow_treatment: reinsert
    /// reinsert_amount: 0.3
    /// reinsert_order: far
    /// bulk_split: sort_tile_recursive
    /// relative_min_fill: 0.4
    /// page_size: 4096
    /// leaf_capacity: 50
    /// directory_capacity: 50
    /// ```
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> SimdexResult<RStarSettings> {
        let (params, file_name) = read_yaml(&path)?;
        let mut settings = RStarSettings::default();
        if let Some(s) = yaml_enum(&params, "insertion_strategy", &file_name)? {
            settings.insertion = s;
        }
        if let Some(s) = yaml_enum(&params, "split_strategy", &file_name)? {
            settings.split = s;
        }
        if let Some(s) = yaml_enum(&params, "bulk_split", &file_name)? {
            settings.bulk_split = s;
        }
        let amount = params["reinsert_amount"].as_f64().unwrap_or(0.3) as f32;
        let order = yaml_enum(&params, "reinsert_order", &file_name)?
            .unwrap_or(ReinsertOrder::FarthestFirst);
        settings.overflow = match params["overflow_treatment"].as_str() {
            None | Some("reinsert") => OverflowTreatment::LimitedReinsert { amount, order },
            Some("split") => OverflowTreatment::SplitOnly,
            Some(_) => {
                return Err(ParsingError::MalformedYamlError {
                    file_name,
                    field: "overflow_treatment".to_string(),
                }
                .into())
            }
        };
        if let Some(fill) = params["relative_min_fill"].as_f64() {
            settings.relative_min_fill = fill as f32;
        }
        if let Some(page_size) = params["page_size"].as_i64() {
            settings.page_size = page_size.max(0) as usize;
        }
        settings.leaf_capacity = params["leaf_capacity"].as_i64().map(|c| c.max(0) as usize);
        settings.directory_capacity = params["directory_capacity"]
            .as_i64()
            .map(|c| c.max(0) as usize);
        settings.validate()?;
        Ok(settings)
    }

    /// Set the insertion strategy
    pub fn set_insertion(&mut self, x: InsertionStrategy) -> &mut Self {
        self.insertion = x;
        self
    }

    /// Set the split strategy
    pub fn set_split(&mut self, x: SplitStrategy) -> &mut Self {
        self.split = x;
        self
    }

    /// Set the overflow treatment
    pub fn set_overflow(&mut self, x: OverflowTreatment) -> &mut Self {
        self.overflow = x;
        self
    }

    /// Set the bulk split strategy
    pub fn set_bulk_split(&mut self, x: BulkSplitStrategy) -> &mut Self {
        self.bulk_split = x;
        self
    }

    /// Set the share of a node's capacity that has to be in use, except for the root
    pub fn set_relative_min_fill(&mut self, x: f32) -> &mut Self {
        self.relative_min_fill = x;
        self
    }

    /// Set the page size in bytes the capacities are derived from
    pub fn set_page_size(&mut self, x: usize) -> &mut Self {
        self.page_size = x;
        self
    }

    /// Overrides the page size derived capacities
    pub fn set_capacities(&mut self, leaf: usize, directory: usize) -> &mut Self {
        self.leaf_capacity = Some(leaf);
        self.directory_capacity = Some(directory);
        self
    }

    ///
    pub fn insertion(&self) -> InsertionStrategy {
        self.insertion
    }

    ///
    pub fn split(&self) -> SplitStrategy {
        self.split
    }

    ///
    pub fn overflow(&self) -> OverflowTreatment {
        self.overflow
    }

    ///
    pub fn bulk_split(&self) -> BulkSplitStrategy {
        self.bulk_split
    }

    /// Checks the parameters that don't depend on the dimension.
    pub fn validate(&self) -> SimdexResult<()> {
        if !(self.relative_min_fill > 0.0 && self.relative_min_fill <= 0.5) {
            return Err(SimdexError::invalid_parameter(
                "relative_min_fill",
                format!("{} is not in (0, 0.5]", self.relative_min_fill),
            ));
        }
        if let OverflowTreatment::LimitedReinsert { amount, .. } = self.overflow {
            if !(amount > 0.0 && amount < 0.5) {
                return Err(SimdexError::invalid_parameter(
                    "reinsert_amount",
                    format!("{} is not in (0, 0.5)", amount),
                ));
            }
        }
        Ok(())
    }

    /// Computes the node sizes for objects of dimension `dim`.
    pub fn capacities(&self, dim: usize) -> SimdexResult<Capacities> {
        self.validate()?;
        if dim == 0 {
            return Err(SimdexError::invalid_parameter("dim", "objects need at least one coordinate"));
        }
        let payload = self.page_size.saturating_sub(NODE_HEADER_BYTES);
        let leaf_capacity = self
            .leaf_capacity
            .unwrap_or(payload / (ENTRY_ID_BYTES + dim * COORD_BYTES));
        let dir_capacity = self
            .directory_capacity
            .unwrap_or(payload / (ENTRY_ID_BYTES + 2 * dim * COORD_BYTES));
        let leaf_minimum = self.minimum_for("leaf", leaf_capacity)?;
        let dir_minimum = self.minimum_for("directory", dir_capacity)?;
        Ok(Capacities {
            leaf_capacity,
            leaf_minimum,
            dir_capacity,
            dir_minimum,
        })
    }

    fn minimum_for(&self, node_kind: &'static str, capacity: usize) -> SimdexResult<usize> {
        if capacity <= 2 {
            return Err(SimdexError::CapacityTooSmall {
                node_kind,
                capacity,
            });
        }
        if capacity < 10 {
            warn!(
                "The {} capacity is only {}, the tree will be deep and slow",
                node_kind, capacity
            );
        }
        Ok(((capacity as f32 * self.relative_min_fill).floor() as usize).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempdir::TempDir;

    #[test]
    fn page_capacities() {
        let caps = RStarSettings::default().capacities(2).unwrap();
        assert_eq!(caps.leaf_capacity, (4096 - 16) / 16);
        assert_eq!(caps.dir_capacity, (4096 - 16) / 24);
        assert_eq!(caps.leaf_minimum, (caps.leaf_capacity as f32 * 0.4) as usize);
    }

    #[test]
    fn tiny_pages_are_rejected() {
        let mut settings = RStarSettings::default();
        settings.set_page_size(128);
        match settings.capacities(10) {
            Err(SimdexError::CapacityTooSmall { capacity, .. }) => assert!(capacity <= 2),
            other => panic!("expected a capacity error, got {:?}", other),
        }
        settings.set_capacities(3, 3);
        let caps = settings.capacities(10).unwrap();
        assert_eq!(caps.leaf_minimum, 1);
    }

    #[test]
    fn bad_fill_is_rejected() {
        let mut settings = RStarSettings::default();
        settings.set_relative_min_fill(0.7);
        assert!(settings.validate().is_err());
        settings.set_relative_min_fill(0.0);
        assert!(settings.capacities(2).is_err());
    }

    #[test]
    fn yaml_settings() {
        let dir = TempDir::new("rstar_settings").unwrap();
        let path = dir.path().join("tree.yml");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "---\nsplit_strategy: quadratic\noverflow_treatment: split\nbulk_split: z_curve\nleaf_capacity: 8\ndirectory_capacity: 6"
        )
        .unwrap();
        drop(file);
        let settings = RStarSettings::from_yaml(&path).unwrap();
        assert_eq!(settings.split(), SplitStrategy::Quadratic);
        assert_eq!(settings.overflow(), OverflowTreatment::SplitOnly);
        assert_eq!(settings.bulk_split(), BulkSplitStrategy::ZCurve);
        assert_eq!(settings.insertion(), InsertionStrategy::Combined);
        let caps = settings.capacities(3).unwrap();
        assert_eq!((caps.leaf_capacity, caps.dir_capacity), (8, 6));
        assert_eq!((caps.leaf_minimum, caps.dir_minimum), (3, 2));
    }
}
