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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Hints and restrictions a caller attaches to a query request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QueryFlags(u32);

impl QueryFlags {
    /// No restriction
    pub const NONE: QueryFlags = QueryFlags(0);
    /// Never use an index, scan everything
    pub const LINEAR_ONLY: QueryFlags = QueryFlags(0b1);
    /// Only answer with an index. The planner hands back nothing rather than a linear scan.
    pub const OPTIMIZED_ONLY: QueryFlags = QueryFlags(0b10);
    /// Only exact answers
    pub const EXACT_ONLY: QueryFlags = QueryFlags(0b100);
    /// Only use what is already there, never build an index
    pub const CHEAP_ONLY: QueryFlags = QueryFlags(0b1000);
    /// Do not attach a newly built index to the relation
    pub const NO_CACHE: QueryFlags = QueryFlags(0b1_0000);
    /// The query will be run for most objects, an expensive precomputation pays off
    pub const PRECOMPUTE: QueryFlags = QueryFlags(0b10_0000);
    /// Either of these keeps the optimizer out
    pub const NO_OPTIMIZER: QueryFlags = QueryFlags(0b1 | 0b1000);

    ///
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every flag of `other` is set
    pub fn contains(self, other: QueryFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag of `other` is set
    pub fn intersects(self, other: QueryFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// These flags with the flags of `other` cleared
    pub fn without(self, other: QueryFlags) -> QueryFlags {
        QueryFlags(self.0 & !other.0)
    }
}

impl BitOr for QueryFlags {
    type Output = QueryFlags;
    fn bitor(self, other: QueryFlags) -> QueryFlags {
        QueryFlags(self.0 | other.0)
    }
}

impl BitOrAssign for QueryFlags {
    fn bitor_assign(&mut self, other: QueryFlags) {
        self.0 |= other.0;
    }
}

const NAMES: [(QueryFlags, &str); 6] = [
    (QueryFlags::LINEAR_ONLY, "linear"),
    (QueryFlags::OPTIMIZED_ONLY, "optimized"),
    (QueryFlags::EXACT_ONLY, "exact"),
    (QueryFlags::CHEAP_ONLY, "cheap"),
    (QueryFlags::NO_CACHE, "no-cache"),
    (QueryFlags::PRECOMPUTE, "precompute"),
];

impl fmt::Debug for QueryFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "QueryFlags({})", names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combining_and_clearing() {
        let flags = QueryFlags::PRECOMPUTE | QueryFlags::NO_CACHE;
        assert!(flags.contains(QueryFlags::PRECOMPUTE));
        assert!(!flags.contains(QueryFlags::NO_OPTIMIZER));
        assert!(!flags.intersects(QueryFlags::NO_OPTIMIZER));
        assert!((flags | QueryFlags::CHEAP_ONLY).intersects(QueryFlags::NO_OPTIMIZER));
        assert_eq!(flags.without(QueryFlags::PRECOMPUTE), QueryFlags::NO_CACHE);
        assert_eq!(format!("{:?}", flags), "QueryFlags(no-cache precompute)");
        assert_eq!(QueryFlags::default(), QueryFlags::NONE);
    }
}
