// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Fixed-width key store: `W` longs per key.

use crate::common::error::{ExecError, ExecResult};
use crate::exec::big_array::{BigArrays, LongArray};
use crate::exec::hash_table::hash::{GROUP_HASH_SEED, hash_longs_with_seed};
use crate::exec::hash_table::table::OrdinalTable;

#[derive(Debug)]
pub(crate) struct PackedLongHash<const W: usize> {
    table: OrdinalTable,
    keys: LongArray,
    len: u32,
}

pub(crate) type LongHash = PackedLongHash<1>;
pub(crate) type LongLongHash = PackedLongHash<2>;

fn matches<const W: usize>(keys: &LongArray, ordinal: u32, key: &[i64; W]) -> bool {
    let base = ordinal as usize * W;
    key.iter().enumerate().all(|(i, v)| keys.get(base + i) == *v)
}

impl<const W: usize> PackedLongHash<W> {
    pub(crate) fn new(arrays: &BigArrays) -> ExecResult<Self> {
        Ok(Self {
            table: OrdinalTable::new(arrays),
            keys: arrays.new_long_array(0)?,
            len: 0,
        })
    }

    pub(crate) fn len(&self) -> u32 {
        self.len
    }

    pub(crate) fn get(&self, ordinal: u32) -> [i64; W] {
        let base = ordinal as usize * W;
        std::array::from_fn(|i| self.keys.get(base + i))
    }

    pub(crate) fn find(&self, key: &[i64; W]) -> Option<u32> {
        let hash = hash_longs_with_seed(GROUP_HASH_SEED, key);
        let keys = &self.keys;
        self.table.find(hash, |ord| matches(keys, ord, key))
    }

    pub(crate) fn add(&mut self, key: [i64; W]) -> ExecResult<(u32, bool)> {
        let hash = hash_longs_with_seed(GROUP_HASH_SEED, &key);
        let keys = &self.keys;
        if let Some(ord) = self.table.find(hash, |ord| matches(keys, ord, &key)) {
            return Ok((ord, false));
        }
        if self.len == u32::MAX {
            return Err(ExecError::Internal("too many distinct keys".to_string()));
        }
        let ord = self.len;
        self.keys.write_slice(ord as usize * W, &key)?;
        self.table.insert(hash, ord)?;
        self.len += 1;
        Ok((ord, true))
    }

    pub(crate) fn close(&mut self) {
        self.table.close();
        self.keys.close();
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mem_tracker::MemTracker;

    #[test]
    fn pairs_resolve_to_stable_ordinals() {
        let arrays = BigArrays::new(MemTracker::new_root("hash"), 1);
        let mut hash = LongLongHash::new(&arrays).expect("hash");
        for i in 0..1_000i64 {
            assert_eq!(hash.add([i % 7, i / 7]).expect("add").0 as i64, i);
        }
        assert_eq!(hash.add([3, 0]).expect("add"), (3, false));
        assert_eq!(hash.get(999), [999 % 7, 999 / 7]);
        assert_eq!(hash.find(&[0, 1_000]), None);
        assert_eq!(hash.len(), 1_000);
    }
}
