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
//! Byte-string key store: dense ordinals over variable-length keys.

use crate::common::error::{ExecError, ExecResult};
use crate::exec::big_array::{BigArrays, ByteArray, LongArray};
use crate::exec::hash_table::hash::{GROUP_HASH_SEED, hash_bytes_with_seed};
use crate::exec::hash_table::table::OrdinalTable;

#[derive(Debug)]
pub(crate) struct BytesRefHash {
    table: OrdinalTable,
    bytes: ByteArray,
    /// `ends[ord]` is the exclusive end offset of key `ord` inside `bytes`.
    ends: LongArray,
    used: usize,
    len: u32,
}

fn key_at<'a>(bytes: &'a ByteArray, ends: &LongArray, ordinal: u32) -> &'a [u8] {
    let ord = ordinal as usize;
    let start = if ord == 0 { 0 } else { ends.get(ord - 1) as usize };
    bytes.slice(start, ends.get(ord) as usize)
}

impl BytesRefHash {
    pub(crate) fn new(arrays: &BigArrays) -> ExecResult<Self> {
        Ok(Self {
            table: OrdinalTable::new(arrays),
            bytes: arrays.new_byte_array()?,
            ends: arrays.new_long_array(0)?,
            used: 0,
            len: 0,
        })
    }

    pub(crate) fn len(&self) -> u32 {
        self.len
    }

    pub(crate) fn get(&self, ordinal: u32) -> &[u8] {
        key_at(&self.bytes, &self.ends, ordinal)
    }

    pub(crate) fn find(&self, key: &[u8]) -> Option<u32> {
        let hash = hash_bytes_with_seed(GROUP_HASH_SEED, key);
        let (bytes, ends) = (&self.bytes, &self.ends);
        self.table.find(hash, |ord| key_at(bytes, ends, ord) == key)
    }

    /// Returns the key's ordinal and whether it was inserted by this call.
    pub(crate) fn add(&mut self, key: &[u8]) -> ExecResult<(u32, bool)> {
        let hash = hash_bytes_with_seed(GROUP_HASH_SEED, key);
        let (bytes, ends) = (&self.bytes, &self.ends);
        if let Some(ord) = self.table.find(hash, |ord| key_at(bytes, ends, ord) == key) {
            return Ok((ord, false));
        }
        if self.len == u32::MAX {
            return Err(ExecError::Internal("too many distinct keys".to_string()));
        }
        let ord = self.len;
        self.bytes.write_slice(self.used, key)?;
        self.used += key.len();
        self.ends.set(ord as usize, self.used as i64)?;
        self.table.insert(hash, ord)?;
        self.len += 1;
        Ok((ord, true))
    }

    pub(crate) fn close(&mut self) {
        self.table.close();
        self.bytes.close();
        self.ends.close();
        self.used = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mem_tracker::MemTracker;

    #[test]
    fn dense_ordinals_in_insertion_order() {
        let tracker = MemTracker::new_root("hash");
        let arrays = BigArrays::new(tracker.clone(), 2);
        let mut hash = BytesRefHash::new(&arrays).expect("hash");
        assert_eq!(hash.add(b"b").expect("add"), (0, true));
        assert_eq!(hash.add(b"").expect("add"), (1, true));
        assert_eq!(hash.add(b"a longer key than eight bytes").expect("add"), (2, true));
        assert_eq!(hash.add(b"b").expect("add"), (0, false));
        assert_eq!(hash.get(2), b"a longer key than eight bytes");
        assert_eq!(hash.get(1), b"");
        assert_eq!(hash.find(b"zz"), None);
        assert!(tracker.current() > 0);
        hash.close();
        assert_eq!(tracker.current(), 0);
    }
}
