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
//! Grouping by `(series id, time bucket)`.
//!
//! Series ids are interned first; the `(series ordinal, bucket)` pair is then
//! interned again to produce the group ordinal. Both levels are append-only, so a
//! pair keeps its ordinal for the lifetime of the hash no matter how the two
//! channels were evaluated.

use super::bytes_ref_hash::BytesRefHash;
use super::long_hash::LongLongHash;
use super::{BlockHash, OrdinalsBuilder};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::big_array::BigArrays;
use crate::exec::block::{Block, BytesRefBlockBuilder, LongBlockBuilder};
use crate::exec::page::Page;

#[derive(Debug)]
pub struct TimeSeriesBlockHash {
    tsid_channel: usize,
    bucket_channel: usize,
    tsids: BytesRefHash,
    pairs: LongLongHash,
}

fn single_value(block: &Block, position: usize, what: &str) -> ExecResult<usize> {
    match block.value_count(position) {
        1 => Ok(block.first_value_index(position)),
        0 => Err(ExecError::invalid_input(format!(
            "time-series grouping found a null {what} at position {position}"
        ))),
        n => Err(ExecError::invalid_input(format!(
            "time-series grouping found {n} {what} values at position {position}"
        ))),
    }
}

impl TimeSeriesBlockHash {
    pub fn new(tsid_channel: usize, bucket_channel: usize, arrays: &BigArrays) -> ExecResult<Self> {
        Ok(Self {
            tsid_channel,
            bucket_channel,
            tsids: BytesRefHash::new(arrays)?,
            pairs: LongLongHash::new(arrays)?,
        })
    }

    /// Distinct series seen so far.
    pub fn series_count(&self) -> usize {
        self.tsids.len() as usize
    }
}

impl BlockHash for TimeSeriesBlockHash {
    fn add(&mut self, page: &Page) -> ExecResult<Block> {
        let tsid_block = page.block(self.tsid_channel)?;
        let bucket_block = page.block(self.bucket_channel)?;
        let tsids = tsid_block.as_bytes_refs()?;
        let buckets = bucket_block.as_longs()?;
        let mut out = OrdinalsBuilder::with_capacity(page.position_count());
        for p in 0..page.position_count() {
            let tsid = tsids.get(single_value(tsid_block, p, "tsid")?);
            let bucket = buckets.get(single_value(bucket_block, p, "bucket")?);
            let (series, _) = self.tsids.add(tsid)?;
            let (group, _) = self.pairs.add([i64::from(series), bucket])?;
            out.append(group);
        }
        out.build()
    }

    fn lookup(&self, page: &Page) -> ExecResult<Block> {
        let tsid_block = page.block(self.tsid_channel)?;
        let bucket_block = page.block(self.bucket_channel)?;
        let tsids = tsid_block.as_bytes_refs()?;
        let buckets = bucket_block.as_longs()?;
        let mut out = OrdinalsBuilder::with_capacity(page.position_count());
        for p in 0..page.position_count() {
            let found = match (tsid_block.value_count(p), bucket_block.value_count(p)) {
                (1, 1) => self
                    .tsids
                    .find(tsids.get(tsid_block.first_value_index(p)))
                    .and_then(|series| {
                        let bucket = buckets.get(bucket_block.first_value_index(p));
                        self.pairs.find(&[i64::from(series), bucket])
                    }),
                _ => None,
            };
            match found {
                Some(group) => out.append(group),
                None => out.append_null(),
            }
        }
        out.build()
    }

    fn keys(&self) -> ExecResult<Vec<Block>> {
        let count = self.pairs.len();
        let mut tsids = BytesRefBlockBuilder::with_capacity(count as usize);
        let mut buckets = LongBlockBuilder::with_capacity(count as usize);
        for group in 0..count {
            let [series, bucket] = self.pairs.get(group);
            tsids.append_value(self.tsids.get(series as u32));
            buckets.append_value(bucket);
        }
        Ok(vec![tsids.build()?, buckets.build()?])
    }

    fn group_count(&self) -> usize {
        self.pairs.len() as usize
    }

    fn close(&mut self) {
        self.tsids.close();
        self.pairs.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mem_tracker::MemTracker;

    fn page(rows: &[(&str, i64)]) -> Page {
        let mut tsid = BytesRefBlockBuilder::with_capacity(rows.len());
        let mut bucket = LongBlockBuilder::with_capacity(rows.len());
        for (t, b) in rows {
            tsid.append_value(t.as_bytes());
            bucket.append_value(*b);
        }
        Page::new(vec![tsid.build().expect("tsid"), bucket.build().expect("bucket")])
            .expect("page")
    }

    #[test]
    fn pairs_keep_their_ordinal_across_pages() {
        let arrays = BigArrays::new(MemTracker::new_root("ts"), 4);
        let mut hash = TimeSeriesBlockHash::new(0, 1, &arrays).expect("hash");
        let first = hash
            .add(&page(&[("a", 0), ("b", 0), ("a", 60)]))
            .expect("add");
        let second = hash.add(&page(&[("a", 60), ("b", 0), ("c", 0)])).expect("add");
        let ords = |b: &Block| {
            let ints = b.as_ints().expect("ints");
            (0..b.position_count()).map(|p| ints.get(p)).collect::<Vec<_>>()
        };
        assert_eq!(ords(&first), vec![0, 1, 2]);
        assert_eq!(ords(&second), vec![2, 1, 3]);
        assert_eq!(hash.series_count(), 3);
        let keys = hash.keys().expect("keys");
        assert_eq!(keys[0].as_bytes_refs().expect("tsid").get(3), b"c");
        assert_eq!(keys[1].as_longs().expect("bucket").get(2), 60);
    }

    #[test]
    fn null_series_is_rejected() {
        let mut tsid = BytesRefBlockBuilder::with_capacity(1);
        tsid.append_null();
        let mut bucket = LongBlockBuilder::with_capacity(1);
        bucket.append_value(0);
        let page = Page::new(vec![tsid.build().expect("t"), bucket.build().expect("b")])
            .expect("page");
        let arrays = BigArrays::new(MemTracker::new_root("ts"), 4);
        let mut hash = TimeSeriesBlockHash::new(0, 1, &arrays).expect("hash");
        assert!(hash.add(&page).is_err());
    }
}
