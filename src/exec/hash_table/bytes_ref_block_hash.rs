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
use super::bytes_ref_hash::BytesRefHash;
use super::{BlockHash, GroupOrdinals, OrdinalsBuilder};
use crate::common::error::ExecResult;
use crate::exec::big_array::BigArrays;
use crate::exec::block::{Block, BytesRefBlockBuilder, ElementType};
use crate::exec::page::Page;

/// Single BYTES_REF key column.
#[derive(Debug)]
pub struct BytesRefBlockHash {
    channel: usize,
    hash: BytesRefHash,
    ordinals: GroupOrdinals,
}

impl BytesRefBlockHash {
    pub fn new(channel: usize, arrays: &BigArrays) -> ExecResult<Self> {
        Ok(Self {
            channel,
            hash: BytesRefHash::new(arrays)?,
            ordinals: GroupOrdinals::new(arrays)?,
        })
    }

    fn group_of(&mut self, key: &[u8]) -> ExecResult<u32> {
        let (key_ordinal, inserted) = self.hash.add(key)?;
        self.ordinals.group_for_key(key_ordinal, inserted)
    }
}

impl BlockHash for BytesRefBlockHash {
    fn add(&mut self, page: &Page) -> ExecResult<Block> {
        let block = page.block(self.channel)?;
        if block.element_type() == ElementType::Null {
            let mut out = OrdinalsBuilder::with_capacity(block.position_count());
            for _ in 0..block.position_count() {
                out.append(self.ordinals.group_for_null()?);
            }
            return out.build();
        }
        let keys = block.as_bytes_refs()?;
        let mut out = OrdinalsBuilder::with_capacity(block.position_count());
        for p in 0..block.position_count() {
            let first = block.first_value_index(p);
            match block.value_count(p) {
                0 => out.append(self.ordinals.group_for_null()?),
                1 => out.append(self.group_of(keys.get(first))?),
                count => {
                    out.begin();
                    for i in first..first + count {
                        let group = self.group_of(keys.get(i))?;
                        out.push(group);
                    }
                    out.end();
                }
            }
        }
        out.build()
    }

    fn lookup(&self, page: &Page) -> ExecResult<Block> {
        let block = page.block(self.channel)?;
        let mut out = OrdinalsBuilder::with_capacity(block.position_count());
        let keys = if block.element_type() == ElementType::Null {
            None
        } else {
            Some(block.as_bytes_refs()?)
        };
        for p in 0..block.position_count() {
            out.begin();
            match (block.value_count(p), keys.as_ref()) {
                (0, _) | (_, None) => {
                    if let Some(group) = self.ordinals.null_group() {
                        out.push(group);
                    }
                }
                (count, Some(keys)) => {
                    let first = block.first_value_index(p);
                    for i in first..first + count {
                        if let Some(key_ordinal) = self.hash.find(keys.get(i)) {
                            out.push(self.ordinals.find_key(key_ordinal));
                        }
                    }
                }
            }
            out.end();
        }
        out.build()
    }

    fn keys(&self) -> ExecResult<Vec<Block>> {
        let count = self.ordinals.count();
        let mut builder = BytesRefBlockBuilder::with_capacity(count);
        for group in 0..count as u32 {
            match self.ordinals.key_of(group) {
                None => builder.append_null(),
                Some(key_ordinal) => builder.append_value(self.hash.get(key_ordinal)),
            };
        }
        Ok(vec![builder.build()?])
    }

    fn group_count(&self) -> usize {
        self.ordinals.count()
    }

    fn close(&mut self) {
        self.hash.close();
        self.ordinals.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mem_tracker::MemTracker;

    #[test]
    fn strings_group_by_exact_bytes() {
        let mut b = BytesRefBlockBuilder::with_capacity(4);
        b.append_value(b"b").append_value(b"a").append_null().append_value(b"b");
        let page = Page::new(vec![b.build().expect("block")]).expect("page");
        let tracker = MemTracker::new_root("hash");
        let mut hash =
            BytesRefBlockHash::new(0, &BigArrays::new(tracker.clone(), 2)).expect("hash");
        let ords = hash.add(&page).expect("add");
        let ords = ords.as_ints().expect("ints");
        assert_eq!((0..4).map(|p| ords.get(p)).collect::<Vec<_>>(), vec![0, 1, 2, 0]);
        let keys = hash.keys().expect("keys");
        assert_eq!(keys[0].as_bytes_refs().expect("bytes").get(1), b"a");
        assert!(keys[0].is_null(2));
        hash.close();
        assert_eq!(tracker.current(), 0);
    }
}
