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
//! Several key columns packed into one byte-string key per tuple.
//!
//! Layout per column: a tag byte (0 = null, 1 = value) followed, for values, by
//! 8 little-endian bytes for fixed-width types or a u32 length plus the bytes for
//! BYTES_REF. Multi-valued positions expand to the cartesian product of their
//! columns' values.

use super::bytes_ref_hash::BytesRefHash;
use super::long_block_hash::{LongKeys, append_long_key};
use super::{BlockHash, GroupSpec, OrdinalsBuilder};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::big_array::BigArrays;
use crate::exec::block::{Block, BlockBuilder, BytesRefBlock, ElementType};
use crate::exec::page::Page;

const NULL_TAG: u8 = 0;
const VALUE_TAG: u8 = 1;

enum ColumnKeys<'a> {
    Fixed(LongKeys<'a>),
    Bytes(BytesRefBlock<'a>),
}

impl<'a> ColumnKeys<'a> {
    fn new(block: &'a Block) -> ExecResult<Self> {
        if block.element_type() == ElementType::BytesRef {
            Ok(ColumnKeys::Bytes(block.as_bytes_refs()?))
        } else {
            Ok(ColumnKeys::Fixed(LongKeys::new(block)?))
        }
    }

    fn encode(&self, value_index: usize, out: &mut Vec<u8>) {
        out.push(VALUE_TAG);
        match self {
            ColumnKeys::Fixed(keys) => out.extend_from_slice(&keys.key(value_index).to_le_bytes()),
            ColumnKeys::Bytes(keys) => {
                let bytes = keys.get(value_index);
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
        }
    }
}

/// Values of one column at one position, as value indexes; empty means null.
fn position_values(block: &Block, position: usize) -> std::ops::Range<usize> {
    let first = block.first_value_index(position);
    first..first + block.value_count(position)
}

#[derive(Debug)]
pub struct PackedValuesBlockHash {
    groups: Vec<GroupSpec>,
    hash: BytesRefHash,
    key: Vec<u8>,
}

impl PackedValuesBlockHash {
    pub fn new(groups: &[GroupSpec], arrays: &BigArrays) -> ExecResult<Self> {
        Ok(Self {
            groups: groups.to_vec(),
            hash: BytesRefHash::new(arrays)?,
            key: Vec::new(),
        })
    }

    /// Calls `visit` with every encoded key tuple of `position`.
    fn for_each_tuple(
        key: &mut Vec<u8>,
        blocks: &[&Block],
        columns: &[ColumnKeys<'_>],
        position: usize,
        visit: &mut dyn FnMut(&[u8]) -> ExecResult<()>,
    ) -> ExecResult<()> {
        let ranges = blocks
            .iter()
            .map(|b| position_values(b, position))
            .collect::<Vec<_>>();
        // Odometer over the per-column value ranges; a null column contributes one slot.
        let mut cursor = ranges.iter().map(|r| r.start).collect::<Vec<_>>();
        loop {
            key.clear();
            for (column, (range, at)) in columns.iter().zip(ranges.iter().zip(&cursor)) {
                if range.is_empty() {
                    key.push(NULL_TAG);
                } else {
                    column.encode(*at, key);
                }
            }
            visit(key.as_slice())?;
            let mut advanced = false;
            for (range, at) in ranges.iter().zip(cursor.iter_mut()).rev() {
                if *at + 1 < range.end {
                    *at += 1;
                    advanced = true;
                    break;
                }
                *at = range.start;
            }
            if !advanced {
                return Ok(());
            }
        }
    }

    fn blocks<'p>(&self, page: &'p Page) -> ExecResult<Vec<&'p Block>> {
        self.groups
            .iter()
            .map(|g| page.block(g.channel))
            .collect()
    }
}

impl BlockHash for PackedValuesBlockHash {
    fn add(&mut self, page: &Page) -> ExecResult<Block> {
        let blocks = self.blocks(page)?;
        let columns = blocks
            .iter()
            .map(|b| ColumnKeys::new(b))
            .collect::<ExecResult<Vec<_>>>()?;
        let mut out = OrdinalsBuilder::with_capacity(page.position_count());
        let hash = &mut self.hash;
        for p in 0..page.position_count() {
            out.begin();
            Self::for_each_tuple(&mut self.key, &blocks, &columns, p, &mut |key| {
                let (ordinal, _) = hash.add(key)?;
                out.push(ordinal);
                Ok(())
            })?;
            out.end();
        }
        out.build()
    }

    fn lookup(&self, page: &Page) -> ExecResult<Block> {
        let blocks = self.blocks(page)?;
        let columns = blocks
            .iter()
            .map(|b| ColumnKeys::new(b))
            .collect::<ExecResult<Vec<_>>>()?;
        let mut out = OrdinalsBuilder::with_capacity(page.position_count());
        let mut key = Vec::new();
        for p in 0..page.position_count() {
            out.begin();
            Self::for_each_tuple(&mut key, &blocks, &columns, p, &mut |key| {
                if let Some(ordinal) = self.hash.find(key) {
                    out.push(ordinal);
                }
                Ok(())
            })?;
            out.end();
        }
        out.build()
    }

    fn keys(&self) -> ExecResult<Vec<Block>> {
        let count = self.hash.len();
        let mut builders = self
            .groups
            .iter()
            .map(|g| BlockBuilder::new(g.element_type, count as usize))
            .collect::<Vec<_>>();
        for ordinal in 0..count {
            let mut key = self.hash.get(ordinal);
            for builder in builders.iter_mut() {
                key = decode_column(key, builder)?;
            }
        }
        builders.into_iter().map(BlockBuilder::build).collect()
    }

    fn group_count(&self) -> usize {
        self.hash.len() as usize
    }

    fn close(&mut self) {
        self.hash.close();
    }
}

fn take<'a>(key: &'a [u8], n: usize) -> ExecResult<(&'a [u8], &'a [u8])> {
    if key.len() < n {
        return Err(ExecError::Internal("truncated packed key".to_string()));
    }
    Ok(key.split_at(n))
}

/// Decode one column from the front of `key`, returning the rest.
fn decode_column<'a>(key: &'a [u8], builder: &mut BlockBuilder) -> ExecResult<&'a [u8]> {
    let (tag, rest) = take(key, 1)?;
    if tag[0] == NULL_TAG {
        builder.append_null();
        return Ok(rest);
    }
    if let BlockBuilder::BytesRef(b) = builder {
        let (len, rest) = take(rest, 4)?;
        let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
        let (bytes, rest) = take(rest, len)?;
        b.append_value(bytes);
        return Ok(rest);
    }
    let (word, rest) = take(rest, 8)?;
    let mut le = [0u8; 8];
    le.copy_from_slice(word);
    append_long_key(builder, i64::from_le_bytes(le));
    Ok(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::block::{BytesRefBlockBuilder, IntBlockBuilder};
    use crate::runtime::mem_tracker::MemTracker;

    fn groups() -> Vec<GroupSpec> {
        vec![
            GroupSpec::new(0, ElementType::BytesRef),
            GroupSpec::new(1, ElementType::Int),
        ]
    }

    #[test]
    fn tuples_including_nulls_round_trip_through_keys() {
        let mut host = BytesRefBlockBuilder::with_capacity(4);
        host.append_value(b"a").append_value(b"a").append_null().append_value(b"a");
        let mut port = IntBlockBuilder::with_capacity(4);
        port.append_value(1).append_value(2).append_value(1).append_value(1);
        let page = Page::new(vec![host.build().expect("h"), port.build().expect("p")])
            .expect("page");
        let arrays = BigArrays::new(MemTracker::new_root("hash"), 4);
        let mut hash = PackedValuesBlockHash::new(&groups(), &arrays).expect("hash");
        let ords = hash.add(&page).expect("add");
        let ints = ords.as_ints().expect("ints");
        assert_eq!((0..4).map(|p| ints.get(p)).collect::<Vec<_>>(), vec![0, 1, 2, 0]);
        let keys = hash.keys().expect("keys");
        assert_eq!(keys[0].as_bytes_refs().expect("h").get(1), b"a");
        assert!(keys[0].is_null(2));
        assert_eq!(keys[1].as_ints().expect("p").get(1), 2);
    }

    #[test]
    fn multi_values_expand_to_cartesian_product() {
        let mut host = BytesRefBlockBuilder::with_capacity(1);
        host.begin_position_entry()
            .append_value(b"x")
            .append_value(b"y")
            .end_position_entry();
        let mut port = IntBlockBuilder::with_capacity(1);
        port.begin_position_entry()
            .append_value(1)
            .append_value(2)
            .end_position_entry();
        let page = Page::new(vec![host.build().expect("h"), port.build().expect("p")])
            .expect("page");
        let arrays = BigArrays::new(MemTracker::new_root("hash"), 4);
        let mut hash = PackedValuesBlockHash::new(&groups(), &arrays).expect("hash");
        let ords = hash.add(&page).expect("add");
        assert_eq!(ords.as_ints().expect("ints").position_values(0), vec![0, 1, 2, 3]);
        assert_eq!(hash.group_count(), 4);
    }
}
